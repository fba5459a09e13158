//! Line sources: a memory-mapped file split into newline-aligned ranges, and a
//! chunked reader for arbitrary streams.

use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::ops::Range;
use std::path::Path;

use memchr::{memchr, memrchr};
use memmap2::Mmap;

use crate::error::{Error, Result};

pub const SEGMENT_SIZE: usize = 1 << 21;

/// A read-only mapping of the whole input file.
pub struct MappedFile {
    map: Option<Mmap>,
}

impl MappedFile {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .map_err(|e| Error::input(format!("opening {}", path.display()), e))?;
        let len = file
            .metadata()
            .map_err(|e| Error::input(format!("reading metadata of {}", path.display()), e))?
            .len();
        // Zero-length mappings are rejected on some platforms.
        if len == 0 {
            return Ok(MappedFile { map: None });
        }
        // The mapping is only valid while nobody truncates the file underneath us.
        let map = unsafe { Mmap::map(&file) }
            .map_err(|e| Error::input(format!("mapping {}", path.display()), e))?;
        Ok(MappedFile { map: Some(map) })
    }

    pub fn bytes(&self) -> &[u8] {
        self.map.as_deref().unwrap_or(&[])
    }
}

/// Moves `position` forward to the start of a line: itself if it already is
/// one, otherwise just past the next newline.
#[inline]
fn line_start_from(data: &[u8], position: usize) -> usize {
    if position == 0 || position >= data.len() {
        return position.min(data.len());
    }
    memchr(b'\n', &data[position - 1..])
        .map(|x| position + x)
        .unwrap_or(data.len())
}

/// Splits `data` into at most `parts` contiguous, non-empty ranges that each
/// start at a line boundary.
pub fn partition(data: &[u8], parts: usize) -> Vec<Range<usize>> {
    let parts = parts.max(1);
    let chunk_size = data.len() / parts;
    let mut starts: Vec<usize> = (0..parts)
        .map(|part| line_start_from(data, part * chunk_size))
        .collect();
    starts.push(data.len());
    starts.dedup();
    starts
        .windows(2)
        .map(|pair| pair[0]..pair[1])
        .filter(|range| !range.is_empty())
        .collect()
}

/// Newline-aligned slices of a range, each at most `size` bytes unless a
/// single line is longer than that.
///
/// Yields `(offset, segment)` where `offset` is the absolute position of the
/// segment in `data`.
pub struct Segments<'a> {
    data: &'a [u8],
    position: usize,
    end: usize,
    size: usize,
}

impl<'a> Segments<'a> {
    pub fn new(data: &'a [u8], range: Range<usize>, size: usize) -> Self {
        Segments {
            data,
            position: range.start,
            end: range.end.min(data.len()),
            size: size.max(1),
        }
    }
}

impl<'a> Iterator for Segments<'a> {
    type Item = (usize, &'a [u8]);

    fn next(&mut self) -> Option<Self::Item> {
        let start = self.position;
        if start >= self.end {
            return None;
        }
        let limit = start.saturating_add(self.size);
        let end = if limit >= self.end {
            self.end
        } else if let Some(last) = memrchr(b'\n', &self.data[start..limit]) {
            start + last + 1
        } else {
            memchr(b'\n', &self.data[limit..self.end])
                .map(|x| limit + x + 1)
                .unwrap_or(self.end)
        };
        self.position = end;
        Some((start, &self.data[start..end]))
    }
}

/// Lines of a segment without their `\n`, paired with their offset in the
/// segment. A final line without a terminator is still yielded; the empty
/// remainder after a trailing newline is not.
pub struct Lines<'a> {
    data: &'a [u8],
    position: usize,
}

impl<'a> Lines<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Lines { data, position: 0 }
    }
}

impl<'a> Iterator for Lines<'a> {
    type Item = (usize, &'a [u8]);

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        let start = self.position;
        if start >= self.data.len() {
            return None;
        }
        let rest = &self.data[start..];
        match memchr(b'\n', rest) {
            Some(linefeed) => {
                self.position = start + linefeed + 1;
                Some((start, &rest[..linefeed]))
            }
            None => {
                self.position = self.data.len();
                Some((start, rest))
            }
        }
    }
}

/// An owned, newline-aligned piece of a streamed input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Absolute byte offset of the chunk in the stream.
    pub offset: u64,
    pub data: Vec<u8>,
}

/// Reads any stream in chunks of roughly `size` bytes, each extended to the
/// end of its last line, so only a bounded amount of input is held at once.
pub struct ChunkReader<R> {
    reader: BufReader<R>,
    size: usize,
    offset: u64,
    done: bool,
}

impl<R: Read> ChunkReader<R> {
    pub fn new(reader: R, size: usize) -> Self {
        ChunkReader {
            reader: BufReader::new(reader),
            size: size.max(1),
            offset: 0,
            done: false,
        }
    }

    fn fill(&mut self) -> std::io::Result<Vec<u8>> {
        let mut data = Vec::with_capacity(self.size);
        (&mut self.reader).take(self.size as u64).read_to_end(&mut data)?;
        if data.len() < self.size {
            self.done = true;
        } else if data.last() != Some(&b'\n') {
            self.reader.read_until(b'\n', &mut data)?;
        }
        Ok(data)
    }
}

impl<R: Read> Iterator for ChunkReader<R> {
    type Item = Result<Chunk>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let data = match self.fill() {
            Ok(data) => data,
            Err(e) => {
                self.done = true;
                return Some(Err(Error::input(format!("reading input at byte {}", self.offset), e)));
            }
        };
        if data.is_empty() {
            self.done = true;
            return None;
        }
        let chunk = Chunk {
            offset: self.offset,
            data,
        };
        self.offset += chunk.data.len() as u64;
        Some(Ok(chunk))
    }
}
