// Copyright (C) 2024 Huawei Device Co., Ltd.
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Readable byte sources.
//!
//! A [`ByteStream`] is opened, read in bounded chunks until it reports zero
//! bytes, then closed. Upload bodies and multipart body parts are both
//! expressed this way, which keeps memory use bounded by the chunk size no
//! matter how large the source is.

use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

/// A source of bytes that is opened, drained in chunks and closed.
pub trait ByteStream: Send {
    /// Prepares the stream for reading.
    fn open(&mut self) -> io::Result<()>;

    /// Reads up to `buf.len()` bytes. `Ok(0)` signals the end of the stream.
    fn read_chunk(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Releases whatever `open` acquired.
    fn close(&mut self);

    /// Total number of bytes the stream will yield, when known up front.
    fn known_length(&self) -> Option<u64>;
}

/// A stream over bytes held in memory.
///
/// Opening rewinds to the start, so the stream can be drained any number of
/// times.
pub struct MemoryStream {
    data: Vec<u8>,
    pos: usize,
}

impl MemoryStream {
    pub fn new(data: impl Into<Vec<u8>>) -> Self {
        Self {
            data: data.into(),
            pos: 0,
        }
    }
}

impl ByteStream for MemoryStream {
    fn open(&mut self) -> io::Result<()> {
        self.pos = 0;
        Ok(())
    }

    fn read_chunk(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let remaining = &self.data[self.pos..];
        let n = remaining.len().min(buf.len());
        buf[..n].copy_from_slice(&remaining[..n]);
        self.pos += n;
        Ok(n)
    }

    fn close(&mut self) {}

    fn known_length(&self) -> Option<u64> {
        Some(self.data.len() as u64)
    }
}

/// A stream over a file on disk, opened lazily.
pub struct FileStream {
    path: PathBuf,
    file: Option<File>,
    len: Option<u64>,
}

impl FileStream {
    /// Creates a stream for `path`. The file is not touched until `open`.
    pub fn new(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let len = std::fs::metadata(&path).ok().map(|meta| meta.len());
        Self {
            path,
            file: None,
            len,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ByteStream for FileStream {
    fn open(&mut self) -> io::Result<()> {
        let file = File::open(&self.path)?;
        self.len = Some(file.metadata()?.len());
        self.file = Some(file);
        Ok(())
    }

    fn read_chunk(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.file.as_mut() {
            Some(file) => file.read(buf),
            None => Err(io::Error::new(
                io::ErrorKind::NotConnected,
                format!("{} is not open", self.path.display()),
            )),
        }
    }

    fn close(&mut self) {
        self.file = None;
    }

    fn known_length(&self) -> Option<u64> {
        self.len
    }
}

/// A stream over an arbitrary reader.
///
/// The reader is consumed by the first drain; reopening after `close` fails.
pub struct ReaderStream<R> {
    reader: Option<R>,
    len: Option<u64>,
}

impl<R: Read + Send> ReaderStream<R> {
    /// Wraps `reader`; `len` is reported through `known_length`.
    pub fn new(reader: R, len: Option<u64>) -> Self {
        Self {
            reader: Some(reader),
            len,
        }
    }
}

impl<R: Read + Send> ByteStream for ReaderStream<R> {
    fn open(&mut self) -> io::Result<()> {
        match self.reader {
            Some(_) => Ok(()),
            None => Err(io::Error::new(
                io::ErrorKind::Other,
                "reader stream already consumed",
            )),
        }
    }

    fn read_chunk(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.reader.as_mut() {
            Some(reader) => reader.read(buf),
            None => Ok(0),
        }
    }

    fn close(&mut self) {
        self.reader = None;
    }

    fn known_length(&self) -> Option<u64> {
        self.len
    }
}

/// Adapts a [`ByteStream`] into [`Read`], opening it on first use and closing
/// it once it is exhausted or dropped.
pub struct StreamReader {
    stream: Box<dyn ByteStream>,
    opened: bool,
    finished: bool,
}

impl StreamReader {
    pub fn new(stream: Box<dyn ByteStream>) -> Self {
        Self {
            stream,
            opened: false,
            finished: false,
        }
    }

    pub fn known_length(&self) -> Option<u64> {
        self.stream.known_length()
    }
}

impl Read for StreamReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.finished || buf.is_empty() {
            return Ok(0);
        }
        if !self.opened {
            self.stream.open()?;
            self.opened = true;
        }
        let n = self.stream.read_chunk(buf)?;
        if n == 0 {
            self.finished = true;
            self.stream.close();
        }
        Ok(n)
    }
}

impl Drop for StreamReader {
    fn drop(&mut self) {
        if self.opened && !self.finished {
            self.stream.close();
        }
    }
}
