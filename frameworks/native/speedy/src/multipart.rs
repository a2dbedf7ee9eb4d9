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

//! `multipart/form-data` body construction.
//!
//! A [`MultipartFormData`] collects body parts, each a header block and a
//! [`ByteStream`] of known length, and encodes them either into memory or
//! straight into a file. Both paths share one writer, so they produce
//! identical bytes, and part streams are copied through a fixed 1024-byte
//! buffer.
//!
//! # Examples
//!
//! ```
//! use speedy::multipart::MultipartFormData;
//!
//! let mut form = MultipartFormData::with_boundary("b");
//! form.add_value("name", "speedy");
//! let body = form.encode().unwrap();
//! assert_eq!(form.content_length(), 6);
//! assert_eq!(body.len() as u64, form.encoded_length());
//! assert_eq!(form.content_type(), "multipart/form-data; boundary=b");
//! ```

use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::Path;

use transfer_rs::stream::{ByteStream, FileStream, MemoryStream};

use crate::encoding::{self, Parameters};
use crate::error::{ErrorKind, SpeedyError};

const CRLF: &str = "\r\n";
const STREAM_BUFFER_SIZE: usize = 1024;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum BoundaryType {
    Initial,
    Encapsulated,
    Final,
}

/// Generates a boundary of the form `speedy.boundary.<16 hex digits>`.
pub fn random_boundary() -> String {
    format!(
        "speedy.boundary.{:08x}{:08x}",
        rand::random::<u32>(),
        rand::random::<u32>()
    )
}

fn boundary_data(boundary_type: BoundaryType, boundary: &str) -> String {
    match boundary_type {
        BoundaryType::Initial => format!("--{}{}", boundary, CRLF),
        BoundaryType::Encapsulated => format!("{}--{}{}", CRLF, boundary, CRLF),
        BoundaryType::Final => format!("{}--{}--{}", CRLF, boundary, CRLF),
    }
}

/// One part of a multipart body.
pub struct BodyPart {
    headers: Vec<(String, String)>,
    stream: Box<dyn ByteStream>,
    content_length: u64,
    has_initial_boundary: bool,
    has_final_boundary: bool,
}

impl BodyPart {
    fn new(headers: Vec<(String, String)>, stream: Box<dyn ByteStream>, content_length: u64) -> Self {
        Self {
            headers,
            stream,
            content_length,
            has_initial_boundary: false,
            has_final_boundary: false,
        }
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    pub fn content_length(&self) -> u64 {
        self.content_length
    }

    fn header_data(&self) -> String {
        let mut data = String::new();
        for (key, value) in &self.headers {
            data.push_str(&format!("{}: {}{}", key, value, CRLF));
        }
        data.push_str(CRLF);
        data
    }
}

/// Builder and encoder of `multipart/form-data` bodies.
pub struct MultipartFormData {
    boundary: String,
    parts: Vec<BodyPart>,
}

impl MultipartFormData {
    /// Creates an empty form with a random boundary.
    pub fn new() -> Self {
        Self::with_boundary(random_boundary())
    }

    /// Creates an empty form delimited by `boundary`.
    pub fn with_boundary(boundary: impl Into<String>) -> Self {
        Self {
            boundary: boundary.into(),
            parts: Vec::new(),
        }
    }

    /// Creates a form holding one value part per flattened parameter.
    ///
    /// Parameters are flattened as for a query string, so nested keys read
    /// `user[name]` or `tags[]`, and both names and values are
    /// percent-escaped.
    pub fn with_parameters(parameters: &Parameters) -> Self {
        let mut form = Self::new();
        form.add_parameters(parameters);
        form
    }

    /// Adds one value part per flattened, percent-escaped parameter.
    pub fn add_parameters(&mut self, parameters: &Parameters) {
        for (key, value) in encoding::query(parameters) {
            self.add_value(&key, value);
        }
    }

    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    /// Value for the request's `Content-Type` header.
    pub fn content_type(&self) -> String {
        format!("multipart/form-data; boundary={}", self.boundary)
    }

    /// Sum of the part content lengths. Headers and boundaries are not
    /// counted.
    pub fn content_length(&self) -> u64 {
        self.parts.iter().map(|part| part.content_length).sum()
    }

    /// Exact number of bytes [`encode`](Self::encode) produces.
    pub fn encoded_length(&self) -> u64 {
        let boundary_len = |boundary_type| boundary_data(boundary_type, &self.boundary).len() as u64;
        let count = self.parts.len();
        self.parts
            .iter()
            .enumerate()
            .map(|(index, part)| {
                let opening = if index == 0 {
                    boundary_len(BoundaryType::Initial)
                } else {
                    boundary_len(BoundaryType::Encapsulated)
                };
                let closing = if index + 1 == count {
                    boundary_len(BoundaryType::Final)
                } else {
                    0
                };
                opening + part.header_data().len() as u64 + part.content_length + closing
            })
            .sum()
    }

    pub fn parts(&self) -> &[BodyPart] {
        &self.parts
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// Appends a part with explicit headers. `length` must be the number of
    /// bytes `stream` yields.
    pub fn add_part(&mut self, headers: Vec<(String, String)>, stream: Box<dyn ByteStream>, length: u64) {
        self.parts.push(BodyPart::new(headers, stream, length));
    }

    /// Appends a plain form value.
    pub fn add_value(&mut self, name: &str, value: impl Into<Vec<u8>>) {
        let value = value.into();
        let headers = content_headers(name, None, None);
        let length = value.len() as u64;
        self.add_part(headers, Box::new(MemoryStream::new(value)), length);
    }

    /// Appends a form value with its own content type.
    pub fn add_value_with_mime(&mut self, name: &str, value: impl Into<Vec<u8>>, mime_type: &str) {
        let value = value.into();
        let headers = content_headers(name, None, Some(mime_type));
        let length = value.len() as u64;
        self.add_part(headers, Box::new(MemoryStream::new(value)), length);
    }

    /// Appends a file part read from `stream`.
    pub fn add_file(
        &mut self,
        name: &str,
        file_name: &str,
        mime_type: &str,
        stream: Box<dyn ByteStream>,
        length: u64,
    ) {
        let headers = content_headers(name, Some(file_name), Some(mime_type));
        self.add_part(headers, stream, length);
    }

    /// Appends a file part held in memory.
    pub fn add_file_data(&mut self, name: &str, file_name: &str, mime_type: &str, data: impl Into<Vec<u8>>) {
        let data = data.into();
        let length = data.len() as u64;
        self.add_file(name, file_name, mime_type, Box::new(MemoryStream::new(data)), length);
    }

    /// Appends a part streaming the file at `path`.
    ///
    /// The file name defaults to the last path component and the mime type
    /// to a guess from the extension. A path that is not a readable regular
    /// file, or whose name cannot be derived, is skipped with a warning and
    /// `false` is returned.
    pub fn add_file_path(
        &mut self,
        name: &str,
        file_name: Option<&str>,
        mime_type: Option<&str>,
        path: impl AsRef<Path>,
    ) -> bool {
        let path = path.as_ref();
        let metadata = match std::fs::metadata(path) {
            Ok(metadata) if metadata.is_file() => metadata,
            Ok(_) => {
                warn!("multipart part {} skipped, {} is not a file", name, path.display());
                return false;
            }
            Err(e) => {
                warn!("multipart part {} skipped, {}: {}", name, path.display(), e);
                return false;
            }
        };
        let file_name = match file_name {
            Some(file_name) => file_name.to_string(),
            None => match path.file_name().and_then(|n| n.to_str()) {
                Some(file_name) => file_name.to_string(),
                None => {
                    warn!("multipart part {} skipped, no file name in {}", name, path.display());
                    return false;
                }
            },
        };
        let mime_type = match mime_type {
            Some(mime_type) => mime_type.to_string(),
            None => mime_type_for_path(path).to_string(),
        };
        self.add_openable_file(
            name,
            &file_name,
            &mime_type,
            Box::new(FileStream::new(path)),
            metadata.len(),
        )
    }

    /// Appends a file part once `stream` has been opened and closed again.
    /// A stream that cannot be opened is skipped with a warning.
    fn add_openable_file(
        &mut self,
        name: &str,
        file_name: &str,
        mime_type: &str,
        mut stream: Box<dyn ByteStream>,
        length: u64,
    ) -> bool {
        if let Err(e) = stream.open() {
            warn!("multipart part {} skipped, {} cannot be opened: {}", name, file_name, e);
            return false;
        }
        stream.close();
        self.add_file(name, file_name, mime_type, stream, length);
        true
    }

    /// Encodes every part into memory.
    ///
    /// A part whose stream fails stops the encoding with
    /// `InputStreamReadFailed`.
    pub fn encode(&mut self) -> Result<Vec<u8>, SpeedyError> {
        let mut encoded = Vec::with_capacity(self.encoded_length() as usize);
        self.write_parts(&mut |chunk| {
            encoded.extend_from_slice(chunk);
            Ok(())
        })?;
        Ok(encoded)
    }

    /// Encodes every part into a new file at `path`.
    ///
    /// Nothing is written, and `Ok` is returned, if `path` already exists.
    pub fn encode_to_path(&mut self, path: impl AsRef<Path>) -> Result<(), SpeedyError> {
        let path = path.as_ref();
        let mut file = match OpenOptions::new().write(true).create_new(true).open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                warn!("multipart body not written, {} already exists", path.display());
                return Ok(());
            }
            Err(e) => return Err(output_failed(path, &e)),
        };
        self.write_parts(&mut |chunk| file.write_all(chunk).map_err(|e| output_failed(path, &e)))?;
        file.flush().map_err(|e| output_failed(path, &e))?;
        debug!("multipart body written to {}", path.display());
        Ok(())
    }

    fn write_parts(
        &mut self,
        sink: &mut dyn FnMut(&[u8]) -> Result<(), SpeedyError>,
    ) -> Result<(), SpeedyError> {
        let count = self.parts.len();
        for (index, part) in self.parts.iter_mut().enumerate() {
            part.has_initial_boundary = index == 0;
            part.has_final_boundary = index + 1 == count;
        }

        let boundary = self.boundary.clone();
        let mut buffer = [0u8; STREAM_BUFFER_SIZE];
        for part in self.parts.iter_mut() {
            let opening = if part.has_initial_boundary {
                BoundaryType::Initial
            } else {
                BoundaryType::Encapsulated
            };
            sink(boundary_data(opening, &boundary).as_bytes())?;
            sink(part.header_data().as_bytes())?;
            drain_part(part, &mut buffer, sink)?;
            if part.has_final_boundary {
                sink(boundary_data(BoundaryType::Final, &boundary).as_bytes())?;
            }
        }
        Ok(())
    }
}

fn drain_part(
    part: &mut BodyPart,
    buffer: &mut [u8],
    sink: &mut dyn FnMut(&[u8]) -> Result<(), SpeedyError>,
) -> Result<(), SpeedyError> {
    part.stream.open().map_err(|e| input_failed(&e))?;
    let result = loop {
        match part.stream.read_chunk(buffer) {
            Ok(0) => break Ok(()),
            Ok(n) => {
                if let Err(e) = sink(&buffer[..n]) {
                    break Err(e);
                }
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => break Err(input_failed(&e)),
        }
    };
    part.stream.close();
    result
}

fn input_failed(err: &io::Error) -> SpeedyError {
    SpeedyError::new(
        ErrorKind::InputStreamReadFailed,
        format!("Failed to read from input stream: {}", err),
    )
}

fn output_failed(path: &Path, err: &io::Error) -> SpeedyError {
    SpeedyError::new(
        ErrorKind::OutputStreamWriteFailed,
        format!("Failed to write to output stream {}: {}", path.display(), err),
    )
}

fn content_headers(name: &str, file_name: Option<&str>, mime_type: Option<&str>) -> Vec<(String, String)> {
    let disposition = match file_name {
        Some(file_name) => format!("form-data; name=\"{}\"; filename=\"{}\"", name, file_name),
        None => format!("form-data; name=\"{}\"", name),
    };
    let mut headers = vec![("Content-Disposition".to_string(), disposition)];
    if let Some(mime_type) = mime_type {
        headers.push(("Content-Type".to_string(), mime_type.to_string()));
    }
    headers
}

/// Guesses a mime type from the extension of `path`.
pub fn mime_type_for_path(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match extension.as_str() {
        "txt" | "text" | "log" => "text/plain",
        "htm" | "html" => "text/html",
        "css" => "text/css",
        "csv" => "text/csv",
        "xml" => "application/xml",
        "js" => "application/javascript",
        "json" => "application/json",
        "pdf" => "application/pdf",
        "zip" => "application/zip",
        "gz" => "application/gzip",
        "tar" => "application/x-tar",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "bmp" => "image/bmp",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        "ico" => "image/vnd.microsoft.icon",
        "heic" => "image/heic",
        "mp3" => "audio/mpeg",
        "m4a" => "audio/mp4",
        "wav" => "audio/wav",
        "mp4" => "video/mp4",
        "mov" => "video/quicktime",
        _ => "application/octet-stream",
    }
}
