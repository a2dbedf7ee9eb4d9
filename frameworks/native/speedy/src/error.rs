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

//! Error type shared by every speedy operation.
//!
//! Encoding, serialization and validation failures carry the fixed codes of
//! the `com.speedy.error` domain. Transfer failures keep the engine's code
//! and I/O failures keep the OS error code when there is one.

use std::fmt::Display;
use std::io;

use transfer_rs::error::{TransferError, TransferErrorCode};

/// Domain of the codes carried by speedy's own error kinds.
pub const ERROR_DOMAIN: &str = "com.speedy.error";

/// Primary error type for speedy operations.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SpeedyError {
    /// Numeric error code, if available
    code: Option<i32>,
    /// Human-readable error message
    message: String,
    /// Categorizes the type of error that occurred
    kind: ErrorKind,
}

impl SpeedyError {
    /// Creates an error of `kind`, using the kind's fixed code when it has
    /// one.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            code: kind.fixed_code(),
            message: message.into(),
            kind,
        }
    }

    /// Returns the error code.
    ///
    /// # Returns
    /// The error code if available, otherwise 0.
    pub fn code(&self) -> i32 {
        self.code.unwrap_or(0)
    }

    /// Returns the error message.
    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    /// Returns `true` for the error reported when a task was cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.kind == ErrorKind::Transfer && self.code == Some(TransferErrorCode::TaskCanceled as i32)
    }
}

impl Display for SpeedyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}({}): {}", self.kind, self.code(), self.message)
    }
}

impl std::error::Error for SpeedyError {}

/// Categorizes the type of error that occurred.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Reported by the transfer engine; the code is the engine's.
    Transfer,
    /// I/O failure outside of body encoding.
    Io,
    /// A body part's stream failed to open or read.
    InputStreamReadFailed,
    /// The encoded body could not be written out.
    OutputStreamWriteFailed,
    ContentTypeValidationFailed,
    StatusCodeValidationFailed,
    DataSerializationFailed,
    StringSerializationFailed,
    JsonSerializationFailed,
    PropertyListSerializationFailed,
}

impl ErrorKind {
    /// The code this kind always carries in [`ERROR_DOMAIN`].
    pub fn fixed_code(&self) -> Option<i32> {
        let code = match self {
            ErrorKind::Transfer | ErrorKind::Io => return None,
            ErrorKind::InputStreamReadFailed => -8000,
            ErrorKind::OutputStreamWriteFailed => -8001,
            ErrorKind::ContentTypeValidationFailed => -8002,
            ErrorKind::StatusCodeValidationFailed => -8003,
            ErrorKind::DataSerializationFailed => -8004,
            ErrorKind::StringSerializationFailed => -8005,
            ErrorKind::JsonSerializationFailed => -8006,
            ErrorKind::PropertyListSerializationFailed => -8007,
        };
        Some(code)
    }
}

impl From<io::Error> for SpeedyError {
    /// Preserves the OS error code if available and sets the kind to Io.
    fn from(err: io::Error) -> Self {
        SpeedyError {
            code: err.raw_os_error(),
            message: err.to_string(),
            kind: ErrorKind::Io,
        }
    }
}

impl<'a> From<&'a TransferError> for SpeedyError {
    fn from(err: &'a TransferError) -> Self {
        SpeedyError {
            code: Some(*err.code() as i32),
            message: err.msg().to_string(),
            kind: ErrorKind::Transfer,
        }
    }
}

impl From<TransferError> for SpeedyError {
    fn from(err: TransferError) -> Self {
        SpeedyError::from(&err)
    }
}
