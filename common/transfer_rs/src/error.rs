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

//! Error handling for transfer engines.
//!
//! Every failure an engine reports through `did_complete` is a
//! [`TransferError`]: a categorizing [`TransferErrorCode`] plus a readable
//! message.

use std::fmt::Display;
use std::io;

/// Represents an error that terminated a transfer task.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransferError {
    /// The specific error code categorizing this error
    code: TransferErrorCode,
    /// Human-readable description of the error
    msg: String,
}

impl TransferError {
    /// Creates a new `TransferError` with the given code and message.
    ///
    /// # Arguments
    /// * `code` - The error code
    /// * `msg` - Human-readable error message
    pub fn new(code: TransferErrorCode, msg: impl Into<String>) -> Self {
        Self {
            code,
            msg: msg.into(),
        }
    }

    /// The error every engine reports for a task that was cancelled.
    pub fn cancelled() -> Self {
        Self::new(TransferErrorCode::TaskCanceled, "cancelled")
    }

    /// Gets the error code for this error.
    pub fn code(&self) -> &TransferErrorCode {
        &self.code
    }

    /// Gets the human-readable error message.
    pub fn msg(&self) -> &str {
        &self.msg
    }

    /// Returns `true` if the task ended because it was cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.code == TransferErrorCode::TaskCanceled
    }

    pub(crate) fn from_io(code: TransferErrorCode, err: &io::Error) -> Self {
        Self::new(code, err.to_string())
    }
}

impl Display for TransferError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}({}): {}", self.code, self.code as i32, self.msg)
    }
}

impl std::error::Error for TransferError {}

/// Enumeration of the error codes a transfer engine may report.
///
/// Values follow the conventional url-loading error numbering so that
/// callers comparing raw codes keep working across engines.
#[derive(Default, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum TransferErrorCode {
    /// Unclassified failure.
    #[default]
    Unknown = -1,

    /// The task was cancelled before it finished.
    TaskCanceled = -999,

    /// The url could not be parsed.
    BadUrl = -1000,

    /// The task exceeded its timeout.
    TimedOut = -1001,

    /// The url scheme or method is not supported by the engine.
    UnsupportedUrl = -1002,

    /// Host name resolution failed.
    CannotFindHost = -1003,

    /// The connection attempt failed.
    CannotConnectToHost = -1004,

    /// The connection dropped while the task was in flight.
    NetworkConnectionLost = -1005,

    /// Redirect chain exceeded the engine's limit.
    HttpTooManyRedirects = -1007,

    /// The server answered with something that is not valid HTTP.
    BadServerResponse = -1011,

    /// The task gave up on an authentication challenge.
    UserCancelledAuthentication = -1012,

    /// The response body could not be decoded.
    CannotDecodeContentData = -1016,

    /// An upload needed its body again and no new body stream was supplied.
    RequestBodyStreamExhausted = -1021,

    /// An upload source file is missing.
    FileDoesNotExist = -1100,

    /// A download file could not be created.
    CannotCreateFile = -3000,

    /// A file could not be opened.
    CannotOpenFile = -3001,

    /// Writing downloaded bytes failed.
    CannotWriteToFile = -3003,
}
