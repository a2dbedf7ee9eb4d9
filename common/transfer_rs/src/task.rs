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

//! Task descriptions and lifecycle states.

use std::path::PathBuf;

use crate::request::HttpRequest;
use crate::stream::ByteStream;

/// The kind of work a task performs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TaskKind {
    /// Response body is delivered in memory through `did_receive_data`.
    Data,
    /// Request body is sent with progress; the response body is delivered
    /// like a data task.
    Upload,
    /// Response body is written to a file handed over through
    /// `did_finish_downloading`.
    Download,
}

/// What a task is created from.
pub enum TaskSource {
    /// A plain request; its in-memory body, if any, is sent as is.
    Data(HttpRequest),
    /// Upload of the given bytes.
    UploadData(HttpRequest, Vec<u8>),
    /// Upload of a file's contents.
    UploadFile(HttpRequest, PathBuf),
    /// Upload of a body read from the given stream. A resend, such as after
    /// a 307 redirect, pulls a fresh stream from `need_new_body_stream`.
    UploadStream(HttpRequest, Box<dyn ByteStream>),
    /// Download into an engine-owned temporary file.
    Download(HttpRequest),
    /// Download continuing a partially written file.
    ResumeDownload {
        request: HttpRequest,
        partial: PathBuf,
    },
}

impl TaskSource {
    pub fn kind(&self) -> TaskKind {
        match self {
            TaskSource::Data(_) => TaskKind::Data,
            TaskSource::UploadData(..) | TaskSource::UploadFile(..) | TaskSource::UploadStream(..) => {
                TaskKind::Upload
            }
            TaskSource::Download(_) | TaskSource::ResumeDownload { .. } => TaskKind::Download,
        }
    }

    pub fn request(&self) -> &HttpRequest {
        match self {
            TaskSource::Data(request)
            | TaskSource::UploadData(request, _)
            | TaskSource::UploadFile(request, _)
            | TaskSource::UploadStream(request, _)
            | TaskSource::Download(request)
            | TaskSource::ResumeDownload { request, .. } => request,
        }
    }
}

/// Lifecycle state of a task inside an engine.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TaskStatus {
    /// Created or paused; no bytes move.
    #[default]
    Suspended,
    Running,
    /// Cancel requested, completion not yet reported.
    Canceling,
    /// `did_complete` has been reported.
    Completed,
}
