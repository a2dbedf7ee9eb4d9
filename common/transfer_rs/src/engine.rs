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

//! The contract between a transfer engine and its observer.
//!
//! A [`TransferEngine`] owns the network side of every task it creates. It
//! reports what happens to those tasks through a single [`SessionEvents`]
//! observer supplied at construction, always tagging each event with the
//! task's [`TaskId`]. Events for one task are delivered in order: response,
//! data or progress, then exactly one `did_complete`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use speedy_utils::task_id::TaskId;

use crate::error::TransferError;
use crate::request::HttpRequest;
use crate::response::ResponseHead;
use crate::stream::ByteStream;
use crate::task::{TaskKind, TaskSource, TaskStatus};

/// Sentinel reported when a total is not known.
pub const UNKNOWN_LENGTH: i64 = -1;

/// An authentication challenge raised by a server.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthChallenge {
    pub host: String,
    pub scheme: String,
    pub realm: Option<String>,
    /// How many credentials were already rejected for this task.
    pub previous_failure_count: u32,
}

impl AuthChallenge {
    /// Parses a `WWW-Authenticate` value such as `Basic realm="files"`.
    pub fn parse(host: &str, header: &str, previous_failure_count: u32) -> Self {
        let header = header.trim();
        let (scheme, params) = header.split_once(' ').unwrap_or((header, ""));
        let realm = params.split(',').find_map(|param| {
            let (key, value) = param.trim().split_once('=')?;
            key.trim()
                .eq_ignore_ascii_case("realm")
                .then(|| value.trim().trim_matches('"').to_string())
        });
        Self {
            host: host.to_string(),
            scheme: scheme.to_string(),
            realm,
            previous_failure_count,
        }
    }
}

/// A user name and password answering a challenge.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Credential {
    pub user: String,
    pub password: String,
}

impl Credential {
    pub fn new(user: &str, password: &str) -> Self {
        Self {
            user: user.to_string(),
            password: password.to_string(),
        }
    }
}

/// How a challenge should be handled.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChallengeDisposition {
    /// Retry with the given credential.
    UseCredential(Credential),
    /// Let the engine decide; the reqwest engine delivers the challenge
    /// response as is.
    PerformDefaultHandling,
    /// Fail the task.
    CancelChallenge,
    /// Skip this protection space; handled like the default.
    RejectProtectionSpace,
}

/// Whether a data task keeps going after its response arrives.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResponseDisposition {
    Allow,
    Cancel,
}

/// Observer of every task an engine runs.
///
/// All methods have defaults matching the behavior of an engine with no
/// observer at all, so implementors override only what they handle.
pub trait SessionEvents: Send + Sync {
    /// The session was invalidated; no more tasks will run.
    fn did_become_invalid(&self, _error: Option<&TransferError>) {}

    /// A challenge not tied to one task.
    fn did_receive_session_challenge(&self, _challenge: &AuthChallenge) -> ChallengeDisposition {
        ChallengeDisposition::PerformDefaultHandling
    }

    /// All queued events of a background session were delivered.
    fn did_finish_events_for_background_session(&self) {}

    /// A redirect is about to be followed. Returning `None` refuses it and
    /// makes the redirect response the final one.
    fn will_perform_redirection(
        &self,
        _task: TaskId,
        _response: &ResponseHead,
        new_request: HttpRequest,
    ) -> Option<HttpRequest> {
        Some(new_request)
    }

    fn did_receive_challenge(&self, _task: TaskId, _challenge: &AuthChallenge) -> ChallengeDisposition {
        ChallengeDisposition::PerformDefaultHandling
    }

    /// The engine needs a fresh body for a streamed upload.
    fn need_new_body_stream(&self, _task: TaskId) -> Option<Box<dyn ByteStream>> {
        None
    }

    fn did_send_body_data(&self, _task: TaskId, _bytes_sent: i64, _total_sent: i64, _total_expected: i64) {}

    /// The task ended; `error` is `None` on success. Reported exactly once.
    fn did_complete(&self, _task: TaskId, _error: Option<TransferError>) {}

    fn did_receive_response(&self, _task: TaskId, _response: &ResponseHead) -> ResponseDisposition {
        ResponseDisposition::Allow
    }

    fn did_receive_data(&self, _task: TaskId, _data: &[u8]) {}

    /// The downloaded file is at `location`. It is removed once this returns.
    fn did_finish_downloading(&self, _task: TaskId, _location: &Path) {}

    fn did_write_data(&self, _task: TaskId, _bytes_written: i64, _total_written: i64, _total_expected: i64) {}

    fn did_resume_at_offset(&self, _task: TaskId, _file_offset: i64, _expected_total: i64) {}
}

/// Something that runs transfer tasks and reports them to [`SessionEvents`].
pub trait TransferEngine: Send + Sync {
    /// Creates a suspended task.
    fn create_task(&self, source: TaskSource) -> Result<TaskId, TransferError>;

    /// Kind of a live task, `None` once it is gone.
    fn task_kind(&self, task: TaskId) -> Option<TaskKind>;

    fn status(&self, task: TaskId) -> Option<TaskStatus>;

    /// Starts or continues a task.
    fn resume(&self, task: TaskId);

    /// Pauses a running task.
    fn suspend(&self, task: TaskId);

    /// Stops a task; it completes with a cancellation error.
    fn cancel(&self, task: TaskId);

    /// Whether this engine runs a background session.
    fn is_background(&self) -> bool {
        false
    }
}

/// Knobs shared by the engines in this crate.
#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Timeout applied to requests that carry none of their own.
    pub timeout: Option<Duration>,
    pub connect_timeout: Option<Duration>,
    /// Upper bound of a single read from a body or response.
    pub chunk_size: usize,
    /// Directory receiving in-flight downloads.
    pub download_dir: PathBuf,
    pub max_redirects: usize,
    pub background: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            timeout: None,
            connect_timeout: Some(Duration::from_secs(60)),
            chunk_size: 16 * 1024,
            download_dir: std::env::temp_dir(),
            max_redirects: 10,
            background: false,
        }
    }
}
