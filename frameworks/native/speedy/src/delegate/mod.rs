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

//! Per-task event handling.
//!
//! A [`TaskDelegate`] owns everything known about one task: progress, the
//! received bytes, the response head and the first error. It also owns the
//! task's [`CompletionQueue`], which stays closed until the task completes,
//! so jobs enqueued by subscribers observe the final state.

mod queue;

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

pub use queue::{CompletionQueue, Job};
use transfer_rs::engine::{AuthChallenge, ChallengeDisposition, ResponseDisposition, UNKNOWN_LENGTH};
use transfer_rs::error::TransferError;
use transfer_rs::request::HttpRequest;
use transfer_rs::response::ResponseHead;
use transfer_rs::stream::ByteStream;
use transfer_rs::task::TaskKind;
use transfer_rs::TaskId;

use crate::error::{ErrorKind, SpeedyError};

/// Progress callback: `(bytes this event, total so far, total expected)`.
/// The expected total is -1 when unknown.
pub type ProgressHandler = Box<dyn FnMut(i64, i64, i64) + Send + 'static>;

/// Makes a fresh body stream each time a streamed upload has to be resent.
pub type BodyStreamFactory = Arc<dyn Fn() -> Box<dyn ByteStream> + Send + Sync + 'static>;

/// Completed and expected unit counts of a task.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Progress {
    pub completed: i64,
    pub total: i64,
}

/// The variant a delegate was created as.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DelegateKind {
    Generic,
    Data,
    Upload,
    Download,
}

impl From<Option<TaskKind>> for DelegateKind {
    fn from(kind: Option<TaskKind>) -> Self {
        match kind {
            Some(TaskKind::Data) => DelegateKind::Data,
            Some(TaskKind::Upload) => DelegateKind::Upload,
            Some(TaskKind::Download) => DelegateKind::Download,
            None => DelegateKind::Generic,
        }
    }
}

enum KindState {
    Generic,
    Data {
        expected_length: Option<i64>,
        total_received: i64,
    },
    Upload,
    Download {
        destination: Option<PathBuf>,
    },
}

struct DelegateState {
    progress: Progress,
    data: Option<Vec<u8>>,
    error: Option<SpeedyError>,
    response: Option<ResponseHead>,
    body_stream: Option<BodyStreamFactory>,
    kind: KindState,
}

/// Event handler and state holder for a single task.
pub struct TaskDelegate {
    task: TaskId,
    kind: DelegateKind,
    state: Mutex<DelegateState>,
    progress_handler: Mutex<Option<ProgressHandler>>,
    queue: CompletionQueue,
}

impl TaskDelegate {
    /// Creates the delegate variant matching `kind`; `None` makes a generic
    /// delegate.
    pub fn new(task: TaskId, kind: Option<TaskKind>) -> Self {
        let kind = DelegateKind::from(kind);
        let kind_state = match kind {
            DelegateKind::Generic => KindState::Generic,
            DelegateKind::Data => KindState::Data {
                expected_length: None,
                total_received: 0,
            },
            DelegateKind::Upload => KindState::Upload,
            DelegateKind::Download => KindState::Download { destination: None },
        };
        Self {
            task,
            kind,
            state: Mutex::new(DelegateState {
                progress: Progress::default(),
                data: None,
                error: None,
                response: None,
                body_stream: None,
                kind: kind_state,
            }),
            progress_handler: Mutex::new(None),
            queue: CompletionQueue::new(),
        }
    }

    pub fn task(&self) -> TaskId {
        self.task
    }

    pub fn kind(&self) -> DelegateKind {
        self.kind
    }

    pub fn progress(&self) -> Progress {
        self.state.lock().unwrap().progress
    }

    /// Bytes received so far, `None` if nothing arrived.
    pub fn data(&self) -> Option<Vec<u8>> {
        self.state.lock().unwrap().data.clone()
    }

    pub fn error(&self) -> Option<SpeedyError> {
        self.state.lock().unwrap().error.clone()
    }

    pub fn response(&self) -> Option<ResponseHead> {
        self.state.lock().unwrap().response.clone()
    }

    /// Length announced by the response of a data task; -1 when unknown.
    pub fn expected_content_length(&self) -> Option<i64> {
        match self.state.lock().unwrap().kind {
            KindState::Data {
                expected_length, ..
            } => expected_length,
            _ => None,
        }
    }

    pub fn destination(&self) -> Option<PathBuf> {
        match &self.state.lock().unwrap().kind {
            KindState::Download { destination } => destination.clone(),
            _ => None,
        }
    }

    /// Whether the task completed and the queue was released.
    pub fn is_finished(&self) -> bool {
        self.queue.is_open()
    }

    /// Sets the factory `need_new_body_stream` builds replacement streams
    /// with.
    pub fn set_body_stream(&self, factory: BodyStreamFactory) {
        self.state.lock().unwrap().body_stream = Some(factory);
    }

    /// Sets where a finished download is moved. Ignored by other kinds.
    pub fn set_destination(&self, destination: PathBuf) -> bool {
        match &mut self.state.lock().unwrap().kind {
            KindState::Download { destination: slot } => {
                *slot = Some(destination);
                true
            }
            _ => false,
        }
    }

    /// Installs the progress handler, replacing any earlier one. Generic
    /// delegates report no progress and refuse it.
    pub fn set_progress_handler(&self, handler: ProgressHandler) -> bool {
        if self.kind == DelegateKind::Generic {
            return false;
        }
        *self.progress_handler.lock().unwrap() = Some(handler);
        true
    }

    /// Queues `job` to run after the task completes.
    pub fn enqueue(&self, job: Job) {
        self.queue.enqueue(job);
    }

    /// Records `error` unless an earlier one is already recorded.
    pub(crate) fn record_error(&self, error: SpeedyError) {
        let mut state = self.state.lock().unwrap();
        if state.error.is_none() {
            state.error = Some(error);
        }
    }

    pub fn will_perform_redirection(&self, _response: &ResponseHead, new_request: HttpRequest) -> Option<HttpRequest> {
        Some(new_request)
    }

    pub fn did_receive_challenge(&self, challenge: &AuthChallenge) -> ChallengeDisposition {
        debug!("{} challenged by {} ({})", self.task, challenge.host, challenge.scheme);
        ChallengeDisposition::PerformDefaultHandling
    }

    /// Builds a new body stream for a resend. Every call yields a fresh
    /// stream; `None` when no factory is set.
    pub fn need_new_body_stream(&self) -> Option<Box<dyn ByteStream>> {
        let factory = self.state.lock().unwrap().body_stream.clone()?;
        Some(factory())
    }

    /// Records the engine's error, if any, then releases the queue.
    pub fn did_complete(&self, error: Option<TransferError>) {
        if let Some(error) = error {
            self.state.lock().unwrap().error = Some(SpeedyError::from(&error));
        }
        debug!("{} completion queue released", self.task);
        self.queue.open();
    }

    pub fn did_receive_response(&self, response: &ResponseHead) -> ResponseDisposition {
        let mut state = self.state.lock().unwrap();
        if let KindState::Data {
            expected_length, ..
        } = &mut state.kind
        {
            *expected_length = Some(
                response
                    .expected_content_length()
                    .map(|len| len as i64)
                    .unwrap_or(UNKNOWN_LENGTH),
            );
        }
        state.response = Some(response.clone());
        ResponseDisposition::Allow
    }

    /// Appends a response chunk. Data delegates also report progress.
    pub fn did_receive_data(&self, data: &[u8]) {
        let report = {
            let mut guard = self.state.lock().unwrap();
            let state = &mut *guard;
            state.data.get_or_insert_with(Vec::new).extend_from_slice(data);
            match &mut state.kind {
                KindState::Data {
                    expected_length,
                    total_received,
                } => {
                    *total_received += data.len() as i64;
                    let total = *total_received;
                    let expected = expected_length.unwrap_or(UNKNOWN_LENGTH);
                    state.progress = Progress {
                        completed: total,
                        total: expected,
                    };
                    Some((data.len() as i64, total, expected))
                }
                _ => None,
            }
        };
        if let Some((bytes, total, expected)) = report {
            self.report_progress(bytes, total, expected);
        }
    }

    pub fn did_send_body_data(&self, bytes_sent: i64, total_sent: i64, total_expected: i64) {
        self.state.lock().unwrap().progress = Progress {
            completed: total_sent,
            total: total_expected,
        };
        self.report_progress(bytes_sent, total_sent, total_expected);
    }

    /// Moves the downloaded file to the destination. Failures are recorded
    /// as the task's error.
    pub fn did_finish_downloading(&self, location: &Path) {
        let Some(destination) = self.destination() else {
            self.record_error(SpeedyError::new(
                ErrorKind::Io,
                format!("no destination for download at {}", location.display()),
            ));
            return;
        };
        match move_file(location, &destination) {
            Ok(()) => info!("{} downloaded to {}", self.task, destination.display()),
            Err(e) => {
                error!("{} move to {} failed: {}", self.task, destination.display(), e);
                self.state.lock().unwrap().error = Some(SpeedyError::from(e));
            }
        }
    }

    pub fn did_write_data(&self, bytes_written: i64, total_written: i64, total_expected: i64) {
        self.state.lock().unwrap().progress = Progress {
            completed: total_written,
            total: total_expected,
        };
        self.report_progress(bytes_written, total_written, total_expected);
    }

    pub fn did_resume_at_offset(&self, file_offset: i64, expected_total: i64) {
        self.state.lock().unwrap().progress = Progress {
            completed: file_offset,
            total: expected_total,
        };
    }

    /// Runs the handler with its slot unlocked, so it may install another
    /// handler. A handler installed meanwhile replaces the one that ran.
    fn report_progress(&self, bytes: i64, total: i64, expected: i64) {
        let Some(mut handler) = self.progress_handler.lock().unwrap().take() else {
            return;
        };
        handler(bytes, total, expected);
        let mut slot = self.progress_handler.lock().unwrap();
        if slot.is_none() {
            *slot = Some(handler);
        }
    }
}

fn move_file(from: &Path, to: &Path) -> io::Result<()> {
    if fs::rename(from, to).is_ok() {
        return Ok(());
    }
    // Rename fails across file systems.
    fs::copy(from, to)?;
    fs::remove_file(from)
}
