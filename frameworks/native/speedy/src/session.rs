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

//! Demultiplexing of engine events onto task delegates.
//!
//! The engine reports every task to one [`SessionDelegate`], which looks the
//! task's [`TaskDelegate`] up by id and forwards the event to it. Events for
//! tasks with no registered delegate get the engine's default behavior.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use transfer_rs::engine::{AuthChallenge, ChallengeDisposition, ResponseDisposition, SessionEvents};
use transfer_rs::error::TransferError;
use transfer_rs::request::HttpRequest;
use transfer_rs::response::ResponseHead;
use transfer_rs::stream::ByteStream;
use transfer_rs::TaskId;

use crate::delegate::{DelegateKind, TaskDelegate};

/// Registry of task delegates and observer of a transfer engine.
///
/// A delegate is dropped from the registry when its task completes, after
/// the completion has been forwarded.
pub struct SessionDelegate {
    delegates: Mutex<HashMap<TaskId, Arc<TaskDelegate>>>,
}

impl SessionDelegate {
    pub fn new() -> Self {
        Self {
            delegates: Mutex::new(HashMap::new()),
        }
    }

    /// Registers `delegate` under its task id, replacing any previous one.
    pub fn register(&self, delegate: Arc<TaskDelegate>) {
        let task = delegate.task();
        if self
            .delegates
            .lock()
            .unwrap()
            .insert(task, delegate)
            .is_some()
        {
            debug!("{} delegate replaced", task);
        }
    }

    pub fn get(&self, task: TaskId) -> Option<Arc<TaskDelegate>> {
        self.delegates.lock().unwrap().get(&task).cloned()
    }

    pub fn remove(&self, task: TaskId) -> Option<Arc<TaskDelegate>> {
        self.delegates.lock().unwrap().remove(&task)
    }

    pub fn len(&self) -> usize {
        self.delegates.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn delegate_of(&self, task: TaskId, event: &str) -> Option<Arc<TaskDelegate>> {
        let delegate = self.get(task);
        if delegate.is_none() {
            debug!("{} {} ignored, no delegate", task, event);
        }
        delegate
    }
}

impl SessionEvents for SessionDelegate {
    fn did_become_invalid(&self, error: Option<&TransferError>) {
        match error {
            Some(e) => error!("session invalidated: {}", e),
            None => info!("session invalidated"),
        }
    }

    fn did_receive_session_challenge(&self, challenge: &AuthChallenge) -> ChallengeDisposition {
        debug!("session challenged by {}", challenge.host);
        ChallengeDisposition::PerformDefaultHandling
    }

    fn did_finish_events_for_background_session(&self) {
        info!("background session events finished");
    }

    fn will_perform_redirection(
        &self,
        task: TaskId,
        response: &ResponseHead,
        new_request: HttpRequest,
    ) -> Option<HttpRequest> {
        match self.delegate_of(task, "redirect") {
            Some(delegate) => delegate.will_perform_redirection(response, new_request),
            None => Some(new_request),
        }
    }

    fn did_receive_challenge(&self, task: TaskId, challenge: &AuthChallenge) -> ChallengeDisposition {
        match self.delegate_of(task, "challenge") {
            Some(delegate) => delegate.did_receive_challenge(challenge),
            None => ChallengeDisposition::PerformDefaultHandling,
        }
    }

    fn need_new_body_stream(&self, task: TaskId) -> Option<Box<dyn ByteStream>> {
        self.delegate_of(task, "body stream request")?
            .need_new_body_stream()
    }

    fn did_send_body_data(&self, task: TaskId, bytes_sent: i64, total_sent: i64, total_expected: i64) {
        let Some(delegate) = self.delegate_of(task, "send progress") else {
            return;
        };
        if delegate.kind() == DelegateKind::Upload {
            delegate.did_send_body_data(bytes_sent, total_sent, total_expected);
        }
    }

    fn did_complete(&self, task: TaskId, error: Option<TransferError>) {
        let Some(delegate) = self.delegate_of(task, "completion") else {
            return;
        };
        delegate.did_complete(error);
        self.remove(task);
    }

    fn did_receive_response(&self, task: TaskId, response: &ResponseHead) -> ResponseDisposition {
        match self.delegate_of(task, "response") {
            Some(delegate) => delegate.did_receive_response(response),
            None => ResponseDisposition::Allow,
        }
    }

    fn did_receive_data(&self, task: TaskId, data: &[u8]) {
        let Some(delegate) = self.delegate_of(task, "data") else {
            return;
        };
        match delegate.kind() {
            DelegateKind::Data | DelegateKind::Upload => delegate.did_receive_data(data),
            DelegateKind::Generic | DelegateKind::Download => {}
        }
    }

    fn did_finish_downloading(&self, task: TaskId, location: &Path) {
        let Some(delegate) = self.delegate_of(task, "download finish") else {
            return;
        };
        if delegate.kind() == DelegateKind::Download {
            delegate.did_finish_downloading(location);
        }
    }

    fn did_write_data(&self, task: TaskId, bytes_written: i64, total_written: i64, total_expected: i64) {
        let Some(delegate) = self.delegate_of(task, "write progress") else {
            return;
        };
        if delegate.kind() == DelegateKind::Download {
            delegate.did_write_data(bytes_written, total_written, total_expected);
        }
    }

    fn did_resume_at_offset(&self, task: TaskId, file_offset: i64, expected_total: i64) {
        let Some(delegate) = self.delegate_of(task, "resume") else {
            return;
        };
        if delegate.kind() == DelegateKind::Download {
            delegate.did_resume_at_offset(file_offset, expected_total);
        }
    }
}
