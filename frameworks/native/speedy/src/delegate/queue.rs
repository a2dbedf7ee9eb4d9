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

use std::collections::VecDeque;
use std::sync::Mutex;

/// A job run once the queue opens.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

struct QueueState {
    open: bool,
    draining: bool,
    pending: VecDeque<Job>,
}

/// Serial queue that holds jobs until it is opened, then runs them one at a
/// time in the order they were enqueued.
///
/// Jobs enqueued after opening run right away, still after anything already
/// pending. Whichever thread finds the queue open and idle does the
/// draining; no lock is held while a job runs, so jobs may enqueue more.
pub struct CompletionQueue {
    state: Mutex<QueueState>,
}

impl CompletionQueue {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(QueueState {
                open: false,
                draining: false,
                pending: VecDeque::new(),
            }),
        }
    }

    pub fn enqueue(&self, job: Job) {
        let mut state = self.state.lock().unwrap();
        state.pending.push_back(job);
        if !state.open || state.draining {
            return;
        }
        state.draining = true;
        drop(state);
        self.drain();
    }

    /// Opens the queue and runs everything pending. Opening twice is a no-op.
    pub fn open(&self) {
        let mut state = self.state.lock().unwrap();
        if state.open {
            return;
        }
        state.open = true;
        if state.draining {
            return;
        }
        state.draining = true;
        drop(state);
        self.drain();
    }

    pub fn is_open(&self) -> bool {
        self.state.lock().unwrap().open
    }

    pub fn pending(&self) -> usize {
        self.state.lock().unwrap().pending.len()
    }

    fn drain(&self) {
        loop {
            let job = {
                let mut state = self.state.lock().unwrap();
                match state.pending.pop_front() {
                    Some(job) => job,
                    None => {
                        state.draining = false;
                        return;
                    }
                }
            };
            job();
        }
    }
}
