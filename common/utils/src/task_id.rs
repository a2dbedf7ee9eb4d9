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

//! Task identifier utilities.
//!
//! Transfer engines hand out a [`TaskId`] for every task they create. The
//! identifier is the key under which a task's delegate is registered, so two
//! live tasks never share one.

use std::fmt::Display;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_TASK_ID: AtomicU64 = AtomicU64::new(1);

/// A unique identifier for transfer tasks.
///
/// # Examples
///
/// ```rust
/// use speedy_utils::task_id::TaskId;
///
/// let first = TaskId::next();
/// let second = TaskId::next();
/// assert_ne!(first, second);
/// assert_eq!(TaskId::new(7).raw(), 7);
/// ```
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct TaskId {
    raw: u64,
}

impl TaskId {
    /// Wraps an existing raw identifier.
    pub fn new(raw: u64) -> Self {
        Self { raw }
    }

    /// Allocates a fresh identifier, unique within the process.
    pub fn next() -> Self {
        Self {
            raw: NEXT_TASK_ID.fetch_add(1, Ordering::Relaxed),
        }
    }

    /// Returns the numeric value of this identifier.
    pub fn raw(&self) -> u64 {
        self.raw
    }
}

impl Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "task-{}", self.raw)
    }
}
