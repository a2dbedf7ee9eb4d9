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

//! Caller-facing handle of a single task.
//!
//! A [`Request`] forwards lifecycle commands to the engine and lets callers
//! subscribe to the outcome. Every subscription is queued on the task's
//! delegate and runs once, after the task completes, in subscription order.
//!
//! # Examples
//!
//! ```no_run
//! # fn demo(request: speedy::Request) {
//! request
//!     .validate_status_code(200..300)
//!     .on_progress(|_, done, total| println!("{}/{}", done, total))
//!     .on_string(|response| match response.result {
//!         Ok(body) => println!("{}", body),
//!         Err(e) => eprintln!("{}", e),
//!     });
//! # }
//! ```

use std::fmt::Display;
use std::ops::Range;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use serde::de::DeserializeOwned;
use serde_json::Value;
use transfer_rs::engine::TransferEngine;
use transfer_rs::request::HttpRequest;
use transfer_rs::response::ResponseHead;
use transfer_rs::TaskId;

use crate::delegate::{Progress, TaskDelegate};
use crate::error::{ErrorKind, SpeedyError};
use crate::response::{self, Response};

/// When a request started and ended.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Timeline {
    /// First `resume`.
    pub start: Option<Instant>,
    /// Completion, recorded before any subscriber runs.
    pub end: Option<Instant>,
}

/// Handle of one task.
pub struct Request {
    task: TaskId,
    engine: Arc<dyn TransferEngine>,
    delegate: Arc<TaskDelegate>,
    request: Option<HttpRequest>,
    timeline: Arc<Mutex<Timeline>>,
}

impl Request {
    /// Wraps an engine task, choosing the delegate variant from the task's
    /// kind.
    pub fn new(engine: Arc<dyn TransferEngine>, task: TaskId, request: Option<HttpRequest>) -> Self {
        let delegate = Arc::new(TaskDelegate::new(task, engine.task_kind(task)));
        let timeline = Arc::new(Mutex::new(Timeline::default()));
        let end = timeline.clone();
        delegate.enqueue(Box::new(move || {
            end.lock().unwrap().end = Some(Instant::now());
        }));
        Self {
            task,
            engine,
            delegate,
            request,
            timeline,
        }
    }

    pub fn task(&self) -> TaskId {
        self.task
    }

    pub fn delegate(&self) -> &Arc<TaskDelegate> {
        &self.delegate
    }

    /// The request as originally issued.
    pub fn request(&self) -> Option<&HttpRequest> {
        self.request.as_ref()
    }

    pub fn response(&self) -> Option<ResponseHead> {
        self.delegate.response()
    }

    pub fn progress(&self) -> Progress {
        self.delegate.progress()
    }

    pub fn timeline(&self) -> Timeline {
        *self.timeline.lock().unwrap()
    }

    pub fn start_time(&self) -> Option<Instant> {
        self.timeline().start
    }

    pub fn end_time(&self) -> Option<Instant> {
        self.timeline().end
    }

    /// Time from the first resume to completion.
    pub fn duration(&self) -> Option<Duration> {
        let timeline = self.timeline();
        Some(timeline.end?.saturating_duration_since(timeline.start?))
    }

    /// Starts or continues the task. The first call records the start time.
    pub fn resume(&self) -> &Self {
        {
            let mut timeline = self.timeline.lock().unwrap();
            if timeline.start.is_none() {
                timeline.start = Some(Instant::now());
            }
        }
        debug!("{} resume", self.task);
        self.engine.resume(self.task);
        self
    }

    pub fn suspend(&self) -> &Self {
        debug!("{} suspend", self.task);
        self.engine.suspend(self.task);
        self
    }

    /// Cancels the task. Subscribers still run, with a cancellation error.
    pub fn cancel(&self) -> &Self {
        debug!("{} cancel", self.task);
        self.engine.cancel(self.task);
        self
    }

    /// Sets the progress closure, replacing an earlier one. It is called as
    /// `(bytes this event, total so far, total expected)` while the task
    /// runs.
    pub fn on_progress<F>(&self, handler: F) -> &Self
    where
        F: FnMut(i64, i64, i64) + Send + 'static,
    {
        if !self.delegate.set_progress_handler(Box::new(handler)) {
            debug!("{} reports no progress", self.task);
        }
        self
    }

    /// Subscribes `completion` to the outcome serialized by `serializer`.
    ///
    /// A task error, including one recorded by a validation, skips the
    /// serializer and becomes the result.
    pub fn on_response<T, S, F>(&self, serializer: S, completion: F) -> &Self
    where
        T: 'static,
        S: FnOnce(Option<&[u8]>, Option<&ResponseHead>) -> Result<T, SpeedyError> + Send + 'static,
        F: FnOnce(Response<T>) + Send + 'static,
    {
        let delegate = self.delegate.clone();
        let request = self.request.clone();
        self.delegate.enqueue(Box::new(move || {
            let data = delegate.data();
            let response = delegate.response();
            let result = match delegate.error() {
                Some(error) => Err(error),
                None => serializer(data.as_deref(), response.as_ref()),
            };
            completion(Response {
                request,
                response,
                data,
                result,
            });
        }));
        self
    }

    pub fn on_data<F>(&self, completion: F) -> &Self
    where
        F: FnOnce(Response<Vec<u8>>) + Send + 'static,
    {
        self.on_response(response::serialize_data, completion)
    }

    pub fn on_string<F>(&self, completion: F) -> &Self
    where
        F: FnOnce(Response<String>) + Send + 'static,
    {
        self.on_response(response::serialize_string, completion)
    }

    pub fn on_json<F>(&self, completion: F) -> &Self
    where
        F: FnOnce(Response<Value>) + Send + 'static,
    {
        self.on_response(response::serialize_json, completion)
    }

    /// Deserializes the JSON body into `T`.
    pub fn on_decodable<T, F>(&self, completion: F) -> &Self
    where
        T: DeserializeOwned + 'static,
        F: FnOnce(Response<T>) + Send + 'static,
    {
        self.on_response(response::serialize_decodable::<T>, completion)
    }

    /// Queues a check of the response. A failed check becomes the task's
    /// error for every later subscriber. Checks are skipped when the task
    /// already failed or received no response.
    pub fn validate<V>(&self, validation: V) -> &Self
    where
        V: FnOnce(&ResponseHead) -> Result<(), SpeedyError> + Send + 'static,
    {
        let delegate = self.delegate.clone();
        self.delegate.enqueue(Box::new(move || {
            if delegate.error().is_some() {
                return;
            }
            let Some(response) = delegate.response() else {
                return;
            };
            if let Err(e) = validation(&response) {
                info!("{} validation failed: {}", delegate.task(), e);
                delegate.record_error(e);
            }
        }));
        self
    }

    /// Fails the task unless its status code lies in `acceptable`.
    pub fn validate_status_code(&self, acceptable: Range<u16>) -> &Self {
        self.validate(move |response| {
            if acceptable.contains(&response.status()) {
                Ok(())
            } else {
                Err(SpeedyError::new(
                    ErrorKind::StatusCodeValidationFailed,
                    format!("Response status code was unacceptable: {}", response.status()),
                ))
            }
        })
    }

    /// Fails the task unless its content type matches one of `acceptable`,
    /// which may use `*` wildcards such as `text/*`.
    pub fn validate_content_type(&self, acceptable: &[&str]) -> &Self {
        let acceptable: Vec<String> = acceptable.iter().map(|s| s.to_ascii_lowercase()).collect();
        self.validate(move |response| {
            let accepted = match response.mime_type() {
                Some(mime) => acceptable.iter().any(|pattern| mime_matches(pattern, &mime)),
                None => acceptable.iter().any(|pattern| pattern == "*/*"),
            };
            if accepted {
                Ok(())
            } else {
                Err(SpeedyError::new(
                    ErrorKind::ContentTypeValidationFailed,
                    format!(
                        "Response content type {:?} was unacceptable: {}",
                        response.mime_type().unwrap_or_default(),
                        acceptable.join(", ")
                    ),
                ))
            }
        })
    }

    /// Status in `200..300` and, when the request set `Accept`, a content
    /// type it accepts.
    pub fn validate_default(&self) -> &Self {
        self.validate_status_code(200..300);
        let accept = self
            .request
            .as_ref()
            .and_then(|request| request.header("Accept"))
            .map(|accept| {
                accept
                    .split(',')
                    .map(|item| item.split(';').next().unwrap_or("").trim().to_string())
                    .filter(|item| !item.is_empty())
                    .collect::<Vec<_>>()
            });
        if let Some(accept) = accept {
            let accept: Vec<&str> = accept.iter().map(String::as_str).collect();
            self.validate_content_type(&accept);
        }
        self
    }
}

fn mime_matches(pattern: &str, mime: &str) -> bool {
    if pattern == "*/*" || pattern == "*" {
        return true;
    }
    let (pattern_type, pattern_sub) = pattern.split_once('/').unwrap_or((pattern, ""));
    let (mime_type, mime_sub) = mime.split_once('/').unwrap_or((mime, ""));
    pattern_type == mime_type && (pattern_sub == "*" || pattern_sub == mime_sub)
}

impl Display for Request {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.request {
            Some(request) => write!(f, "{} {}", request.method(), request.url())?,
            None => write!(f, "{}", self.task)?,
        }
        if let Some(response) = self.response() {
            write!(f, " ({})", response.status())?;
        }
        Ok(())
    }
}
