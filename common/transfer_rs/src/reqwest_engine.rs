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

//! Blocking transfer engine built on `reqwest`.
//!
//! Each task runs on its own worker thread once resumed. Redirects and
//! authentication challenges are handled here rather than inside the HTTP
//! client so that they can be routed through [`SessionEvents`]. Between
//! chunks the worker checks whether it was suspended or cancelled.

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Cursor, Read, Write};
use std::path::PathBuf;
use std::sync::{Arc, Condvar, Mutex};
use std::thread;

use reqwest::blocking::{Body, Client, Response};
use reqwest::redirect::Policy;
use speedy_utils::task_id::TaskId;

use crate::engine::{
    AuthChallenge, ChallengeDisposition, Credential, EngineConfig, ResponseDisposition,
    SessionEvents, TransferEngine, UNKNOWN_LENGTH,
};
use crate::error::{TransferError, TransferErrorCode};
use crate::request::{HttpRequest, Method};
use crate::response::ResponseHead;
use crate::stream::{ByteStream, StreamReader};
use crate::task::{TaskKind, TaskSource, TaskStatus};

const MAX_AUTH_ATTEMPTS: u32 = 3;

struct Control {
    status: TaskStatus,
    started: bool,
    cancelled: bool,
}

struct EngineTask {
    id: TaskId,
    kind: TaskKind,
    source: Mutex<Option<TaskSource>>,
    control: Mutex<Control>,
    cond: Condvar,
}

impl EngineTask {
    fn new(id: TaskId, source: TaskSource) -> Self {
        Self {
            id,
            kind: source.kind(),
            source: Mutex::new(Some(source)),
            control: Mutex::new(Control {
                status: TaskStatus::Suspended,
                started: false,
                cancelled: false,
            }),
            cond: Condvar::new(),
        }
    }

    /// Blocks while the task is suspended. Fails once it is cancelled.
    fn checkpoint(&self) -> Result<(), TransferError> {
        let mut control = self.control.lock().unwrap();
        loop {
            if control.cancelled {
                return Err(TransferError::cancelled());
            }
            if control.status != TaskStatus::Suspended {
                return Ok(());
            }
            control = self.cond.wait(control).unwrap();
        }
    }

    fn is_cancelled(&self) -> bool {
        self.control.lock().unwrap().cancelled
    }
}

enum BodySource {
    /// Whatever in-memory body the request itself carries.
    Request,
    Bytes(Arc<[u8]>),
    File(PathBuf),
    /// The first send takes the initial stream; resends ask
    /// `need_new_body_stream` for a replacement.
    Stream(Option<Box<dyn ByteStream>>),
}

struct Inner {
    client: Client,
    config: EngineConfig,
    events: Arc<dyn SessionEvents>,
    tasks: Mutex<HashMap<TaskId, Arc<EngineTask>>>,
}

/// A [`TransferEngine`] running every task on a dedicated thread with a
/// blocking `reqwest` client.
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
///
/// use transfer_rs::{EngineConfig, HttpRequest, ReqwestEngine, SessionEvents, TaskSource, TransferEngine};
///
/// struct Quiet;
/// impl SessionEvents for Quiet {}
///
/// let engine = ReqwestEngine::new(EngineConfig::default(), Arc::new(Quiet)).unwrap();
/// let task = engine
///     .create_task(TaskSource::Data(HttpRequest::get("http://127.0.0.1/")))
///     .unwrap();
/// engine.resume(task);
/// ```
pub struct ReqwestEngine {
    inner: Arc<Inner>,
}

impl ReqwestEngine {
    /// Creates an engine reporting every task to `events`.
    pub fn new(config: EngineConfig, events: Arc<dyn SessionEvents>) -> Result<Self, TransferError> {
        let mut builder = Client::builder()
            .redirect(Policy::none())
            .timeout(config.timeout);
        if let Some(connect_timeout) = config.connect_timeout {
            builder = builder.connect_timeout(connect_timeout);
        }
        let client = builder
            .build()
            .map_err(|e| TransferError::new(TransferErrorCode::Unknown, e.to_string()))?;
        Ok(Self {
            inner: Arc::new(Inner {
                client,
                config,
                events,
                tasks: Mutex::new(HashMap::new()),
            }),
        })
    }

    /// Cancels every live task and reports the session as invalid.
    pub fn invalidate_and_cancel(&self) {
        let tasks: Vec<TaskId> = self.inner.tasks.lock().unwrap().keys().copied().collect();
        for task in tasks {
            self.cancel(task);
        }
        info!("transfer session invalidated");
        self.inner.events.did_become_invalid(None);
    }

    fn spawn(&self, task: Arc<EngineTask>) {
        let inner = self.inner.clone();
        let worker = task.clone();
        let spawned = thread::Builder::new()
            .name(format!("speedy-{}", task.id))
            .spawn(move || inner.run(worker));
        if let Err(e) = spawned {
            error!("{} worker spawn failed: {}", task.id, e);
            self.inner.finish(
                &task,
                Some(TransferError::new(TransferErrorCode::Unknown, e.to_string())),
            );
        }
    }
}

impl TransferEngine for ReqwestEngine {
    fn create_task(&self, source: TaskSource) -> Result<TaskId, TransferError> {
        let id = TaskId::next();
        debug!(
            "{} created, {:?} {}",
            id,
            source.kind(),
            source.request().url()
        );
        let task = Arc::new(EngineTask::new(id, source));
        self.inner.tasks.lock().unwrap().insert(id, task);
        Ok(id)
    }

    fn task_kind(&self, task: TaskId) -> Option<TaskKind> {
        self.inner.task(task).map(|task| task.kind)
    }

    fn status(&self, task: TaskId) -> Option<TaskStatus> {
        self.inner
            .task(task)
            .map(|task| task.control.lock().unwrap().status)
    }

    fn resume(&self, task: TaskId) {
        let Some(task) = self.inner.task(task) else {
            return;
        };
        let mut control = task.control.lock().unwrap();
        if control.cancelled || control.status == TaskStatus::Completed {
            return;
        }
        control.status = TaskStatus::Running;
        task.cond.notify_all();
        if !control.started {
            control.started = true;
            drop(control);
            self.spawn(task);
        }
    }

    fn suspend(&self, task: TaskId) {
        let Some(task) = self.inner.task(task) else {
            return;
        };
        let mut control = task.control.lock().unwrap();
        if control.status == TaskStatus::Running {
            debug!("{} suspended", task.id);
            control.status = TaskStatus::Suspended;
        }
    }

    fn cancel(&self, task: TaskId) {
        let Some(task) = self.inner.task(task) else {
            return;
        };
        let mut control = task.control.lock().unwrap();
        if control.cancelled || control.status == TaskStatus::Completed {
            return;
        }
        debug!("{} cancel requested", task.id);
        control.cancelled = true;
        control.status = TaskStatus::Canceling;
        task.cond.notify_all();
        // A task that never ran still owes its observer a completion.
        if !control.started {
            control.started = true;
            drop(control);
            self.spawn(task);
        }
    }

    fn is_background(&self) -> bool {
        self.inner.config.background
    }
}

impl Inner {
    fn task(&self, id: TaskId) -> Option<Arc<EngineTask>> {
        self.tasks.lock().unwrap().get(&id).cloned()
    }

    fn run(&self, task: Arc<EngineTask>) {
        let result = task.checkpoint().and_then(|_| self.perform(&task));
        self.finish(&task, result.err());
    }

    fn finish(&self, task: &Arc<EngineTask>, error: Option<TransferError>) {
        task.control.lock().unwrap().status = TaskStatus::Completed;
        self.tasks.lock().unwrap().remove(&task.id);
        match &error {
            None => info!("{} completed", task.id),
            Some(e) if e.is_cancelled() => info!("{} cancelled", task.id),
            Some(e) => error!("{} failed: {}", task.id, e),
        }
        self.events.did_complete(task.id, error);
    }

    fn perform(&self, task: &Arc<EngineTask>) -> Result<(), TransferError> {
        let source = task.source.lock().unwrap().take().ok_or_else(|| {
            TransferError::new(TransferErrorCode::Unknown, "task source already consumed")
        })?;
        match source {
            TaskSource::Data(request) => self.run_data(task, &request, BodySource::Request),
            TaskSource::UploadData(request, data) => {
                self.run_data(task, &request, BodySource::Bytes(Arc::from(data)))
            }
            TaskSource::UploadFile(request, path) => {
                self.run_data(task, &request, BodySource::File(path))
            }
            TaskSource::UploadStream(request, stream) => {
                self.run_data(task, &request, BodySource::Stream(Some(stream)))
            }
            TaskSource::Download(request) => self.run_download(task, &request, None),
            TaskSource::ResumeDownload { request, partial } => {
                self.run_download(task, &request, Some(partial))
            }
        }
    }

    fn run_data(
        &self,
        task: &Arc<EngineTask>,
        request: &HttpRequest,
        mut body: BodySource,
    ) -> Result<(), TransferError> {
        let (mut response, head) = self.execute(task, request, &mut body)?;
        if self.events.did_receive_response(task.id, &head) == ResponseDisposition::Cancel {
            return Err(TransferError::cancelled());
        }
        let mut buf = vec![0; self.config.chunk_size.max(1)];
        loop {
            task.checkpoint()?;
            let n = read_response(task, &mut response, &mut buf)?;
            if n == 0 {
                return Ok(());
            }
            self.events.did_receive_data(task.id, &buf[..n]);
        }
    }

    fn run_download(
        &self,
        task: &Arc<EngineTask>,
        request: &HttpRequest,
        partial: Option<PathBuf>,
    ) -> Result<(), TransferError> {
        let offset = partial
            .as_ref()
            .and_then(|path| fs::metadata(path).ok())
            .map(|meta| meta.len())
            .unwrap_or(0);
        let mut request = request.clone();
        if offset > 0 {
            request.set_header("Range", &format!("bytes={}-", offset));
        }

        let (mut response, head) = self.execute(task, &request, &mut BodySource::Request)?;
        if self.events.did_receive_response(task.id, &head) == ResponseDisposition::Cancel {
            return Err(TransferError::cancelled());
        }
        let content_length = head.expected_content_length().map(|len| len as i64);
        let engine_owned = partial.is_none();

        let (path, mut file, mut written, total) = match partial {
            Some(path) if offset > 0 && head.status() == 206 => {
                let total = content_length
                    .map(|len| len + offset as i64)
                    .unwrap_or(UNKNOWN_LENGTH);
                let file = OpenOptions::new()
                    .append(true)
                    .open(&path)
                    .map_err(|e| TransferError::from_io(TransferErrorCode::CannotOpenFile, &e))?;
                self.events.did_resume_at_offset(task.id, offset as i64, total);
                (path, file, offset as i64, total)
            }
            Some(path) => {
                // The server ignored the range, so the download starts over.
                let total = content_length.unwrap_or(UNKNOWN_LENGTH);
                let file = File::create(&path)
                    .map_err(|e| TransferError::from_io(TransferErrorCode::CannotCreateFile, &e))?;
                self.events.did_resume_at_offset(task.id, 0, total);
                (path, file, 0, total)
            }
            None => {
                let path = self.config.download_dir.join(format!(
                    "speedy-{}-{:016x}.download",
                    task.id.raw(),
                    rand::random::<u64>()
                ));
                let file = File::create(&path)
                    .map_err(|e| TransferError::from_io(TransferErrorCode::CannotCreateFile, &e))?;
                (path, file, 0, content_length.unwrap_or(UNKNOWN_LENGTH))
            }
        };

        let mut buf = vec![0; self.config.chunk_size.max(1)];
        let result = loop {
            if let Err(e) = task.checkpoint() {
                break Err(e);
            }
            let n = match read_response(task, &mut response, &mut buf) {
                Ok(0) => break file.flush().map_err(|e| {
                    TransferError::from_io(TransferErrorCode::CannotWriteToFile, &e)
                }),
                Ok(n) => n,
                Err(e) => break Err(e),
            };
            if let Err(e) = file.write_all(&buf[..n]) {
                break Err(TransferError::from_io(TransferErrorCode::CannotWriteToFile, &e));
            }
            written += n as i64;
            self.events
                .did_write_data(task.id, n as i64, written, total);
        };
        drop(file);

        match result {
            Ok(()) => {
                self.events.did_finish_downloading(task.id, &path);
                if path.exists() {
                    let _ = fs::remove_file(&path);
                }
                Ok(())
            }
            Err(e) => {
                // A caller's partial file stays behind so that it can resume again.
                if engine_owned {
                    let _ = fs::remove_file(&path);
                }
                Err(e)
            }
        }
    }

    /// Sends `request`, following redirects and answering challenges until
    /// a final response arrives.
    fn execute(
        &self,
        task: &Arc<EngineTask>,
        request: &HttpRequest,
        body: &mut BodySource,
    ) -> Result<(Response, ResponseHead), TransferError> {
        let mut current = request.clone();
        let mut send_body = true;
        let mut redirects = 0;
        let mut failures = 0;
        let mut credential: Option<Credential> = None;

        loop {
            task.checkpoint()?;
            let payload = if send_body {
                self.make_body(task, &current, body)?
            } else {
                None
            };
            let response = self.send(task, &current, payload, credential.as_ref())?;
            let head = response_head(&response);
            let status = head.status();

            if matches!(status, 301 | 302 | 303 | 307 | 308) {
                if let Some(location) = head.header("location") {
                    let next = redirect_request(&current, &response, location, status)?;
                    if let Some(next) = self.events.will_perform_redirection(task.id, &head, next) {
                        redirects += 1;
                        if redirects > self.config.max_redirects {
                            return Err(TransferError::new(
                                TransferErrorCode::HttpTooManyRedirects,
                                format!("more than {} redirects", self.config.max_redirects),
                            ));
                        }
                        debug!("{} redirected to {}", task.id, next.url());
                        if next.method() != current.method() {
                            send_body = false;
                        }
                        current = next;
                        credential = None;
                        continue;
                    }
                }
            } else if status == 401 {
                if let Some(header) = head.header("www-authenticate") {
                    let host = response.url().host_str().unwrap_or("");
                    let challenge = AuthChallenge::parse(host, header, failures);
                    match self.events.did_receive_challenge(task.id, &challenge) {
                        ChallengeDisposition::UseCredential(c) if failures < MAX_AUTH_ATTEMPTS => {
                            failures += 1;
                            credential = Some(c);
                            continue;
                        }
                        ChallengeDisposition::CancelChallenge => {
                            return Err(TransferError::new(
                                TransferErrorCode::UserCancelledAuthentication,
                                format!("challenge from {} cancelled", challenge.host),
                            ));
                        }
                        _ => {}
                    }
                }
            }
            return Ok((response, head));
        }
    }

    fn make_body(
        &self,
        task: &Arc<EngineTask>,
        request: &HttpRequest,
        source: &mut BodySource,
    ) -> Result<Option<Body>, TransferError> {
        let body = match source {
            BodySource::Request => request.body().map(|bytes| Body::from(bytes.to_vec())),
            BodySource::Bytes(bytes) => {
                let len = bytes.len() as u64;
                let reader = self.progress_reader(task, Cursor::new(bytes.clone()), Some(len));
                Some(Body::sized(reader, len))
            }
            BodySource::File(path) => {
                let file = File::open(path).map_err(|e| {
                    let code = if e.kind() == io::ErrorKind::NotFound {
                        TransferErrorCode::FileDoesNotExist
                    } else {
                        TransferErrorCode::CannotOpenFile
                    };
                    TransferError::from_io(code, &e)
                })?;
                let len = file
                    .metadata()
                    .map_err(|e| TransferError::from_io(TransferErrorCode::CannotOpenFile, &e))?
                    .len();
                let reader = self.progress_reader(task, file, Some(len));
                Some(Body::sized(reader, len))
            }
            BodySource::Stream(initial) => {
                let stream = match initial.take() {
                    Some(stream) => stream,
                    None => self.events.need_new_body_stream(task.id).ok_or_else(|| {
                        TransferError::new(
                            TransferErrorCode::RequestBodyStreamExhausted,
                            "no replacement body stream supplied",
                        )
                    })?,
                };
                let reader = StreamReader::new(stream);
                let len = reader.known_length();
                let reader = self.progress_reader(task, reader, len);
                Some(match len {
                    Some(len) => Body::sized(reader, len),
                    None => Body::new(reader),
                })
            }
        };
        Ok(body)
    }

    fn progress_reader<R: Read>(
        &self,
        task: &Arc<EngineTask>,
        inner: R,
        len: Option<u64>,
    ) -> ProgressReader<R> {
        ProgressReader {
            inner,
            sent: 0,
            total: len.map(|len| len as i64).unwrap_or(UNKNOWN_LENGTH),
            task: task.clone(),
            events: self.events.clone(),
        }
    }

    fn send(
        &self,
        task: &Arc<EngineTask>,
        request: &HttpRequest,
        body: Option<Body>,
        credential: Option<&Credential>,
    ) -> Result<Response, TransferError> {
        let method = reqwest::Method::from_bytes(request.method().as_str().as_bytes())
            .map_err(|e| TransferError::new(TransferErrorCode::UnsupportedUrl, e.to_string()))?;
        let mut builder = self.client.request(method, request.url());
        for (key, value) in request.headers() {
            // The body decides its own length.
            if key.eq_ignore_ascii_case("content-length") {
                continue;
            }
            builder = builder.header(key.as_str(), value.as_str());
        }
        if let Some(timeout) = request.timeout() {
            builder = builder.timeout(timeout);
        }
        if let Some(credential) = credential {
            builder = builder.basic_auth(&credential.user, Some(&credential.password));
        }
        if let Some(body) = body {
            builder = builder.body(body);
        }
        builder.send().map_err(|e| {
            if task.is_cancelled() {
                TransferError::cancelled()
            } else {
                convert_error(&e)
            }
        })
    }
}

/// Wraps an upload body, reporting every chunk handed to the client.
struct ProgressReader<R> {
    inner: R,
    sent: i64,
    total: i64,
    task: Arc<EngineTask>,
    events: Arc<dyn SessionEvents>,
}

impl<R: Read> Read for ProgressReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.task
            .checkpoint()
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e.msg().to_string()))?;
        let n = self.inner.read(buf)?;
        if n > 0 {
            self.sent += n as i64;
            self.events
                .did_send_body_data(self.task.id, n as i64, self.sent, self.total);
        }
        Ok(n)
    }
}

fn read_response(
    task: &EngineTask,
    response: &mut Response,
    buf: &mut [u8],
) -> Result<usize, TransferError> {
    loop {
        match response.read(buf) {
            Ok(n) => return Ok(n),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                return Err(if task.is_cancelled() {
                    TransferError::cancelled()
                } else {
                    TransferError::from_io(TransferErrorCode::NetworkConnectionLost, &e)
                })
            }
        }
    }
}

fn response_head(response: &Response) -> ResponseHead {
    let mut head = ResponseHead::new(response.status().as_u16(), response.url().as_str());
    for (name, value) in response.headers() {
        if let Ok(value) = value.to_str() {
            head.insert_header(name.as_str(), value);
        }
    }
    head
}

fn redirect_request(
    current: &HttpRequest,
    response: &Response,
    location: &str,
    status: u16,
) -> Result<HttpRequest, TransferError> {
    let url = response
        .url()
        .join(location)
        .map_err(|e| TransferError::new(TransferErrorCode::BadUrl, e.to_string()))?;
    let mut next = current.clone();
    next.set_url(url.as_str());
    if status == 303 || (matches!(status, 301 | 302) && current.method() == Method::Post) {
        next.set_method(Method::Get);
        next.clear_body();
        next.remove_header("content-type");
    }
    Ok(next)
}

fn convert_error(e: &reqwest::Error) -> TransferError {
    let code = if e.is_timeout() {
        TransferErrorCode::TimedOut
    } else if e.is_connect() {
        TransferErrorCode::CannotConnectToHost
    } else if e.is_redirect() {
        TransferErrorCode::HttpTooManyRedirects
    } else if e.is_builder() {
        TransferErrorCode::BadUrl
    } else if e.is_decode() {
        TransferErrorCode::CannotDecodeContentData
    } else if e.is_body() || e.is_request() {
        TransferErrorCode::NetworkConnectionLost
    } else {
        TransferErrorCode::Unknown
    };
    TransferError::new(code, e.to_string())
}
