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

//! Entry point creating requests on a transfer engine.
//!
//! The [`Manager`] turns request descriptions into engine tasks, wraps each
//! task in a [`Request`] and registers the request's delegate with the
//! session before anything can run.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use transfer_rs::engine::TransferEngine;
use transfer_rs::request::HttpRequest;
use transfer_rs::stream::ByteStream;
use transfer_rs::task::TaskSource;

use crate::delegate::BodyStreamFactory;
use crate::encoding::{ParameterEncoding, Parameters};
use crate::error::SpeedyError;
use crate::multipart::MultipartFormData;
use crate::request::Request;
use crate::session::SessionDelegate;

/// Multipart bodies below this size are encoded in memory.
pub const MULTIPART_FORM_DATA_ENCODING_MEMORY_THRESHOLD: u64 = 10 * 1024 * 1024;

/// Settings of a [`Manager`].
#[derive(Clone, Debug)]
pub struct ManagerConfig {
    /// Default encoding threshold of multipart uploads.
    pub multipart_memory_threshold: u64,
    /// Where multipart bodies too large for memory are written.
    pub temp_dir: PathBuf,
    /// Forces multipart bodies to files, as background sessions need.
    pub background_session: bool,
    /// Resume every request right after creating it.
    pub start_requests_immediately: bool,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            multipart_memory_threshold: MULTIPART_FORM_DATA_ENCODING_MEMORY_THRESHOLD,
            temp_dir: std::env::temp_dir()
                .join("speedy.manager")
                .join("multipart.form.data"),
            background_session: false,
            start_requests_immediately: true,
        }
    }
}

/// Builder for [`ManagerConfig`].
pub struct ManagerConfigBuilder {
    inner: ManagerConfig,
}

impl ManagerConfigBuilder {
    /// Creates a new builder with the default configuration.
    pub fn new() -> Self {
        Self {
            inner: ManagerConfig::default(),
        }
    }

    /// Sets the size below which multipart bodies stay in memory.
    pub fn multipart_memory_threshold(&mut self, threshold: u64) -> &mut Self {
        self.inner.multipart_memory_threshold = threshold;
        self
    }

    /// Sets the directory receiving multipart body files.
    pub fn temp_dir(&mut self, dir: PathBuf) -> &mut Self {
        self.inner.temp_dir = dir;
        self
    }

    pub fn background_session(&mut self, background: bool) -> &mut Self {
        self.inner.background_session = background;
        self
    }

    /// Sets whether requests are resumed on creation.
    pub fn start_requests_immediately(&mut self, start: bool) -> &mut Self {
        self.inner.start_requests_immediately = start;
        self
    }

    pub fn build(&self) -> ManagerConfig {
        self.inner.clone()
    }
}

/// Creates and tracks requests on one engine.
#[derive(Clone)]
pub struct Manager {
    engine: Arc<dyn TransferEngine>,
    session: Arc<SessionDelegate>,
    config: ManagerConfig,
}

impl Manager {
    /// Creates a manager over `engine`, which must report its events to
    /// `session`.
    pub fn new(engine: Arc<dyn TransferEngine>, session: Arc<SessionDelegate>, config: ManagerConfig) -> Self {
        Self {
            engine,
            session,
            config,
        }
    }

    pub fn engine(&self) -> &Arc<dyn TransferEngine> {
        &self.engine
    }

    pub fn session(&self) -> &Arc<SessionDelegate> {
        &self.session
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    /// Creates a data request.
    pub fn request(&self, request: HttpRequest) -> Result<Request, SpeedyError> {
        self.start(TaskSource::Data(request.clone()), request, |_| {})
    }

    /// Creates a data request carrying `parameters`.
    pub fn request_with_parameters(
        &self,
        request: HttpRequest,
        parameters: Option<&Parameters>,
        encoding: ParameterEncoding,
    ) -> Result<Request, SpeedyError> {
        let request = encoding.encode(&request, parameters)?;
        self.request(request)
    }

    pub fn upload_data(&self, request: HttpRequest, data: Vec<u8>) -> Result<Request, SpeedyError> {
        self.start(TaskSource::UploadData(request.clone(), data), request, |_| {})
    }

    pub fn upload_file(&self, request: HttpRequest, path: PathBuf) -> Result<Request, SpeedyError> {
        self.start(TaskSource::UploadFile(request.clone(), path), request, |_| {})
    }

    /// Uploads a body read from a stream `make_stream` builds.
    ///
    /// The first stream goes out with the task. `make_stream` is called
    /// again whenever the engine has to resend the body, for example after a
    /// 307 or 308 redirect.
    pub fn upload_stream<F>(&self, request: HttpRequest, make_stream: F) -> Result<Request, SpeedyError>
    where
        F: Fn() -> Box<dyn ByteStream> + Send + Sync + 'static,
    {
        let factory: BodyStreamFactory = Arc::new(make_stream);
        let source = TaskSource::UploadStream(request.clone(), factory());
        self.start(source, request, move |created| {
            created.delegate().set_body_stream(factory);
        })
    }

    /// Builds a multipart form on a background thread and uploads it.
    ///
    /// The body is encoded in memory when its content length is below
    /// `threshold` (the configured default when `None`) and the session is
    /// not a background one; otherwise it is written to a uniquely named
    /// file under the configured temp directory, which is removed once the
    /// upload completes. `completion` receives the created request or the
    /// encoding error.
    pub fn upload_multipart<B, C>(
        &self,
        request: HttpRequest,
        threshold: Option<u64>,
        build: B,
        completion: C,
    ) -> JoinHandle<()>
    where
        B: FnOnce(&mut MultipartFormData) + Send + 'static,
        C: FnOnce(Result<Request, SpeedyError>) + Send + 'static,
    {
        let manager = self.clone();
        let threshold = threshold.unwrap_or(self.config.multipart_memory_threshold);
        thread::spawn(move || {
            let mut form = MultipartFormData::new();
            build(&mut form);
            completion(manager.encode_and_upload(request, form, threshold));
        })
    }

    fn encode_and_upload(
        &self,
        mut request: HttpRequest,
        mut form: MultipartFormData,
        threshold: u64,
    ) -> Result<Request, SpeedyError> {
        request.set_header("Content-Type", &form.content_type());
        let content_length = form.content_length();
        let background = self.config.background_session || self.engine.is_background();

        if content_length < threshold && !background {
            debug!("multipart body of {} bytes encoded in memory", content_length);
            let data = form.encode()?;
            return self.upload_data(request, data);
        }

        fs::create_dir_all(&self.config.temp_dir)?;
        let path = self.config.temp_dir.join(format!(
            "{:016x}{:016x}",
            rand::random::<u64>(),
            rand::random::<u64>()
        ));
        debug!(
            "multipart body of {} bytes encoded to {}",
            content_length,
            path.display()
        );
        if let Err(e) = form.encode_to_path(&path) {
            let _ = fs::remove_file(&path);
            return Err(e);
        }
        let created = self.upload_file(request, path.clone())?;
        created.delegate().enqueue(Box::new(move || {
            if let Err(e) = fs::remove_file(&path) {
                error!("multipart body {} not removed: {}", path.display(), e);
            }
        }));
        Ok(created)
    }

    /// Downloads into `destination`, which the finished file is moved to.
    pub fn download(&self, request: HttpRequest, destination: PathBuf) -> Result<Request, SpeedyError> {
        self.start(TaskSource::Download(request.clone()), request, move |created| {
            created.delegate().set_destination(destination);
        })
    }

    /// Continues a download from the bytes already in `partial`.
    pub fn download_resuming(
        &self,
        request: HttpRequest,
        partial: PathBuf,
        destination: PathBuf,
    ) -> Result<Request, SpeedyError> {
        let source = TaskSource::ResumeDownload {
            request: request.clone(),
            partial,
        };
        self.start(source, request, move |created| {
            created.delegate().set_destination(destination);
        })
    }

    fn start<F>(&self, source: TaskSource, request: HttpRequest, configure: F) -> Result<Request, SpeedyError>
    where
        F: FnOnce(&Request),
    {
        let task = self.engine.create_task(source)?;
        let created = Request::new(self.engine.clone(), task, Some(request));
        configure(&created);
        self.session.register(created.delegate().clone());
        info!("{} created for {}", task, created);
        if self.config.start_requests_immediately {
            created.resume();
        }
        Ok(created)
    }
}

cfg_reqwest! {
    use transfer_rs::engine::EngineConfig;
    use transfer_rs::ReqwestEngine;

    impl Manager {
        /// Creates a manager over a new [`ReqwestEngine`] reporting to a new
        /// session.
        pub fn with_reqwest(engine_config: EngineConfig, config: ManagerConfig) -> Result<Self, SpeedyError> {
            let session = Arc::new(SessionDelegate::new());
            let engine = ReqwestEngine::new(engine_config, session.clone())?;
            Ok(Self::new(Arc::new(engine), session, config))
        }
    }
}
