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

//! Transfer engines and the event contract they report through.
//!
//! This crate describes HTTP tasks ([`task::TaskSource`]), the engine that
//! runs them ([`engine::TransferEngine`]) and the observer receiving their
//! lifecycle events ([`engine::SessionEvents`]). With the `reqwest` feature
//! it also ships [`ReqwestEngine`], a blocking engine running one worker
//! thread per task.

#![warn(missing_docs)]
#![allow(missing_docs, clippy::new_without_default)]

#[macro_use]
extern crate speedy_utils;

#[macro_use]
mod macros;

pub mod engine;
pub mod error;
pub mod request;
pub mod response;
pub mod stream;
pub mod task;

cfg_reqwest! {
    mod reqwest_engine;
    pub use reqwest_engine::ReqwestEngine;
}

pub use engine::{
    AuthChallenge, ChallengeDisposition, Credential, EngineConfig, ResponseDisposition,
    SessionEvents, TransferEngine, UNKNOWN_LENGTH,
};
pub use error::{TransferError, TransferErrorCode};
pub use request::{HttpRequest, Method};
pub use response::ResponseHead;
pub use speedy_utils::task_id::TaskId;
pub use stream::{ByteStream, FileStream, MemoryStream, ReaderStream, StreamReader};
pub use task::{TaskKind, TaskSource, TaskStatus};
