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

//! HTTP convenience layer over a transfer engine.
//!
//! This library builds `multipart/form-data` bodies, turns engine events
//! into per-task state through a [`SessionDelegate`] and a [`TaskDelegate`]
//! per task, and hands callers a [`Request`] they can control and subscribe
//! to. Subscribers run once, in order, after their task completes.

#![allow(missing_docs, clippy::new_without_default)]

// Import logging macros from speedy_utils
#[macro_use]
extern crate speedy_utils;

#[macro_use]
mod macros;

pub mod delegate;
pub mod encoding;
pub mod error;
pub mod manager;
pub mod multipart;
pub mod request;
pub mod response;
pub mod session;

pub use delegate::{DelegateKind, Progress, TaskDelegate};
pub use encoding::{ParameterEncoding, Parameters};
pub use error::{ErrorKind, SpeedyError, ERROR_DOMAIN};
pub use manager::{Manager, ManagerConfig, ManagerConfigBuilder};
pub use multipart::MultipartFormData;
pub use request::Request;
pub use response::Response;
pub use session::SessionDelegate;
