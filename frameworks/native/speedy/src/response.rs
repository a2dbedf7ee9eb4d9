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

//! Results delivered to response subscribers, and the serializers that
//! produce them.

use serde::de::DeserializeOwned;
use serde_json::Value;
use transfer_rs::request::HttpRequest;
use transfer_rs::response::ResponseHead;

use crate::error::{ErrorKind, SpeedyError};

/// Everything known about a finished task, plus its serialized result.
#[derive(Clone, Debug)]
pub struct Response<T> {
    /// The request as originally issued.
    pub request: Option<HttpRequest>,
    pub response: Option<ResponseHead>,
    /// Raw bytes received, if any.
    pub data: Option<Vec<u8>>,
    pub result: Result<T, SpeedyError>,
}

impl<T> Response<T> {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    pub fn value(&self) -> Option<&T> {
        self.result.as_ref().ok()
    }

    pub fn error(&self) -> Option<&SpeedyError> {
        self.result.as_ref().err()
    }

    /// Status code of the response, if one arrived.
    pub fn status(&self) -> Option<u16> {
        self.response.as_ref().map(ResponseHead::status)
    }
}

fn no_content(response: Option<&ResponseHead>) -> bool {
    response.is_some_and(|response| response.status() == 204)
}

/// Returns the bytes as they are. A 204 without a body is an empty success.
pub fn serialize_data(data: Option<&[u8]>, response: Option<&ResponseHead>) -> Result<Vec<u8>, SpeedyError> {
    match data {
        Some(data) => Ok(data.to_vec()),
        None if no_content(response) => Ok(Vec::new()),
        None => Err(SpeedyError::new(
            ErrorKind::DataSerializationFailed,
            "Data could not be serialized. Input data was nil.",
        )),
    }
}

/// Decodes the bytes as UTF-8.
pub fn serialize_string(data: Option<&[u8]>, response: Option<&ResponseHead>) -> Result<String, SpeedyError> {
    match data {
        Some(data) => String::from_utf8(data.to_vec()).map_err(|e| {
            SpeedyError::new(
                ErrorKind::StringSerializationFailed,
                format!("String could not be serialized with encoding UTF-8: {}", e),
            )
        }),
        None if no_content(response) => Ok(String::new()),
        None => Err(SpeedyError::new(
            ErrorKind::StringSerializationFailed,
            "String could not be serialized. Input data was nil.",
        )),
    }
}

/// Parses the bytes as JSON. A 204 without a body yields `null`.
pub fn serialize_json(data: Option<&[u8]>, response: Option<&ResponseHead>) -> Result<Value, SpeedyError> {
    match data {
        Some(data) if !data.is_empty() => serde_json::from_slice(data)
            .map_err(|e| SpeedyError::new(ErrorKind::JsonSerializationFailed, e.to_string())),
        _ if no_content(response) => Ok(Value::Null),
        _ => Err(SpeedyError::new(
            ErrorKind::JsonSerializationFailed,
            "JSON could not be serialized. Input data was nil or zero length.",
        )),
    }
}

/// Deserializes the bytes as JSON into `T`.
pub fn serialize_decodable<T: DeserializeOwned>(
    data: Option<&[u8]>,
    _response: Option<&ResponseHead>,
) -> Result<T, SpeedyError> {
    match data {
        Some(data) if !data.is_empty() => serde_json::from_slice(data)
            .map_err(|e| SpeedyError::new(ErrorKind::JsonSerializationFailed, e.to_string())),
        _ => Err(SpeedyError::new(
            ErrorKind::JsonSerializationFailed,
            "JSON could not be serialized. Input data was nil or zero length.",
        )),
    }
}
