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

//! Parameter encoding for requests.
//!
//! Parameters are a JSON object. Nested objects flatten to `key[nested]`
//! and arrays to `key[]`, the form most web frameworks decode back into
//! structures.

use serde_json::{Map, Value};
use transfer_rs::request::{HttpRequest, Method};

use crate::error::{ErrorKind, SpeedyError};

/// Request parameters, keyed by name.
pub type Parameters = Map<String, Value>;

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded; charset=utf-8";
const JSON_CONTENT_TYPE: &str = "application/json";

/// How parameters are applied to a request.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ParameterEncoding {
    /// Query string for `GET`, `HEAD` and `DELETE`, form body otherwise.
    #[default]
    Url,
    /// Always the query string.
    UrlInQuery,
    /// JSON body.
    Json,
}

impl ParameterEncoding {
    /// Returns a copy of `request` carrying `parameters`.
    pub fn encode(
        &self,
        request: &HttpRequest,
        parameters: Option<&Parameters>,
    ) -> Result<HttpRequest, SpeedyError> {
        let mut request = request.clone();
        let Some(parameters) = parameters else {
            return Ok(request);
        };

        match self {
            ParameterEncoding::Url | ParameterEncoding::UrlInQuery => {
                if parameters.is_empty() {
                    return Ok(request);
                }
                let query = query_string(parameters);
                let in_url = *self == ParameterEncoding::UrlInQuery
                    || matches!(request.method(), Method::Get | Method::Head | Method::Delete);
                if in_url {
                    let url = append_query(request.url(), &query);
                    request.set_url(url);
                } else {
                    if request.header("Content-Type").is_none() {
                        request.set_header("Content-Type", FORM_CONTENT_TYPE);
                    }
                    request.set_body(query.into_bytes());
                }
            }
            ParameterEncoding::Json => {
                let body = serde_json::to_vec(parameters)
                    .map_err(|e| SpeedyError::new(ErrorKind::JsonSerializationFailed, e.to_string()))?;
                if request.header("Content-Type").is_none() {
                    request.set_header("Content-Type", JSON_CONTENT_TYPE);
                }
                request.set_body(body);
            }
        }
        Ok(request)
    }
}

/// Flattens `parameters` into escaped key/value pairs, keys in sorted order.
pub fn query(parameters: &Parameters) -> Vec<(String, String)> {
    let mut components = Vec::new();
    for (key, value) in parameters {
        query_components(key, value, &mut components);
    }
    components
}

/// Joins [`query`] into `k=v&k=v`.
pub fn query_string(parameters: &Parameters) -> String {
    query(parameters)
        .into_iter()
        .map(|(key, value)| format!("{}={}", key, value))
        .collect::<Vec<_>>()
        .join("&")
}

fn query_components(key: &str, value: &Value, components: &mut Vec<(String, String)>) {
    match value {
        Value::Object(map) => {
            for (nested, value) in map {
                query_components(&format!("{}[{}]", key, nested), value, components);
            }
        }
        Value::Array(values) => {
            for value in values {
                query_components(&format!("{}[]", key), value, components);
            }
        }
        scalar => components.push((percent_escape(key), percent_escape(&scalar_string(scalar)))),
    }
}

/// Textual form of a scalar parameter. Booleans become `1` and `0`.
fn scalar_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Bool(true) => "1".to_string(),
        Value::Bool(false) => "0".to_string(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Percent-encodes everything except ASCII letters, digits and `-._~`.
///
/// # Examples
///
/// ```
/// use speedy::encoding::percent_escape;
///
/// assert_eq!(percent_escape("a b&c=d"), "a%20b%26c%3Dd");
/// ```
pub fn percent_escape(s: &str) -> String {
    let mut escaped = String::with_capacity(s.len());
    for byte in s.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' => {
                escaped.push(byte as char)
            }
            _ => escaped.push_str(&format!("%{:02X}", byte)),
        }
    }
    escaped
}

fn append_query(url: &str, query: &str) -> String {
    let (base, fragment) = match url.find('#') {
        Some(index) => url.split_at(index),
        None => (url, ""),
    };
    let separator = match base.find('?') {
        None => "?",
        Some(index) if index + 1 == base.len() || base.ends_with('&') => "",
        Some(_) => "&",
    };
    format!("{}{}{}{}", base, separator, query, fragment)
}
