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

//! Response metadata delivered before any body bytes.

use std::collections::HashMap;

/// Status line and headers of an HTTP response.
///
/// Header names are stored lowercased.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResponseHead {
    status: u16,
    url: String,
    headers: HashMap<String, String>,
}

impl ResponseHead {
    /// Creates a response head with no headers.
    pub fn new(status: u16, url: impl Into<String>) -> Self {
        Self {
            status,
            url: url.into(),
            headers: HashMap::new(),
        }
    }

    /// Adds a header; a repeated name is joined with `", "`.
    pub fn insert_header(&mut self, key: &str, value: &str) {
        self.headers
            .entry(key.to_ascii_lowercase())
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(value);
            })
            .or_insert_with(|| value.to_string());
    }

    /// Builder form of [`ResponseHead::insert_header`].
    pub fn with_header(mut self, key: &str, value: &str) -> Self {
        self.insert_header(key, value);
        self
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    /// The url that produced this response, after redirects.
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }

    /// Looks a header up, ignoring case.
    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers
            .get(&key.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Length announced by the server, if any.
    pub fn expected_content_length(&self) -> Option<u64> {
        self.header("content-length")
            .and_then(|len| len.trim().parse().ok())
    }

    /// The media type of `Content-Type` without parameters, lowercased.
    pub fn mime_type(&self) -> Option<String> {
        self.header("content-type").map(|value| {
            value
                .split(';')
                .next()
                .unwrap_or("")
                .trim()
                .to_ascii_lowercase()
        })
    }
}
