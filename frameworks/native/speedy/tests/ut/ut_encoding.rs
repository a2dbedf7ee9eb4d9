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

use serde_json::json;
use transfer_rs::request::{HttpRequest, Method};

use super::*;

fn parameters(value: Value) -> Parameters {
    match value {
        Value::Object(map) => map,
        _ => panic!("parameters must be an object"),
    }
}

// @tc.name: ut_encoding_query_flatten
// @tc.desc: Test flattening of nested parameters
// @tc.precon: NA
// @tc.step: 1. Build parameters with an object, an array and scalars
// 2. Flatten them into a query string
// @tc.expect: Keys are sorted and nested keys use brackets, escaped
// @tc.type: FUNC
// @tc.require: issueNumber
// @tc.level: Level 0
#[test]
fn ut_encoding_query_flatten() {
    let params = parameters(json!({
        "user": { "name": "ann", "age": 7 },
        "tags": ["a", "b"],
        "on": true,
        "off": false,
    }));
    assert_eq!(
        query_string(&params),
        "off=0&on=1&tags%5B%5D=a&tags%5B%5D=b&user%5Bage%5D=7&user%5Bname%5D=ann"
    );
}

// @tc.name: ut_encoding_percent_escape
// @tc.desc: Test escaping of reserved characters
// @tc.precon: NA
// @tc.step: 1. Escape strings with reserved, unreserved and non-ASCII
// characters
// @tc.expect: Only letters, digits and -._~ are kept
// @tc.type: FUNC
// @tc.require: issueNumber
// @tc.level: Level 0
#[test]
fn ut_encoding_percent_escape() {
    assert_eq!(percent_escape("a-b.c_d~e"), "a-b.c_d~e");
    assert_eq!(percent_escape("?&=/+ "), "%3F%26%3D%2F%2B%20");
    assert_eq!(percent_escape("é"), "%C3%A9");
    assert_eq!(scalar_string(&Value::Null), "");
    assert_eq!(scalar_string(&json!(1.5)), "1.5");
}

// @tc.name: ut_encoding_url_get
// @tc.desc: Test URL encoding of a GET request
// @tc.precon: NA
// @tc.step: 1. Encode parameters into GET requests with and without a query
// and a fragment
// @tc.expect: The query is appended before the fragment, body untouched
// @tc.type: FUNC
// @tc.require: issueNumber
// @tc.level: Level 1
#[test]
fn ut_encoding_url_get() {
    let params = parameters(json!({ "q": "a b" }));

    let request = HttpRequest::get("http://host/path");
    let encoded = ParameterEncoding::Url.encode(&request, Some(&params)).unwrap();
    assert_eq!(encoded.url(), "http://host/path?q=a%20b");
    assert!(encoded.body().is_none());

    let request = HttpRequest::get("http://host/path?x=1#top");
    let encoded = ParameterEncoding::Url.encode(&request, Some(&params)).unwrap();
    assert_eq!(encoded.url(), "http://host/path?x=1&q=a%20b#top");

    let request = HttpRequest::new(Method::Delete, "http://host/path?");
    let encoded = ParameterEncoding::Url.encode(&request, Some(&params)).unwrap();
    assert_eq!(encoded.url(), "http://host/path?q=a%20b");
}

// @tc.name: ut_encoding_url_post
// @tc.desc: Test URL encoding of a POST request
// @tc.precon: NA
// @tc.step: 1. Encode parameters into a POST request
// 2. Encode into a POST request with its own content type
// 3. Encode into a POST request in query mode
// @tc.expect: The form body is set and an existing content type is kept
// @tc.type: FUNC
// @tc.require: issueNumber
// @tc.level: Level 1
#[test]
fn ut_encoding_url_post() {
    let params = parameters(json!({ "a": 1, "b": "x" }));

    let request = HttpRequest::new(Method::Post, "http://host/form");
    let encoded = ParameterEncoding::Url.encode(&request, Some(&params)).unwrap();
    assert_eq!(encoded.url(), "http://host/form");
    assert_eq!(encoded.body(), Some(&b"a=1&b=x"[..]));
    assert_eq!(
        encoded.header("content-type"),
        Some("application/x-www-form-urlencoded; charset=utf-8")
    );

    let mut request = HttpRequest::new(Method::Post, "http://host/form");
    request.set_header("Content-Type", "text/plain");
    let encoded = ParameterEncoding::Url.encode(&request, Some(&params)).unwrap();
    assert_eq!(encoded.header("Content-Type"), Some("text/plain"));

    let encoded = ParameterEncoding::UrlInQuery
        .encode(&request, Some(&params))
        .unwrap();
    assert_eq!(encoded.url(), "http://host/form?a=1&b=x");
    assert!(encoded.body().is_none());
}

// @tc.name: ut_encoding_json
// @tc.desc: Test JSON encoding
// @tc.precon: NA
// @tc.step: 1. Encode parameters as JSON into a PUT request
// @tc.expect: The body parses back to the parameters, content type is JSON
// unless the request already set one
// @tc.type: FUNC
// @tc.require: issueNumber
// @tc.level: Level 1
#[test]
fn ut_encoding_json() {
    let params = parameters(json!({ "list": [1, 2], "name": "speedy" }));
    let request = HttpRequest::new(Method::Put, "http://host/item");
    let encoded = ParameterEncoding::Json.encode(&request, Some(&params)).unwrap();
    assert_eq!(encoded.header("Content-Type"), Some("application/json"));
    let body: Value = serde_json::from_slice(encoded.body().unwrap()).unwrap();
    assert_eq!(body, Value::Object(params.clone()));

    let mut request = HttpRequest::new(Method::Post, "http://host/item");
    request.set_header("Content-Type", "application/vnd.api+json");
    let encoded = ParameterEncoding::Json.encode(&request, Some(&params)).unwrap();
    assert_eq!(encoded.header("Content-Type"), Some("application/vnd.api+json"));
}

// @tc.name: ut_encoding_no_parameters
// @tc.desc: Test encoding without parameters
// @tc.precon: NA
// @tc.step: 1. Encode None and an empty map
// @tc.expect: The request is returned unchanged
// @tc.type: FUNC
// @tc.require: issueNumber
// @tc.level: Level 2
#[test]
fn ut_encoding_no_parameters() {
    let request = HttpRequest::new(Method::Post, "http://host/");
    let encoded = ParameterEncoding::Json.encode(&request, None).unwrap();
    assert!(encoded.body().is_none());
    assert!(encoded.header("Content-Type").is_none());

    let encoded = ParameterEncoding::Url
        .encode(&request, Some(&Parameters::new()))
        .unwrap();
    assert_eq!(encoded.url(), "http://host/");
    assert!(encoded.body().is_none());
}
