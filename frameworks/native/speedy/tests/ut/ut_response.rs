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

use serde::Deserialize;

use super::*;

#[derive(Debug, Deserialize, PartialEq)]
struct Item {
    id: u32,
    name: String,
}

fn head(status: u16) -> ResponseHead {
    ResponseHead::new(status, "http://host/")
}

// @tc.name: ut_response_serialize_data
// @tc.desc: Test the data serializer
// @tc.precon: NA
// @tc.step: 1. Serialize present data, missing data, and missing data with
// a 204 response
// @tc.expect: Data passes through, a 204 is empty and otherwise missing
// data fails
// @tc.type: FUNC
// @tc.require: issueNumber
// @tc.level: Level 0
#[test]
fn ut_response_serialize_data() {
    assert_eq!(serialize_data(Some(b"abc"), Some(&head(200))).unwrap(), b"abc");
    assert!(serialize_data(None, Some(&head(204))).unwrap().is_empty());
    let error = serialize_data(None, Some(&head(200))).unwrap_err();
    assert_eq!(error.kind(), &ErrorKind::DataSerializationFailed);
    assert_eq!(error.code(), -8004);
    assert!(serialize_data(None, None).is_err());
}

// @tc.name: ut_response_serialize_string
// @tc.desc: Test the string serializer
// @tc.precon: NA
// @tc.step: 1. Serialize UTF-8 text, invalid bytes and a 204 response
// @tc.expect: Text decodes, invalid bytes fail, a 204 is empty
// @tc.type: FUNC
// @tc.require: issueNumber
// @tc.level: Level 0
#[test]
fn ut_response_serialize_string() {
    assert_eq!(
        serialize_string(Some("héllo".as_bytes()), Some(&head(200))).unwrap(),
        "héllo"
    );
    let error = serialize_string(Some(&[0xff, 0xfe]), Some(&head(200))).unwrap_err();
    assert_eq!(error.kind(), &ErrorKind::StringSerializationFailed);
    assert_eq!(serialize_string(None, Some(&head(204))).unwrap(), "");
    assert!(serialize_string(None, None).is_err());
}

// @tc.name: ut_response_serialize_json
// @tc.desc: Test the JSON serializer
// @tc.precon: NA
// @tc.step: 1. Serialize valid JSON, invalid JSON, empty data and a 204
// @tc.expect: Valid JSON parses, a 204 yields null, the rest fail
// @tc.type: FUNC
// @tc.require: issueNumber
// @tc.level: Level 0
#[test]
fn ut_response_serialize_json() {
    let value = serialize_json(Some(br#"{"a":[1,2]}"#), Some(&head(200))).unwrap();
    assert_eq!(value["a"][1], 2);
    assert_eq!(serialize_json(Some(b""), Some(&head(204))).unwrap(), Value::Null);
    assert_eq!(serialize_json(None, Some(&head(204))).unwrap(), Value::Null);

    let error = serialize_json(Some(b"{oops"), Some(&head(200))).unwrap_err();
    assert_eq!(error.kind(), &ErrorKind::JsonSerializationFailed);
    assert_eq!(error.code(), -8006);
    assert!(serialize_json(Some(b""), Some(&head(200))).is_err());
}

// @tc.name: ut_response_serialize_decodable
// @tc.desc: Test deserializing JSON into a type
// @tc.precon: NA
// @tc.step: 1. Decode a matching object and a mismatching one
// @tc.expect: The matching object decodes, the other fails
// @tc.type: FUNC
// @tc.require: issueNumber
// @tc.level: Level 1
#[test]
fn ut_response_serialize_decodable() {
    let item: Item = serialize_decodable(Some(br#"{"id":3,"name":"x"}"#), None).unwrap();
    assert_eq!(
        item,
        Item {
            id: 3,
            name: "x".to_string()
        }
    );
    let error = serialize_decodable::<Item>(Some(br#"{"id":"3"}"#), None).unwrap_err();
    assert_eq!(error.kind(), &ErrorKind::JsonSerializationFailed);
    assert!(serialize_decodable::<Item>(None, None).is_err());
}

// @tc.name: ut_response_accessors
// @tc.desc: Test the accessors of a response value
// @tc.precon: NA
// @tc.step: 1. Build a successful and a failed response
// @tc.expect: Accessors reflect the result and the status
// @tc.type: FUNC
// @tc.require: issueNumber
// @tc.level: Level 2
#[test]
fn ut_response_accessors() {
    let ok = Response {
        request: Some(HttpRequest::get("http://host/")),
        response: Some(head(201)),
        data: Some(b"1".to_vec()),
        result: Ok(1),
    };
    assert!(ok.is_success());
    assert_eq!(ok.value(), Some(&1));
    assert!(ok.error().is_none());
    assert_eq!(ok.status(), Some(201));

    let failed: Response<i32> = Response {
        request: None,
        response: None,
        data: None,
        result: Err(SpeedyError::new(ErrorKind::DataSerializationFailed, "nil")),
    };
    assert!(!failed.is_success());
    assert!(failed.value().is_none());
    assert_eq!(failed.error().unwrap().code(), -8004);
    assert_eq!(failed.status(), None);
}
