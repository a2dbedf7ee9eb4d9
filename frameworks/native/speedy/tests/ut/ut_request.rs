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

use mockall::mock;
use serde::Deserialize;
use transfer_rs::engine::SessionEvents;
use transfer_rs::error::TransferError;
use transfer_rs::task::{TaskKind, TaskSource, TaskStatus};

use super::*;
use crate::manager::ManagerConfig;
use crate::session::SessionDelegate;
use crate::ut_support::{manual_manager, ManualEngine};

mock! {
    pub Engine {}
    impl TransferEngine for Engine {
        fn create_task(&self, source: TaskSource) -> Result<TaskId, TransferError>;
        fn task_kind(&self, task: TaskId) -> Option<TaskKind>;
        fn status(&self, task: TaskId) -> Option<TaskStatus>;
        fn resume(&self, task: TaskId);
        fn suspend(&self, task: TaskId);
        fn cancel(&self, task: TaskId);
    }
}

fn started(url: &str) -> (Request, Arc<ManualEngine>, Arc<SessionDelegate>) {
    let (manager, engine, session) = manual_manager(ManagerConfig::default());
    let request = manager.request(HttpRequest::get(url)).unwrap();
    (request, engine, session)
}

fn respond(session: &SessionDelegate, task: TaskId, response: ResponseHead, body: &[u8]) {
    session.did_receive_response(task, &response);
    if !body.is_empty() {
        session.did_receive_data(task, body);
    }
}

// @tc.name: ut_request_forwards_commands
// @tc.desc: Test that lifecycle commands reach the engine
// @tc.precon: NA
// @tc.step: 1. Create a request over a mocked engine
// 2. Resume twice, suspend and cancel
// @tc.expect: The engine sees every command for the task and the start
// time is recorded once
// @tc.type: FUNC
// @tc.require: issueNumber
// @tc.level: Level 0
#[test]
fn ut_request_forwards_commands() {
    let task = TaskId::new(500);
    let mut engine = MockEngine::new();
    engine
        .expect_task_kind()
        .withf(move |id| *id == task)
        .times(1)
        .returning(|_| Some(TaskKind::Data));
    engine
        .expect_resume()
        .withf(move |id| *id == task)
        .times(2)
        .return_const(());
    engine.expect_suspend().times(1).return_const(());
    engine.expect_cancel().times(1).return_const(());

    let request = Request::new(Arc::new(engine), task, None);
    assert_eq!(request.task(), task);
    assert_eq!(request.delegate().kind(), crate::delegate::DelegateKind::Data);
    assert!(request.start_time().is_none());

    request.resume();
    let start = request.start_time().unwrap();
    request.suspend().resume().cancel();
    assert_eq!(request.start_time(), Some(start));
    assert_eq!(request.to_string(), "task-500");
}

// @tc.name: ut_request_subscriber_order
// @tc.desc: Test that subscribers run after completion in order
// @tc.precon: NA
// @tc.step: 1. Subscribe data, string and JSON closures
// 2. Deliver a response and body, then complete the task
// @tc.expect: Nothing runs before completion, then all run in order with
// the serialized body, and the timeline is complete
// @tc.type: FUNC
// @tc.require: issueNumber
// @tc.level: Level 0
#[test]
fn ut_request_subscriber_order() {
    let (request, engine, session) = started("http://host/item");
    let order = Arc::new(Mutex::new(Vec::new()));

    let log = order.clone();
    request.on_data(move |response| {
        assert_eq!(response.value().unwrap(), br#"{"id":1}"#);
        log.lock().unwrap().push("data");
    });
    let log = order.clone();
    request.on_string(move |response| {
        assert_eq!(response.value().unwrap(), r#"{"id":1}"#);
        assert_eq!(response.status(), Some(200));
        log.lock().unwrap().push("string");
    });
    let log = order.clone();
    request.on_json(move |response| {
        assert_eq!(response.value().unwrap()["id"], 1);
        assert_eq!(response.request.unwrap().url(), "http://host/item");
        log.lock().unwrap().push("json");
    });

    respond(
        &session,
        request.task(),
        ResponseHead::new(200, "http://host/item"),
        br#"{"id":1}"#,
    );
    assert!(order.lock().unwrap().is_empty());
    assert!(request.end_time().is_none());

    engine.complete(request.task(), None);
    assert_eq!(*order.lock().unwrap(), ["data", "string", "json"]);
    assert!(request.end_time().is_some());
    assert!(request.duration().is_some());
    assert_eq!(request.to_string(), "GET http://host/item (200)");
    assert_eq!(engine.commands(), [(request.task(), "resume")]);
}

// @tc.name: ut_request_late_subscriber
// @tc.desc: Test subscriptions made before and after completion
// @tc.precon: NA
// @tc.step: 1. Subscribe two closures
// 2. Complete the task
// 3. Subscribe a third closure
// @tc.expect: The first two run on completion, the third runs right away
// with the same data, all in subscription order
// @tc.type: FUNC
// @tc.require: issueNumber
// @tc.level: Level 1
#[test]
fn ut_request_late_subscriber() {
    let (request, engine, session) = started("http://host/late");
    let seen = Arc::new(Mutex::new(Vec::new()));
    for name in ["first", "second"] {
        let record = seen.clone();
        request.on_data(move |response| {
            record.lock().unwrap().push((name, response.value().cloned()));
        });
    }
    respond(&session, request.task(), ResponseHead::new(200, "http://host/late"), b"done");
    assert!(seen.lock().unwrap().is_empty());
    engine.complete(request.task(), None);
    assert_eq!(seen.lock().unwrap().len(), 2);

    let record = seen.clone();
    request.on_data(move |response| {
        record.lock().unwrap().push(("third", response.value().cloned()));
    });
    let seen = seen.lock().unwrap();
    let names: Vec<&str> = seen.iter().map(|(name, _)| *name).collect();
    assert_eq!(names, ["first", "second", "third"]);
    assert!(seen.iter().all(|(_, data)| data.as_deref() == Some(&b"done"[..])));
}

// @tc.name: ut_request_cancel
// @tc.desc: Test that cancellation reaches every subscriber
// @tc.precon: NA
// @tc.step: 1. Subscribe data, string and JSON closures
// 2. Cancel the request
// @tc.expect: All of them receive the same cancellation error and the
// engine saw the cancel command
// @tc.type: FUNC
// @tc.require: issueNumber
// @tc.level: Level 0
#[test]
fn ut_request_cancel() {
    let (request, engine, _session) = started("http://host/slow");
    let errors = Arc::new(Mutex::new(Vec::new()));
    let record = errors.clone();
    request.on_data(move |response| {
        record.lock().unwrap().push(response.result.unwrap_err());
    });
    let record = errors.clone();
    request.on_string(move |response| {
        record.lock().unwrap().push(response.result.unwrap_err());
    });
    let record = errors.clone();
    request.on_json(move |response| {
        record.lock().unwrap().push(response.result.unwrap_err());
    });

    request.cancel();
    let errors = errors.lock().unwrap();
    assert_eq!(errors.len(), 3);
    assert!(errors[0].is_cancelled());
    assert_eq!(errors[0], errors[1]);
    assert_eq!(errors[0], errors[2]);
    assert_eq!(engine.commands().last(), Some(&(request.task(), "cancel")));
}

// @tc.name: ut_request_validate_status
// @tc.desc: Test that a failed status validation affects later subscribers
// @tc.precon: NA
// @tc.step: 1. Subscribe a closure, then validate 200..300, then subscribe
// another closure
// 2. Complete with a 404 response
// @tc.expect: The first closure succeeds, the second gets the validation
// error
// @tc.type: FUNC
// @tc.require: issueNumber
// @tc.level: Level 0
#[test]
fn ut_request_validate_status() {
    let (request, engine, session) = started("http://host/missing");
    let results = Arc::new(Mutex::new(Vec::new()));
    let record = results.clone();
    request.on_string(move |response| record.lock().unwrap().push(response.result));
    request.validate_status_code(200..300);
    let record = results.clone();
    request.on_string(move |response| record.lock().unwrap().push(response.result));

    respond(&session, request.task(), ResponseHead::new(404, "http://host/missing"), b"nope");
    engine.complete(request.task(), None);

    let results = results.lock().unwrap();
    assert_eq!(results[0].as_deref(), Ok("nope"));
    let error = results[1].clone().unwrap_err();
    assert_eq!(error.kind(), &ErrorKind::StatusCodeValidationFailed);
    assert_eq!(request.delegate().error(), Some(error));
}

// @tc.name: ut_request_validate_content_type
// @tc.desc: Test content type validation with wildcards
// @tc.precon: NA
// @tc.step: 1. Validate JSON responses against several patterns
// @tc.expect: Matching and wildcard patterns pass, others fail
// @tc.type: FUNC
// @tc.require: issueNumber
// @tc.level: Level 1
#[test]
fn ut_request_validate_content_type() {
    let cases: [(&[&str], bool); 4] = [
        (&["application/json"], true),
        (&["application/*"], true),
        (&["*/*"], true),
        (&["text/*", "image/png"], false),
    ];
    for (acceptable, passes) in cases {
        let (request, engine, session) = started("http://host/json");
        request.validate_content_type(acceptable);
        let response = ResponseHead::new(200, "http://host/json")
            .with_header("Content-Type", "Application/JSON; charset=utf-8");
        respond(&session, request.task(), response, b"{}");
        engine.complete(request.task(), None);
        match request.delegate().error() {
            None => assert!(passes, "{:?} should fail", acceptable),
            Some(e) => {
                assert!(!passes, "{:?} should pass", acceptable);
                assert_eq!(e.kind(), &ErrorKind::ContentTypeValidationFailed);
            }
        }
    }
}

// @tc.name: ut_request_validate_default
// @tc.desc: Test the default validation with an Accept header
// @tc.precon: NA
// @tc.step: 1. Issue a request accepting JSON
// 2. Complete with a 200 text/html response
// @tc.expect: The content type validation fails
// @tc.type: FUNC
// @tc.require: issueNumber
// @tc.level: Level 1
#[test]
fn ut_request_validate_default() {
    let (manager, engine, session) = manual_manager(ManagerConfig::default());
    let mut http = HttpRequest::get("http://host/page");
    http.set_header("Accept", "application/json;q=0.9, text/plain");
    let request = manager.request(http).unwrap();
    request.validate_default();
    let response =
        ResponseHead::new(200, "http://host/page").with_header("Content-Type", "text/html");
    respond(&session, request.task(), response, b"<p>");
    engine.complete(request.task(), None);
    assert_eq!(
        request.delegate().error().unwrap().kind(),
        &ErrorKind::ContentTypeValidationFailed
    );
}

// @tc.name: ut_request_validate_skipped
// @tc.desc: Test that validations are skipped without a response
// @tc.precon: NA
// @tc.step: 1. Validate with a closure that always fails
// 2. Complete with an engine error and no response
// @tc.expect: The engine error is kept and the closure never runs
// @tc.type: FUNC
// @tc.require: issueNumber
// @tc.level: Level 2
#[test]
fn ut_request_validate_skipped() {
    let (request, engine, _session) = started("http://host/down");
    request.validate(|_| panic!("validation must not run"));
    engine.complete(
        request.task(),
        Some(TransferError::new(
            transfer_rs::error::TransferErrorCode::CannotConnectToHost,
            "refused",
        )),
    );
    assert_eq!(request.delegate().error().unwrap().code(), -1004);
}

// @tc.name: ut_request_progress_replaced
// @tc.desc: Test that a new progress closure replaces the old one
// @tc.precon: NA
// @tc.step: 1. Set two progress closures
// 2. Deliver a response and data
// @tc.expect: Only the second closure is called
// @tc.type: FUNC
// @tc.require: issueNumber
// @tc.level: Level 2
#[test]
fn ut_request_progress_replaced() {
    let (request, _engine, session) = started("http://host/progress");
    let calls = Arc::new(Mutex::new(Vec::new()));
    let first = calls.clone();
    let second = calls.clone();
    request
        .on_progress(move |_, _, _| first.lock().unwrap().push("first"))
        .on_progress(move |bytes, total, expected| {
            assert_eq!((bytes, total, expected), (2, 2, 4));
            second.lock().unwrap().push("second");
        });
    let response = ResponseHead::new(200, "http://host/progress").with_header("Content-Length", "4");
    respond(&session, request.task(), response, b"ab");
    assert_eq!(*calls.lock().unwrap(), ["second"]);
    assert_eq!(
        request.progress(),
        Progress {
            completed: 2,
            total: 4
        }
    );
}

// @tc.name: ut_request_decodable
// @tc.desc: Test decoding the body into a type
// @tc.precon: NA
// @tc.step: 1. Subscribe a decodable closure
// 2. Complete with a JSON body
// @tc.expect: The body decodes into the type
// @tc.type: FUNC
// @tc.require: issueNumber
// @tc.level: Level 1
#[test]
fn ut_request_decodable() {
    #[derive(Debug, Deserialize, PartialEq)]
    struct User {
        name: String,
    }

    let (request, engine, session) = started("http://host/user");
    let seen = Arc::new(Mutex::new(None));
    let record = seen.clone();
    request.on_decodable(move |response: Response<User>| {
        *record.lock().unwrap() = response.result.ok();
    });
    respond(
        &session,
        request.task(),
        ResponseHead::new(200, "http://host/user"),
        br#"{"name":"ann"}"#,
    );
    engine.complete(request.task(), None);
    assert_eq!(
        *seen.lock().unwrap(),
        Some(User {
            name: "ann".to_string()
        })
    );
}
