//! End-to-end dispatch against the live mock server.
//!
//! # Design
//! Starts the mock server on a random port, then drives `EventLoop` and
//! `send` over real HTTP with `UreqTransport`. The server's `/echo` route
//! reflects what arrived, so each test checks both what the dispatcher put on
//! the wire and which callback it fired.

use std::cell::RefCell;
use std::net::SocketAddr;
use std::rc::Rc;

use peque_core::{
    send, Body, DispatchError, EventLoop, Failure, Outcome, Payload, RequestConfig,
    ResponseFormat, Ticket, UreqTransport, DEFAULT_CONTENT_TYPE,
};
use serde_json::json;

fn start_server() -> SocketAddr {
    let std_listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = std_listener.local_addr().unwrap();
    std_listener.set_nonblocking(true).unwrap();

    std::thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async {
            let listener = tokio::net::TcpListener::from_std(std_listener).unwrap();
            mock_server::run(listener).await
        })
        .unwrap();
    });

    addr
}

#[derive(Debug, Clone, PartialEq)]
enum Fired {
    Success(Body),
    Error(u16, String),
}

type Log = Rc<RefCell<Vec<Fired>>>;

fn recording(config: RequestConfig) -> (RequestConfig, Log) {
    let log: Log = Rc::new(RefCell::new(Vec::new()));
    let ok = Rc::clone(&log);
    let err = Rc::clone(&log);
    let config = config
        .on_success(move |body| ok.borrow_mut().push(Fired::Success(body)))
        .on_error(move |status, text| err.borrow_mut().push(Fired::Error(status, text)));
    (config, log)
}

fn echoed(log: &Log) -> serde_json::Value {
    match &log.borrow()[..] {
        [Fired::Success(Body::Json(value))] => value.clone(),
        other => panic!("expected one JSON success, got {other:?}"),
    }
}

#[test]
fn get_payload_arrives_as_query_string() {
    let addr = start_server();
    let mut event_loop = EventLoop::new(UreqTransport::new());

    let payload = Payload::new().with("user", "Son Link").with("lang", "es");
    let (config, log) = recording(RequestConfig::new().payload(payload));
    let ticket = event_loop.ajax(&format!("http://{addr}/echo"), Some(config)).unwrap();
    assert!(matches!(ticket, Ticket::Pending(_)));
    assert!(log.borrow().is_empty());

    event_loop.run();
    let echo = echoed(&log);
    assert_eq!(echo["method"], "GET");
    assert_eq!(echo["query"], "user=Son%20Link&lang=es");
    assert_eq!(echo["content_type"], DEFAULT_CONTENT_TYPE);
    assert_eq!(echo["body"], "");
}

#[test]
fn post_payload_arrives_form_encoded() {
    let addr = start_server();
    let mut event_loop = EventLoop::new(UreqTransport::new());

    let payload = Payload::new().with("user", "myuser").with("passwd", "123 456");
    let (config, log) = recording(RequestConfig::new().method("post").payload(payload));
    event_loop.ajax(&format!("http://{addr}/echo"), Some(config)).unwrap();
    event_loop.run();

    let echo = echoed(&log);
    assert_eq!(echo["method"], "POST");
    assert!(echo["query"].is_null());
    assert_eq!(echo["body"], "user=myuser&passwd=123%20456");
}

#[test]
fn json_content_type_sends_json_body() {
    let addr = start_server();
    let mut event_loop = EventLoop::new(UreqTransport::new());

    let payload = Payload::new().with("title", "PequeJS").with("stars", 3);
    let (config, log) = recording(
        RequestConfig::new()
            .method("PUT")
            .content_type("application/json")
            .payload(payload),
    );
    event_loop.ajax(&format!("http://{addr}/echo"), Some(config)).unwrap();
    event_loop.run();

    let echo = echoed(&log);
    assert_eq!(echo["content_type"], "application/json");
    let body: serde_json::Value = serde_json::from_str(echo["body"].as_str().unwrap()).unwrap();
    assert_eq!(body, json!({"title": "PequeJS", "stars": 3}));
}

#[test]
fn omitted_content_type_sends_no_header() {
    let addr = start_server();
    let mut event_loop = EventLoop::new(UreqTransport::new());

    let (config, log) = recording(RequestConfig::new().omit_content_type());
    event_loop.ajax(&format!("http://{addr}/echo"), Some(config)).unwrap();
    event_loop.run();

    assert!(echoed(&log)["content_type"].is_null());
}

#[test]
fn json_document_is_decoded() {
    let addr = start_server();
    let transport = UreqTransport::new();

    let (config, log) = recording(RequestConfig::new());
    let outcome = send(&transport, &format!("http://{addr}/json"), Some(config)).unwrap();

    assert_eq!(outcome, Outcome::Succeeded);
    assert_eq!(*log.borrow(), vec![Fired::Success(Body::Json(json!({"a": 1})))]);
}

#[test]
fn text_html_and_raw_formats() {
    let addr = start_server();
    let transport = UreqTransport::new();

    let (config, log) = recording(RequestConfig::new().response_format(ResponseFormat::Text));
    send(&transport, &format!("http://{addr}/text"), Some(config)).unwrap();
    assert_eq!(*log.borrow(), vec![Fired::Success(Body::Text("hello from peque".into()))]);

    let (config, log) = recording(RequestConfig::new().response_format(ResponseFormat::Html));
    send(&transport, &format!("http://{addr}/html"), Some(config)).unwrap();
    assert_eq!(
        *log.borrow(),
        vec![Fired::Success(Body::Text("<ul id=\"series\"><li>The Rookie</li></ul>".into()))]
    );

    let (config, log) = recording(RequestConfig::new().response_format(ResponseFormat::Raw));
    send(&transport, &format!("http://{addr}/bytes"), Some(config)).unwrap();
    assert_eq!(*log.borrow(), vec![Fired::Success(Body::Raw(vec![0, 159, 146, 150, 255]))]);
}

#[test]
fn error_status_goes_to_error_callback() {
    let addr = start_server();
    let mut event_loop = EventLoop::new(UreqTransport::new());

    let (config, log) = recording(RequestConfig::new());
    event_loop.ajax(&format!("http://{addr}/status/404"), Some(config)).unwrap();
    let fired = event_loop.run();

    assert_eq!(
        fired[0].1,
        Outcome::Failed(Failure::Status {
            status: 404,
            status_text: "Not Found".into()
        })
    );
    assert_eq!(*log.borrow(), vec![Fired::Error(404, "Not Found".into())]);
}

#[test]
fn malformed_json_goes_to_error_callback() {
    let addr = start_server();
    let transport = UreqTransport::new();

    let (config, log) = recording(RequestConfig::new());
    let outcome = send(&transport, &format!("http://{addr}/malformed"), Some(config)).unwrap();

    assert!(matches!(outcome, Outcome::Failed(Failure::Decode { status: 200, .. })));
    assert_eq!(*log.borrow(), vec![Fired::Error(200, "parsererror".into())]);
}

#[test]
fn no_content_decodes_to_null() {
    let addr = start_server();
    let transport = UreqTransport::new();

    let (config, log) = recording(RequestConfig::new());
    send(&transport, &format!("http://{addr}/empty"), Some(config)).unwrap();
    assert_eq!(*log.borrow(), vec![Fired::Success(Body::Json(serde_json::Value::Null))]);
}

#[test]
fn connection_refused_reports_status_zero() {
    // Bind and drop to get a port with nothing listening on it.
    let addr = std::net::TcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap();
    let mut event_loop = EventLoop::new(UreqTransport::new());

    let (config, log) = recording(RequestConfig::new());
    event_loop.ajax(&format!("http://{addr}/echo"), Some(config)).unwrap();
    let fired = event_loop.run();

    assert!(matches!(fired[0].1, Outcome::Failed(Failure::Transport { .. })));
    assert_eq!(*log.borrow(), vec![Fired::Error(0, String::new())]);
}

#[test]
fn synchronous_request_blocks_until_resolved() {
    let addr = start_server();
    let mut event_loop = EventLoop::new(UreqTransport::new());

    let (config, log) = recording(RequestConfig::new().asynchronous(false));
    let ticket = event_loop.ajax(&format!("http://{addr}/json"), Some(config)).unwrap();

    assert_eq!(ticket, Ticket::Completed(Outcome::Succeeded));
    assert_eq!(log.borrow().len(), 1);
    assert_eq!(event_loop.pending(), 0);
}

#[test]
fn concurrent_requests_each_fire_once() {
    let addr = start_server();
    let mut event_loop = EventLoop::new(UreqTransport::new());

    let targets = ["delay/40", "json", "status/500", "delay/10", "status/404", "json"];
    let logs: Vec<Log> = targets
        .iter()
        .map(|target| {
            let (config, log) = recording(RequestConfig::new());
            event_loop.ajax(&format!("http://{addr}/{target}"), Some(config)).unwrap();
            log
        })
        .collect();
    assert_eq!(event_loop.pending(), targets.len());

    let fired = event_loop.run();
    assert_eq!(fired.len(), targets.len());
    for (target, log) in targets.iter().zip(&logs) {
        let log = log.borrow();
        assert_eq!(log.len(), 1, "{target}");
        let succeeded = matches!(log[0], Fired::Success(_));
        assert_eq!(succeeded, !target.starts_with("status"), "{target}");
    }
}

#[test]
fn shorthands_deliver_body_or_none() {
    let addr = start_server();
    let mut event_loop = EventLoop::new(UreqTransport::new());

    let got = Rc::new(RefCell::new(Vec::new()));
    let slot = Rc::clone(&got);
    event_loop
        .get(
            &format!("http://{addr}/echo"),
            Some(Payload::new().with("key", "123456789")),
            move |body| slot.borrow_mut().push(body),
        )
        .unwrap();
    let slot = Rc::clone(&got);
    event_loop
        .post(
            &format!("http://{addr}/status/403"),
            Payload::new().with("key", "123456789"),
            move |body| slot.borrow_mut().push(body),
        )
        .unwrap();
    event_loop.run();

    let got = got.borrow();
    assert_eq!(got.len(), 2);
    let echo = got
        .iter()
        .flatten()
        .find_map(Body::as_json)
        .expect("get should succeed");
    assert_eq!(echo["query"], "key=123456789");
    assert!(got.iter().any(Option::is_none), "post to 403 should deliver None");
}

#[test]
fn missing_success_callback_is_rejected() {
    let mut event_loop = EventLoop::new(UreqTransport::new());
    let err = event_loop
        .ajax("http://127.0.0.1:9/never", Some(RequestConfig::new()))
        .unwrap_err();
    assert_eq!(err, DispatchError::MissingSuccessCallback);
    assert_eq!(event_loop.pending(), 0);
}
