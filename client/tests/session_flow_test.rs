//! End-to-end session flows: controller, timer and signal bus against a
//! wiremock API.
//!
//! Ticks are driven by hand, one call per simulated second, so no test
//! depends on wall-clock time.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use brewdoro_client::api::{ApiClient, ApiError};
use brewdoro_client::controller::{Controller, RemoteCall, Request, Settings, TaskRef};
use brewdoro_client::error::ClientError;
use brewdoro_client::timer::Phase;
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// =============================================================================
// Test Helpers
// =============================================================================

fn settings(auto_chain: bool) -> Settings {
    Settings {
        user_id: "123".to_string(),
        focus_minutes: 1,
        break_minutes: 1,
        auto_chain,
    }
}

fn client(server: &MockServer) -> ApiClient {
    ApiClient::new(&server.uri(), Duration::from_secs(5)).unwrap()
}

fn session_json(status: &str) -> serde_json::Value {
    json!({
        "id": "s1",
        "user_id": "123",
        "task_id": "t1",
        "focus_minutes": 1,
        "break_minutes": 1,
        "status": status
    })
}

async fn mount_create(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/sessions"))
        .respond_with(ResponseTemplate::new(201).set_body_json(session_json("running")))
        .mount(server)
        .await;
}

fn finish_response(next_break_minutes: u32, is_cycle_end: bool) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "session": session_json("finished"),
        "total_pomodoros": 1,
        "index_in_cycle": 1,
        "cycles_done": 0,
        "next_break_minutes": next_break_minutes,
        "is_cycle_end": is_cycle_end
    }))
}

/// Records the name of every signal on the controller's bus.
fn record_signals(controller: &mut Controller) -> Rc<RefCell<Vec<&'static str>>> {
    let log = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&log);
    controller
        .bus_mut()
        .subscribe(move |signal| sink.borrow_mut().push(signal.name()));
    log
}

/// Ticks `n` times and returns the first request a tick produced.
fn tick_n(controller: &mut Controller, n: u32) -> Option<Request> {
    let mut first = None;
    for _ in 0..n {
        if let Some(request) = controller.tick() {
            assert!(first.is_none(), "more than one request while ticking");
            first = Some(request);
        }
    }
    first
}

// =============================================================================
// Flows
// =============================================================================

/// One focus minute, a finish recorded remotely, one break minute, then idle
/// because the server reports the end of the cycle.
#[tokio::test]
async fn full_pomodoro_focus_break_idle() {
    let server = MockServer::start().await;
    mount_create(&server).await;
    Mock::given(method("PATCH"))
        .and(path("/sessions/s1/finish"))
        .respond_with(finish_response(1, true))
        .expect(1)
        .mount(&server)
        .await;

    let api = client(&server);
    let mut controller = Controller::new(settings(true));
    let signals = record_signals(&mut controller);

    let start = controller.start_task(TaskRef::new("t1", "Write docs")).unwrap();
    controller.drive(&api, start).await.unwrap();
    assert_eq!(controller.timer().phase(), Phase::Focus);
    assert_eq!(controller.timer().remaining_seconds(), 60);

    let finish = tick_n(&mut controller, 60).expect("focus expiry requests a finish");
    assert_eq!(controller.timer().remaining_seconds(), 0);
    assert!(matches!(finish.call, RemoteCall::FinishSession { .. }));

    controller.drive(&api, finish).await.unwrap();
    assert_eq!(controller.timer().phase(), Phase::Break);
    assert_eq!(controller.timer().total_seconds(), 60);

    assert!(tick_n(&mut controller, 60).is_none());
    assert_eq!(controller.timer().phase(), Phase::Idle);
    assert!(!controller.timer().is_running());

    assert_eq!(
        *signals.borrow(),
        vec!["start", "focus-finished", "start-break", "break-finished"]
    );
}

/// A finish answered with HTTP 500 changes nothing; a retry then succeeds.
#[tokio::test]
async fn failed_finish_surfaces_error_and_keeps_timer() {
    let server = MockServer::start().await;
    mount_create(&server).await;
    Mock::given(method("PATCH"))
        .and(path("/sessions/s1/finish"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/sessions/s1/finish"))
        .respond_with(finish_response(5, false))
        .mount(&server)
        .await;

    let api = client(&server);
    let mut controller = Controller::new(settings(false));
    let start = controller.start_task(TaskRef::new("t1", "Write docs")).unwrap();
    controller.drive(&api, start).await.unwrap();

    let signals = record_signals(&mut controller);
    let finish = tick_n(&mut controller, 60).unwrap();
    let before = controller.timer().clone();

    let err = controller.drive(&api, finish).await.unwrap_err();

    assert!(
        matches!(err, ClientError::Api(ApiError::Http { status: 500, .. })),
        "got {err:?}"
    );
    assert_eq!(controller.timer(), &before);
    assert_eq!(*signals.borrow(), vec!["focus-finished"]);

    let retry = controller.finish_focus().unwrap().unwrap();
    controller.drive(&api, retry).await.unwrap();

    assert_eq!(controller.timer().phase(), Phase::Break);
    assert_eq!(controller.timer().total_seconds(), 300);
    assert_eq!(*signals.borrow(), vec!["focus-finished", "start-break"]);
}

/// Pausing mid-focus goes through the API and keeps the remaining time.
#[tokio::test]
async fn pause_resume_round_trip_keeps_remaining() {
    let server = MockServer::start().await;
    mount_create(&server).await;
    Mock::given(method("PATCH"))
        .and(path("/sessions/s1/pause"))
        .respond_with(ResponseTemplate::new(200).set_body_json(session_json("paused")))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/sessions/s1/resume"))
        .respond_with(ResponseTemplate::new(200).set_body_json(session_json("running")))
        .expect(1)
        .mount(&server)
        .await;

    let api = client(&server);
    let mut controller = Controller::new(settings(true));
    let start = controller.start_task(TaskRef::new("t1", "Write docs")).unwrap();
    controller.drive(&api, start).await.unwrap();

    tick_n(&mut controller, 20);
    let pause = controller.pause().unwrap().unwrap();
    controller.drive(&api, pause).await.unwrap();
    assert_eq!(controller.timer().phase(), Phase::Paused);

    assert!(tick_n(&mut controller, 30).is_none());
    assert_eq!(controller.timer().remaining_seconds(), 40);

    let resume = controller.resume().unwrap().unwrap();
    controller.drive(&api, resume).await.unwrap();
    assert_eq!(controller.timer().phase(), Phase::Focus);
    assert_eq!(controller.timer().remaining_seconds(), 40);
    assert!(controller.timer().is_running());
}

/// With auto-chaining, the end of a break creates the next session.
#[tokio::test]
async fn break_end_chains_next_session() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/sessions"))
        .respond_with(ResponseTemplate::new(201).set_body_json(session_json("running")))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/sessions/s1/finish"))
        .respond_with(finish_response(1, false))
        .mount(&server)
        .await;

    let api = client(&server);
    let mut controller = Controller::new(settings(true));
    let start = controller.start_task(TaskRef::new("t1", "Write docs")).unwrap();
    controller.drive(&api, start).await.unwrap();

    let finish = tick_n(&mut controller, 60).unwrap();
    controller.drive(&api, finish).await.unwrap();

    let next = tick_n(&mut controller, 60).expect("break end chains a new session");
    controller.drive(&api, next).await.unwrap();

    assert_eq!(controller.timer().phase(), Phase::Focus);
    assert_eq!(controller.timer().task_title(), "Write docs");
}

/// Completing early finishes the remote session and idles the timer.
#[tokio::test]
async fn complete_early_finishes_session() {
    let server = MockServer::start().await;
    mount_create(&server).await;
    Mock::given(method("PATCH"))
        .and(path("/sessions/s1/finish"))
        .respond_with(finish_response(5, false))
        .expect(1)
        .mount(&server)
        .await;

    let api = client(&server);
    let mut controller = Controller::new(settings(true));
    let start = controller.start_task(TaskRef::new("t1", "Write docs")).unwrap();
    controller.drive(&api, start).await.unwrap();
    tick_n(&mut controller, 10);

    let complete = controller.complete().unwrap().unwrap();
    controller.drive(&api, complete).await.unwrap();

    assert_eq!(controller.timer().phase(), Phase::Idle);
    assert!(controller.context().session.is_none());
    assert!(controller.start_task(TaskRef::new("t1", "Write docs")).is_ok());
}
