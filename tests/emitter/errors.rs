//! The `"error"` key: fatal when unhandled, ordinary when handled.
//! Listener panics are not isolated.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex};

use serde_json::json;

use evbus::{listener, EventBus, EventValue, UnhandledError, ERROR_EVENT};

fn io_error(message: &str) -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::Other, message.to_string())
}

/// Emit on a fresh bus and return the downcast panic payload.
fn unhandled_panic(args: &[EventValue]) -> UnhandledError {
    let bus = EventBus::new();
    let result = catch_unwind(AssertUnwindSafe(|| {
        bus.emit(ERROR_EVENT, args);
    }));
    let payload = result.expect_err("unhandled \"error\" emission must panic");
    match payload.downcast::<UnhandledError>() {
        Ok(error) => *error,
        Err(_) => panic!("panic payload should downcast to UnhandledError"),
    }
}

#[test]
fn unhandled_error_value_panics_with_the_cause() {
    let error = unhandled_panic(&[EventValue::error(io_error("x"))]);

    assert!(error.cause().is_some());
    assert!(error.context.is_none());
    assert!(
        error.to_string().contains('x'),
        "message should carry the cause: {error}"
    );
}

#[test]
fn unhandled_non_error_payload_is_wrapped_with_context() {
    let error = unhandled_panic(&[json!({"reason": "disk full"}).into()]);

    assert!(error.cause().is_none());
    assert_eq!(error.context, Some(json!({"reason": "disk full"}).into()));
    assert!(
        error.to_string().contains("disk full"),
        "message should carry the context: {error}"
    );
}

#[test]
fn unhandled_error_without_payload_still_panics() {
    let error = unhandled_panic(&[]);

    assert!(error.cause().is_none());
    assert!(error.context.is_none());
}

#[test]
fn handled_error_emission_dispatches_normally() {
    let bus = EventBus::new();
    let log = Arc::new(Mutex::new(Vec::new()));
    let log_clone = Arc::clone(&log);

    bus.on(
        ERROR_EVENT,
        listener(move |args| {
            if let Some(err) = args.first().and_then(EventValue::as_error) {
                log_clone.lock().unwrap().push(err.to_string());
            }
        }),
    );

    let handled = bus.emit(ERROR_EVENT, &[EventValue::error(io_error("recoverable"))]);

    assert!(handled);
    assert_eq!(*log.lock().unwrap(), vec!["recoverable"]);
}

#[test]
fn panicking_listener_aborts_the_rest_of_the_snapshot() {
    let bus = EventBus::new();
    let log = Arc::new(Mutex::new(Vec::new()));
    let log_clone = Arc::clone(&log);

    bus.on("data", listener(|_| panic!("first listener fails")));
    bus.on(
        "data",
        listener(move |_| log_clone.lock().unwrap().push("second".to_string())),
    );

    let result = catch_unwind(AssertUnwindSafe(|| {
        bus.emit("data", &[]);
    }));

    assert!(result.is_err(), "listener panic should propagate out of emit");
    assert!(
        log.lock().unwrap().is_empty(),
        "later snapshot members must be left uninvoked"
    );

    // The registry is intact; the next emission dispatches again.
    let result = catch_unwind(AssertUnwindSafe(|| {
        bus.emit("data", &[]);
    }));
    assert!(result.is_err());
}

#[test]
fn error_named_token_is_not_the_error_channel() {
    let bus = EventBus::new();
    let token = evbus::EventToken::labeled("error");

    // A token labeled "error" is an ordinary key: no listeners, no panic.
    assert!(!bus.emit(token, &[]));
}
