//! Max-listeners configuration and leak warnings.
//!
//! Warnings go through the `log` facade; a capturing logger collects them
//! so the once-per-crossing contract can be asserted.

use std::sync::{Mutex, OnceLock};

use log::{Metadata, Record};

use evbus::{default_max_listeners, listener, set_default_max_listeners, EventBus};

struct CaptureLogger {
    records: Mutex<Vec<String>>,
}

impl log::Log for CaptureLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::Level::Warn
    }

    fn log(&self, record: &Record) {
        if record.level() == log::Level::Warn {
            self.records
                .lock()
                .unwrap()
                .push(record.args().to_string());
        }
    }

    fn flush(&self) {}
}

/// Install the capturing logger (first caller wins; the logger is global to
/// the test binary).
fn capture() -> &'static CaptureLogger {
    static LOGGER: OnceLock<CaptureLogger> = OnceLock::new();
    let logger = LOGGER.get_or_init(|| CaptureLogger {
        records: Mutex::new(Vec::new()),
    });
    let _ = log::set_logger(logger);
    log::set_max_level(log::LevelFilter::Warn);
    logger
}

/// Serializes the tests that read or mutate the process-wide default, so a
/// temporary override cannot leak into a concurrently running assertion.
static GLOBAL_DEFAULT_LOCK: Mutex<()> = Mutex::new(());

fn warnings_mentioning(logger: &CaptureLogger, key: &str) -> usize {
    logger
        .records
        .lock()
        .unwrap()
        .iter()
        .filter(|message| message.contains(key))
        .count()
}

#[test]
fn crossing_the_limit_warns_exactly_once() {
    let logger = capture();
    let bus = EventBus::new();
    bus.set_max_listeners(2);

    bus.on("limits-crossing", listener(|_| {}));
    bus.on("limits-crossing", listener(|_| {}));
    assert_eq!(warnings_mentioning(logger, "limits-crossing"), 0);

    bus.on("limits-crossing", listener(|_| {}));
    assert_eq!(warnings_mentioning(logger, "limits-crossing"), 1);

    // Further registrations past the threshold stay silent.
    bus.on("limits-crossing", listener(|_| {}));
    bus.on("limits-crossing", listener(|_| {}));
    assert_eq!(warnings_mentioning(logger, "limits-crossing"), 1);
}

#[test]
fn each_key_warns_independently() {
    let logger = capture();
    let bus = EventBus::new();
    bus.set_max_listeners(1);

    bus.on("limits-first", listener(|_| {}));
    bus.on("limits-first", listener(|_| {}));
    bus.on("limits-second", listener(|_| {}));
    bus.on("limits-second", listener(|_| {}));

    assert_eq!(warnings_mentioning(logger, "limits-first"), 1);
    assert_eq!(warnings_mentioning(logger, "limits-second"), 1);
}

#[test]
fn warning_names_count_and_hint() {
    let logger = capture();
    let bus = EventBus::new();
    bus.set_max_listeners(1);

    bus.on("limits-message", listener(|_| {}));
    bus.on("limits-message", listener(|_| {}));

    let records = logger.records.lock().unwrap();
    let message = records
        .iter()
        .find(|m| m.contains("limits-message"))
        .expect("warning should have been logged");
    assert!(message.contains("memory leak"), "wording missing: {message}");
    assert!(message.contains('2'), "count missing: {message}");
    assert!(
        message.contains("set_max_listeners()"),
        "hint missing: {message}"
    );
}

#[test]
fn zero_limit_disables_the_warning() {
    let logger = capture();
    let bus = EventBus::new();
    bus.set_max_listeners(0);

    for _ in 0..50 {
        bus.on("limits-disabled", listener(|_| {}));
    }

    assert_eq!(warnings_mentioning(logger, "limits-disabled"), 0);
}

#[test]
fn max_listeners_reports_override_or_default() {
    let _guard = GLOBAL_DEFAULT_LOCK.lock().unwrap();
    let bus = EventBus::new();
    assert_eq!(bus.max_listeners(), default_max_listeners());

    bus.set_max_listeners(3);
    assert_eq!(bus.max_listeners(), 3);
}

#[test]
fn default_max_listeners_is_read_by_buses_without_an_override() {
    let logger = capture();
    let _guard = GLOBAL_DEFAULT_LOCK.lock().unwrap();
    let initial = default_max_listeners();
    assert_eq!(initial, 10, "documented initial value");

    set_default_max_listeners(1);
    let bus = EventBus::new();
    bus.on("limits-global", listener(|_| {}));
    bus.on("limits-global", listener(|_| {}));
    set_default_max_listeners(initial);

    assert_eq!(warnings_mentioning(logger, "limits-global"), 1);
}
