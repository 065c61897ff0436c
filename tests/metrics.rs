#![cfg(feature = "metrics")]
//! Tests for `endrpc` metrics.
//!
//! These tests verify that counters update as expected using
//! `metrics_util::debugging::DebuggingRecorder`.
use endrpc::{Dispatcher, RequestContext, message::Request, metrics as m, middleware};
use metrics_util::debugging::{DebugValue, DebuggingRecorder, Snapshotter};
use rstest::rstest;

/// Creates a debugging recorder and snapshotter for metrics testing.
fn debugging_recorder_setup() -> (Snapshotter, DebuggingRecorder) {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    (snapshotter, recorder)
}

fn counter(snapshotter: &Snapshotter, name: &str, label: Option<(&str, &str)>) -> u64 {
    snapshotter
        .snapshot()
        .into_vec()
        .into_iter()
        .filter(|(k, _, _, _)| {
            k.key().name() == name
                && label.is_none_or(|(key, value)| {
                    k.key().labels().any(|l| l.key() == key && l.value() == value)
                })
        })
        .map(|(_, _, _, v)| match v {
            DebugValue::Counter(c) => c,
            _ => 0,
        })
        .sum()
}

fn dispatcher() -> Dispatcher {
    Dispatcher::new("metrics")
        .wrap(middleware::recover)
        .register_func("a", "ok", |c: &mut RequestContext| c.success_response("fine"))
        .and_then(|d| {
            d.register_func("a", "boom", |_: &mut RequestContext| panic!("boom"))
        })
        .expect("unique routes")
}

#[test]
fn dispatch_outcomes_are_counted() {
    let (snapshotter, recorder) = debugging_recorder_setup();
    let dispatcher = dispatcher();

    metrics::with_local_recorder(&recorder, || {
        for _ in 0..3 {
            dispatcher.do_request(Request::new("a", "ok")).expect("route exists");
        }
        let _ = dispatcher.do_request(Request::new("a", "missing"));
    });

    assert_eq!(counter(&snapshotter, m::REQUESTS_TOTAL, Some(("outcome", "handled"))), 3);
    assert_eq!(counter(&snapshotter, m::REQUESTS_TOTAL, Some(("outcome", "not_found"))), 1);
}

#[rstest]
#[case(1)]
#[case(2)]
fn recovered_panics_are_counted(#[case] expected: u64) {
    let (snapshotter, recorder) = debugging_recorder_setup();
    let dispatcher = dispatcher();

    metrics::with_local_recorder(&recorder, || {
        for _ in 0..expected {
            dispatcher.do_request(Request::new("a", "boom")).expect("route exists");
        }
    });

    assert_eq!(counter(&snapshotter, m::HANDLER_PANICS_TOTAL, None), expected);
}

#[test]
fn connection_gauge_returns_to_zero() {
    let (snapshotter, recorder) = debugging_recorder_setup();
    metrics::with_local_recorder(&recorder, || {
        m::inc_connections();
        m::inc_connections();
        m::dec_connections();
        m::dec_connections();
    });

    let gauge = snapshotter
        .snapshot()
        .into_vec()
        .into_iter()
        .find_map(|(k, _, _, v)| match v {
            DebugValue::Gauge(g) if k.key().name() == m::CONNECTIONS_ACTIVE => Some(g.into_inner()),
            _ => None,
        });
    assert_eq!(gauge, Some(0.0));
}
