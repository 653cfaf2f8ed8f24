// tests/trace_dispatch.rs

mod common;
use crate::common::init_tracing;
use crate::common::recording::{Recorded, RecordingProvider};

use std::sync::Arc;

use pyscope::collector::{Collector, Event, OutputStream};
use pyscope::format::{RawValue, UNREPRESENTABLE, ValueFormatter};
use pyscope::trace::wire::{WireMessage, decode_line, encode};
use pyscope::trace::{CollectorProvider, TraceDispatcher, TraceFilter};

const CALL_F: &str = r#"{"event":"call","thread":1,"frame":100,"name":"f","file":"/w/a.py","line":3,"args":[["n",{"repr":"3"}]],"internal":false}"#;
const RETURN_F: &str = r#"{"event":"return","thread":1,"frame":100,"name":"f","value":{"repr":"6"}}"#;

#[test]
fn wire_messages_decode() {
    match decode_line(CALL_F).unwrap() {
        WireMessage::Call { name, line, args, internal, .. } => {
            assert_eq!(name, "f");
            assert_eq!(line, 3);
            assert_eq!(args, vec![("n".to_string(), RawValue::repr("3"))]);
            assert!(!internal);
        }
        other => panic!("expected call, got {other:?}"),
    }

    let exc = decode_line(
        r#"{"event":"exception","thread":1,"frame":null,"type":"ValueError","message":"bad","trace":["x"]}"#,
    )
    .unwrap();
    assert_eq!(
        exc,
        WireMessage::Exception {
            thread: 1,
            frame: None,
            exception_type: "ValueError".to_string(),
            message: "bad".to_string(),
            trace: vec!["x".to_string()],
        }
    );

    let hello = WireMessage::Hello {
        pid: 7,
        python: "3.12.0".to_string(),
        token: "t".to_string(),
    };
    let line = encode(&hello).unwrap();
    assert!(line.contains(r#""event":"hello""#));
    assert_eq!(decode_line(&line).unwrap(), hello);
}

#[test]
fn garbage_is_reported_as_malformed() {
    init_tracing();
    let provider = RecordingProvider::new();
    let mut dispatcher = TraceDispatcher::new(provider.clone());

    dispatcher.handle_line("not json\n");
    dispatcher.handle_line(r#"{"event":"teleport"}"#);
    dispatcher.handle_line("   \n");

    assert_eq!(
        provider.recorded(),
        vec![
            Recorded::Malformed("not json".to_string()),
            Recorded::Malformed(r#"{"event":"teleport"}"#.to_string()),
        ]
    );
}

#[test]
fn skipped_frames_swallow_their_return_but_not_exceptions() {
    let provider = RecordingProvider::skipping(&["helper"]);
    let mut dispatcher = TraceDispatcher::new(provider.clone());

    dispatcher.handle_line(CALL_F);
    dispatcher.handle_line(
        r#"{"event":"call","thread":1,"frame":200,"name":"helper","file":"/w/a.py","line":9,"args":[]}"#,
    );
    assert_eq!(dispatcher.skipped_frames(), 1);
    dispatcher.handle_line(
        r#"{"event":"exception","thread":1,"frame":200,"type":"KeyError","message":"'k'","trace":[]}"#,
    );
    dispatcher.handle_line(
        r#"{"event":"return","thread":1,"frame":200,"name":"helper","value":{"repr":"None"}}"#,
    );
    assert_eq!(dispatcher.skipped_frames(), 0);
    dispatcher.handle_line(RETURN_F);
    dispatcher.handle_line(r#"{"event":"dropped","count":5}"#);

    let recorded = provider.recorded();
    assert_eq!(recorded.len(), 4);
    assert!(matches!(&recorded[0], Recorded::Call { name, .. } if name == "f"));
    assert!(matches!(&recorded[1], Recorded::Exception { exception_type, .. } if exception_type == "KeyError"));
    assert!(matches!(&recorded[2], Recorded::Return { name, .. } if name == "f"));
    assert_eq!(recorded[3], Recorded::Dropped(5));
}

#[test]
fn same_frame_id_on_another_thread_is_independent() {
    let provider = RecordingProvider::skipping(&["helper"]);
    let mut dispatcher = TraceDispatcher::new(provider.clone());

    dispatcher.handle_line(
        r#"{"event":"call","thread":1,"frame":5,"name":"helper","file":"/w/a.py","line":1}"#,
    );
    dispatcher.handle_line(
        r#"{"event":"return","thread":2,"frame":5,"name":"worker","value":{"repr":"1"}}"#,
    );

    assert_eq!(
        provider.recorded(),
        vec![Recorded::Return {
            name: "worker".to_string(),
            value: RawValue::repr("1"),
        }]
    );
}

#[test]
fn reused_frame_id_clears_a_stale_skip_mark() {
    let provider = RecordingProvider::skipping(&["helper"]);
    let mut dispatcher = TraceDispatcher::new(provider.clone());

    // `helper`'s return was lost in the child; the id is then reused.
    dispatcher.handle_line(
        r#"{"event":"call","thread":1,"frame":7,"name":"helper","file":"/w/a.py","line":1}"#,
    );
    dispatcher.handle_line(
        r#"{"event":"call","thread":1,"frame":7,"name":"work","file":"/w/a.py","line":5}"#,
    );
    assert_eq!(dispatcher.skipped_frames(), 0);
    dispatcher.handle_line(
        r#"{"event":"return","thread":1,"frame":7,"name":"work","value":{"repr":"1"}}"#,
    );

    let recorded = provider.recorded();
    assert_eq!(recorded.len(), 2);
    assert!(matches!(&recorded[0], Recorded::Call { name, .. } if name == "work"));
    assert!(matches!(&recorded[1], Recorded::Return { name, .. } if name == "work"));
}

#[test]
fn output_lines_keep_their_place_between_calls() {
    let provider = RecordingProvider::new();
    let mut dispatcher = TraceDispatcher::new(provider.clone());

    dispatcher.handle_line(CALL_F);
    dispatcher.handle_line(r#"{"event":"output","stream":"stdout","content":"inside f"}"#);
    dispatcher.handle_line(r#"{"event":"output","stream":"stderr","content":"warning: \"x\""}"#);
    dispatcher.handle_line(RETURN_F);
    dispatcher.handle_line(r#"{"event":"output","stream":"system","content":"spoofed"}"#);

    let recorded = provider.recorded();
    assert_eq!(recorded.len(), 5);
    assert!(matches!(&recorded[0], Recorded::Call { name, .. } if name == "f"));
    assert_eq!(
        recorded[1],
        Recorded::Output {
            stream: OutputStream::Stdout,
            content: "inside f".to_string(),
        }
    );
    assert_eq!(
        recorded[2],
        Recorded::Output {
            stream: OutputStream::Stderr,
            content: "warning: \"x\"".to_string(),
        }
    );
    assert!(matches!(&recorded[3], Recorded::Return { name, .. } if name == "f"));
    // The child cannot speak for the executor.
    assert!(matches!(&recorded[4], Recorded::Malformed(_)));
}

fn collector_dispatcher(filter: TraceFilter) -> (Arc<Collector>, TraceDispatcher<CollectorProvider>) {
    let collector = Arc::new(Collector::new());
    let provider = CollectorProvider::new(Arc::clone(&collector), filter, ValueFormatter::default());
    (collector, TraceDispatcher::new(provider))
}

#[test]
fn module_frames_are_filtered_and_nesting_is_rebuilt() {
    let (collector, mut dispatcher) = collector_dispatcher(TraceFilter::default());

    let lines = [
        r#"{"event":"call","thread":1,"frame":1,"name":"<module>","file":"/w/a.py","line":1}"#,
        r#"{"event":"call","thread":1,"frame":2,"name":"outer","file":"/w/a.py","line":4,"args":[["x",{"repr":"'hi'"}]]}"#,
        r#"{"event":"call","thread":1,"frame":3,"name":"_private","file":"/w/a.py","line":8}"#,
        r#"{"event":"call","thread":1,"frame":4,"name":"inner","file":"/w/a.py","line":12,"args":[["obj",{"error":"TypeError"}]]}"#,
        r#"{"event":"return","thread":1,"frame":4,"name":"inner","value":{"repr":"2"}}"#,
        r#"{"event":"return","thread":1,"frame":3,"name":"_private","value":{"repr":"2"}}"#,
        r#"{"event":"return","thread":1,"frame":2,"name":"outer","value":{"repr":"None"}}"#,
        r#"{"event":"return","thread":1,"frame":1,"name":"<module>","value":{"repr":"None"}}"#,
    ];
    for line in lines {
        dispatcher.handle_line(line);
    }

    let history = collector.history();
    let names: Vec<_> = history.calls.iter().map(|c| c.function_name.as_str()).collect();
    assert_eq!(names, ["outer", "inner"]);
    assert_eq!(history.calls[1].parent_id, Some(history.calls[0].call_id));
    assert_eq!(history.calls[0].argument("x"), Some("'hi'"));
    assert_eq!(history.calls[1].argument("obj"), Some(UNREPRESENTABLE));
    assert_eq!(history.calls[1].location.to_string(), "/w/a.py:12");

    assert_eq!(history.returns.len(), 2);
    assert!(history.returns.iter().all(|r| r.call_id.is_some()));
    assert!(collector.active_stack().is_empty());
    assert_eq!(collector.diagnostics(), Default::default());
}

#[test]
fn collector_provider_counts_malformed_and_dropped() {
    let (collector, mut dispatcher) = collector_dispatcher(TraceFilter::default());
    dispatcher.handle_line("{oops");
    dispatcher.handle_line(r#"{"event":"dropped","count":3}"#);
    dispatcher.handle_line(r#"{"event":"dropped","count":0}"#);

    let d = collector.diagnostics();
    assert_eq!(d.malformed_messages, 1);
    assert_eq!(d.dropped_in_child, 3);
    assert!(collector.history().is_empty());
}

#[test]
fn long_return_values_use_the_compact_bound() {
    let (collector, mut dispatcher) = collector_dispatcher(TraceFilter::default());
    let long = "9".repeat(400);
    dispatcher.handle_line(CALL_F);
    dispatcher.handle_line(&format!(
        r#"{{"event":"return","thread":1,"frame":100,"name":"f","value":{{"repr":"{long}"}}}}"#
    ));

    let ret = &collector.history().returns[0];
    assert_eq!(ret.return_value.chars().count(), 100);
    assert!(ret.return_value.ends_with("..."));
}

#[test]
fn channel_output_is_recorded_in_call_order() {
    let (collector, mut dispatcher) = collector_dispatcher(TraceFilter::default());
    dispatcher.handle_line(CALL_F);
    dispatcher.handle_line(r#"{"event":"output","stream":"stdout","content":"inside f"}"#);
    dispatcher.handle_line(RETURN_F);

    let kinds: Vec<String> = collector
        .history()
        .timeline()
        .iter()
        .map(|event| match event {
            Event::Call(c) => format!("call:{}", c.function_name),
            Event::Return(r) => format!("return:{}", r.function_name),
            Event::Output(o) => format!("{}:{}", o.stream, o.content),
            Event::Exception(e) => format!("exception:{}", e.exception_type),
        })
        .collect();
    assert_eq!(kinds, ["call:f", "stdout:inside f", "return:f"]);
}
