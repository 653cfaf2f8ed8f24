// tests/render_output.rs

use pyscope::collector::{Argument, Collector, ExceptionReport, OutputStream};
use pyscope::render::{MAX_ERROR_TRACE_LINES, TextRenderer, render_failure, render_json};

fn render_all(c: &Collector) -> Vec<String> {
    let mut renderer = TextRenderer::new();
    let mut out = Vec::new();
    while let Some(event) = c.try_next_event() {
        out.push(renderer.render(&event));
    }
    out
}

#[test]
fn calls_are_indented_by_depth() {
    let c = Collector::new();
    c.add_output("process started (pid 9)", OutputStream::System);
    c.add_call("f", "a.py", 10, vec![Argument::new("n", "3")]);
    c.add_call("g", "a.py", 20, vec![Argument::new("a", "1"), Argument::new("b", "'x'")]);
    c.add_output("printing", OutputStream::Stdout);
    c.add_return("g", "42");
    c.add_output("warn", OutputStream::Stderr);
    c.add_return("f", "None");
    c.add_return("h", "7");

    assert_eq!(
        render_all(&c),
        [
            "[pyscope] process started (pid 9)",
            "→ f(n=3) [a.py:10] #1",
            "  → g(a=1, b='x') [a.py:20] #2",
            "printing",
            "  ← g = 42",
            "[stderr] warn",
            "← f = None",
            "← h = 7 (orphan)",
        ]
    );
}

#[test]
fn exceptions_show_under_their_call() {
    let c = Collector::new();
    c.add_call("f", "a.py", 1, vec![]);
    c.add_exception(ExceptionReport::new(
        "ValueError",
        "bad",
        vec!["File \"a.py\", line 2, in f".to_string()],
    ));

    let lines = render_all(&c);
    assert_eq!(lines[1], "  !! ValueError: bad\n     File \"a.py\", line 2, in f");
}

#[test]
fn json_lines_are_tagged_by_kind() {
    let c = Collector::new();
    c.add_call("f", "a.py", 1, vec![Argument::new("x", "1")]);
    let event = c.try_next_event().unwrap();

    let line = render_json(&event).unwrap();
    let value: serde_json::Value = serde_json::from_str(&line).unwrap();
    assert_eq!(value["kind"], "call");
    assert_eq!(value["call_id"], 1);
    assert_eq!(value["function_name"], "f");
    assert_eq!(value["location"]["line"], 1);
    assert_eq!(value["arguments"][0]["name"], "x");
    assert!(!line.contains('\n'));
}

#[test]
fn failure_report_is_bounded() {
    let c = Collector::new();
    let trace: Vec<String> = (0..25).map(|i| format!("frame {i}")).collect();
    c.add_exception(ExceptionReport::new("SpawnError", "no interpreter", trace));
    let exc = c.history().exceptions.remove(0);

    let report = render_failure(&exc, MAX_ERROR_TRACE_LINES);
    let lines: Vec<_> = report.lines().collect();
    assert_eq!(lines[0], "pyscope: SpawnError: no interpreter");
    assert_eq!(lines.len(), 1 + MAX_ERROR_TRACE_LINES + 1);
    assert_eq!(lines.last().copied(), Some("  ... 15 more"));
}
