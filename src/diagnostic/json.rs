use serde_json::{json, Value};

use super::{locate, Diagnostic};

/// One diagnostic as a single-line JSON object, for `--json` output.
pub fn render(d: &Diagnostic) -> String {
    let labels: Vec<Value> = d
        .labels
        .iter()
        .map(|l| {
            let mut obj = json!({
                "start": l.span.start,
                "end": l.span.end,
                "message": l.message,
                "primary": l.is_primary,
            });
            if let Some(source) = &d.source {
                let (line, col, _) = locate(source, l.span.start);
                obj["line"] = Value::from(line);
                obj["col"] = Value::from(col);
            }
            obj
        })
        .collect();

    let mut obj = json!({
        "severity": d.severity,
        "message": d.message,
        "labels": labels,
        "notes": d.notes,
    });
    if let Some(source) = &d.source {
        obj["source"] = Value::String(source.clone());
    }
    if let Some(s) = &d.suggestion {
        obj["suggestion"] = Value::String(s.clone());
    }

    serde_json::to_string(&obj)
        .unwrap_or_else(|_| r#"{"severity":"error","message":"internal error serializing diagnostic"}"#.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostic::Span;

    fn parse(s: &str) -> Value {
        serde_json::from_str(s).expect("valid JSON")
    }

    #[test]
    fn bare_error() {
        let v = parse(&render(&Diagnostic::error("undefined function: F")));
        assert_eq!(v["severity"], "error");
        assert_eq!(v["message"], "undefined function: F");
        assert!(v["labels"].as_array().unwrap().is_empty());
        assert!(v.get("suggestion").is_none());
        assert!(v.get("source").is_none());
    }

    #[test]
    fn warning_with_located_label() {
        let d = Diagnostic::warning("undefined label 'LOPP'")
            .with_span(Span { start: 20, end: 24 }, "")
            .with_source("#2 (S) [     ] GOTO LOPP (1)")
            .with_note("in program 'main'")
            .with_suggestion("did you mean 'LOOP'?");
        let v = parse(&render(&d));
        assert_eq!(v["severity"], "warning");
        let label = &v["labels"][0];
        assert_eq!(label["start"], 20);
        assert_eq!(label["end"], 24);
        assert_eq!(label["primary"], true);
        assert_eq!(label["line"], 1);
        assert_eq!(label["col"], 21);
        assert_eq!(v["notes"][0], "in program 'main'");
        assert_eq!(v["suggestion"], "did you mean 'LOOP'?");
        assert_eq!(v["source"], "#2 (S) [     ] GOTO LOPP (1)");
    }

    #[test]
    fn label_without_source_has_no_position() {
        let d = Diagnostic::error("bad").with_span(Span::at(3, 2), "here");
        let v = parse(&render(&d));
        assert!(v["labels"][0].get("line").is_none());
        assert!(v["labels"][0].get("col").is_none());
    }

    #[test]
    fn output_is_one_line() {
        let d = Diagnostic::error("multi\nline").with_note("a").with_note("b");
        assert!(!render(&d).contains('\n'));
    }
}
