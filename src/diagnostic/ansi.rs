use super::{locate, Diagnostic, Severity};

/// Terminal renderer. Colour is off when stderr is not a TTY or `NO_COLOR`
/// is set; the caller decides.
pub struct AnsiRenderer {
    pub use_color: bool,
}

impl AnsiRenderer {
    fn paint(&self, code: &str, s: &str) -> String {
        if self.use_color { format!("\x1b[{code}m{s}\x1b[0m") } else { s.to_string() }
    }

    fn bold(&self, s: &str) -> String {
        self.paint("1", s)
    }

    fn severity(&self, severity: Severity) -> String {
        match severity {
            Severity::Error => self.paint("1;31", "error"),
            Severity::Warning => self.paint("1;33", "warning"),
        }
    }

    fn accent(&self, severity: Severity, s: &str) -> String {
        match severity {
            Severity::Error => self.paint("1;31", s),
            Severity::Warning => self.paint("1;33", s),
        }
    }

    fn gutter(&self, s: &str) -> String {
        self.paint("36", s)
    }

    pub fn render(&self, d: &Diagnostic) -> String {
        let mut out = format!("{}: {}\n", self.severity(d.severity), self.bold(&d.message));

        let primary = d.labels.iter().find(|l| l.is_primary);
        if let (Some(label), Some(source)) = (primary, &d.source) {
            let (line, col, text) = locate(source, label.span.start);
            let num = line.to_string();
            let pad = " ".repeat(num.len());
            let bar = self.gutter("|");
            out.push_str(&format!("{pad}{} {line}:{col}\n", self.gutter("-->")));
            out.push_str(&format!("{pad} {bar}\n"));
            out.push_str(&format!("{} {bar} {text}\n", self.gutter(&num)));

            let width = label.span.end.saturating_sub(label.span.start).max(1);
            let carets = self.accent(d.severity, &"^".repeat(width));
            let indent = " ".repeat(col - 1);
            if label.message.is_empty() {
                out.push_str(&format!("{pad} {bar} {indent}{carets}\n"));
            } else {
                let msg = self.accent(d.severity, &label.message);
                out.push_str(&format!("{pad} {bar} {indent}{carets} {msg}\n"));
            }
        }

        for note in &d.notes {
            out.push_str(&format!("  = note: {note}\n"));
        }
        if let Some(suggestion) = &d.suggestion {
            out.push_str(&format!("  = help: {suggestion}\n"));
        }
        out
    }
}
