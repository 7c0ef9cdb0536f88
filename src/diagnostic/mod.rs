pub mod ansi;
pub mod json;

use serde::Serialize;

/// Byte range into a diagnostic's source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn at(start: usize, len: usize) -> Self {
        Span { start, end: start + len.max(1) }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

#[derive(Debug, Clone)]
pub struct Label {
    pub span: Span,
    pub message: String,
    pub is_primary: bool,
}

#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    pub labels: Vec<Label>,
    pub notes: Vec<String>,
    pub suggestion: Option<String>,
    pub source: Option<String>,
}

impl Diagnostic {
    pub fn error(message: impl Into<String>) -> Self {
        Diagnostic {
            severity: Severity::Error,
            message: message.into(),
            labels: Vec::new(),
            notes: Vec::new(),
            suggestion: None,
            source: None,
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Diagnostic { severity: Severity::Warning, ..Diagnostic::error(message) }
    }

    pub fn with_span(mut self, span: Span, label: impl Into<String>) -> Self {
        self.labels.push(Label { span, message: label.into(), is_primary: true });
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

/// 1-based line and column of byte `offset` in `source`, and the text of
/// that line.
pub(crate) fn locate(source: &str, offset: usize) -> (usize, usize, &str) {
    let offset = offset.min(source.len());
    let before = &source[..offset];
    let line_start = before.rfind('\n').map_or(0, |i| i + 1);
    let line = before.matches('\n').count() + 1;
    let line_end = source[line_start..].find('\n').map_or(source.len(), |i| line_start + i);
    (line, offset - line_start + 1, &source[line_start..line_end])
}

// ---- From impls for the crate's error types ----

impl From<&crate::lexer::LexError> for Diagnostic {
    fn from(e: &crate::lexer::LexError) -> Self {
        let mut d = Diagnostic::error(format!("unexpected '{}' in call arguments", e.snippet))
            .with_span(Span::at(e.position, e.snippet.len()), "here");
        if !e.suggestion.is_empty() {
            d = d.with_suggestion(e.suggestion.clone());
        }
        d
    }
}

impl From<&crate::parser::ParseError> for Diagnostic {
    fn from(e: &crate::parser::ParseError) -> Self {
        Diagnostic::error(&e.message).with_span(Span::at(e.position, 1), "here")
    }
}

impl From<&crate::verify::VerifyError> for Diagnostic {
    fn from(e: &crate::verify::VerifyError) -> Self {
        let mut d = match e.severity {
            Severity::Error => Diagnostic::error(&e.message),
            Severity::Warning => Diagnostic::warning(&e.message),
        }
        .with_note(format!("in program '{}'", e.function));
        if let Some(pos) = e.line.find(&e.subject) {
            d = d.with_span(Span::at(pos, e.subject.len()), "").with_source(e.line.clone());
        }
        if let Some(hint) = &e.hint {
            d = d.with_suggestion(hint.clone());
        }
        d
    }
}

impl From<&crate::vm::VmError> for Diagnostic {
    fn from(e: &crate::vm::VmError) -> Self {
        Diagnostic::error(e.to_string())
    }
}

impl From<&crate::expand::ExpandError> for Diagnostic {
    fn from(e: &crate::expand::ExpandError) -> Self {
        Diagnostic::error(e.to_string()).with_note("while expanding")
    }
}

impl From<&crate::debugger::DebugError> for Diagnostic {
    fn from(e: &crate::debugger::DebugError) -> Self {
        match e {
            crate::debugger::DebugError::Vm(inner) => Diagnostic::from(inner).with_note("while debugging"),
            other => Diagnostic::error(other.to_string()),
        }
    }
}
