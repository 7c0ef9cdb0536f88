use std::collections::HashSet;

use crate::ast::{Label, Program};
use crate::diagnostic::Severity;
use crate::env::Functions;
use crate::listing;

/// A problem found before running. Dangling labels are warnings, since a
/// jump to one simply halts; unknown functions fail every engine.
#[derive(Debug, Clone, PartialEq)]
pub struct VerifyError {
    pub severity: Severity,
    pub function: String,
    /// 0-based index of the offending instruction.
    pub instruction: usize,
    /// The listing row of that instruction.
    pub line: String,
    /// The name the message is about, as it appears in `line`.
    pub subject: String,
    pub message: String,
    pub hint: Option<String>,
}

impl std::fmt::Display for VerifyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "verify: {} in '{}' at #{}", self.message, self.function, self.instruction + 1)?;
        if let Some(hint) = &self.hint {
            write!(f, "\n  hint: {hint}")?;
        }
        Ok(())
    }
}

impl std::error::Error for VerifyError {}

fn closest_match<'a>(name: &str, candidates: impl Iterator<Item = &'a str>) -> Option<String> {
    let mut best: Option<(&str, usize)> = None;
    for candidate in candidates {
        let dist = levenshtein(name, candidate);
        if dist <= 3 && best.is_none_or(|(_, d)| dist < d) {
            best = Some((candidate, dist));
        }
    }
    best.map(|(s, _)| s.to_string())
}

fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    for i in 1..=a.len() {
        let mut row = vec![i; b.len() + 1];
        for j in 1..=b.len() {
            let cost = usize::from(a[i - 1] != b[j - 1]);
            row[j] = (prev[j] + 1).min(row[j - 1] + 1).min(prev[j - 1] + cost);
        }
        prev = row;
    }
    prev[b.len()]
}

struct VerifyContext<'a> {
    functions: &'a Functions,
    errors: Vec<VerifyError>,
}

impl VerifyContext<'_> {
    fn err(&mut self, severity: Severity, program: &Program, pc: usize, subject: &str, message: String, hint: Option<String>) {
        let line = listing::render_line(pc + 1, &program.instructions[pc]);
        self.errors.push(VerifyError {
            severity,
            function: program.name.clone(),
            instruction: pc,
            line,
            subject: subject.to_string(),
            message,
            hint,
        });
    }

    fn check_labels(&mut self, program: &Program) {
        let defined: Vec<&Label> = program.defined_labels();
        let mut seen = HashSet::new();
        for (pc, instr) in program.instructions.iter().enumerate() {
            if let Some(l) = &instr.label {
                if l.is_exit() {
                    self.err(
                        Severity::Warning,
                        program,
                        pc,
                        l.as_str(),
                        "EXIT placed as a label".to_string(),
                        Some("EXIT is reserved for halting; jumps to it never land here".to_string()),
                    );
                } else if !seen.insert(l.as_str()) {
                    self.err(
                        Severity::Warning,
                        program,
                        pc,
                        l.as_str(),
                        format!("duplicate label '{l}'"),
                        Some("jumps go to the first occurrence".to_string()),
                    );
                }
            }
            for target in instr.targets() {
                if target.is_exit() || defined.contains(&target) {
                    continue;
                }
                let hint = closest_match(target.as_str(), defined.iter().map(|l| l.as_str()))
                    .map(|m| format!("did you mean '{m}'? a jump to an undefined label halts"));
                self.err(
                    Severity::Warning,
                    program,
                    pc,
                    target.as_str(),
                    format!("undefined label '{target}'"),
                    hint,
                );
            }
        }
    }

    fn check_calls(&mut self, program: &Program) {
        for (pc, instr) in program.instructions.iter().enumerate() {
            let mut reported = HashSet::new();
            for name in instr.functions() {
                if self.functions.contains(name) || !reported.insert(name) {
                    continue;
                }
                let hint = closest_match(name, self.functions.names().into_iter())
                    .map(|m| format!("did you mean '{m}'?"));
                self.err(
                    Severity::Error,
                    program,
                    pc,
                    name,
                    format!("undefined function '{name}'"),
                    hint,
                );
            }
        }
    }

    fn check(&mut self, program: &Program) {
        self.check_labels(program);
        self.check_calls(program);
    }
}

/// Checks the program and every function body. Returns all findings, errors
/// and warnings alike, in program order, functions after the program.
pub fn verify(program: &Program, functions: &Functions) -> Result<(), Vec<VerifyError>> {
    let mut ctx = VerifyContext { functions, errors: Vec::new() };
    ctx.check(program);
    for name in functions.names() {
        if let Some(body) = functions.get(name) {
            ctx.check(body);
        }
    }
    if ctx.errors.is_empty() { Ok(()) } else { Err(ctx.errors) }
}

/// True when no finding is an error.
pub fn is_runnable(findings: &[VerifyError]) -> bool {
    findings.iter().all(|e| e.severity == Severity::Warning)
}
