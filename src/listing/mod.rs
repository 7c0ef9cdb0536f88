//! Textual rendering of programs. Every row has the shape
//!
//! ```text
//! #3 (S) [ L1  ] IF x1 = 0 GOTO EXIT (2)
//! ```
//!
//! and this text is what users read and diff, so the format is fixed.

pub mod summary;

use crate::ast::{Instruction, Program};
use crate::expand::Expansion;

pub use summary::Summary;

const ANCESTOR_SEP: &str = "  >>>  ";

/// One row: 1-based number, basic/synthetic marker, label column, text, cost.
pub fn render_line(number: usize, instr: &Instruction) -> String {
    let label = match &instr.label {
        Some(l) => format!("[ {:<3} ]", l.as_str()),
        None => "[     ]".to_string(),
    };
    format!("#{number} ({}) {label} {} ({})", instr.kind(), instr.op, instr.cycles())
}

pub fn render(program: &Program) -> String {
    let mut out = String::new();
    for (i, instr) in program.instructions.iter().enumerate() {
        out.push_str(&render_line(i + 1, instr));
        out.push('\n');
    }
    out
}

/// Like [`render`], with each expanded row followed by the rows it came
/// from, nearest ancestor first.
pub fn render_expansion(expansion: &Expansion) -> String {
    let mut out = String::new();
    for (i, instr) in expansion.program.instructions.iter().enumerate() {
        out.push_str(&render_line(i + 1, instr));
        for origin in expansion.lineage.get(i).into_iter().flatten() {
            out.push_str(ANCESTOR_SEP);
            out.push_str(&render_line(origin.number, &origin.instruction));
        }
        out.push('\n');
    }
    out
}
