use std::collections::HashMap;

use crate::ast::{Label, Program};

/// Outcome of resolving a jump target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Index(usize),
    /// The label is not placed on any instruction.
    NotFound,
    /// The target is `EXIT`.
    Halt,
}

/// Label name to the index of its first occurrence. Derived from a program,
/// never stored alongside it.
#[derive(Debug, Clone, Default)]
pub struct LabelIndex {
    first: HashMap<String, usize>,
}

impl LabelIndex {
    pub fn build(program: &Program) -> Self {
        let mut first = HashMap::new();
        for (i, instr) in program.instructions.iter().enumerate() {
            if let Some(label) = &instr.label {
                if label.as_str().is_empty() || label.is_exit() {
                    continue;
                }
                first.entry(label.as_str().to_string()).or_insert(i);
            }
        }
        LabelIndex { first }
    }

    pub fn resolve(&self, label: &Label) -> Resolution {
        if label.is_exit() {
            return Resolution::Halt;
        }
        match self.first.get(label.as_str()) {
            Some(&i) => Resolution::Index(i),
            None => Resolution::NotFound,
        }
    }

    pub fn len(&self) -> usize {
        self.first.len()
    }

    pub fn is_empty(&self) -> bool {
        self.first.is_empty()
    }
}
