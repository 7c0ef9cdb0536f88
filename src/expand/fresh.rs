use std::collections::HashSet;

use crate::ast::{Label, Program, Var};

/// Issues temporaries and labels that collide with nothing already in the
/// program being expanded, nor with anything issued earlier in the session.
#[derive(Debug, Clone)]
pub struct Fresh {
    next_temp: u32,
    next_label: u32,
    taken: HashSet<String>,
}

impl Fresh {
    pub fn for_program(program: &Program) -> Self {
        let taken = program.all_labels().into_iter().map(|l| l.as_str().to_string()).collect();
        Fresh { next_temp: program.max_temp_index(), next_label: 0, taken }
    }

    pub fn temp(&mut self) -> Var {
        self.next_temp += 1;
        Var::Z(self.next_temp)
    }

    /// Next unused name of the form `L<n>`.
    pub fn label(&mut self) -> Label {
        loop {
            self.next_label += 1;
            let name = format!("L{}", self.next_label);
            if self.taken.insert(name.clone()) {
                return Label::new(name);
            }
        }
    }

    pub fn temps_issued_up_to(&self) -> u32 {
        self.next_temp
    }
}
