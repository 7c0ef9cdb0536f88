use std::fmt;

use serde::Serialize;

use crate::ast::{Program, Var};
use crate::expand::static_degree;

/// Counts and name sets shown above a listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub name: String,
    pub instructions: usize,
    pub basic: usize,
    pub synthetic: usize,
    pub inputs: Vec<Var>,
    pub temps: Vec<Var>,
    /// Labels in order of appearance, `EXIT` last if referenced.
    pub labels: Vec<String>,
    pub functions: Vec<String>,
    /// `None` when the program calls functions; see `compute_max_degree`.
    pub static_degree: Option<u32>,
}

impl Summary {
    pub fn of(program: &Program) -> Self {
        let basic = program.instructions.iter().filter(|i| i.is_basic()).count();
        Summary {
            name: program.name.clone(),
            instructions: program.len(),
            basic,
            synthetic: program.len() - basic,
            inputs: program.inputs(),
            temps: program.temps(),
            labels: program.all_labels().into_iter().map(|l| l.as_str().to_string()).collect(),
            functions: program.called_functions().into_iter().map(String::from).collect(),
            static_degree: static_degree(program),
        }
    }
}

fn join<T: fmt::Display>(items: &[T]) -> String {
    if items.is_empty() {
        return "-".to_string();
    }
    items.iter().map(|i| i.to_string()).collect::<Vec<_>>().join(", ")
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "program:      {}", self.name)?;
        writeln!(
            f,
            "instructions: {} ({} basic, {} synthetic)",
            self.instructions, self.basic, self.synthetic
        )?;
        writeln!(f, "inputs:       {}", join(&self.inputs))?;
        writeln!(f, "temporaries:  {}", join(&self.temps))?;
        writeln!(f, "labels:       {}", join(&self.labels))?;
        writeln!(f, "functions:    {}", join(&self.functions))?;
        match self.static_degree {
            Some(d) => writeln!(f, "degree:       {d}"),
            None => writeln!(f, "degree:       depends on called functions"),
        }
    }
}
