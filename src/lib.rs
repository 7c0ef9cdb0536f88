//! Emulator, expander and reversible debugger for the S language, a
//! register machine over natural numbers.

pub mod ast;
pub mod debugger;
pub mod diagnostic;
pub mod env;
pub mod expand;
pub mod history;
pub mod lexer;
pub mod listing;
pub mod parser;
pub mod verify;
pub mod vm;

use serde::{Deserialize, Serialize};

use crate::ast::Program;
use crate::env::Functions;

/// On-disk form: a main program plus the functions it may call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramFile {
    pub program: Program,
    #[serde(default)]
    pub functions: Vec<Program>,
}

impl ProgramFile {
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// The program and its function environment. A later definition of a
    /// name replaces an earlier one; the replaced names are returned.
    pub fn into_parts(self) -> (Program, Functions, Vec<String>) {
        let mut functions = Functions::new();
        let mut replaced = Vec::new();
        for f in self.functions {
            if let Some(old) = functions.insert(f) {
                replaced.push(old.name);
            }
        }
        (self.program, functions, replaced)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Var;

    const FILE: &str = r#"{
        "program": {
            "name": "main",
            "instructions": [
                { "label": "A", "op": { "Quote": { "dst": "y", "function": "Succ", "args": "(Succ,x1)" } } }
            ]
        },
        "functions": [
            { "name": "Succ", "instructions": [
                { "op": { "Assign": { "dst": "y", "src": "x1" } } },
                { "op": { "Inc": "y" } }
            ] }
        ]
    }"#;

    #[test]
    fn reads_program_and_functions() {
        let (program, functions, replaced) = ProgramFile::from_json(FILE).unwrap().into_parts();
        assert_eq!(program.name, "main");
        assert!(functions.contains("Succ"));
        assert!(replaced.is_empty());
        let done = vm::run(&program, &[1], &functions).unwrap();
        assert_eq!(done.get(Var::Y), 3);
    }

    #[test]
    fn survives_a_json_round_trip() {
        let file = ProgramFile::from_json(FILE).unwrap();
        let text = serde_json::to_string(&file).unwrap();
        assert_eq!(ProgramFile::from_json(&text).unwrap(), file);
    }

    #[test]
    fn functions_are_optional() {
        let file = ProgramFile::from_json(r#"{"program":{"name":"p","instructions":[]}}"#).unwrap();
        assert!(file.functions.is_empty());
    }

    #[test]
    fn bad_arguments_are_rejected_at_load() {
        let text = FILE.replace("(Succ,x1)", "(Succ,x1");
        let err = ProgramFile::from_json(&text).unwrap_err();
        assert!(err.to_string().contains("position"), "{err}");
    }

    #[test]
    fn later_function_definitions_win() {
        let file = ProgramFile {
            program: Program::new("p"),
            functions: vec![Program::new("F"), Program::new("F")],
        };
        let (_, functions, replaced) = file.into_parts();
        assert_eq!(functions.len(), 1);
        assert_eq!(replaced, vec!["F"]);
    }
}
