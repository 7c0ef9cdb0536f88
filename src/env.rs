use std::collections::HashMap;

use crate::ast::Program;

/// The function environment of one session: function name to defining program.
///
/// Read-only once a run, expansion or debug session starts; every entry point
/// takes it explicitly and threads it through nested calls.
#[derive(Debug, Clone, Default)]
pub struct Functions {
    programs: HashMap<String, Program>,
}

impl Functions {
    pub fn new() -> Self {
        Functions::default()
    }

    /// Registers a function under its program name, replacing any previous
    /// definition with that name.
    pub fn insert(&mut self, program: Program) -> Option<Program> {
        self.programs.insert(program.name.clone(), program)
    }

    pub fn get(&self, name: &str) -> Option<&Program> {
        self.programs.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.programs.contains_key(name)
    }

    /// Function names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.programs.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.programs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.programs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Program> {
        self.programs.values()
    }
}

impl FromIterator<Program> for Functions {
    fn from_iter<I: IntoIterator<Item = Program>>(iter: I) -> Self {
        let mut functions = Functions::new();
        for p in iter {
            functions.insert(p);
        }
        functions
    }
}
