use serde::Serialize;

/// One completed run within a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunRecord {
    pub run_no: usize,
    pub degree: u32,
    pub inputs: Vec<i64>,
    pub output: u64,
    pub cycles: u64,
}

/// Runs in the order they finished. Numbering starts at 1 and survives
/// nothing but `clear`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct History {
    runs: Vec<RunRecord>,
}

impl History {
    pub fn new() -> Self {
        History::default()
    }

    pub fn record(&mut self, degree: u32, inputs: &[i64], output: u64, cycles: u64) -> &RunRecord {
        let run_no = self.runs.len() + 1;
        self.runs.push(RunRecord { run_no, degree, inputs: inputs.to_vec(), output, cycles });
        &self.runs[run_no - 1]
    }

    pub fn get(&self, run_no: usize) -> Option<&RunRecord> {
        run_no.checked_sub(1).and_then(|i| self.runs.get(i))
    }

    pub fn last(&self) -> Option<&RunRecord> {
        self.runs.last()
    }

    pub fn len(&self) -> usize {
        self.runs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RunRecord> {
        self.runs.iter()
    }

    pub fn clear(&mut self) {
        self.runs.clear();
    }
}
