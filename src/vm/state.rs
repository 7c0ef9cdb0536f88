use std::collections::BTreeMap;

use serde::Serialize;

use crate::ast::Var;

/// Registers, program counter and cycle counter of one machine.
/// Unset registers read as 0 and no register ever goes below 0.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MachineState {
    pc: usize,
    halted: bool,
    cycles: u64,
    x: BTreeMap<u32, u64>,
    z: BTreeMap<u32, u64>,
    y: u64,
}

impl MachineState {
    /// A fresh machine: `x1..xn` from `inputs`, every register in `vars` present at 0.
    pub fn new(inputs: &[u64], vars: impl IntoIterator<Item = Var>) -> Self {
        let mut state = MachineState::default();
        for v in vars {
            state.set(v, 0);
        }
        for (i, &value) in inputs.iter().enumerate() {
            state.set(Var::X(i as u32 + 1), value);
        }
        state
    }

    pub fn pc(&self) -> usize {
        self.pc
    }

    pub fn halted(&self) -> bool {
        self.halted
    }

    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    pub fn output(&self) -> u64 {
        self.y
    }

    pub fn get(&self, v: Var) -> u64 {
        match v {
            Var::Y => self.y,
            Var::X(i) => self.x.get(&i).copied().unwrap_or(0),
            Var::Z(i) => self.z.get(&i).copied().unwrap_or(0),
        }
    }

    pub fn set(&mut self, v: Var, value: u64) {
        match v {
            Var::Y => self.y = value,
            Var::X(i) => {
                self.x.insert(i, value);
            }
            Var::Z(i) => {
                self.z.insert(i, value);
            }
        }
    }

    /// Adds `delta`, flooring at 0.
    pub fn add(&mut self, v: Var, delta: i64) {
        let current = self.get(v);
        let next = if delta < 0 {
            current.saturating_sub(delta.unsigned_abs())
        } else {
            current.saturating_add(delta as u64)
        };
        self.set(v, next);
    }

    pub fn advance(&mut self) {
        self.pc += 1;
    }

    pub fn jump_to(&mut self, pc: usize) {
        self.pc = pc;
    }

    pub fn halt(&mut self) {
        self.halted = true;
    }

    pub fn charge(&mut self, cycles: u64) {
        self.cycles += cycles;
    }

    /// Every register that has been set, `y` first, then inputs, then temporaries.
    pub fn registers(&self) -> BTreeMap<Var, u64> {
        let mut out = BTreeMap::new();
        out.insert(Var::Y, self.y);
        out.extend(self.x.iter().map(|(&i, &v)| (Var::X(i), v)));
        out.extend(self.z.iter().map(|(&i, &v)| (Var::Z(i), v)));
        out
    }

    pub fn outcome(&self) -> RunOutcome {
        RunOutcome { output: self.y, cycles: self.cycles, registers: self.registers() }
    }
}

/// What a finished run reports to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunOutcome {
    pub output: u64,
    pub cycles: u64,
    pub registers: BTreeMap<Var, u64>,
}
