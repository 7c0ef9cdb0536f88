use std::collections::{BTreeMap, BTreeSet};

use log::debug;
use serde::Serialize;

use crate::ast::{Program, Var};
use crate::env::Functions;
use crate::vm::{self, Executor, LabelIndex, MachineState, VmError};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DebugError {
    #[error("no program loaded: call init first")]
    Uninitialized,
    #[error("breakpoint {pc} is outside the program (0..{len})")]
    BreakpointOutOfRange { pc: usize, len: usize },
    #[error(transparent)]
    Vm(#[from] VmError),
}

type DebugResult<T> = Result<T, DebugError>;

/// What every debugger operation reports back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepRecord {
    pub step: usize,
    pub pc: usize,
    pub halted: bool,
    pub cycles: u64,
    pub registers: BTreeMap<Var, u64>,
    /// Registers whose value differs from the previous snapshot.
    pub changed: BTreeMap<Var, u64>,
}

struct Session {
    program: Program,
    functions: Functions,
    labels: LabelIndex,
    state: MachineState,
    /// `snapshots[n]` is the state after step `n`; the last one equals `state`.
    snapshots: Vec<MachineState>,
    breakpoints: BTreeSet<usize>,
}

impl Session {
    fn step_no(&self) -> usize {
        self.snapshots.len() - 1
    }

    fn record(&self) -> StepRecord {
        let registers = self.state.registers();
        let changed = match self.snapshots.len() {
            0 | 1 => BTreeMap::new(),
            n => {
                let before = self.snapshots[n - 2].registers();
                registers
                    .iter()
                    .filter(|(v, value)| before.get(v) != Some(value))
                    .map(|(&v, &value)| (v, value))
                    .collect()
            }
        };
        StepRecord {
            step: self.step_no(),
            pc: self.state.pc(),
            halted: self.state.halted(),
            cycles: self.state.cycles(),
            registers,
            changed,
        }
    }

    fn step(&mut self) -> DebugResult<()> {
        if self.state.halted() {
            return Ok(());
        }
        let exec = Executor::new(&self.program, &self.labels, &self.functions);
        let mut next = self.state.clone();
        exec.step(&mut next)?;
        self.snapshots.push(next.clone());
        self.state = next;
        Ok(())
    }
}

/// Steps through one program with full-state snapshots, so any number of
/// steps can be undone.
///
/// Not safe for concurrent use; callers serialize access per session.
#[derive(Default)]
pub struct Debugger {
    session: Option<Session>,
}

impl Debugger {
    pub fn new() -> Self {
        Debugger::default()
    }

    fn session(&self) -> DebugResult<&Session> {
        self.session.as_ref().ok_or(DebugError::Uninitialized)
    }

    fn session_mut(&mut self) -> DebugResult<&mut Session> {
        self.session.as_mut().ok_or(DebugError::Uninitialized)
    }

    pub fn is_initialized(&self) -> bool {
        self.session.is_some()
    }

    /// Loads a program and resets to step 0. Breakpoints are cleared.
    pub fn init(&mut self, program: Program, inputs: &[i64], functions: Functions) -> StepRecord {
        let labels = LabelIndex::build(&program);
        let state = Executor::new(&program, &labels, &functions).initial_state(&vm::natural_inputs(inputs));
        debug!("debugger: loaded {} ({} instructions)", program.name, program.len());
        let session = Session {
            program,
            functions,
            labels,
            snapshots: vec![state.clone()],
            state,
            breakpoints: BTreeSet::new(),
        };
        let record = session.record();
        self.session = Some(session);
        record
    }

    /// The current state, without executing anything.
    pub fn peek(&self) -> DebugResult<StepRecord> {
        Ok(self.session()?.record())
    }

    /// Executes one instruction. Once halted, returns the current state unchanged.
    pub fn step(&mut self) -> DebugResult<StepRecord> {
        let s = self.session_mut()?;
        if s.state.halted() {
            let mut record = s.record();
            record.changed.clear();
            return Ok(record);
        }
        s.step()?;
        Ok(s.record())
    }

    /// Steps at least once, then until halted or the next instruction sits on
    /// a breakpoint. `changed` covers the whole resume.
    pub fn resume(&mut self) -> DebugResult<StepRecord> {
        let s = self.session_mut()?;
        let start = s.state.registers();
        if !s.state.halted() {
            s.step()?;
            while !s.state.halted() && !s.breakpoints.contains(&s.state.pc()) {
                s.step()?;
            }
        }
        let mut record = s.record();
        record.changed = record
            .registers
            .iter()
            .filter(|(v, value)| start.get(v) != Some(value))
            .map(|(&v, &value)| (v, value))
            .collect();
        Ok(record)
    }

    /// Rewinds one step by restoring the previous snapshot. No-op at step 0.
    pub fn step_back(&mut self) -> DebugResult<StepRecord> {
        let s = self.session_mut()?;
        if s.snapshots.len() > 1 {
            s.snapshots.pop();
            if let Some(prev) = s.snapshots.last() {
                s.state = prev.clone();
            }
            debug!("debugger: back to step {}", s.step_no());
        }
        Ok(s.record())
    }

    /// Forces the machine to halt, recording the forced state as a step.
    pub fn stop(&mut self) -> DebugResult<StepRecord> {
        let s = self.session_mut()?;
        if !s.state.halted() {
            s.state.halt();
            s.snapshots.push(s.state.clone());
            debug!("debugger: stopped at pc {}", s.state.pc());
        }
        Ok(s.record())
    }

    pub fn add_breakpoint(&mut self, pc: usize) -> DebugResult<()> {
        let s = self.session_mut()?;
        if pc >= s.program.len() {
            return Err(DebugError::BreakpointOutOfRange { pc, len: s.program.len() });
        }
        s.breakpoints.insert(pc);
        Ok(())
    }

    /// Returns whether a breakpoint was set at `pc`.
    pub fn remove_breakpoint(&mut self, pc: usize) -> DebugResult<bool> {
        Ok(self.session_mut()?.breakpoints.remove(&pc))
    }

    pub fn clear_breakpoints(&mut self) -> DebugResult<()> {
        self.session_mut()?.breakpoints.clear();
        Ok(())
    }

    pub fn has_breakpoint(&self, pc: usize) -> DebugResult<bool> {
        Ok(self.session()?.breakpoints.contains(&pc))
    }

    pub fn breakpoints(&self) -> DebugResult<Vec<usize>> {
        Ok(self.session()?.breakpoints.iter().copied().collect())
    }

    pub fn program(&self) -> DebugResult<&Program> {
        Ok(&self.session()?.program)
    }
}
