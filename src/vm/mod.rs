use log::{debug, trace};

use crate::ast::{Argument, Label, Op, Program, Var};
use crate::env::Functions;

pub mod labels;
pub mod state;

pub use labels::{LabelIndex, Resolution};
pub use state::{MachineState, RunOutcome};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum VmError {
    #[error("undefined function: {name}")]
    UnknownFunction { name: String },
}

type VmResult<T> = Result<T, VmError>;

/// Clamps caller-supplied inputs to natural numbers.
pub fn natural_inputs(inputs: &[i64]) -> Vec<u64> {
    inputs.iter().map(|&v| v.max(0) as u64).collect()
}

/// Runs `program` to completion on `inputs` (negative values clamp to 0).
pub fn run(program: &Program, inputs: &[i64], functions: &Functions) -> VmResult<MachineState> {
    let labels = LabelIndex::build(program);
    let exec = Executor::new(program, &labels, functions);
    exec.run(exec.initial_state(&natural_inputs(inputs)))
}

/// Dispatches instructions of one program against a machine state.
pub struct Executor<'a> {
    program: &'a Program,
    labels: &'a LabelIndex,
    functions: &'a Functions,
}

impl<'a> Executor<'a> {
    pub fn new(program: &'a Program, labels: &'a LabelIndex, functions: &'a Functions) -> Self {
        Executor { program, labels, functions }
    }

    /// A fresh state for this program, every register it mentions present at 0.
    pub fn initial_state(&self, inputs: &[u64]) -> MachineState {
        let mut vars = self.program.vars();
        vars.insert(Var::Y);
        MachineState::new(inputs, vars)
    }

    pub fn run(&self, mut state: MachineState) -> VmResult<MachineState> {
        while !state.halted() {
            self.step(&mut state)?;
        }
        Ok(state)
    }

    /// Executes the instruction at `pc`, charging its cost. Running past the
    /// last instruction halts the machine.
    pub fn step(&self, state: &mut MachineState) -> VmResult<()> {
        if state.halted() {
            return Ok(());
        }
        let Some(instr) = self.program.get(state.pc()) else {
            state.halt();
            return Ok(());
        };
        trace!("{} #{} {}", self.program.name, state.pc() + 1, instr.op);
        state.charge(instr.cycles());

        match &instr.op {
            Op::Inc(v) => {
                state.add(*v, 1);
                state.advance();
            }
            Op::Dec(v) => {
                state.add(*v, -1);
                state.advance();
            }
            Op::Nop(_) => state.advance(),
            Op::IfNonZeroGoto { var, target } => {
                let taken = state.get(*var) != 0;
                self.branch(state, taken, target);
            }
            Op::ZeroVar(v) => {
                state.set(*v, 0);
                state.advance();
            }
            Op::GotoLabel(target) => self.jump(state, target),
            Op::ConstAssign { var, value } => {
                state.set(*var, *value);
                state.advance();
            }
            Op::Assign { dst, src } => {
                let value = state.get(*src);
                state.set(*dst, value);
                state.advance();
            }
            Op::JumpIfZero { var, target } => {
                let taken = state.get(*var) == 0;
                self.branch(state, taken, target);
            }
            Op::JumpIfEqualConst { var, value, target } => {
                let taken = state.get(*var) == *value;
                self.branch(state, taken, target);
            }
            Op::JumpIfEqualVar { left, right, target } => {
                let taken = state.get(*left) == state.get(*right);
                self.branch(state, taken, target);
            }
            Op::Quote { dst, function, args } => {
                let (result, cycles) = self.call(function, args, state)?;
                state.charge(cycles);
                state.set(*dst, result);
                state.advance();
            }
            Op::JumpIfEqualFunction { var, function, args, target } => {
                let (result, cycles) = self.call(function, args, state)?;
                state.charge(cycles);
                let taken = state.get(*var) == result;
                self.branch(state, taken, target);
            }
        }

        if state.pc() >= self.program.len() {
            state.halt();
        }
        Ok(())
    }

    fn branch(&self, state: &mut MachineState, taken: bool, target: &Label) {
        if taken {
            self.jump(state, target);
        } else {
            state.advance();
        }
    }

    /// A taken jump to `EXIT` or to a label defined nowhere halts the machine.
    fn jump(&self, state: &mut MachineState, target: &Label) {
        match self.labels.resolve(target) {
            Resolution::Index(pc) => state.jump_to(pc),
            Resolution::Halt => state.halt(),
            Resolution::NotFound => {
                debug!("{}: jump to undefined label {target}, halting", self.program.name);
                state.halt();
            }
        }
    }

    /// Evaluates the arguments, runs the callee on a fresh machine and returns
    /// its output together with every cycle spent in callees.
    fn call(&self, function: &str, args: &[Argument], state: &MachineState) -> VmResult<(u64, u64)> {
        let mut values = Vec::with_capacity(args.len());
        let mut cycles = 0;
        for arg in args {
            let (value, spent) = self.evaluate(arg, state)?;
            values.push(value);
            cycles += spent;
        }
        let callee = self
            .functions
            .get(function)
            .ok_or_else(|| VmError::UnknownFunction { name: function.to_string() })?;
        let labels = LabelIndex::build(callee);
        let exec = Executor::new(callee, &labels, self.functions);
        let done = exec.run(exec.initial_state(&values))?;
        Ok((done.output(), cycles + done.cycles()))
    }

    fn evaluate(&self, arg: &Argument, state: &MachineState) -> VmResult<(u64, u64)> {
        match arg {
            Argument::Var(v) => Ok((state.get(*v), 0)),
            Argument::Call { function, args } => self.call(function, args, state),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Arguments, Instruction};

    fn prog(instrs: Vec<Instruction>) -> Program {
        Program::with_instructions("test", instrs)
    }

    fn i(op: Op) -> Instruction {
        Instruction::new(op)
    }

    fn l(label: &str, op: Op) -> Instruction {
        Instruction::labeled(label, op)
    }

    fn run_plain(p: &Program, inputs: &[i64]) -> MachineState {
        run(p, inputs, &Functions::new()).unwrap()
    }

    fn succ() -> Program {
        Program::with_instructions(
            "Succ",
            vec![i(Op::Assign { dst: Var::Y, src: Var::X(1) }), i(Op::Inc(Var::Y))],
        )
    }

    fn quote(dst: Var, function: &str, args: &str) -> Op {
        Op::Quote { dst, function: function.into(), args: args.parse().unwrap() }
    }

    #[test]
    fn empty_program_halts_immediately() {
        let s = run_plain(&prog(vec![]), &[3]);
        assert!(s.halted());
        assert_eq!(s.cycles(), 0);
        assert_eq!(s.get(Var::X(1)), 3);
    }

    #[test]
    fn inputs_clamp_negative_to_zero() {
        let s = run_plain(&prog(vec![i(Op::Nop(Var::X(2)))]), &[-4, 6]);
        assert_eq!(s.get(Var::X(1)), 0);
        assert_eq!(s.get(Var::X(2)), 6);
    }

    #[test]
    fn dec_at_zero_floors_and_still_charges() {
        let s = run_plain(&prog(vec![i(Op::Dec(Var::Y)), i(Op::Inc(Var::Y))]), &[]);
        assert_eq!(s.output(), 1);
        assert_eq!(s.cycles(), 2);
    }

    #[test]
    fn copy_loop_moves_input_to_output() {
        // y <- x1 the textbook way
        let p = prog(vec![
            l("A", Op::Dec(Var::X(1))),
            i(Op::Inc(Var::Y)),
            i(Op::IfNonZeroGoto { var: Var::X(1), target: Label::new("A") }),
        ]);
        let s = run_plain(&p, &[3]);
        assert_eq!(s.output(), 3);
        assert_eq!(s.get(Var::X(1)), 0);
        // 3 iterations of (1 + 1 + 2)
        assert_eq!(s.cycles(), 12);
    }

    #[test]
    fn branch_cost_is_the_same_taken_or_not() {
        let taken = run_plain(
            &prog(vec![i(Op::IfNonZeroGoto { var: Var::X(1), target: Label::exit() })]),
            &[1],
        );
        let not_taken = run_plain(
            &prog(vec![i(Op::IfNonZeroGoto { var: Var::X(1), target: Label::exit() })]),
            &[0],
        );
        assert_eq!(taken.cycles(), not_taken.cycles());
        assert_eq!(taken.pc(), 0);
        assert_eq!(not_taken.pc(), 1);
    }

    #[test]
    fn conditional_jumps_cost_the_same_either_way() {
        for (op, taken, not_taken) in [
            (Op::JumpIfZero { var: Var::X(1), target: Label::exit() }, vec![0], vec![1]),
            (Op::JumpIfEqualConst { var: Var::X(1), value: 2, target: Label::exit() }, vec![2], vec![3]),
            (
                Op::JumpIfEqualVar { left: Var::X(1), right: Var::X(2), target: Label::exit() },
                vec![3, 3],
                vec![3, 4],
            ),
        ] {
            let p = prog(vec![i(op.clone())]);
            let hit = run_plain(&p, &taken);
            let miss = run_plain(&p, &not_taken);
            assert_eq!(hit.cycles(), miss.cycles(), "{op}");
            assert_eq!(hit.cycles(), op.cycles(), "{op}");
            assert_eq!(hit.pc(), 0, "{op}");
            assert_eq!(miss.pc(), 1, "{op}");
        }
    }

    #[test]
    fn jump_to_exit_halts() {
        let p = prog(vec![i(Op::GotoLabel(Label::exit())), i(Op::Inc(Var::Y))]);
        let s = run_plain(&p, &[]);
        assert!(s.halted());
        assert_eq!(s.output(), 0);
        assert_eq!(s.cycles(), 1);
    }

    #[test]
    fn jump_to_undefined_label_halts_quietly() {
        let p = prog(vec![
            i(Op::JumpIfZero { var: Var::X(1), target: Label::new("NOWHERE") }),
            i(Op::Inc(Var::Y)),
        ]);
        let s = run_plain(&p, &[0]);
        assert!(s.halted());
        assert_eq!(s.output(), 0);
        let s = run_plain(&p, &[2]);
        assert_eq!(s.output(), 1);
    }

    #[test]
    fn zero_var_runs_directly() {
        let s = run_plain(&prog(vec![i(Op::ZeroVar(Var::X(1)))]), &[5]);
        assert_eq!(s.get(Var::X(1)), 0);
        assert_eq!(s.output(), 0);
        assert_eq!(s.cycles(), 1);
    }

    #[test]
    fn synthetic_assignments_and_jumps() {
        let p = prog(vec![
            i(Op::ConstAssign { var: Var::Z(1), value: 4 }),
            i(Op::JumpIfEqualVar { left: Var::Z(1), right: Var::X(1), target: Label::new("EQ") }),
            i(Op::Assign { dst: Var::Y, src: Var::X(2) }),
            i(Op::GotoLabel(Label::exit())),
            l("EQ", Op::JumpIfEqualConst { var: Var::X(2), value: 9, target: Label::new("NINE") }),
            i(Op::GotoLabel(Label::exit())),
            l("NINE", Op::ConstAssign { var: Var::Y, value: 99 }),
        ]);
        assert_eq!(run_plain(&p, &[1, 7]).output(), 7);
        assert_eq!(run_plain(&p, &[4, 7]).output(), 0);
        assert_eq!(run_plain(&p, &[4, 9]).output(), 99);
    }

    #[test]
    fn quote_runs_callee_on_fresh_machine() {
        let functions: Functions = vec![succ()].into_iter().collect();
        let p = prog(vec![i(quote(Var::Y, "Succ", "x1"))]);
        let s = run(&p, &[4], &functions).unwrap();
        assert_eq!(s.output(), 5);
        // own cost 5 + callee (assign 4 + inc 1)
        assert_eq!(s.cycles(), 10);
        assert_eq!(s.get(Var::X(1)), 4);
    }

    #[test]
    fn nested_call_arguments_accumulate_cycles() {
        let functions: Functions = vec![succ()].into_iter().collect();
        let p = prog(vec![i(quote(Var::Y, "Succ", "(Succ,x1)"))]);
        let s = run(&p, &[1], &functions).unwrap();
        assert_eq!(s.output(), 3);
        assert_eq!(s.cycles(), 5 + 5 + 5);
    }

    #[test]
    fn jump_if_equal_function_branches_on_result() {
        let functions: Functions = vec![succ()].into_iter().collect();
        let p = prog(vec![
            i(Op::JumpIfEqualFunction {
                var: Var::X(2),
                function: "Succ".into(),
                args: "x1".parse::<Arguments>().unwrap(),
                target: Label::new("HIT"),
            }),
            i(Op::GotoLabel(Label::exit())),
            l("HIT", Op::Inc(Var::Y)),
        ]);
        let hit = run(&p, &[2, 3], &functions).unwrap();
        assert_eq!(hit.output(), 1);
        assert_eq!(hit.cycles(), 6 + 5 + 1);
        let miss = run(&p, &[2, 4], &functions).unwrap();
        assert_eq!(miss.output(), 0);
        assert_eq!(miss.cycles(), 6 + 5 + 1);
    }

    #[test]
    fn unknown_function_is_an_error() {
        let p = prog(vec![i(quote(Var::Y, "Missing", "x1"))]);
        let err = run(&p, &[1], &Functions::new()).unwrap_err();
        assert_eq!(err, VmError::UnknownFunction { name: "Missing".into() });
    }

    #[test]
    fn recursion_through_the_environment() {
        // Half(x1) = 0 if x1 < 2 else Succ(Half(x1 - 2))
        let half = Program::with_instructions(
            "Half",
            vec![
                i(Op::Assign { dst: Var::Z(1), src: Var::X(1) }),
                i(Op::JumpIfZero { var: Var::Z(1), target: Label::exit() }),
                i(Op::Dec(Var::Z(1))),
                i(Op::JumpIfZero { var: Var::Z(1), target: Label::exit() }),
                i(Op::Dec(Var::Z(1))),
                i(quote(Var::Y, "Succ", "(Half,z1)")),
            ],
        );
        let functions: Functions = vec![succ(), half].into_iter().collect();
        let p = prog(vec![i(quote(Var::Y, "Half", "x1"))]);
        assert_eq!(run(&p, &[7], &functions).unwrap().output(), 3);
        assert_eq!(run(&p, &[8], &functions).unwrap().output(), 4);
    }

    #[test]
    fn same_inputs_same_cycles() {
        let functions: Functions = vec![succ()].into_iter().collect();
        let p = prog(vec![
            i(quote(Var::Z(1), "Succ", "x1")),
            l("L", Op::Dec(Var::Z(1))),
            i(Op::Inc(Var::Y)),
            i(Op::IfNonZeroGoto { var: Var::Z(1), target: Label::new("L") }),
        ]);
        let a = run(&p, &[6], &functions).unwrap();
        let b = run(&p, &[6], &functions).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.output(), 7);
    }
}
