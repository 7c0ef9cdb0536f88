use crate::ast::{Instruction, Label, Op, Var};
use crate::env::Functions;

use super::fresh::Fresh;
use super::inline::{inline_call, Tail};
use super::ExpandError;

/// Collects the replacement for one instruction. The first instruction
/// emitted inherits the original's label.
pub(super) struct Emitter {
    pending: Option<Label>,
    out: Vec<Instruction>,
}

impl Emitter {
    pub(super) fn new(label: Option<Label>) -> Self {
        Emitter { pending: label, out: Vec::new() }
    }

    pub(super) fn emit(&mut self, op: Op) {
        let label = self.pending.take();
        self.out.push(Instruction::with_label(label, op));
    }

    /// Emits `op` under `label`. If the original label has not been placed
    /// yet it goes on a no-op in front.
    pub(super) fn emit_at(&mut self, label: Label, op: Op) {
        if self.pending.is_some() {
            self.emit(Op::Nop(Var::Y));
        }
        self.out.push(Instruction::labeled(label, op));
    }

    pub(super) fn push(&mut self, instr: Instruction) {
        match instr.label {
            Some(label) => self.emit_at(label, instr.op),
            None => self.emit(instr.op),
        }
    }

    pub(super) fn finish(self) -> Vec<Instruction> {
        self.out
    }
}

impl Instruction {
    /// One round of expansion: the instructions that replace this one, or
    /// `None` for basic instructions, which have no rewrite rule.
    pub fn expand(
        &self,
        fresh: &mut Fresh,
        functions: &Functions,
    ) -> Result<Option<Vec<Instruction>>, ExpandError> {
        let mut e = Emitter::new(self.label.clone());
        match &self.op {
            Op::Inc(_) | Op::Dec(_) | Op::Nop(_) | Op::IfNonZeroGoto { .. } => return Ok(None),

            Op::ZeroVar(v) => {
                let again = fresh.label();
                e.emit(Op::IfNonZeroGoto { var: *v, target: again.clone() });
                e.emit_at(again.clone(), Op::Dec(*v));
                e.emit(Op::IfNonZeroGoto { var: *v, target: again });
            }

            Op::GotoLabel(target) => {
                let z = fresh.temp();
                e.emit(Op::Inc(z));
                e.emit(Op::IfNonZeroGoto { var: z, target: target.clone() });
            }

            Op::ConstAssign { var, value } => {
                e.emit(Op::ZeroVar(*var));
                for _ in 0..*value {
                    e.emit(Op::Inc(*var));
                }
            }

            Op::Assign { dst, src } if dst == src => e.emit(Op::Nop(*dst)),
            Op::Assign { dst, src } => {
                // Drain src into z, clear dst, then drain z back into both.
                let z = fresh.temp();
                let drain = fresh.label();
                let clear = fresh.label();
                let refill = fresh.label();
                let done = fresh.label();
                e.emit(Op::IfNonZeroGoto { var: *src, target: drain.clone() });
                e.emit(Op::GotoLabel(clear.clone()));
                e.emit_at(drain.clone(), Op::Dec(*src));
                e.emit(Op::Inc(z));
                e.emit(Op::IfNonZeroGoto { var: *src, target: drain });
                e.emit_at(clear, Op::ZeroVar(*dst));
                e.emit(Op::IfNonZeroGoto { var: z, target: refill.clone() });
                e.emit(Op::GotoLabel(done.clone()));
                e.emit_at(refill.clone(), Op::Dec(z));
                e.emit(Op::Inc(*dst));
                e.emit(Op::Inc(*src));
                e.emit(Op::IfNonZeroGoto { var: z, target: refill });
                e.emit_at(done, Op::Nop(*dst));
            }

            Op::JumpIfZero { var, target } => {
                let skip = fresh.label();
                e.emit(Op::IfNonZeroGoto { var: *var, target: skip.clone() });
                e.emit(Op::GotoLabel(target.clone()));
                e.emit_at(skip, Op::Nop(*var));
            }

            Op::JumpIfEqualConst { var, value, target } => {
                let z = fresh.temp();
                let differ = fresh.label();
                e.emit(Op::Assign { dst: z, src: *var });
                for _ in 0..*value {
                    e.emit(Op::JumpIfZero { var: z, target: differ.clone() });
                    e.emit(Op::Dec(z));
                }
                e.emit(Op::IfNonZeroGoto { var: z, target: differ.clone() });
                e.emit(Op::GotoLabel(target.clone()));
                e.emit_at(differ, Op::Nop(*var));
            }

            Op::JumpIfEqualVar { left, right, target } if left == right => {
                e.emit(Op::GotoLabel(target.clone()));
            }
            Op::JumpIfEqualVar { left, right, target } => {
                let a = fresh.temp();
                let b = fresh.temp();
                let compare = fresh.label();
                let left_empty = fresh.label();
                let differ = fresh.label();
                e.emit(Op::Assign { dst: a, src: *left });
                e.emit(Op::Assign { dst: b, src: *right });
                e.emit_at(compare.clone(), Op::JumpIfZero { var: a, target: left_empty.clone() });
                e.emit(Op::JumpIfZero { var: b, target: differ.clone() });
                e.emit(Op::Dec(a));
                e.emit(Op::Dec(b));
                e.emit(Op::GotoLabel(compare));
                e.emit_at(left_empty, Op::JumpIfZero { var: b, target: target.clone() });
                e.emit_at(differ, Op::Nop(*left));
            }

            Op::Quote { dst, function, args } => {
                inline_call(&mut e, function, args, Tail::Assign(*dst), fresh, functions)?;
            }

            Op::JumpIfEqualFunction { var, function, args, target } => {
                inline_call(
                    &mut e,
                    function,
                    args,
                    Tail::Branch { var: *var, target },
                    fresh,
                    functions,
                )?;
            }
        }
        Ok(Some(e.finish()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Program;
    use crate::vm;

    fn expand_one(instr: Instruction) -> Vec<Instruction> {
        let p = Program::with_instructions("p", vec![instr.clone()]);
        let mut fresh = Fresh::for_program(&p);
        instr.expand(&mut fresh, &Functions::new()).unwrap().unwrap()
    }

    fn texts(instrs: &[Instruction]) -> Vec<String> {
        instrs
            .iter()
            .map(|i| match &i.label {
                Some(l) => format!("[{l}] {}", i.op),
                None => i.op.to_string(),
            })
            .collect()
    }

    #[test]
    fn basic_instructions_have_no_rule() {
        let mut fresh = Fresh::for_program(&Program::new("p"));
        let r = Instruction::new(Op::Inc(Var::Y)).expand(&mut fresh, &Functions::new()).unwrap();
        assert!(r.is_none());
    }

    #[test]
    fn zero_var_becomes_three_basic_instructions() {
        let out = expand_one(Instruction::labeled("A", Op::ZeroVar(Var::X(1))));
        assert_eq!(
            texts(&out),
            vec!["[A] IF x1 != 0 GOTO L1", "[L1] x1 <- x1 - 1", "IF x1 != 0 GOTO L1"]
        );
        assert!(out.iter().all(|i| i.is_basic()));
    }

    #[test]
    fn goto_uses_a_fresh_temporary() {
        let out = expand_one(Instruction::new(Op::GotoLabel(Label::exit())));
        assert_eq!(texts(&out), vec!["z1 <- z1 + 1", "IF z1 != 0 GOTO EXIT"]);
    }

    #[test]
    fn const_assign_zeroes_then_increments() {
        let out = expand_one(Instruction::new(Op::ConstAssign { var: Var::Y, value: 3 }));
        assert_eq!(texts(&out), vec!["y <- 0", "y <- y + 1", "y <- y + 1", "y <- y + 1"]);
    }

    #[test]
    fn self_assignment_is_a_no_op() {
        let out = expand_one(Instruction::labeled("A", Op::Assign { dst: Var::X(1), src: Var::X(1) }));
        assert_eq!(texts(&out), vec!["[A] x1 <- x1"]);
    }

    #[test]
    fn label_on_first_emitted_instruction_only() {
        let out = expand_one(Instruction::labeled("A", Op::Assign { dst: Var::Y, src: Var::X(1) }));
        assert_eq!(out[0].label, Some(Label::new("A")));
        assert_eq!(out.iter().filter(|i| i.label == Some(Label::new("A"))).count(), 1);
    }

    // Each rewrite must behave like the instruction it replaces.
    fn check_equivalent(op: Op, inputs: &[&[i64]]) {
        let original = Program::with_instructions("p", vec![Instruction::new(op.clone()), Instruction::new(Op::Inc(Var::Z(9)))]);
        let mut fresh = Fresh::for_program(&original);
        let mut body = Instruction::new(op).expand(&mut fresh, &Functions::new()).unwrap().unwrap();
        body.push(Instruction::new(Op::Inc(Var::Z(9))));
        let expanded = Program::with_instructions("p", body);
        for input in inputs {
            let a = vm::run(&original, input, &Functions::new()).unwrap();
            let b = vm::run(&expanded, input, &Functions::new()).unwrap();
            for v in original.vars() {
                assert_eq!(a.get(v), b.get(v), "{v} differs for inputs {input:?}");
            }
            assert_eq!(a.output(), b.output());
        }
    }

    #[test]
    fn assign_rule_preserves_source() {
        check_equivalent(Op::Assign { dst: Var::Y, src: Var::X(1) }, &[&[0], &[1], &[5]]);
        check_equivalent(Op::Assign { dst: Var::X(2), src: Var::X(1) }, &[&[0, 3], &[4, 9]]);
    }

    #[test]
    fn jump_rules_take_the_same_branch() {
        let target = || Label::exit();
        check_equivalent(Op::JumpIfZero { var: Var::X(1), target: target() }, &[&[0], &[2]]);
        check_equivalent(
            Op::JumpIfEqualConst { var: Var::X(1), value: 2, target: target() },
            &[&[0], &[1], &[2], &[3]],
        );
        check_equivalent(
            Op::JumpIfEqualConst { var: Var::X(1), value: 0, target: target() },
            &[&[0], &[1]],
        );
        check_equivalent(
            Op::JumpIfEqualVar { left: Var::X(1), right: Var::X(2), target: target() },
            &[&[0, 0], &[0, 1], &[1, 0], &[3, 3], &[3, 4], &[5, 2]],
        );
        check_equivalent(
            Op::JumpIfEqualVar { left: Var::X(1), right: Var::X(1), target: target() },
            &[&[0], &[4]],
        );
    }
}
