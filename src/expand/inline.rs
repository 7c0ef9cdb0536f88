use std::collections::{BTreeSet, HashMap};

use log::debug;

use crate::ast::{Argument, Arguments, Label, Op, Program, Renamer, Var};
use crate::env::Functions;

use super::fresh::Fresh;
use super::rules::Emitter;
use super::ExpandError;

/// What happens with the callee's result at the end of an inlined body.
pub(super) enum Tail<'a> {
    Assign(Var),
    Branch { var: Var, target: &'a Label },
}

/// Register and label renaming for one call site.
struct CallSite {
    vars: HashMap<Var, Var>,
    labels: HashMap<Label, Label>,
    end: Label,
    arity: u32,
}

impl CallSite {
    fn new(callee: &Program, arity: usize, fresh: &mut Fresh) -> Self {
        let arity = arity as u32;
        let mut vars = HashMap::new();
        vars.insert(Var::Y, fresh.temp());

        let mut inputs: BTreeSet<Var> = callee.inputs().into_iter().collect();
        inputs.extend((1..=arity).map(Var::X));
        for v in inputs {
            vars.insert(v, fresh.temp());
        }
        for v in callee.temps() {
            vars.insert(v, fresh.temp());
        }

        // only labels the callee defines get a new name; every other target
        // leaves the callee, as a direct call does
        let mut labels = HashMap::new();
        for l in callee.defined_labels() {
            if !l.is_exit() && !l.as_str().is_empty() {
                labels.insert(l.clone(), fresh.label());
            }
        }
        let end = fresh.label();
        CallSite { vars, labels, end, arity }
    }

    /// Renamed registers that must start at 0 on every pass through the
    /// body: the result, callee temporaries and inputs no argument fills.
    fn locals(&self) -> Vec<Var> {
        let mut out: Vec<(Var, Var)> = self
            .vars
            .iter()
            .filter(|(from, _)| match from {
                Var::X(i) => *i > self.arity,
                _ => true,
            })
            .map(|(&from, &to)| (from, to))
            .collect();
        out.sort();
        out.into_iter().map(|(_, to)| to).collect()
    }
}

impl Renamer for CallSite {
    fn var(&self, v: Var) -> Var {
        self.vars.get(&v).copied().unwrap_or(v)
    }

    fn label(&self, l: &Label) -> Label {
        self.labels.get(l).cloned().unwrap_or_else(|| self.end.clone())
    }

    fn placed(&self, l: &Label) -> Option<Label> {
        self.labels.get(l).cloned()
    }
}

/// Replaces a call with a renamed copy of the callee's body. Arguments that
/// are calls themselves become nested `Quote`s, expanded in a later round.
pub(super) fn inline_call(
    e: &mut Emitter,
    function: &str,
    args: &Arguments,
    tail: Tail<'_>,
    fresh: &mut Fresh,
    functions: &Functions,
) -> Result<(), ExpandError> {
    let callee = functions
        .get(function)
        .ok_or_else(|| ExpandError::UnknownFunction { name: function.to_string() })?;
    let site = CallSite::new(callee, args.len(), fresh);
    debug!(
        "inlining {function} ({} instructions, {} registers renamed, ends at {})",
        callee.len(),
        site.vars.len(),
        site.end
    );

    for (i, arg) in args.iter().enumerate() {
        let dst = site.var(Var::X(i as u32 + 1));
        match arg {
            Argument::Var(src) => e.emit(Op::Assign { dst, src: *src }),
            Argument::Call { function, args } => {
                e.emit(Op::Quote { dst, function: function.clone(), args: args.clone() })
            }
        }
    }
    for v in site.locals() {
        e.emit(Op::ZeroVar(v));
    }
    for instr in &callee.instructions {
        e.push(instr.remap(&site));
    }

    let result = site.var(Var::Y);
    let end = site.end.clone();
    match tail {
        Tail::Assign(dst) => e.emit_at(end, Op::Assign { dst, src: result }),
        Tail::Branch { var, target } => e.emit_at(
            end,
            Op::JumpIfEqualVar { left: var, right: result, target: target.clone() },
        ),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Instruction;

    fn succ() -> Program {
        Program::with_instructions(
            "Succ",
            vec![
                Instruction::new(Op::Assign { dst: Var::Y, src: Var::X(1) }),
                Instruction::new(Op::Inc(Var::Y)),
            ],
        )
    }

    fn inline(caller: &Program, instr: &Instruction, functions: &Functions) -> Vec<String> {
        let mut fresh = Fresh::for_program(caller);
        instr
            .expand(&mut fresh, functions)
            .unwrap()
            .unwrap()
            .iter()
            .map(|i| match &i.label {
                Some(l) => format!("[{l}] {}", i.op),
                None => i.op.to_string(),
            })
            .collect()
    }

    #[test]
    fn quote_inlines_renamed_body() {
        let functions: Functions = vec![succ()].into_iter().collect();
        let call = Instruction::labeled(
            "A",
            Op::Quote { dst: Var::Y, function: "Succ".into(), args: "x1".parse().unwrap() },
        );
        let caller = Program::with_instructions("main", vec![call.clone()]);
        // y -> z1, x1 -> z2, end label L1
        assert_eq!(
            inline(&caller, &call, &functions),
            vec![
                "[A] z2 <- x1",
                "z1 <- 0",
                "z1 <- z2",
                "z1 <- z1 + 1",
                "[L1] y <- z1",
            ]
        );
    }

    #[test]
    fn callee_labels_and_exit_are_renamed() {
        let callee = Program::with_instructions(
            "F",
            vec![
                Instruction::labeled("A", Op::JumpIfZero { var: Var::X(1), target: Label::exit() }),
                Instruction::new(Op::Inc(Var::Y)),
                Instruction::new(Op::GotoLabel(Label::new("A"))),
            ],
        );
        let functions: Functions = vec![callee].into_iter().collect();
        let call = Instruction::new(Op::JumpIfEqualFunction {
            var: Var::X(2),
            function: "F".into(),
            args: "x1".parse().unwrap(),
            target: Label::new("HIT"),
        });
        let caller = Program::with_instructions(
            "main",
            vec![call.clone(), Instruction::labeled("HIT", Op::Inc(Var::Y))],
        );
        let out = inline(&caller, &call, &functions);
        // A -> L1, EXIT -> L2
        assert_eq!(out[2], "[L1] IF z2 = 0 GOTO L2");
        assert_eq!(out[4], "GOTO L1");
        assert_eq!(out[5], "[L2] IF x2 = z1 GOTO HIT");
    }

    #[test]
    fn undefined_callee_targets_leave_the_body() {
        let callee = Program::with_instructions(
            "F",
            vec![
                Instruction::new(Op::GotoLabel(Label::new("NOWHERE"))),
                Instruction::labeled("", Op::Inc(Var::Y)),
                Instruction::labeled("EXIT", Op::Inc(Var::Y)),
            ],
        );
        let functions: Functions = vec![callee].into_iter().collect();
        let call = Instruction::new(Op::Quote { dst: Var::Y, function: "F".into(), args: Arguments::default() });
        let caller = Program::with_instructions("main", vec![call.clone()]);
        // y -> z1, end label L1; placed empty and EXIT labels are dropped
        assert_eq!(
            inline(&caller, &call, &functions),
            vec!["z1 <- 0", "GOTO L1", "z1 <- z1 + 1", "z1 <- z1 + 1", "[L1] y <- z1"]
        );
    }

    #[test]
    fn nested_call_arguments_stay_quoted() {
        let functions: Functions = vec![succ()].into_iter().collect();
        let call = Instruction::new(Op::Quote {
            dst: Var::Y,
            function: "Succ".into(),
            args: "(Succ,x1)".parse().unwrap(),
        });
        let caller = Program::with_instructions("main", vec![call.clone()]);
        let out = inline(&caller, &call, &functions);
        assert_eq!(out[0], "z2 <- (Succ,x1)");
    }

    #[test]
    fn unfilled_inputs_and_callee_temps_are_cleared() {
        let callee = Program::with_instructions(
            "Add",
            vec![
                Instruction::new(Op::Assign { dst: Var::Z(1), src: Var::X(2) }),
                Instruction::new(Op::Assign { dst: Var::Y, src: Var::X(1) }),
            ],
        );
        let functions: Functions = vec![callee].into_iter().collect();
        let call = Instruction::new(Op::Quote {
            dst: Var::Y,
            function: "Add".into(),
            args: "x1".parse().unwrap(),
        });
        let caller = Program::with_instructions("main", vec![call.clone()]);
        let out = inline(&caller, &call, &functions);
        // y -> z1, x1 -> z2, x2 -> z3, z1 -> z4
        assert_eq!(&out[..4], &["z2 <- x1", "z1 <- 0", "z3 <- 0", "z4 <- 0"]);
    }

    #[test]
    fn unknown_callee_fails() {
        let call = Instruction::new(Op::Quote {
            dst: Var::Y,
            function: "Nope".into(),
            args: Arguments::default(),
        });
        let caller = Program::with_instructions("main", vec![call.clone()]);
        let mut fresh = Fresh::for_program(&caller);
        let err = call.expand(&mut fresh, &Functions::new()).unwrap_err();
        assert_eq!(err, ExpandError::UnknownFunction { name: "Nope".into() });
    }
}
