use std::fmt;

use serde::{Deserialize, Serialize};

use super::{Arguments, Label, Var};

/// The two instruction families. Only basic instructions survive full expansion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Kind {
    Basic,
    Synthetic,
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Kind::Basic => write!(f, "B"),
            Kind::Synthetic => write!(f, "S"),
        }
    }
}

/// Substitutes registers and labels, used when one program's body is
/// inlined into another.
pub trait Renamer {
    fn var(&self, v: Var) -> Var;
    /// A label used as a jump target.
    fn label(&self, l: &Label) -> Label;
    /// A label placed on an instruction. `None` drops it.
    fn placed(&self, l: &Label) -> Option<Label> {
        Some(self.label(l))
    }
}

/// The closed set of S-language operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Op {
    // ── Basic ────────────────────────────────────────────────────────
    Inc(Var),
    Dec(Var),
    Nop(Var),
    IfNonZeroGoto { var: Var, target: Label },

    // ── Synthetic ────────────────────────────────────────────────────
    ZeroVar(Var),
    GotoLabel(Label),
    ConstAssign { var: Var, value: u64 },
    Assign { dst: Var, src: Var },
    JumpIfZero { var: Var, target: Label },
    JumpIfEqualConst { var: Var, value: u64, target: Label },
    JumpIfEqualVar { left: Var, right: Var, target: Label },
    Quote { dst: Var, function: String, args: Arguments },
    JumpIfEqualFunction { var: Var, function: String, args: Arguments, target: Label },
}

impl Op {
    pub fn kind(&self) -> Kind {
        match self {
            Op::Inc(_) | Op::Dec(_) | Op::Nop(_) | Op::IfNonZeroGoto { .. } => Kind::Basic,
            _ => Kind::Synthetic,
        }
    }

    pub fn is_basic(&self) -> bool {
        self.kind() == Kind::Basic
    }

    /// Cycles charged per execution. Conditional jumps cost the same taken or not.
    pub fn cycles(&self) -> u64 {
        match self {
            Op::Inc(_) | Op::Dec(_) => 1,
            Op::Nop(_) => 0,
            Op::IfNonZeroGoto { .. } => 2,
            Op::ZeroVar(_) | Op::GotoLabel(_) => 1,
            Op::ConstAssign { .. } => 2,
            Op::Assign { .. } => 4,
            Op::JumpIfZero { .. } | Op::JumpIfEqualConst { .. } | Op::JumpIfEqualVar { .. } => 2,
            Op::Quote { .. } => 5,
            Op::JumpIfEqualFunction { .. } => 6,
        }
    }

    /// Rounds of expansion after which this kind is guaranteed to be basic.
    /// Calls have no static tier: it depends on the callee.
    pub fn tier(&self) -> Option<u32> {
        match self {
            Op::Inc(_) | Op::Dec(_) | Op::Nop(_) | Op::IfNonZeroGoto { .. } => Some(0),
            Op::ZeroVar(_) | Op::GotoLabel(_) => Some(1),
            Op::Assign { .. } | Op::ConstAssign { .. } | Op::JumpIfZero { .. } => Some(2),
            Op::JumpIfEqualConst { .. } | Op::JumpIfEqualVar { .. } => Some(3),
            Op::Quote { .. } | Op::JumpIfEqualFunction { .. } => None,
        }
    }

    /// Registers read or written, in operand order, without repeats.
    pub fn vars(&self) -> Vec<Var> {
        let mut out = match self {
            Op::Inc(v) | Op::Dec(v) | Op::Nop(v) | Op::ZeroVar(v) => vec![*v],
            Op::IfNonZeroGoto { var, .. }
            | Op::ConstAssign { var, .. }
            | Op::JumpIfZero { var, .. }
            | Op::JumpIfEqualConst { var, .. } => vec![*var],
            Op::GotoLabel(_) => vec![],
            Op::Assign { dst, src } => vec![*dst, *src],
            Op::JumpIfEqualVar { left, right, .. } => vec![*left, *right],
            Op::Quote { dst, args, .. } => {
                let mut v = vec![*dst];
                v.extend(args.vars());
                v
            }
            Op::JumpIfEqualFunction { var, args, .. } => {
                let mut v = vec![*var];
                v.extend(args.vars());
                v
            }
        };
        let mut seen = Vec::with_capacity(out.len());
        out.retain(|v| {
            if seen.contains(v) {
                false
            } else {
                seen.push(*v);
                true
            }
        });
        out
    }

    /// Labels this operation may jump to. `EXIT` is included as written.
    pub fn targets(&self) -> Vec<&Label> {
        match self {
            Op::IfNonZeroGoto { target, .. }
            | Op::GotoLabel(target)
            | Op::JumpIfZero { target, .. }
            | Op::JumpIfEqualConst { target, .. }
            | Op::JumpIfEqualVar { target, .. }
            | Op::JumpIfEqualFunction { target, .. } => vec![target],
            _ => vec![],
        }
    }

    /// Functions invoked, nested argument calls included.
    pub fn functions(&self) -> Vec<&str> {
        match self {
            Op::Quote { function, args, .. } | Op::JumpIfEqualFunction { function, args, .. } => {
                let mut out = vec![function.as_str()];
                out.extend(args.functions());
                out
            }
            _ => vec![],
        }
    }

    pub fn remap(&self, r: &impl Renamer) -> Op {
        match self {
            Op::Inc(v) => Op::Inc(r.var(*v)),
            Op::Dec(v) => Op::Dec(r.var(*v)),
            Op::Nop(v) => Op::Nop(r.var(*v)),
            Op::IfNonZeroGoto { var, target } => {
                Op::IfNonZeroGoto { var: r.var(*var), target: r.label(target) }
            }
            Op::ZeroVar(v) => Op::ZeroVar(r.var(*v)),
            Op::GotoLabel(target) => Op::GotoLabel(r.label(target)),
            Op::ConstAssign { var, value } => Op::ConstAssign { var: r.var(*var), value: *value },
            Op::Assign { dst, src } => Op::Assign { dst: r.var(*dst), src: r.var(*src) },
            Op::JumpIfZero { var, target } => {
                Op::JumpIfZero { var: r.var(*var), target: r.label(target) }
            }
            Op::JumpIfEqualConst { var, value, target } => Op::JumpIfEqualConst {
                var: r.var(*var),
                value: *value,
                target: r.label(target),
            },
            Op::JumpIfEqualVar { left, right, target } => Op::JumpIfEqualVar {
                left: r.var(*left),
                right: r.var(*right),
                target: r.label(target),
            },
            Op::Quote { dst, function, args } => Op::Quote {
                dst: r.var(*dst),
                function: function.clone(),
                args: args.remap(r),
            },
            Op::JumpIfEqualFunction { var, function, args, target } => Op::JumpIfEqualFunction {
                var: r.var(*var),
                function: function.clone(),
                args: args.remap(r),
                target: r.label(target),
            },
        }
    }
}

fn call_text(function: &str, args: &Arguments) -> String {
    if args.is_empty() {
        format!("({function})")
    } else {
        format!("({function},{args})")
    }
}

/// The user-visible source text of an operation.
impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Op::Inc(v) => write!(f, "{v} <- {v} + 1"),
            Op::Dec(v) => write!(f, "{v} <- {v} - 1"),
            Op::Nop(v) => write!(f, "{v} <- {v}"),
            Op::IfNonZeroGoto { var, target } => write!(f, "IF {var} != 0 GOTO {target}"),
            Op::ZeroVar(v) => write!(f, "{v} <- 0"),
            Op::GotoLabel(target) => write!(f, "GOTO {target}"),
            Op::ConstAssign { var, value } => write!(f, "{var} <- {value}"),
            Op::Assign { dst, src } => write!(f, "{dst} <- {src}"),
            Op::JumpIfZero { var, target } => write!(f, "IF {var} = 0 GOTO {target}"),
            Op::JumpIfEqualConst { var, value, target } => {
                write!(f, "IF {var} = {value} GOTO {target}")
            }
            Op::JumpIfEqualVar { left, right, target } => {
                write!(f, "IF {left} = {right} GOTO {target}")
            }
            Op::Quote { dst, function, args } => write!(f, "{dst} <- {}", call_text(function, args)),
            Op::JumpIfEqualFunction { var, function, args, target } => {
                write!(f, "IF {var} = {} GOTO {target}", call_text(function, args))
            }
        }
    }
}

/// An operation plus the optional label placed on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instruction {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<Label>,
    pub op: Op,
}

impl Instruction {
    pub fn new(op: Op) -> Self {
        Instruction { label: None, op }
    }

    pub fn labeled(label: impl Into<Label>, op: Op) -> Self {
        Instruction { label: Some(label.into()), op }
    }

    pub fn with_label(label: Option<Label>, op: Op) -> Self {
        Instruction { label, op }
    }

    pub fn kind(&self) -> Kind {
        self.op.kind()
    }

    pub fn is_basic(&self) -> bool {
        self.op.is_basic()
    }

    pub fn cycles(&self) -> u64 {
        self.op.cycles()
    }

    pub fn vars(&self) -> Vec<Var> {
        self.op.vars()
    }

    pub fn targets(&self) -> Vec<&Label> {
        self.op.targets()
    }

    pub fn functions(&self) -> Vec<&str> {
        self.op.functions()
    }

    pub fn text(&self) -> String {
        self.op.to_string()
    }

    pub fn remap(&self, r: &impl Renamer) -> Instruction {
        Instruction {
            label: self.label.as_ref().and_then(|l| r.placed(l)),
            op: self.op.remap(r),
        }
    }
}
