use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

pub mod instruction;
pub use instruction::{Instruction, Kind, Op, Renamer};

// ---- Registers ----

/// A register reference. Indices are 1-based; `y` carries none.
///
/// The derived ordering (`y`, then inputs, then temporaries, each by index)
/// is the order registers are listed in everywhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Var {
    Y,
    X(u32),
    Z(u32),
}

impl Var {
    pub fn is_input(self) -> bool {
        matches!(self, Var::X(_))
    }

    pub fn is_temp(self) -> bool {
        matches!(self, Var::Z(_))
    }

    pub fn index(self) -> Option<u32> {
        match self {
            Var::Y => None,
            Var::X(i) | Var::Z(i) => Some(i),
        }
    }
}

impl fmt::Display for Var {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Var::Y => write!(f, "y"),
            Var::X(i) => write!(f, "x{i}"),
            Var::Z(i) => write!(f, "z{i}"),
        }
    }
}

static VAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:(y)|([xz])([1-9][0-9]*))$").expect("static regex"));

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("'{0}' is not a register; expected y, x<n> or z<n> with n >= 1")]
pub struct BadVar(pub String);

impl FromStr for Var {
    type Err = BadVar;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let caps = VAR_RE.captures(s.trim()).ok_or_else(|| BadVar(s.to_string()))?;
        if caps.get(1).is_some() {
            return Ok(Var::Y);
        }
        let index: u32 = caps[3].parse().map_err(|_| BadVar(s.to_string()))?;
        match &caps[2] {
            "x" => Ok(Var::X(index)),
            _ => Ok(Var::Z(index)),
        }
    }
}

impl Serialize for Var {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Var {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

// ---- Labels ----

/// A jump target. `EXIT` is a sentinel meaning "halt", never a real label.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Label(String);

impl Label {
    pub const EXIT: &'static str = "EXIT";

    pub fn new(name: impl Into<String>) -> Self {
        Label(name.into())
    }

    pub fn exit() -> Self {
        Label(Self::EXIT.to_string())
    }

    pub fn is_exit(&self) -> bool {
        self.0 == Self::EXIT
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Label {
    fn from(s: &str) -> Self {
        Label::new(s)
    }
}

impl From<String> for Label {
    fn from(s: String) -> Self {
        Label(s)
    }
}

// ---- Call arguments ----

/// One argument of a function call: a register, or a nested call `(Name,args...)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Argument {
    Var(Var),
    Call { function: String, args: Arguments },
}

impl Argument {
    pub fn call(function: impl Into<String>, args: Vec<Argument>) -> Self {
        Argument::Call { function: function.into(), args: Arguments(args) }
    }

    /// Registers read while evaluating this argument, nested calls included.
    fn collect_vars(&self, out: &mut Vec<Var>) {
        match self {
            Argument::Var(v) => out.push(*v),
            Argument::Call { args, .. } => {
                for a in args.iter() {
                    a.collect_vars(out);
                }
            }
        }
    }

    fn collect_functions<'a>(&'a self, out: &mut Vec<&'a str>) {
        if let Argument::Call { function, args } = self {
            out.push(function);
            for a in args.iter() {
                a.collect_functions(out);
            }
        }
    }

    fn remap(&self, renamer: &impl Renamer) -> Argument {
        match self {
            Argument::Var(v) => Argument::Var(renamer.var(*v)),
            Argument::Call { function, args } => Argument::Call {
                function: function.clone(),
                args: args.remap(renamer),
            },
        }
    }
}

impl fmt::Display for Argument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Argument::Var(v) => write!(f, "{v}"),
            Argument::Call { function, args } => {
                write!(f, "({function}")?;
                for a in args.iter() {
                    write!(f, ",{a}")?;
                }
                write!(f, ")")
            }
        }
    }
}

/// The comma-separated argument list of a call, e.g. `(Succ,x1),x2`.
/// Serializes as its text form.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Arguments(pub Vec<Argument>);

impl Arguments {
    pub fn vars(&self) -> Vec<Var> {
        let mut out = Vec::new();
        for a in &self.0 {
            a.collect_vars(&mut out);
        }
        out
    }

    pub fn functions(&self) -> Vec<&str> {
        let mut out = Vec::new();
        for a in &self.0 {
            a.collect_functions(&mut out);
        }
        out
    }

    pub fn remap(&self, renamer: &impl Renamer) -> Arguments {
        Arguments(self.0.iter().map(|a| a.remap(renamer)).collect())
    }
}

impl std::ops::Deref for Arguments {
    type Target = [Argument];
    fn deref(&self) -> &[Argument] {
        &self.0
    }
}

impl From<Vec<Argument>> for Arguments {
    fn from(args: Vec<Argument>) -> Self {
        Arguments(args)
    }
}

impl fmt::Display for Arguments {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, a) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{a}")?;
        }
        Ok(())
    }
}

impl FromStr for Arguments {
    type Err = crate::parser::ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        crate::parser::parse_arguments(s).map(Arguments)
    }
}

impl Serialize for Arguments {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Arguments {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

// ---- Programs ----

/// A named, ordered instruction list. Engines never mutate a program they
/// are handed; expansion builds a new one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Program {
    pub name: String,
    pub instructions: Vec<Instruction>,
}

impl Program {
    pub fn new(name: impl Into<String>) -> Self {
        Program { name: name.into(), instructions: Vec::new() }
    }

    pub fn with_instructions(name: impl Into<String>, instructions: Vec<Instruction>) -> Self {
        Program { name: name.into(), instructions }
    }

    pub fn push(&mut self, instruction: Instruction) -> &mut Self {
        self.instructions.push(instruction);
        self
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    pub fn get(&self, pc: usize) -> Option<&Instruction> {
        self.instructions.get(pc)
    }

    /// Every register the program mentions, in canonical order.
    pub fn vars(&self) -> BTreeSet<Var> {
        self.instructions.iter().flat_map(|i| i.vars()).collect()
    }

    pub fn inputs(&self) -> Vec<Var> {
        self.vars().into_iter().filter(|v| v.is_input()).collect()
    }

    pub fn temps(&self) -> Vec<Var> {
        self.vars().into_iter().filter(|v| v.is_temp()).collect()
    }

    pub fn max_temp_index(&self) -> u32 {
        self.vars()
            .into_iter()
            .filter_map(|v| match v {
                Var::Z(i) => Some(i),
                _ => None,
            })
            .max()
            .unwrap_or(0)
    }

    /// Labels placed on instructions, in order of first appearance.
    pub fn defined_labels(&self) -> Vec<&Label> {
        let mut seen = BTreeSet::new();
        self.instructions
            .iter()
            .filter_map(|i| i.label.as_ref())
            .filter(|l| seen.insert(l.as_str()))
            .collect()
    }

    /// Defined labels plus jump targets, in order of first appearance;
    /// `EXIT` is listed once, last, if anything jumps to it.
    pub fn all_labels(&self) -> Vec<&Label> {
        let mut seen = BTreeSet::new();
        let mut exit = None;
        let mut out = Vec::new();
        for instr in &self.instructions {
            for l in instr.label.iter().chain(instr.targets()) {
                if l.is_exit() {
                    exit = Some(l);
                } else if seen.insert(l.as_str()) {
                    out.push(l);
                }
            }
        }
        out.extend(exit);
        out
    }

    /// Names of every function called, nested argument calls included.
    pub fn called_functions(&self) -> BTreeSet<&str> {
        self.instructions.iter().flat_map(|i| i.functions()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn var_display_and_parse() {
        assert_eq!(Var::X(3).to_string(), "x3");
        assert_eq!(Var::Z(12).to_string(), "z12");
        assert_eq!(Var::Y.to_string(), "y");
        assert_eq!("x3".parse::<Var>().unwrap(), Var::X(3));
        assert_eq!("z12".parse::<Var>().unwrap(), Var::Z(12));
        assert_eq!("y".parse::<Var>().unwrap(), Var::Y);
    }

    #[test]
    fn var_rejects_zero_index_and_junk() {
        assert!("x0".parse::<Var>().is_err());
        assert!("z".parse::<Var>().is_err());
        assert!("w1".parse::<Var>().is_err());
        assert!("y1".parse::<Var>().is_err());
    }

    #[test]
    fn var_ordering_is_y_inputs_temps() {
        let mut vars = vec![Var::Z(1), Var::X(10), Var::Y, Var::X(2)];
        vars.sort();
        assert_eq!(vars, vec![Var::Y, Var::X(2), Var::X(10), Var::Z(1)]);
    }

    #[test]
    fn var_serializes_as_name() {
        let json = serde_json::to_string(&Var::X(4)).unwrap();
        assert_eq!(json, "\"x4\"");
        let back: Var = serde_json::from_str("\"z2\"").unwrap();
        assert_eq!(back, Var::Z(2));
    }

    #[test]
    fn exit_label_is_sentinel() {
        assert!(Label::exit().is_exit());
        assert!(!Label::new("L1").is_exit());
    }

    #[test]
    fn arguments_render_nested_calls() {
        let args = Arguments(vec![
            Argument::call("Minus", vec![Argument::Var(Var::X(1)), Argument::call("Const7", vec![])]),
            Argument::Var(Var::X(2)),
        ]);
        assert_eq!(args.to_string(), "(Minus,x1,(Const7)),x2");
        assert_eq!(args.vars(), vec![Var::X(1), Var::X(2)]);
        assert_eq!(args.functions(), vec!["Minus", "Const7"]);
    }

    #[test]
    fn program_collects_labels_in_order_with_exit_last() {
        let p = Program::with_instructions(
            "p",
            vec![
                Instruction::labeled("L2", Op::IfNonZeroGoto { var: Var::X(1), target: Label::exit() }),
                Instruction::new(Op::GotoLabel(Label::new("L1"))),
                Instruction::labeled("L1", Op::Inc(Var::Y)),
            ],
        );
        let names: Vec<&str> = p.all_labels().iter().map(|l| l.as_str()).collect();
        assert_eq!(names, vec!["L2", "L1", "EXIT"]);
        let defined: Vec<&str> = p.defined_labels().iter().map(|l| l.as_str()).collect();
        assert_eq!(defined, vec!["L2", "L1"]);
    }

    #[test]
    fn program_vars_and_max_temp() {
        let p = Program::with_instructions(
            "p",
            vec![
                Instruction::new(Op::Assign { dst: Var::Z(4), src: Var::X(2) }),
                Instruction::new(Op::Inc(Var::Y)),
            ],
        );
        assert_eq!(p.inputs(), vec![Var::X(2)]);
        assert_eq!(p.temps(), vec![Var::Z(4)]);
        assert_eq!(p.max_temp_index(), 4);
    }

    #[test]
    fn program_json_round_trip() {
        let p = Program::with_instructions(
            "call",
            vec![Instruction::new(Op::Quote {
                dst: Var::Y,
                function: "Succ".into(),
                args: Arguments(vec![Argument::Var(Var::X(1))]),
            })],
        );
        let json = serde_json::to_string(&p).unwrap();
        assert!(json.contains("\"x1\""));
        let back: Program = serde_json::from_str(&json).unwrap();
        assert_eq!(back, p);
    }
}
