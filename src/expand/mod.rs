use log::debug;

use crate::ast::{Instruction, Program};
use crate::env::Functions;

pub mod fresh;
mod inline;
mod rules;

pub use fresh::Fresh;

/// Default bound on the size of an expanded program. A function that calls
/// itself more than once doubles the program every round.
pub const MAX_INSTRUCTIONS: usize = 1_000_000;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ExpandError {
    #[error("undefined function: {name}")]
    UnknownFunction { name: String },
    #[error("expansion of {program} reached {instructions} instructions, over the limit of {limit}")]
    TooLarge { program: String, instructions: usize, limit: usize },
}

/// An ancestor of an expanded instruction: its 1-based position in the
/// program it was expanded from, and the instruction itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Origin {
    pub number: usize,
    pub instruction: Instruction,
}

/// An expanded program together with where each instruction came from.
#[derive(Debug, Clone)]
pub struct Expansion {
    pub program: Program,
    /// Rounds that changed something; never more than requested.
    pub rounds: u32,
    /// Per instruction, the chain of synthetic ancestors, nearest first.
    /// Empty for instructions carried over untouched from the input.
    pub lineage: Vec<Vec<Origin>>,
}

/// Drives expansion rounds over one session. Fresh names issued by the
/// session never repeat and never collide with names in the input program.
pub struct Expander<'a> {
    functions: &'a Functions,
    fresh: Fresh,
    limit: usize,
}

/// Where an output instruction of a round came from.
#[derive(Debug, Clone, Copy)]
enum Source {
    Kept(usize),
    Expanded(usize),
}

impl<'a> Expander<'a> {
    pub fn new(program: &Program, functions: &'a Functions) -> Self {
        Expander { functions, fresh: Fresh::for_program(program), limit: MAX_INSTRUCTIONS }
    }

    /// Fails a round whose output would exceed `limit` instructions.
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Rewrites every synthetic instruction once. Returns `None` when the
    /// round would change nothing.
    fn round(&mut self, program: &Program) -> Result<Option<(Program, Vec<Source>)>, ExpandError> {
        let mut out = Vec::with_capacity(program.len());
        let mut sources = Vec::with_capacity(program.len());
        let mut rewritten = 0usize;
        for (i, instr) in program.instructions.iter().enumerate() {
            match instr.expand(&mut self.fresh, self.functions)? {
                Some(replacement) => {
                    rewritten += 1;
                    // the rest of the input contributes at least one row each
                    let size = out.len() + replacement.len() + (program.len() - i - 1);
                    if size > self.limit {
                        return Err(ExpandError::TooLarge {
                            program: program.name.clone(),
                            instructions: size,
                            limit: self.limit,
                        });
                    }
                    sources.extend(std::iter::repeat_n(Source::Expanded(i), replacement.len()));
                    out.extend(replacement);
                }
                None => {
                    sources.push(Source::Kept(i));
                    out.push(instr.clone());
                }
            }
        }
        if rewritten == 0 {
            return Ok(None);
        }
        debug!(
            "{}: rewrote {rewritten} of {} instructions, now {}",
            program.name,
            program.len(),
            out.len()
        );
        Ok(Some((Program::with_instructions(program.name.clone(), out), sources)))
    }

    /// Applies up to `degree` rounds, stopping early at a fixed point.
    pub fn expand(&mut self, program: &Program, degree: u32) -> Result<Expansion, ExpandError> {
        let mut current = program.clone();
        let mut lineage: Vec<Vec<Origin>> = vec![Vec::new(); current.len()];
        let mut rounds = 0;
        while rounds < degree {
            let Some((next, sources)) = self.round(&current)? else {
                break;
            };
            lineage = sources
                .iter()
                .map(|source| match *source {
                    Source::Kept(i) => lineage[i].clone(),
                    Source::Expanded(i) => {
                        let mut chain = Vec::with_capacity(lineage[i].len() + 1);
                        chain.push(Origin { number: i + 1, instruction: current.instructions[i].clone() });
                        chain.extend(lineage[i].iter().cloned());
                        chain
                    }
                })
                .collect();
            current = next;
            rounds += 1;
        }
        Ok(Expansion { program: current, rounds, lineage })
    }

    /// Rounds until nothing is left to rewrite, counting at most `cap`.
    pub fn max_degree(&mut self, program: &Program, cap: u32) -> Result<u32, ExpandError> {
        let mut current = program.clone();
        for degree in 0..cap {
            match self.round(&current)? {
                Some((next, _)) => current = next,
                None => return Ok(degree),
            }
        }
        Ok(cap)
    }
}

/// Expands `program` by `degree` rounds. Degree 0 returns the input as is.
pub fn expand_to_degree(program: &Program, degree: u32, functions: &Functions) -> Result<Program, ExpandError> {
    if degree == 0 {
        return Ok(program.clone());
    }
    Ok(expand_traced(program, degree, functions)?.program)
}

/// Like [`expand_to_degree`], keeping each instruction's ancestry.
pub fn expand_traced(program: &Program, degree: u32, functions: &Functions) -> Result<Expansion, ExpandError> {
    Expander::new(program, functions).expand(program, degree)
}

/// Rounds needed to reach a program with nothing left to rewrite, counting
/// at most `cap` rounds. Recursive functions never reach a fixed point and
/// report `cap`.
pub fn compute_max_degree(program: &Program, cap: u32, functions: &Functions) -> Result<u32, ExpandError> {
    Expander::new(program, functions).max_degree(program, cap)
}

/// The highest static tier in `program`, or `None` if it calls functions.
pub fn static_degree(program: &Program) -> Option<u32> {
    program.instructions.iter().try_fold(0, |acc, i| i.op.tier().map(|t| acc.max(t)))
}
