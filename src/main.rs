use std::fs;
use std::io::{self, BufRead, IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser as ClapParser, Subcommand};
use log::{debug, warn};
use serde_json::json;

use semu::ast::Program;
use semu::debugger::{Debugger, StepRecord};
use semu::diagnostic::ansi::AnsiRenderer;
use semu::diagnostic::{self, Diagnostic};
use semu::env::Functions;
use semu::expand::{self, Expander, Expansion};
use semu::history::History;
use semu::listing::{self, Summary};
use semu::{verify, vm, ProgramFile};

#[derive(ClapParser)]
#[command(name = "semu")]
#[command(about = "Run, expand and debug S-language programs")]
struct Cli {
    /// Machine-readable output, diagnostics included
    #[arg(long, global = true)]
    json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a program on the given inputs
    Run {
        /// Path to the program file (JSON)
        file: PathBuf,
        /// Expand this many rounds before running
        #[arg(long, default_value_t = 0)]
        degree: u32,
        /// Run once at every degree from 0 to the maximum
        #[arg(long, conflicts_with = "degree")]
        all_degrees: bool,
        /// Round limit when computing the maximum degree. It bounds rounds,
        /// not size; see --max-instructions
        #[arg(long, default_value_t = 64)]
        cap: u32,
        /// Fail once an expanded program would exceed this many instructions
        #[arg(long, default_value_t = expand::MAX_INSTRUCTIONS)]
        max_instructions: usize,
        /// Input values x1, x2, ...
        #[arg(allow_negative_numbers = true)]
        inputs: Vec<i64>,
    },
    /// Print the expanded program with each row's ancestry
    Expand {
        file: PathBuf,
        /// Rounds to apply; defaults to the maximum degree
        #[arg(long)]
        degree: Option<u32>,
        #[arg(long, default_value_t = 64)]
        cap: u32,
        #[arg(long, default_value_t = expand::MAX_INSTRUCTIONS)]
        max_instructions: usize,
    },
    /// Print a summary and the listing of a program
    List { file: PathBuf },
    /// Print the number of rounds needed to reach basic instructions only
    MaxDegree {
        file: PathBuf,
        #[arg(long, default_value_t = 64)]
        cap: u32,
        #[arg(long, default_value_t = expand::MAX_INSTRUCTIONS)]
        max_instructions: usize,
    },
    /// Check labels and function references without running
    Verify { file: PathBuf },
    /// Step through a program; commands are read from stdin
    Debug {
        file: PathBuf,
        #[arg(long, default_value_t = 0)]
        degree: u32,
        /// Stop before executing the instruction at this pc (0-based)
        #[arg(long = "break", value_name = "PC")]
        breakpoints: Vec<usize>,
        #[arg(allow_negative_numbers = true)]
        inputs: Vec<i64>,
    },
}

struct Reporter {
    json: bool,
    color: bool,
}

impl Reporter {
    fn emit(&self, d: &Diagnostic) {
        if self.json {
            eprintln!("{}", diagnostic::json::render(d));
        } else {
            eprint!("{}", AnsiRenderer { use_color: self.color }.render(d));
        }
    }
}

type CmdResult = Result<ExitCode, Diagnostic>;

fn load(path: &Path) -> Result<(Program, Functions), Diagnostic> {
    let text = fs::read_to_string(path)
        .map_err(|e| Diagnostic::error(format!("cannot read {}: {e}", path.display())))?;
    let file = ProgramFile::from_json(&text).map_err(|e| {
        Diagnostic::error(format!("invalid program file {}", path.display())).with_note(e.to_string())
    })?;
    let (program, functions, replaced) = file.into_parts();
    for name in replaced {
        warn!("function {name} is defined more than once; the last definition wins");
    }
    debug!("loaded {} with {} functions", program.name, functions.len());
    Ok((program, functions))
}

fn print_json(value: &serde_json::Value) {
    println!("{value}");
}

struct Bounds {
    cap: u32,
    max_instructions: usize,
}

impl Bounds {
    fn expander<'a>(&self, program: &Program, functions: &'a Functions) -> Expander<'a> {
        Expander::new(program, functions).with_limit(self.max_instructions)
    }

    fn max_degree(&self, program: &Program, functions: &Functions) -> Result<u32, Diagnostic> {
        self.expander(program, functions).max_degree(program, self.cap).map_err(|e| Diagnostic::from(&e))
    }

    fn expand(&self, program: &Program, degree: u32, functions: &Functions) -> Result<Expansion, Diagnostic> {
        self.expander(program, functions).expand(program, degree).map_err(|e| Diagnostic::from(&e))
    }
}

fn run(file: &Path, degree: u32, all_degrees: bool, bounds: &Bounds, inputs: &[i64], as_json: bool) -> CmdResult {
    let (program, functions) = load(file)?;
    let mut history = History::new();
    let degrees = if all_degrees {
        0..=bounds.max_degree(&program, &functions)?
    } else {
        degree..=degree
    };

    for d in degrees {
        let expanded = bounds.expand(&program, d, &functions)?.program;
        let state = vm::run(&expanded, inputs, &functions).map_err(|e| Diagnostic::from(&e))?;
        history.record(d, inputs, state.output(), state.cycles());
        if !all_degrees {
            let outcome = state.outcome();
            if as_json {
                print_json(&json!({ "degree": d, "output": outcome.output, "cycles": outcome.cycles, "registers": outcome.registers }));
            } else {
                println!("y = {}", outcome.output);
                println!("cycles = {}", outcome.cycles);
                for (v, value) in &outcome.registers {
                    println!("  {v} = {value}");
                }
            }
        }
    }

    if all_degrees {
        if as_json {
            print_json(&json!(history));
        } else {
            for r in history.iter() {
                println!("#{:<3} degree {:<3} y = {:<6} cycles = {}", r.run_no, r.degree, r.output, r.cycles);
            }
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn expand_cmd(file: &Path, degree: Option<u32>, bounds: &Bounds, as_json: bool) -> CmdResult {
    let (program, functions) = load(file)?;
    let degree = match degree {
        Some(d) => d,
        None => bounds.max_degree(&program, &functions)?,
    };
    let expansion = bounds.expand(&program, degree, &functions)?;
    if as_json {
        print_json(&json!({ "rounds": expansion.rounds, "program": expansion.program }));
    } else {
        print!("{}", listing::render_expansion(&expansion));
    }
    Ok(ExitCode::SUCCESS)
}

fn list(file: &Path, as_json: bool) -> CmdResult {
    let (program, _) = load(file)?;
    let summary = Summary::of(&program);
    if as_json {
        let rows: Vec<String> = listing::render(&program).lines().map(String::from).collect();
        print_json(&json!({ "summary": summary, "listing": rows }));
    } else {
        println!("{summary}");
        print!("{}", listing::render(&program));
    }
    Ok(ExitCode::SUCCESS)
}

fn max_degree(file: &Path, bounds: &Bounds, as_json: bool) -> CmdResult {
    let (program, functions) = load(file)?;
    let degree = bounds.max_degree(&program, &functions)?;
    if as_json {
        print_json(&json!({ "max_degree": degree, "cap": bounds.cap }));
    } else {
        println!("{degree}");
    }
    Ok(ExitCode::SUCCESS)
}

fn verify_cmd(file: &Path, reporter: &Reporter) -> CmdResult {
    let (program, functions) = load(file)?;
    match verify::verify(&program, &functions) {
        Ok(()) => {
            if !reporter.json {
                println!("ok");
            }
            Ok(ExitCode::SUCCESS)
        }
        Err(findings) => {
            for f in &findings {
                reporter.emit(&Diagnostic::from(f));
            }
            Ok(if verify::is_runnable(&findings) { ExitCode::SUCCESS } else { ExitCode::FAILURE })
        }
    }
}

fn print_record(r: &StepRecord, as_json: bool) {
    if as_json {
        print_json(&json!(r));
        return;
    }
    let changed: Vec<String> = r.changed.iter().map(|(v, value)| format!("{v}={value}")).collect();
    let halted = if r.halted { " halted" } else { "" };
    println!("step {} pc {} cycles {}{halted}  {}", r.step, r.pc, r.cycles, changed.join(" "));
}

fn debug_session(
    file: &Path,
    degree: u32,
    breakpoints: &[usize],
    inputs: &[i64],
    reporter: &Reporter,
) -> CmdResult {
    let (program, functions) = load(file)?;
    let program = expand::expand_to_degree(&program, degree, &functions).map_err(|e| Diagnostic::from(&e))?;
    let mut dbg = Debugger::new();
    print_record(&dbg.init(program, inputs, functions), reporter.json);
    for &pc in breakpoints {
        dbg.add_breakpoint(pc).map_err(|e| Diagnostic::from(&e))?;
    }

    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let line = line.map_err(|e| Diagnostic::error(format!("cannot read stdin: {e}")))?;
        let mut words = line.split_whitespace();
        let cmd = words.next().unwrap_or("step");
        let arg = words.next().map(str::parse::<usize>);
        let result = match (cmd, arg) {
            ("s" | "step", None) => dbg.step().map(Some),
            ("b" | "back", None) => dbg.step_back().map(Some),
            ("c" | "r" | "resume", None) => dbg.resume().map(Some),
            ("stop", None) => dbg.stop().map(Some),
            ("p" | "peek", None) => dbg.peek().map(Some),
            ("break", Some(Ok(pc))) => dbg.add_breakpoint(pc).map(|_| None),
            ("unbreak", Some(Ok(pc))) => dbg.remove_breakpoint(pc).map(|_| None),
            ("breaks", None) => dbg.breakpoints().map(|pcs| {
                let pcs: Vec<String> = pcs.iter().map(usize::to_string).collect();
                println!("breakpoints: {}", pcs.join(" "));
                None
            }),
            ("q" | "quit", None) => break,
            _ => {
                reporter.emit(
                    &Diagnostic::error(format!("unknown debugger command '{}'", line.trim()))
                        .with_suggestion("step, back, resume, stop, peek, break PC, unbreak PC, breaks, quit"),
                );
                continue;
            }
        };
        match result {
            Ok(Some(record)) => print_record(&record, reporter.json),
            Ok(None) => {}
            Err(e) => reporter.emit(&Diagnostic::from(&e)),
        }
        io::stdout().flush().ok();
    }
    Ok(ExitCode::SUCCESS)
}

fn main() -> ExitCode {
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Warn)
        .parse_default_env()
        .init();

    let cli = Cli::parse();
    let reporter = Reporter {
        json: cli.json,
        color: std::env::var_os("NO_COLOR").is_none() && io::stderr().is_terminal(),
    };

    let result = match &cli.command {
        Commands::Run { file, degree, all_degrees, cap, max_instructions, inputs } => {
            let bounds = Bounds { cap: *cap, max_instructions: *max_instructions };
            run(file, *degree, *all_degrees, &bounds, inputs, cli.json)
        }
        Commands::Expand { file, degree, cap, max_instructions } => {
            expand_cmd(file, *degree, &Bounds { cap: *cap, max_instructions: *max_instructions }, cli.json)
        }
        Commands::List { file } => list(file, cli.json),
        Commands::MaxDegree { file, cap, max_instructions } => {
            max_degree(file, &Bounds { cap: *cap, max_instructions: *max_instructions }, cli.json)
        }
        Commands::Verify { file } => verify_cmd(file, &reporter),
        Commands::Debug { file, degree, breakpoints, inputs } => {
            debug_session(file, *degree, breakpoints, inputs, &reporter)
        }
    };

    match result {
        Ok(code) => code,
        Err(d) => {
            reporter.emit(&d);
            ExitCode::FAILURE
        }
    }
}
