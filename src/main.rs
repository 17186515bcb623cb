mod debug_report;

use morphon::rules::demo;
use morphon::{NoBlocking, Options, WordAnalysis, WordSynthesis, analyze_verbose_with, synthesize_verbose_with};
use std::io::{self, IsTerminal};
use tracing_subscriber::EnvFilter;

const DEBUG_ENV: &str = "MORPHON_DEBUG_RULES";

fn main() {
    init_logging();

    let config = match parse_args() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(2);
        }
    };

    let shape = match demo::inventory().shape(&config.input) {
        Ok(shape) => shape,
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(2);
        }
    };

    let compiled = match demo::grammar().compile(&Options { trace: true, ..Options::default() }) {
        Ok(compiled) => compiled,
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(1);
        }
    };

    if config.analyze {
        let mut word = WordAnalysis::new(shape);
        word.mpr.extend(config.mpr);
        if let Some(pos) = config.pos {
            word.pos.insert(pos);
        }
        let res = analyze_verbose_with(&compiled, word, &NoBlocking);
        let forms: Vec<String> = res.candidates.iter().map(|w| demo::inventory().render(&w.shape)).collect();
        debug_report::print_run("Analyzing", &config.input, &forms, &res.details, config.color);
    } else {
        let mut word = WordSynthesis::new(shape, config.pos.as_deref().unwrap_or("noun"));
        word.mpr.extend(config.mpr);
        let res = synthesize_verbose_with(&compiled, word, &NoBlocking);
        let forms: Vec<String> = res.forms.iter().map(|w| demo::inventory().render(&w.shape)).collect();
        debug_report::print_run("Synthesizing", &config.input, &forms, &res.details, config.color);
    }
}

/// `MORPHON_DEBUG_RULES=1` turns on engine tracing; otherwise `RUST_LOG` applies.
fn init_logging() {
    let filter = if std::env::var_os(DEBUG_ENV).is_some() {
        EnvFilter::new("morphon=trace")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(io::stderr).init();
}

struct CliConfig {
    input: String,
    analyze: bool,
    mpr: Vec<String>,
    pos: Option<String>,
    color: bool,
}

fn parse_args() -> Result<CliConfig, String> {
    let mut input: Option<String> = None;
    let mut analyze = false;
    let mut mpr = Vec::new();
    let mut pos = None;
    let mut color = io::stdout().is_terminal();
    let mut args = std::env::args().skip(1);

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-h" | "--help" => {
                print_help();
                std::process::exit(0);
            }
            "-V" | "--version" => {
                println!("morphon {}", env!("CARGO_PKG_VERSION"));
                std::process::exit(0);
            }
            "--color" => color = true,
            "--no-color" => color = false,
            "-a" | "--analyze" => analyze = true,
            "--mpr" => {
                let value = args.next().ok_or_else(|| "error: --mpr expects a value".to_string())?;
                mpr.push(value);
            }
            "--pos" => {
                let value = args.next().ok_or_else(|| "error: --pos expects a value".to_string())?;
                pos = Some(value);
            }
            _ if arg.starts_with("--mpr=") => mpr.push(arg.trim_start_matches("--mpr=").to_string()),
            _ if arg.starts_with("--pos=") => pos = Some(arg.trim_start_matches("--pos=").to_string()),
            _ if arg.starts_with('-') => {
                return Err(format!("error: unknown option '{arg}'"));
            }
            _ => {
                if input.is_some() {
                    return Err("error: input provided multiple times".to_string());
                }
                input = Some(arg);
            }
        }
    }

    let input = input.filter(|s| !s.trim().is_empty());
    let Some(input) = input else {
        return Err(format!("error: no input provided\n\n{}", help_text()));
    };

    Ok(CliConfig { input, analyze, mpr, pos, color })
}

fn print_help() {
    println!("{}", help_text());
}

fn help_text() -> String {
    format!(
        "morphon {version}

Run a word through the built-in demo grammar.

Usage:
  morphon [OPTIONS] <word>

Options:
  -a, --analyze          Unapply rules (surface to underlying). Default is
                         synthesis (underlying to surface).
  --mpr <feature>        Add an MPR feature to the word. Repeatable.
  --pos <pos>            Part of speech. Default for synthesis: noun.
  --color                Force ANSI color output.
  --no-color             Disable ANSI color output.
  -h, --help             Show this help message.
  -V, --version          Print version information.

Environment:
  {debug_env}=1  Log every rule attempt (same as RUST_LOG=morphon=trace).

Exit codes:
  0  Success.
  1  Internal error.
  2  Invalid arguments or unknown segments.
",
        version = env!("CARGO_PKG_VERSION"),
        debug_env = DEBUG_ENV,
    )
}
