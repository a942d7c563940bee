use std::ffi::OsString;
use std::path::PathBuf;
use anyhow::Context;
use clap::Parser;
use tracing::Level;
use sas_grounding::{parse_grounded_problem, parse_problem, Grounder, Problem};

/// Builds the lifted and grounded models of a PDDL task.
#[derive(Parser, Debug)]
#[command(name = "ground", version)]
struct Args {
    domain: PathBuf,
    problem: PathBuf,
    /// Translator executable, called as `<translator> [args] --sas-file <path> <domain> <problem>`
    #[arg(long, env = "SAS_TRANSLATOR", default_value = "translate.py")]
    translator: PathBuf,
    /// Extra argument passed to the translator before `--sas-file`
    #[arg(long = "translator-arg", allow_hyphen_values = true)]
    translator_args: Vec<OsString>,
    /// Directory for the translator's output file
    #[arg(long, env = "SAS_WORK_DIR")]
    work_dir: Option<PathBuf>,
    /// Keep only predicates that some action changes
    #[arg(long)]
    drop_statics: bool,
    /// Skip the translator and print the lifted model only
    #[arg(long)]
    lifted_only: bool,
    #[arg(long)]
    json: bool,
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn print_lifted(problem: &Problem) {
    println!("{}", problem.domain);
    println!("objects=[{}]", problem.objects.join(", "));
    let fluents = problem.fluents.iter().zip(problem.fluent_values.iter())
        .map(|(f, v)| format!("{}={}", f, v))
        .collect::<Vec<_>>();
    println!("fluents=[{}]", fluents.join(", "));
    let positive = problem.positive_goals.iter().map(|a| a.to_string()).collect::<Vec<_>>();
    let negative = problem.negative_goals.iter().map(|a| format!("not {}", a)).collect::<Vec<_>>();
    let numeric = problem.numeric_goals.iter().map(|c| c.to_string()).collect::<Vec<_>>();
    println!("goals=[{}]", [positive, negative, numeric].concat().join(", "));
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let level = match args.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE
    };
    tracing_subscriber::fmt().with_max_level(level).with_writer(std::io::stderr).init();

    let problem = parse_problem(&args.domain, &args.problem, !args.drop_statics)
        .with_context(|| format!("building lifted model of {}", args.problem.display()))?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&problem)?);
    } else {
        print_lifted(&problem);
    }
    if args.lifted_only {
        return Ok(());
    }

    let mut grounder = Grounder::new(args.translator.clone());
    for arg in args.translator_args.iter() {
        grounder = grounder.with_leading_arg(arg.clone());
    }
    if let Some(dir) = args.work_dir.as_ref() {
        grounder = grounder.with_work_dir(dir.clone());
    }
    let grounded = parse_grounded_problem(&args.domain, &args.problem, &grounder)
        .with_context(|| format!("grounding {} with {}", args.problem.display(), args.translator.display()))?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&grounded)?);
    } else {
        print!("{}", grounded);
    }
    Ok(())
}
