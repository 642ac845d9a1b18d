//! Kestrel CLI

use clap::{Args, Parser, Subcommand};
use kestrel::config::RuntimeConfig;
use kestrel::error::{Error, report_error};
use kestrel::interp::{FileLoader, Interpreter, ModuleLoader};
use kestrel::repl::Repl;
use std::path::{Path, PathBuf};

/// Environment variable holding the `tracing` filter
const LOG_ENV: &str = "KESTREL_LOG";

#[derive(Parser)]
#[command(name = "kestrel", version, about = "Kestrel scripting language")]
#[command(args_conflicts_with_subcommands = true)]
struct Cli {
    /// Script to run; starts the REPL when omitted
    file: Option<PathBuf>,

    #[command(flatten)]
    runtime: RuntimeArgs,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Args)]
struct RuntimeArgs {
    /// Collect after this many allocations instead of before every one
    #[arg(long, global = true, value_name = "N")]
    gc_threshold: Option<usize>,

    /// Maximum depth of nested function calls
    #[arg(long, global = true, value_name = "N")]
    max_depth: Option<usize>,

    /// Extra directory searched by `require`
    #[arg(short = 'I', long = "include", global = true, value_name = "DIR")]
    include: Vec<PathBuf>,

    /// Show a source snippet with each error
    #[arg(long, global = true)]
    pretty: bool,
}

impl RuntimeArgs {
    fn config(&self) -> RuntimeConfig {
        let mut config = RuntimeConfig::default()
            .with_gc_threshold(self.gc_threshold)
            .with_search_paths(self.include.iter().cloned());
        if let Some(depth) = self.max_depth {
            config = config.with_max_call_depth(depth);
        }
        config
    }
}

#[derive(Subcommand)]
enum Command {
    /// Tokenize and dump tokens (debug)
    Tokens {
        /// Source file to tokenize
        file: PathBuf,
    },
    /// Parse and dump the AST as JSON (debug)
    Parse {
        /// Source file to parse
        file: PathBuf,
    },
    /// Start the interactive prompt
    Repl,
}

fn init_tracing() {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    // Only initialize if the filter variable is set
    if std::env::var(LOG_ENV).is_ok() {
        tracing_subscriber::registry()
            .with(fmt::layer().with_writer(std::io::stderr).with_target(true))
            .with(EnvFilter::from_env(LOG_ENV))
            .init();
    }
}

fn main() {
    init_tracing();
    let cli = Cli::parse();
    let config = cli.runtime.config();
    let pretty = cli.runtime.pretty;

    let ok = match (cli.command, cli.file) {
        (Some(Command::Tokens { file }), _) => report(tokenize_file(&file), None),
        (Some(Command::Parse { file }), _) => report(parse_file(&file), None),
        (Some(Command::Repl), _) | (None, None) => run_repl(config),
        (None, Some(file)) => run_file(&file, config, pretty),
    };

    if !ok {
        std::process::exit(-1);
    }
}

fn read_source(path: &Path) -> Result<String, Error> {
    std::fs::read_to_string(path).map_err(|source| Error::Io {
        path: path.display().to_string(),
        source,
    })
}

/// Print an error; true when there was none
fn report(result: Result<(), Error>, loader: Option<&dyn ModuleLoader>) -> bool {
    let Err(err) = result else {
        return true;
    };
    let source = loader.zip(err.location()).and_then(|(loader, (file, _))| loader.source(file));
    report_error(&err, source);
    false
}

fn run_file(path: &Path, config: RuntimeConfig, pretty: bool) -> bool {
    let file = path.display().to_string();
    let source = match read_source(path) {
        Ok(source) => source,
        Err(err) => return report(Err(err), None),
    };

    let mut loader = FileLoader::new(&config);
    loader.add_source(&file, source.clone());
    let mut interpreter = match Interpreter::with_parts(
        kestrel::interp::Environment::new(config),
        Box::new(loader),
    ) {
        Ok(interpreter) => interpreter,
        Err(err) => return report(Err(err.into()), None),
    };

    let result = interpreter
        .run_source("main", &file, &source)
        .map_err(Error::from);
    let loader = pretty.then(|| interpreter.loader());
    report(result, loader)
}

fn run_repl(config: RuntimeConfig) -> bool {
    let result = Repl::new(config).and_then(|mut repl| Ok(repl.run()?));
    match result {
        Ok(()) => true,
        Err(err) => {
            eprintln!("Error: {err}");
            false
        }
    }
}

fn tokenize_file(path: &Path) -> Result<(), Error> {
    let source = read_source(path)?;
    let tokens = kestrel::lexer::tokenize(&source, &path.display().to_string())?;
    for (tok, span) in &tokens {
        println!("{tok:?} @ {span} ({}..{})", span.start, span.end);
    }
    Ok(())
}

fn parse_file(path: &Path) -> Result<(), Error> {
    let source = read_source(path)?;
    let name = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "main".to_string());
    let module = kestrel::parser::parse_source(&name, &path.display().to_string(), &source)?;
    match serde_json::to_string_pretty(&module) {
        Ok(json) => println!("{json}"),
        Err(err) => eprintln!("cannot serialize AST: {err}"),
    }
    Ok(())
}
