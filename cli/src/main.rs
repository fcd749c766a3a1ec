//! skobj - build sourcekitd request objects from JSON and print them
//!
//! ```text
//! skobj describe request.json            # real sourcekitd
//! skobj --in-memory describe request.json
//! skobj uid key.request key.sourcefile
//! ```

mod logger;

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use sourcekitd_object::{LoaderConfig, SourceKit, Value};

#[derive(Debug, Parser)]
#[command(name = "skobj", version, about = "Build sourcekitd request objects and print their description")]
struct Cli {
    /// Use the in-memory runtime instead of loading sourcekitd
    #[arg(long, global = true)]
    in_memory: bool,

    /// sourcekitd library file or directory (overrides SOURCEKIT_LIB_PATH)
    #[arg(long, global = true, value_name = "PATH")]
    library: Option<PathBuf>,

    /// JSON loader configuration file
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log to stderr (repeat for more detail)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the description of the request in a JSON file ("-" for stdin)
    Describe { request: PathBuf },
    /// Intern UID names and print them with their handles
    Uid {
        #[arg(required = true)]
        names: Vec<String>,
    },
}

fn loader_config(cli: &Cli) -> Result<LoaderConfig> {
    let config = match &cli.config {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config {}", path.display()))?;
            serde_json::from_str(&text).with_context(|| format!("Invalid config {}", path.display()))?
        }
        None => LoaderConfig::from_env(),
    };
    Ok(match &cli.library {
        Some(path) => config.with_library_path(path),
        None => config,
    })
}

fn open_source_kit(cli: &Cli) -> Result<SourceKit> {
    if cli.in_memory {
        log::debug!("Using in-memory runtime");
        return Ok(SourceKit::in_memory());
    }
    let config = loader_config(cli)?;
    SourceKit::load(&config).context("Could not load sourcekitd (use --in-memory to run without it)")
}

fn read_request(path: &Path) -> Result<String> {
    if path == Path::new("-") {
        return std::io::read_to_string(std::io::stdin()).context("Failed to read request from stdin");
    }
    fs::read_to_string(path).with_context(|| format!("Failed to read request {}", path.display()))
}

/// Description of the request document `text`.
fn describe(sk: &SourceKit, text: &str) -> Result<String> {
    let value = Value::from_json_str(text)?;
    let object = sk
        .object(&value)
        .context("sourcekitd did not create an object for this request")?;
    Ok(object.description())
}

/// One `name<TAB>handle` line per name.
fn intern(sk: &SourceKit, names: &[String]) -> Vec<String> {
    names
        .iter()
        .map(|name| {
            let uid = sk.uid(name);
            format!("{uid}\t{:p}", uid.raw().as_ptr())
        })
        .collect()
}

fn run(cli: &Cli) -> Result<()> {
    let sk = open_source_kit(cli)?;
    match &cli.command {
        Command::Describe { request } => {
            let text = read_request(request)?;
            println!("{}", describe(&sk, &text)?);
        }
        Command::Uid { names } => {
            for line in intern(&sk, names) {
                println!("{line}");
            }
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    logger::init(cli.verbose);

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("skobj: {e:#}");
            ExitCode::FAILURE
        }
    }
}
