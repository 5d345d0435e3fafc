//! `dynrtctl` - inspection and stress-testing CLI for the dynrt core
//! runtime.
//!
//! This is the entry point for the `dynrtctl` CLI application. It uses
//! clap for argument parsing and dispatches to the allocator, collection,
//! and library-loader demo subcommands.

mod commands;
mod config;
mod error;

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use commands::{
    run_alloc_stress, run_brodnik_demo, run_hamt_demo, run_load, AllocStressArgs, BrodnikDemoArgs, HamtDemoArgs, LoadArgs,
};
use config::Config;
use error::{CliError, Result};

/// `dynrtctl` - inspect and stress the dynrt core runtime.
#[derive(Parser, Debug)]
#[command(name = "dynrtctl")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Inspection and stress-testing CLI for the dynrt core runtime", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose/debug logging.
    #[arg(short, long, global = true, env = "DYNRTCTL_VERBOSE")]
    verbose: bool,

    /// Path to a configuration file.
    #[arg(short, long, global = true, env = "DYNRTCTL_CONFIG")]
    config: Option<std::path::PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Hammer the thread-caching allocator from several threads at once.
    AllocStress(AllocStressCommand),

    /// Build a persistent HAMT from `key=value` pairs and show insert/remove.
    HamtDemo(HamtDemoCommand),

    /// Push a run of integers onto a Brodnik array and sample it.
    BrodnikDemo(BrodnikDemoCommand),

    /// Load a library into the process-wide registry (and optionally
    /// unload it again in the same run).
    Load(LoadCommand),
}

#[derive(Parser, Debug)]
struct AllocStressCommand {
    /// Allocate/free rounds per worker thread.
    #[arg(short, long)]
    iterations: Option<u32>,

    /// Number of worker threads.
    #[arg(short, long)]
    threads: Option<u32>,

    /// Size in bytes of each allocation.
    #[arg(short, long, default_value_t = 64)]
    size: usize,

    /// Bypass the bucket cache and go straight to the system allocator.
    #[arg(long)]
    purify: bool,
}

#[derive(Parser, Debug)]
struct HamtDemoCommand {
    /// `key=value` pairs to insert, in order.
    #[arg(required = true)]
    entries: Vec<String>,

    /// A key to remove after every entry has been inserted.
    #[arg(short, long)]
    remove: Option<String>,
}

#[derive(Parser, Debug)]
struct BrodnikDemoCommand {
    /// How many elements to append.
    #[arg(long, default_value_t = 1000)]
    count: usize,

    /// Indices to sample with `at` after the array is built.
    #[arg(short = 'S', long)]
    sample: Vec<usize>,
}

#[derive(Parser, Debug)]
struct LoadCommand {
    /// Path to the shared object to load.
    file: Option<String>,

    /// Prefix to use instead of deriving one from the file name.
    #[arg(short, long)]
    prefix: Option<String>,

    /// Bind as a safe-interpreter library rather than a trusted one.
    #[arg(long)]
    safe: bool,

    /// Register a built-in always-succeeding library instead of dlopening
    /// a file.
    #[arg(long)]
    demo: bool,

    /// Unload the library again immediately after loading it.
    #[arg(long)]
    then_unload: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose)?;

    let config = load_config(cli.config.as_deref())?;
    if config.alloc.purify_mode {
        rt_runtime::rt_alloc::configure(rt_runtime::rt_alloc::AllocConfig {
            purify_mode: true,
            ..Default::default()
        });
    }

    execute_command(cli.command, &config)
}

fn init_logging(verbose: bool) -> Result<()> {
    let filter = if verbose { EnvFilter::new("debug") } else { EnvFilter::new("info") };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_thread_ids(false).with_thread_names(false))
        .try_init()
        .map_err(|e| CliError::Config(format!("failed to initialize logging: {e}")))?;

    Ok(())
}

fn load_config(config_path: Option<&std::path::Path>) -> Result<Config> {
    match config_path {
        Some(path) => Config::load_from_path(path),
        None => Config::load(),
    }
}

fn execute_command(command: Commands, config: &Config) -> Result<()> {
    match command {
        Commands::AllocStress(args) => run_alloc_stress(&AllocStressArgs {
            iterations: args.iterations.unwrap_or(config.alloc.iterations),
            threads: args.threads.unwrap_or(config.alloc.threads),
            size: args.size,
            purify: args.purify || config.alloc.purify_mode,
            verbose: config.verbose,
        }),
        Commands::HamtDemo(args) => run_hamt_demo(&HamtDemoArgs {
            entries: args.entries,
            remove: args.remove,
        }),
        Commands::BrodnikDemo(args) => run_brodnik_demo(&BrodnikDemoArgs {
            count: args.count,
            sample: args.sample,
        }),
        Commands::Load(args) => run_load(&LoadArgs {
            file: args.file,
            prefix: args.prefix,
            safe: args.safe,
            demo: args.demo,
            then_unload: args.then_unload,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_alloc_stress() {
        let cli = Cli::parse_from(["dynrtctl", "alloc-stress"]);
        assert!(matches!(cli.command, Commands::AllocStress(_)));
    }

    #[test]
    fn test_cli_parse_hamt_demo_requires_entries() {
        let result = Cli::try_parse_from(["dynrtctl", "hamt-demo"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_parse_hamt_demo_with_remove() {
        let cli = Cli::parse_from(["dynrtctl", "hamt-demo", "a=1", "--remove", "a"]);
        if let Commands::HamtDemo(args) = cli.command {
            assert_eq!(args.entries, vec!["a=1".to_string()]);
            assert_eq!(args.remove, Some("a".to_string()));
        } else {
            panic!("expected HamtDemo command");
        }
    }

    #[test]
    fn test_cli_parse_brodnik_demo_default_count() {
        let cli = Cli::parse_from(["dynrtctl", "brodnik-demo"]);
        if let Commands::BrodnikDemo(args) = cli.command {
            assert_eq!(args.count, 1000);
        } else {
            panic!("expected BrodnikDemo command");
        }
    }

    #[test]
    fn test_cli_parse_load_demo() {
        let cli = Cli::parse_from(["dynrtctl", "load", "--demo", "--then-unload"]);
        if let Commands::Load(args) = cli.command {
            assert!(args.demo);
            assert!(args.then_unload);
            assert!(args.file.is_none());
        } else {
            panic!("expected Load command");
        }
    }

    #[test]
    fn test_cli_parse_global_verbose() {
        let cli = Cli::parse_from(["dynrtctl", "--verbose", "hamt-demo", "a=1"]);
        assert!(cli.verbose);
    }
}
