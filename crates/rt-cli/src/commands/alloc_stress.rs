//! `alloc-stress`: hammer the thread-caching allocator from several
//! threads at once and report its bucket/refill/spill counters.

use std::time::Instant;

use rt_runtime::rt_alloc::{self, AllocConfig};

use crate::commands::traits::Command;
use crate::error::Result;

/// Arguments for the `alloc-stress` subcommand.
pub struct AllocStressArgs {
    pub iterations: u32,
    pub threads: u32,
    pub size: usize,
    pub purify: bool,
    pub verbose: bool,
}

pub struct AllocStressCommand {
    args: AllocStressArgs,
}

impl Command for AllocStressCommand {
    type Args = AllocStressArgs;

    fn new(args: AllocStressArgs) -> Self {
        AllocStressCommand { args }
    }

    fn execute(&self) -> Result<()> {
        run_alloc_stress(&self.args)
    }

    fn name() -> &'static str {
        "alloc-stress"
    }
}

/// Spawns `args.threads` workers, each allocating and immediately freeing
/// an `args.size`-byte block `args.iterations` times, then prints the
/// shared allocator counters.
pub fn run_alloc_stress(args: &AllocStressArgs) -> Result<()> {
    if args.purify {
        rt_alloc::configure(AllocConfig {
            purify_mode: true,
            ..Default::default()
        });
    }

    let start = Instant::now();
    std::thread::scope(|scope| {
        for _ in 0..args.threads {
            scope.spawn(|| {
                for _ in 0..args.iterations {
                    if let Ok(ptr) = rt_alloc::alloc(args.size) {
                        unsafe { rt_alloc::free(ptr) };
                    }
                }
            });
        }
    });
    let elapsed = start.elapsed();

    let stats = rt_alloc::stats();
    if args.verbose {
        tracing::debug!(?stats, "allocator counters after stress run");
    }
    println!(
        "size={} bucket_allocs={} system_allocs={} refills={} spills={} frees={}",
        args.size, stats.bucket_allocs, stats.system_allocs, stats.refills, stats.spills, stats.frees
    );
    println!("✅ {} threads × {} iterations in {:.2}s", args.threads, args.iterations, elapsed.as_secs_f64());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alloc_stress_runs_without_error() {
        let args = AllocStressArgs {
            iterations: 200,
            threads: 2,
            size: 64,
            purify: false,
            verbose: false,
        };
        assert!(run_alloc_stress(&args).is_ok());
    }

    #[test]
    fn test_command_name() {
        assert_eq!(AllocStressCommand::name(), "alloc-stress");
    }
}
