//! `load`/`unload`: drive [`rt_loader::LibraryRegistry`] from the command
//! line. Each invocation of `dynrtctl` is a fresh process, so the registry
//! it builds lives only for the one command — this demonstrates the
//! loader's API and error taxonomy rather than providing a persistent
//! session the way an embedding interpreter would.

use rt_runtime::rt_loader::{InterpId, LibraryRegistry};

use crate::commands::traits::Command;
use crate::error::Result;

/// A trivial, always-succeeding library used by `--demo` so the loader can
/// be exercised without a real shared object on disk.
unsafe extern "C" fn demo_init(_interp: InterpId) -> i32 {
    0
}

/// Arguments for the `load` subcommand.
pub struct LoadArgs {
    /// Path to the shared object to load. Ignored when `demo` is set.
    pub file: Option<String>,
    /// Prefix to use instead of deriving one from the file name.
    pub prefix: Option<String>,
    /// Bind as a safe-interpreter library rather than a trusted one.
    pub safe: bool,
    /// Register a built-in always-succeeding library instead of dlopening
    /// a file, to demo the API without needing a real `.so`.
    pub demo: bool,
    /// Unload the library again immediately after loading it, to show the
    /// full lifecycle in one run.
    pub then_unload: bool,
}

pub struct LoadCommand {
    args: LoadArgs,
}

impl Command for LoadCommand {
    type Args = LoadArgs;

    fn new(args: LoadArgs) -> Self {
        LoadCommand { args }
    }

    fn execute(&self) -> Result<()> {
        run_load(&self.args)
    }

    fn name() -> &'static str {
        "load"
    }
}

pub fn run_load(args: &LoadArgs) -> Result<()> {
    let registry = LibraryRegistry::new();
    let interp = InterpId(1);

    if args.demo {
        // static_library() registers a record with no unload entrypoint at
        // all (there is no file to ever dlclose), so --then-unload doesn't
        // apply here: the registry would correctly refuse with `Static`.
        let bind_to = Some((interp, args.safe));
        let safe_init = args.safe.then_some(demo_init as _);
        let prefix = args.prefix.as_deref().unwrap_or("Demo");
        let id = registry.static_library(prefix, demo_init, safe_init, bind_to)?;
        println!("✅ registered demo library {prefix} (id {id})");
        return Ok(());
    }

    let file = args
        .file
        .as_deref()
        .ok_or_else(|| crate::error::CliError::Validation("a file path is required unless --demo is set".to_string()))?;
    let outcome = registry.load(file, args.prefix.as_deref(), interp, args.safe)?;
    println!("✅ loaded {file} (id {}, init returned {})", outcome.library_id, outcome.completion_code);

    if args.then_unload {
        let code = registry.unload(Some(file), args.prefix.as_deref(), interp, args.safe, false)?;
        println!("✅ unloaded {file} (unload returned {code})");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_demo_registers_without_a_real_file() {
        let args = LoadArgs {
            file: None,
            prefix: Some("Demo".to_string()),
            safe: false,
            demo: true,
            then_unload: false,
        };
        assert!(run_load(&args).is_ok());
    }

    #[test]
    fn test_demo_bound_safe_when_requested() {
        let args = LoadArgs {
            file: None,
            prefix: Some("SafeDemo".to_string()),
            safe: true,
            demo: true,
            then_unload: false,
        };
        assert!(run_load(&args).is_ok());
    }

    #[test]
    fn test_missing_file_without_demo_is_rejected() {
        let args = LoadArgs {
            file: None,
            prefix: None,
            safe: false,
            demo: false,
            then_unload: false,
        };
        assert!(run_load(&args).is_err());
    }

    #[test]
    fn test_command_name() {
        assert_eq!(LoadCommand::name(), "load");
    }
}
