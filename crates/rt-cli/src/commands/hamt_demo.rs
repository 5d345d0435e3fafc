//! `hamt-demo`: build a persistent HAMT from `key=value` pairs on the
//! command line and show how insert/remove return new, independent
//! versions while leaving earlier ones untouched.

use rt_runtime::rt_collections::Hamt;

use crate::commands::traits::Command;
use crate::error::{CliError, Result};

/// Arguments for the `hamt-demo` subcommand.
pub struct HamtDemoArgs {
    /// `key=value` pairs to insert, in order.
    pub entries: Vec<String>,
    /// A key to remove after all entries are inserted, if any.
    pub remove: Option<String>,
}

pub struct HamtDemoCommand {
    args: HamtDemoArgs,
}

impl Command for HamtDemoCommand {
    type Args = HamtDemoArgs;

    fn new(args: HamtDemoArgs) -> Self {
        HamtDemoCommand { args }
    }

    fn execute(&self) -> Result<()> {
        run_hamt_demo(&self.args)
    }

    fn name() -> &'static str {
        "hamt-demo"
    }
}

pub fn run_hamt_demo(args: &HamtDemoArgs) -> Result<()> {
    let mut version = Hamt::<String, String>::new();
    for entry in &args.entries {
        let (key, value) = entry
            .split_once('=')
            .ok_or_else(|| CliError::Validation(format!("expected key=value, got \"{entry}\"")))?;
        version = version.insert(key.to_string(), value.to_string());
        println!("insert {key}={value} -> len {}", version.len());
    }

    if let Some(key) = &args.remove {
        let before = version.clone();
        version = version.remove(key);
        println!(
            "remove {key} -> len {} (identical to prior version: {})",
            version.len(),
            version.is_identical(&before)
        );
    }

    print!("final: {{");
    let mut first = true;
    version.for_each(|k, v| {
        if !first {
            print!(", ");
        }
        first = false;
        print!("{k}={v}");
    });
    println!("}}");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hamt_demo_builds_and_removes() {
        let args = HamtDemoArgs {
            entries: vec!["a=1".to_string(), "b=2".to_string()],
            remove: Some("a".to_string()),
        };
        assert!(run_hamt_demo(&args).is_ok());
    }

    #[test]
    fn test_hamt_demo_rejects_malformed_entry() {
        let args = HamtDemoArgs {
            entries: vec!["no-equals-sign".to_string()],
            remove: None,
        };
        assert!(matches!(run_hamt_demo(&args), Err(CliError::Validation(_))));
    }

    #[test]
    fn test_command_name() {
        assert_eq!(HamtDemoCommand::name(), "hamt-demo");
    }
}
