//! Command trait and shared result type for `dynrtctl` subcommands.

#![allow(dead_code)]

use crate::error::Result;

/// Standard command trait every `dynrtctl` subcommand implements, so the
/// dispatcher in `main.rs` can treat them uniformly.
pub trait Command {
    /// The arguments type for this command.
    type Args;

    /// Create a new command instance with the given arguments.
    fn new(args: Self::Args) -> Self;

    /// Execute the command, printing its own output.
    fn execute(&self) -> Result<()>;

    /// The command name, as it appears on the command line.
    fn name() -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Noop;

    impl Command for Noop {
        type Args = ();

        fn new(_args: ()) -> Self {
            Noop
        }

        fn execute(&self) -> Result<()> {
            Ok(())
        }

        fn name() -> &'static str {
            "noop"
        }
    }

    #[test]
    fn test_command_name_and_execute() {
        let cmd = Noop::new(());
        assert_eq!(Noop::name(), "noop");
        assert!(cmd.execute().is_ok());
    }
}
