//! CLI command definitions

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// ralphd - autonomous Ralph loop task supervisor
#[derive(Parser)]
#[command(name = "ralphd", about = "Drive an LLM through Ralph loop iterations until a task completes", version)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(short = 'l', long = "log-level", global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run one task to completion (batch mode)
    Run {
        /// The task prompt - what should the agent accomplish?
        prompt: String,

        /// Working directory for the task (default: current directory)
        #[arg(short, long)]
        dir: Option<PathBuf>,

        /// Maximum iterations before timing out
        #[arg(short, long)]
        max_iterations: Option<u32>,

        /// Skip the test backpressure check
        #[arg(long)]
        no_tests: bool,

        /// Skip the lint backpressure check
        #[arg(long)]
        no_lint: bool,

        /// Skip the typecheck backpressure check
        #[arg(long)]
        no_typecheck: bool,

        /// Explicit test command (auto-detected if omitted)
        #[arg(long)]
        test_command: Option<String>,

        /// Explicit lint command
        #[arg(long)]
        lint_command: Option<String>,
    },

    /// List the tool catalog exposed to the agent
    Tools,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_parses() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_run_command_flags() {
        let cli = Cli::parse_from([
            "ralphd",
            "run",
            "fix the failing test",
            "--max-iterations",
            "7",
            "--no-lint",
        ]);

        match cli.command {
            Command::Run {
                prompt,
                max_iterations,
                no_lint,
                no_tests,
                ..
            } => {
                assert_eq!(prompt, "fix the failing test");
                assert_eq!(max_iterations, Some(7));
                assert!(no_lint);
                assert!(!no_tests);
            }
            _ => panic!("expected Run command"),
        }
    }
}
