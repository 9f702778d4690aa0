//! ralphd - CLI entry point

use clap::Parser;
use eyre::{Context, Result};
use std::sync::Arc;
use tracing::info;

use ralphd::cli::{Cli, Command};
use ralphd::config::Config;
use ralphd::domain::{RalphTask, TaskConfig, TaskStatus};
use ralphd::llm::create_client;
use ralphd::runner::TaskRunner;
use ralphd::tools::Toolkit;

fn setup_logging(level: Option<&str>) -> Result<()> {
    let level = level.unwrap_or("info").to_lowercase();
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.log_level.as_deref()).context("Failed to setup logging")?;

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    match cli.command {
        Command::Run {
            prompt,
            dir,
            max_iterations,
            no_tests,
            no_lint,
            no_typecheck,
            test_command,
            lint_command,
        } => {
            cmd_run(
                &config,
                prompt,
                dir,
                max_iterations,
                no_tests,
                no_lint,
                no_typecheck,
                test_command,
                lint_command,
            )
            .await
        }
        Command::Tools => cmd_tools(),
    }
}

#[allow(clippy::too_many_arguments)]
async fn cmd_run(
    config: &Config,
    prompt: String,
    dir: Option<std::path::PathBuf>,
    max_iterations: Option<u32>,
    no_tests: bool,
    no_lint: bool,
    no_typecheck: bool,
    test_command: Option<String>,
    lint_command: Option<String>,
) -> Result<()> {
    if let Some(max) = max_iterations
        && !(1..=1000).contains(&max)
    {
        return Err(eyre::eyre!("--max-iterations must be between 1 and 1000, got {}", max));
    }

    let working_dir = match dir {
        Some(d) => d,
        None => std::env::current_dir().context("Failed to get current directory")?,
    };
    if !working_dir.is_dir() {
        return Err(eyre::eyre!("Working directory does not exist: {}", working_dir.display()));
    }

    let llm = create_client(&config.llm).context("Failed to create LLM client")?;

    let mut task_config = TaskConfig {
        working_directory: working_dir.to_string_lossy().into_owned(),
        model: config.llm.model.clone(),
        max_tokens: config.llm.max_tokens,
        run_tests: !no_tests,
        run_lint: !no_lint,
        run_typecheck: !no_typecheck,
        test_command,
        lint_command,
        ..Default::default()
    };
    if let Some(max) = max_iterations {
        task_config.max_iterations = max;
    }

    println!("Running task in {}", working_dir.display());
    println!("  Max iterations: {}", task_config.max_iterations);
    println!();

    let task = RalphTask::new(prompt, "").with_config(task_config);
    let runner = TaskRunner::new(llm, 1);

    let id = runner.submit(task).await;
    info!(%id, "task submitted, waiting for completion");

    let finished = runner.wait(id).await.ok_or_else(|| eyre::eyre!("Task vanished before completing"))?;

    println!();
    match finished.status {
        TaskStatus::Completed => {
            println!("✓ Task completed after {} iterations", finished.current_iteration);
            if let Some(output) = &finished.final_output {
                println!("\n{}", output);
            }
        }
        TaskStatus::Timeout => {
            println!("⚠ {}", finished.error.as_deref().unwrap_or("Task timed out"));
            std::process::exit(1);
        }
        TaskStatus::Cancelled => {
            println!("⚠ Task was cancelled");
            std::process::exit(1);
        }
        _ => {
            println!("✗ Task failed: {}", finished.error.as_deref().unwrap_or("unknown error"));
            std::process::exit(1);
        }
    }

    Ok(())
}

fn cmd_tools() -> Result<()> {
    let toolkit = Toolkit::standard();

    println!("Available tools:");
    println!();
    for def in toolkit.definitions() {
        println!("  {}", def.name);
        println!("    {}", def.description);
    }

    Ok(())
}
