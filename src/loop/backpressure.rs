//! Backpressure execution
//!
//! After each iteration the enabled checks run against the working
//! directory. A failing check is not an error - it is recorded and fed to
//! the next iteration, and it blocks heuristic completion.

use regex::RegexSet;
use std::path::Path;
use std::sync::LazyLock;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::domain::{BackpressureResult, CheckKind, TaskConfig, preview};
use crate::tools::shell::run_shell;

const CHECK_TIMEOUT: Duration = Duration::from_secs(120);
const OUTPUT_CAP: usize = 5000;
const MAX_ERRORS: usize = 20;
const MAX_WARNINGS: usize = 10;
const LINE_CAP: usize = 200;

/// Line patterns treated as errors. False positives are acceptable - the
/// extraction is additive context for the model, not a classification.
static ERROR_LINE_PATTERNS: LazyLock<RegexSet> = LazyLock::new(|| {
    RegexSet::new([r"error[:\s]", r"Error[:\s]", r"ERROR[:\s]", r"failed", r"FAILED", r"✗", r"✖"])
        .expect("error line patterns must compile")
});

/// Run every enabled check, skipping any whose command cannot be resolved
pub async fn run_backpressure(config: &TaskConfig, working_dir: &Path) -> Vec<BackpressureResult> {
    let mut results = Vec::new();

    let checks = [
        (config.run_tests, CheckKind::Test, &config.test_command),
        (config.run_lint, CheckKind::Lint, &config.lint_command),
        (config.run_typecheck, CheckKind::Typecheck, &config.typecheck_command),
        (config.run_build, CheckKind::Build, &config.build_command),
    ];

    for (enabled, kind, override_cmd) in checks {
        if !enabled {
            continue;
        }
        let Some(command) = override_cmd.clone().or_else(|| detect_command(kind, working_dir)) else {
            debug!(check = %kind, "no command resolved, skipping check");
            continue;
        };
        results.push(run_check(kind, &command, working_dir).await);
    }

    results
}

/// Auto-detect the command for a check from working-directory signature files
pub fn detect_command(kind: CheckKind, dir: &Path) -> Option<String> {
    let has = |name: &str| dir.join(name).exists();

    let command = match kind {
        CheckKind::Test => {
            if has("pytest.ini") || has("pyproject.toml") {
                "pytest -v"
            } else if has("setup.py") {
                "python -m pytest"
            } else if has("package.json") {
                "npm test"
            } else if has("go.mod") {
                "go test ./..."
            } else if has("Cargo.toml") {
                "cargo test"
            } else {
                return None;
            }
        }
        CheckKind::Lint => {
            if has("pyproject.toml") || has(".flake8") {
                "ruff check . || flake8 ."
            } else if has("package.json") {
                "npm run lint 2>/dev/null || eslint ."
            } else if has("go.mod") {
                "golangci-lint run 2>/dev/null || go vet ./..."
            } else {
                return None;
            }
        }
        CheckKind::Typecheck => {
            if has("pyproject.toml") {
                "mypy . 2>/dev/null || true"
            } else if has("tsconfig.json") {
                "tsc --noEmit"
            } else {
                return None;
            }
        }
        CheckKind::Build => {
            if has("package.json") {
                "npm run build"
            } else if has("go.mod") {
                "go build ./..."
            } else if has("Cargo.toml") {
                "cargo build"
            } else {
                return None;
            }
        }
    };

    Some(command.to_string())
}

async fn run_check(kind: CheckKind, command: &str, working_dir: &Path) -> BackpressureResult {
    debug!(check = %kind, %command, "running backpressure check");
    let start = Instant::now();

    match run_shell(command, working_dir, CHECK_TIMEOUT).await {
        Ok(out) => {
            let combined = format!("{}{}", out.stdout, out.stderr);
            BackpressureResult {
                check_type: kind,
                passed: out.success(),
                output: preview(&combined, OUTPUT_CAP),
                errors: extract_errors(&combined),
                warnings: extract_warnings(&combined),
                duration_ms: start.elapsed().as_millis() as u64,
            }
        }
        Err(e) => BackpressureResult {
            check_type: kind,
            passed: false,
            output: e.to_string(),
            errors: vec![e.to_string()],
            warnings: vec![],
            duration_ms: start.elapsed().as_millis() as u64,
        },
    }
}

fn extract_errors(output: &str) -> Vec<String> {
    let mut errors: Vec<String> = Vec::new();
    for line in output.lines() {
        if ERROR_LINE_PATTERNS.is_match(line) {
            let error = preview(line.trim(), LINE_CAP);
            if !error.is_empty() && !errors.contains(&error) {
                errors.push(error);
                if errors.len() >= MAX_ERRORS {
                    break;
                }
            }
        }
    }
    errors
}

fn extract_warnings(output: &str) -> Vec<String> {
    let mut warnings: Vec<String> = Vec::new();
    for line in output.lines() {
        let lower = line.to_lowercase();
        if lower.contains("warning") || lower.contains("warn") {
            let warning = preview(line.trim(), LINE_CAP);
            if !warning.is_empty() && !warnings.contains(&warning) {
                warnings.push(warning);
                if warnings.len() >= MAX_WARNINGS {
                    break;
                }
            }
        }
    }
    warnings
}
