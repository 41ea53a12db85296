//! Test evaluation and orchestration.
//!
//! The evaluator applies a test's condition batteries to a command result
//! and derives the verdict, honoring the expected-outcome inversion. The
//! runner walks a script's tests in order, one child process at a time.

use crate::exec::{self, CommandResult, ExecError};
use crate::schema::{Expected, Script, Test};
use std::time::{Duration, Instant};

/// Outcome of evaluating one test against its command result.
#[derive(Debug)]
pub struct Verdict {
    /// Final pass/fail judgment, after the expected-outcome inversion.
    pub passed: bool,
    /// Diagnostic lines for conditions that went against the declared
    /// expectation, in battery order.
    pub diagnostics: Vec<String>,
}

/// Apply a test's condition batteries to a command result.
///
/// Both batteries always run in declared order. A test expected to pass
/// only reports unsatisfied pass-conditions; a test expected to fail only
/// reports unsatisfied fail-conditions. That keeps intentionally-failing
/// tests from producing noise about the failure they were meant to have.
///
/// A test with empty batteries is structurally successful no matter what
/// the command did; pass/fail is never inferred from the exit code unless
/// a `returncode` condition asks for it. This is the sanctioned way to run
/// setup or teardown commands with no assertions.
pub fn evaluate(test: &Test, result: &CommandResult) -> Verdict {
    let mut structurally_passed = true;
    let mut diagnostics = Vec::new();

    for condition in &test.pass_conditions {
        if !condition.check(result) {
            structurally_passed = false;
            if test.expected == Expected::Pass {
                diagnostics.push(condition.describe_failure(result));
            }
        }
    }

    for condition in &test.fail_conditions {
        if condition.check(result) {
            structurally_passed = false;
        } else if test.expected == Expected::Fail {
            diagnostics.push(condition.describe_failure(result));
        }
    }

    Verdict {
        passed: structurally_passed == test.expected.as_bool(),
        diagnostics,
    }
}

/// Result of running a single test.
#[derive(Debug, serde::Serialize)]
pub struct TestResult {
    pub id: String,
    pub description: Option<String>,
    pub command: String,
    pub passed: bool,
    #[serde(serialize_with = "serialize_duration")]
    pub duration: Duration,
    /// Merged stdout and stderr captured from the command.
    pub output: String,
    /// Exit code of the command; `None` when the test timed out.
    pub exit_code: Option<i32>,
    pub diagnostics: Vec<String>,
}

fn serialize_duration<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_f64(duration.as_secs_f64())
}

/// Result of running a whole script.
#[derive(Debug, serde::Serialize)]
pub struct ScriptResult {
    pub title: String,
    pub author: String,
    pub tests: Vec<TestResult>,
}

impl ScriptResult {
    /// True when every verdict in the run passed.
    pub fn all_passed(&self) -> bool {
        self.tests.iter().all(|t| t.passed)
    }
}

/// Run every test in the script, in declaration order.
///
/// Tests run strictly one at a time; each child is reaped and its pipes
/// closed before the next test starts. A failing test never short-circuits
/// the run, and a script with N tests always yields N results. A timeout
/// is recorded as a failed test and the run continues; a spawn or wait
/// failure aborts the run, since it means the environment is broken rather
/// than the command under test misbehaving.
pub fn run_script(script: &Script) -> Result<ScriptResult, ExecError> {
    let mut results = Vec::with_capacity(script.tests.len());

    for test in &script.tests {
        results.push(run_test(test)?);
    }

    Ok(ScriptResult {
        title: script.title.clone(),
        author: script.author.clone(),
        tests: results,
    })
}

fn run_test(test: &Test) -> Result<TestResult, ExecError> {
    let start = Instant::now();
    let timeout = test.timeout.map(Duration::from_secs);

    match exec::run_command(&test.command, &test.input, timeout) {
        Ok(result) => {
            let verdict = evaluate(test, &result);
            Ok(TestResult {
                id: test.id.clone(),
                description: test.description.clone(),
                command: test.command.clone(),
                passed: verdict.passed,
                duration: start.elapsed(),
                output: result.output,
                exit_code: Some(result.exit_code),
                diagnostics: verdict.diagnostics,
            })
        }
        Err(timed_out @ ExecError::Timeout(_)) => Ok(TestResult {
            id: test.id.clone(),
            description: test.description.clone(),
            command: test.command.clone(),
            passed: false,
            duration: start.elapsed(),
            output: String::new(),
            exit_code: None,
            diagnostics: vec![timed_out.to_string()],
        }),
        Err(fatal) => Err(fatal),
    }
}
