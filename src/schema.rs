//! Schema definitions for cmdtest script files.
//!
//! This module defines the structure of test scripts. Scripts are written
//! in YAML or TOML and validated against these types at load time.

use crate::exec::CommandResult;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Sentinel used when a script omits an identifying field.
pub const UNKNOWN: &str = "<unknown>";

fn default_unknown() -> String {
    UNKNOWN.to_string()
}

/// Root document for a test script.
///
/// Tests are kept in declaration order, and declaration order is execution
/// order. A script is built once by the loader and read-only afterward.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Script {
    /// Script title, for the report header.
    #[serde(default = "default_unknown")]
    pub title: String,

    /// Script author, for the report header.
    #[serde(default = "default_unknown")]
    pub author: String,

    /// The tests defined in this script, in execution order.
    #[serde(default)]
    pub tests: Vec<Test>,
}

/// A single test: one command plus its expectations.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Test {
    /// Identifier used in the report.
    #[serde(default = "default_unknown")]
    pub id: String,

    /// Optional description.
    #[serde(default)]
    pub description: Option<String>,

    /// The command to execute. Passed to the shell, so pipes and
    /// redirection are available. Must be non-empty.
    pub command: String,

    /// Text fed to the command's standard input (closed after writing).
    #[serde(default)]
    pub input: String,

    /// Whether the test as a whole is expected to pass or fail.
    #[serde(default)]
    pub expected: Expected,

    /// Conditions that must all hold for the command to be judged
    /// structurally successful.
    #[serde(
        default,
        rename = "pass",
        alias = "accept",
        with = "serde_yaml::with::singleton_map_recursive"
    )]
    #[schemars(with = "Vec<Condition>")]
    pub pass_conditions: Vec<Condition>,

    /// Conditions that must all be absent for the command to be judged
    /// structurally successful.
    #[serde(default, rename = "fail", with = "serde_yaml::with::singleton_map_recursive")]
    #[schemars(with = "Vec<Condition>")]
    pub fail_conditions: Vec<Condition>,

    /// Optional timeout in seconds. There is no default: without this
    /// field the harness waits for the command indefinitely.
    #[serde(default)]
    pub timeout: Option<u64>,
}

/// Expected overall outcome of a test.
///
/// `fail` declares "I expect this whole test to behave as a failure",
/// inverting the polarity of the final verdict while the same condition
/// batteries still run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(try_from = "String", into = "String")]
pub enum Expected {
    /// The condition batteries are expected to be satisfied.
    #[default]
    Pass,
    /// The condition batteries are expected to be violated.
    Fail,
}

impl Expected {
    /// The boolean the final verdict is compared against.
    pub fn as_bool(self) -> bool {
        matches!(self, Expected::Pass)
    }
}

impl TryFrom<String> for Expected {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        match s.as_str() {
            "pass" => Ok(Expected::Pass),
            "fail" => Ok(Expected::Fail),
            other => Err(format!(
                "unknown \"expected\" value {other:?} (allowed: \"pass\", \"fail\")"
            )),
        }
    }
}

impl From<Expected> for String {
    fn from(e: Expected) -> String {
        match e {
            Expected::Pass => "pass".to_string(),
            Expected::Fail => "fail".to_string(),
        }
    }
}

/// A single checkable predicate over a command's result.
///
/// Exactly one kind is set per condition; anything else is rejected when
/// the script is deserialized, so no malformed condition reaches the
/// evaluator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Condition {
    /// The command's exit code must equal this value.
    ReturnCode(i32),
    /// The command's captured output must contain this literal substring.
    /// An empty string is legal and vacuously true.
    Contains(String),
}

impl Condition {
    /// Check this condition against a command result.
    pub fn check(&self, result: &CommandResult) -> bool {
        match self {
            Condition::ReturnCode(expected) => result.exit_code == *expected,
            Condition::Contains(substring) => result.output.contains(substring.as_str()),
        }
    }

    /// Render a human-readable explanation of why this condition did not
    /// hold (or, for a fail-condition battery, why it was expected to).
    pub fn describe_failure(&self, result: &CommandResult) -> String {
        match self {
            Condition::ReturnCode(expected) => {
                format!("Return code {} != {expected}", result.exit_code)
            }
            Condition::Contains(substring) => {
                format!("Output does not contain {substring:?}")
            }
        }
    }
}

/// Generate the JSON Schema for test script files.
pub fn generate_schema() -> schemars::schema::RootSchema {
    schemars::schema_for!(Script)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(exit_code: i32, output: &str) -> CommandResult {
        CommandResult {
            output: output.to_string(),
            exit_code,
        }
    }

    #[test]
    fn parse_minimal_script() {
        let yaml = r#"
tests:
  - command: echo hello
"#;
        let script: Script = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(script.title, UNKNOWN);
        assert_eq!(script.author, UNKNOWN);
        assert_eq!(script.tests.len(), 1);
        let test = &script.tests[0];
        assert_eq!(test.id, UNKNOWN);
        assert_eq!(test.command, "echo hello");
        assert_eq!(test.input, "");
        assert_eq!(test.expected, Expected::Pass);
        assert!(test.pass_conditions.is_empty());
        assert!(test.fail_conditions.is_empty());
        assert_eq!(test.timeout, None);
    }

    #[test]
    fn parse_full_script() {
        let yaml = r#"
title: Sample script
author: somebody

tests:
  - id: hello
    description: Should say hello
    command: echo Hello
    expected: pass
    pass:
      - returncode: 0
      - contains: "Hello"
    fail:
      - contains: "Goodbye"
"#;
        let script: Script = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(script.title, "Sample script");
        assert_eq!(script.author, "somebody");
        let test = &script.tests[0];
        assert_eq!(test.id, "hello");
        assert_eq!(test.description.as_deref(), Some("Should say hello"));
        assert_eq!(
            test.pass_conditions,
            vec![
                Condition::ReturnCode(0),
                Condition::Contains("Hello".to_string())
            ]
        );
        assert_eq!(
            test.fail_conditions,
            vec![Condition::Contains("Goodbye".to_string())]
        );
    }

    #[test]
    fn parse_accept_alias() {
        let yaml = r#"
tests:
  - command: "true"
    accept:
      - returncode: 0
"#;
        let script: Script = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(
            script.tests[0].pass_conditions,
            vec![Condition::ReturnCode(0)]
        );
    }

    #[test]
    fn parse_expected_fail() {
        let yaml = r#"
tests:
  - command: echo Hello
    expected: fail
    pass:
      - contains: "Goodbye"
"#;
        let script: Script = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(script.tests[0].expected, Expected::Fail);
    }

    #[test]
    fn reject_unknown_expected_literal() {
        let yaml = r#"
tests:
  - command: echo Hello
    expected: maybe
"#;
        let err = serde_yaml::from_str::<Script>(yaml).unwrap_err();
        assert!(err.to_string().contains("expected"), "got: {err}");
    }

    #[test]
    fn reject_unknown_condition_kind() {
        let yaml = r#"
tests:
  - command: echo Hello
    pass:
      - regex: "H.*o"
"#;
        let err = serde_yaml::from_str::<Script>(yaml).unwrap_err();
        assert!(err.to_string().contains("unknown variant"), "got: {err}");
    }

    #[test]
    fn reject_non_integer_returncode() {
        let yaml = r#"
tests:
  - command: "true"
    pass:
      - returncode: zero
"#;
        assert!(serde_yaml::from_str::<Script>(yaml).is_err());
    }

    #[test]
    fn reject_missing_command() {
        let yaml = r#"
tests:
  - id: no_command
"#;
        let err = serde_yaml::from_str::<Script>(yaml).unwrap_err();
        assert!(err.to_string().contains("command"), "got: {err}");
    }

    #[test]
    fn parse_toml_script() {
        let toml = r#"
title = "Sample"

[[tests]]
id = "hello"
command = "echo Hello"

[[tests.pass]]
returncode = 0
"#;
        let script: Script = toml::from_str(toml).unwrap();
        assert_eq!(script.tests[0].id, "hello");
        assert_eq!(
            script.tests[0].pass_conditions,
            vec![Condition::ReturnCode(0)]
        );
    }

    #[test]
    fn returncode_check_is_pure_equality() {
        let cond = Condition::ReturnCode(0);
        assert!(cond.check(&result(0, "")));
        assert!(!cond.check(&result(3, "")));
        assert!(Condition::ReturnCode(3).check(&result(3, "irrelevant")));
    }

    #[test]
    fn contains_checks_literal_substring() {
        let cond = Condition::Contains("Hello".to_string());
        assert!(cond.check(&result(0, "Hello World")));
        assert!(!cond.check(&result(0, "Goodbye")));
        // Not a pattern: metacharacters match literally.
        let cond = Condition::Contains("H.*o".to_string());
        assert!(!cond.check(&result(0, "Hello")));
        assert!(cond.check(&result(0, "say H.*o")));
    }

    #[test]
    fn empty_contains_is_vacuously_true() {
        let cond = Condition::Contains(String::new());
        assert!(cond.check(&result(0, "")));
        assert!(cond.check(&result(7, "anything")));
    }

    #[test]
    fn describe_failure_messages() {
        let r = result(3, "Hello");
        assert_eq!(
            Condition::ReturnCode(0).describe_failure(&r),
            "Return code 3 != 0"
        );
        assert_eq!(
            Condition::Contains("Goodbye".to_string()).describe_failure(&r),
            "Output does not contain \"Goodbye\""
        );
    }

    #[test]
    fn generate_schema_names_root() {
        let schema = generate_schema();
        let json = serde_json::to_string(&schema).unwrap();
        assert!(json.contains("Script"));
    }
}
