mod exec;
mod loader;
mod runner;
mod schema;

use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::path::{Path, PathBuf};

const RULE: &str = "########################################################################";

#[derive(Clone, Copy, Default, ValueEnum)]
enum OutputFormat {
    /// Human-readable per-test report
    #[default]
    Human,
    /// Machine-readable JSON output
    Json,
}

#[derive(Parser)]
#[command(name = "cmdtest")]
#[command(about = "A declarative test harness for shell commands")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Execute a test script
    Run {
        /// Path to the test script (.yaml, .yml, or .toml)
        script: PathBuf,
        /// Output format
        #[arg(short, long, default_value = "human")]
        output: OutputFormat,
    },
    /// Validate a test script without running it
    Validate {
        /// Path to the test script
        script: PathBuf,
    },
    /// Scaffold a new script file
    Init {
        /// Output path for the new script
        #[arg(default_value = "tests/example.yaml")]
        path: PathBuf,
    },
    /// Output the script schema (for editors and AI consumers)
    Schema,
}

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Command::Run { script, output } => {
            let parsed = load_or_exit(&script);

            if matches!(output, OutputFormat::Human) {
                println!(
                    "cmdtest executing {}: {} - {}",
                    script.display(),
                    parsed.title,
                    parsed.author
                );
            }

            let result = match runner::run_script(&parsed) {
                Ok(result) => result,
                Err(e) => {
                    eprintln!("ERROR: {e}");
                    std::process::exit(1);
                }
            };

            match output {
                OutputFormat::Human => print_human_report(&result),
                OutputFormat::Json => {
                    println!(
                        "{}",
                        serde_json::to_string_pretty(&result).expect("Failed to serialize")
                    );
                }
            }

            if !result.all_passed() {
                std::process::exit(1);
            }
        }
        Command::Validate { script } => {
            let parsed = load_or_exit(&script);
            println!("✓ {} ({} tests)", script.display(), parsed.tests.len());
        }
        Command::Init { path } => {
            let template = r#"title: Example script
author: unknown

tests:
  - id: say_hello
    description: Should say hello
    command: echo Hello
    expected: pass
    pass:
      - returncode: 0
      - contains: "Hello"

  - id: reads_stdin
    command: cat
    input: "Hello World!"
    pass:
      - contains: "Hello"
"#;
            if path.exists() {
                eprintln!("ERROR: file already exists: {}", path.display());
                std::process::exit(1);
            }
            if let Some(parent) = path.parent()
                && !parent.as_os_str().is_empty()
                && !parent.exists()
                && let Err(e) = fs::create_dir_all(parent)
            {
                eprintln!("ERROR: failed to create directory: {e}");
                std::process::exit(1);
            }
            if let Err(e) = fs::write(&path, template) {
                eprintln!("ERROR: failed to write file: {e}");
                std::process::exit(1);
            }
            println!("Created: {}", path.display());
        }
        Command::Schema => {
            let schema = schema::generate_schema();
            let json = serde_json::to_string_pretty(&schema).expect("Failed to serialize schema");
            println!("{json}");
        }
    }
}

/// Load and validate a script, or report the structural error and exit.
///
/// Structural errors are prefixed with `ERROR:` and abort before any test
/// runs; they are observably distinct from per-test `Status: FAILED` lines.
fn load_or_exit(path: &Path) -> schema::Script {
    if !path.is_file() {
        eprintln!("ERROR: Test script {} does not exist.", path.display());
        std::process::exit(1);
    }
    match loader::load_script(path) {
        Ok(script) => script,
        Err(e) => {
            eprintln!("ERROR: {}: {e}", path.display());
            std::process::exit(1);
        }
    }
}

fn print_human_report(result: &runner::ScriptResult) {
    for (index, test) in result.tests.iter().enumerate() {
        println!("\n{RULE}");
        println!("Test {}: {}", index + 1, test.id);
        println!("Description: {}", test.description.as_deref().unwrap_or(""));
        println!("Command:\n  {}", test.command);
        println!("Output:\n{}", test.output);
        match test.exit_code {
            Some(code) => println!("Return code: {code}"),
            None => println!("Return code: <none>"),
        }
        for diagnostic in &test.diagnostics {
            println!("FAILED: {diagnostic}");
        }
        if test.passed {
            println!("Status: PASSED");
        } else {
            println!("Status: FAILED");
        }
    }

    println!("\n{RULE}");
    if result.all_passed() {
        println!("All tests passed.");
    } else {
        println!("Some tests failed.");
    }
}
