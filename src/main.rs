use clap::{Parser, Subcommand};
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use screenbot::{interpreter, Action, CancelToken, LogAutomation, RunError, Script, Step};

#[derive(Parser)]
#[command(name = "screenbot")]
#[command(about = "Replay recorded screen interactions from a YAML action script")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a script file and print its step outline
    Validate { script: String },
    /// Execute a script file (Ctrl-C stops the run)
    Run { script: String },
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Validate { script } => validate(&script),
        Commands::Run { script } => run(&script).await,
    }
}

fn validate(path: &str) -> ExitCode {
    let yaml = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error reading file: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match Script::from_str(&yaml) {
        Ok(script) => {
            println!("Script is valid ({} top-level steps)", script.steps.len());
            print_outline(&script.steps, 1);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Parse error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(path: &str) -> ExitCode {
    let cancel = CancelToken::new();

    // Ctrl-C only requests a stop; the run unwinds at its next checkpoint.
    let watcher = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                log::info!("stop requested");
                cancel.cancel();
            }
        })
    };

    // The interpreter is synchronous; give it its own worker thread.
    let worker = {
        let cancel = cancel.clone();
        let path = PathBuf::from(path);
        tokio::task::spawn_blocking(move || {
            let mut auto = LogAutomation::default();
            interpreter::run(&path, &mut auto, &cancel)
        })
    };

    let joined = worker.await;
    watcher.abort();
    let result = match joined {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Script worker failed: {}", e);
            return ExitCode::FAILURE;
        }
    };

    // A stopped run is not a failure, and whatever error surfaced while
    // unwinding is not worth reporting.
    if cancel.is_cancelled() {
        println!("Run stopped");
        return ExitCode::SUCCESS;
    }

    match result {
        Ok(()) => {
            println!("Run completed");
            ExitCode::SUCCESS
        }
        Err(e @ RunError::ImageNotFound(_)) => {
            eprintln!("Image error: {}", e);
            ExitCode::FAILURE
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn print_outline(steps: &[Step], depth: usize) {
    let pad = "  ".repeat(depth);
    for step in steps {
        match step {
            Step::Loop { count, body } => {
                println!("{}loop ({}):", pad, scalar_label(count));
                print_outline(body, depth + 1);
            }
            Step::If {
                image,
                then_branch,
                else_branch,
            } => {
                println!("{}if {} found:", pad, image);
                print_outline(then_branch, depth + 1);
                if !else_branch.is_empty() {
                    println!("{}else:", pad);
                    print_outline(else_branch, depth + 1);
                }
            }
            Step::Action(action) => println!("{}{}", pad, action_label(action)),
        }
    }
}

fn action_label(action: &Action) -> String {
    match action {
        Action::Wait(v) => format!("wait {}", scalar_label(v)),
        Action::Click(s) => format!("click {}", s),
        Action::ClickAny(v) => format!("click_any {}", scalar_label(v)),
        Action::BreakOnFound(s) => format!("break_on_found {}", s),
        Action::BreakCurrentLoopOnFound(s) => format!("break_current_loop_on_found {}", s),
        Action::ClickPos(v) => format!("click_pos {}", scalar_label(v)),
        Action::Input(s) => format!("input {:?}", s),
        Action::Key(s) => format!("key {}", s),
        Action::Break => "break".into(),
        Action::BreakCurrentLoop => "break_current_loop".into(),
    }
}

fn scalar_label(value: &serde_yaml::Value) -> String {
    match value {
        serde_yaml::Value::Sequence(seq) => {
            let items: Vec<String> = seq.iter().map(scalar_label).collect();
            format!("[{}]", items.join(", "))
        }
        other => serde_yaml::to_string(other)
            .map(|s| s.trim_end().to_string())
            .unwrap_or_else(|_| "?".into()),
    }
}
