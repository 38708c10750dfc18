//! A terminal front end for `stepwise` sessions.

#[macro_use]
extern crate tracing;

use std::env;
use std::io::Write as _;
use std::path::PathBuf;
use std::pin::pin;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;
use serde_json::Value;
use stepwise::core::tool::Approval;
use stepwise::core::{DEFAULT_MAX_STEPS, Reply, Step};
use stepwise::tools::ExecuteCommandTool;
use stepwise::{Profile, SessionBuilder};
use stepwise_gemini_model::{GeminiConfigBuilder, GeminiProvider};
use tokio::io::{self, AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::select;
use tokio::sync::mpsc;
use tokio::time::sleep;

const BAR_CHAR: &str = "▎";
const MAX_OBSERVATION_CHARS: usize = 300;

/// A step-by-step agent in your terminal.
#[derive(Parser)]
#[command(name = "stepwise", version, about)]
struct Cli {
    /// Which assistant to run: terminal, weather, or coding.
    #[arg(long, default_value_t = Profile::Terminal)]
    profile: Profile,

    /// API key of the Gemini API. Falls back to `API_KEY`.
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Model to use.
    #[arg(long, env = "GEMINI_MODEL")]
    model: Option<String>,

    /// Base URL of the Gemini API.
    #[arg(long, env = "GEMINI_BASE_URL")]
    base_url: Option<String>,

    /// Directory the file tools and commands work in.
    #[arg(long, default_value = ".")]
    project_dir: PathBuf,

    /// Model steps allowed per query.
    #[arg(long, default_value_t = DEFAULT_MAX_STEPS)]
    max_steps: usize,

    /// Run tools without asking for approval.
    #[arg(long, short)]
    yes: bool,
}

enum SessionEvent {
    Step(Step),
    ToolCallRequest(Approval),
}

type InputLines = Lines<BufReader<Stdin>>;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    // The file is optional; real environment variables take precedence.
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let Some(api_key) = cli.api_key.or_else(|| env::var("API_KEY").ok())
    else {
        eprintln!(
            "{} GEMINI_API_KEY (or API_KEY) is not set",
            "❌".bright_red()
        );
        return ExitCode::FAILURE;
    };

    if let Err(err) = std::fs::create_dir_all(&cli.project_dir) {
        eprintln!(
            "{} cannot use project directory {}: {err}",
            "❌".bright_red(),
            cli.project_dir.display()
        );
        return ExitCode::FAILURE;
    }

    let mut config_builder = GeminiConfigBuilder::with_api_key(api_key);
    if let Some(model) = cli.model {
        config_builder = config_builder.with_model(model);
    }
    if let Some(base_url) = cli.base_url {
        config_builder = config_builder.with_base_url(base_url);
    }
    let config = config_builder.build();
    info!("using model {}", config.model());
    let model_provider = GeminiProvider::new(config);

    let (event_tx, mut event_rx) = mpsc::unbounded_channel();

    let mut session_builder =
        SessionBuilder::with_model_provider(model_provider)
            .with_profile(cli.profile)
            .with_project_dir(&cli.project_dir)
            .with_max_steps(cli.max_steps)
            .on_step({
                let event_tx = event_tx.clone();
                move |step| {
                    event_tx.send(SessionEvent::Step(step.clone())).ok();
                }
            });
    if !cli.yes {
        session_builder = session_builder.on_tool_call_request({
            let event_tx = event_tx.clone();
            move |approval| {
                event_tx.send(SessionEvent::ToolCallRequest(approval)).ok();
            }
        });
    }
    let mut session = session_builder.build();

    let progress_style = ProgressStyle::with_template("{spinner} {wide_msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏");

    let mut input = BufReader::new(io::stdin()).lines();

    println!(
        "{} {} assistant, type `exit` to quit.",
        "stepwise".bright_cyan().bold(),
        session.profile()
    );

    loop {
        print!("\n> ");
        std::io::stdout().flush().ok();

        // EOF ends the session like `exit`.
        let line = read_line(&mut input).await;
        let line = line.as_deref().unwrap_or("exit").trim();
        if line.is_empty() {
            continue;
        }

        let mut progress_bar: Option<ProgressBar> = None;
        let mut message = "🤔 Thinking...".to_owned();
        let mut show_spinner = true;

        let mut submit = pin!(session.submit(line));
        let reply = loop {
            // Create a new progress bar if it has been finished.
            if show_spinner {
                let progress_bar = progress_bar.get_or_insert_with(|| {
                    let progress_bar = ProgressBar::new_spinner();
                    progress_bar.set_style(progress_style.clone());
                    progress_bar
                });
                progress_bar.set_message(message.clone());
                progress_bar.inc(1);
            }

            let event = select! {
                biased;
                event = event_rx.recv() => event,
                reply = &mut submit => break reply,
                _ = sleep(Duration::from_millis(100)) => continue,
            };
            let Some(event) = event else {
                continue;
            };

            // Finish the progress bar before printing anything else.
            if let Some(progress_bar) = progress_bar.take() {
                progress_bar.finish_and_clear();
            }

            match event {
                SessionEvent::Step(step) => {
                    // The spinner would draw over the command's output.
                    show_spinner = !attaches_terminal(&step);
                    if let Step::Action(action) = &step {
                        message = format!("🔨 Running {}...", action.function);
                    } else {
                        message = "🤔 Thinking...".to_owned();
                    }
                    print_step(&step);
                }
                SessionEvent::ToolCallRequest(approval) => {
                    ask_for_approval(approval, &mut input).await;
                }
            }
        };

        if let Some(progress_bar) = progress_bar.take() {
            progress_bar.finish_and_clear();
        }
        // Steps sent right before the query finished.
        while let Ok(event) = event_rx.try_recv() {
            match event {
                SessionEvent::Step(step) => print_step(&step),
                SessionEvent::ToolCallRequest(approval) => {
                    approval.reject(None);
                }
            }
        }

        match reply {
            Ok(Reply::Result(_)) => {}
            Ok(Reply::Exit) => {
                println!("👋 Bye!");
                break;
            }
            Err(err) => {
                error!("query failed: {err:?}");
                println!("{}❌ {}", BAR_CHAR.bright_red(), err.bright_red());
            }
        }
    }

    ExitCode::SUCCESS
}

fn print_step(step: &Step) {
    match step {
        Step::Start { content } | Step::Plan { content } => {
            println!("{}🧠 {}", BAR_CHAR.bright_black(), content.dimmed());
        }
        Step::Action(action) => {
            if let Some(content) = &action.content {
                println!(
                    "{}🧠 {}",
                    BAR_CHAR.bright_black(),
                    content.dimmed()
                );
            }
            println!(
                "{}🔨 {} {}",
                BAR_CHAR.bright_yellow(),
                action.function.bright_white().bold(),
                display_value(&action.input)
            );
        }
        Step::Observe { output } => {
            let output = display_value(output);
            let mut shown: String =
                output.chars().take(MAX_OBSERVATION_CHARS).collect();
            if shown.len() < output.len() {
                shown.push('…');
            }
            println!("{}{}", BAR_CHAR.bright_black(), shown.dimmed());
        }
        Step::Result { content } => {
            println!(
                "{}🤖 {}",
                BAR_CHAR.bright_cyan(),
                content.bright_white()
            );
        }
    }
}

/// Returns `true` if running `step` hands the terminal to a child process.
fn attaches_terminal(step: &Step) -> bool {
    matches!(
        step,
        Step::Action(action) if action.function == ExecuteCommandTool::NAME
    )
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        value => value.to_string(),
    }
}

async fn ask_for_approval(approval: Approval, input: &mut InputLines) {
    let bar = BAR_CHAR.bright_yellow();
    println!("\n{bar}⚠️  {}:", approval.justification());
    for line in approval.what().lines() {
        println!("{bar}{}", line.bright_white().bold());
    }
    print!("Proceed? [Y/n]: ");
    std::io::stdout().flush().ok();

    let Some(line) = read_line(input).await else {
        approval.reject(None);
        return;
    };
    let line = line.trim();
    if line.is_empty() || line.eq_ignore_ascii_case("y") {
        approval.approve();
    } else {
        approval.reject(Some(format!("the user answered `{line}`")));
    }

    println!();
}

async fn read_line(input: &mut InputLines) -> Option<String> {
    match input.next_line().await {
        Ok(line) => line,
        Err(err) => {
            error!("error reading input: {}", err);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use stepwise::core::Action;
    use stepwise::core::tool::Tool;
    use stepwise::tools::ExecuteShellCommandTool;

    use super::*;

    fn action(function: &str) -> Step {
        Step::Action(Action {
            function: function.to_owned(),
            input: json!("ls"),
            content: None,
        })
    }

    #[test]
    fn test_attaches_terminal() {
        let tool = ExecuteCommandTool::new(".");
        assert!(attaches_terminal(&action(tool.name())));

        // Captured output leaves the terminal to the spinner.
        let tool = ExecuteShellCommandTool::new(".");
        assert!(!attaches_terminal(&action(tool.name())));
        assert!(!attaches_terminal(&Step::observation("0")));
        assert!(!attaches_terminal(&Step::Plan {
            content: "I'll run `ls`.".to_owned(),
        }));
    }
}
