//! A terminal front-end for talking to Dust agents.

#[macro_use]
extern crate tracing;

use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use futures_util::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use llm_dust_client::{DustClient, DustConfig, DustModel, Error};
use llm_dust_model::{Attachment, ConversationalModel, Prompt};
use mime::Mime;
use owo_colors::OwoColorize;
use tokio::io::{self, AsyncBufReadExt};

const BAR_CHAR: &str = "▎";

#[derive(Parser)]
#[command(name = "llm-dust", about = "Talk to Dust agents from the terminal")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List all available agents with their descriptions.
    Agents,
    /// Chat with an agent, by name or id.
    Chat {
        agent: String,
        /// Files to attach to the first prompt.
        #[arg(short, long)]
        attach: Vec<PathBuf>,
        /// Send a single prompt and exit.
        #[arg(short, long)]
        prompt: Option<String>,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = dotenvy::dotenv() {
        debug!("no .env file loaded: {err}");
    }
    let cli = Cli::parse();

    let config = match DustConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{err}");
            return ExitCode::FAILURE;
        }
    };
    let client = DustClient::new(config);

    let result = match cli.command {
        Command::Agents => list_agents(&client).await,
        Command::Chat {
            agent,
            attach,
            prompt,
        } => chat(&client, &agent, attach, prompt).await,
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{} {err}", "error:".bright_red().bold());
            ExitCode::FAILURE
        }
    }
}

async fn list_agents(client: &DustClient) -> Result<(), Error> {
    for agent in client.list_agents().await? {
        println!("{}: {}", agent.name.bright_white().bold(), agent.description);
    }
    Ok(())
}

async fn chat(
    client: &DustClient,
    name: &str,
    attach: Vec<PathBuf>,
    prompt: Option<String>,
) -> Result<(), Error> {
    let agents = client.list_agents().await?;
    let Some(agent) = agents
        .into_iter()
        .find(|agent| agent.name == name || agent.id == name)
    else {
        return Err(Error::Config(format!("no agent named {name}")));
    };

    let mut model = client
        .model(agent)
        .on_title(|title| {
            println!("{}📌 {}", BAR_CHAR.bright_blue(), title.bright_white());
        })
        .on_action(|action| {
            eprintln!("{}", format!("⚙️  {}", action.kind).dimmed());
        });
    let attachments: Vec<_> =
        attach.iter().map(|path| attachment_for(path)).collect();

    if let Some(text) = prompt {
        let prompt = prompt_for(text, &attachments, false);
        return send(&mut model, &prompt).await;
    }

    loop {
        print!("> ");
        std::io::stdout().flush().ok();

        let Some(line) = read_line().await else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let started = model.session().conversation_id().is_some();
        let prompt = prompt_for(line, &attachments, started);
        if let Err(err) = send(&mut model, &prompt).await {
            // A failed turn doesn't end the chat, the next prompt goes
            // to the same conversation.
            eprintln!("{} {err}", "error:".bright_red().bold());
        }
    }
    Ok(())
}

async fn send(model: &mut DustModel, prompt: &Prompt) -> Result<(), Error> {
    let progress_bar = ProgressBar::new_spinner();
    let style = ProgressStyle::with_template("{spinner} {wide_msg}");
    if let Ok(style) = style {
        progress_bar.set_style(style.tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"));
    }
    progress_bar.set_message("🤔 Thinking...");
    progress_bar.enable_steady_tick(Duration::from_millis(100));

    let mut response = match model.respond(prompt).await {
        Ok(response) => response,
        Err(err) => {
            progress_bar.finish_and_clear();
            return Err(err);
        }
    };

    let mut started = false;
    while let Some(piece) = response.next().await {
        if !started {
            // Finish the progress bar before printing anything else.
            progress_bar.finish_and_clear();
            print!("{}🤖 ", BAR_CHAR.bright_cyan());
            started = true;
        }
        match piece {
            Ok(text) => {
                print!("{}", text.bright_white());
                std::io::stdout().flush().ok();
            }
            Err(err) => {
                println!();
                return Err(err);
            }
        }
    }
    progress_bar.finish_and_clear();
    println!();
    Ok(())
}

/// Builds the prompt for `text`.
///
/// Attachments only go with the message that starts the conversation, so
/// they stay pending until a conversation has been started.
fn prompt_for(
    text: impl Into<String>,
    attachments: &[Attachment],
    started: bool,
) -> Prompt {
    let mut prompt = Prompt::new(text);
    if !started {
        prompt.attachments = attachments.to_vec();
    }
    prompt
}

fn attachment_for(path: &Path) -> Attachment {
    let extension = path
        .extension()
        .map(|ext| ext.to_string_lossy().to_ascii_lowercase());
    let content_type: Mime = match extension.as_deref() {
        Some("png") => mime::IMAGE_PNG,
        Some("jpg" | "jpeg") => mime::IMAGE_JPEG,
        Some("gif") => mime::IMAGE_GIF,
        Some("txt" | "md") => mime::TEXT_PLAIN,
        Some("csv") => mime::TEXT_CSV,
        Some("pdf") => mime::APPLICATION_PDF,
        _ => mime::APPLICATION_OCTET_STREAM,
    };
    Attachment::new(path, content_type)
}

async fn read_line() -> Option<String> {
    let mut stdin = io::BufReader::new(io::stdin());
    let mut line = String::new();

    match stdin.read_line(&mut line).await {
        Ok(count) => {
            if count == 0 {
                return None;
            }
            Some(line)
        }
        Err(err) => {
            error!("error reading input: {}", err);
            None
        }
    }
}
