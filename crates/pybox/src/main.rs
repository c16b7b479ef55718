//! A chat program that answers questions by writing and running Python
//! code in a containerized Jupyter notebook.
//!
//! Runs a console chat loop by default; pass `bot` as the first
//! argument to run the Telegram bot surface instead.

#[macro_use]
extern crate tracing;

use std::io::Write as _;
use std::path::PathBuf;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;
use pybox::config::Config;
use pybox::{SessionBuilder, bot};
use pybox_openai_model::{OpenAIConfigBuilder, OpenAIProvider};
use pybox_storage::BlobClient;
use tokio::io::{self, AsyncBufReadExt};

const BAR_CHAR: &str = "▎";

#[tokio::main(flavor = "current_thread")]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{err}");
            return;
        }
    };

    let mut model_config =
        OpenAIConfigBuilder::with_api_key(config.openai_api_key.clone());
    if let Some(model) = &config.openai_model {
        model_config = model_config.with_model(model.clone());
    }
    if let Some(base_url) = &config.openai_base_url {
        model_config = model_config.with_base_url(base_url.clone());
    }
    let provider = OpenAIProvider::new(model_config.build());

    let blob = if config.storage.is_available() {
        match BlobClient::from_config(&config.storage) {
            Ok(client) => Some(client),
            Err(err) => {
                eprintln!("invalid storage configuration: {err}");
                return;
            }
        }
    } else {
        info!("no blob storage configured, artifacts stay on the local disk");
        None
    };

    if std::env::args().nth(1).as_deref() == Some("bot") {
        let Some(token) = config.telegram_bot_token else {
            eprintln!("TELEGRAM_BOT_TOKEN environment variable is not set");
            return;
        };
        bot::run_bot(&token, provider, blob, config.output_dir).await;
        return;
    }

    run_console(provider, blob, config.output_dir).await;
}

async fn run_console(
    provider: OpenAIProvider,
    blob: Option<BlobClient>,
    output_dir: PathBuf,
) {
    let mut builder = SessionBuilder::with_model_provider(provider)
        .with_system_prompt(include_str!("./system_prompt.md"))
        .with_output_dir(output_dir);
    if let Some(blob) = blob {
        builder = builder.with_blob_client(blob);
    }
    let mut session = builder.build();

    let progress_style = ProgressStyle::with_template("{spinner} {wide_msg}")
        .unwrap()
        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏");

    loop {
        print!("\nEnter your query or type \"exit\" to quit: ");
        std::io::stdout().flush().unwrap();

        let Some(line) = read_line().await else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line.eq_ignore_ascii_case("exit") {
            break;
        }

        let progress_bar = ProgressBar::new_spinner();
        progress_bar.set_style(progress_style.clone());
        progress_bar.set_message("🤔 Thinking...");
        progress_bar.enable_steady_tick(Duration::from_millis(100));

        let reply = session.send_message(line).await;
        progress_bar.finish_and_clear();

        match reply {
            Ok(reply) => {
                println!(
                    "{}🤖 {}",
                    BAR_CHAR.bright_cyan(),
                    reply.bright_white()
                );
            }
            Err(err) => {
                eprintln!("failed to get a response: {err}");
            }
        }
    }
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
