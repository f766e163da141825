mod actions;
mod config;
mod instrumentation;
mod llm;
mod modes;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::future::Future;
use std::io::Read;
use std::path::PathBuf;
use std::time::Instant;

use actions::{MetadataFetcher, QuestionSuggester, SpeechSynthesizer};
use config::{Config, LlmSettings};
use instrumentation::ActionLog;
use llm::ChatMessage;
use modes::{Mode, ModeRegistry, Tool};

#[derive(Parser)]
#[command(name = "search-actions", about = "Server-side actions for a conversational search assistant")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Print a one-line summary of each action to stderr
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Suggest three follow-up questions for a conversation
    Suggest {
        /// Path to a JSON array of {role, content} messages ("-" for stdin)
        history: String,
    },
    /// Convert text to speech
    Speak {
        /// The text to synthesize
        text: String,
        /// Write raw MPEG audio here instead of printing a data URI
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Fetch a page's title and description
    Metadata {
        url: String,
        /// Print null instead of failing when the page cannot be fetched
        #[arg(long)]
        lenient: bool,
    },
    /// Show the tool allow-list and system prompt for a mode
    Mode {
        #[arg(value_enum)]
        mode: Option<Mode>,
        /// Fill in today's date and the configured timezone
        #[arg(long)]
        render: bool,
    },
    /// List the tool vocabulary and every mode's allow-list
    Modes,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::from_env();

    match cli.command {
        Commands::Suggest { history } => {
            let history = read_history(&history)?;
            let suggester = QuestionSuggester::new(&LlmSettings::from_env()?)?;

            let (result, latency) = timed(suggester.suggest(&history)).await;

            let entry = match &result {
                Ok(r) => ActionLog::new("suggest", latency, None).with_usage(
                    r.input_tokens,
                    r.output_tokens,
                    r.cost,
                ),
                Err(e) => ActionLog::new("suggest", latency, Some(format!("{:#}", e))),
            };
            log_action(&config.action_log_dir, &entry, cli.verbose);

            println!("{}", to_json(&result?.value)?);
        }
        Commands::Speak { text, out } => {
            let synthesizer = SpeechSynthesizer::new(config.speech.clone());

            match out {
                Some(path) => {
                    let (result, latency) = timed(synthesizer.synthesize_bytes(&text)).await;
                    let error = result.as_ref().err().map(|e| e.to_string());
                    log_action(
                        &config.action_log_dir,
                        &ActionLog::new("speak", latency, error),
                        cli.verbose,
                    );

                    let audio = result?;
                    std::fs::write(&path, &audio)
                        .context(format!("Failed to write audio to {}", path.display()))?;
                    tracing::info!(path = %path.display(), bytes = audio.len(), "audio written");
                }
                None => {
                    let (result, latency) = timed(synthesizer.synthesize(&text)).await;
                    let error = result.as_ref().err().map(|e| e.to_string());
                    log_action(
                        &config.action_log_dir,
                        &ActionLog::new("speak", latency, error),
                        cli.verbose,
                    );

                    println!("{}", to_json(&result?)?);
                }
            }
        }
        Commands::Metadata { url, lenient } => {
            let output = metadata_command(
                &MetadataFetcher::new(),
                &url,
                lenient,
                &config.action_log_dir,
                cli.verbose,
            )
            .await?;
            println!("{}", output);
        }
        Commands::Mode { mode, render } => {
            let registry = load_registry(&config)?;
            let descriptor = registry.lookup(mode);

            if render {
                let mut rendered = descriptor.clone();
                rendered.system_prompt = descriptor
                    .render_at(chrono::Utc::now(), &config.prompt_timezone)
                    .context("PROMPT_TIMEZONE must be an IANA timezone name")?;
                println!("{}", to_json(&rendered)?);
            } else {
                println!("{}", to_json(descriptor)?);
            }
        }
        Commands::Modes => {
            let registry = load_registry(&config)?;
            let modes: Vec<_> = Mode::ALL
                .into_iter()
                .map(|m| serde_json::json!({ "mode": m, "tools": registry.lookup(Some(m)).tools }))
                .collect();
            println!(
                "{}",
                to_json(&serde_json::json!({ "vocabulary": Tool::ALL, "modes": modes }))?
            );
        }
    }

    Ok(())
}

/// Runs one action, returning its output and latency in milliseconds.
async fn timed<T>(action: impl Future<Output = T>) -> (T, u64) {
    let start = Instant::now();
    let output = action.await;
    (output, start.elapsed().as_millis() as u64)
}

/// JSON printed by `metadata`. With `lenient`, every failure becomes `null`.
async fn metadata_command(
    fetcher: &MetadataFetcher,
    url: &str,
    lenient: bool,
    log_dir: &str,
    verbose: bool,
) -> Result<String> {
    if lenient {
        let (metadata, latency) = timed(fetcher.fetch_lenient(url)).await;
        let error = metadata
            .is_none()
            .then(|| "page could not be fetched".to_string());
        log_action(log_dir, &ActionLog::new("metadata", latency, error), verbose);
        return to_json(&metadata);
    }

    let (result, latency) = timed(fetcher.fetch(url)).await;
    let error = result.as_ref().err().map(|e| e.to_string());
    log_action(log_dir, &ActionLog::new("metadata", latency, error), verbose);
    to_json(&result?)
}

fn read_history(path: &str) -> Result<Vec<ChatMessage>> {
    let raw = if path == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read history from stdin")?;
        buf
    } else {
        std::fs::read_to_string(path).context(format!("Failed to open history file: {}", path))?
    };

    serde_json::from_str(&raw).context("History must be a JSON array of {role, content} messages")
}

fn load_registry(config: &Config) -> Result<ModeRegistry> {
    let registry = match &config.modes_dir {
        Some(dir) => ModeRegistry::from_dir(dir)
            .context(format!("Failed to load modes from {}", dir.display()))?,
        None => ModeRegistry::bundled().context("Bundled mode registry is invalid")?,
    };
    Ok(registry)
}

fn log_action(dir: &str, entry: &ActionLog, verbose: bool) {
    instrumentation::record(dir, entry);
    if verbose {
        eprintln!("{}", entry.summary());
    }
}

fn to_json<T: Serialize>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value).context("Failed to serialize output")
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn unwritable_log_dir() -> (PathBuf, String) {
        let blocker = std::env::temp_dir().join(format!("blocker-{}", uuid::Uuid::new_v4()));
        std::fs::write(&blocker, "file, not a directory").unwrap();
        let dir = blocker.join("logs").to_string_lossy().into_owned();
        (blocker, dir)
    }

    #[tokio::test]
    async fn lenient_metadata_prints_null_even_when_logging_fails() {
        let (blocker, log_dir) = unwritable_log_dir();

        let output = metadata_command(&MetadataFetcher::new(), "not a url", true, &log_dir, false)
            .await
            .unwrap();
        assert_eq!(output, "null");

        std::fs::remove_file(blocker).unwrap();
    }

    #[tokio::test]
    async fn metadata_result_survives_a_failed_log_write() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404).set_body_string("<title>Not Found</title>"))
            .mount(&server)
            .await;
        let (blocker, log_dir) = unwritable_log_dir();
        let fetcher = MetadataFetcher::new();

        let lenient = metadata_command(&fetcher, &server.uri(), true, &log_dir, false)
            .await
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&lenient).unwrap();
        assert_eq!(
            value,
            serde_json::json!({ "title": "Not Found", "description": "" })
        );

        let strict = metadata_command(&fetcher, &server.uri(), false, &log_dir, false).await;
        assert!(strict.unwrap_err().to_string().contains("404"));

        std::fs::remove_file(blocker).unwrap();
    }
}
