//! `recap` command-line host.

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use clap::{Args, Parser, Subcommand};
use futures::StreamExt;
use recap::prelude::*;
use recap::{telemetry, PortError};
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tracing::info;

#[derive(Parser)]
#[command(name = "recap")]
#[command(about = "Stream ChatGPT summaries of video transcripts")]
#[command(version)]
struct Cli {
    #[command(flatten)]
    overrides: Overrides,

    /// Emit logs as JSON
    #[arg(long, global = true, env = "RECAP_LOG_JSON")]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

/// Settings that take precedence over `RECAP_*` variables.
#[derive(Args)]
struct Overrides {
    /// Backend origin
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Model selector
    #[arg(long, global = true)]
    model: Option<String>,

    /// User-Agent header
    #[arg(long, global = true)]
    user_agent: Option<String>,

    /// Seconds to wait for the next response fragment (0 disables)
    #[arg(long, global = true)]
    read_timeout_secs: Option<u64>,
}

impl Overrides {
    fn apply(self, mut config: RecapConfig) -> RecapConfig {
        if let Some(base_url) = self.base_url {
            config.base_url = base_url;
        }
        if let Some(model) = self.model {
            config.model = model;
        }
        if let Some(user_agent) = self.user_agent {
            config.user_agent = Some(user_agent);
        }
        if let Some(secs) = self.read_timeout_secs {
            config.read_timeout = (secs > 0).then_some(Duration::from_secs(secs));
        }
        config
    }
}

#[derive(Subcommand)]
enum Command {
    /// Authenticate once and print the resulting status
    Status,

    /// Summarize a transcript and stream the result to stdout
    Summarize {
        /// Transcript file; stdin when omitted
        file: Option<PathBuf>,

        /// Send the input as the prompt, without the summary instruction
        #[arg(long)]
        raw: bool,
    },

    /// Serve newline-delimited JSON messages over stdin/stdout
    Serve {
        /// Prefix incoming prompts with the summary instruction
        #[arg(long)]
        wrap_prompts: bool,
    },
}

/// Port that turns incoming transcripts into summary prompts.
struct SummaryPort<P> {
    inner: P,
}

#[async_trait]
impl<P: ConsumerPort> ConsumerPort for SummaryPort<P> {
    async fn recv(&mut self) -> Result<Option<InboundMessage>, PortError> {
        Ok(self.inner.recv().await?.map(|message| match message {
            InboundMessage::Query { prompt } => InboundMessage::Query {
                prompt: summary_prompt(&prompt),
            },
            other => other,
        }))
    }

    async fn post(&mut self, message: OutboundMessage) -> Result<(), PortError> {
        self.inner.post(message).await
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    telemetry::init_tracing(cli.json_logs).map_err(|err| anyhow!(err))?;

    let config = cli.overrides.apply(RecapConfig::from_env()?);
    config.validate()?;
    let supervisor = ConnectionSupervisor::connect(config).await?;

    match cli.command {
        Command::Status => {
            let status = supervisor.status();
            println!("{}", OutboundMessage::from(&status).to_json()?);
        }
        Command::Summarize { file, raw } => {
            let transcript = match file {
                Some(path) => tokio::fs::read_to_string(&path)
                    .await
                    .with_context(|| format!("reading {}", path.display()))?,
                None => {
                    let mut input = String::new();
                    tokio::io::stdin().read_to_string(&mut input).await?;
                    input
                }
            };
            let prompt = if raw { transcript } else { summary_prompt(&transcript) };

            let mut fragments = supervisor.query(prompt)?;
            let mut stdout = std::io::stdout();
            while let Some(fragment) = fragments.next().await {
                write!(stdout, "{}", fragment?)?;
                stdout.flush()?;
            }
            writeln!(stdout)?;
        }
        Command::Serve { wrap_prompts } => {
            info!(target: "recap::cli", wrap_prompts, "Serving on stdin/stdout");
            if wrap_prompts {
                serve_port(&supervisor, SummaryPort { inner: JsonLinesPort::stdio() }).await?;
            } else {
                serve_port(&supervisor, JsonLinesPort::stdio()).await?;
            }
        }
    }

    supervisor.shutdown();
    Ok(())
}
