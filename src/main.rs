//! synapse - run one command through the execution core
//!
//! A thin wiring binary: environment config, tracing init, the Bash tool,
//! and (when an API key is present) the sub-agent runtime bound behind
//! `task:*`. One command in, one shaped result out.

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use synapse_agent::{ExecutorConfig, ProfileSet, SubAgentExecutor, SubAgentTracker, TrackingSink};
use synapse_core::{ChannelSink, CoreConfig, ProgressSink, ToolReturn};
use synapse_llm::AnthropicProvider;
use synapse_tools::{BashParams, BashTool, BashToolDeps, ToolHandle};

#[derive(Parser)]
#[command(name = "synapse", about = "Run a command through the agent execution core")]
struct Cli {
    /// The command to execute (joined when given as multiple words)
    #[arg(required = true)]
    command: Vec<String>,

    /// Kill the current shell and spawn a fresh one before running
    #[arg(long)]
    restart: bool,

    /// Model used by sub-agents dispatched through task:* commands
    #[arg(long)]
    model: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let command = cli.command.join(" ");

    let config = CoreConfig::from_env();

    let (sink, mut progress_rx) = ChannelSink::new();
    let tracker = Arc::new(SubAgentTracker::new(config.recent_tools_max));
    let events: Arc<dyn ProgressSink> =
        Arc::new(TrackingSink::new(tracker, Arc::new(sink)));
    tokio::spawn(async move {
        while let Some(event) = progress_rx.recv().await {
            debug!(?event, "progress");
        }
    });

    let deps = BashToolDeps::new(config).with_events(Arc::clone(&events));
    let tool = BashTool::new(deps);

    // The task runtime only binds when a provider is reachable; without it,
    // task:* commands report an uninitialized handler.
    if let Ok(api_key) = std::env::var("ANTHROPIC_API_KEY") {
        let provider = Arc::new(AnthropicProvider::new(api_key));
        let mut exec_config = ExecutorConfig::default();
        if let Some(model) = cli.model {
            exec_config.model = model;
        }
        let executor = SubAgentExecutor::new(
            provider,
            Arc::clone(&tool),
            ProfileSet::builtin(),
            events,
            exec_config,
        );
        executor.install().await;
    }

    let result = tool
        .call(
            BashParams {
                command,
                restart: cli.restart,
            },
            CancellationToken::new(),
        )
        .await;

    let exit_code = match &result {
        ToolReturn::Ok { output, .. } => {
            println!("{output}");
            0
        }
        ToolReturn::Err {
            output, message, ..
        } => {
            if !output.is_empty() {
                println!("{output}");
            }
            eprintln!("{message}");
            1
        }
    };

    tool.dispose().await;
    std::process::exit(exit_code);
}
