use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;

use hookline::agent::AgentRuntime;
use hookline::config::Config;
use hookline::console::Console;
use hookline::scene::{demo_scene, SimProjector};
use hookline::transport::Channel;

/// Hookline - command bridge for a scriptable game client
#[derive(Parser, Debug)]
#[command(name = "hookline", version, about)]
struct Args {
    /// Configuration file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Channel name override
    #[arg(long)]
    channel: Option<String>,

    /// Connect/IO timeout override, milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,

    #[command(subcommand)]
    mode: Option<Mode>,
}

#[derive(Subcommand, Debug)]
enum Mode {
    /// Operator console driving a running agent (default)
    Console,
    /// Run the agent runtime against the built-in demo scene
    Agent,
}

#[tokio::main(flavor = "current_thread")] // compile and display are UI-thread work
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };
    if let Some(channel) = args.channel {
        config.channel = channel;
    }
    if let Some(timeout_ms) = args.timeout_ms {
        config.connect_timeout_ms = timeout_ms;
    }

    let channel = Channel::new(&config.channel);

    match args.mode.unwrap_or(Mode::Console) {
        Mode::Console => run_console(config, channel).await,
        Mode::Agent => run_agent(config, channel).await,
    }
}

async fn run_console(config: Config, channel: Channel) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    info!(channel = %config.channel, "console ready, type 'cmds' for help");

    let (mut console, mut notices) = Console::new(channel, config.connect_timeout());
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                match line? {
                    Some(line) => {
                        for out in console.submit(&line) {
                            println!("{}", out);
                        }
                    }
                    None => break, // stdin closed
                }
            }
            Some(notice) = notices.recv() => {
                eprintln!("! {}", notice.message());
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    Ok(())
}

async fn run_agent(config: Config, channel: Channel) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    info!(channel = %config.channel, "starting demo agent");

    let projector = SimProjector::new(config.agent.screen_width, config.agent.screen_height);
    let agent = AgentRuntime::new(&config, demo_scene());
    agent
        .serve(channel, config.frame_interval(), Box::new(projector))
        .await?;
    Ok(())
}
