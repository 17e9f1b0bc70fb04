use anyhow::{Context, Result, bail};
use clap::{CommandFactory, Parser};
use owo_colors::OwoColorize;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use stagecue::agent::{OrchestratorConfig, ResponseOrchestrator};
use stagecue::cli::{Cli, Commands, ConfigAction};
use stagecue::config::Config;
use stagecue::llm::create_model;
use stagecue::output::{ConsoleEventSink, format_segment};
use stagecue::pipeline::{FnConsumer, NodeError, Segment, SegmentPipeline, SentenceBoundaryNode};
use stagecue::transport::run_agent;
use stagecue::tts::create_synthesizer;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    stagecue::logging::init_logging(cli.quiet, cli.verbose);

    match cli.command {
        Commands::Run { server, name } => {
            let mut config = load_config(cli.config.as_deref())?;
            if let Some(server) = server {
                config.agent.server_url = server;
            }
            if let Some(name) = name {
                config.agent.name = name;
            }
            config.validate()?;
            tracing::info!(version = %stagecue::version_string(), "Starting agent");
            run_agent(&config).await?;
        }
        Commands::Chat { no_color } => {
            let config = load_config(cli.config.as_deref())?;
            config.validate()?;
            let color = !no_color && std::io::stdout().is_terminal();
            run_chat(&config, color).await?;
        }
        Commands::Segment { boundaries } => {
            let config = load_config(cli.config.as_deref())?;
            let boundaries = boundaries.unwrap_or(config.pipeline.boundary_chars);
            run_segment(&boundaries).await?;
        }
        Commands::Config { action } => {
            handle_config_command(action, cli.config.as_deref())?;
        }
        Commands::Completions { shell } => {
            clap_complete::generate(
                shell,
                &mut Cli::command(),
                "stagecue",
                &mut std::io::stdout(),
            );
        }
    }

    Ok(())
}

/// Load configuration from file or use defaults.
///
/// Priority order:
/// 1. Custom config path from CLI (--config)
/// 2. Default config path (~/.config/stagecue/config.toml)
/// 3. Built-in defaults with environment variable overrides
fn load_config(custom_path: Option<&Path>) -> Result<Config> {
    let config = if let Some(path) = custom_path {
        Config::load(path)?
    } else {
        Config::load_or_default(&Config::default_path())?
    };

    Ok(config.with_env_overrides())
}

/// Local conversation: stdin lines in, rendered events out.
///
/// Typing while a reply is still streaming interrupts it, exactly as a
/// `user_input` event from the server would.
async fn run_chat(config: &Config, color: bool) -> Result<()> {
    let model = create_model(&config.llm)?;
    let synthesizer = create_synthesizer(&config.tts)?;
    eprintln!(
        "{} {}: model {}, speech {} (Ctrl-D to quit)",
        "stagecue chat".green(),
        stagecue::version_string().dimmed(),
        model.name(),
        synthesizer.name()
    );

    let mut orchestrator = ResponseOrchestrator::new(
        model,
        synthesizer,
        Arc::new(ConsoleEventSink::new(color)),
        OrchestratorConfig::from(config),
    )?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("Failed to read stdin")? {
        orchestrator.on_user_input(&line).await;
    }
    orchestrator.wait_for_idle().await;
    Ok(())
}

/// Runs stdin through the segmentation pipeline and prints one JSON line
/// per segment.
async fn run_segment(boundaries: &str) -> Result<()> {
    let mut text = String::new();
    tokio::io::stdin()
        .read_to_string(&mut text)
        .await
        .context("Failed to read stdin")?;

    let boundary = SentenceBoundaryNode::new(boundaries)?;
    let mut pipeline = SegmentPipeline::builder(boundary)
        .segment_sink(FnConsumer::<Segment, _>::new(|segment: Segment| async move {
            println!("{}", format_segment(&segment));
            Ok::<(), NodeError>(())
        }))
        .build()?;

    pipeline.push(&text).await?;
    pipeline.flush().await?;
    Ok(())
}

fn handle_config_command(action: ConfigAction, custom_path: Option<&Path>) -> Result<()> {
    let path: PathBuf = custom_path.map_or_else(Config::default_path, Path::to_path_buf);

    match action {
        ConfigAction::Show => {
            let config = load_config(custom_path)?;
            print!("{}", config.to_toml()?);
        }
        ConfigAction::Path => {
            println!("{}", path.display());
        }
        ConfigAction::Init { force } => {
            if path.exists() && !force {
                bail!(
                    "{} already exists (use --force to overwrite)",
                    path.display()
                );
            }
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
            std::fs::write(&path, Config::default().to_toml()?)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("{} {}", "Wrote".green(), path.display());
        }
    }
    Ok(())
}
