mod capture;
mod config;
mod extract;
#[cfg(feature = "serve")]
mod serve;
mod signals;
mod watch;

use clap::Parser;
use config::CommandMateConfig;
use extract::ExtractionResult;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

/// Extract structured metadata (session log, request id, summary) from
/// Claude CLI output captured out of tmux.
#[derive(Parser, Debug)]
#[command(name = "commandmate", version, about)]
pub struct Cli {
    /// Captured output to read ("-" or omitted for stdin)
    #[arg(value_name = "FILE")]
    input: Option<PathBuf>,

    /// Config file path
    #[arg(short, long, default_value = "commandmate.toml")]
    config: PathBuf,

    /// Capture this tmux session's pane instead of reading input
    #[arg(long, value_name = "SESSION", conflicts_with_all = ["input", "watch", "serve"])]
    tmux: Option<String>,

    /// Poll this tmux session and print a JSON line whenever metadata changes
    #[arg(long, value_name = "SESSION", conflicts_with_all = ["input", "serve"])]
    watch: Option<String>,

    /// Run the HTTP extraction service
    #[arg(long, conflicts_with = "input")]
    serve: bool,

    /// Poll interval in seconds for --watch (overrides config)
    #[arg(long)]
    interval: Option<u64>,

    /// Scrollback lines to capture (overrides config)
    #[arg(long)]
    history: Option<u32>,

    /// Bind address for --serve (overrides config)
    #[arg(long)]
    bind: Option<String>,

    /// Port for --serve (overrides config)
    #[arg(long)]
    port: Option<u16>,

    /// Pretty-print JSON output
    #[arg(long)]
    pretty: bool,

    /// Print resolved config and exit
    #[arg(long)]
    dry_run: bool,

    /// Extra logging (capture commands, match details)
    #[arg(short, long)]
    verbose: bool,

    /// Only log errors
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

impl Cli {
    /// Apply command-line overrides on top of the file config.
    fn apply_overrides(&self, config: &mut CommandMateConfig) {
        if let Some(interval) = self.interval {
            config.watch.poll_interval_secs = interval;
        }
        if let Some(history) = self.history {
            config.capture.history_lines = history;
        }
        if let Some(bind) = &self.bind {
            config.serve.bind = bind.clone();
        }
        if let Some(port) = self.port {
            config.serve.port = port;
        }
    }

    fn default_log_level(&self) -> &'static str {
        if self.verbose {
            "commandmate=debug"
        } else if self.quiet {
            "commandmate=error"
        } else {
            "commandmate=info"
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(cli.default_log_level())),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .init();

    tracing::debug!(?cli, "parsed CLI arguments");

    if let Err(e) = run(cli).await {
        eprintln!("commandmate: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = config::load_config(&cli.config)?;
    cli.apply_overrides(&mut config);

    if cli.dry_run {
        println!("{}", toml::to_string_pretty(&config)?);
        return Ok(());
    }

    if cli.serve {
        return serve(&config).await;
    }

    if let Some(session) = &cli.watch {
        let mut watcher =
            watch::Watcher::new(config.capture.clone(), config.watch.clone(), session.clone());
        let stdout = std::io::stdout();
        watcher.run(&mut stdout.lock()).await?;
        return Ok(());
    }

    let result = match &cli.tmux {
        Some(session) => {
            let captured = capture::capture_pane(&config.capture, session).await?;
            extract::extract(&captured.content)
        }
        None => extract::extract_bytes(&read_input(cli.input.as_deref())?),
    };

    if !result.has_metadata() {
        tracing::debug!("no metadata markers found");
    }
    print_result(&result, cli.pretty)?;
    Ok(())
}

#[cfg(feature = "serve")]
async fn serve(config: &CommandMateConfig) -> Result<(), Box<dyn std::error::Error>> {
    serve::run(config).await
}

#[cfg(not(feature = "serve"))]
async fn serve(_config: &CommandMateConfig) -> Result<(), Box<dyn std::error::Error>> {
    Err("built without the `serve` feature".into())
}

/// Read raw bytes from `path`, or stdin when absent or "-".
fn read_input(path: Option<&Path>) -> std::io::Result<Vec<u8>> {
    match path {
        Some(p) if p != Path::new("-") => std::fs::read(p).map_err(|e| {
            std::io::Error::new(e.kind(), format!("failed to read {}: {}", p.display(), e))
        }),
        _ => {
            let mut buf = Vec::new();
            std::io::stdin().lock().read_to_end(&mut buf)?;
            Ok(buf)
        }
    }
}

fn print_result(result: &ExtractionResult, pretty: bool) -> Result<(), Box<dyn std::error::Error>> {
    let json = if pretty {
        serde_json::to_string_pretty(result)?
    } else {
        serde_json::to_string(result)?
    };
    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "{json}")?;
    Ok(())
}
