//! CLI for pfpgen - AI profile-picture generation.

use clap::{Args, Parser, Subcommand, ValueEnum};
use pfpgen::{ClientKind, Config, FileQuotaStore, QuotaTracker, SessionController};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "pfpgen")]
#[command(about = "Turn a photo or a description into a cute baby-style profile picture")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a profile picture
    Generate(GenerateArgs),

    /// Show how many generations are left today
    Quota,
}

#[derive(Args)]
struct GenerateArgs {
    /// Description of the picture (defaults to a baby-style makeover of the image)
    #[arg(default_value = "")]
    prompt: String,

    /// Source image to transform (defaults to the bundled placeholder)
    #[arg(short, long, conflicts_with = "no_image")]
    input: Option<PathBuf>,

    /// Send the prompt alone, without any source image
    #[arg(long)]
    no_image: bool,

    /// Directory the result is written to
    #[arg(short, long, default_value = ".")]
    output: PathBuf,

    /// Backend to use (overrides PFP_BACKEND)
    #[arg(short, long, value_enum)]
    backend: Option<BackendArg>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum BackendArg {
    Proxy,
    Gemini,
}

impl From<BackendArg> for ClientKind {
    fn from(arg: BackendArg) -> Self {
        match arg {
            BackendArg::Proxy => ClientKind::Proxy,
            BackendArg::Gemini => ClientKind::Gemini,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = Config::from_env();

    match cli.command {
        Commands::Generate(args) => generate(args, config, cli.json).await?,
        Commands::Quota => show_quota(&config, cli.json)?,
    }

    Ok(())
}

fn quota_tracker(config: &Config) -> QuotaTracker {
    QuotaTracker::new(FileQuotaStore::new(&config.quota_file))
}

async fn generate(args: GenerateArgs, mut config: Config, json_output: bool) -> anyhow::Result<()> {
    if let Some(backend) = args.backend {
        config.backend = backend.into();
    }

    let client = pfpgen::client_from_config(&config)?;
    let session = SessionController::new(client, quota_tracker(&config)).with_config(&config);

    tracing::debug!(backend = %config.backend, api_url = %config.api_url, "session ready");
    session.refresh_quota()?;
    session.set_prompt(&args.prompt);

    if let Some(ref input) = args.input {
        if let Err(e) = session.select_upload(input).await {
            return report_failure(&e, json_output);
        }
    } else if args.no_image {
        session.clear_source();
    }

    if let Err(e) = session.generate().await {
        return report_failure(&e, json_output);
    }

    let saved = session
        .download(&args.output)?
        .ok_or_else(|| anyhow::anyhow!("generation finished without a result"))?;
    let state = session.snapshot();

    if json_output {
        let result = serde_json::json!({
            "success": true,
            "output": saved.display().to_string(),
            "backend": config.backend.to_string(),
            "remaining": state.remaining,
        });
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!("Generated image: {} via {}", saved.display(), session.client_name());
        println!("{} / {} free generations left", state.remaining, pfpgen::DAILY_LIMIT);
    }

    Ok(())
}

fn report_failure(err: &pfpgen::PfpError, json_output: bool) -> anyhow::Result<()> {
    // Preconditions fail before any request goes out
    let sent = !err.is_precondition();
    if json_output {
        let result = serde_json::json!({
            "success": false,
            "error": err.to_string(),
            "sent": sent,
        });
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else if !sent {
        tracing::info!("nothing was sent");
    }
    anyhow::bail!("{err}")
}

fn show_quota(config: &Config, json_output: bool) -> anyhow::Result<()> {
    let tracker = quota_tracker(config);
    let remaining = tracker.check_and_refresh()?;

    if json_output {
        let result = serde_json::json!({
            "remaining": remaining,
            "limit": tracker.limit(),
            "quota_file": config.quota_file.display().to_string(),
        });
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!("{} / {} free generations left today", remaining, tracker.limit());
    }

    Ok(())
}
