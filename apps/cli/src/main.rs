use std::{
    path::PathBuf,
    sync::Arc,
    time::{Duration, Instant},
};

use anyhow::Result;
use clap::{Parser, ValueEnum};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use storyforge_core::{
    Asset, AssetSet, AssetType, CancellationToken, CreditLedger, FileLedger, GenerationSession,
    GeneratorConfig, HttpTransport, Provider, Script, StoredResult, StoryforgeError,
    format_script_export, get_export_dir, get_ledger_path, save_export,
};
use tracing_subscriber::EnvFilter;

fn format_duration(d: Duration) -> String {
    let secs = d.as_secs_f64();
    if secs < 60.0 {
        format!("{:.1}s", secs)
    } else {
        format!("{:.0}m {:.0}s", (secs / 60.0).floor(), secs % 60.0)
    }
}

/// CLI wrapper for Provider enum (needed for clap ValueEnum)
#[derive(Clone, ValueEnum)]
enum CliProvider {
    Proxy,
    Gemini,
}

impl From<CliProvider> for Provider {
    fn from(cli: CliProvider) -> Self {
        match cli {
            CliProvider::Proxy => Provider::Proxy,
            CliProvider::Gemini => Provider::Gemini,
        }
    }
}

#[derive(Parser)]
#[command(name = "storyforge")]
#[command(about = "Turn a topic, photos or a video into three short-video storyboards")]
struct Cli {
    /// What the clip is about
    topic: Option<String>,

    /// Tone of the clip (e.g. "funny", "hard-sell", "cinematic")
    #[arg(short, long, default_value = "")]
    style: String,

    /// Image to build scenes around, in order (up to 5)
    #[arg(short, long = "image", value_name = "PATH")]
    images: Vec<PathBuf>,

    /// Video the clip is based on (never uploaded)
    #[arg(long, value_name = "PATH")]
    video: Option<PathBuf>,

    /// Backend to generate with. Overrides STORYFORGE_PROVIDER.
    #[arg(short, long)]
    provider: Option<CliProvider>,

    /// Generation endpoint. Overrides STORYFORGE_SERVER_URL.
    #[arg(long, value_name = "URL")]
    server_url: Option<String>,

    /// Sampling temperature
    #[arg(short, long)]
    temperature: Option<f32>,

    /// Save every script as a text file, optionally into DIR
    #[arg(short, long, value_name = "DIR", num_args = 0..=1)]
    export: Option<Option<PathBuf>>,

    /// Show the credit balance and exit
    #[arg(long)]
    credits: bool,

    /// Add credits to the balance
    #[arg(long, value_name = "N")]
    add_credits: Option<u64>,

    /// Debug logging on stderr
    #[arg(short, long)]
    verbose: bool,
}

fn init_tracing(verbose: bool) {
    let fallback = if verbose {
        "storyforge=debug,storyforge_core=debug"
    } else {
        "warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn create_progress_bar() -> ProgressBar {
    let pb = ProgressBar::new(100);
    pb.set_style(
        ProgressStyle::default_bar()
            .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ")
            .template("{spinner:.cyan} [{bar:40.cyan/blue}] {pos:>3}% {msg}")
            .unwrap()
            .progress_chars("█▓░"),
    );
    pb.set_message("Directing...");
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

fn fail(message: impl std::fmt::Display) -> ! {
    eprintln!("{} {}", style("Error:").red().bold(), message);
    std::process::exit(1);
}

async fn collect_assets(images: &[PathBuf], video: Option<&PathBuf>) -> storyforge_core::Result<Vec<Asset>> {
    let mut assets = AssetSet::new();
    for path in images {
        assets.push(Asset::image_from_path(path).await?)?;
    }
    if let Some(path) = video {
        assets.push(Asset::video_from_path(path).await?)?;
    }
    Ok(assets.into_vec())
}

fn print_script(index: usize, script: &Script, stored: &StoredResult) {
    println!(
        "\n{} {}",
        style(format!("Concept {}", index + 1)).cyan().bold(),
        style(&script.concept_name).bold()
    );
    println!("{}", style("─".repeat(60)).dim());
    print!("{}", format_script_export(script));

    let used: Vec<String> = script
        .scenes
        .iter()
        .enumerate()
        .filter(|(_, scene)| scene.asset_type == AssetType::UserAsset)
        .map(|(i, scene)| match scene.resolve_asset(&stored.assets) {
            Some(asset) => format!("scene {} → {}", i + 1, asset.name),
            None => format!("scene {} → (missing image)", i + 1),
        })
        .collect();
    if !used.is_empty() {
        println!("{} {}", style("Your images:").dim(), used.join(", "));
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut config = GeneratorConfig::from_env().unwrap_or_else(|e| fail(e));
    if let Some(provider) = cli.provider.clone() {
        config.provider = provider.into();
    }
    if let Some(url) = cli.server_url.clone() {
        config.endpoint = Some(url);
    }
    if let Some(temperature) = cli.temperature {
        config.temperature = temperature;
    }
    tracing::debug!(?config, "Configuration loaded");

    let ledger_path = get_ledger_path();
    let ledger: Arc<dyn CreditLedger> = Arc::new(FileLedger::open(&ledger_path, config.initial_credits)?);

    if let Some(amount) = cli.add_credits {
        ledger.credit(amount);
        println!(
            "{} Added {} credits",
            style("✓").green().bold(),
            style(amount).cyan()
        );
    }
    if cli.credits || cli.add_credits.is_some() {
        println!(
            "{} {} {}",
            style("Balance:").dim(),
            style(ledger.balance()).cyan().bold(),
            style(format!("({})", ledger_path.display())).dim()
        );
        return Ok(());
    }

    // Validate API key early
    let transport = HttpTransport::from_config(&config).unwrap_or_else(|e| fail(e));

    let topic = cli.topic.clone().unwrap_or_default();
    let assets = collect_assets(&cli.images, cli.video.as_ref())
        .await
        .unwrap_or_else(|e| fail(e));

    let provider = config.provider;
    println!(
        "\n{}  {}\n",
        style("storyforge").cyan().bold(),
        style("AI Director").dim()
    );
    println!(
        "{} {} {} {}",
        style("✓").green().bold(),
        provider.name(),
        style(provider.config().model).yellow(),
        style(format!("[{} credits per run, balance {}]", config.credit_cost, ledger.balance())).dim()
    );
    println!("{}", style("─".repeat(60)).dim());

    let session = GenerationSession::new(config, Arc::new(transport), Arc::clone(&ledger));
    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        });
    }

    let start = Instant::now();
    let pb = create_progress_bar();
    let mut status = session.subscribe();
    let generation = session.start_generation(&topic, &cli.style, assets, cancel.clone());
    tokio::pin!(generation);

    let outcome = loop {
        tokio::select! {
            outcome = &mut generation => break outcome,
            Ok(()) = status.changed() => {
                let run = status.borrow_and_update().clone();
                pb.set_position(run.percent() as u64);
                pb.set_message(format!("Directing... {}s", run.elapsed_seconds));
            }
        }
    };

    let stored = match outcome {
        Ok(stored) => {
            pb.set_position(100);
            pb.finish_with_message(format!(
                "{} {} storyboards {}",
                style("✓").green().bold(),
                stored.scripts.len(),
                style(format!("[{}]", format_duration(start.elapsed()))).dim()
            ));
            stored
        }
        Err(e) => {
            pb.abandon();
            if matches!(e, StoryforgeError::Cancelled) {
                eprintln!("{} {}", style("Cancelled:").yellow().bold(), e.user_message());
            } else {
                eprintln!("{} {}", style("Error:").red().bold(), e.user_message());
            }
            let refunded = session.current_run().refunded_credits;
            if refunded > 0 {
                eprintln!(
                    "{} {} {}",
                    style(format!("{} credits refunded,", refunded)).dim(),
                    style("balance:").dim(),
                    style(ledger.balance()).cyan()
                );
            }
            std::process::exit(1);
        }
    };

    for (i, script) in stored.scripts.iter().enumerate() {
        print_script(i, script, &stored);
    }

    if let Some(dir) = cli.export {
        let dir = dir.unwrap_or_else(get_export_dir);
        let now = chrono::Local::now();
        println!();
        for script in stored.scripts.iter() {
            let path = save_export(script, &dir, &now).await?;
            println!("{} {}", style("Saved:").dim(), style(path.display()).cyan());
        }
    }

    println!(
        "\n{} {}  {} {}\n",
        style("Total time:").dim(),
        style(format_duration(start.elapsed())).cyan().bold(),
        style("Balance:").dim(),
        style(ledger.balance()).cyan()
    );

    Ok(())
}
