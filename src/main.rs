use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sage::config::Config;
use sage::generator::QuoteGenerator;
use sage::models::{NewQuote, Origin};
use sage::publish::channels::{InstagramChannel, Publisher, TelegramChannel, TelegramNotifier, TikTokChannel};
use sage::publish::{Dispatcher, LogNotifier, Notifier};
use sage::rotation::RotationSelector;
use sage::scheduler::PublishScheduler;
use sage::storage::{create_sqlite_store, SharedQuoteRepository};
use sage::utils::ReportingClock;

#[derive(Parser)]
#[command(
    name = "sage",
    version,
    about = "Daily quote bot with rotation, AI fallback and multi-channel publishing",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to a TOML config file (falls back to environment variables)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log format (text, json)
    #[arg(long, global = true, default_value = "text")]
    log_format: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the scheduled publishing loop
    Run,

    /// Trigger one publish cycle immediately
    Post,

    /// Add a curated quote to the pool
    Add {
        /// Quote text
        text: String,

        /// Attribution
        #[arg(short, long)]
        author: Option<String>,

        /// Category
        #[arg(long)]
        category: Option<String>,

        /// Comma-separated tags
        #[arg(short, long)]
        tags: Option<String>,

        /// Provenance to record: curated or fallback
        #[arg(long, default_value = "curated")]
        origin: String,
    },

    /// Show pool statistics
    Stats,

    /// Generate a quote without publishing it
    Generate {
        /// Topic to generate about
        #[arg(short, long)]
        topic: Option<String>,

        /// Voice style
        #[arg(short, long)]
        style: Option<String>,

        /// Persist the generated quote to the pool
        #[arg(long, default_value = "false")]
        save: bool,
    },

    /// Make a quote eligible again by clearing its last-used marker
    Reset {
        /// Quote id
        id: i64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_tracing(&cli.log_format, cli.verbose)?;

    let config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::from_env()?,
    };
    config.validate()?;

    let clock = config.clock()?;
    let store = create_sqlite_store(&config.store.sqlite_path, clock)?;

    match cli.command {
        Commands::Run => run(config, store, clock).await?,
        Commands::Post => post(config, store, clock).await?,
        Commands::Add {
            text,
            author,
            category,
            tags,
            origin,
        } => add(&store, text, author, category, tags, &origin)?,
        Commands::Stats => stats(&store)?,
        Commands::Generate { topic, style, save } => {
            generate(&config, &store, topic, style, save).await?
        }
        Commands::Reset { id } => reset(&store, id)?,
    }

    Ok(())
}

fn setup_tracing(format: &str, verbose: bool) -> Result<()> {
    let env_filter = if verbose {
        tracing_subscriber::EnvFilter::new("sage=debug,info")
    } else {
        tracing_subscriber::EnvFilter::new("sage=info,warn")
    };

    match format {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
    }

    Ok(())
}

fn build_scheduler(
    config: &Config,
    store: SharedQuoteRepository,
    clock: ReportingClock,
) -> Result<PublishScheduler> {
    let mut channels: Vec<Arc<dyn Publisher>> = Vec::new();

    if let Some(telegram) = config.channels.telegram.clone() {
        channels.push(Arc::new(TelegramChannel::new(telegram, clock)?));
    }
    if let Some(instagram) = config.channels.instagram.clone() {
        channels.push(Arc::new(InstagramChannel::new(
            instagram,
            Arc::clone(&store),
            clock,
        )?));
    }
    if let Some(tiktok) = config.channels.tiktok.clone() {
        channels.push(Arc::new(TikTokChannel::new(tiktok)));
    }
    tracing::info!(channels = channels.len(), "channels configured");

    let notifier: Arc<dyn Notifier> = match config
        .channels
        .telegram
        .clone()
        .filter(|t| t.admin_chat_id.is_some())
    {
        Some(telegram) => Arc::new(TelegramNotifier::new(telegram, clock)?),
        None => Arc::new(LogNotifier),
    };

    let generator = Arc::new(QuoteGenerator::new(config.generator.clone())?);
    let selector = RotationSelector::new(store, generator);
    let dispatcher = Dispatcher::new(channels);

    Ok(PublishScheduler::new(
        selector,
        dispatcher,
        notifier,
        clock,
        config.schedule.clone(),
    )?)
}

async fn run(config: Config, store: SharedQuoteRepository, clock: ReportingClock) -> Result<()> {
    let scheduler = build_scheduler(&config, store, clock)?;
    tracing::info!("sage starting");

    tokio::select! {
        result = scheduler.run() => result?,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutdown signal received");
        }
    }
    Ok(())
}

async fn post(config: Config, store: SharedQuoteRepository, clock: ReportingClock) -> Result<()> {
    let scheduler = build_scheduler(&config, store, clock)?;
    let report = scheduler.trigger_now().await?;
    println!("{}", report.summary());
    Ok(())
}

fn add(
    store: &SharedQuoteRepository,
    text: String,
    author: Option<String>,
    category: Option<String>,
    tags: Option<String>,
    origin: &str,
) -> Result<()> {
    let mut quote = match Origin::parse(origin) {
        Some(Origin::Fallback) => NewQuote::fallback(text, author),
        Some(Origin::Curated) => NewQuote::curated(text, author),
        Some(Origin::Generated) => {
            anyhow::bail!("origin 'generated' is reserved for the generator gateway")
        }
        None => anyhow::bail!("unknown origin '{origin}' (expected curated or fallback)"),
    };
    quote.category = category;
    quote.tags = tags
        .map(|t| {
            t.split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        })
        .unwrap_or_default();

    let id = store.insert(&quote)?;
    println!("Added quote #{id}");
    Ok(())
}

fn stats(store: &SharedQuoteRepository) -> Result<()> {
    println!("{}", store.stats()?.display());

    let categories = store.categories()?;
    if !categories.is_empty() {
        println!("Categories: {}", categories.join(", "));
    }
    Ok(())
}

async fn generate(
    config: &Config,
    store: &SharedQuoteRepository,
    topic: Option<String>,
    style: Option<String>,
    save: bool,
) -> Result<()> {
    let generator = QuoteGenerator::new(config.generator.clone())?;
    let quote = generator.generate(topic.as_deref(), style.as_deref()).await?;

    println!("«{}»", quote.text);
    if let Some(author) = &quote.attribution {
        println!("— {author}");
    }

    if save {
        let id = store.insert(&quote)?;
        println!("Saved as quote #{id}");
    }
    Ok(())
}

fn reset(store: &SharedQuoteRepository, id: i64) -> Result<()> {
    if store.get(id)?.is_none() {
        anyhow::bail!("no quote with id {id}");
    }
    store.set_last_used(id, None)?;
    println!("Quote #{id} is eligible again");
    Ok(())
}
