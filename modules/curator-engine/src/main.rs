use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::EnvFilter;

use ai_client::OpenAi;
use curator_common::{Config, ContentPolicy};
use curator_engine::{
    api,
    publisher::Publisher,
    quality::QualityGate,
    reasoning::OpenAiReasoner,
    research::{ResearchCommissioner, ResearchSettings},
    scheduling::{registry, CuratorScheduler, DashboardSnapshot},
    searcher::SerperSearcher,
    sources::{self, HackerNewsSource, RedditSource, WikipediaSource},
    store::{FileStore, HttpPostStore, StateKeys},
    traits::{KeyValueStore, TopicSource},
    CurationLog, CurationPipeline, DedupLedger,
};

#[derive(Parser)]
#[command(name = "curator", about = "Autonomous research curator")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the hourly scheduler and the admin API until interrupted
    Serve,
    /// Run one curation pass now and print its log entry
    RunOnce,
    /// Print the dashboard snapshot from persisted state
    Status,
}

fn init_tracing() -> Result<()> {
    let filter = EnvFilter::from_default_env().add_directive("curator=info".parse()?);
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if std::env::var("LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json")) {
        builder.json().init();
    } else {
        builder.init();
    }
    Ok(())
}

fn open_state(config: &Config) -> Result<Arc<dyn KeyValueStore>> {
    let root = config.data_dir.join("curator");
    Ok(Arc::new(FileStore::open(root.clone()).with_context(|| {
        format!("Failed to open state directory {}", root.display())
    })?))
}

/// Wire the live collaborators into one scheduler for the configured account.
fn build_scheduler(config: &Config) -> Result<Arc<CuratorScheduler>> {
    registry::get_or_init(&config.account_id, || {
        let kv = open_state(config)?;
        let keys = StateKeys::new(config.account_id.as_str());

        let ai = OpenAi::new(&config.llm_api_key, &config.llm_model)
            .with_base_url(&config.llm_base_url)
            .with_timeout(Duration::from_secs(120))?;
        let reasoner = Arc::new(OpenAiReasoner::new(Arc::new(ai)));
        let searcher = Arc::new(SerperSearcher::new(&config.serper_api_key)?);
        let posts = Arc::new(HttpPostStore::new(
            &config.post_store_url,
            config.post_store_token.clone(),
        )?);

        let http = sources::http_client()?;
        let mut adapters: Vec<Arc<dyn TopicSource>> = config
            .subreddits
            .iter()
            .map(|sub| Arc::new(RedditSource::new(http.clone(), sub)) as Arc<dyn TopicSource>)
            .collect();
        adapters.push(Arc::new(HackerNewsSource::new(http.clone())));
        adapters.push(Arc::new(WikipediaSource::new(http)));

        let ledger = Arc::new(DedupLedger::load(kv.clone(), &keys)?);
        let log = Arc::new(CurationLog::load(kv.clone(), &keys)?);

        let research = ResearchCommissioner::new(
            reasoner.clone(),
            searcher,
            ResearchSettings::default()
                .with_model(&config.llm_model)
                .with_inter_query_delay(Duration::from_millis(config.search_delay_ms)),
        );
        let policy = ContentPolicy::default()
            .with_blacklist(config.blacklist_keywords.as_slice())
            .context("Invalid CURATOR_BLACKLIST entry")?;
        let gate = QualityGate::new(reasoner, policy).with_model(&config.llm_model);
        let publisher = Publisher::new(posts, ledger.clone(), &config.post_board, &config.account_id);

        let pipeline = CurationPipeline::new(
            adapters,
            Duration::from_secs(config.adapter_timeout_secs),
            ledger,
            research,
            gate,
            publisher,
        );
        CuratorScheduler::load(keys, kv, pipeline, log, config.max_posts_per_day)
    })
}

async fn serve(config: Config) -> Result<()> {
    let scheduler = build_scheduler(&config)?;
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let scheduler_task = tokio::spawn(scheduler.clone().run_loop(shutdown_rx));

    let app = api::router(scheduler);
    let addr = format!("{}:{}", config.admin_host, config.admin_port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!(addr = addr.as_str(), "Admin API listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown requested");
            let _ = shutdown_tx.send(true);
        })
        .await?;

    scheduler_task.await.context("Scheduler task panicked")?;
    Ok(())
}

async fn run_once(config: Config) -> Result<()> {
    let scheduler = build_scheduler(&config)?;
    let outcome = scheduler.run_now(Utc::now()).await;
    info!(?outcome, "Run finished");

    // Without a fresh entry the newest one belongs to an earlier run.
    let entry = outcome
        .wrote_log_entry()
        .then(|| scheduler.dashboard(Utc::now()).recent_logs.into_iter().next())
        .flatten();
    match entry {
        Some(entry) => println!("{}", serde_json::to_string_pretty(&entry)?),
        None => println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({ "outcome": format!("{outcome:?}") }))?
        ),
    }
    Ok(())
}

fn status(config: Config) -> Result<()> {
    let kv = open_state(&config)?;
    let keys = StateKeys::new(config.account_id.as_str());
    let snapshot = DashboardSnapshot::from_store(kv, &keys, config.max_posts_per_day, Utc::now())?;
    println!("{}", serde_json::to_string_pretty(&snapshot)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing()?;
    let cli = Cli::parse();

    match cli.command {
        Command::Serve => {
            let config = Config::from_env();
            config.log_redacted();
            serve(config).await
        }
        Command::RunOnce => {
            let config = Config::from_env();
            config.log_redacted();
            run_once(config).await
        }
        Command::Status => status(Config::offline_from_env()),
    }
}
