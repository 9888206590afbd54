//! Orchestration core entry point: composition root and CLI.

use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use orchestrator::admission::BatchAdmissionController;
use orchestrator::bus::{AmqpMessageBus, MessageBus};
use orchestrator::config::Settings;
use orchestrator::consumer::ResponseConsumer;
use orchestrator::correlation::{CorrelationRegistry, CorrelationStore, RedisCorrelationStore};
use orchestrator::health;
use orchestrator::publisher::{CareerDocsPublisher, DispatchPublisher};
use orchestrator::refill::RefillLoop;
use orchestrator::store::{ArtifactStore, MongoArtifactStore};

#[derive(Parser)]
#[command(name = "orchestrator")]
#[command(about = "Async orchestration core for the job-application processing pipeline")]
#[command(version)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the Refill Loop, Response Consumer, and health endpoint until killed.
    Serve,

    /// Run a single refill pass and exit.
    RefillOnce,

    /// Submit applications for one user to the applier queues.
    Submit {
        /// The user whose applications to submit.
        user_id: String,
        /// Specific application ids to submit; if omitted, submits all unsent.
        #[arg(long = "ids", num_args = 0..)]
        ids: Vec<String>,
    },

    /// Check connectivity to the Message Bus, Artifact Store, and Correlation Store.
    Healthcheck,
}

struct Adapters {
    bus: Arc<dyn MessageBus>,
    store: Arc<dyn ArtifactStore>,
    correlation_store: Arc<dyn CorrelationStore>,
}

async fn build_adapters(settings: &Settings) -> anyhow::Result<Adapters> {
    let bus = Arc::new(AmqpMessageBus::new(settings.amqp_url.clone()));
    let store = Arc::new(MongoArtifactStore::connect(&settings.mongo_url, &settings.mongo_database).await?);
    let correlation_store = Arc::new(RedisCorrelationStore::connect(&settings.redis_url).await?);
    Ok(Adapters {
        bus,
        store,
        correlation_store,
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let default_filter = if cli.verbose {
        "orchestrator=debug"
    } else {
        "orchestrator=info"
    };

    let settings = Settings::load().await;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter.into());

    if settings.log_format == "json" {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    match cli.command {
        Commands::Serve => serve(settings).await,
        Commands::RefillOnce => refill_once(settings).await,
        Commands::Submit { user_id, ids } => submit(settings, user_id, ids).await,
        Commands::Healthcheck => healthcheck(settings).await,
    }
}

async fn serve(settings: Settings) -> anyhow::Result<()> {
    let adapters = build_adapters(&settings).await?;
    let correlation = Arc::new(CorrelationRegistry::new(adapters.correlation_store.clone()));
    let admission = Arc::new(BatchAdmissionController::new(adapters.store.clone()));
    let publisher = Arc::new(CareerDocsPublisher::new(
        adapters.bus.clone(),
        adapters.store.clone(),
        correlation.clone(),
        admission,
        settings.career_docs_queue.clone(),
        settings.max_inflight,
    ));
    let consumer = ResponseConsumer::new(
        adapters.bus.clone(),
        adapters.store.clone(),
        correlation,
        settings.career_docs_response_queue.clone(),
    );
    let refill = RefillLoop::new(
        publisher,
        Duration::from_secs(settings.refill_period_seconds),
    );

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let (trigger_tx, trigger_rx) = tokio::sync::mpsc::channel(16);

    let refill_task = tokio::spawn(async move { refill.run(shutdown_rx, trigger_rx).await });

    let consumer_trigger_tx = trigger_tx.clone();
    let consumer_shutdown = shutdown_tx.subscribe();
    let consumer_task = tokio::spawn(async move {
        let shutdown = consumer_shutdown;
        while !*shutdown.borrow() {
            match consumer.process_one().await {
                Ok(true) => {
                    let _ = consumer_trigger_tx.send(()).await;
                }
                Ok(false) => {
                    tokio::time::sleep(Duration::from_millis(250)).await;
                }
                Err(e) => {
                    tracing::error!(event_type = "RESPONSE_CONSUMER_FAILED", error = %e);
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
            }
        }
    });

    let application_manager_bus = adapters.bus.clone();
    let application_manager_queue = settings.application_manager_queue.clone();
    let application_manager_shutdown = shutdown_tx.subscribe();
    let application_manager_task = tokio::spawn(async move {
        let shutdown = application_manager_shutdown;
        while !*shutdown.borrow() {
            match application_manager_bus.poll(&application_manager_queue).await {
                Ok(Some(delivery)) => {
                    if let Err(e) = delivery.ack().await {
                        tracing::error!(event_type = "APPLICATION_MANAGER_ACK_FAILED", error = %e);
                        continue;
                    }
                    let _ = trigger_tx.send(()).await;
                }
                Ok(None) => {
                    tokio::time::sleep(Duration::from_millis(250)).await;
                }
                Err(e) => {
                    tracing::error!(event_type = "APPLICATION_MANAGER_POLL_FAILED", error = %e);
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
            }
        }
    });

    let health_state = health::HealthState::new(
        adapters.bus.clone(),
        adapters.store.clone(),
        adapters.correlation_store.clone(),
        settings.career_docs_queue.clone(),
    );
    let health_router = health::create_router(health_state);
    let listener = tokio::net::TcpListener::bind(&settings.health_bind_addr).await?;
    let health_task = tokio::spawn(async move {
        axum::serve(listener, health_router).await.ok();
    });

    tokio::signal::ctrl_c().await?;
    tracing::info!(event_type = "SHUTDOWN_REQUESTED", "ctrl-c received, stopping loops");
    let _ = shutdown_tx.send(true);

    let _ = refill_task.await;
    let _ = consumer_task.await;
    let _ = application_manager_task.await;
    health_task.abort();

    Ok(())
}

async fn refill_once(settings: Settings) -> anyhow::Result<()> {
    let adapters = build_adapters(&settings).await?;
    let correlation = Arc::new(CorrelationRegistry::new(adapters.correlation_store));
    let admission = Arc::new(BatchAdmissionController::new(adapters.store.clone()));
    let publisher = Arc::new(CareerDocsPublisher::new(
        adapters.bus,
        adapters.store,
        correlation,
        admission,
        settings.career_docs_queue.clone(),
        settings.max_inflight,
    ));
    let refill = RefillLoop::new(publisher, Duration::from_secs(settings.refill_period_seconds));
    let published = refill.run_once().await?;
    println!("published {published} batch(es) to {}", settings.career_docs_queue);
    Ok(())
}

async fn submit(settings: Settings, user_id: String, ids: Vec<String>) -> anyhow::Result<()> {
    let adapters = build_adapters(&settings).await?;
    let publisher = DispatchPublisher::new(
        adapters.bus,
        adapters.store,
        settings.providers_queue.clone(),
        settings.skyvern_queue.clone(),
        settings.providers_enabled,
        settings.skyvern_enabled,
    );

    let submitted = if ids.is_empty() {
        publisher.submit_all(&user_id).await?
    } else {
        publisher.submit_selected(&user_id, &ids).await?
    };
    println!("submitted {submitted} application(s) for user {user_id}");
    Ok(())
}

async fn healthcheck(settings: Settings) -> anyhow::Result<()> {
    let adapters = build_adapters(&settings).await?;
    let bus_ok = adapters.bus.queue_depth(&settings.career_docs_queue).await.is_ok();
    let store_ok = adapters.store.get_pending_batch("__healthz__").await.is_ok();
    let correlation_ok = adapters.correlation_store.exists("__healthz__").await.is_ok();

    println!("bus: {bus_ok}, artifact_store: {store_ok}, correlation_store: {correlation_ok}");
    if bus_ok && store_ok && correlation_ok {
        Ok(())
    } else {
        anyhow::bail!("one or more dependencies are unreachable")
    }
}
