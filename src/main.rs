use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use quest_engine::adapters::{JsonLinesTransport, TracingRewardSink};
use quest_engine::clock::SystemClock;
use quest_engine::config::DeliveryMode;
use quest_engine::quest::QuestRegistry;
use quest_engine::store::SqliteQuestRepository;
use quest_engine::{EngineConfig, QuestCommand, QuestService, WorkerPool};

/// Commands waiting per worker before submitters block
const WORKER_QUEUE_SIZE: usize = 256;

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Logs go to stderr; stdout carries the delivered notifications
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("quest_engine=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = EngineConfig::load(&EngineConfig::default_path())?;

    let registry = Arc::new(QuestRegistry::load_from_directory(&config.engine.data_dir)?);
    let repository = Arc::new(SqliteQuestRepository::new(&config.engine.database_url).await?);

    let service = Arc::new(QuestService::new(
        &config,
        registry,
        repository,
        Arc::new(TracingRewardSink),
        Arc::new(JsonLinesTransport::stdout()),
        Arc::new(SystemClock::new()),
    ));

    let flush_loop = match config.notifier.mode {
        DeliveryMode::Queued => Some(service.notifier().clone().start_flush_loop()),
        DeliveryMode::Immediate => None,
    };

    // Spawn housekeeping loop (every 60 seconds)
    let maintenance_service = service.clone();
    let maintenance = tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(60));
        loop {
            interval.tick().await;
            maintenance_service.maintenance();
        }
    });

    let pool = WorkerPool::start(service.clone(), config.engine.worker_count, WORKER_QUEUE_SIZE);
    info!(
        "Quest engine ready with {} quests, reading commands from stdin",
        service.registry().count()
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut line_number = 0u64;
    while let Some(line) = lines.next_line().await? {
        line_number += 1;
        if line.trim().is_empty() {
            continue;
        }

        let command: QuestCommand = match serde_json::from_str(&line) {
            Ok(command) => command,
            Err(e) => {
                warn!(line = line_number, "Ignoring malformed command: {}", e);
                continue;
            }
        };
        let name = command.name();
        let player_id = command.player_id().to_string();

        let reply = match pool.dispatch(command).await {
            Ok(reply) => reply,
            Err(e) => {
                error!("Failed to queue command: {}", e);
                break;
            }
        };
        tokio::spawn(async move {
            match reply.await {
                Ok(Ok(outcome)) => match serde_json::to_string(&outcome) {
                    Ok(json) => info!(player_id = %player_id, command = name, "{}", json),
                    Err(e) => warn!("Failed to serialize outcome: {}", e),
                },
                Ok(Err(e)) => warn!(player_id = %player_id, command = name, "Command failed: {}", e),
                Err(_) => warn!(player_id = %player_id, command = name, "Command dropped"),
            }
        });
    }

    info!("Input closed, shutting down");
    pool.shutdown().await;
    maintenance.abort();
    if let Some(handle) = flush_loop {
        handle.abort();
        let delivered = service.notifier().flush_queues().await;
        info!("Flushed {} queued notification(s) on shutdown", delivered);
    }

    Ok(())
}
