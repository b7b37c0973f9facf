//! Cognitive orchestration core entry point: loads configuration, wires
//! the durable stores and in-process collaborators, and starts every
//! component (C3-C11) as a long-lived background task.

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tracing::info;

use cogcore::domain::models::Config;
use cogcore::domain::ports::{EventBus, GoalRepository, KvStore, LlmProvider, WorkflowRepository};
use cogcore::infrastructure::config::ConfigLoader;
use cogcore::infrastructure::database::{DatabaseConnection, SqliteGoalRepository, SqliteWorkflowRepository};
use cogcore::infrastructure::event_bus::BroadcastEventBus;
use cogcore::infrastructure::kv::InMemoryKvStore;
use cogcore::infrastructure::llm::{HttpLlmProvider, HttpLlmProviderConfig, MockLlmProvider};
use cogcore::infrastructure::logging::LoggerImpl;
use cogcore::infrastructure::tools::{InMemoryToolRegistry, MockSandboxRunner};
use cogcore::services::{
    ActiveLearningGenerator, AutoThrottle, AutonomyCycle, CandidateGenerator, CoherenceMonitor,
    GapFillingGenerator, GatedToolExecutor, GoalPoller, HypothesisGenerator, LearningFeedback,
    LlmQueue, WorkflowEngine,
};

/// No subcommands: this process only ever runs the orchestration loop.
#[derive(Parser, Debug)]
#[command(name = "cogcore", about = "Cognitive orchestration core daemon")]
struct Args {
    /// Path to a config file, overriding the default hierarchical lookup.
    #[arg(long, env = "COGCORE_CONFIG")]
    config: Option<String>,

    /// Use the mock LLM provider instead of a live HTTP call.
    #[arg(long, env = "COGCORE_MOCK_LLM")]
    mock_llm: bool,

    /// Agent identity used for goal-poller triggered-keys and watchers.
    #[arg(long, env = "COGCORE_AGENT_ID", default_value = "cogcore")]
    agent_id: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config: Config = match &args.config {
        Some(path) => ConfigLoader::load_from_file(path).context("failed to load config file")?,
        None => ConfigLoader::load().context("failed to load config")?,
    };

    let _logger = LoggerImpl::init(&config.logging).context("failed to initialize logging")?;
    info!(agent_id = %args.agent_id, "starting cognitive orchestration core");

    let db = DatabaseConnection::connect(&config.database.path, config.database.max_connections)
        .await
        .context("failed to open database")?;

    let goal_repo: Arc<dyn GoalRepository> = Arc::new(SqliteGoalRepository::new(db.pool().clone()));
    let workflow_repo: Arc<dyn WorkflowRepository> = Arc::new(SqliteWorkflowRepository::new(db.pool().clone()));
    let kv: Arc<dyn KvStore> = Arc::new(InMemoryKvStore::new());
    let bus: Arc<dyn EventBus> = Arc::new(BroadcastEventBus::new());

    let llm_provider: Arc<dyn LlmProvider> = if args.mock_llm {
        Arc::new(MockLlmProvider::new(std::time::Duration::from_millis(200)))
    } else {
        Arc::new(HttpLlmProvider::new(HttpLlmProviderConfig::default())?)
    };

    let tool_registry = Arc::new(InMemoryToolRegistry::new());
    let sandbox = Arc::new(MockSandboxRunner::new(std::time::Duration::from_millis(50)));
    let _tool_executor = Arc::new(GatedToolExecutor::new(tool_registry, sandbox));

    let llm_queue = LlmQueue::spawn(&config.llm, llm_provider, kv.clone());

    let auto_throttle = Arc::new(AutoThrottle::new(&config.llm, llm_queue.clone(), kv.clone(), bus.clone()));
    auto_throttle.spawn();

    let workflow_engine = Arc::new(WorkflowEngine::new(&config.workflow, workflow_repo, bus.clone()));
    workflow_engine
        .clone()
        .spawn_periodic_cleanup(std::time::Duration::from_secs(config.workflow.timeout_secs.max(60)));

    let goal_poller = Arc::new(GoalPoller::new(
        &config.goal,
        args.agent_id.clone(),
        goal_repo.clone(),
        workflow_engine.clone(),
        kv.clone(),
        bus.clone(),
        config.goal.important_terms.clone(),
        config.goal.generic_terms.clone(),
    ));
    goal_poller.spawn();

    let generators: Vec<Box<dyn CandidateGenerator>> = vec![
        Box::new(GapFillingGenerator),
        Box::new(ActiveLearningGenerator),
        Box::new(HypothesisGenerator),
    ];
    let autonomy_cycle = Arc::new(AutonomyCycle::new(
        &config.autonomy,
        config.hypothesis.screen_threshold,
        args.agent_id.clone(),
        bus.clone(),
        kv.clone(),
        goal_repo.clone(),
        llm_queue.clone(),
        generators,
    ));
    autonomy_cycle.spawn();

    let belief_domains = vec!["general".to_string(), "markets".to_string(), "security".to_string()];
    let strategy_categories = vec!["default".to_string()];
    let coherence_monitor = Arc::new(CoherenceMonitor::new(
        &config.coherence,
        args.agent_id.clone(),
        belief_domains,
        strategy_categories,
        goal_repo.clone(),
        kv.clone(),
        bus.clone(),
    ));
    coherence_monitor.spawn();

    let learning_feedback = Arc::new(LearningFeedback::new(bus.clone(), kv.clone()));
    learning_feedback.spawn();

    info!("all components started; running until terminated");
    tokio::signal::ctrl_c().await.context("failed to listen for shutdown signal")?;
    info!("shutdown signal received, exiting");
    Ok(())
}
