//! Application state wiring all services together.
//!
//! Services are generic over repository and provider traits; AppState pins
//! them to the concrete SQLite and HTTP implementations from infra.

use std::path::PathBuf;
use std::sync::Arc;

use secrecy::SecretString;

use handover_core::chat::ChatService;
use handover_core::event::EventBus;
use handover_core::learning::LearningCapture;
use handover_core::respond::Responder;
use handover_core::takeover::TakeoverArbitrator;
use handover_infra::config::load_service_config;
use handover_infra::provider::HttpTextProvider;
use handover_infra::sqlite::admin_session::SqliteAdminSessionRepository;
use handover_infra::sqlite::conversation::SqliteConversationRepository;
use handover_infra::sqlite::learning::SqliteLearningRepository;
use handover_infra::sqlite::message::SqliteMessageRepository;
use handover_infra::sqlite::pool::{database_url, DatabasePool};
use handover_infra::sqlite::reply_cache::SqliteReplyCacheRepository;
use handover_types::config::ServiceConfig;

use crate::realtime::SessionRegistry;

/// Concrete type aliases for the service generics pinned to infra
/// implementations.
pub type ConcreteChatService = ChatService<
    SqliteConversationRepository,
    SqliteMessageRepository,
    SqliteAdminSessionRepository,
    SqliteReplyCacheRepository,
    HttpTextProvider,
>;

pub type ConcreteArbitrator = TakeoverArbitrator<
    SqliteConversationRepository,
    SqliteMessageRepository,
    SqliteAdminSessionRepository,
>;

pub type ConcreteLearningCapture = LearningCapture<
    SqliteConversationRepository,
    SqliteMessageRepository,
    SqliteLearningRepository,
>;

/// Event bus capacity. Slow subscribers past this many buffered events
/// start lagging rather than blocking publishers.
const EVENT_CAPACITY: usize = 256;

/// Shared application state for HTTP and WebSocket handlers.
#[derive(Clone)]
pub struct AppState {
    pub chat_service: Arc<ConcreteChatService>,
    pub arbitrator: Arc<ConcreteArbitrator>,
    pub learning: Arc<ConcreteLearningCapture>,
    pub admin_sessions: SqliteAdminSessionRepository,
    pub conversations: SqliteConversationRepository,
    pub event_bus: EventBus,
    pub registry: Arc<SessionRegistry>,
    pub config: ServiceConfig,
    pub db_pool: DatabasePool,
    pub data_dir: PathBuf,
}

impl AppState {
    /// Initialize the application state: load config, connect to the
    /// database, wire services.
    pub async fn init(data_dir_override: Option<&str>) -> anyhow::Result<Self> {
        let mut config = load_service_config(
            &PathBuf::from(data_dir_override.unwrap_or("./data")),
        )
        .await;
        if let Some(dir) = data_dir_override {
            config.server.data_dir = dir.to_string();
        }

        let data_dir = PathBuf::from(&config.server.data_dir);
        tokio::fs::create_dir_all(&data_dir).await?;

        let db_pool = DatabasePool::new(&database_url(&config.server.data_dir)).await?;

        let conversations = SqliteConversationRepository::new(db_pool.clone());
        let messages = SqliteMessageRepository::new(db_pool.clone());
        let admin_sessions = SqliteAdminSessionRepository::new(db_pool.clone());
        let reply_cache = SqliteReplyCacheRepository::new(db_pool.clone());
        let learning_repo = SqliteLearningRepository::new(db_pool.clone());

        let event_bus = EventBus::new(EVENT_CAPACITY);

        let arbitrator = Arc::new(TakeoverArbitrator::new(
            conversations.clone(),
            messages.clone(),
            admin_sessions.clone(),
            event_bus.clone(),
        ));

        // The provider key never enters the config file; it comes from the
        // environment and stays wrapped in SecretString.
        let api_key = SecretString::from(
            std::env::var("HANDOVER_PROVIDER_API_KEY").unwrap_or_default(),
        );
        let provider_url = std::env::var("HANDOVER_PROVIDER_URL")
            .unwrap_or_else(|_| "https://api.anthropic.com".to_string());
        let provider_model = std::env::var("HANDOVER_PROVIDER_MODEL")
            .unwrap_or_else(|_| "claude-3-5-haiku-latest".to_string());
        let provider = HttpTextProvider::new(api_key, provider_url, provider_model);

        let responder = Arc::new(Responder::new(
            reply_cache,
            provider,
            config.responder.clone(),
        ));

        let chat_service = Arc::new(ChatService::new(
            conversations.clone(),
            messages.clone(),
            arbitrator.clone(),
            responder,
            event_bus.clone(),
        ));

        let learning = Arc::new(LearningCapture::new(
            conversations.clone(),
            messages,
            learning_repo,
            event_bus.clone(),
        ));

        Ok(Self {
            chat_service,
            arbitrator,
            learning,
            admin_sessions,
            conversations,
            event_bus,
            registry: Arc::new(SessionRegistry::new()),
            config,
            db_pool,
            data_dir,
        })
    }
}
