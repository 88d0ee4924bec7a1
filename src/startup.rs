//! Application Startup
//!
//! Composition root: picks the storage backend, builds the event registry,
//! the dispatcher and the processor, and serves the admin router.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::Router;
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::application::handlers::{
    PushNotificationHandler, PushNotifier, SystemMessageHandler,
};
use crate::application::outbox::{
    Dispatcher, EventTypeRegistry, OutboxProcessor, ProcessorConfig,
};
use crate::config::Settings;
use crate::domain::events::{
    CallStarted, FileShared, FriendRequestAccepted, FriendRequestSent, MessageSent,
    PresenceChanged,
};
use crate::domain::{OutboxStore, SystemMessageRepository};
use crate::infrastructure::memory::{MemoryDatabase, MemorySystemMessageStore};
use crate::infrastructure::push::{self, LoggingPushNotifier, RedisPushNotifier};
use crate::infrastructure::database;
use crate::presentation::http::handlers::health;
use crate::presentation::http::routes;
use crate::shared::snowflake::SnowflakeGenerator;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn OutboxStore>,
    /// Present when a Redis URL is configured
    pub redis: Option<RedisPushNotifier>,
    pub settings: Arc<Settings>,
}

/// Register every notification handler of the chat server.
///
/// Push runs before the system message handler so a push outage fails the
/// event before any derived state is written.
pub fn build_dispatcher(
    notifier: Arc<dyn PushNotifier>,
    messages: Arc<dyn SystemMessageRepository>,
    ids: Arc<SnowflakeGenerator>,
) -> Dispatcher {
    let push = Arc::new(PushNotificationHandler::new(notifier));
    let system = Arc::new(SystemMessageHandler::new(messages, ids));

    let mut dispatcher = Dispatcher::new();
    dispatcher
        .register::<FriendRequestSent, _>(push.clone())
        .register::<FriendRequestAccepted, _>(push.clone())
        .register::<FriendRequestAccepted, _>(system)
        .register::<MessageSent, _>(push.clone())
        .register::<PresenceChanged, _>(push.clone())
        .register::<CallStarted, _>(push.clone())
        .register::<FileShared, _>(push);
    dispatcher
}

/// Application instance
pub struct Application {
    listener: TcpListener,
    router: Router,
    processor: OutboxProcessor,
}

impl Application {
    /// Build the application from settings
    pub async fn build(settings: Settings) -> Result<Self> {
        health::init_server_start();

        let ids = Arc::new(SnowflakeGenerator::new(
            settings.snowflake.machine_id,
            settings.snowflake.node_id,
        ));

        let (store, messages): (Arc<dyn OutboxStore>, Arc<dyn SystemMessageRepository>) =
            match &settings.database.url {
                Some(url) => {
                    let pool = database::create_pool(&settings.database, url).await?;
                    database::run_migrations(&pool).await?;
                    info!("Database migrations applied");
                    (
                        Arc::new(database::PgOutboxStore::new(pool.clone())),
                        Arc::new(database::PgSystemMessageStore::new(pool)),
                    )
                }
                None => {
                    warn!("No database URL configured, using the in-memory backend");
                    let db = MemoryDatabase::new();
                    (Arc::new(db.clone()), Arc::new(MemorySystemMessageStore::new(db)))
                }
            };

        let redis = match &settings.redis.url {
            Some(url) => Some(RedisPushNotifier::new(push::create_redis_client(url).await?)),
            None => {
                warn!("No Redis URL configured, push notifications are logged only");
                None
            }
        };
        let notifier: Arc<dyn PushNotifier> = match &redis {
            Some(redis) => Arc::new(redis.clone()),
            None => Arc::new(LoggingPushNotifier),
        };

        let registry = Arc::new(EventTypeRegistry::with_chat_events());
        info!(event_types = registry.len(), "Event type registry built");

        let dispatcher = Arc::new(build_dispatcher(notifier, messages, ids));
        let processor = OutboxProcessor::new(
            store.clone(),
            registry,
            dispatcher,
            ProcessorConfig::from(&settings.outbox),
        );

        let state = AppState {
            store,
            redis,
            settings: Arc::new(settings.clone()),
        };
        let router = routes::create_router(state);

        let listener = TcpListener::bind(settings.server_addr()).await?;
        info!("Listening on {}", listener.local_addr()?);

        Ok(Self {
            listener,
            router,
            processor,
        })
    }

    /// Run the processor and the admin server until Ctrl-C.
    pub async fn run_until_stopped(self) -> Result<()> {
        let handle = self.processor.start();
        let token = handle.token();

        let serve = axum::serve(self.listener, self.router).with_graceful_shutdown(async move {
            shutdown_signal().await;
            token.cancel();
        });
        let result = serve.await;

        handle.shutdown();
        handle.join().await;
        result?;
        Ok(())
    }

    /// Get the bound address
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dispatcher_covers_every_registered_event() {
        let db = MemoryDatabase::new();
        let dispatcher = build_dispatcher(
            Arc::new(LoggingPushNotifier),
            Arc::new(MemorySystemMessageStore::new(db)),
            Arc::new(SnowflakeGenerator::new(1, 1)),
        );

        assert_eq!(dispatcher.handler_count::<FriendRequestSent>(), 1);
        assert_eq!(dispatcher.handler_count::<FriendRequestAccepted>(), 2);
        assert_eq!(dispatcher.handler_count::<MessageSent>(), 1);
        assert_eq!(dispatcher.handler_count::<PresenceChanged>(), 1);
        assert_eq!(dispatcher.handler_count::<CallStarted>(), 1);
        assert_eq!(dispatcher.handler_count::<FileShared>(), 1);
    }
}
