//! Push Transport
//!
//! Publishes push envelopes on per-user Redis pub/sub channels
//! (`push:user:{id}`). The real-time hub subscribed to those channels
//! forwards them to live client connections.
//!
//! Without Redis, [`LoggingPushNotifier`] records what would have been sent.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};
use tracing::{info, instrument};

use crate::application::handlers::{PushError, PushNotification, PushNotifier};

/// Pub/sub channel for a user's pushes.
pub fn user_channel(user_id: i64) -> String {
    format!("push:user:{user_id}")
}

/// Creates a Redis connection manager with automatic reconnection.
#[instrument(skip(url))]
pub async fn create_redis_client(url: &str) -> Result<ConnectionManager, redis::RedisError> {
    info!("Connecting to Redis...");
    let client = Client::open(url)?;
    let manager = ConnectionManager::new(client).await?;
    info!("Redis connection established");
    Ok(manager)
}

/// Redis pub/sub push transport.
#[derive(Clone)]
pub struct RedisPushNotifier {
    conn: ConnectionManager,
}

impl RedisPushNotifier {
    pub fn new(conn: ConnectionManager) -> Self {
        Self { conn }
    }

    /// Round-trip check used by the health endpoint.
    pub async fn ping(&self) -> Result<(), redis::RedisError> {
        let mut conn = self.conn.clone();
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }
}

#[async_trait]
impl PushNotifier for RedisPushNotifier {
    #[instrument(skip_all, fields(recipient_id = notification.recipient_id, kind = notification.kind))]
    async fn push(&self, notification: PushNotification) -> Result<(), PushError> {
        let channel = user_channel(notification.recipient_id);
        let payload = serde_json::to_string(&notification)?;

        let mut conn = self.conn.clone();
        let receivers: i64 = conn.publish(&channel, payload).await?;
        tracing::debug!(%channel, receivers, "Push published");
        Ok(())
    }
}

/// Push transport that only logs. Used when no Redis URL is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingPushNotifier;

#[async_trait]
impl PushNotifier for LoggingPushNotifier {
    async fn push(&self, notification: PushNotification) -> Result<(), PushError> {
        info!(
            recipient_id = notification.recipient_id,
            kind = notification.kind,
            event_id = %notification.event_id,
            "Push (not sent, no transport configured)"
        );
        Ok(())
    }
}
