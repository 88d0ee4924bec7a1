//! Notification Dispatcher
//!
//! In-process registry that fans one event out to every handler registered
//! for its concrete type. Built at composition time; there is no global
//! instance.
//!
//! Handlers for one event run sequentially in registration order. The
//! first failure stops the fan-out and the whole publish counts as failed,
//! so on redelivery every handler runs again. Handlers must tolerate
//! repeats.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

use crate::domain::events::{DomainEvent, Event};

/// Failure reported by a handler.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HandlerError {
    /// Worth retrying on the next poll (timeouts, unavailable transport).
    #[error("{0}")]
    Transient(String),

    /// Retrying cannot succeed; the message is failed immediately.
    #[error("{0}")]
    Permanent(String),
}

/// Result of publishing one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Every handler succeeded (or none was registered).
    Delivered,
    Transient { handler: &'static str, reason: String },
    Terminal { handler: &'static str, reason: String },
}

/// Handles one concrete event type.
#[async_trait]
pub trait NotificationHandler<E: Event>: Send + Sync {
    /// Name used in logs and failure records.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    async fn handle(&self, event: &E, cancel: &CancellationToken) -> Result<(), HandlerError>;
}

#[async_trait]
trait ErasedHandler: Send + Sync {
    fn name(&self) -> &'static str;

    async fn handle(
        &self,
        event: &dyn DomainEvent,
        cancel: &CancellationToken,
    ) -> Result<(), HandlerError>;
}

struct Typed<E, H> {
    handler: Arc<H>,
    _event: PhantomData<fn() -> E>,
}

#[async_trait]
impl<E, H> ErasedHandler for Typed<E, H>
where
    E: Event,
    H: NotificationHandler<E> + 'static,
{
    fn name(&self) -> &'static str {
        self.handler.name()
    }

    async fn handle(
        &self,
        event: &dyn DomainEvent,
        cancel: &CancellationToken,
    ) -> Result<(), HandlerError> {
        let event = event.as_any().downcast_ref::<E>().ok_or_else(|| {
            HandlerError::Permanent(format!(
                "{} received {} instead of {}",
                self.handler.name(),
                event.event_type(),
                E::EVENT_TYPE
            ))
        })?;
        self.handler.handle(event, cancel).await
    }
}

/// Handler registry keyed by concrete event type.
#[derive(Clone, Default)]
pub struct Dispatcher {
    handlers: HashMap<TypeId, Vec<Arc<dyn ErasedHandler>>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for events of type `E`. A handler may be
    /// registered for several event types.
    pub fn register<E, H>(&mut self, handler: Arc<H>) -> &mut Self
    where
        E: Event,
        H: NotificationHandler<E> + 'static,
    {
        let erased: Arc<dyn ErasedHandler> = Arc::new(Typed::<E, H> {
            handler,
            _event: PhantomData,
        });
        self.handlers.entry(TypeId::of::<E>()).or_default().push(erased);
        self
    }

    /// Number of handlers registered for `E`.
    pub fn handler_count<E: Event>(&self) -> usize {
        self.handlers.get(&TypeId::of::<E>()).map_or(0, Vec::len)
    }

    /// Run every handler registered for the event's concrete type.
    #[instrument(skip_all, fields(event_type = event.event_type(), event_id = %event.metadata().event_id))]
    pub async fn publish(&self, event: &dyn DomainEvent, cancel: &CancellationToken) -> DispatchOutcome {
        let type_id = Any::type_id(event.as_any());
        let Some(handlers) = self.handlers.get(&type_id) else {
            debug!("No handlers registered");
            return DispatchOutcome::Delivered;
        };

        for handler in handlers {
            match handler.handle(event, cancel).await {
                Ok(()) => debug!(handler = handler.name(), "Handler succeeded"),
                Err(HandlerError::Transient(reason)) => {
                    warn!(handler = handler.name(), %reason, "Handler failed, will retry");
                    return DispatchOutcome::Transient {
                        handler: handler.name(),
                        reason,
                    };
                }
                Err(HandlerError::Permanent(reason)) => {
                    warn!(handler = handler.name(), %reason, "Handler failed permanently");
                    return DispatchOutcome::Terminal {
                        handler: handler.name(),
                        reason,
                    };
                }
            }
        }

        DispatchOutcome::Delivered
    }
}
