//! Realtime collaborator trait: change streams and presence.
//!
//! A subscription is modeled as a message-passing channel rather than
//! registered callbacks: the caller awaits events from a receiver and
//! cancels delivery through an explicit guard. Dropping the subscription
//! cancels it too, so an exited session can never observe further events.

use std::collections::BTreeSet;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::{
    code::RoomCode,
    error::StoreError,
    record::{RecordId, SecretRecord},
};

/// A row-change event observed on a room's subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeEvent {
    /// A row was inserted into the subscribed room.
    Inserted(SecretRecord),

    /// A row was deleted from the subscribed room.
    ///
    /// Any delete on a live room is a termination signal for its
    /// sessions, so the id is informational only.
    Deleted {
        /// Id of the deleted row.
        id: RecordId,
    },
}

/// A presence event observed on a room's subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PresenceEvent {
    /// The set of currently tracked aliases changed.
    ///
    /// Carries the complete new set; consumers replace, not merge.
    Sync {
        /// Aliases currently present on the channel.
        participants: BTreeSet<String>,
    },
}

/// Any event delivered on a room subscription, in delivery order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoomEvent {
    /// Row inserted or deleted.
    Change(ChangeEvent),
    /// Presence set changed.
    Presence(PresenceEvent),
}

/// Cancellation hook held by a [`Subscription`].
///
/// Implementations stop event delivery and untrack the subscriber's
/// presence alias. Must tolerate being called once at most (the
/// subscription takes the guard before cancelling).
pub trait SubscriptionGuard: Send {
    /// Stop delivery and untrack presence.
    fn cancel(&mut self);
}

/// A standing subscription to one room's change and presence events.
///
/// Delivery stops when [`unsubscribe`](Self::unsubscribe) is called or
/// the value is dropped, whichever comes first.
pub struct Subscription {
    events: mpsc::UnboundedReceiver<RoomEvent>,
    guard: Option<Box<dyn SubscriptionGuard>>,
}

impl Subscription {
    /// Assemble a subscription from a receiver and its cancel guard.
    ///
    /// Called by [`Realtime`] implementations, not by consumers.
    pub fn new(events: mpsc::UnboundedReceiver<RoomEvent>, guard: Box<dyn SubscriptionGuard>) -> Self {
        Self { events, guard: Some(guard) }
    }

    /// Await the next event.
    ///
    /// Returns `None` when the backend closed the stream (realtime
    /// disconnect); the session treats that as a terminal state and a
    /// fresh join is required.
    pub async fn next_event(&mut self) -> Option<RoomEvent> {
        self.events.recv().await
    }

    /// Cancel delivery and untrack presence.
    pub fn unsubscribe(mut self) {
        self.cancel();
    }

    fn cancel(&mut self) {
        if let Some(mut guard) = self.guard.take() {
            guard.cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// The managed backend's realtime surface: filtered change subscription
/// plus advisory presence tracking.
#[async_trait]
pub trait Realtime: Send + Sync {
    /// Open a subscription filtered to `code`, tracking `alias` on the
    /// room's presence channel.
    ///
    /// The returned stream delivers every subsequent insert/delete for
    /// the room and presence syncs (including one reflecting this
    /// subscriber joining). Cancelling untracks the alias.
    ///
    /// # Errors
    ///
    /// - [`StoreError::Unavailable`]: infrastructure failure
    async fn subscribe(&self, code: &RoomCode, alias: &str) -> Result<Subscription, StoreError>;
}
