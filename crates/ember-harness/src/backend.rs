//! In-memory backend collaborator.
//!
//! Implements both halves of the collaborator boundary over one shared
//! table: rows live in a `Vec`, change events fan out to per-room
//! subscribers over unbounded channels, and presence is the set of live
//! subscriptions per code.
//!
//! Two fault-injection hooks cover what the real backend does on its own:
//! [`inject_conflicts`](MemoryBackend::inject_conflicts) makes the next N
//! room inserts fail like a uniqueness violation (the §6-shaped `insert`
//! carries no initializer flag, so collisions must be simulated rather
//! than detected), and [`set_unavailable`](MemoryBackend::set_unavailable)
//! turns every call into an infrastructure failure.

use std::{
    collections::BTreeSet,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use async_trait::async_trait;
use tokio::sync::mpsc;

use ember_core::{
    ChangeEvent, NewRecord, PresenceEvent, Realtime, RecordId, RoomCode, RoomEvent, SecretRecord,
    SecretStore, StoreError, Subscription, SubscriptionGuard, TimestampMs,
};

/// Logical clock the backend's `created_at` column starts at.
///
/// Only ordering matters for `created_at`; expiry compares `expires_at`
/// against the environment clock, never against this one.
const CREATED_AT_EPOCH_MS: TimestampMs = 1_700_000_000_000;

/// Shared in-memory stand-in for the managed backend.
///
/// Cloning shares the same table and subscribers.
#[derive(Clone, Default)]
pub struct MemoryBackend {
    inner: Arc<Mutex<Inner>>,
}

struct Inner {
    rows: Vec<SecretRecord>,
    subscribers: Vec<Subscriber>,
    next_row: u64,
    next_subscriber: u64,
    pending_conflicts: u32,
    unavailable: bool,
}

impl Default for Inner {
    fn default() -> Self {
        Self {
            rows: Vec::new(),
            subscribers: Vec::new(),
            next_row: 1,
            next_subscriber: 1,
            pending_conflicts: 0,
            unavailable: false,
        }
    }
}

struct Subscriber {
    id: u64,
    code: RoomCode,
    alias: String,
    tx: mpsc::UnboundedSender<RoomEvent>,
}

impl MemoryBackend {
    /// Create an empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` room inserts fail with a uniqueness conflict.
    pub fn inject_conflicts(&self, count: u32) {
        self.locked().pending_conflicts = count;
    }

    /// Toggle simulated infrastructure failure for every operation.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.locked().unavailable = unavailable;
    }

    /// Number of stored rows.
    pub fn record_count(&self) -> usize {
        self.locked().rows.len()
    }

    /// Snapshot of all stored rows, in insertion order.
    pub fn records(&self) -> Vec<SecretRecord> {
        self.locked().rows.clone()
    }

    /// Number of live subscriptions for a room.
    pub fn subscriber_count(&self, code: &RoomCode) -> usize {
        self.locked().subscribers.iter().filter(|sub| &sub.code == code).count()
    }

    fn locked(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Send a change event to every subscriber of the room.
fn broadcast(inner: &Inner, code: &RoomCode, event: &RoomEvent) {
    for subscriber in inner.subscribers.iter().filter(|sub| &sub.code == code) {
        // A closed receiver just means that client is gone.
        let _ = subscriber.tx.send(event.clone());
    }
}

/// Recompute and fan out the presence set of a room.
fn presence_sync(inner: &Inner, code: &RoomCode) {
    let participants: BTreeSet<String> = inner
        .subscribers
        .iter()
        .filter(|sub| &sub.code == code)
        .map(|sub| sub.alias.clone())
        .collect();
    broadcast(inner, code, &RoomEvent::Presence(PresenceEvent::Sync { participants }));
}

#[async_trait]
impl SecretStore for MemoryBackend {
    async fn insert(&self, record: NewRecord) -> Result<SecretRecord, StoreError> {
        let mut inner = self.locked();
        if inner.unavailable {
            return Err(StoreError::unavailable("simulated outage"));
        }

        if record.room_code.is_some() && inner.pending_conflicts > 0 {
            inner.pending_conflicts -= 1;
            tracing::debug!("injected uniqueness conflict");
            return Err(StoreError::Conflict);
        }

        let row = SecretRecord {
            id: RecordId::new(format!("rec-{:06}", inner.next_row)),
            content: record.content,
            room_code: record.room_code,
            created_at: CREATED_AT_EPOCH_MS + inner.next_row,
            expires_at: record.expires_at,
        };
        inner.next_row += 1;
        inner.rows.push(row.clone());

        if let Some(code) = &row.room_code {
            broadcast(&inner, code, &RoomEvent::Change(ChangeEvent::Inserted(row.clone())));
        }

        Ok(row)
    }

    async fn select_by_id(&self, id: &RecordId) -> Result<SecretRecord, StoreError> {
        let inner = self.locked();
        if inner.unavailable {
            return Err(StoreError::unavailable("simulated outage"));
        }

        inner.rows.iter().find(|row| &row.id == id).cloned().ok_or(StoreError::NotFound)
    }

    async fn select_by_room(&self, code: &RoomCode) -> Result<Vec<SecretRecord>, StoreError> {
        let inner = self.locked();
        if inner.unavailable {
            return Err(StoreError::unavailable("simulated outage"));
        }

        // Insertion order is created_at order: the logical clock is
        // strictly monotonic.
        Ok(inner.rows.iter().filter(|row| row.room_code.as_ref() == Some(code)).cloned().collect())
    }

    async fn delete_by_id(&self, id: &RecordId) -> Result<(), StoreError> {
        let mut inner = self.locked();
        if inner.unavailable {
            return Err(StoreError::unavailable("simulated outage"));
        }

        let Some(at) = inner.rows.iter().position(|row| &row.id == id) else {
            // Idempotent: deleting an absent row is a no-op.
            return Ok(());
        };
        let row = inner.rows.remove(at);

        if let Some(code) = &row.room_code {
            broadcast(&inner, code, &RoomEvent::Change(ChangeEvent::Deleted { id: row.id.clone() }));
        }

        Ok(())
    }

    async fn delete_by_room(&self, code: &RoomCode) -> Result<(), StoreError> {
        let mut inner = self.locked();
        if inner.unavailable {
            return Err(StoreError::unavailable("simulated outage"));
        }

        let mut removed = Vec::new();
        inner.rows.retain(|row| {
            if row.room_code.as_ref() == Some(code) {
                removed.push(row.id.clone());
                false
            } else {
                true
            }
        });

        if !removed.is_empty() {
            tracing::debug!(code = %code, rows = removed.len(), "room nuked");
        }
        for id in removed {
            broadcast(&inner, code, &RoomEvent::Change(ChangeEvent::Deleted { id }));
        }

        Ok(())
    }
}

#[async_trait]
impl Realtime for MemoryBackend {
    async fn subscribe(&self, code: &RoomCode, alias: &str) -> Result<Subscription, StoreError> {
        let mut inner = self.locked();
        if inner.unavailable {
            return Err(StoreError::unavailable("simulated outage"));
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let id = inner.next_subscriber;
        inner.next_subscriber += 1;
        inner.subscribers.push(Subscriber {
            id,
            code: code.clone(),
            alias: alias.to_owned(),
            tx,
        });

        // Everyone in the room, the newcomer included, sees the new set.
        presence_sync(&inner, code);

        let guard = MemoryGuard { inner: Arc::clone(&self.inner), id, code: code.clone() };
        Ok(Subscription::new(rx, Box::new(guard)))
    }
}

/// Removes the subscriber and re-syncs presence on cancel.
struct MemoryGuard {
    inner: Arc<Mutex<Inner>>,
    id: u64,
    code: RoomCode,
}

impl SubscriptionGuard for MemoryGuard {
    fn cancel(&mut self) {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let before = inner.subscribers.len();
        inner.subscribers.retain(|sub| sub.id != self.id);
        if inner.subscribers.len() != before {
            presence_sync(&inner, &self.code);
        }
    }
}
