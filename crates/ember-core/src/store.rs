//! Storage collaborator trait.

use async_trait::async_trait;

use crate::{
    code::RoomCode,
    error::StoreError,
    record::{NewRecord, RecordId, SecretRecord},
};

/// The managed backend's row operations, as consumed by the protocol core.
///
/// Implementations wrap whatever hosted service actually holds the table;
/// the in-memory harness implementation stands in for it during tests.
///
/// # Contract
///
/// - [`insert`](Self::insert) assigns `id` and `created_at` and returns
///   the completed record.
/// - [`select_by_room`](Self::select_by_room) returns records in
///   `created_at` ascending order; an unknown code yields an empty list,
///   not an error.
/// - Both delete operations are idempotent: deleting an absent row is
///   `Ok(())`, never an error.
/// - No operation interprets `content`; blobs pass through opaquely.
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Create a row. The backend assigns `id` and `created_at`.
    ///
    /// # Errors
    ///
    /// - [`StoreError::Conflict`]: a uniqueness constraint rejected the
    ///   insert (room-creation collision)
    /// - [`StoreError::Unavailable`]: infrastructure failure
    async fn insert(&self, record: NewRecord) -> Result<SecretRecord, StoreError>;

    /// Fetch a single row by id.
    ///
    /// # Errors
    ///
    /// - [`StoreError::NotFound`]: no such row (or no longer such a row)
    /// - [`StoreError::Unavailable`]: infrastructure failure
    async fn select_by_id(&self, id: &RecordId) -> Result<SecretRecord, StoreError>;

    /// Fetch all rows for a room, `created_at` ascending.
    ///
    /// # Errors
    ///
    /// - [`StoreError::Unavailable`]: infrastructure failure
    async fn select_by_room(&self, code: &RoomCode) -> Result<Vec<SecretRecord>, StoreError>;

    /// Delete a row by id. Idempotent.
    ///
    /// # Errors
    ///
    /// - [`StoreError::Unavailable`]: infrastructure failure
    async fn delete_by_id(&self, id: &RecordId) -> Result<(), StoreError>;

    /// Delete every row for a room ("nuke"). Idempotent.
    ///
    /// Subscribers to the room observe the deletion through their
    /// [`crate::Realtime`] subscription.
    ///
    /// # Errors
    ///
    /// - [`StoreError::Unavailable`]: infrastructure failure
    async fn delete_by_room(&self, code: &RoomCode) -> Result<(), StoreError>;
}
