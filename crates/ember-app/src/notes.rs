//! One-shot note driver.

use std::{collections::VecDeque, sync::Arc};

use ember_client::{
    Denial, Locator, NotePublisher, NoteViewer, PublisherAction, PublisherEvent, PublisherState,
    ViewerAction, ViewerEvent, ViewerState,
};
use ember_core::{SecretStore, env::Environment};

use crate::error::PublishError;

/// How opening a locator ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NoteOutcome {
    /// The note was decrypted and its burn was issued.
    Revealed {
        /// The recovered plaintext.
        plaintext: String,
    },

    /// No plaintext; an explicit terminal rejection.
    Denied {
        /// What the user is told.
        reason: Denial,
    },
}

/// Driver for the one-shot note flows.
///
/// Owns no state between calls: each publish or open drives a fresh
/// machine to a terminal state and returns the result.
pub struct NoteService<S, E> {
    store: Arc<S>,
    env: E,
}

impl<S: SecretStore, E: Environment> NoteService<S, E> {
    /// Create a service over the given store.
    pub fn new(store: Arc<S>, env: E) -> Self {
        Self { store, env }
    }

    /// Seal and store a note; returns the shareable locator.
    ///
    /// # Errors
    ///
    /// - [`PublishError::EmptyNote`]: blank submission
    /// - [`PublishError::Store`]: the insert failed
    pub async fn publish(&self, plaintext: &str, origin: &str) -> Result<Locator, PublishError> {
        let mut publisher = NotePublisher::new(self.env.clone());

        let mut queue: VecDeque<PublisherAction> = publisher
            .handle(PublisherEvent::Submit {
                plaintext: plaintext.to_owned(),
                origin: origin.to_owned(),
            })
            .into();

        while let Some(action) = queue.pop_front() {
            match action {
                PublisherAction::Insert(payload) => {
                    let event = match self.store.insert(payload).await {
                        Ok(record) => PublisherEvent::InsertCompleted { record },
                        Err(error) => PublisherEvent::InsertFailed { error },
                    };
                    queue.extend(publisher.handle(event));
                },
                PublisherAction::Log { message } => tracing::debug!("{message}"),
            }
        }

        match publisher.state() {
            PublisherState::Published { locator } => Ok(locator.clone()),
            PublisherState::Failed { error } => Err(PublishError::Store(error.clone())),
            PublisherState::Composing => Err(PublishError::EmptyNote),
            PublisherState::Waiting { .. } => {
                unreachable!("insert outcome was fed back before the queue drained")
            },
        }
    }

    /// Open a locator: fetch, unseal, and on success burn the record.
    ///
    /// Every failure resolves to an explicit [`NoteOutcome::Denied`]; this
    /// method never hangs in an intermediate state.
    pub async fn open(&self, url: &str) -> NoteOutcome {
        let mut viewer = NoteViewer::new(self.env.clone());

        let mut queue: VecDeque<ViewerAction> =
            viewer.handle(ViewerEvent::Opened { url: url.to_owned() }).into();

        while let Some(action) = queue.pop_front() {
            match action {
                ViewerAction::Fetch { id } => {
                    let event = match self.store.select_by_id(&id).await {
                        Ok(record) => ViewerEvent::RecordArrived { record },
                        Err(error) => ViewerEvent::FetchFailed { error },
                    };
                    queue.extend(viewer.handle(event));
                },
                ViewerAction::Burn { id } => {
                    let event = match self.store.delete_by_id(&id).await {
                        Ok(()) => ViewerEvent::BurnCompleted,
                        Err(error) => ViewerEvent::BurnFailed { error },
                    };
                    queue.extend(viewer.handle(event));
                },
                ViewerAction::Log { message } => tracing::debug!("{message}"),
            }
        }

        match viewer.state() {
            ViewerState::Revealed { plaintext } => {
                NoteOutcome::Revealed { plaintext: plaintext.clone() }
            },
            ViewerState::Denied { reason } => NoteOutcome::Denied { reason: *reason },
            ViewerState::Idle | ViewerState::Fetching { .. } => {
                unreachable!("viewer reaches a terminal state once its actions drain")
            },
        }
    }
}
