//! Room driver: creation, join, and the live session loop.

use std::{collections::VecDeque, sync::Arc};

use ember_client::{
    CreateConfig, CreateFailure, CreationAction, CreationEvent, CreationState, RoomCreation,
    RoomSession, SessionAction, SessionEvent, SessionPhase, Termination,
};
use ember_core::{Realtime, RoomCode, SecretStore, StoreError, Subscription, env::Environment};

use crate::error::{CreateError, JoinError};

/// Driver for room creation and joining.
pub struct RoomRuntime<S, R, E> {
    store: Arc<S>,
    realtime: Arc<R>,
    env: E,
}

impl<S, R, E> RoomRuntime<S, R, E>
where
    S: SecretStore,
    R: Realtime,
    E: Environment,
{
    /// Create a runtime over the given collaborators.
    pub fn new(store: Arc<S>, realtime: Arc<R>, env: E) -> Self {
        Self { store, realtime, env }
    }

    /// Create a room and return its shareable code.
    ///
    /// Drives the bounded collision-retry sequence: a uniqueness conflict
    /// regenerates the code; anything else ends the attempt.
    ///
    /// # Errors
    ///
    /// - [`CreateError::CodesExhausted`]: every code collided
    /// - [`CreateError::Store`]: non-conflict backend failure
    pub async fn create(&self, alias: &str, config: CreateConfig) -> Result<RoomCode, CreateError> {
        let mut creation = RoomCreation::new(self.env.clone(), alias, config);

        let mut queue: VecDeque<CreationAction> = creation.handle(CreationEvent::Start).into();
        while let Some(action) = queue.pop_front() {
            match action {
                CreationAction::Insert(payload) => {
                    let event = match self.store.insert(payload).await {
                        Ok(record) => CreationEvent::InsertSucceeded { record },
                        Err(error) => CreationEvent::InsertFailed { error },
                    };
                    queue.extend(creation.handle(event));
                },
                CreationAction::Log { message } => tracing::debug!("{message}"),
            }
        }

        match creation.state() {
            CreationState::Created { code } => Ok(code.clone()),
            CreationState::Failed { failure: CreateFailure::AttemptsExhausted { attempts } } => {
                Err(CreateError::CodesExhausted { attempts: *attempts })
            },
            CreationState::Failed { failure: CreateFailure::Backend { error } } => {
                Err(CreateError::Store(error.clone()))
            },
            CreationState::Idle | CreationState::Inserting { .. } => {
                unreachable!("insert outcome was fed back before the queue drained")
            },
        }
    }

    /// Join a room by code.
    ///
    /// Subscribes first, then fetches history, so no insert can fall into
    /// a gap between the two; the session buffers events that race the
    /// backlog fetch.
    ///
    /// # Errors
    ///
    /// - [`JoinError::InvalidCode`]: malformed code, no backend call made
    /// - [`JoinError::AccessDenied`]: no surviving records for the code
    /// - [`JoinError::Unavailable`]: subscribe or history fetch failed
    pub async fn join(&self, alias: &str, code: &str) -> Result<JoinedRoom<S, E>, JoinError> {
        let (session, startup) = RoomSession::join(self.env.clone(), alias, code)?;
        let mut room = JoinedRoom { session, subscription: None, store: Arc::clone(&self.store) };

        for action in startup {
            match action {
                SessionAction::Subscribe { code, alias } => {
                    match self.realtime.subscribe(&code, &alias).await {
                        Ok(subscription) => room.subscription = Some(subscription),
                        Err(error) => return Err(JoinError::Unavailable(error)),
                    }
                },
                SessionAction::FetchHistory { code } => {
                    let event = match self.store.select_by_room(&code).await {
                        Ok(records) => SessionEvent::HistoryLoaded { records },
                        Err(error) => SessionEvent::HistoryFailed { error },
                    };
                    let actions = room.session.handle(event);
                    room.execute_infallible(actions);
                },
                other => {
                    let actions = vec![other];
                    room.execute_infallible(actions);
                },
            }
        }

        match room.session.phase() {
            SessionPhase::Active => Ok(room),
            SessionPhase::Terminated { reason } => match reason {
                Termination::Unavailable => Err(JoinError::Unavailable(StoreError::unavailable(
                    "history fetch failed",
                ))),
                _ => Err(JoinError::AccessDenied),
            },
            SessionPhase::Joining => {
                unreachable!("history outcome was fed back during startup")
            },
        }
    }
}

/// A live room membership.
///
/// Owns the session machine and its subscription. Dropping the value
/// cancels the subscription, so an abandoned session can never observe
/// further events.
pub struct JoinedRoom<S, E: Environment> {
    session: RoomSession<E>,
    subscription: Option<Subscription>,
    store: Arc<S>,
}

impl<S: SecretStore, E: Environment> JoinedRoom<S, E> {
    /// The underlying session: phase, messages, participants.
    pub fn session(&self) -> &RoomSession<E> {
        &self.session
    }

    /// Seal and send a message to the room.
    ///
    /// The message joins the local log when its echo arrives on the
    /// subscription, keeping ordering backend-assigned.
    ///
    /// # Errors
    ///
    /// [`StoreError`] if the insert failed; the session stays active.
    pub async fn send(&mut self, text: &str) -> Result<(), StoreError> {
        let actions = self.session.handle(SessionEvent::SendRequested { text: text.to_owned() });
        self.execute(actions).await
    }

    /// Delete every record of the room, for everyone.
    ///
    /// Local termination follows through this session's own subscription,
    /// the same delete event every other participant observes.
    ///
    /// # Errors
    ///
    /// [`StoreError`] if the bulk delete failed.
    pub async fn nuke(&mut self) -> Result<(), StoreError> {
        let actions = self.session.handle(SessionEvent::NukeRequested);
        self.execute(actions).await
    }

    /// Leave the room, tearing down the subscription.
    pub fn leave(&mut self) {
        let actions = self.session.handle(SessionEvent::LeaveRequested);
        self.execute_infallible(actions);
    }

    /// Await the next subscription event, feed it to the session, and
    /// return the resulting phase.
    ///
    /// Returns immediately with the current phase if the session already
    /// terminated.
    pub async fn pump(&mut self) -> &SessionPhase {
        if matches!(self.session.phase(), SessionPhase::Terminated { .. }) {
            return self.session.phase();
        }

        let event = match &mut self.subscription {
            Some(subscription) => match subscription.next_event().await {
                Some(room_event) => SessionEvent::Room(room_event),
                None => SessionEvent::SubscriptionClosed,
            },
            None => SessionEvent::SubscriptionClosed,
        };

        let actions = self.session.handle(event);
        self.execute_infallible(actions);
        self.session.phase()
    }

    /// Execute actions that may hit the backend.
    async fn execute(&mut self, actions: Vec<SessionAction>) -> Result<(), StoreError> {
        for action in actions {
            match action {
                SessionAction::Insert(payload) => {
                    self.store.insert(payload).await?;
                },
                SessionAction::DeleteRoom { code } => {
                    self.store.delete_by_room(&code).await?;
                },
                other => self.execute_one_local(other),
            }
        }
        Ok(())
    }

    /// Execute actions that cannot fail (teardown, logging).
    fn execute_infallible(&mut self, actions: Vec<SessionAction>) {
        for action in actions {
            match action {
                SessionAction::Insert(_) | SessionAction::DeleteRoom { .. } => {
                    tracing::warn!("dropping backend action from a local-only transition");
                },
                other => self.execute_one_local(other),
            }
        }
    }

    fn execute_one_local(&mut self, action: SessionAction) {
        match action {
            SessionAction::Unsubscribe => {
                if let Some(subscription) = self.subscription.take() {
                    subscription.unsubscribe();
                }
            },
            SessionAction::Log { message } => tracing::debug!("{message}"),
            SessionAction::Subscribe { .. } | SessionAction::FetchHistory { .. } => {
                tracing::warn!("startup action outside join; ignoring");
            },
            SessionAction::Insert(_) | SessionAction::DeleteRoom { .. } => {
                tracing::warn!("backend action routed to local executor; ignoring");
            },
        }
    }
}
