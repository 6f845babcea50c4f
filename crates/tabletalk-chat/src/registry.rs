//! Session registry: owns every live [`ChatSession`] for one dataset.
//!
//! Each session sits behind its own async mutex, so turns within a session
//! are sequential while separate sessions run concurrently over the same
//! shared table.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use uuid::Uuid;

use tabletalk_core::ConversationTurn;
use tabletalk_table::Dataset;

use crate::error::ChatError;
use crate::session::{ChatSession, TurnOutcome, TurnPipeline};

/// Sessions idle longer than this are pruned.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// Listing entry for one session.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub last_active: DateTime<Utc>,
    pub turn_count: usize,
}

#[derive(Debug, Clone, Copy)]
struct Activity {
    last_active: DateTime<Utc>,
    turn_count: usize,
}

struct SessionEntry {
    session: tokio::sync::Mutex<ChatSession>,
    cancel: CancellationToken,
    created_at: DateTime<Utc>,
    activity: Mutex<Activity>,
}

impl SessionEntry {
    fn activity(&self) -> Activity {
        *self.activity.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn touch(&self, turn_count: usize) {
        let mut activity = self.activity.lock().unwrap_or_else(|e| e.into_inner());
        activity.last_active = Utc::now();
        activity.turn_count = turn_count;
    }

    fn summary(&self, id: Uuid) -> SessionSummary {
        let activity = self.activity();
        SessionSummary {
            id,
            created_at: self.created_at,
            last_active: activity.last_active,
            turn_count: activity.turn_count,
        }
    }
}

/// Creates, runs and tears down chat sessions.
pub struct SessionRegistry {
    dataset: Dataset,
    pipeline: Arc<TurnPipeline>,
    sessions: Mutex<HashMap<Uuid, Arc<SessionEntry>>>,
    idle_timeout: Duration,
}

impl SessionRegistry {
    pub fn new(dataset: Dataset, pipeline: Arc<TurnPipeline>) -> Self {
        Self {
            dataset,
            pipeline,
            sessions: Mutex::new(HashMap::new()),
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
        }
    }

    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    pub fn pipeline(&self) -> &Arc<TurnPipeline> {
        &self.pipeline
    }

    /// Load the dataset (memoized) and open a new session over it.
    ///
    /// A failed load is not cached, so each call tries again.
    pub async fn create_session(&self) -> Result<SessionSummary, ChatError> {
        let table = self
            .dataset
            .load()
            .await
            .map_err(ChatError::TableUnavailable)?;

        let session = ChatSession::new(Ok(table), Arc::clone(&self.pipeline));
        let id = session.id();
        let created_at = session.created_at();
        let entry = Arc::new(SessionEntry {
            cancel: session.cancellation_token(),
            session: tokio::sync::Mutex::new(session),
            created_at,
            activity: Mutex::new(Activity {
                last_active: created_at,
                turn_count: 0,
            }),
        });
        let summary = entry.summary(id);

        self.lock_sessions().insert(id, entry);
        info!(session_id = %id, source = %self.dataset.locator(), "Session created");
        Ok(summary)
    }

    /// Run one turn on session `id`. Waits for any turn already in flight.
    pub async fn submit_query(&self, id: Uuid, query: &str) -> Result<TurnOutcome, ChatError> {
        let entry = self.entry(id)?;
        let mut session = entry.session.lock().await;
        let result = session.submit_query(query).await;
        entry.touch(session.log().len());
        result
    }

    pub async fn history(&self, id: Uuid) -> Result<Vec<ConversationTurn>, ChatError> {
        let entry = self.entry(id)?;
        let session = entry.session.lock().await;
        Ok(session.log().snapshot())
    }

    /// Clear the conversation log of session `id`.
    pub async fn reset(&self, id: Uuid) -> Result<(), ChatError> {
        let entry = self.entry(id)?;
        let mut session = entry.session.lock().await;
        session.reset();
        entry.touch(0);
        Ok(())
    }

    /// Remove session `id`, cancelling any turn in flight.
    pub fn teardown(&self, id: Uuid) -> Result<(), ChatError> {
        let entry = self
            .lock_sessions()
            .remove(&id)
            .ok_or(ChatError::SessionNotFound(id))?;
        entry.cancel.cancel();
        info!(session_id = %id, "Session torn down");
        Ok(())
    }

    /// Summaries of all sessions, oldest first.
    pub fn list(&self) -> Vec<SessionSummary> {
        let mut summaries: Vec<SessionSummary> = self
            .lock_sessions()
            .iter()
            .map(|(id, entry)| entry.summary(*id))
            .collect();
        summaries.sort_by_key(|s| s.created_at);
        summaries
    }

    pub fn contains(&self, id: Uuid) -> bool {
        self.lock_sessions().contains_key(&id)
    }

    /// Tear down sessions idle for at least the idle timeout. Sessions with
    /// a turn in flight are skipped. Returns how many were removed.
    pub fn prune_expired(&self) -> usize {
        let now = Utc::now();
        let mut sessions = self.lock_sessions();
        let expired: Vec<Uuid> = sessions
            .iter()
            .filter(|(_, entry)| {
                let idle = (now - entry.activity().last_active)
                    .to_std()
                    .unwrap_or_default();
                idle >= self.idle_timeout && entry.session.try_lock().is_ok()
            })
            .map(|(id, _)| *id)
            .collect();

        for id in &expired {
            if let Some(entry) = sessions.remove(id) {
                entry.cancel.cancel();
                debug!(session_id = %id, "Expired session pruned");
            }
        }
        if !expired.is_empty() {
            info!(pruned = expired.len(), remaining = sessions.len(), "Pruned idle sessions");
        }
        expired.len()
    }

    pub fn len(&self) -> usize {
        self.lock_sessions().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn entry(&self, id: Uuid) -> Result<Arc<SessionEntry>, ChatError> {
        self.lock_sessions()
            .get(&id)
            .cloned()
            .ok_or(ChatError::SessionNotFound(id))
    }

    fn lock_sessions(&self) -> std::sync::MutexGuard<'_, HashMap<Uuid, Arc<SessionEntry>>> {
        self.sessions.lock().unwrap_or_else(|e| e.into_inner())
    }
}

// =============================================================================
// Tests
// =============================================================================
