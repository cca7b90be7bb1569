//! Per-user sessions.
//!
//! Every user id maps to one [`Session`]: its own event bus, a bounded chat
//! history and at most one current task. The process-wide
//! [`SessionRegistry`] hands sessions out and reclaims idle ones.

mod history;

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::events::EventBus;
use crate::executor::{lock_task, SharedTask};
use crate::models::{ChatMessage, ExecutionResult};

pub use history::{ChatHistory, DEFAULT_HISTORY_CAP};

/// Sessions idle for longer than this are swept by default.
pub const DEFAULT_IDLE_AFTER: Duration = Duration::from_secs(3600);

pub type SharedSession = Arc<Mutex<Session>>;

/// Locks a session, recovering from poisoning.
pub fn lock_session(session: &SharedSession) -> MutexGuard<'_, Session> {
    session
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
}

/// Reservation of a session's task slot, taken before planning starts.
///
/// Only the most recent claim may install its task. Older claims have
/// their token cancelled as soon as a newer one is taken.
#[derive(Debug, Clone)]
pub struct TaskClaim {
    generation: u64,
    token: CancellationToken,
}

impl TaskClaim {
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }
}

#[derive(Debug)]
pub struct Session {
    pub user_id: String,
    pub session_id: String,
    pub created_at: Timestamp,
    pub last_activity: Timestamp,
    last_seen: Instant,
    history: ChatHistory,
    events: Arc<EventBus>,
    current: Option<SharedTask>,
    cancel: Option<CancellationToken>,
    generation: u64,
    planning: bool,
    last_result: Option<ExecutionResult>,
}

impl Session {
    pub fn new(user_id: impl Into<String>, history_cap: usize) -> Self {
        let now = Timestamp::now();
        Self {
            user_id: user_id.into(),
            session_id: Uuid::new_v4().to_string(),
            created_at: now,
            last_activity: now,
            last_seen: Instant::now(),
            history: ChatHistory::with_cap(history_cap),
            events: Arc::new(EventBus::new()),
            current: None,
            cancel: None,
            generation: 0,
            planning: false,
            last_result: None,
        }
    }

    pub fn touch(&mut self) {
        self.last_activity = Timestamp::now();
        self.last_seen = Instant::now();
    }

    pub fn idle_for(&self) -> Duration {
        self.last_seen.elapsed()
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    pub fn add_message(&mut self, message: ChatMessage) {
        self.history.push(message);
        self.touch();
    }

    pub fn history(&self) -> &ChatHistory {
        &self.history
    }

    /// Reserves the task slot for a new request.
    ///
    /// Whatever held the slot before, running or still planning, is
    /// cancelled.
    pub fn claim(&mut self) -> TaskClaim {
        if let Some(previous) = self.cancel.take() {
            if !previous.is_cancelled() {
                log::info!("Cancelling previous task for {}", self.user_id);
                previous.cancel();
            }
        }
        self.generation += 1;
        self.planning = true;
        let token = CancellationToken::new();
        self.cancel = Some(token.clone());
        self.touch();
        TaskClaim {
            generation: self.generation,
            token,
        }
    }

    /// Installs `task` as the current task if `claim` is still the latest.
    ///
    /// Returns false when a newer claim superseded this one.
    pub fn begin_task(&mut self, task: SharedTask, claim: &TaskClaim) -> bool {
        if claim.generation != self.generation {
            return false;
        }
        self.current = Some(task);
        self.planning = false;
        self.last_result = None;
        self.touch();
        true
    }

    /// Gives up `claim` without installing a task.
    pub fn release(&mut self, claim: &TaskClaim) {
        if claim.generation == self.generation {
            self.planning = false;
        }
    }

    /// Records the result of `task_id` if it is still the current task.
    pub fn finish_task(&mut self, task_id: &str, result: ExecutionResult) -> bool {
        let is_current = self
            .current
            .as_ref()
            .is_some_and(|t| lock_task(t).task_id == task_id);
        if is_current {
            self.last_result = Some(result);
        }
        is_current
    }

    pub fn current_task(&self) -> Option<SharedTask> {
        self.current.clone()
    }

    pub fn last_result(&self) -> Option<&ExecutionResult> {
        self.last_result.as_ref()
    }

    /// Cancels the in-flight task. Returns false when nothing was running.
    pub fn cancel(&mut self) -> bool {
        match &self.cancel {
            Some(token) if !token.is_cancelled() && self.is_busy() => {
                token.cancel();
                true
            }
            _ => false,
        }
    }

    /// True while a request is being planned or the current task has not
    /// reached a final status.
    pub fn is_busy(&self) -> bool {
        self.planning
            || self
                .current
                .as_ref()
                .is_some_and(|t| !lock_task(t).status.is_finished())
    }

    pub fn info(&self) -> SessionInfo {
        SessionInfo {
            user_id: self.user_id.clone(),
            session_id: self.session_id.clone(),
            created_at: self.created_at,
            last_activity: self.last_activity,
            has_current_task: self.current.is_some(),
            message_count: self.history.len(),
        }
    }
}

/// Serializable overview of one session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionInfo {
    pub user_id: String,
    pub session_id: String,
    pub created_at: Timestamp,
    pub last_activity: Timestamp,
    pub has_current_task: bool,
    pub message_count: usize,
}

/// Process-wide map from user id to session.
#[derive(Debug)]
pub struct SessionRegistry {
    sessions: Mutex<HashMap<String, SharedSession>>,
    history_cap: usize,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::with_history_cap(DEFAULT_HISTORY_CAP)
    }

    pub fn with_history_cap(history_cap: usize) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            history_cap,
        }
    }

    fn map(&self) -> MutexGuard<'_, HashMap<String, SharedSession>> {
        self.sessions
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Returns the user's session, creating it on first use.
    pub fn get_or_create(&self, user_id: &str) -> SharedSession {
        let session = {
            let mut map = self.map();
            if let Some(existing) = map.get(user_id) {
                Arc::clone(existing)
            } else {
                log::info!("Creating session for {user_id}");
                let created = Arc::new(Mutex::new(Session::new(user_id, self.history_cap)));
                map.insert(user_id.to_string(), Arc::clone(&created));
                created
            }
        };
        lock_session(&session).touch();
        session
    }

    pub fn get(&self, user_id: &str) -> Option<SharedSession> {
        self.map().get(user_id).cloned()
    }

    pub fn remove(&self, user_id: &str) -> bool {
        self.map().remove(user_id).is_some()
    }

    pub fn len(&self) -> usize {
        self.map().len()
    }

    pub fn is_empty(&self) -> bool {
        self.map().is_empty()
    }

    pub fn list(&self) -> Vec<SessionInfo> {
        let sessions: Vec<SharedSession> = self.map().values().cloned().collect();
        let mut infos: Vec<SessionInfo> = sessions.iter().map(|s| lock_session(s).info()).collect();
        infos.sort_by(|a, b| a.user_id.cmp(&b.user_id));
        infos
    }

    /// Drops sessions idle for at least `idle_after`.
    ///
    /// Sessions whose task is still running are kept. Returns the removed
    /// user ids.
    pub fn sweep(&self, idle_after: Duration) -> Vec<String> {
        let mut map = self.map();
        let stale: Vec<String> = map
            .iter()
            .filter(|(_, session)| {
                let session = lock_session(session);
                session.idle_for() >= idle_after && !session.is_busy()
            })
            .map(|(user_id, _)| user_id.clone())
            .collect();
        for user_id in &stale {
            map.remove(user_id);
        }
        if !stale.is_empty() {
            log::info!("Swept {} idle sessions", stale.len());
        }
        stale
    }
}
