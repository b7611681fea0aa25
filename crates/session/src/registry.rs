//! Session registry
//!
//! Shared map from session id to live session. The map itself is the only
//! cross-session state and is locked only on insert/remove/lookup; each
//! session's state machine stays under its own mutex, mutated by exactly one
//! connection task at a time.

use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;

use voicegate_config::RegistryConfig;

use crate::state_machine::SessionStateMachine;
use crate::SessionError;

/// One registered session: the state machine plus liveness bookkeeping.
pub struct SessionHandle {
    pub id: String,
    /// Exclusive ownership stays with the connection task; the mutex only
    /// backs handover across disconnect/reconnect, never per-message sharing.
    pub machine: Mutex<SessionStateMachine>,
    created_at: Instant,
    last_activity: RwLock<Instant>,
    active: RwLock<bool>,
}

impl SessionHandle {
    fn new(id: String, machine: SessionStateMachine) -> Self {
        Self {
            id,
            machine: Mutex::new(machine),
            created_at: Instant::now(),
            last_activity: RwLock::new(Instant::now()),
            active: RwLock::new(true),
        }
    }

    /// Update last activity
    pub fn touch(&self) {
        *self.last_activity.write() = Instant::now();
    }

    /// Check if session is expired
    pub fn is_expired(&self, timeout: Duration) -> bool {
        self.last_activity.read().elapsed() > timeout
    }

    pub fn close(&self) {
        *self.active.write() = false;
    }

    pub fn is_active(&self) -> bool {
        *self.active.read()
    }

    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }
}

/// Registry of live sessions with a capacity limit and idle expiry.
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, Arc<SessionHandle>>>,
    max_sessions: usize,
    session_timeout: Duration,
    cleanup_interval: Duration,
}

impl SessionRegistry {
    pub fn new(config: &RegistryConfig) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            max_sessions: config.max_sessions,
            session_timeout: Duration::from_secs(config.session_timeout_secs),
            cleanup_interval: Duration::from_secs(config.cleanup_interval_secs),
        }
    }

    /// Register a new session with a generated id.
    pub fn create(&self, machine: SessionStateMachine) -> Result<Arc<SessionHandle>, SessionError> {
        self.create_with_id(uuid::Uuid::new_v4().to_string(), machine)
    }

    /// Register a new session under a caller-supplied id.
    pub fn create_with_id(
        &self,
        id: String,
        machine: SessionStateMachine,
    ) -> Result<Arc<SessionHandle>, SessionError> {
        let mut sessions = self.sessions.write();

        if sessions.len() >= self.max_sessions {
            // opportunistic cleanup before rejecting
            self.cleanup_expired_internal(&mut sessions);
            if sessions.len() >= self.max_sessions {
                return Err(SessionError::Registry("max sessions reached".into()));
            }
        }
        if sessions.contains_key(&id) {
            return Err(SessionError::Registry(format!("session {id} already exists")));
        }

        let handle = Arc::new(SessionHandle::new(id.clone(), machine));
        sessions.insert(id.clone(), handle.clone());
        tracing::info!(session_id = %id, "created session");
        Ok(handle)
    }

    /// Get a session by ID
    pub fn get(&self, id: &str) -> Option<Arc<SessionHandle>> {
        self.sessions.read().get(id).cloned()
    }

    /// Remove a session, resetting its state machine on the way out.
    pub fn remove(&self, id: &str) {
        let mut sessions = self.sessions.write();
        if let Some(handle) = sessions.remove(id) {
            handle.close();
            handle.machine.lock().reset();
            tracing::info!(session_id = %id, "removed session");
        }
    }

    /// Get active session count
    pub fn count(&self) -> usize {
        self.sessions.read().len()
    }

    /// List all session IDs
    pub fn list(&self) -> Vec<String> {
        self.sessions.read().keys().cloned().collect()
    }

    /// Cleanup expired sessions
    pub fn cleanup_expired(&self) {
        let mut sessions = self.sessions.write();
        self.cleanup_expired_internal(&mut sessions);
    }

    fn cleanup_expired_internal(&self, sessions: &mut HashMap<String, Arc<SessionHandle>>) {
        let timeout = self.session_timeout;
        let expired: Vec<String> = sessions
            .iter()
            .filter(|(_, s)| s.is_expired(timeout))
            .map(|(id, _)| id.clone())
            .collect();

        for id in expired {
            if let Some(handle) = sessions.remove(&id) {
                handle.close();
                handle.machine.lock().reset();
                tracing::info!(session_id = %id, "expired session");
            }
        }
    }

    /// Start a background task that periodically removes expired sessions.
    ///
    /// Returns a shutdown sender; send `true` to stop the task.
    pub fn start_cleanup_task(self: &Arc<Self>) -> watch::Sender<bool> {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let registry = Arc::clone(self);
        let interval = registry.cleanup_interval;

        tokio::spawn(async move {
            let mut timer = tokio::time::interval(interval);
            timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = timer.tick() => {
                        let before = registry.count();
                        registry.cleanup_expired();
                        let after = registry.count();
                        if before != after {
                            tracing::info!(
                                removed = before - after,
                                remaining = after,
                                "session cleanup pass"
                            );
                        }
                    }
                    _ = shutdown_rx.changed() => {
                        if *shutdown_rx.borrow() {
                            tracing::info!("session cleanup task shutting down");
                            break;
                        }
                    }
                }
            }
        });

        shutdown_tx
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::CollectingSink;
    use voicegate_config::{BufferConfig, SessionConfig};

    fn machine() -> SessionStateMachine {
        SessionStateMachine::new(
            SessionConfig::default(),
            &BufferConfig::default(),
            Arc::new(CollectingSink::default()),
        )
    }

    fn registry(max: usize) -> SessionRegistry {
        SessionRegistry::new(&RegistryConfig {
            max_sessions: max,
            session_timeout_secs: 3600,
            cleanup_interval_secs: 300,
        })
    }

    #[test]
    fn create_get_remove() {
        let reg = registry(10);
        let handle = reg.create(machine()).unwrap();
        let id = handle.id.clone();

        assert!(handle.is_active());
        assert_eq!(reg.count(), 1);
        assert!(reg.get(&id).is_some());

        reg.remove(&id);
        assert!(reg.get(&id).is_none());
        assert!(!handle.is_active());
    }

    #[test]
    fn duplicate_id_rejected() {
        let reg = registry(10);
        reg.create_with_id("abc".into(), machine()).unwrap();
        assert!(reg.create_with_id("abc".into(), machine()).is_err());
    }

    #[test]
    fn capacity_enforced() {
        let reg = registry(1);
        reg.create(machine()).unwrap();
        assert!(matches!(
            reg.create(machine()),
            Err(SessionError::Registry(_))
        ));
    }

    #[test]
    fn expiry_with_zero_timeout() {
        let reg = SessionRegistry::new(&RegistryConfig {
            max_sessions: 10,
            session_timeout_secs: 0,
            cleanup_interval_secs: 300,
        });
        let handle = reg.create(machine()).unwrap();
        std::thread::sleep(Duration::from_millis(5));
        assert!(handle.is_expired(Duration::ZERO));

        reg.cleanup_expired();
        assert_eq!(reg.count(), 0);
    }

    #[tokio::test]
    async fn cleanup_task_runs_and_shuts_down() {
        let reg = Arc::new(SessionRegistry::new(&RegistryConfig {
            max_sessions: 10,
            session_timeout_secs: 0,
            cleanup_interval_secs: 1,
        }));
        reg.create(machine()).unwrap();

        let shutdown = reg.start_cleanup_task();
        tokio::time::sleep(Duration::from_millis(1100)).await;
        assert_eq!(reg.count(), 0);

        shutdown.send(true).unwrap();
    }
}
