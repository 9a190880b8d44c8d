//! Session accounting: per-(ip, user) caps and idle expiry.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::config::ExecutorConfig;

use super::ExecutorError;

/// Opaque session identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(pub u64);

#[derive(Debug)]
struct SessionEntry {
    id: SessionId,
    last_active: Instant,
}

/// Admission control for client sessions.
///
/// Grants at most `max_sessions_per_ip_per_user` live sessions per
/// (client ip, user) pair; sessions idle past the configured timeout are
/// reaped lazily on the next admission or touch for that pair.
#[derive(Debug)]
pub struct SessionManager {
    max_per_key: usize,
    idle_timeout: Duration,
    next_id: AtomicU64,
    sessions: Mutex<HashMap<(String, String), Vec<SessionEntry>>>,
}

impl SessionManager {
    pub fn new(config: &ExecutorConfig) -> Self {
        Self {
            max_per_key: config.max_sessions_per_ip_per_user,
            idle_timeout: Duration::from_secs(config.session_idle_timeout_sec),
            next_id: AtomicU64::new(1),
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Admits a new session for the pair, after reaping idle ones.
    pub fn create(&self, ip: &str, user: &str) -> Result<SessionId, ExecutorError> {
        let mut sessions = self
            .sessions
            .lock()
            .map_err(|_| ExecutorError::Internal("session table lock poisoned".into()))?;
        let entries = sessions
            .entry((ip.to_string(), user.to_string()))
            .or_default();

        let idle_timeout = self.idle_timeout;
        let before = entries.len();
        entries.retain(|entry| entry.last_active.elapsed() < idle_timeout);
        if before != entries.len() {
            debug!(ip, user, reaped = before - entries.len(), "idle sessions expired");
        }

        if entries.len() >= self.max_per_key {
            return Err(ExecutorError::SessionRejected(format!(
                "too many sessions for {user}@{ip} (cap {})",
                self.max_per_key
            )));
        }

        let id = SessionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        entries.push(SessionEntry {
            id,
            last_active: Instant::now(),
        });
        info!(ip, user, session = id.0, "session created");
        Ok(id)
    }

    /// Marks a session as active; unknown (or already expired) sessions
    /// report false.
    pub fn touch(&self, ip: &str, user: &str, id: SessionId) -> bool {
        let Ok(mut sessions) = self.sessions.lock() else {
            return false;
        };
        let Some(entries) = sessions.get_mut(&(ip.to_string(), user.to_string())) else {
            return false;
        };
        let idle_timeout = self.idle_timeout;
        entries.retain(|entry| entry.last_active.elapsed() < idle_timeout);
        match entries.iter_mut().find(|entry| entry.id == id) {
            Some(entry) => {
                entry.last_active = Instant::now();
                true
            }
            None => false,
        }
    }

    /// Ends a session; absent ids are tolerated.
    pub fn close(&self, ip: &str, user: &str, id: SessionId) {
        if let Ok(mut sessions) = self.sessions.lock()
            && let Some(entries) = sessions.get_mut(&(ip.to_string(), user.to_string()))
        {
            entries.retain(|entry| entry.id != id);
        }
    }

    /// Live (non-idle) sessions for a pair.
    pub fn active_count(&self, ip: &str, user: &str) -> usize {
        let Ok(sessions) = self.sessions.lock() else {
            return 0;
        };
        sessions
            .get(&(ip.to_string(), user.to_string()))
            .map(|entries| {
                entries
                    .iter()
                    .filter(|entry| entry.last_active.elapsed() < self.idle_timeout)
                    .count()
            })
            .unwrap_or(0)
    }
}
