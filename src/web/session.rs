use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use axum::http::{header, HeaderMap, HeaderValue};
use uuid::Uuid;

use crate::core::cache::JobResultCache;
use crate::core::job::{JobResult, JobSettings};

pub const SESSION_COOKIE: &str = "lzwflow_session";

const MAX_SESSIONS: usize = 1024;
const SESSION_IDLE: Duration = Duration::from_secs(12 * 60 * 60);

/// What one browser session remembers between renders.
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    pub cache: JobResultCache,
    pub last_settings: JobSettings,
}

#[derive(Debug)]
struct Entry {
    state: SessionState,
    last_seen: Instant,
}

/// Per-session result caches, keyed by the session cookie. Sessions idle for
/// longer than `idle` are dropped, and at most `capacity` are kept; the least
/// recently seen one goes first.
#[derive(Debug)]
pub struct SessionStore {
    sessions: Mutex<HashMap<Uuid, Entry>>,
    capacity: usize,
    idle: Duration,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::with_limits(MAX_SESSIONS, SESSION_IDLE)
    }
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limits(capacity: usize, idle: Duration) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            capacity: capacity.max(1),
            idle,
        }
    }

    pub fn snapshot(&self, id: Uuid) -> SessionState {
        let mut sessions = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
        match sessions.get_mut(&id) {
            Some(entry) => {
                entry.last_seen = Instant::now();
                entry.state.clone()
            }
            None => SessionState::default(),
        }
    }

    pub fn remember_settings(&self, id: Uuid, settings: JobSettings) {
        self.update(id, |state| state.last_settings = settings);
    }

    /// Stores a completed job together with the settings it ran with.
    pub fn record(&self, id: Uuid, settings: JobSettings, result: JobResult) {
        self.update(id, |state| {
            state.last_settings = settings;
            state.cache.record(result);
        });
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    fn update(&self, id: Uuid, apply: impl FnOnce(&mut SessionState)) {
        let now = Instant::now();
        let mut sessions = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);

        if !sessions.contains_key(&id) {
            sessions.retain(|_, entry| now.duration_since(entry.last_seen) < self.idle);
            while sessions.len() >= self.capacity {
                let oldest = sessions
                    .iter()
                    .min_by_key(|(_, entry)| entry.last_seen)
                    .map(|(key, _)| *key);
                match oldest {
                    Some(key) => sessions.remove(&key),
                    None => break,
                };
            }
        }

        let entry = sessions.entry(id).or_insert_with(|| Entry {
            state: SessionState::default(),
            last_seen: now,
        });
        entry.last_seen = now;
        apply(&mut entry.state);
    }
}

/// The caller's session id, and whether it was minted for this request.
pub fn resolve_session(headers: &HeaderMap) -> (Uuid, bool) {
    match session_from_headers(headers) {
        Some(id) => (id, false),
        None => (Uuid::new_v4(), true),
    }
}

pub fn session_from_headers(headers: &HeaderMap) -> Option<Uuid> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .and_then(|(_, value)| Uuid::parse_str(value.trim()).ok())
}

pub fn session_cookie(id: Uuid) -> HeaderValue {
    // A hyphenated UUID is always a valid header value.
    HeaderValue::from_str(&format!("{SESSION_COOKIE}={id}; Path=/; HttpOnly; SameSite=Lax"))
        .unwrap_or_else(|_| HeaderValue::from_static("lzwflow_session=; Path=/"))
}
