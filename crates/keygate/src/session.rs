use keygate_core::{Client, SessionStore, Timestamp};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

/// In-memory visitor sessions for the bundled HTTP host.
///
/// Sessions are partitioned by client context: a site session and an admin
/// session are separate records even for the same browser, so each context
/// has its own `block_access` flag. A record is only stored once something
/// is written to it, so blocked visitors leave nothing behind.
pub struct SessionRegistry {
    sessions: Mutex<HashMap<SessionKey, SessionRecord>>,
    idle_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionKey {
    pub client: Client,
    pub id: String,
}

struct SessionRecord {
    values: HashMap<String, Value>,
    last_seen: Timestamp,
}

impl SessionRegistry {
    pub fn new(idle_secs: u64) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            idle_secs,
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<SessionKey, SessionRecord>> {
        self.sessions.lock().unwrap_or_else(|poisoned| {
            tracing::warn!("session registry lock poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// A fresh, not yet stored session key for `client`.
    pub fn issue_key(&self, client: Client) -> SessionKey {
        let bytes: [u8; 16] = rand::random();
        SessionKey {
            client,
            id: hex::encode(bytes),
        }
    }

    pub fn contains(&self, key: &SessionKey) -> bool {
        self.lock().contains_key(key)
    }

    /// Mark a session as used. Returns false if it is unknown or idle-expired.
    pub fn touch(&self, key: &SessionKey) -> bool {
        let now = Timestamp::now();
        let mut sessions = self.lock();
        match sessions.get_mut(key) {
            Some(record) if now.abs_diff(record.last_seen) <= self.idle_secs => {
                record.last_seen = now;
                true
            }
            Some(_) => {
                sessions.remove(key);
                false
            }
            None => false,
        }
    }

    pub fn handle(&self, key: SessionKey) -> SessionHandle<'_> {
        SessionHandle {
            registry: self,
            key,
        }
    }

    pub fn active_count(&self) -> usize {
        self.lock().len()
    }
}

/// One visitor's session in one context.
pub struct SessionHandle<'a> {
    registry: &'a SessionRegistry,
    key: SessionKey,
}

impl SessionStore for SessionHandle<'_> {
    fn get(&self, key: &str) -> Option<Value> {
        self.registry
            .lock()
            .get(&self.key)
            .and_then(|r| r.values.get(key).cloned())
    }

    fn set(&self, key: &str, value: Value) {
        let now = Timestamp::now();
        let idle_secs = self.registry.idle_secs;
        let mut sessions = self.registry.lock();
        if !sessions.contains_key(&self.key) {
            sessions.retain(|_, r| now.abs_diff(r.last_seen) <= idle_secs);
        }
        sessions
            .entry(self.key.clone())
            .or_insert_with(|| SessionRecord {
                values: HashMap::new(),
                last_seen: now,
            })
            .values
            .insert(key.to_string(), value);
    }

    fn clear(&self, key: &str) {
        if let Some(record) = self.registry.lock().get_mut(&self.key) {
            record.values.remove(key);
        }
    }
}
