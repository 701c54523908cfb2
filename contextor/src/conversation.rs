//! In-memory conversation threads keyed by thread id.
//!
//! Each thread sits behind its own `tokio::sync::Mutex`, so one turn
//! (read history, call the model, append) can hold it end to end while
//! other threads proceed in parallel.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use ai_llm_service::{ChatMessage, ChatRole};
use serde::Serialize;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, warn};

use crate::error::ContextorError;

/// Non-empty conversation identifier.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct ThreadId(String);

impl ThreadId {
    /// # Errors
    /// [`ContextorError::InvalidRequest`] if `id` is blank.
    pub fn new(id: impl Into<String>) -> Result<Self, ContextorError> {
        let id = id.into().trim().to_string();
        if id.is_empty() {
            return Err(ContextorError::InvalidRequest("thread id must not be empty"));
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Smallest cap that still holds one user turn plus its reply.
pub const MIN_MESSAGES_PER_THREAD: usize = 2;

/// Append-only message log of one thread, capped at `max_messages`.
#[derive(Debug)]
pub struct ThreadLog {
    messages: VecDeque<ChatMessage>,
    max_messages: usize,
}

impl ThreadLog {
    pub fn new(max_messages: usize) -> Self {
        Self {
            messages: VecDeque::new(),
            max_messages: max_messages.max(MIN_MESSAGES_PER_THREAD),
        }
    }

    /// Appends `message`, evicting the oldest ones past the cap.
    ///
    /// After an eviction the log never starts with an assistant reply whose
    /// user turn is gone.
    pub fn push(&mut self, message: ChatMessage) {
        self.messages.push_back(message);
        if self.messages.len() <= self.max_messages {
            return;
        }
        while self.messages.len() > self.max_messages {
            self.messages.pop_front();
        }
        while self
            .messages
            .front()
            .is_some_and(|m| m.role != ChatRole::User)
        {
            self.messages.pop_front();
        }
    }

    /// All retained messages in call order.
    pub fn messages(&self) -> Vec<ChatMessage> {
        self.messages.iter().cloned().collect()
    }

    /// The last `n` messages, trimmed so the window starts on a user turn.
    pub fn window(&self, n: usize) -> Vec<ChatMessage> {
        let start = self.messages.len().saturating_sub(n);
        self.messages
            .iter()
            .skip(start)
            .skip_while(|m| m.role != ChatRole::User)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

#[derive(Debug)]
struct ThreadSlot {
    log: Arc<Mutex<ThreadLog>>,
    last_used: AtomicU64,
}

impl ThreadSlot {
    /// Nobody but the map holds the log, so no turn is in flight.
    fn is_idle(&self) -> bool {
        Arc::strong_count(&self.log) == 1
    }
}

/// Map of thread id → thread log, bounded to `max_threads` entries.
///
/// When full, the least recently used idle thread is evicted to make room.
#[derive(Debug)]
pub struct ConversationStore {
    threads: RwLock<HashMap<ThreadId, ThreadSlot>>,
    max_messages: usize,
    max_threads: usize,
    clock: AtomicU64,
}

impl ConversationStore {
    pub fn new(max_messages: usize, max_threads: usize) -> Self {
        Self {
            threads: RwLock::new(HashMap::new()),
            max_messages,
            max_threads: max_threads.max(1),
            clock: AtomicU64::new(0),
        }
    }

    fn tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::Relaxed)
    }

    /// Appends `message` to `thread`, creating the thread if needed.
    pub async fn append(&self, thread: &ThreadId, message: ChatMessage) {
        let log = self.thread(thread).await;
        log.lock().await.push(message);
    }

    /// Retained messages of `thread`; empty (and not created) if unknown.
    pub async fn history(&self, thread: &ThreadId) -> Vec<ChatMessage> {
        let log = self
            .threads
            .read()
            .await
            .get(thread)
            .map(|slot| Arc::clone(&slot.log));
        match log {
            Some(log) => log.lock().await.messages(),
            None => Vec::new(),
        }
    }

    /// Get-or-create handle to one thread's log.
    pub async fn thread(&self, thread: &ThreadId) -> Arc<Mutex<ThreadLog>> {
        if let Some(slot) = self.threads.read().await.get(thread) {
            slot.last_used.store(self.tick(), Ordering::Relaxed);
            return Arc::clone(&slot.log);
        }

        let mut w = self.threads.write().await;
        if let Some(slot) = w.get(thread) {
            slot.last_used.store(self.tick(), Ordering::Relaxed);
            return Arc::clone(&slot.log);
        }
        if w.len() >= self.max_threads {
            Self::evict_least_recent(&mut w);
        }
        debug!(thread_id = %thread, "conversation thread created");
        let log = Arc::new(Mutex::new(ThreadLog::new(self.max_messages)));
        w.insert(
            thread.clone(),
            ThreadSlot {
                log: Arc::clone(&log),
                last_used: AtomicU64::new(self.tick()),
            },
        );
        log
    }

    fn evict_least_recent(threads: &mut HashMap<ThreadId, ThreadSlot>) {
        let victim = threads
            .iter()
            .filter(|(_, slot)| slot.is_idle())
            .min_by_key(|(_, slot)| slot.last_used.load(Ordering::Relaxed))
            .map(|(id, _)| id.clone());
        match victim {
            Some(id) => {
                threads.remove(&id);
                debug!(thread_id = %id, "least recently used thread evicted");
            }
            None => warn!(
                threads = threads.len(),
                "every thread has a turn in flight; thread limit temporarily exceeded"
            ),
        }
    }

    /// Drops `thread` if it holds no messages and no turn is using it.
    ///
    /// Returns `true` when the entry was removed.
    pub async fn discard_if_empty(&self, thread: &ThreadId) -> bool {
        let mut w = self.threads.write().await;
        let removable = w.get(thread).is_some_and(|slot| {
            slot.is_idle() && slot.log.try_lock().is_ok_and(|log| log.is_empty())
        });
        if removable {
            w.remove(thread);
        }
        removable
    }

    /// Number of known threads.
    pub async fn len(&self) -> usize {
        self.threads.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.threads.read().await.is_empty()
    }
}
