//! Conversation checkpoints keyed by thread id.

use parking_lot::Mutex;
use std::collections::HashMap;

use super::Message;

/// Stores the latest transcript of each conversation thread.
pub(crate) trait Checkpointer: Send + Sync {
    /// Returns the saved transcript for a thread, if any.
    fn get(&self, thread_id: &str) -> Option<Vec<Message>>;

    /// Replaces the saved transcript for a thread.
    fn put(&self, thread_id: &str, messages: &[Message]);
}

/// Process-local checkpoints. Lost when the process exits.
#[derive(Debug, Default)]
pub(crate) struct MemoryCheckpointer {
    threads: Mutex<HashMap<String, Vec<Message>>>,
}

impl MemoryCheckpointer {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Checkpointer for MemoryCheckpointer {
    fn get(&self, thread_id: &str) -> Option<Vec<Message>> {
        self.threads.lock().get(thread_id).cloned()
    }

    fn put(&self, thread_id: &str, messages: &[Message]) {
        self.threads
            .lock()
            .insert(thread_id.to_string(), messages.to_vec());
    }
}
