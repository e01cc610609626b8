use cireilclaw_core::{Channel, Message, SessionId};

/// Live, in-memory session state. Held by the harness for the lifetime of
/// the process; persisted (except `internal` sessions) via [`crate::store`].
#[derive(Debug, Clone)]
pub struct Session {
    pub id: SessionId,
    pub channel: Channel,
    pub history: Vec<Message>,
    pub pinned_files: Vec<String>,
    pub pending_tool_responses: Vec<Message>,
    pub pending_images: Vec<cireilclaw_core::ImageContent>,
    pub busy: bool,
    pub last_activity_epoch_ms: i64,
    pub last_message_id: Option<String>,
}

impl Session {
    pub fn new(channel: Channel, now_epoch_ms: i64) -> Self {
        Self {
            id: channel.session_id(),
            channel,
            history: Vec::new(),
            pinned_files: Vec::new(),
            pending_tool_responses: Vec::new(),
            pending_images: Vec::new(),
            busy: false,
            last_activity_epoch_ms: now_epoch_ms,
            last_message_id: None,
        }
    }

    /// Attempt to acquire the single-turn lock; `false` if another turn is
    /// already in flight (busy-gate invariant).
    pub fn try_acquire(&mut self) -> bool {
        if self.busy {
            return false;
        }
        self.busy = true;
        true
    }

    pub fn release(&mut self) {
        self.busy = false;
    }
}

/// On-disk row shape for a persisted session (`PersistedSession row`,
/// serialization). `meta` and `history` are stored as JSON text;
/// `openedFiles` as a JSON string array.
#[derive(Debug, Clone)]
pub struct PersistedSessionRow {
    pub id: String,
    pub channel: String,
    pub meta_json: String,
    pub history_json: String,
    pub opened_files_json: String,
}
