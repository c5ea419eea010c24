use tokio::sync::broadcast;

use huddle_types::models::Message;

/// A room received new messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoomActivity {
    pub room_id: i64,
    pub last_message_id: i64,
}

/// Result of a bounded wait for new messages.
#[derive(Debug)]
pub enum PollOutcome {
    Modified(Vec<Message>),
    /// The wait ran out without anything new. Not an error.
    NotModified,
}

/// Fans room activity out to long-polling readers.
#[derive(Clone)]
pub struct Notifier {
    tx: broadcast::Sender<RoomActivity>,
}

impl Notifier {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1024);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RoomActivity> {
        self.tx.subscribe()
    }

    /// Having no listeners is fine.
    pub fn notify(&self, activity: RoomActivity) {
        let _ = self.tx.send(activity);
    }
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new()
    }
}
