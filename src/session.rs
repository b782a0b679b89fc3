//! Session lifecycle notifications.
//!
//! The gateway publishes here when it tears a session down; the application
//! subscribes and reacts (e.g. by returning to a login screen). Publishing
//! never blocks and never fails.

use tokio::sync::broadcast;

use crate::error::RefreshError;

const EVENT_CHANNEL_CAPACITY: usize = 16;

/// Broadcast events about the authenticated session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Credentials were cleared because they can no longer be refreshed.
    Expired { reason: RefreshError },
}

/// Fire-and-forget publisher for [`SessionEvent`]s.
#[derive(Debug, Clone)]
pub struct SessionEvents {
    sender: broadcast::Sender<SessionEvent>,
}

impl SessionEvents {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.sender.subscribe()
    }

    pub(crate) fn publish_expired(&self, reason: RefreshError) {
        tracing::warn!(%reason, subscribers = self.sender.receiver_count(), "session expired");
        // No subscribers is fine: the event is purely advisory.
        let _ = self.sender.send(SessionEvent::Expired { reason });
    }
}

impl Default for SessionEvents {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn every_subscriber_sees_expiry() {
        let events = SessionEvents::new();
        let mut first = events.subscribe();
        let mut second = events.subscribe();

        events.publish_expired(RefreshError::MissingRefreshToken);

        let expected = SessionEvent::Expired {
            reason: RefreshError::MissingRefreshToken,
        };
        assert_eq!(first.recv().await.unwrap(), expected);
        assert_eq!(second.recv().await.unwrap(), expected);
    }

    #[test]
    fn publishing_without_subscribers_is_a_no_op() {
        let events = SessionEvents::new();
        events.publish_expired(RefreshError::Abandoned);
    }
}
