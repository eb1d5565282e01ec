use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{mpsc, RwLock};

use super::events::ServerEvent;
use super::results::{self, PollResult};
use super::roster::{ConnectionId, Roster};
use super::session::{now_millis, Poll};
use crate::error::{PollError, Result};

/// What the transport should do next on a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    Close,
}

pub type FrameSender = mpsc::UnboundedSender<Frame>;

/// Outbound half of every open connection, addressable by id.
#[derive(Clone, Default)]
pub struct ConnectionRegistry {
    pub(super) senders: Arc<RwLock<HashMap<ConnectionId, FrameSender>>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, id: ConnectionId, sender: FrameSender) {
        let mut senders = self.senders.write().await;
        senders.insert(id, sender);
    }

    pub async fn remove(&self, id: &str) -> Option<FrameSender> {
        let mut senders = self.senders.write().await;
        senders.remove(id)
    }

    pub async fn len(&self) -> usize {
        self.senders.read().await.len()
    }

    async fn send_text(&self, id: &str, text: String) -> Result<()> {
        let senders = self.senders.read().await;
        let sender = senders
            .get(id)
            .ok_or_else(|| PollError::ConnectionClosed(id.to_string()))?;
        sender
            .send(Frame::Text(text))
            .map_err(|_| PollError::ConnectionClosed(id.to_string()))
    }
}

/// Role-scoped fan-out. Recipient sets are read from the roster on every
/// call and never cached.
#[derive(Clone)]
pub struct Broadcaster {
    connections: ConnectionRegistry,
}

impl Broadcaster {
    pub fn new(connections: ConnectionRegistry) -> Self {
        Self { connections }
    }

    pub async fn unicast(&self, id: &str, event: &ServerEvent) -> Result<()> {
        let text = serde_json::to_string(event)?;
        self.connections.send_text(id, text).await
    }

    pub async fn to_students(&self, roster: &Roster, event: &ServerEvent) {
        self.send_to(&roster.student_ids(), event).await;
    }

    pub async fn to_teachers(&self, roster: &Roster, event: &ServerEvent) {
        self.send_to(&roster.teacher_ids(), event).await;
    }

    pub async fn to_all(&self, roster: &Roster, event: &ServerEvent) {
        self.to_students(roster, event).await;
        self.to_teachers(roster, event).await;
    }

    pub async fn announce_poll_started(&self, roster: &Roster, poll: &Poll) {
        let event = ServerEvent::PollStarted(live_snapshot(roster, poll));
        self.to_all(roster, &event).await;
    }

    pub async fn announce_poll_updated(&self, roster: &Roster, poll: &Poll) {
        let event = ServerEvent::PollUpdated(live_snapshot(roster, poll));
        self.to_all(roster, &event).await;
    }

    pub async fn announce_poll_ended(&self, roster: &Roster, result: &PollResult) {
        let event = ServerEvent::PollEnded(live_snapshot(roster, &result.poll));
        self.to_all(roster, &event).await;
    }

    /// Bring one connection up to date with the running poll.
    pub async fn send_poll_snapshot(&self, roster: &Roster, id: &str, poll: &Poll) -> Result<()> {
        let event = ServerEvent::PollStarted(live_snapshot(roster, poll));
        self.unicast(id, &event).await
    }

    pub async fn announce_roster(&self, roster: &Roster) {
        let event = ServerEvent::UsersList(roster.list_students());
        self.to_all(roster, &event).await;
    }

    /// Ask the transport to close `id` and forget its sender.
    pub async fn disconnect(&self, id: &str) {
        if let Some(sender) = self.connections.remove(id).await {
            if sender.send(Frame::Close).is_err() {
                tracing::debug!(connection_id = %id, "Connection already gone before forced close");
            }
            tracing::info!(connection_id = %id, "Connection closed by server");
        }
    }

    async fn send_to(&self, ids: &[ConnectionId], event: &ServerEvent) {
        if ids.is_empty() {
            return;
        }
        let text = match serde_json::to_string(event) {
            Ok(text) => text,
            Err(e) => {
                tracing::error!(error = %e, event = event.name(), "Failed to serialize event");
                return;
            }
        };

        for id in ids {
            if let Err(e) = self.connections.send_text(id, text.clone()).await {
                tracing::warn!(connection_id = %id, event = event.name(), error = %e, "Dropped outbound event");
            }
        }
        tracing::debug!(event = event.name(), recipients = ids.len(), "Event broadcast");
    }
}

/// Stats and remaining time as of right now.
fn live_snapshot(roster: &Roster, poll: &Poll) -> PollResult {
    results::compute(poll, roster.student_count()).with_remaining_at(now_millis())
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn connect(registry: &ConnectionRegistry, id: &str) -> mpsc::UnboundedReceiver<Frame> {
        let (tx, rx) = mpsc::unbounded_channel();
        registry.insert(id.to_string(), tx).await;
        rx
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<Frame>) -> Vec<serde_json::Value> {
        let mut out = Vec::new();
        while let Ok(frame) = rx.try_recv() {
            if let Frame::Text(text) = frame {
                out.push(serde_json::from_str(&text).unwrap());
            }
        }
        out
    }

    async fn classroom() -> (
        Broadcaster,
        Roster,
        mpsc::UnboundedReceiver<Frame>,
        mpsc::UnboundedReceiver<Frame>,
    ) {
        let registry = ConnectionRegistry::new();
        let teacher_rx = connect(&registry, "t1").await;
        let student_rx = connect(&registry, "s1").await;

        let mut roster = Roster::new();
        roster.register("t1".into(), "Teacher", "teacher").unwrap();
        roster.register("s1".into(), "Arnold", "student").unwrap();

        (Broadcaster::new(registry), roster, teacher_rx, student_rx)
    }

    #[tokio::test]
    async fn test_role_scoped_fan_out() {
        let (broadcaster, roster, mut teacher_rx, mut student_rx) = classroom().await;

        broadcaster.to_teachers(&roster, &ServerEvent::Removed).await;
        assert_eq!(drain(&mut teacher_rx).len(), 1);
        assert!(drain(&mut student_rx).is_empty());

        broadcaster.to_students(&roster, &ServerEvent::Removed).await;
        assert!(drain(&mut teacher_rx).is_empty());
        assert_eq!(drain(&mut student_rx).len(), 1);

        broadcaster.announce_roster(&roster).await;
        let teacher_frames = drain(&mut teacher_rx);
        assert_eq!(teacher_frames[0]["event"], "usersList");
        assert_eq!(teacher_frames[0]["data"][0]["name"], "Arnold");
        assert_eq!(drain(&mut student_rx).len(), 1);
    }

    #[tokio::test]
    async fn test_poll_started_carries_remaining_time_and_stats() {
        let (broadcaster, roster, mut teacher_rx, mut student_rx) = classroom().await;
        let poll = Poll::new("2+2?".into(), vec!["3".into(), "4".into()], Some(1), 10, now_millis()).unwrap();

        broadcaster.announce_poll_started(&roster, &poll).await;

        for frames in [drain(&mut teacher_rx), drain(&mut student_rx)] {
            assert_eq!(frames.len(), 1);
            assert_eq!(frames[0]["event"], "pollStarted");
            assert_eq!(frames[0]["data"]["duration"], 10);
            assert_eq!(frames[0]["data"]["votes"], serde_json::json!([0, 0]));
            assert_eq!(frames[0]["data"]["stats"]["noResponseCount"], 1);
        }
    }

    #[tokio::test]
    async fn test_unregistered_connections_receive_nothing() {
        let (broadcaster, roster, _teacher_rx, _student_rx) = classroom().await;
        let mut lurker_rx = connect(&broadcaster.connections, "lurker").await;

        broadcaster.announce_roster(&roster).await;
        assert!(drain(&mut lurker_rx).is_empty());

        broadcaster.unicast("lurker", &ServerEvent::Removed).await.unwrap();
        assert_eq!(drain(&mut lurker_rx).len(), 1);
    }

    #[tokio::test]
    async fn test_disconnect_sends_close_and_forgets_sender() {
        let (broadcaster, _roster, _teacher_rx, mut student_rx) = classroom().await;

        broadcaster.disconnect("s1").await;
        assert_eq!(student_rx.try_recv().unwrap(), Frame::Close);
        assert!(!broadcaster.connections.senders.read().await.contains_key("s1"));

        let err = broadcaster.unicast("s1", &ServerEvent::Removed).await.unwrap_err();
        assert!(matches!(err, PollError::ConnectionClosed(_)));

        // Second call is a no-op.
        broadcaster.disconnect("s1").await;
    }
}
