use std::sync::Arc;
use std::time::Duration;

use rand::distributions::Alphanumeric;
use rand::Rng;
use tokio::sync::Mutex;

use super::broadcast::{Broadcaster, ConnectionRegistry, FrameSender};
use super::events::ServerEvent;
use super::results::PollResult;
use super::roster::{ConnectionId, Roster};
use super::session::{Generation, PollSession};

const CONNECTION_ID_LEN: usize = 20;

/// Everything a classroom mutates. Only ever touched under the server lock,
/// so inbound events and timer callbacks never interleave.
#[derive(Default)]
pub struct Classroom {
    pub roster: Roster,
    pub session: PollSession,
}

pub struct PollServer {
    pub(super) classroom: Mutex<Classroom>,
    pub(super) connections: ConnectionRegistry,
    pub(super) broadcaster: Broadcaster,
}

impl PollServer {
    pub fn new() -> Arc<Self> {
        let connections = ConnectionRegistry::new();
        Arc::new(Self {
            classroom: Mutex::new(Classroom::default()),
            broadcaster: Broadcaster::new(connections.clone()),
            connections,
        })
    }

    fn generate_connection_id() -> ConnectionId {
        rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(CONNECTION_ID_LEN)
            .map(char::from)
            .collect()
    }

    /// Register the outbound half of a new connection and greet it with its id.
    pub async fn connect(&self, sender: FrameSender) -> ConnectionId {
        let id = Self::generate_connection_id();
        self.connections.insert(id.clone(), sender).await;

        let hello = ServerEvent::Connected { id: id.clone() };
        if let Err(e) = self.broadcaster.unicast(&id, &hello).await {
            tracing::warn!(connection_id = %id, error = %e, "Failed to greet connection");
        }
        tracing::info!(connection_id = %id, "Connection opened");
        id
    }

    /// Transport-level close, whether initiated by the client or by us.
    pub async fn handle_disconnect(&self, id: &str) {
        self.connections.remove(id).await;

        let mut classroom = self.classroom.lock().await;
        if classroom.roster.remove(id).is_some() {
            self.broadcaster.announce_roster(&classroom.roster).await;
        }
        tracing::info!(connection_id = %id, "Connection closed");
    }

    pub async fn history(&self) -> Vec<PollResult> {
        let classroom = self.classroom.lock().await;
        classroom.session.history().to_vec()
    }

    pub async fn connection_count(&self) -> usize {
        self.connections.len().await
    }

    /// Spawn the auto-end task for `generation` and hand its handle to the session.
    pub(super) fn schedule_auto_end(
        self: &Arc<Self>,
        classroom: &mut Classroom,
        generation: Generation,
        duration_secs: u64,
    ) {
        let server = Arc::clone(self);
        let task = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(duration_secs)).await;
            server.auto_end(generation).await;
        });
        classroom.session.set_auto_end(generation, task.abort_handle());
        tracing::debug!(generation, duration_secs, "Auto-end scheduled");
    }

    async fn auto_end(&self, generation: Generation) {
        let mut classroom = self.classroom.lock().await;
        let total_students = classroom.roster.student_count();
        match classroom.session.end_if_current(generation, total_students) {
            Ok(result) => {
                self.broadcaster
                    .announce_poll_ended(&classroom.roster, &result)
                    .await;
            }
            Err(e) => {
                tracing::debug!(generation, error = %e, "Stale auto-end ignored");
            }
        }
    }
}
