use serde::{Deserialize, Serialize};

use super::results::PollResult;
use super::roster::{ConnectionId, StudentEntry};

/// Frames received from a client: `{"event": "<name>", "data": <payload>}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ClientEvent {
    RegisterUser {
        name: String,
        role: String,
    },

    CreatePoll(CreatePollRequest),

    SelectChoice {
        /// Defaults to the sending connection.
        #[serde(rename = "studentId", default)]
        student_id: Option<ConnectionId>,
        #[serde(default)]
        name: String,
        choice: usize,
    },

    SubmitVote {
        #[serde(rename = "studentId", default)]
        student_id: Option<ConnectionId>,
    },

    ManualEndPoll,

    RemoveStudent(ConnectionId),

    GetPollHistory,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CreatePollRequest {
    pub question: String,
    pub options: Vec<String>,
    #[serde(default)]
    pub correct_index: Option<usize>,
    #[serde(default)]
    pub duration: u64,
}

/// Frames pushed to clients.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ServerEvent {
    /// First frame on every connection, carries the id the server keys it by.
    Connected { id: ConnectionId },

    UsersList(Vec<StudentEntry>),

    PollStarted(PollResult),

    PollUpdated(PollResult),

    PollEnded(PollResult),

    Removed,

    PollHistory(Vec<PollResult>),
}

impl ServerEvent {
    pub fn name(&self) -> &'static str {
        match self {
            ServerEvent::Connected { .. } => "connected",
            ServerEvent::UsersList(_) => "usersList",
            ServerEvent::PollStarted(_) => "pollStarted",
            ServerEvent::PollUpdated(_) => "pollUpdated",
            ServerEvent::PollEnded(_) => "pollEnded",
            ServerEvent::Removed => "removed",
            ServerEvent::PollHistory(_) => "pollHistory",
        }
    }
}
