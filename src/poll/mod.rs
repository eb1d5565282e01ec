//! Live classroom polling: roster, poll lifecycle, tallying and role-scoped
//! broadcast over per-connection channels.

pub mod broadcast;
pub mod events;
pub mod results;
pub mod roster;
pub mod session;
mod router;
mod server;

pub use broadcast::{Broadcaster, ConnectionRegistry, Frame, FrameSender};
pub use events::{ClientEvent, CreatePollRequest, ServerEvent};
pub use results::{PollResult, PollStats};
pub use roster::{ConnectionId, Participant, Role, Roster, StudentEntry};
pub use router::parse_client_event;
pub use server::{Classroom, PollServer};
pub use session::{EndTrigger, Poll, PollSession, Response};
