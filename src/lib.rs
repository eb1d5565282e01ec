//! Live classroom polling server.
//!
//! A teacher starts a multiple-choice poll with an optional time limit,
//! students answer over a WebSocket, and every change is fanned out to the
//! connected teachers and students.

pub mod api;
pub mod config;
pub mod error;
pub mod poll;

pub use error::{PollError, Result};
pub use poll::PollServer;
