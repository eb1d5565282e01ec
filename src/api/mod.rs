pub mod poll_routes;
mod poll_websocket;

pub use poll_routes::poll_routes;
