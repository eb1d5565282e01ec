use std::sync::Arc;
use warp::Filter;

use super::poll_websocket;
use crate::poll::PollServer;

/// Every route the server exposes, with permissive CORS for browser clients.
pub fn poll_routes(
    poll_server: Arc<PollServer>,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    let cors = warp::cors()
        .allow_any_origin()
        .allow_methods(vec!["GET"])
        .allow_headers(vec!["content-type"]);

    poll_websocket_route(poll_server.clone())
        .or(poll_health_check())
        .or(poll_history_endpoint(poll_server))
        .with(cors)
        .with(warp::trace::request())
}

pub fn poll_websocket_route(
    poll_server: Arc<PollServer>,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    warp::path("poll")
        .and(warp::path::end())
        .and(warp::ws())
        .and(with_poll_server(poll_server))
        .map(|ws: warp::ws::Ws, poll_server: Arc<PollServer>| {
            ws.on_upgrade(move |websocket| {
                poll_websocket::handle_poll_websocket(websocket, poll_server)
            })
        })
}

pub fn poll_health_check() -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    warp::path!("poll" / "health")
        .and(warp::get())
        .map(|| {
            warp::reply::json(&serde_json::json!({
                "status": "healthy",
                "service": "Poll Server",
                "version": env!("CARGO_PKG_VERSION")
            }))
        })
}

/// Finished polls, same payload as the `pollHistory` event.
pub fn poll_history_endpoint(
    poll_server: Arc<PollServer>,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    warp::path!("poll" / "history")
        .and(warp::get())
        .and(with_poll_server(poll_server))
        .then(|poll_server: Arc<PollServer>| async move {
            warp::reply::json(&poll_server.history().await)
        })
}

fn with_poll_server(
    poll_server: Arc<PollServer>,
) -> impl Filter<Extract = (Arc<PollServer>,), Error = std::convert::Infallible> + Clone {
    warp::any().map(move || poll_server.clone())
}
