use poll_server::config::{Config, LogFormat};
use poll_server::{api, PollServer};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

fn init_tracing(format: LogFormat) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("poll_server=info,warp=info"));
    let registry = tracing_subscriber::registry().with(env_filter);

    match format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

#[tokio::main]
async fn main() -> poll_server::Result<()> {
    let config = Config::from_env()?;
    init_tracing(config.logging.format);

    let poll_server = PollServer::new();
    let routes = api::poll_routes(poll_server);

    let address = config.bind_address();
    tracing::info!(
        host = %config.server.host,
        port = config.server.port,
        "Poll server listening on ws://{}:{}/poll",
        config.server.host,
        config.server.port
    );

    warp::serve(routes).run(address).await;
    Ok(())
}
