use sentinel_httpd::config::Config;
use sentinel_httpd::logging;
use sentinel_httpd::routing::{FsResources, RequestHandler, StaticRoutes};
use sentinel_httpd::server::Server;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = Config::load()?;
    cfg.create_dirs()?;

    if let Some(file) = logging::init(&cfg.logging)? {
        tracing::info!(file = %file.display(), "Writing log file");
    }

    let handler = RequestHandler::new(StaticRoutes::new(&cfg.static_files.root), FsResources)
        .with_server_name(&cfg.server.server_name);

    let mut server = match Server::bind(&cfg, handler).await {
        Ok(server) => server,
        Err(e) => {
            tracing::error!(error = %e, "Error while starting server");
            return Err(e.into());
        }
    };
    server.start()?;

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown signal received");
    server.stop().await;

    Ok(())
}
