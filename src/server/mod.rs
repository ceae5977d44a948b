pub mod files;

use anyhow::{anyhow, Context, Result};
use axum::{
    body::Body,
    extract::State,
    http::{Method, Response, Uri},
    Router,
};
use std::future::{Future, IntoFuture};
use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};

use self::files::StaticFiles;

pub const DEFAULT_PORT: u64 = 8021;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Kept wide so out-of-range ports surface as a bind failure.
    pub port: u64,
    pub root: PathBuf,
}

/// Binds to all interfaces on `port`.
pub async fn bind(port: u64) -> Result<TcpListener> {
    let port = u16::try_from(port).map_err(|_| anyhow!("Port {} is out of range (0-65535)", port))?;
    let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, port));

    TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))
}

pub fn router(root: PathBuf) -> Router {
    let files = Arc::new(StaticFiles::new(root));
    Router::new().fallback(serve_path).with_state(files)
}

async fn serve_path(
    State(files): State<Arc<StaticFiles>>,
    method: Method,
    uri: Uri,
) -> Response<Body> {
    let response = files.respond(&method, &uri).await;
    info!("\"{} {}\" {}", method, uri, response.status().as_u16());
    response
}

/// Serves the root until `shutdown` resolves. In-flight requests are not awaited.
pub async fn serve<F>(listener: TcpListener, root: PathBuf, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    info!(
        "Serving {} on {}",
        root.display(),
        listener.local_addr()?
    );

    tokio::select! {
        result = axum::serve(listener, router(root)).into_future() => {
            result.context("HTTP server failed")?;
        }
        _ = shutdown => {
            info!("Shutdown requested");
        }
    }

    Ok(())
}

pub async fn run(config: ServerConfig) -> Result<()> {
    let listener = bind(config.port).await?;
    let port = listener.local_addr()?.port();

    println!();
    println!("Server running at: http://localhost:{}", port);
    println!("Open in browser to visualize your memory graph!");
    println!("Press Ctrl+C to stop");
    println!();

    serve(listener, config.root, interrupt()).await?;

    println!();
    println!("Server stopped");
    Ok(())
}

async fn interrupt() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
}
