//! HTTP server side of booty.
//!
//! ## Endpoints
//!
//! - `POST /image` - receive a multipart upload, stored as `<peer-addr>.img`
//! - `GET /images/<name>` - static files from the images directory
//!
//! Each request succeeds or fails on its own; nothing a client sends can take
//! the server down.

mod upload;

use std::net::SocketAddr;

use axum::{Router, extract::DefaultBodyLimit, routing::post};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::services::ServeDir;

use crate::context::AppContext;

/// Image server: upload receiver plus static image directory.
pub struct ImageServer {
    ctx: AppContext,
    shutdown_tx: broadcast::Sender<()>,
}

impl ImageServer {
    pub fn new(ctx: AppContext) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self { ctx, shutdown_tx }
    }

    /// Bind the configured address and serve until `shutdown()` is called.
    pub async fn start(&self) -> anyhow::Result<()> {
        let listener = TcpListener::bind(self.ctx.config.bind_addr).await?;
        self.serve(listener).await
    }

    /// Serve on an already bound listener until `shutdown()` is called.
    pub async fn serve(&self, listener: TcpListener) -> anyhow::Result<()> {
        let config = &self.ctx.config;
        if !config.images_directory.is_dir() {
            tracing::warn!(
                dir = %config.images_directory.display(),
                "Images directory does not exist, GET /images/ will return 404"
            );
        }

        let app = router(self.ctx.clone());
        let addr = listener.local_addr()?;
        tracing::info!(addr = %addr, "Listening");

        let mut shutdown_rx = self.shutdown_tx.subscribe();

        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.recv().await;
        })
        .await?;

        Ok(())
    }

    /// Signal the server to shut down gracefully.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }
}

/// Build the router. Callers must serve it with `ConnectInfo<SocketAddr>`.
pub fn router(ctx: AppContext) -> Router {
    let body_limit = match ctx.config.max_upload_bytes {
        Some(limit) => DefaultBodyLimit::max(limit),
        None => DefaultBodyLimit::disable(),
    };

    Router::new()
        .route("/image", post(upload::receive_image))
        .layer(body_limit)
        .nest_service("/images", ServeDir::new(&ctx.config.images_directory))
        .with_state(ctx)
}
