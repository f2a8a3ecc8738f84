//! Server runner: binds the router to a listener and shuts down in order.

use std::future::{Future, IntoFuture};
use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::oneshot;

use chathub_core::error::AppError;
use chathub_core::result::AppResult;

use crate::router::build_router;
use crate::state::AppState;

/// Serve until `shutdown` resolves.
///
/// On shutdown every open room is closed and drained, in-flight HTTP
/// requests finish, then the persistence pool drains its queue. HTTP
/// draining is bounded by `server.shutdown_grace_seconds`.
pub async fn serve<F>(listener: TcpListener, state: AppState, shutdown: F) -> AppResult<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let engine = state.engine.clone();
    let rooms = state.engine.registry().clone();
    let grace = Duration::from_secs(state.config.server.shutdown_grace_seconds);
    let app = build_router(state);

    if let Ok(addr) = listener.local_addr() {
        tracing::info!(%addr, "ChatHub server listening");
    }

    let (signalled_tx, signalled_rx) = oneshot::channel::<()>();
    let server = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move {
        shutdown.await;
        tracing::info!("Shutdown signal received");
        // Evicting room members ends the upgraded sockets.
        rooms.shutdown().await;
        let _ = signalled_tx.send(());
    })
    .into_future();

    let deadline = async move {
        if signalled_rx.await.is_ok() {
            tokio::time::sleep(grace).await;
        } else {
            std::future::pending::<()>().await;
        }
    };

    let served = tokio::select! {
        result = server => result.map_err(|e| AppError::internal(format!("Server error: {e}"))),
        _ = deadline => {
            tracing::warn!(grace_secs = grace.as_secs(), "Graceful shutdown timed out");
            Ok(())
        }
    };

    engine.shutdown().await;
    served
}
