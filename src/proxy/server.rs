use anyhow::Result;
use hyper::service::{make_service_fn, service_fn};
use hyper::Server;
use std::convert::Infallible;
use std::net::SocketAddr;
use tokio::sync::watch;
use tracing::info;

use super::handler::RequestHandler;

/// HTTP/1.1 listener around the request handler.
///
/// The configured `proto` selects the outer listener; this core serves
/// plain HTTP, with TLS and HTTP/3 termination handled in front of it.
pub struct GatewayServer {
    addr: SocketAddr,
    handler: RequestHandler,
}

impl GatewayServer {
    pub fn new(addr: SocketAddr, handler: RequestHandler) -> Self {
        Self { addr, handler }
    }

    /// Serve until the shutdown signal flips. In-flight requests finish
    /// before the listener closes.
    pub async fn run(self, mut shutdown_rx: watch::Receiver<bool>) -> Result<()> {
        let handler = self.handler;

        let make_service = make_service_fn(move |_conn| {
            let handler = handler.clone();
            async move {
                Ok::<_, Infallible>(service_fn(move |req| {
                    let handler = handler.clone();
                    async move { handler.handle_request(req).await }
                }))
            }
        });

        let server = Server::try_bind(&self.addr)?.serve(make_service);
        info!("gateway listening on {}", self.addr);

        let graceful = server.with_graceful_shutdown(async move {
            let _ = shutdown_rx.changed().await;
            info!("listener draining");
        });

        graceful.await?;
        Ok(())
    }
}
