use std::sync::Arc;
use tokio::net::TcpListener;

use crate::server::Server;

/// Accept classic clients on `listener` forever, one task per connection.
pub async fn serve(listener: TcpListener, server: Arc<Server>) -> anyhow::Result<()> {
    loop {
        let (stream, addr) = listener.accept().await?;
        tracing::info!("Connection from {}", addr);
        server.metrics.connection_accepted();

        let server = Arc::clone(&server);
        tokio::spawn(async move {
            if let Err(e) = super::connection::handle(stream, server).await {
                tracing::warn!("Connection from {} closed: {}", addr, e);
            }
        });
    }
}

/// Bind `bind_addr` and serve.
pub async fn run(server: Arc<Server>, bind_addr: &str) -> anyhow::Result<()> {
    let listener = TcpListener::bind(bind_addr).await?;
    tracing::info!("Listening on {}", bind_addr);
    serve(listener, server).await
}
