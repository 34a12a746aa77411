//! TCP accept loop: one task per connection.

use std::sync::Arc;

use log::{debug, info, warn};
use tokio::net::{TcpListener, TcpStream};

use crate::protocol::Response;
use crate::room::ClientId;
use crate::server::GameServer;
use crate::transport::tcp::{FrameError, TcpTransport};
use crate::transport::Transport;

/// Accept connections forever, serving each on its own task.
pub async fn serve(listener: TcpListener, server: Arc<GameServer>) -> anyhow::Result<()> {
    info!("listening on {}", listener.local_addr()?);
    loop {
        let (stream, addr) = listener.accept().await?;
        let server = Arc::clone(&server);
        tokio::spawn(async move {
            info!("accepted connection from {addr}");
            if let Err(e) = handle_connection(stream, server).await {
                debug!("connection {addr} closed: {e}");
            }
        });
    }
}

/// Greet the client, then answer frames until the peer goes away. The
/// client's room is closed when the connection ends.
pub async fn handle_connection(stream: TcpStream, server: Arc<GameServer>) -> anyhow::Result<()> {
    let config = server.config().clone();
    let mut transport = TcpTransport::with_config(stream, config.idle_timeout, config.max_frame_size);
    let client = server.register_client();

    let result = answer_frames(&mut transport, &server, client).await;

    server.disconnect(client);
    if let Err(e) = &result {
        if let Some(FrameError::TooLarge { .. }) = e.downcast_ref::<FrameError>() {
            warn!("{client}: dropped for oversized frame");
        }
    }
    result
}

async fn answer_frames(
    transport: &mut TcpTransport,
    server: &GameServer,
    client: ClientId,
) -> anyhow::Result<()> {
    transport.send(&Response::greeting().to_frame()).await?;
    loop {
        let frame = transport.recv().await?;
        let response = server.handle_command(client, &frame);
        if !response.is_success() {
            debug!("{client}: {}", response.message);
        }
        transport.send(&response.to_frame()).await?;
    }
}
