use std::collections::VecDeque;
use std::sync::Arc;

use crate::room::ClientId;
use crate::server::GameServer;
use crate::transport::Transport;

/// In-process transport for offline play: every frame sent is dispatched
/// straight into a shared [`GameServer`] and the response is queued for `recv`.
pub struct LocalTransport {
    server: Arc<GameServer>,
    client: ClientId,
    responses: VecDeque<String>,
}

impl LocalTransport {
    pub fn new(server: Arc<GameServer>) -> Self {
        let client = server.register_client();
        Self {
            server,
            client,
            responses: VecDeque::new(),
        }
    }

    pub fn client_id(&self) -> ClientId {
        self.client
    }
}

impl Drop for LocalTransport {
    fn drop(&mut self) {
        self.server.disconnect(self.client);
    }
}

#[async_trait::async_trait]
impl Transport for LocalTransport {
    async fn send(&mut self, frame: &str) -> anyhow::Result<()> {
        let response = self.server.handle_command(self.client, frame);
        self.responses.push_back(response.to_frame());
        Ok(())
    }

    async fn recv(&mut self) -> anyhow::Result<String> {
        self.responses
            .pop_front()
            .ok_or_else(|| anyhow::anyhow!("No response pending"))
    }
}
