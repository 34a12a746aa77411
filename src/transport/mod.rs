//! Text-frame transports between a client and a [`GameServer`](crate::GameServer).

#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    /// Send one frame. The frame must not contain a newline.
    async fn send(&mut self, frame: &str) -> anyhow::Result<()>;
    async fn recv(&mut self) -> anyhow::Result<String>;
}

pub mod local;
pub mod tcp;
