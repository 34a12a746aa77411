mod board;
mod bot;
mod client;
mod clock;
mod common;
mod config;
mod listener;
mod logging;
mod offline;
pub mod protocol;
mod room;
mod server;
mod ship;
pub mod transport;

pub use board::*;
pub use bot::*;
pub use client::*;
pub use clock::*;
pub use common::*;
pub use config::*;
pub use listener::{handle_connection, serve};
pub use logging::init_logging;
pub use offline::*;
pub use protocol::{Request, Response, ServerError, Status};
pub use room::*;
pub use server::*;
pub use ship::*;
pub use transport::local::LocalTransport;
pub use transport::tcp::{FrameError, TcpTransport};
pub use transport::Transport;
