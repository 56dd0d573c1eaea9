//! Transport Layer
//!
//! Message delivery between the previewed page, the serving layer and the
//! editor host.
//!
//! - [`Transport`] - the tracker-facing send abstraction
//! - [`server`] - WebSocket listener that hands accepted clients to the actor
//! - [`actor`] - channel actor owning connected preview tabs
//!
//! # Architecture
//!
//! ```text
//! preview tab --[GET_CONTENT / tracker events]--> ChannelActor --> RequestBroker
//!      ^                                               |
//!      +----------[REQUEST_RESPONSE broadcast]---------+
//! ```

pub mod actor;
pub mod server;

use anyhow::Result;
use tokio::sync::mpsc;

pub use actor::{ChannelActor, ChannelMsg};
pub use server::start_channel_server;

/// One-way frame delivery from the in-page tracker to the host.
///
/// The tracker only needs fire-and-forget send semantics; the concrete
/// binding (WebSocket, iframe postMessage, in-process channel) is the
/// embedder's business.
pub trait Transport: Send + Sync {
    fn send(&self, frame: String) -> Result<()>;
}

/// In-process transport over a tokio channel. Used by embedders that host
/// the tracker and the consumer in one process, and by tests.
pub struct ChannelTransport {
    tx: mpsc::UnboundedSender<String>,
}

impl ChannelTransport {
    pub fn pair() -> (Self, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Transport for ChannelTransport {
    fn send(&self, frame: String) -> Result<()> {
        self.tx
            .send(frame)
            .map_err(|_| anyhow::anyhow!("transport receiver dropped"))
    }
}
