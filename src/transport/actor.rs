//! Channel Actor - Bidirectional Communication
//!
//! This actor is responsible for:
//! - Managing connected preview-tab WebSocket clients
//! - Broadcasting host responses (`REQUEST_RESPONSE`, `PHOENIX_INSTANCE_ID`)
//! - Receiving client frames and routing them: content requests to the
//!   broker, tracker events to the related index

use std::net::TcpStream;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tungstenite::WebSocket;
use tungstenite::protocol::Message;

use crate::broker::BrokerMsg;
use crate::protocol::{self, ChannelResponse, InboundFrame};
use crate::tracker::index::RelatedIndex;

/// Messages to the channel actor.
pub enum ChannelMsg {
    /// Newly accepted preview-tab connection
    AddClient(TcpStream),
    /// Host response to broadcast to all tabs
    Outbound(ChannelResponse),
    /// Shutdown
    Shutdown,
}

/// A connected preview tab.
struct ChannelClient {
    id: u64,
    ws: WebSocket<TcpStream>,
}

/// Channel actor - owns client connections and the broadcast loop.
pub struct ChannelActor {
    rx: mpsc::Receiver<ChannelMsg>,
    clients: Arc<Mutex<Vec<ChannelClient>>>,
    broker_tx: mpsc::Sender<BrokerMsg>,
    index: Arc<RelatedIndex>,
    next_client_id: u64,
}

impl ChannelActor {
    pub fn new(
        rx: mpsc::Receiver<ChannelMsg>,
        broker_tx: mpsc::Sender<BrokerMsg>,
        index: Arc<RelatedIndex>,
    ) -> Self {
        Self {
            rx,
            clients: Arc::new(Mutex::new(Vec::new())),
            broker_tx,
            index,
            next_client_id: 1,
        }
    }

    /// Run the actor event loop.
    pub async fn run(mut self) {
        // Background thread polls client frames
        let clients = Arc::clone(&self.clients);
        let broker_tx = self.broker_tx.clone();
        let index = Arc::clone(&self.index);
        std::thread::spawn(move || {
            Self::client_reader_loop(clients, broker_tx, index);
        });

        while let Some(msg) = self.rx.recv().await {
            match msg {
                ChannelMsg::AddClient(stream) => {
                    self.add_client(stream);
                }

                ChannelMsg::Outbound(response) => {
                    match protocol::to_frame(&response) {
                        Ok(frame) => self.broadcast(&frame),
                        // Broken call site, not a runtime condition
                        Err(e) => crate::log!("error"; "refusing outbound frame: {}", e),
                    }
                }

                ChannelMsg::Shutdown => {
                    crate::debug!("channel"; "shutting down");
                    let mut clients = self.clients.lock();
                    for mut client in clients.drain(..) {
                        let _ = client.ws.close(None);
                    }
                    break;
                }
            }
        }
    }

    /// Add a new client connection
    fn add_client(&mut self, stream: TcpStream) {
        // Keep blocking mode during handshake, switch to non-blocking after
        match tungstenite::accept(stream) {
            Ok(ws) => {
                let _ = ws.get_ref().set_nonblocking(true);
                let id = self.next_client_id;
                self.next_client_id += 1;

                let mut clients = self.clients.lock();
                crate::debug!("channel"; "client {} connected (total: {})", id, clients.len() + 1);
                clients.push(ChannelClient { id, ws });
            }
            Err(e) => {
                crate::log!("channel"; "handshake failed: {}", e);
            }
        }
    }

    /// Broadcast a frame to all connected tabs, dropping dead connections.
    fn broadcast(&self, frame: &str) {
        let mut clients = self.clients.lock();
        clients.retain_mut(|client| {
            client
                .ws
                .send(Message::Text(frame.to_string().into()))
                .is_ok()
        });
    }

    /// Background thread to read client frames (non-blocking poll)
    fn client_reader_loop(
        clients: Arc<Mutex<Vec<ChannelClient>>>,
        broker_tx: mpsc::Sender<BrokerMsg>,
        index: Arc<RelatedIndex>,
    ) {
        loop {
            std::thread::sleep(std::time::Duration::from_millis(50));
            Self::poll_once(&clients, &broker_tx, &index);
        }
    }

    /// One poll pass: drain pending frames and drop dead connections.
    ///
    /// Frames are collected under the client lock but routed after it is
    /// released. Routing can block on a full broker queue, and the broadcast
    /// path needs the same lock to drain that queue.
    fn poll_once(
        clients: &Mutex<Vec<ChannelClient>>,
        broker_tx: &mpsc::Sender<BrokerMsg>,
        index: &RelatedIndex,
    ) {
        let mut inbound = Vec::new();
        {
            let mut clients_guard = clients.lock();
            let mut disconnected = Vec::new();

            for (i, client) in clients_guard.iter_mut().enumerate() {
                match client.ws.read() {
                    Ok(Message::Text(text)) => {
                        inbound.push((client.id, text));
                    }
                    Ok(Message::Close(_)) => {
                        disconnected.push(i);
                    }
                    Err(tungstenite::Error::Io(ref e))
                        if e.kind() == std::io::ErrorKind::WouldBlock =>
                    {
                        // No data available, continue
                    }
                    Err(_) => {
                        disconnected.push(i);
                    }
                    _ => {}
                }
            }

            for i in disconnected.into_iter().rev() {
                index.remove_client(clients_guard[i].id);
                clients_guard.remove(i);
            }
        }

        for (client, text) in inbound {
            Self::route_frame(&text, client, broker_tx, index);
        }
    }

    /// Route one inbound frame by its tag.
    fn route_frame(
        text: &str,
        client: u64,
        broker_tx: &mpsc::Sender<BrokerMsg>,
        index: &RelatedIndex,
    ) {
        match protocol::parse_frame(text) {
            Ok(InboundFrame::Request(request)) => {
                if broker_tx.blocking_send(BrokerMsg::Request(request)).is_err() {
                    crate::log!("channel"; "broker gone, request dropped");
                }
            }
            Ok(InboundFrame::Tracker(event)) => {
                index.apply(client, &event);
            }
            Err(e) => {
                // Tag mismatch means an editor/preview version skew
                crate::log!("error"; "client {}: {}", client, e);
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::ChannelRequest;
    use std::net::TcpListener;
    use std::time::Duration;

    #[test]
    fn test_reader_releases_lock_while_broker_is_full() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let tab = std::thread::spawn(move || {
            let (mut ws, _) = tungstenite::connect(format!("ws://127.0.0.1:{port}")).unwrap();
            let frame = r#"{"type":"GET_CONTENT","message":{"path":"/proj/a.html","requestID":1,"phoenixInstanceID":"editor-1"}}"#;
            ws.send(Message::Text(frame.to_string().into())).unwrap();
            std::thread::sleep(Duration::from_millis(600));
        });

        let (stream, _) = listener.accept().unwrap();
        let ws = tungstenite::accept(stream).unwrap();
        ws.get_ref().set_nonblocking(true).unwrap();

        let clients = Arc::new(Mutex::new(vec![ChannelClient { id: 1, ws }]));
        let index = Arc::new(RelatedIndex::new());

        // Saturate the broker queue so routing the tab's frame must wait
        let (broker_tx, mut broker_rx) = mpsc::channel(1);
        broker_tx
            .blocking_send(BrokerMsg::Request(ChannelRequest::GetInstanceId))
            .unwrap();

        let poll_clients = Arc::clone(&clients);
        let poll_index = Arc::clone(&index);
        let poller = std::thread::spawn(move || {
            for _ in 0..20 {
                ChannelActor::poll_once(&poll_clients, &broker_tx, &poll_index);
                std::thread::sleep(Duration::from_millis(10));
            }
        });

        // The poller is now parked on the full queue; the client list must
        // stay available to the broadcast path
        std::thread::sleep(Duration::from_millis(300));
        assert!(
            clients.try_lock().is_some(),
            "reader held the client lock while waiting on the broker"
        );

        // Draining the queue lets the parked frame through
        assert!(matches!(
            broker_rx.blocking_recv(),
            Some(BrokerMsg::Request(ChannelRequest::GetInstanceId))
        ));
        assert!(matches!(
            broker_rx.blocking_recv(),
            Some(BrokerMsg::Request(ChannelRequest::GetContent { .. }))
        ));

        poller.join().unwrap();
        tab.join().unwrap();
    }
}
