//! WebSocket listener for the preview broadcast channel.
//!
//! Accepts preview-tab connections and hands the raw streams to the
//! ChannelActor over its message channel.

use std::net::TcpListener;

use anyhow::Result;

use super::ChannelMsg;
use crate::utils::net;

/// Start the channel listener; accepted clients go to the ChannelActor.
///
/// Returns the actually bound port (may differ from `base_port` when it was
/// in use).
pub fn start_channel_server(
    base_port: u16,
    channel_tx: tokio::sync::mpsc::Sender<ChannelMsg>,
) -> Result<u16> {
    let (listener, actual_port) = net::bind_with_retry(base_port, |port| {
        TcpListener::bind(("127.0.0.1", port)).map_err(Into::into)
    })?;
    listener.set_nonblocking(true)?;

    // Spawn acceptor thread
    std::thread::spawn(move || {
        loop {
            match listener.accept() {
                Ok((stream, addr)) => {
                    crate::debug!("channel"; "client connected: {}", addr);

                    // Set blocking for the WebSocket handshake
                    let _ = stream.set_nonblocking(false);

                    let tx = channel_tx.clone();
                    if tx.blocking_send(ChannelMsg::AddClient(stream)).is_err() {
                        crate::log!("channel"; "failed to send client to actor");
                        break;
                    }
                }
                Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                    std::thread::sleep(std::time::Duration::from_millis(100));
                    continue;
                }
                Err(e) => {
                    crate::log!("channel"; "accept error: {}", e);
                    std::thread::sleep(std::time::Duration::from_millis(100));
                }
            }
        }
    });

    Ok(actual_port)
}

