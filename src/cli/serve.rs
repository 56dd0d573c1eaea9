//! Serve command: wires the pipeline together and runs it.
//!
//! ```text
//! preview tab --ws--> ChannelActor --> RequestBroker --> ContentResolver
//!      |                   ^
//!      +-------http--------+--- tiny_http loop (rayon pool)
//! ```

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use anyhow::{Context, Result};
use tokio::sync::mpsc;

use crate::broker::RequestBroker;
use crate::config::PreviewConfig;
use crate::resolver::{ContentResolver, InMemoryDocumentStore, LiveDocumentRegistry, WorkspaceScope};
use crate::serve::{ServeContext, bind_with_retry, run_request_loop};
use crate::tracker::index::RelatedIndex;
use crate::transport::{ChannelActor, ChannelMsg, start_channel_server};
use crate::{debug, log};

/// Start the preview pipeline (blocking until shutdown).
pub fn run_serve(config: Arc<PreviewConfig>) -> Result<()> {
    let registry = Arc::new(LiveDocumentRegistry::new());
    let documents = Arc::new(InMemoryDocumentStore::new());
    let scope = Arc::new(WorkspaceScope::new(&config.root));
    let resolver = Arc::new(ContentResolver::new(registry, documents as _, scope));
    let index = Arc::new(RelatedIndex::new());

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .context("failed to create tokio runtime")?;
    let runtime_handle = runtime.handle().clone();

    // Bind HTTP first so Ctrl+C always has a server to unblock
    let (shutdown_tx, shutdown_rx) = crossbeam::channel::unbounded::<()>();
    let (server, addr) = bind_with_retry(config.serve.interface, config.serve.port)?;
    let server = Arc::new(server);
    crate::core::register_server(Arc::clone(&server), shutdown_tx);
    log!("serve"; "http://{}", addr);

    // Broadcast channel listener (port may shift on retry)
    let (channel_tx, channel_rx) = mpsc::channel::<ChannelMsg>(64);
    let ws_port = start_channel_server(config.serve.channel_port, channel_tx.clone())?;
    debug!("channel"; "ws://localhost:{}", ws_port);

    let instance_id = config.instance_id();
    log!("serve"; "instance id: {}", instance_id);

    let actor_handle = spawn_actors(
        runtime,
        instance_id,
        Arc::clone(&resolver),
        index,
        channel_tx,
        channel_rx,
        shutdown_rx,
    );

    let ctx = Arc::new(ServeContext::new(&config, resolver, runtime_handle));
    run_request_loop(&server, ctx);

    wait_for_shutdown(actor_handle);
    Ok(())
}

/// Spawn the actor system on its own runtime thread.
fn spawn_actors(
    runtime: tokio::runtime::Runtime,
    instance_id: String,
    resolver: Arc<ContentResolver>,
    index: Arc<RelatedIndex>,
    channel_tx: mpsc::Sender<ChannelMsg>,
    channel_rx: mpsc::Receiver<ChannelMsg>,
    shutdown_rx: crossbeam::channel::Receiver<()>,
) -> JoinHandle<()> {
    thread::spawn(move || {
        runtime.block_on(async move {
            let (broker_tx, broker_rx) = mpsc::channel(64);
            let (outbound_tx, mut outbound_rx) = mpsc::channel(64);

            let mut broker = RequestBroker::new(instance_id, resolver, outbound_tx, broker_rx);
            broker.start();

            let actor = ChannelActor::new(channel_rx, broker_tx, index);
            tokio::spawn(actor.run());

            // Pump broker responses back onto the broadcast channel
            let pump_tx = channel_tx.clone();
            tokio::spawn(async move {
                while let Some(response) = outbound_rx.recv().await {
                    if pump_tx.send(ChannelMsg::Outbound(response)).await.is_err() {
                        break;
                    }
                }
            });

            // Park until Ctrl+C, then tear the channel down
            let _ = tokio::task::spawn_blocking(move || shutdown_rx.recv()).await;
            let _ = channel_tx.send(ChannelMsg::Shutdown).await;
        });
    })
}

/// Wait for the actor system to shutdown gracefully (max 2 seconds).
fn wait_for_shutdown(handle: JoinHandle<()>) {
    for _ in 0..40 {
        if handle.is_finished() {
            let _ = handle.join();
            return;
        }
        thread::sleep(std::time::Duration::from_millis(50));
    }
}
