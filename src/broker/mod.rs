//! Request Broker
//!
//! Bridges inbound "content requested" events from the serving layer to the
//! resolver, and routes each response back out tagged with its original
//! request id.
//!
//! ```text
//! ChannelActor --[BrokerMsg]--> RequestBroker --resolve--> ContentResolver
//!       ^                            |
//!       +------[ChannelResponse]-----+
//! ```
//!
//! Several editor instances may share one serving layer; every request
//! carries the instance it is addressed to, and the broker answers only
//! requests matching its own id, so exactly one instance responds.

use std::path::Path;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::protocol::{ChannelRequest, ChannelResponse};
use crate::resolver::{ContentResolver, LiveDocument, LiveDocumentRegistry};

/// Messages to the broker actor.
#[derive(Debug)]
pub enum BrokerMsg {
    /// Inbound request from the broadcast channel
    Request(ChannelRequest),
    /// Shutdown
    Shutdown,
}

/// Broker actor handle. Owns the inbound receiver until started.
pub struct RequestBroker {
    instance_id: String,
    resolver: Arc<ContentResolver>,
    registry: Arc<LiveDocumentRegistry>,
    outbound: mpsc::Sender<ChannelResponse>,
    inbound: Option<mpsc::Receiver<BrokerMsg>>,
    task: Option<JoinHandle<()>>,
}

impl RequestBroker {
    pub fn new(
        instance_id: impl Into<String>,
        resolver: Arc<ContentResolver>,
        outbound: mpsc::Sender<ChannelResponse>,
        inbound: mpsc::Receiver<BrokerMsg>,
    ) -> Self {
        let registry = Arc::clone(resolver.registry());
        Self {
            instance_id: instance_id.into(),
            resolver,
            registry,
            outbound,
            inbound: Some(inbound),
            task: None,
        }
    }

    /// Start the broker loop. Idempotent: a second call while running is a
    /// no-op (redundant cross-origin iframe reloads must not respawn it).
    pub fn start(&mut self) {
        let Some(rx) = self.inbound.take() else {
            crate::debug!("broker"; "start called while already running");
            return;
        };
        let instance_id = self.instance_id.clone();
        let resolver = Arc::clone(&self.resolver);
        let outbound = self.outbound.clone();
        self.task = Some(tokio::spawn(Self::run(instance_id, resolver, outbound, rx)));
    }

    pub fn is_started(&self) -> bool {
        self.task.is_some()
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    // ------------------------------------------------------------------
    // administrative pass-throughs for document-lifecycle collaborators
    // ------------------------------------------------------------------

    pub fn add(&self, path: impl Into<std::path::PathBuf>, doc: LiveDocument) {
        self.registry.add(path, doc);
    }

    pub fn remove(&self, path: &Path) {
        self.registry.remove(path);
    }

    pub fn clear(&self) {
        self.registry.clear();
    }

    pub fn add_virtual_content_at_path(
        &self,
        path: impl Into<std::path::PathBuf>,
        text: impl Into<String>,
    ) {
        self.registry.add_virtual_content_at_path(path, text);
    }

    pub fn remove_virtual_content_at_path(&self, path: &Path) {
        self.registry.remove_virtual_content_at_path(path);
    }

    // ------------------------------------------------------------------
    // event loop
    // ------------------------------------------------------------------

    async fn run(
        instance_id: String,
        resolver: Arc<ContentResolver>,
        outbound: mpsc::Sender<ChannelResponse>,
        mut rx: mpsc::Receiver<BrokerMsg>,
    ) {
        while let Some(msg) = rx.recv().await {
            match msg {
                BrokerMsg::Request(ChannelRequest::GetContent { message }) => {
                    if message.instance_id != instance_id {
                        crate::debug!("broker"; "ignoring request addressed to {}", message.instance_id);
                        continue;
                    }
                    // Resolutions are independent; disk reads must not block
                    // other requests, so each one gets its own task
                    let resolver = Arc::clone(&resolver);
                    let outbound = outbound.clone();
                    tokio::spawn(async move {
                        let resolved = resolver.resolve(Path::new(&message.path)).await;
                        let response =
                            resolved.into_channel_response(message.request_id, message.path);
                        if outbound.send(response).await.is_err() {
                            crate::log!("broker"; "channel closed, response dropped");
                        }
                    });
                }

                BrokerMsg::Request(ChannelRequest::GetInstanceId) => {
                    let response = ChannelResponse::InstanceId {
                        instance_id: instance_id.clone(),
                    };
                    if outbound.send(response).await.is_err() {
                        crate::log!("broker"; "channel closed, discovery reply dropped");
                    }
                }

                BrokerMsg::Shutdown => break,
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
    use crate::protocol::ContentQuery;
    use crate::resolver::{InMemoryDocumentStore, WorkspaceScope};
    use serde_json::json;
    use std::collections::BTreeSet;
    use std::time::Duration;

    fn make_broker(
        root: &Path,
    ) -> (
        RequestBroker,
        Arc<InMemoryDocumentStore>,
        mpsc::Sender<BrokerMsg>,
        mpsc::Receiver<ChannelResponse>,
    ) {
        let registry = Arc::new(LiveDocumentRegistry::new());
        let documents = Arc::new(InMemoryDocumentStore::new());
        let scope = Arc::new(WorkspaceScope::new(root));
        let resolver = Arc::new(ContentResolver::new(
            registry,
            Arc::clone(&documents) as _,
            scope,
        ));

        let (inbound_tx, inbound_rx) = mpsc::channel(32);
        let (outbound_tx, outbound_rx) = mpsc::channel(32);
        let broker = RequestBroker::new("editor-1", resolver, outbound_tx, inbound_rx);
        (broker, documents, inbound_tx, outbound_rx)
    }

    fn get_content(path: &str, request_id: serde_json::Value, instance: &str) -> BrokerMsg {
        BrokerMsg::Request(ChannelRequest::GetContent {
            message: ContentQuery {
                path: path.to_string(),
                request_id,
                instance_id: instance.to_string(),
            },
        })
    }

    #[tokio::test]
    async fn test_foreign_instance_request_gets_no_response() {
        let (mut broker, documents, tx, mut rx) = make_broker(Path::new("/proj"));
        documents.open(Path::new("/proj/a.html"), "<h1>hi</h1>");
        broker.start();

        tx.send(get_content("/proj/a.html", json!(1), "someone-else"))
            .await
            .unwrap();
        // Follow with a matching request to prove the loop is alive
        tx.send(get_content("/proj/a.html", json!(2), "editor-1"))
            .await
            .unwrap();

        let ChannelResponse::RequestResponse { request_id, .. } = rx.recv().await.unwrap() else {
            panic!("expected RequestResponse");
        };
        assert_eq!(request_id, json!(2));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_instance_discovery_echo() {
        let (mut broker, _, tx, mut rx) = make_broker(Path::new("/proj"));
        broker.start();

        tx.send(BrokerMsg::Request(ChannelRequest::GetInstanceId))
            .await
            .unwrap();
        match rx.recv().await.unwrap() {
            ChannelResponse::InstanceId { instance_id } => assert_eq!(instance_id, "editor-1"),
            other => panic!("expected InstanceId, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_every_request_gets_exactly_one_matching_response() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("disk.txt"), "from disk").unwrap();

        let (mut broker, documents, tx, mut rx) = make_broker(dir.path());
        let open_path = dir.path().join("open.html");
        documents.open(&open_path, "<h1>open</h1>");
        broker.start();

        // Mix of cache hits (open buffer) and disk reads
        let disk_path = dir.path().join("disk.txt").display().to_string();
        let open_path = open_path.display().to_string();
        for i in 0..10u64 {
            let path = if i % 2 == 0 { &disk_path } else { &open_path };
            tx.send(get_content(path, json!(i), "editor-1")).await.unwrap();
        }

        let mut seen = BTreeSet::new();
        for _ in 0..10 {
            let ChannelResponse::RequestResponse {
                request_id,
                path,
                contents,
                ..
            } = rx.recv().await.unwrap()
            else {
                panic!("expected RequestResponse");
            };
            let id = request_id.as_u64().unwrap();
            assert!(seen.insert(id), "duplicate response for request {id}");
            if id % 2 == 0 {
                assert_eq!(path, disk_path);
                assert_eq!(contents.as_deref(), Some("from disk"));
            } else {
                assert_eq!(path, open_path);
                assert_eq!(contents.as_deref(), Some("<h1>open</h1>"));
            }
        }
        assert_eq!(seen.len(), 10);

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_start_is_idempotent() {
        let (mut broker, _, tx, mut rx) = make_broker(Path::new("/proj"));
        broker.start();
        assert!(broker.is_started());
        broker.start(); // no-op, must not panic or respawn

        tx.send(BrokerMsg::Request(ChannelRequest::GetInstanceId))
            .await
            .unwrap();
        assert!(matches!(
            rx.recv().await,
            Some(ChannelResponse::InstanceId { .. })
        ));
        // A second loop would have produced a second reply
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_admin_passthroughs_affect_resolution() {
        let (mut broker, _, tx, mut rx) = make_broker(Path::new("/proj"));
        broker.add_virtual_content_at_path("/proj/gen.css", "body{}");
        broker.start();

        tx.send(get_content("/proj/gen.css", json!("a"), "editor-1"))
            .await
            .unwrap();
        let ChannelResponse::RequestResponse { contents, .. } = rx.recv().await.unwrap() else {
            panic!("expected RequestResponse");
        };
        assert_eq!(contents.as_deref(), Some("body{}"));

        broker.remove_virtual_content_at_path(Path::new("/proj/gen.css"));
        tx.send(get_content("/proj/gen.css", json!("b"), "editor-1"))
            .await
            .unwrap();
        let ChannelResponse::RequestResponse { contents, .. } = rx.recv().await.unwrap() else {
            panic!("expected RequestResponse");
        };
        // Override gone, nothing open, nothing on disk
        assert_eq!(contents, None);
    }
}
