//! HTTP preview server.
//!
//! The concrete serving layer in front of the resolver: maps request URLs to
//! project paths and serves whatever the resolver decides (override, open
//! buffer, rendered Markdown, disk bytes). Requests are handled on a small
//! thread pool so one slow disk read never blocks other resolutions.

mod response;

use crate::{config::PreviewConfig, debug, log, resolver::ContentResolver, utils};
use anyhow::Result;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tiny_http::{Request, Server};

/// Shared state the request loop needs.
pub struct ServeContext {
    pub resolver: Arc<ContentResolver>,
    /// Handle into the actor runtime; resolution is async (disk fallback)
    pub runtime: tokio::runtime::Handle,
    pub root: PathBuf,
}

/// Bind to the specified interface and port, with automatic port retry.
pub fn bind_with_retry(
    interface: std::net::IpAddr,
    base_port: u16,
) -> Result<(Server, SocketAddr)> {
    let (server, port) = utils::net::bind_with_retry(base_port, |port| {
        Server::http(SocketAddr::new(interface, port)).map_err(|e| anyhow::anyhow!("{e}"))
    })?;
    if port != base_port {
        log!("serve"; "port {} in use, using {} instead", base_port, port);
    }
    Ok((server, SocketAddr::new(interface, port)))
}

/// Run the request loop (blocking until the server is unblocked).
pub fn run_request_loop(server: &Server, ctx: Arc<ServeContext>) {
    // Thread pool keeps disk-bound resolutions from blocking other requests
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(4)
        .build()
        .expect("failed to create thread pool");

    for request in server.incoming_requests() {
        let ctx = Arc::clone(&ctx);
        pool.spawn(move || {
            if let Err(e) = handle_request(request, &ctx) {
                log!("serve"; "request error: {e}");
            }
        });
    }
}

/// Handle a single HTTP request
fn handle_request(request: Request, ctx: &ServeContext) -> Result<()> {
    if crate::core::is_shutdown() {
        return response::respond_unavailable(request);
    }

    let Some(path) = utils::path::url_to_path(request.url(), &ctx.root) else {
        // Traversal attempt; same answer as any out-of-project path
        debug!("serve"; "refused url: {}", request.url());
        return response::respond_forbidden(request);
    };

    let resolved = ctx.runtime.block_on(ctx.resolver.resolve(&path));
    response::respond_resolved(request, &path, resolved)
}

/// Config sugar for building the context.
impl ServeContext {
    pub fn new(
        config: &PreviewConfig,
        resolver: Arc<ContentResolver>,
        runtime: tokio::runtime::Handle,
    ) -> Self {
        Self {
            resolver,
            runtime,
            root: config.root.clone(),
        }
    }
}
