//! HTTP response handlers.

use crate::resolver::{ResolvedContent, SECURITY_MESSAGE};
use crate::utils::mime;
use anyhow::Result;
use std::path::Path;
use tiny_http::{Header, Method, Request, Response, StatusCode};

/// Respond with whatever the resolver produced for `path`.
pub fn respond_resolved(request: Request, path: &Path, resolved: ResolvedContent) -> Result<()> {
    use mime::types::{HTML, PLAIN};

    match resolved {
        ResolvedContent::SecurityRejection => {
            if is_head_request(&request) {
                return send_head(request, 403, PLAIN);
            }
            send_body(request, 403, PLAIN, SECURITY_MESSAGE.as_bytes().to_vec())
        }

        ResolvedContent::Missing => {
            if is_head_request(&request) {
                return send_head(request, 404, PLAIN);
            }
            send_body(request, 404, PLAIN, b"404 Not Found".to_vec())
        }

        // Extension says text/markdown; the rendered page is HTML
        ResolvedContent::RenderedMarkdown(html) => {
            if is_head_request(&request) {
                return send_head(request, 200, HTML);
            }
            send_body(request, 200, HTML, html.into_bytes())
        }

        ResolvedContent::VirtualOverride(text)
        | ResolvedContent::LiveInstrumented(text)
        | ResolvedContent::LiveBuffer(text) => {
            let content_type = mime::from_path(path);
            if is_head_request(&request) {
                return send_head(request, 200, content_type);
            }
            send_body(request, 200, content_type, text.into_bytes())
        }

        ResolvedContent::DiskBytes(bytes) => {
            let content_type = mime::from_path(path);
            if is_head_request(&request) {
                return send_head(request, 200, content_type);
            }
            send_body(request, 200, content_type, bytes)
        }
    }
}

/// Respond with 403 for URLs refused before resolution (traversal).
pub fn respond_forbidden(request: Request) -> Result<()> {
    use mime::types::PLAIN;
    send_body(request, 403, PLAIN, SECURITY_MESSAGE.as_bytes().to_vec())
}

/// Respond with 503 Service Unavailable (server shutting down).
pub fn respond_unavailable(request: Request) -> Result<()> {
    use mime::types::PLAIN;
    send_body(request, 503, PLAIN, b"503 Service Unavailable".to_vec())
}

fn is_head_request(request: &Request) -> bool {
    request.method() == &Method::Head
}

fn send_head(request: Request, status: u16, content_type: &'static str) -> Result<()> {
    let response = Response::empty(StatusCode(status))
        .with_header(make_header("Content-Type", content_type));
    request.respond(response)?;
    Ok(())
}

fn send_body(
    request: Request,
    status: u16,
    content_type: &'static str,
    body: Vec<u8>,
) -> Result<()> {
    let response = Response::from_data(body)
        .with_status_code(StatusCode(status))
        .with_header(make_header("Content-Type", content_type));
    request.respond(response)?;
    Ok(())
}

fn make_header(key: &'static str, value: &'static str) -> Header {
    Header::from_bytes(key, value).unwrap()
}
