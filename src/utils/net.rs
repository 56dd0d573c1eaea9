//! Port binding with retry.

use anyhow::Result;

/// Maximum port binding attempts.
pub const MAX_PORT_RETRIES: u16 = 10;

/// Bind via `bind`, walking up from `base_port` while ports are taken.
///
/// Returns the bound value and the port that worked.
pub fn bind_with_retry<T>(
    base_port: u16,
    mut bind: impl FnMut(u16) -> Result<T>,
) -> Result<(T, u16)> {
    let mut last_error = None;

    for offset in 0..MAX_PORT_RETRIES {
        let port = base_port.saturating_add(offset);
        match bind(port) {
            Ok(bound) => return Ok((bound, port)),
            Err(e) => last_error = Some(e),
        }
    }

    Err(anyhow::anyhow!(
        "Failed to bind after {} attempts (ports {}-{}): {}",
        MAX_PORT_RETRIES,
        base_port,
        base_port.saturating_add(MAX_PORT_RETRIES - 1),
        last_error.map(|e| e.to_string()).unwrap_or_default()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;

    #[test]
    fn test_retry_walks_past_taken_port() {
        let taken = TcpListener::bind("127.0.0.1:0").unwrap();
        let base = taken.local_addr().unwrap().port();

        let (listener, port) =
            bind_with_retry(base, |p| TcpListener::bind(("127.0.0.1", p)).map_err(Into::into))
                .unwrap();
        assert!(port > base);
        assert_eq!(listener.local_addr().unwrap().port(), port);
    }

    #[test]
    fn test_exhausted_attempts_error() {
        let result = bind_with_retry(9000, |_| -> Result<()> { Err(anyhow::anyhow!("in use")) });
        assert!(result.is_err());
    }
}
