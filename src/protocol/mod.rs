//! Live Preview Message Protocol
//!
//! Defines the JSON message formats exchanged over the broadcast channel
//! between the editor host, the serving layer and the previewed tabs.
//!
//! Two families of messages share the channel:
//!
//! - Tracker events (tagged with `method`): the in-page tracker reporting
//!   related scripts/stylesheets of the previewed document.
//! - Content traffic (tagged with `type`): the serving layer asking for
//!   resource content and the host posting resolved responses back.
//!
//! Field casing on the wire (`requestID`, `phoenixInstanceID`) is fixed by
//! the serving layer and must not change.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

use crate::tracker::RelatedSnapshot;

/// Opaque request identity: caller-supplied, echoed back unchanged.
pub type RequestId = serde_json::Value;

/// Protocol-shape errors. These indicate broken call sites, not runtime
/// conditions, and fail loudly instead of degrading to placeholder content.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Outbound message object lacks its `type`/`method` tag
    #[error("outbound message has no type tag: {0}")]
    MissingTag(String),

    /// Inbound frame is not valid JSON or matches no known shape
    #[error("unrecognized channel frame: {0}")]
    UnknownFrame(String),
}

// =============================================================================
// Tracker events (page -> host)
// =============================================================================

/// Notification from the in-page tracker about the previewed document's
/// external resources.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "method")]
pub enum TrackerEvent {
    /// Full snapshot, sent once when observation starts
    DocumentRelated { related: RelatedSnapshot },

    /// External `<script src>` element appeared
    ScriptAdded { src: String },

    /// External `<script src>` element was removed
    ScriptRemoved { src: String },

    /// Stylesheet became reachable (directly or via `@import`)
    StylesheetAdded { href: String, roots: Vec<String> },

    /// Stylesheet is no longer reachable
    StylesheetRemoved { href: String, roots: Vec<String> },
}

// =============================================================================
// Content traffic (serving layer <-> host)
// =============================================================================

/// Inbound request from the serving layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ChannelRequest {
    /// Resolve content for a path on behalf of a waiting fetch
    #[serde(rename = "GET_CONTENT")]
    GetContent { message: ContentQuery },

    /// Instance discovery broadcast
    #[serde(rename = "GET_PHOENIX_INSTANCE_ID")]
    GetInstanceId,
}

/// Body of a `GET_CONTENT` request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentQuery {
    /// Absolute resource path being fetched
    pub path: String,

    /// Opaque id the waiting fetch keyed its promise on
    #[serde(rename = "requestID")]
    pub request_id: RequestId,

    /// Editor instance this request is addressed to
    #[serde(rename = "phoenixInstanceID")]
    pub instance_id: String,
}

/// Outbound response from the host.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ChannelResponse {
    /// Resolved content for a `GET_CONTENT` request
    #[serde(rename = "REQUEST_RESPONSE")]
    RequestResponse {
        #[serde(rename = "requestID")]
        request_id: RequestId,
        path: String,
        /// `None` marks an unreadable resource (best-effort empty content)
        contents: Option<String>,
        /// Only populated when the content type cannot be inferred from the
        /// path extension (rendered Markdown served as text/html)
        #[serde(skip_serializing_if = "Option::is_none")]
        headers: Option<BTreeMap<String, String>>,
    },

    /// Answer to `GET_PHOENIX_INSTANCE_ID`
    #[serde(rename = "PHOENIX_INSTANCE_ID")]
    InstanceId {
        #[serde(rename = "PHOENIX_INSTANCE_ID")]
        instance_id: String,
    },
}

// =============================================================================
// Frame classification
// =============================================================================

/// Any frame arriving on the broadcast channel.
#[derive(Debug)]
pub enum InboundFrame {
    Request(ChannelRequest),
    Tracker(TrackerEvent),
}

/// Classify an inbound channel frame by its tag.
pub fn parse_frame(raw: &str) -> Result<InboundFrame, ProtocolError> {
    let value: serde_json::Value =
        serde_json::from_str(raw).map_err(|_| ProtocolError::UnknownFrame(raw.to_string()))?;

    if value.get("type").is_some() {
        serde_json::from_value(value)
            .map(InboundFrame::Request)
            .map_err(|_| ProtocolError::UnknownFrame(raw.to_string()))
    } else if value.get("method").is_some() {
        serde_json::from_value(value)
            .map(InboundFrame::Tracker)
            .map_err(|_| ProtocolError::UnknownFrame(raw.to_string()))
    } else {
        Err(ProtocolError::UnknownFrame(raw.to_string()))
    }
}

/// Serialize an outbound message, verifying the tag invariant.
///
/// A message without a `type`/`method` tag is a programmer error (a broken
/// call site) and must fail fast rather than be swallowed.
pub fn to_frame<T: Serialize>(message: &T) -> Result<String, ProtocolError> {
    let value =
        serde_json::to_value(message).map_err(|e| ProtocolError::MissingTag(e.to_string()))?;
    if value.get("type").is_none() && value.get("method").is_none() {
        return Err(ProtocolError::MissingTag(value.to_string()));
    }
    Ok(value.to_string())
}

// =============================================================================
// Tests
// =============================================================================
