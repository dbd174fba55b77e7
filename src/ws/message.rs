//! Wire-level message envelope and typed payloads.
//!
//! Every frame is a JSON envelope `{type, timestamp, data}` where the shape
//! of `data` is determined by `type`. Inbound frames are decoded
//! payload-second: the type tag is matched first, and only then is the
//! payload deserialized. Unknown types map to an explicit variant instead of
//! an error so the connection can log and drop them.

use crate::models::Recipe;
use crate::services::recipe::{ExtractionPhase, PhaseStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Recognized message type tags.
pub mod kind {
    pub const CONNECTION_ACK: &str = "CONNECTION_ACK";
    pub const PING: &str = "PING";
    pub const USER_IDENTIFY: &str = "USER_IDENTIFY";
    pub const USER_JOINED: &str = "USER_JOINED";
    pub const USER_LEFT: &str = "USER_LEFT";
    pub const CHAT_MESSAGE: &str = "CHAT_MESSAGE";
    pub const RECIPE_URL_REQUEST: &str = "RECIPE_URL_REQUEST";
    pub const RECIPE_ADDITIONS: &str = "RECIPE_ADDITIONS";
    pub const RECIPE_PROGRESS: &str = "RECIPE_PROGRESS";
}

/// Result status carried by `RECIPE_ADDITIONS`.
pub const STATUS_SUCCESS: &str = "success";
pub const STATUS_SERVICE_UNAVAILABLE: &str = "ERROR_SERVICE_UNAVAILABLE";

/// The wire envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub kind: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub data: Value,
}

impl Envelope {
    /// Build an envelope around a typed payload, stamped now.
    pub fn new(kind: &str, payload: impl Serialize) -> Result<Self, serde_json::Error> {
        Ok(Self {
            kind: kind.to_string(),
            timestamp: Utc::now(),
            data: serde_json::to_value(payload)?,
        })
    }

    /// Decode the envelope into a typed inbound message. The payload is only
    /// deserialized after the type tag has matched.
    pub fn decode(&self) -> Result<Inbound, ProtocolError> {
        match self.kind.as_str() {
            kind::PING => Ok(Inbound::Ping),
            kind::USER_IDENTIFY => {
                let payload = serde_json::from_value(self.data.clone()).map_err(|source| {
                    ProtocolError::Payload {
                        kind: kind::USER_IDENTIFY,
                        source,
                    }
                })?;
                Ok(Inbound::Identify(payload))
            }
            kind::CHAT_MESSAGE => Ok(Inbound::Chat),
            kind::RECIPE_URL_REQUEST => {
                let payload = serde_json::from_value(self.data.clone()).map_err(|source| {
                    ProtocolError::Payload {
                        kind: kind::RECIPE_URL_REQUEST,
                        source,
                    }
                })?;
                Ok(Inbound::RecipeUrlRequest(payload))
            }
            other => Ok(Inbound::Unrecognized(other.to_string())),
        }
    }
}

/// Typed inbound message, tag-matched from an [`Envelope`].
///
/// Chat payloads are opaque: the original envelope is relayed untouched, so
/// no decoded variant payload is needed.
#[derive(Debug)]
pub enum Inbound {
    Ping,
    Identify(UserIdentifyPayload),
    Chat,
    RecipeUrlRequest(RecipeUrlRequestPayload),
    Unrecognized(String),
}

/// Protocol-level decode failures. Logged and dropped, never fatal to the
/// connection.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("invalid {kind} payload: {source}")]
    Payload {
        kind: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserIdentifyPayload {
    pub user_id: String,
    pub user_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserJoinedPayload {
    pub user_id: String,
    pub user_name: String,
    pub session_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserLeftPayload {
    pub user_id: String,
    pub user_name: String,
    pub session_id: String,
}

/// Sent once when the server has registered a new connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionAckPayload {
    pub connection_id: String,
    pub session_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecipeUrlRequestPayload {
    pub sharer_id: String,
    pub sharer_name: String,
    pub url: String,
}

/// Progress event for an in-flight extraction, delivered to the requester
/// only. Echoes the triggering request.
#[derive(Debug, Clone, Serialize)]
pub struct RecipeProgressPayload {
    pub request: RecipeUrlRequestPayload,
    pub phase: ExtractionPhase,
    pub status: PhaseStatus,
    pub message: String,
}

/// Terminal extraction result, broadcast to the whole session.
#[derive(Debug, Clone, Serialize)]
pub struct RecipeAdditionsPayload {
    pub status: String,
    pub request: RecipeUrlRequestPayload,
    pub recipe: Option<Recipe>,
}
