//! Envelope decoding and structural validation of pushed payloads.
//!
//! Every server frame is a JSON envelope `{"type": ..., "payload": ...}`.
//! Each supported type has a guard that either narrows the payload to its
//! typed shape or rejects it; guards are pure and never panic. Unknown types
//! pass through as [`Decoded::Unknown`] so new server message kinds do not
//! break older clients.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::model::{
    ActorSummary, FollowEdge, NotificationKind, NotificationTargetType, PartialActor,
    ParticipantStatus, ParticipantVisibility,
};

/// Outer wrapper of every pushed frame, before any validation.
#[derive(Debug, Deserialize)]
pub struct RawEnvelope {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub payload: Option<Value>,
}

/// Notification as pushed on the wire. Unlike the cached row, the embedded
/// actor may be partial; the normalizer decides whether to keep it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireNotification {
    pub notification_id: String,
    pub recipient_user_id: String,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    #[serde(default)]
    pub actor_user_id: Option<String>,
    #[serde(default)]
    pub actor: Option<PartialActor>,
    #[serde(default)]
    pub target_type: Option<NotificationTargetType>,
    #[serde(default)]
    pub target_id: Option<String>,
    pub is_read: bool,
    #[serde(default)]
    pub read_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub action_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Participant as pushed on the wire. Carries every timestamp; the
/// per-mirror normalizers each keep their own subset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireParticipant {
    pub participant_id: String,
    pub event_id: String,
    pub user_id: String,
    pub status: ParticipantStatus,
    #[serde(default)]
    pub quantity: Option<u32>,
    #[serde(default)]
    pub shared_visibility: Option<ParticipantVisibility>,
    #[serde(default)]
    pub rsvp_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub cancelled_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub checked_in_at: Option<DateTime<Utc>>,
    pub user: ActorSummary,
}

/// Payload of a `notification.new` push.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationPayload {
    pub notification: WireNotification,
    pub unread_count: u64,
}

/// Payload of a `follow.request.created` / `follow.request.updated` push.
/// The wire shape of the edge matches the cached shape exactly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FollowPayload {
    pub follow: FollowEdge,
}

/// Payload of an `event.rsvp.updated` push. `rsvp_count` is the server's
/// authoritative aggregate for the owning event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RsvpPayload {
    pub participant: WireParticipant,
    pub previous_status: Option<ParticipantStatus>,
    pub rsvp_count: u64,
}

/// A validated push message, ready for normalization.
#[derive(Debug, Clone, PartialEq)]
pub enum PushMessage {
    NotificationNew(NotificationPayload),
    FollowRequest(FollowPayload),
    EventRsvp(RsvpPayload),
}

/// Outcome of decoding one inbound text frame.
#[derive(Debug)]
pub enum Decoded {
    /// A supported type with a structurally valid payload.
    Push(PushMessage),
    /// A well-formed envelope whose type this client does not handle.
    Unknown(String),
    /// Not an envelope, or a supported type with an invalid payload.
    Malformed(&'static str),
}

/// Parse the outer envelope without validating the payload.
pub fn parse_envelope(text: &str) -> Option<RawEnvelope> {
    serde_json::from_str(text).ok()
}

/// Narrow a raw payload to a `notification.new` shape, or reject it.
pub fn notification_payload(value: &Value) -> Option<NotificationPayload> {
    serde_json::from_value(value.clone()).ok()
}

/// Narrow a raw payload to a follow-request shape, or reject it.
pub fn follow_payload(value: &Value) -> Option<FollowPayload> {
    serde_json::from_value(value.clone()).ok()
}

/// Narrow a raw payload to an `event.rsvp.updated` shape, or reject it.
pub fn rsvp_payload(value: &Value) -> Option<RsvpPayload> {
    serde_json::from_value(value.clone()).ok()
}

/// Decode one inbound frame into a typed push message.
pub fn decode(text: &str) -> Decoded {
    let Some(envelope) = parse_envelope(text) else {
        return Decoded::Malformed("envelope");
    };
    let (Some(kind), Some(payload)) = (envelope.kind, envelope.payload) else {
        return Decoded::Malformed("envelope");
    };
    match kind.as_str() {
        "notification.new" => match notification_payload(&payload) {
            Some(p) => Decoded::Push(PushMessage::NotificationNew(p)),
            None => Decoded::Malformed("notification.new"),
        },
        "follow.request.created" | "follow.request.updated" => match follow_payload(&payload) {
            Some(p) => Decoded::Push(PushMessage::FollowRequest(p)),
            None => Decoded::Malformed("follow.request"),
        },
        "event.rsvp.updated" => match rsvp_payload(&payload) {
            Some(p) => Decoded::Push(PushMessage::EventRsvp(p)),
            None => Decoded::Malformed("event.rsvp.updated"),
        },
        _ => Decoded::Unknown(kind),
    }
}
