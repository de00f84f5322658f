//! Entity and cached-view models for the realtime social feed.
//!
//! Wire field names follow the server's JSON exactly: most are camelCase,
//! but embedded user summaries carry snake_case profile fields
//! (`given_name`, `family_name`, `profile_picture`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Closed set of notification kinds pushed by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationKind {
    // Social
    FollowReceived,
    FollowRequest,
    FollowAccepted,
    Mention,
    // Events
    EventRsvp,
    EventSaved,
    EventCheckin,
    #[serde(rename = "EVENT_REMINDER_24H")]
    EventReminder24h,
    #[serde(rename = "EVENT_REMINDER_1H")]
    EventReminder1h,
    EventUpdated,
    EventCancelled,
    EventRecommendation,
    // Organizations
    OrgInvite,
    OrgRoleChanged,
    OrgEventPublished,
    // Friend activity
    FriendRsvp,
    FriendCheckin,
    // Comments
    CommentReceived,
    CommentReply,
    CommentLiked,
    // Security
    PasswordChanged,
    NewDeviceLogin,
    AccountVerified,
}

/// Entity kinds a notification may point at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NotificationTargetType {
    User,
    Event,
    Organization,
    Comment,
}

/// Entity kinds a follow edge may target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FollowTargetType {
    User,
    Organization,
}

/// Approval state of a follow edge. `Accepted` and `Rejected` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FollowApprovalStatus {
    Pending,
    Accepted,
    Rejected,
}

/// RSVP status of an event participant. Any status may move to any other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParticipantStatus {
    Interested,
    Going,
    Waitlisted,
    Cancelled,
    CheckedIn,
}

/// Who an RSVP is visible to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParticipantVisibility {
    Public,
    Followers,
    Private,
}

/// Complete embedded user summary as it appears in cached rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActorSummary {
    pub user_id: String,
    pub username: String,
    #[serde(rename = "given_name")]
    pub given_name: String,
    #[serde(rename = "family_name")]
    pub family_name: String,
    #[serde(rename = "profile_picture")]
    pub profile_picture: Option<String>,
}

/// Possibly incomplete actor attached to a pushed notification. The wire may
/// omit any of these; rows only keep actors that arrive complete.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartialActor {
    pub user_id: Option<String>,
    pub username: Option<String>,
    #[serde(rename = "given_name")]
    pub given_name: Option<String>,
    #[serde(rename = "family_name")]
    pub family_name: Option<String>,
    #[serde(rename = "profile_picture")]
    pub profile_picture: Option<String>,
}

/// A notification as held in the cached notification pages.
///
/// Created once per triggering action; the only mutations are the
/// unread-to-read transition and deletion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub notification_id: String,
    pub recipient_user_id: String,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub actor_user_id: Option<String>,
    pub actor: Option<ActorSummary>,
    pub target_type: Option<NotificationTargetType>,
    pub target_id: Option<String>,
    pub is_read: bool,
    pub read_at: Option<DateTime<Utc>>,
    pub action_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Embedded follower summary carried on a follow edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowerSummary {
    pub user_id: String,
    pub username: String,
    pub email: String,
    #[serde(rename = "given_name")]
    pub given_name: String,
    #[serde(rename = "family_name")]
    pub family_name: String,
    #[serde(rename = "profile_picture")]
    pub profile_picture: Option<String>,
    pub bio: Option<String>,
}

/// A follow relationship as cached in the follow-request and following lists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowEdge {
    pub follow_id: String,
    pub follower_user_id: String,
    pub target_type: FollowTargetType,
    pub target_id: String,
    pub approval_status: FollowApprovalStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub follower: FollowerSummary,
}

/// Participant row in a per-event participant list. Carries the RSVP
/// timestamp and the embedded user, but not the cancellation timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantRow {
    pub participant_id: String,
    pub event_id: String,
    pub user_id: String,
    pub status: ParticipantStatus,
    pub quantity: Option<u32>,
    pub shared_visibility: Option<ParticipantVisibility>,
    pub rsvp_at: Option<DateTime<Utc>>,
    pub user: ActorSummary,
}

/// The local user's own RSVP for one event. No embedded user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MyRsvpStatusRow {
    pub participant_id: String,
    pub event_id: String,
    pub user_id: String,
    pub status: ParticipantStatus,
    pub quantity: Option<u32>,
    pub shared_visibility: Option<ParticipantVisibility>,
    pub rsvp_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
}

/// Compact event summary embedded in "my RSVPs" rows. Realtime payloads
/// never carry it; it is only available from an initial fetch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventSummary {
    pub event_id: String,
    pub title: String,
    pub start_at: Option<DateTime<Utc>>,
}

/// Row in the "my RSVPs" lists: participant data plus the embedded event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MyRsvpRow {
    pub participant_id: String,
    pub event_id: String,
    pub user_id: String,
    pub status: ParticipantStatus,
    pub quantity: Option<u32>,
    pub shared_visibility: Option<ParticipantVisibility>,
    pub rsvp_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub user: ActorSummary,
    pub event: Option<EventSummary>,
}

/// Embedded user inside an event detail/listing participant sub-row. Extends
/// the plain summary with a visibility default only the full fetch supplies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventActor {
    pub user_id: String,
    pub username: String,
    #[serde(rename = "given_name")]
    pub given_name: String,
    #[serde(rename = "family_name")]
    pub family_name: String,
    #[serde(rename = "profile_picture")]
    pub profile_picture: Option<String>,
    pub default_visibility: Option<ParticipantVisibility>,
}

/// Participant sub-row embedded in an event detail or listing entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventParticipantRow {
    pub participant_id: String,
    pub event_id: String,
    pub user_id: String,
    pub status: ParticipantStatus,
    pub quantity: Option<u32>,
    pub shared_visibility: Option<ParticipantVisibility>,
    pub user: EventActor,
}

/// The local user's RSVP summary on an event detail/listing entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MyRsvpSummary {
    pub participant_id: String,
    pub status: ParticipantStatus,
    pub quantity: Option<u32>,
}

/// One cached event detail or listing entry with its participant sub-list.
/// `rsvp_count` is the server's derived counter, overwritten on every push.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventEntry {
    pub event_id: String,
    pub title: String,
    pub rsvp_count: u64,
    pub participants: Vec<EventParticipantRow>,
    pub my_rsvp: Option<MyRsvpSummary>,
}

/// One cached page of notifications with its embedded unread counter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationPage {
    pub items: Vec<Notification>,
    pub unread_count: u64,
}
