//! Conversion of validated wire payloads into the exact shapes each cached
//! view merges.
//!
//! One RSVP push feeds four different cached shapes, each with its own field
//! subset. Where a cached row already carries data the wire never sends (the
//! embedded event on a "my RSVPs" row, an embedded user's visibility default),
//! the normalizer carries the existing enrichment forward instead of
//! overwriting it with nothing.

use crate::model::{
    ActorSummary, EventActor, EventParticipantRow, MyRsvpRow, MyRsvpStatusRow, Notification,
    PartialActor, ParticipantRow,
};
use crate::protocol::{WireNotification, WireParticipant};

/// Keep a pushed actor only if it arrived complete; a partial actor is
/// dropped to `None` while the bare actor id on the notification is kept.
fn complete_actor(actor: Option<&PartialActor>) -> Option<ActorSummary> {
    let actor = actor?;
    Some(ActorSummary {
        user_id: actor.user_id.clone()?,
        username: actor.username.clone()?,
        given_name: actor.given_name.clone()?,
        family_name: actor.family_name.clone()?,
        profile_picture: actor.profile_picture.clone(),
    })
}

/// Shape a pushed notification for the cached notification pages.
pub fn notification_row(wire: &WireNotification) -> Notification {
    Notification {
        notification_id: wire.notification_id.clone(),
        recipient_user_id: wire.recipient_user_id.clone(),
        kind: wire.kind,
        title: wire.title.clone(),
        message: wire.message.clone(),
        actor_user_id: wire.actor_user_id.clone(),
        actor: complete_actor(wire.actor.as_ref()),
        target_type: wire.target_type,
        target_id: wire.target_id.clone(),
        is_read: wire.is_read,
        read_at: wire.read_at,
        action_url: wire.action_url.clone(),
        created_at: wire.created_at,
    }
}

/// Shape a pushed participant for a per-event participant list.
pub fn participant_row(wire: &WireParticipant) -> ParticipantRow {
    ParticipantRow {
        participant_id: wire.participant_id.clone(),
        event_id: wire.event_id.clone(),
        user_id: wire.user_id.clone(),
        status: wire.status,
        quantity: wire.quantity,
        shared_visibility: wire.shared_visibility,
        rsvp_at: wire.rsvp_at,
        user: wire.user.clone(),
    }
}

/// Shape a pushed participant for the per-event "my RSVP status" view.
pub fn my_rsvp_status_row(wire: &WireParticipant) -> MyRsvpStatusRow {
    MyRsvpStatusRow {
        participant_id: wire.participant_id.clone(),
        event_id: wire.event_id.clone(),
        user_id: wire.user_id.clone(),
        status: wire.status,
        quantity: wire.quantity,
        shared_visibility: wire.shared_visibility,
        rsvp_at: wire.rsvp_at,
        cancelled_at: wire.cancelled_at,
    }
}

/// Shape a pushed participant for the "my RSVPs" lists. The embedded event
/// is never on the wire, so it is carried forward from the existing row;
/// a brand-new row ends up with `event: None` and the caller decides whether
/// that is usable.
pub fn my_rsvp_row(wire: &WireParticipant, existing: Option<&MyRsvpRow>) -> MyRsvpRow {
    MyRsvpRow {
        participant_id: wire.participant_id.clone(),
        event_id: wire.event_id.clone(),
        user_id: wire.user_id.clone(),
        status: wire.status,
        quantity: wire.quantity,
        shared_visibility: wire.shared_visibility,
        rsvp_at: wire.rsvp_at,
        cancelled_at: wire.cancelled_at,
        user: wire.user.clone(),
        event: existing.and_then(|row| row.event.clone()),
    }
}

/// Shape a pushed participant for an event detail/listing sub-row, carrying
/// forward the existing sub-row's visibility default.
pub fn event_participant_row(
    wire: &WireParticipant,
    existing: Option<&EventParticipantRow>,
) -> EventParticipantRow {
    EventParticipantRow {
        participant_id: wire.participant_id.clone(),
        event_id: wire.event_id.clone(),
        user_id: wire.user_id.clone(),
        status: wire.status,
        quantity: wire.quantity,
        shared_visibility: wire.shared_visibility,
        user: EventActor {
            user_id: wire.user.user_id.clone(),
            username: wire.user.username.clone(),
            given_name: wire.user.given_name.clone(),
            family_name: wire.user.family_name.clone(),
            profile_picture: wire.user.profile_picture.clone(),
            default_visibility: existing.and_then(|row| row.user.default_visibility),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{EventSummary, NotificationKind, ParticipantStatus, ParticipantVisibility};
    use chrono::{TimeZone, Utc};

    fn wire_participant() -> WireParticipant {
        WireParticipant {
            participant_id: "p1".into(),
            event_id: "e1".into(),
            user_id: "u1".into(),
            status: ParticipantStatus::Going,
            quantity: Some(2),
            shared_visibility: Some(ParticipantVisibility::Public),
            rsvp_at: Some(Utc.with_ymd_and_hms(2026, 8, 1, 10, 0, 0).unwrap()),
            cancelled_at: None,
            checked_in_at: None,
            user: ActorSummary {
                user_id: "u1".into(),
                username: "ada".into(),
                given_name: "Ada".into(),
                family_name: "Lovelace".into(),
                profile_picture: None,
            },
        }
    }

    fn wire_notification(actor: Option<PartialActor>) -> WireNotification {
        WireNotification {
            notification_id: "n1".into(),
            recipient_user_id: "u1".into(),
            kind: NotificationKind::FollowReceived,
            title: "New follower".into(),
            message: "ada followed you".into(),
            actor_user_id: Some("u2".into()),
            actor,
            target_type: None,
            target_id: None,
            is_read: false,
            read_at: None,
            action_url: None,
            created_at: Utc.with_ymd_and_hms(2026, 8, 1, 10, 0, 0).unwrap(),
        }
    }

    #[test]
    fn complete_actor_is_kept() {
        let wire = wire_notification(Some(PartialActor {
            user_id: Some("u2".into()),
            username: Some("ada".into()),
            given_name: Some("Ada".into()),
            family_name: Some("Lovelace".into()),
            profile_picture: Some("pic.png".into()),
        }));
        let row = notification_row(&wire);
        let actor = row.actor.expect("complete actor kept");
        assert_eq!(actor.username, "ada");
        assert_eq!(actor.profile_picture.as_deref(), Some("pic.png"));
    }

    #[test]
    fn partial_actor_is_dropped_but_actor_id_kept() {
        let wire = wire_notification(Some(PartialActor {
            user_id: Some("u2".into()),
            username: Some("ada".into()),
            ..Default::default()
        }));
        let row = notification_row(&wire);
        assert!(row.actor.is_none());
        assert_eq!(row.actor_user_id.as_deref(), Some("u2"));
    }

    #[test]
    fn participant_list_shape_drops_cancellation_timestamp() {
        let mut wire = wire_participant();
        wire.cancelled_at = Some(Utc.with_ymd_and_hms(2026, 8, 2, 9, 0, 0).unwrap());
        let row = participant_row(&wire);
        assert_eq!(row.participant_id, "p1");
        assert!(row.rsvp_at.is_some());
        // The participant-list shape has no cancelled_at field at all; the
        // my-status shape is the one that keeps it.
        assert_eq!(my_rsvp_status_row(&wire).cancelled_at, wire.cancelled_at);
    }

    #[test]
    fn my_rsvp_row_carries_existing_event_forward() {
        let wire = wire_participant();
        let existing = MyRsvpRow {
            event: Some(EventSummary {
                event_id: "e1".into(),
                title: "Rust meetup".into(),
                start_at: None,
            }),
            status: ParticipantStatus::Interested,
            ..my_rsvp_row(&wire, None)
        };
        let row = my_rsvp_row(&wire, Some(&existing));
        assert_eq!(row.status, ParticipantStatus::Going);
        assert_eq!(row.event.unwrap().title, "Rust meetup");

        let fresh = my_rsvp_row(&wire, None);
        assert!(fresh.event.is_none());
    }

    #[test]
    fn event_sub_row_carries_visibility_default_forward() {
        let wire = wire_participant();
        let mut existing = event_participant_row(&wire, None);
        existing.user.default_visibility = Some(ParticipantVisibility::Followers);
        let row = event_participant_row(&wire, Some(&existing));
        assert_eq!(
            row.user.default_visibility,
            Some(ParticipantVisibility::Followers)
        );
        assert!(event_participant_row(&wire, None)
            .user
            .default_visibility
            .is_none());
    }
}
