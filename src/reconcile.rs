//! Fan-out of one validated push into every cached query result it can touch.
//!
//! Application is idempotent (re-applying a payload is a no-op beyond the
//! first) and order-tolerant (last write wins per entity; the server owns the
//! content of every push). A merge that lacks the context to build a valid
//! row never invents one: it reports a refetch target for that single cache
//! and leaves everything else intact.

use crate::cache::CacheState;
use crate::model::{MyRsvpSummary, NotificationKind, ParticipantStatus};
use crate::normalize;
use crate::protocol::{FollowPayload, NotificationPayload, PushMessage, RsvpPayload};

/// A cached query scheduled for wholesale replacement because a merge could
/// not complete against it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RefetchTarget {
    Following,
    MyRsvps,
}

/// Applies pushes for one authenticated user against the shared cache.
#[derive(Debug, Clone)]
pub struct Reconciler {
    user_id: String,
    page_limit: usize,
}

impl Reconciler {
    pub fn new(user_id: impl Into<String>, page_limit: usize) -> Self {
        Self {
            user_id: user_id.into(),
            page_limit,
        }
    }

    /// Merge one push into every affected cached view, returning the caches
    /// that need a refetch instead of a partial merge.
    pub fn apply(&self, cache: &mut CacheState, message: &PushMessage) -> Vec<RefetchTarget> {
        match message {
            PushMessage::NotificationNew(payload) => {
                self.apply_notification(cache, payload);
                Vec::new()
            }
            PushMessage::FollowRequest(payload) => self.apply_follow(cache, payload),
            PushMessage::EventRsvp(payload) => self.apply_rsvp(cache, payload),
        }
    }

    /// Unread count is written as pushed, never recomputed locally. The
    /// notification is prepended into each populated page it belongs in, and
    /// a FOLLOW_ACCEPTED kind doubles as the only signal that a pending
    /// outgoing follow was approved.
    fn apply_notification(&self, cache: &mut CacheState, payload: &NotificationPayload) {
        let row = normalize::notification_row(&payload.notification);
        cache.set_unread_count(payload.unread_count);
        cache.patch_notification_page(false, &row, payload.unread_count, self.page_limit);
        cache.patch_notification_page(true, &row, payload.unread_count, self.page_limit);

        if row.kind == NotificationKind::FollowAccepted {
            if let Some(actor_user_id) = row.actor_user_id.as_deref() {
                cache.accept_pending_follows_of(actor_user_id);
            }
        }
    }

    fn apply_follow(&self, cache: &mut CacheState, payload: &FollowPayload) -> Vec<RefetchTarget> {
        let edge = &payload.follow;

        // Incoming request: only edges aimed at the local user belong in the
        // follow-request list.
        if edge.target_type == crate::model::FollowTargetType::User
            && edge.target_id == self.user_id
        {
            cache.upsert_follow_request(edge.clone());
        }

        // Outgoing edge: patch only the approval status of the matching
        // "following" row. A miss means the cache holds a view this edge
        // should appear in but cannot be built from the push alone.
        if edge.follower_user_id == self.user_id && !cache.patch_following_status(edge) {
            return vec![RefetchTarget::Following];
        }
        Vec::new()
    }

    fn apply_rsvp(&self, cache: &mut CacheState, payload: &RsvpPayload) -> Vec<RefetchTarget> {
        let participant = &payload.participant;
        let mut refetch_my_rsvps = false;

        // The participant list proceeds without any event context.
        cache.upsert_event_participant(normalize::participant_row(participant));

        if participant.user_id == self.user_id {
            cache.set_my_rsvp_status(normalize::my_rsvp_status_row(participant));

            for include_cancelled in [false, true] {
                let Some(list) = cache.my_rsvps_mut(include_cancelled) else {
                    refetch_my_rsvps = true;
                    continue;
                };
                let position = list
                    .iter()
                    .position(|row| row.participant_id == participant.participant_id);
                let remove =
                    !include_cancelled && participant.status == ParticipantStatus::Cancelled;
                if remove {
                    list.retain(|row| row.participant_id != participant.participant_id);
                    continue;
                }
                let row = normalize::my_rsvp_row(
                    participant,
                    position.map(|index| &list[index]),
                );
                match position {
                    Some(index) => list[index] = row,
                    None => {
                        // A fresh row needs the embedded event the push does
                        // not carry; without it, leave the list alone.
                        if row.event.is_none() {
                            refetch_my_rsvps = true;
                        } else {
                            list.insert(0, row);
                        }
                    }
                }
            }
        }

        // Every populated event detail/listing entry for this event gets the
        // new sub-row and the authoritative aggregate.
        let local_user = participant.user_id == self.user_id;
        cache.patch_event_entries(&participant.event_id, |entry| {
            let existing = entry
                .participants
                .iter()
                .find(|row| row.participant_id == participant.participant_id);
            let row = normalize::event_participant_row(participant, existing);
            match entry
                .participants
                .iter()
                .position(|r| r.participant_id == participant.participant_id)
            {
                Some(index) => entry.participants[index] = row,
                None => entry.participants.insert(0, row),
            }
            entry.rsvp_count = payload.rsvp_count;
            if local_user {
                entry.my_rsvp = Some(MyRsvpSummary {
                    participant_id: participant.participant_id.clone(),
                    status: participant.status,
                    quantity: participant.quantity,
                });
            }
        });

        // Cancellations need no replacement row, so a missed merge is not
        // worth a refetch.
        if refetch_my_rsvps && participant.status != ParticipantStatus::Cancelled {
            vec![RefetchTarget::MyRsvps]
        } else {
            Vec::new()
        }
    }
}
