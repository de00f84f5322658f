//! The keyed store of named cached query results.
//!
//! Each field of [`CacheState`] is one independently-fetched query result a
//! client would hold; the same entity may be mirrored into several of them at
//! once. `None` (or an absent map key, for notification pages and event
//! entries) means that query was never populated, and a push never invents
//! a view that was not fetched first. The per-query patch methods here are
//! the low-level mutations; `reconcile` decides which of them one push fans
//! out to.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::model::{
    EventEntry, FollowApprovalStatus, FollowEdge, FollowTargetType, MyRsvpRow, MyRsvpStatusRow,
    Notification, NotificationPage, ParticipantRow,
};

/// All cached query results, keyed by name (struct field) and, for per-event
/// views, by event id.
#[derive(Debug, Default)]
pub struct CacheState {
    /// Authoritative unread notification counter.
    pub unread_count: Option<u64>,
    /// The "all notifications" page.
    pub notifications_all: Option<NotificationPage>,
    /// The unread-only notifications page.
    pub notifications_unread: Option<NotificationPage>,
    /// Follow requests targeting the local user, newest update first.
    pub follow_requests: Option<Vec<FollowEdge>>,
    /// Edges where the local user is the follower.
    pub following: Option<Vec<FollowEdge>>,
    /// Per-event participant lists.
    pub event_participants: HashMap<String, Vec<ParticipantRow>>,
    /// Per-event "my RSVP status" rows for the local user.
    pub my_rsvp_status: HashMap<String, MyRsvpStatusRow>,
    /// "My RSVPs" including cancelled rows.
    pub my_rsvps_all: Option<Vec<MyRsvpRow>>,
    /// "My RSVPs" excluding cancelled rows.
    pub my_rsvps_active: Option<Vec<MyRsvpRow>>,
    /// Per-event detail entries with embedded participant sub-lists.
    pub event_details: HashMap<String, EventEntry>,
    /// The event listing, entries in fetch order.
    pub event_listing: Option<Vec<EventEntry>>,
}

impl CacheState {
    /// A cache where every global list is populated but empty, as after an
    /// initial fetch against a fresh account. Per-event views stay unpopulated.
    pub fn bootstrapped() -> Self {
        Self {
            unread_count: Some(0),
            notifications_all: Some(NotificationPage::default()),
            notifications_unread: Some(NotificationPage::default()),
            follow_requests: Some(Vec::new()),
            following: Some(Vec::new()),
            my_rsvps_all: Some(Vec::new()),
            my_rsvps_active: Some(Vec::new()),
            event_listing: Some(Vec::new()),
            ..Self::default()
        }
    }

    /// Overwrite the authoritative unread counter.
    pub fn set_unread_count(&mut self, count: u64) {
        self.unread_count = Some(count);
    }

    /// Prepend a notification into one populated page if its id is not
    /// already present, then write the authoritative unread counter into the
    /// page. The list is capped at the larger of its current size and the
    /// page limit so a prepend never grows a page past what a fetch returns.
    pub fn patch_notification_page(
        &mut self,
        unread_only: bool,
        notification: &Notification,
        unread_count: u64,
        page_limit: usize,
    ) {
        let page = if unread_only {
            &mut self.notifications_unread
        } else {
            &mut self.notifications_all
        };
        let Some(page) = page.as_mut() else {
            return;
        };
        let already_present = page
            .items
            .iter()
            .any(|item| item.notification_id == notification.notification_id);
        if !already_present && (!unread_only || !notification.is_read) {
            let max_items = page.items.len().max(page_limit);
            page.items.insert(0, notification.clone());
            page.items.truncate(max_items);
        }
        page.unread_count = unread_count;
    }

    /// Upsert an edge by follow id into the follow-request list, keeping the
    /// list sorted by update time descending.
    pub fn upsert_follow_request(&mut self, edge: FollowEdge) {
        let Some(requests) = self.follow_requests.as_mut() else {
            return;
        };
        match requests
            .iter_mut()
            .find(|existing| existing.follow_id == edge.follow_id)
        {
            Some(existing) => *existing = edge,
            None => requests.insert(0, edge),
        }
        requests.sort_by(|left, right| right.updated_at.cmp(&left.updated_at));
    }

    /// Flip pending "following" edges targeting `target_user_id` to Accepted.
    pub fn accept_pending_follows_of(&mut self, target_user_id: &str) {
        let Some(following) = self.following.as_mut() else {
            return;
        };
        for edge in following.iter_mut() {
            if edge.target_type == FollowTargetType::User
                && edge.target_id == target_user_id
                && edge.approval_status == FollowApprovalStatus::Pending
            {
                edge.approval_status = FollowApprovalStatus::Accepted;
            }
        }
    }

    /// Patch the approval status of the matching "following" edge, located by
    /// follow id or by (follower, target type, target id). Returns whether a
    /// match was found; the caller degrades to a refetch when none was.
    pub fn patch_following_status(&mut self, edge: &FollowEdge) -> bool {
        let Some(following) = self.following.as_mut() else {
            // An unpopulated cache has nothing to go stale; nothing to patch.
            return true;
        };
        let mut matched = false;
        for existing in following.iter_mut() {
            let matches = existing.follow_id == edge.follow_id
                || (existing.follower_user_id == edge.follower_user_id
                    && existing.target_type == edge.target_type
                    && existing.target_id == edge.target_id);
            if matches {
                existing.approval_status = edge.approval_status;
                matched = true;
            }
        }
        matched
    }

    /// Upsert a row by participant id into the event's participant list,
    /// prepending when new. This proceeds even when the event was never
    /// fetched; a bare participant list is valid without event context.
    pub fn upsert_event_participant(&mut self, row: ParticipantRow) {
        let list = self.event_participants.entry(row.event_id.clone()).or_default();
        match list
            .iter_mut()
            .find(|existing| existing.participant_id == row.participant_id)
        {
            Some(existing) => *existing = row,
            None => list.insert(0, row),
        }
    }

    /// Overwrite the local user's RSVP status row for one event.
    pub fn set_my_rsvp_status(&mut self, row: MyRsvpStatusRow) {
        self.my_rsvp_status.insert(row.event_id.clone(), row);
    }

    /// The "my RSVPs" variant for the given cancelled-row policy, if populated.
    pub fn my_rsvps_mut(&mut self, include_cancelled: bool) -> Option<&mut Vec<MyRsvpRow>> {
        if include_cancelled {
            self.my_rsvps_all.as_mut()
        } else {
            self.my_rsvps_active.as_mut()
        }
    }

    /// Read-only access to a "my RSVPs" variant.
    pub fn my_rsvps(&self, include_cancelled: bool) -> Option<&Vec<MyRsvpRow>> {
        if include_cancelled {
            self.my_rsvps_all.as_ref()
        } else {
            self.my_rsvps_active.as_ref()
        }
    }

    /// Apply `patch` to every populated event detail and listing entry with
    /// the given event id.
    pub fn patch_event_entries<F>(&mut self, event_id: &str, mut patch: F)
    where
        F: FnMut(&mut EventEntry),
    {
        if let Some(entry) = self.event_details.get_mut(event_id) {
            patch(entry);
        }
        if let Some(listing) = self.event_listing.as_mut() {
            for entry in listing.iter_mut().filter(|e| e.event_id == event_id) {
                patch(entry);
            }
        }
    }

    /// Replace the following list wholesale, as after a refetch.
    pub fn populate_following(&mut self, edges: Vec<FollowEdge>) {
        self.following = Some(edges);
    }

    /// Replace both "my RSVPs" variants wholesale, as after a refetch.
    /// The active variant is derived by dropping cancelled rows.
    pub fn populate_my_rsvps(&mut self, rows: Vec<MyRsvpRow>) {
        use crate::model::ParticipantStatus;
        self.my_rsvps_active = Some(
            rows.iter()
                .filter(|row| row.status != ParticipantStatus::Cancelled)
                .cloned()
                .collect(),
        );
        self.my_rsvps_all = Some(rows);
    }
}

/// Cloneable shared handle to the cache, one writer at a time.
#[derive(Debug, Clone, Default)]
pub struct CacheHandle {
    inner: Arc<RwLock<CacheState>>,
}

impl CacheHandle {
    pub fn new(state: CacheState) -> Self {
        Self {
            inner: Arc::new(RwLock::new(state)),
        }
    }

    pub async fn read(&self) -> tokio::sync::RwLockReadGuard<'_, CacheState> {
        self.inner.read().await
    }

    pub async fn write(&self) -> tokio::sync::RwLockWriteGuard<'_, CacheState> {
        self.inner.write().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        ActorSummary, FollowerSummary, NotificationKind, ParticipantStatus,
    };
    use chrono::{DateTime, TimeZone, Utc};

    fn ts(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, 1, hour, 0, 0).unwrap()
    }

    fn edge(follow_id: &str, updated_hour: u32) -> FollowEdge {
        FollowEdge {
            follow_id: follow_id.into(),
            follower_user_id: "u2".into(),
            target_type: FollowTargetType::User,
            target_id: "u1".into(),
            approval_status: FollowApprovalStatus::Pending,
            created_at: ts(0),
            updated_at: ts(updated_hour),
            follower: FollowerSummary {
                user_id: "u2".into(),
                username: "ada".into(),
                email: "ada@example.com".into(),
                given_name: "Ada".into(),
                family_name: "Lovelace".into(),
                profile_picture: None,
                bio: None,
            },
        }
    }

    fn notification(id: &str, is_read: bool) -> Notification {
        Notification {
            notification_id: id.into(),
            recipient_user_id: "u1".into(),
            kind: NotificationKind::Mention,
            title: "t".into(),
            message: "m".into(),
            actor_user_id: None,
            actor: None,
            target_type: None,
            target_id: None,
            is_read,
            read_at: None,
            action_url: None,
            created_at: ts(1),
        }
    }

    #[test]
    fn unpopulated_pages_are_never_invented() {
        let mut cache = CacheState::default();
        cache.patch_notification_page(false, &notification("n1", false), 1, 20);
        assert!(cache.notifications_all.is_none());
        cache.upsert_follow_request(edge("f1", 1));
        assert!(cache.follow_requests.is_none());
    }

    #[test]
    fn notification_prepend_dedupes_and_caps() {
        let mut cache = CacheState::bootstrapped();
        for i in 0..25 {
            cache.patch_notification_page(false, &notification(&format!("n{i}"), false), i + 1, 20);
        }
        let page = cache.notifications_all.as_ref().unwrap();
        assert_eq!(page.items.len(), 20);
        assert_eq!(page.items[0].notification_id, "n24");
        assert_eq!(page.unread_count, 25);

        // Re-applying an id already present changes nothing but the counter.
        cache.patch_notification_page(false, &notification("n24", false), 30, 20);
        let page = cache.notifications_all.as_ref().unwrap();
        assert_eq!(page.items.len(), 20);
        assert_eq!(page.unread_count, 30);
    }

    #[test]
    fn read_notification_skips_unread_only_page() {
        let mut cache = CacheState::bootstrapped();
        cache.patch_notification_page(true, &notification("n1", true), 0, 20);
        let page = cache.notifications_unread.as_ref().unwrap();
        assert!(page.items.is_empty());
        assert_eq!(page.unread_count, 0);
    }

    #[test]
    fn follow_requests_resort_by_update_time() {
        let mut cache = CacheState::bootstrapped();
        cache.upsert_follow_request(edge("f1", 3));
        cache.upsert_follow_request(edge("f2", 5));
        cache.upsert_follow_request(edge("f3", 4));
        let ids: Vec<_> = cache
            .follow_requests
            .as_ref()
            .unwrap()
            .iter()
            .map(|e| e.follow_id.clone())
            .collect();
        assert_eq!(ids, ["f2", "f3", "f1"]);

        // An upsert of an existing id replaces in place and re-sorts.
        cache.upsert_follow_request(edge("f1", 9));
        let first = &cache.follow_requests.as_ref().unwrap()[0];
        assert_eq!(first.follow_id, "f1");
        assert_eq!(cache.follow_requests.as_ref().unwrap().len(), 3);
    }

    #[test]
    fn following_patch_reports_misses() {
        let mut cache = CacheState::bootstrapped();
        cache.populate_following(vec![edge("f1", 1)]);
        let mut accepted = edge("f1", 2);
        accepted.approval_status = FollowApprovalStatus::Accepted;
        assert!(cache.patch_following_status(&accepted));
        assert_eq!(
            cache.following.as_ref().unwrap()[0].approval_status,
            FollowApprovalStatus::Accepted
        );

        let mut unknown = edge("f9", 2);
        unknown.target_id = "someone-else".into();
        assert!(!cache.patch_following_status(&unknown));
    }

    #[test]
    fn participant_upsert_creates_list_without_event_context() {
        let mut cache = CacheState::default();
        let row = ParticipantRow {
            participant_id: "p1".into(),
            event_id: "e1".into(),
            user_id: "u1".into(),
            status: ParticipantStatus::Going,
            quantity: None,
            shared_visibility: None,
            rsvp_at: None,
            user: ActorSummary {
                user_id: "u1".into(),
                username: "ada".into(),
                given_name: "Ada".into(),
                family_name: "Lovelace".into(),
                profile_picture: None,
            },
        };
        cache.upsert_event_participant(row.clone());
        cache.upsert_event_participant(ParticipantRow {
            status: ParticipantStatus::Cancelled,
            ..row
        });
        let list = cache.event_participants.get("e1").unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].status, ParticipantStatus::Cancelled);
    }
}
