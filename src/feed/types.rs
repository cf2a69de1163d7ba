// src/feed/types.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Event type as reported by the remote feed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    Push,
    Create,
    Delete,
    Fork,
    Watch,
    Issues,
    IssueComment,
    PullRequest,
    PullRequestReview,
    PullRequestReviewComment,
    CommitComment,
    Release,
    Member,
    Public,
    Gollum,
    Other(String),
}

impl EventKind {
    /// Map a remote type tag (`"PushEvent"`, `"Push"`) to a kind. Never fails.
    pub fn from_tag(tag: &str) -> Self {
        let t = tag.trim();
        let base = t.strip_suffix("Event").unwrap_or(t);
        match base {
            "Push" => EventKind::Push,
            "Create" => EventKind::Create,
            "Delete" => EventKind::Delete,
            "Fork" => EventKind::Fork,
            "Watch" => EventKind::Watch,
            "Issues" => EventKind::Issues,
            "IssueComment" => EventKind::IssueComment,
            "PullRequest" => EventKind::PullRequest,
            "PullRequestReview" => EventKind::PullRequestReview,
            "PullRequestReviewComment" => EventKind::PullRequestReviewComment,
            "CommitComment" => EventKind::CommitComment,
            "Release" => EventKind::Release,
            "Member" => EventKind::Member,
            "Public" => EventKind::Public,
            "Gollum" => EventKind::Gollum,
            _ => EventKind::Other(t.to_string()),
        }
    }

    fn verb(&self) -> &str {
        match self {
            EventKind::Push => "pushed to",
            EventKind::Create => "created",
            EventKind::Delete => "deleted a ref in",
            EventKind::Fork => "forked",
            EventKind::Watch => "starred",
            EventKind::Issues => "updated an issue in",
            EventKind::IssueComment => "commented on an issue in",
            EventKind::PullRequest => "updated a pull request in",
            EventKind::PullRequestReview => "reviewed a pull request in",
            EventKind::PullRequestReviewComment => "commented on a pull request in",
            EventKind::CommitComment => "commented on a commit in",
            EventKind::Release => "published a release of",
            EventKind::Member => "changed members of",
            EventKind::Public => "open sourced",
            EventKind::Gollum => "edited the wiki of",
            EventKind::Other(_) => "acted on",
        }
    }
}

/// One immutable feed entry. Two records with the same `id` are the same event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub id: String,
    pub occurred_at: DateTime<Utc>,
    pub actor: String,
    pub kind: EventKind,
    #[serde(default)]
    pub repo: Option<String>,
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl EventRecord {
    /// One-line description, e.g. "alice pushed to acme/widgets".
    pub fn summary(&self) -> String {
        match &self.repo {
            Some(repo) => format!("{} {} {}", self.actor, self.kind.verb(), repo),
            None => match &self.kind {
                EventKind::Other(tag) => format!("{} {}", self.actor, tag),
                kind => format!("{} {:?}", self.actor, kind),
            },
        }
    }
}

/// Newest-first, id-unique view of the feed as of one successful fetch.
/// (De)serializes as a plain event array; decoding goes through `from_records`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<EventRecord>", into = "Vec<EventRecord>")]
pub struct FeedSnapshot {
    events: Vec<EventRecord>,
}

impl FeedSnapshot {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Sort newest first (ties by id, descending) and drop repeated ids.
    /// The first occurrence in newest-first order is kept.
    pub fn from_records(mut records: Vec<EventRecord>) -> Self {
        records.sort_by(|a, b| {
            b.occurred_at
                .cmp(&a.occurred_at)
                .then_with(|| b.id.cmp(&a.id))
        });

        let mut seen: HashSet<String> = HashSet::with_capacity(records.len());
        records.retain(|r| seen.insert(r.id.clone()));

        Self { events: records }
    }

    /// Union of both snapshots; on an id clash the record from `other` wins.
    pub fn merge(&self, other: &FeedSnapshot) -> FeedSnapshot {
        let incoming: HashSet<&str> = other.events.iter().map(|e| e.id.as_str()).collect();
        let mut all: Vec<EventRecord> = other.events.clone();
        all.extend(
            self.events
                .iter()
                .filter(|e| !incoming.contains(e.id.as_str()))
                .cloned(),
        );
        FeedSnapshot::from_records(all)
    }

    /// Events that occurred strictly after `ts`, still newest first.
    pub fn newer_than(&self, ts: DateTime<Utc>) -> Vec<&EventRecord> {
        self.events
            .iter()
            .take_while(|e| e.occurred_at > ts)
            .collect()
    }

    pub fn events(&self) -> &[EventRecord] {
        &self.events
    }

    pub fn iter(&self) -> std::slice::Iter<'_, EventRecord> {
        self.events.iter()
    }

    pub fn newest(&self) -> Option<&EventRecord> {
        self.events.first()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.events.iter().any(|e| e.id == id)
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

impl From<Vec<EventRecord>> for FeedSnapshot {
    fn from(records: Vec<EventRecord>) -> Self {
        FeedSnapshot::from_records(records)
    }
}

impl From<FeedSnapshot> for Vec<EventRecord> {
    fn from(snapshot: FeedSnapshot) -> Self {
        snapshot.events
    }
}

impl<'a> IntoIterator for &'a FeedSnapshot {
    type Item = &'a EventRecord;
    type IntoIter = std::slice::Iter<'a, EventRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.events.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn ev(id: &str, secs: i64, actor: &str) -> EventRecord {
        EventRecord {
            id: id.into(),
            occurred_at: Utc.with_ymd_and_hms(2025, 9, 6, 9, 0, 0).unwrap()
                + Duration::seconds(secs),
            actor: actor.into(),
            kind: EventKind::Push,
            repo: Some("acme/widgets".into()),
            payload: serde_json::Value::Null,
        }
    }

    #[test]
    fn from_records_orders_newest_first_and_dedups() {
        let snap = FeedSnapshot::from_records(vec![
            ev("1", 10, "old"),
            ev("3", 30, "newest"),
            ev("2", 20, "mid"),
            ev("3", 5, "stale copy"),
        ]);
        let ids: Vec<&str> = snap.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["3", "2", "1"]);
        assert_eq!(snap.newest().unwrap().actor, "newest");
    }

    #[test]
    fn equal_timestamps_are_ordered_by_id() {
        let snap = FeedSnapshot::from_records(vec![ev("a", 0, "x"), ev("b", 0, "y")]);
        assert_eq!(snap.events()[0].id, "b");
        assert_eq!(snap.events()[1].id, "a");
    }

    #[test]
    fn merge_prefers_incoming_records() {
        let old = FeedSnapshot::from_records(vec![ev("1", 10, "before"), ev("2", 20, "keep")]);
        let new = FeedSnapshot::from_records(vec![ev("1", 10, "after"), ev("4", 40, "fresh")]);
        let merged = old.merge(&new);
        assert_eq!(merged.len(), 3);
        let one = merged.iter().find(|e| e.id == "1").unwrap();
        assert_eq!(one.actor, "after");
        assert_eq!(merged.newest().unwrap().id, "4");
    }

    #[test]
    fn newer_than_is_strict() {
        let snap = FeedSnapshot::from_records(vec![ev("1", 10, "a"), ev("2", 20, "b")]);
        let cut = snap.events()[1].occurred_at;
        let newer = snap.newer_than(cut);
        assert_eq!(newer.len(), 1);
        assert_eq!(newer[0].id, "2");
    }

    #[test]
    fn deserialize_restores_order_and_uniqueness() {
        let raw = serde_json::to_string(&vec![
            ev("1", 10, "old"),
            ev("2", 20, "new"),
            ev("1", 10, "old again"),
        ])
        .unwrap();
        let snap: FeedSnapshot = serde_json::from_str(&raw).unwrap();
        let ids: Vec<&str> = snap.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["2", "1"]);

        let back = serde_json::to_value(&snap).unwrap();
        assert!(back.is_array());
        assert_eq!(back.as_array().unwrap().len(), 2);
    }

    #[test]
    fn kind_from_tag_handles_suffix_and_unknowns() {
        assert_eq!(EventKind::from_tag("PushEvent"), EventKind::Push);
        assert_eq!(EventKind::from_tag("IssueComment"), EventKind::IssueComment);
        assert_eq!(
            EventKind::from_tag("SponsorshipEvent"),
            EventKind::Other("SponsorshipEvent".into())
        );
    }

    #[test]
    fn summary_names_actor_and_repo() {
        assert_eq!(ev("1", 0, "alice").summary(), "alice pushed to acme/widgets");
    }
}
