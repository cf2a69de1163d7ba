// tests/providers_github.rs
use activity_feed::feed::providers::github::GithubEventsProvider;
use activity_feed::{EventKind, FeedSource};

#[tokio::test]
async fn github_fixture_is_ordered_and_deduplicated() {
    let json: &str = include_str!("fixtures/github_events.json");
    let p = GithubEventsProvider::from_fixture(json);
    let snap = p.fetch().await.expect("fixture parses");

    let ids: Vec<&str> = snap.iter().map(|e| e.id.as_str()).collect();
    assert_eq!(
        ids,
        vec!["30000000003", "30000000002", "30000000001", "30000000004"]
    );

    let newest = snap.newest().unwrap();
    assert_eq!(newest.kind, EventKind::PullRequest);
    assert_eq!(newest.summary(), "hubot updated a pull request in github/linguist");

    let last = &snap.events()[3];
    assert_eq!(last.kind, EventKind::Other("SponsorshipEvent".into()));
    assert_eq!(last.repo, None);
    assert_eq!(last.summary(), "sponsor SponsorshipEvent");
}
