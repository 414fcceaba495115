mod common;

use std::time::Duration;

use chrono::{DateTime, Utc};
use lynx::feed::RefreshOutcome;
use lynx::models::{NewFeed, RecordId};
use tokio_test::{assert_err, assert_ok};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, ResponseTemplate};

use common::{article_html, harness, rss, Entry, Harness, OTHER_USER, USER};

fn rss_response(body: String) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(body, "application/rss+xml")
}

async fn insert_feed(
    h: &Harness,
    feed_path: &str,
    last_fetched_at: DateTime<Utc>,
    auto_add: bool,
) -> RecordId {
    h.app
        .repository
        .insert_feed(NewFeed {
            user_id: USER,
            feed_url: h.url(feed_path),
            name: "Test Feed".to_string(),
            description: None,
            image_url: None,
            etag: None,
            last_modified: None,
            last_fetched_at,
            auto_add_feed_items_to_library: auto_add,
        })
        .await
        .unwrap()
}

fn hours_ago(hours: i64) -> DateTime<Utc> {
    Utc::now() - chrono::Duration::hours(hours)
}

#[tokio::test]
async fn polling_twice_does_not_duplicate_items() {
    let h = harness(false).await;
    let entries = [
        Entry { guid: "a", link: h.url("/a"), pub_date: None },
        Entry { guid: "b", link: h.url("/b"), pub_date: None },
    ];
    Mock::given(method("GET"))
        .and(path("/feed.xml"))
        .respond_with(rss_response(rss(&entries)))
        .mount(&h.server)
        .await;

    let feed_id = h.app.subscribe_feed(USER, &h.url("/feed.xml"), false).await.unwrap();
    let items = h.app.repository.get_feed_items(feed_id).await.unwrap();
    assert_eq!(items.len(), 2);
    let first_fetch = h.app.repository.get_feed(feed_id).await.unwrap().unwrap().last_fetched_at.unwrap();

    tokio::time::sleep(Duration::from_millis(5)).await;
    let outcome = h.app.refresh_feeds(Some(USER), Some(feed_id)).await.unwrap();
    assert_eq!(outcome.new_items, 0);

    let items = h.app.repository.get_feed_items(feed_id).await.unwrap();
    assert_eq!(items.len(), 2);
    let feed = h.app.repository.get_feed(feed_id).await.unwrap().unwrap();
    assert!(feed.last_fetched_at.unwrap() > first_fetch);

    // Promotion checks were queued for the two new items only.
    assert_eq!(h.spawner.pending(), vec!["promote_feed_item", "promote_feed_item"]);
}

#[tokio::test]
async fn not_modified_response_keeps_validators() {
    let h = harness(false).await;
    let entries = [Entry { guid: "a", link: h.url("/a"), pub_date: None }];

    Mock::given(method("GET"))
        .and(path("/feed.xml"))
        .and(header("If-None-Match", "\"v1\""))
        .respond_with(ResponseTemplate::new(304))
        .with_priority(1)
        .expect(1)
        .mount(&h.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/feed.xml"))
        .respond_with(
            rss_response(rss(&entries))
                .insert_header("ETag", "\"v1\"")
                .insert_header("Last-Modified", "Wed, 21 Oct 2015 07:28:00 GMT"),
        )
        .expect(1)
        .mount(&h.server)
        .await;

    let feed_id = insert_feed(&h, "/feed.xml", hours_ago(2), false).await;

    let first = h.app.poller().refresh_feed(feed_id).await.unwrap();
    assert_eq!(first, RefreshOutcome::Refreshed { new_items: 1 });
    let after_first = h.app.repository.get_feed(feed_id).await.unwrap().unwrap();
    assert_eq!(after_first.etag.as_deref(), Some("\"v1\""));

    tokio::time::sleep(Duration::from_millis(5)).await;
    let second = h.app.poller().refresh_feed(feed_id).await.unwrap();
    assert_eq!(second, RefreshOutcome::NotModified);

    let after_second = h.app.repository.get_feed(feed_id).await.unwrap().unwrap();
    assert_eq!(after_second.etag.as_deref(), Some("\"v1\""));
    assert_eq!(
        after_second.last_modified.as_deref(),
        Some("Wed, 21 Oct 2015 07:28:00 GMT")
    );
    assert!(after_second.last_fetched_at > after_first.last_fetched_at);
    assert_eq!(h.app.repository.get_feed_items(feed_id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn entries_published_at_the_cutoff_are_skipped() {
    let h = harness(false).await;
    let entries = [
        Entry { guid: "before", link: h.url("/1"), pub_date: Some("Mon, 01 Jan 2024 00:00:00 GMT") },
        Entry { guid: "at", link: h.url("/2"), pub_date: Some("Tue, 02 Jan 2024 00:00:00 GMT") },
        Entry { guid: "after", link: h.url("/3"), pub_date: Some("Wed, 03 Jan 2024 00:00:00 GMT") },
        Entry { guid: "undated", link: h.url("/4"), pub_date: None },
    ];
    Mock::given(method("GET"))
        .and(path("/feed.xml"))
        .respond_with(rss_response(rss(&entries)))
        .mount(&h.server)
        .await;

    let cutoff = DateTime::parse_from_rfc3339("2024-01-02T00:00:00Z")
        .unwrap()
        .with_timezone(&Utc);
    let feed_id = insert_feed(&h, "/feed.xml", cutoff, false).await;

    let outcome = h.app.poller().refresh_feed(feed_id).await.unwrap();
    assert_eq!(outcome, RefreshOutcome::Refreshed { new_items: 2 });

    let mut guids: Vec<_> = h
        .app
        .repository
        .get_feed_items(feed_id)
        .await
        .unwrap()
        .into_iter()
        .map(|i| i.guid)
        .collect();
    guids.sort();
    assert_eq!(guids, vec!["after", "undated"]);
}

#[tokio::test]
async fn due_feed_poll_skips_fresh_feeds_and_survives_failures() {
    let h = harness(false).await;
    Mock::given(method("GET"))
        .and(path("/broken.xml"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&h.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/fresh.xml"))
        .respond_with(rss_response(rss(&[])))
        .expect(0)
        .mount(&h.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/feed.xml"))
        .respond_with(rss_response(rss(&[Entry { guid: "a", link: h.url("/a"), pub_date: None }])))
        .mount(&h.server)
        .await;

    let broken = insert_feed(&h, "/broken.xml", hours_ago(3), false).await;
    insert_feed(&h, "/fresh.xml", Utc::now(), false).await;
    let working = insert_feed(&h, "/feed.xml", hours_ago(2), false).await;

    let summary = h.app.refresh_feeds(None, None).await.unwrap();
    assert_eq!(summary.polled, 2);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.new_items, 1);

    assert_eq!(h.app.repository.get_feed_items(working).await.unwrap().len(), 1);
    let broken = h.app.repository.get_feed(broken).await.unwrap().unwrap();
    assert!(broken.last_fetched_at.unwrap() < hours_ago(1));
}

#[tokio::test]
async fn subscribing_to_a_page_follows_its_feed_link() {
    let h = harness(false).await;
    Mock::given(method("GET"))
        .and(path("/blog"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            r#"<!DOCTYPE html><html><head><link rel="alternate" type="application/rss+xml" href="/feed.xml"></head><body></body></html>"#,
            "text/html",
        ))
        .mount(&h.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/feed.xml"))
        .respond_with(rss_response(rss(&[
            Entry { guid: "old", link: h.url("/old"), pub_date: Some("Mon, 01 Jan 2024 00:00:00 GMT") },
        ])))
        .mount(&h.server)
        .await;

    let feed_id = h.app.subscribe_feed(USER, &h.url("/blog"), false).await.unwrap();
    let feed = h.app.repository.get_feed(feed_id).await.unwrap().unwrap();
    assert_eq!(feed.feed_url, h.url("/feed.xml"));
    assert_eq!(feed.name, "Test Feed");
    assert_eq!(feed.description.as_deref(), Some("A feed"));
    // Subscribing imports everything, however old.
    assert_eq!(h.app.repository.get_feed_items(feed_id).await.unwrap().len(), 1);

    let err = assert_err!(h.app.subscribe_feed(USER, &h.url("/feed.xml"), false).await);
    assert_eq!(err.status_code(), 400);
    let err = assert_err!(h.app.subscribe_feed(USER, "   ", false).await);
    assert_eq!(err.status_code(), 400);

    // Another user may subscribe to the same feed.
    assert_ok!(h.app.subscribe_feed(OTHER_USER, &h.url("/feed.xml"), false).await);
}

#[tokio::test]
async fn refreshing_someone_elses_feed_is_forbidden() {
    let h = harness(false).await;
    let feed_id = insert_feed(&h, "/feed.xml", hours_ago(2), false).await;

    let err = assert_err!(h.app.refresh_feeds(Some(OTHER_USER), Some(feed_id)).await);
    assert_eq!(err.status_code(), 403);
    let err = assert_err!(h.app.refresh_feeds(Some(USER), Some(feed_id + 100)).await);
    assert_eq!(err.status_code(), 404);
}

#[tokio::test]
async fn auto_add_feeds_promote_new_items_to_links() {
    let h = harness(false).await;
    Mock::given(method("GET"))
        .and(path("/feed.xml"))
        .respond_with(rss_response(rss(&[Entry { guid: "a", link: h.url("/article"), pub_date: None }])))
        .mount(&h.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/article"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(article_html("Test Article"), "text/html"))
        .expect(1)
        .mount(&h.server)
        .await;

    let feed_id = h.app.subscribe_feed(USER, &h.url("/feed.xml"), true).await.unwrap();
    let item = h.app.repository.get_feed_items(feed_id).await.unwrap().remove(0);
    assert!(item.saved_as_link.is_none());

    h.spawner.run_pending().await;

    let item = h.app.repository.get_feed_item(item.id).await.unwrap().unwrap();
    let link_id = item.saved_as_link.expect("item promoted");
    let link = h.app.repository.get_link(link_id).await.unwrap().unwrap();
    assert_eq!(link.user_id, USER);
    assert_eq!(link.title, "Test Article");
    assert_eq!(link.created_from_feed, Some(feed_id));
    assert_eq!(link.original_url, h.url("/article"));
}

#[tokio::test]
async fn items_from_manual_feeds_stay_in_the_feed() {
    let h = harness(false).await;
    Mock::given(method("GET"))
        .and(path("/feed.xml"))
        .respond_with(rss_response(rss(&[Entry { guid: "a", link: h.url("/article"), pub_date: None }])))
        .mount(&h.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/article"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(article_html("Test Article"), "text/html"))
        .expect(0)
        .mount(&h.server)
        .await;

    let feed_id = h.app.subscribe_feed(USER, &h.url("/feed.xml"), false).await.unwrap();
    assert_eq!(h.spawner.run_pending().await, 1);

    let item = h.app.repository.get_feed_items(feed_id).await.unwrap().remove(0);
    assert!(item.saved_as_link.is_none());
}

#[tokio::test]
async fn racing_subscriptions_leave_one_feed_and_a_client_error() {
    let h = harness(false).await;
    Mock::given(method("GET"))
        .and(path("/feed.xml"))
        .respond_with(rss_response(rss(&[Entry { guid: "a", link: h.url("/a"), pub_date: None }])))
        .mount(&h.server)
        .await;

    let url = h.url("/feed.xml");
    let (first, second) = tokio::join!(
        h.app.subscribe_feed(USER, &url, false),
        h.app.subscribe_feed(USER, &url, false)
    );
    let results = [first, second];

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    let err = results.iter().find_map(|r| r.as_ref().err()).unwrap();
    assert_eq!(err.status_code(), 400);
    assert_eq!(h.app.repository.get_feeds_for_user(USER).await.unwrap().len(), 1);
}
