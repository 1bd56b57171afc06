use super::*;
use crate::ports::MockPageFetcher;
use jobstream_worker::PageResult;
use mockall::predicate::eq;
use serde_json::Value;
use std::sync::Mutex;

#[derive(Default)]
struct RecordingEmitter {
    events: Mutex<Vec<(String, Value)>>,
}

impl RecordingEmitter {
    fn events(&self) -> Vec<(String, Value)> {
        self.events.lock().unwrap().clone()
    }
}

impl StreamEmitter for RecordingEmitter {
    fn emit(&self, _request_id: &str, event_type: &str, payload: Value) {
        self.events
            .lock()
            .unwrap()
            .push((event_type.to_string(), payload));
    }
}

#[derive(Default)]
struct RecordingNotifier {
    sources: Mutex<Vec<(String, String)>>,
}

impl CompletionNotifier for RecordingNotifier {
    fn source_complete(&self, request_id: &str, source: &str) {
        self.sources
            .lock()
            .unwrap()
            .push((request_id.to_string(), source.to_string()));
    }

    fn completed(&self, _request_id: &str) {}
}

fn items(page: u32, count: usize) -> Vec<PostingSummary> {
    (0..count)
        .map(|i| {
            serde_json::from_value(serde_json::json!({
                "id": format!("p{page}-{i}"),
                "title": format!("Job {i}"),
            }))
            .unwrap()
        })
        .collect()
}

fn page(page: u32, count: usize, has_more: bool) -> PageResult {
    PageResult {
        page,
        has_more,
        items: items(page, count),
    }
}

fn request(max_items: i64) -> CrawlRequest {
    CrawlRequest {
        source: " lever ".to_string(),
        query: " rust ".to_string(),
        max_items,
        start_page: 1,
        page_size: 4,
    }
}

#[tokio::test]
async fn test_source_exhausted_before_cap() {
    let mut fetcher = MockPageFetcher::new();
    fetcher
        .expect_fetch_page()
        .returning(|_, _, _, p, _| Ok(if p < 3 { page(p, 4, true) } else { page(p, 2, false) }))
        .times(3);
    let emitter = RecordingEmitter::default();
    let notifier = RecordingNotifier::default();

    let result = run_crawl("r1", &request(10), &fetcher, &emitter, &notifier)
        .await
        .unwrap();

    assert_eq!(result.items.len(), 10);
    assert_eq!(result.last_page_fetched, 3);
    assert!(!result.truncated);

    let events = emitter.events();
    let types: Vec<&str> = events.iter().map(|(t, _)| t.as_str()).collect();
    assert_eq!(types, vec!["page", "page", "page", "crawlComplete"]);
    let done = &events[3].1;
    assert_eq!(done["totalItems"], 10);
    assert_eq!(done["lastPageFetched"], 3);
    assert_eq!(done["truncated"], false);
    assert_eq!(done["source"], "lever");

    assert_eq!(
        *notifier.sources.lock().unwrap(),
        vec![("r1".to_string(), "lever".to_string())]
    );
}

#[tokio::test]
async fn test_cap_hit_while_source_has_more() {
    let mut fetcher = MockPageFetcher::new();
    fetcher
        .expect_fetch_page()
        .returning(|_, _, _, p, _| Ok(page(p, 4, true)))
        .times(2);
    let emitter = RecordingEmitter::default();
    let notifier = RecordingNotifier::default();

    let result = run_crawl("r1", &request(5), &fetcher, &emitter, &notifier)
        .await
        .unwrap();

    assert_eq!(result.items.len(), 5);
    assert_eq!(result.last_page_fetched, 2);
    assert!(result.truncated);

    // Order preserved, page 2 contributes only its first item
    let ids: Vec<&str> = result.items.iter().map(|i| i.id.as_str()).collect();
    assert_eq!(ids, vec!["p1-0", "p1-1", "p1-2", "p1-3", "p2-0"]);

    let events = emitter.events();
    assert_eq!(events[1].1["items"].as_array().unwrap().len(), 1);
    assert_eq!(events[1].1["hasMore"], false);
    assert_eq!(events[2].1["truncated"], true);
}

#[tokio::test]
async fn test_cap_exactly_at_page_boundary_with_more() {
    let mut fetcher = MockPageFetcher::new();
    fetcher
        .expect_fetch_page()
        .returning(|_, _, _, p, _| Ok(page(p, 4, true)))
        .times(2);
    let emitter = RecordingEmitter::default();
    let notifier = RecordingNotifier::default();

    let result = run_crawl("r1", &request(8), &fetcher, &emitter, &notifier)
        .await
        .unwrap();
    assert_eq!(result.items.len(), 8);
    assert!(result.truncated);
}

#[tokio::test]
async fn test_cap_at_boundary_on_last_page_not_truncated() {
    let mut fetcher = MockPageFetcher::new();
    fetcher
        .expect_fetch_page()
        .returning(|_, _, _, p, _| Ok(page(p, 4, p < 2)))
        .times(2);
    let emitter = RecordingEmitter::default();
    let notifier = RecordingNotifier::default();

    let result = run_crawl("r1", &request(8), &fetcher, &emitter, &notifier)
        .await
        .unwrap();
    assert_eq!(result.items.len(), 8);
    assert!(!result.truncated);
}

#[tokio::test]
async fn test_defaults_and_trimming() {
    let mut fetcher = MockPageFetcher::new();
    fetcher
        .expect_fetch_page()
        .with(eq("r1"), eq("lever"), eq("rust"), eq(1u32), eq(25u32))
        .returning(|_, _, _, p, _| Ok(page(p, 0, false)))
        .times(1);
    let emitter = RecordingEmitter::default();
    let notifier = RecordingNotifier::default();

    let req = CrawlRequest {
        source: "  lever".to_string(),
        query: "rust  ".to_string(),
        max_items: 0,
        start_page: -3,
        page_size: 0,
    };
    let params = req.normalized();
    assert_eq!(params.max_items, 200);
    assert_eq!(params.start_page, 1);
    assert_eq!(params.page_size, 25);

    let result = run_crawl("r1", &req, &fetcher, &emitter, &notifier)
        .await
        .unwrap();
    assert!(result.items.is_empty());
    assert_eq!(result.last_page_fetched, 1);
    assert!(!result.truncated);
}

#[tokio::test]
async fn test_start_page_respected() {
    let mut fetcher = MockPageFetcher::new();
    fetcher
        .expect_fetch_page()
        .with(eq("r1"), eq("lever"), eq("rust"), eq(7u32), eq(4u32))
        .returning(|_, _, _, p, _| Ok(page(p, 1, false)))
        .times(1);

    let mut req = request(10);
    req.start_page = 7;
    let result = run_crawl(
        "r1",
        &req,
        &fetcher,
        &RecordingEmitter::default(),
        &RecordingNotifier::default(),
    )
    .await
    .unwrap();
    assert_eq!(result.last_page_fetched, 7);
}

#[tokio::test]
async fn test_fetch_error_is_fatal() {
    let mut fetcher = MockPageFetcher::new();
    fetcher
        .expect_fetch_page()
        .returning(|_, _, _, p, _| {
            if p == 1 {
                Ok(page(p, 4, true))
            } else {
                Err(jobstream_worker::Error::Worker("board unavailable".to_string()))
            }
        })
        .times(2);
    let emitter = RecordingEmitter::default();
    let notifier = RecordingNotifier::default();

    let err = run_crawl("r1", &request(50), &fetcher, &emitter, &notifier)
        .await
        .unwrap_err();
    match err {
        Error::PageFetch {
            source_key,
            page,
            message,
        } => {
            assert_eq!(source_key, "lever");
            assert_eq!(page, 2);
            assert!(message.contains("board unavailable"));
        }
        other => panic!("unexpected {other:?}"),
    }

    // No completion on failure
    let types: Vec<String> = emitter.events().into_iter().map(|(t, _)| t).collect();
    assert_eq!(types, vec!["page"]);
    assert!(notifier.sources.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_empty_request_id_rejected() {
    let fetcher = MockPageFetcher::new();
    let err = run_crawl(
        " ",
        &request(5),
        &fetcher,
        &RecordingEmitter::default(),
        &RecordingNotifier::default(),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, Error::InvalidRequest(_)));
}

#[test]
fn test_accumulator_never_exceeds_cap() {
    let mut acc = CrawlAccumulator::new(3);
    assert_eq!(acc.absorb(1, items(1, 2)).len(), 2);
    assert_eq!(acc.absorb(2, items(2, 5)).len(), 1);
    assert!(acc.is_full());
    assert!(acc.absorb(3, items(3, 5)).is_empty());
    assert_eq!(acc.collected().len(), 3);
    assert_eq!(acc.last_page_fetched(), 3);

    let result = acc.finish(false);
    assert!(!result.truncated);
}
