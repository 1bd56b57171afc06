//! Crawl and analysis pipelines wired to a real bus and the stub worker.

use jobstream_bus::{BusConfig, BusMessage, EventBus, Subscription};
use jobstream_core::{
    run_analysis, run_crawl, AnalysisRequest, CrawlRequest, HeuristicScorer, SourceTracker,
    WorkerPageFetcher,
};
use jobstream_worker::{worker_client, WorkerConfig};

fn quiet_bus() -> EventBus {
    EventBus::new(BusConfig { heartbeat_secs: 0 })
}

fn stub_fetcher(bus: &EventBus) -> WorkerPageFetcher {
    WorkerPageFetcher::new(worker_client(
        WorkerConfig {
            enable_direct_execution: false,
            ..WorkerConfig::default()
        },
        bus.clone(),
    ))
}

fn drain_types(sub: &mut Subscription) -> Vec<String> {
    let mut types = Vec::new();
    while let Some(message) = sub.try_recv() {
        if let BusMessage::Event(event) = message {
            types.push(event.event_type);
        }
    }
    types
}

#[tokio::test]
async fn crawl_two_sources_completes_channel_once() {
    let bus = quiet_bus();
    let fetcher = stub_fetcher(&bus);
    let tracker = SourceTracker::new(bus.clone());
    let mut sub = bus.subscribe("req:multi");

    tracker.expect("multi", ["lever", "greenhouse"]);

    let lever = CrawlRequest {
        source: "lever".to_string(),
        query: "rust".to_string(),
        max_items: 30,
        page_size: 10,
        ..CrawlRequest::default()
    };
    let result = run_crawl("multi", &lever, &fetcher, &bus, &tracker)
        .await
        .unwrap();
    assert_eq!(result.items.len(), 30);
    assert!(result.truncated);
    assert!(bus.has_channel("req:multi"));

    let greenhouse = CrawlRequest {
        source: "greenhouse".to_string(),
        query: "rust".to_string(),
        max_items: 1000,
        page_size: 10,
        ..CrawlRequest::default()
    };
    let result = run_crawl("multi", &greenhouse, &fetcher, &bus, &tracker)
        .await
        .unwrap();
    // Stub sources have 4 full pages and a half-size fifth
    assert_eq!(result.items.len(), 45);
    assert_eq!(result.last_page_fetched, 5);
    assert!(!result.truncated);
    assert!(!bus.has_channel("req:multi"));

    let types = drain_types(&mut sub);
    assert_eq!(types.first().map(String::as_str), Some("connected"));
    assert_eq!(types.iter().filter(|t| *t == "page").count(), 3 + 5);
    assert_eq!(types.iter().filter(|t| *t == "crawlComplete").count(), 2);
    assert_eq!(types.last().map(String::as_str), Some("done"));
}

#[tokio::test]
async fn analysis_completes_channel() {
    let bus = quiet_bus();
    let tracker = SourceTracker::new(bus.clone());
    let mut sub = bus.subscribe("req:an-1");

    let request = AnalysisRequest {
        resume_text: "Async Rust backend".to_string(),
        job_ids: vec!["https://jobs.example.com/1".to_string()],
    };
    let outcome = run_analysis("an-1", &request, &HeuristicScorer, &bus, &tracker)
        .await
        .unwrap();
    assert_eq!(outcome.ats_score, 100);
    assert!(!bus.has_channel("req:an-1"));

    assert_eq!(
        drain_types(&mut sub),
        vec![
            "connected",
            "analysisProgress",
            "jobAnalyzed",
            "generatingResume",
            "analysisComplete",
            "done"
        ]
    );
}
