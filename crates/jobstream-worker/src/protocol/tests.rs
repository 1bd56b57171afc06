use super::*;
use serde_json::json;

#[test]
fn test_parse_line_blank() {
    assert!(parse_line("").is_none());
    assert!(parse_line("   \t").is_none());
}

#[test]
fn test_parse_line_object() {
    let line = parse_line(r#"{"type":"page","page":1,"items":[]}"#).unwrap();
    match line {
        WorkerLine::Event {
            event_type,
            payload,
        } => {
            assert_eq!(event_type, "page");
            assert_eq!(payload["page"], 1);
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn test_parse_line_missing_type_defaults_empty() {
    let line = parse_line(r#"{"msg":"hello"}"#).unwrap();
    assert!(matches!(line, WorkerLine::Event { ref event_type, .. } if event_type.is_empty()));
    assert_eq!(line.kind(), LineKind::Other);
}

#[test]
fn test_parse_line_not_json() {
    let line = parse_line("Traceback (most recent call last):").unwrap();
    match line {
        WorkerLine::Malformed { raw, error } => {
            assert_eq!(raw, "Traceback (most recent call last):");
            assert!(!error.is_empty());
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn test_parse_line_non_object_json() {
    for raw in ["[1,2,3]", "42", "\"text\"", "null"] {
        let line = parse_line(raw).unwrap();
        assert!(matches!(line, WorkerLine::Malformed { .. }), "{raw}");
    }
}

#[test]
fn test_kind_classification() {
    let banner = parse_line(r#"{"type":"banner"}"#).unwrap();
    assert_eq!(banner.kind(), LineKind::Informational);

    let start = parse_line(r#"{"type":"source_start","source":"lever"}"#).unwrap();
    assert_eq!(start.kind(), LineKind::Informational);

    let parsed = parse_line(r#"{"type":"parsed","title":"Engineer"}"#).unwrap();
    assert!(matches!(parsed.kind(), LineKind::Result(v) if v["title"] == "Engineer"));

    let progress = parse_line(r#"{"type":"progress","n":3}"#).unwrap();
    assert_eq!(progress.kind(), LineKind::Other);
}

#[test]
fn test_failure_message_sources() {
    let with_error = parse_line(r#"{"type":"parseError","error":"bad html","url":"https://x"}"#)
        .unwrap();
    assert_eq!(
        with_error.kind(),
        LineKind::Failure("bad html (url=https://x)".to_string())
    );

    let with_message = parse_line(r#"{"type":"error","message":"rate limited"}"#).unwrap();
    assert_eq!(
        with_message.kind(),
        LineKind::Failure("rate limited".to_string())
    );

    let bare = parse_line(r#"{"type":"error"}"#).unwrap();
    assert_eq!(
        bare.kind(),
        LineKind::Failure("Unknown parse error".to_string())
    );

    let garbage = parse_line("oops").unwrap();
    assert!(matches!(garbage.kind(), LineKind::Failure(m) if m.contains("oops")));
}

#[test]
fn test_page_result_from_payload() {
    let payload = json!({
        "type": "page",
        "page": 2,
        "hasMore": true,
        "items": [
            {"id": "a", "title": "Backend Engineer", "company": "Acme", "url": "https://acme/a", "source": "lever"},
            {"id": "b", "title": "SRE", "company": "Acme", "postedAt": "2024-05-01T00:00:00Z"}
        ]
    });
    let page = PageResult::from_payload(&payload, 2).unwrap();
    assert_eq!(page.page, 2);
    assert!(page.has_more);
    assert_eq!(page.items.len(), 2);
    assert_eq!(page.items[0].company, "Acme");
    assert!(page.items[1].posted_at.is_some());
}

#[test]
fn test_page_result_defaults_page_number() {
    let payload = json!({ "type": "parsed", "items": [] });
    let page = PageResult::from_payload(&payload, 7).unwrap();
    assert_eq!(page.page, 7);
    assert!(!page.has_more);
}

#[test]
fn test_page_result_requires_items() {
    let payload = json!({ "type": "parsed", "title": "not a page" });
    assert!(matches!(
        PageResult::from_payload(&payload, 1),
        Err(Error::Protocol(_))
    ));
}

#[test]
fn test_posting_equality_by_id() {
    let a: PostingSummary = serde_json::from_value(json!({"id": "x", "title": "A"})).unwrap();
    let b: PostingSummary = serde_json::from_value(json!({"id": "x", "title": "B"})).unwrap();
    let c: PostingSummary = serde_json::from_value(json!({"id": "y", "title": "A"})).unwrap();
    assert_eq!(a, b);
    assert_ne!(a, c);

    let set: std::collections::HashSet<_> = [a, b, c].into_iter().collect();
    assert_eq!(set.len(), 2);
}

#[test]
fn test_job_details_mapping() {
    let payload = json!({
        "type": "parsed",
        "title": "Platform Engineer",
        "company": "Initech",
        "location": "Remote",
        "salary": null,
        "team": "Infra"
    });
    let details = JobDetails::from_parsed(&payload, "https://jobs.initech.com/1");
    assert_eq!(details.url, "https://jobs.initech.com/1");
    assert_eq!(details.title, "Platform Engineer");
    assert_eq!(details.location.as_deref(), Some("Remote"));
    assert!(details.salary.is_none());
    assert_eq!(details.team.as_deref(), Some("Infra"));
}
