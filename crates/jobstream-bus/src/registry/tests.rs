use super::*;
use crate::subscriber::ChannelSink;

fn sink() -> Arc<dyn Subscriber> {
    let (sink, _rx) = ChannelSink::new();
    Arc::new(sink)
}

#[test]
fn test_insert_creates_channel() {
    let registry = ChannelRegistry::new();
    assert!(!registry.contains("req:a"));

    registry.insert("req:a", SubscriberId::new(), sink());
    registry.insert("req:a", SubscriberId::new(), sink());

    assert!(registry.contains("req:a"));
    assert_eq!(registry.len("req:a"), 2);
    assert_eq!(registry.channel_count(), 1);
}

#[test]
fn test_remove_last_drops_channel() {
    let registry = ChannelRegistry::new();
    let id = SubscriberId::new();
    registry.insert("req:a", id, sink());

    assert!(registry.remove("req:a", id).is_some());
    assert!(!registry.contains("req:a"));
    assert_eq!(registry.channel_count(), 0);
}

#[test]
fn test_remove_unknown_is_noop() {
    let registry = ChannelRegistry::new();
    let keep = SubscriberId::new();
    registry.insert("req:a", keep, sink());

    assert!(registry.remove("req:a", SubscriberId::new()).is_none());
    assert!(registry.remove("req:missing", keep).is_none());
    assert_eq!(registry.len("req:a"), 1);
}

#[test]
fn test_snapshot_is_detached() {
    let registry = ChannelRegistry::new();
    let id = SubscriberId::new();
    registry.insert("req:a", id, sink());

    let snapshot = registry.snapshot("req:a");
    registry.remove("req:a", id);

    assert_eq!(snapshot.len(), 1);
    assert_eq!(registry.len("req:a"), 0);
}

#[test]
fn test_take_removes_channel() {
    let registry = ChannelRegistry::new();
    registry.insert("req:a", SubscriberId::new(), sink());
    registry.insert("req:b", SubscriberId::new(), sink());

    assert_eq!(registry.take("req:a").len(), 1);
    assert!(registry.take("req:a").is_empty());
    assert_eq!(registry.channels(), vec!["req:b".to_string()]);
}
