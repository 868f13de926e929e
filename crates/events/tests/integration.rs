//! Integration tests for events

#[cfg(test)]
mod tests {
    use modsite_errors::FetchError;
    use modsite_events::*;
    use modsite_types::FetchPhase;

    #[tokio::test]
    async fn test_event_sender_ext() {
        let (tx, mut rx) = channel();

        tx.emit_error("test error");
        tx.emit_debug("test debug");
        tx.emit_warning_with_context("slow proxy", "example.com/m@v1.0.0");

        let event1 = rx.recv().await.unwrap();
        assert!(matches!(event1, AppEvent::General(GeneralEvent::Error { .. })));
        assert_eq!(event1.log_level(), tracing::Level::ERROR);

        let event2 = rx.recv().await.unwrap();
        assert!(matches!(event2, AppEvent::General(GeneralEvent::DebugLog { .. })));

        let event3 = rx.recv().await.unwrap();
        match event3 {
            AppEvent::General(GeneralEvent::Warning { context, .. }) => {
                assert_eq!(context.as_deref(), Some("example.com/m@v1.0.0"));
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_dropped_receiver() {
        let (tx, rx) = channel();
        drop(rx);

        // Should not panic when receiver is dropped
        tx.emit_warning("ignored");
        tx.emit_fetch_phase("id", "example.com/m", "v1.0.0", FetchPhase::Shed);
    }

    #[test]
    fn test_failed_fetch_event() {
        let err = FetchError::DeadlineExceeded { seconds: 30 };
        let event = AppEvent::Fetch(FetchEvent::Failed {
            fetch_id: "fetch-1".into(),
            module_path: "example.com/m".into(),
            version: "v1.0.0".into(),
            status: err.status_code(),
            failure: FailureContext::from_error(&err),
        });

        assert_eq!(event.log_level(), tracing::Level::ERROR);
        assert_eq!(event.log_target(), "modsite::events::fetch");
        let meta = EventMeta::for_event(&event);
        assert_eq!(meta.correlation_id.as_deref(), Some("fetch-1"));

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["domain"], "fetch");
        assert_eq!(json["event"]["type"], "Failed");
        assert_eq!(json["event"]["status"], 408);
        assert_eq!(json["event"]["failure"]["retryable"], true);
        assert_eq!(json["event"]["failure"]["code"], "fetch.deadline_exceeded");
    }

    #[test]
    fn test_queue_events_correlate_by_key() {
        let event = AppEvent::Queue(QueueEvent::Finished {
            key: "example.com/m@v1.0.0".into(),
            status: 200,
            duration_ms: 12,
        });
        assert_eq!(event.correlation_id().as_deref(), Some("example.com/m@v1.0.0"));
        assert_eq!(event.event_source(), EventSource::QUEUE);
        assert_eq!(event.log_level(), tracing::Level::INFO);
    }
}
