//! Emission flow: metadata, listener ordering, once/off semantics and
//! failure isolation.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use serde_json::json;
use vigil_events::{
    BusError, CacheInvalidated, ConfigChanged, EventBus, EventName, Listener, ListenerFailure,
    SiteAdded, SiteRemoved,
};
use vigil_test::{
    CallLog, Recorder, setup_test_logging_default, test_cache_invalidated, test_config_changed,
    test_site_added, test_site_removed,
};

#[tokio::test]
async fn test_emit_without_listeners_succeeds() {
    let bus = EventBus::new("test-bus").unwrap();
    bus.emit(test_site_removed("s")).await.unwrap();
}

#[tokio::test]
async fn test_listeners_run_once_each_in_registration_order() {
    let bus = EventBus::new("test-bus").unwrap();
    let log = CallLog::new();
    bus.on(&log.listener::<SiteAdded>("first"))
        .unwrap()
        .on(&log.listener::<SiteAdded>("second"))
        .unwrap()
        .on(&log.listener::<SiteAdded>("third"))
        .unwrap();

    bus.emit(test_site_added("s")).await.unwrap();

    assert_eq!(log.entries(), vec!["first", "second", "third"]);
}

#[tokio::test]
async fn test_listeners_only_receive_their_event() {
    let bus = EventBus::new("test-bus").unwrap();
    let added = Recorder::<SiteAdded>::new();
    let removed = Recorder::<SiteRemoved>::new();
    bus.on(added.listener()).unwrap();
    bus.on(removed.listener()).unwrap();

    bus.emit(test_site_added("s")).await.unwrap();

    assert_eq!(added.len(), 1);
    assert!(removed.is_empty());
}

#[tokio::test]
async fn test_cache_invalidated_carries_meta() {
    let bus = EventBus::new("test-bus").unwrap();
    let recorder = Recorder::<CacheInvalidated>::new();
    bus.on(recorder.listener()).unwrap();

    bus.emit(test_cache_invalidated()).await.unwrap();

    let envelopes = recorder.envelopes();
    assert_eq!(envelopes.len(), 1);
    let json = envelopes[0].to_json().unwrap();

    let meta = &json["_meta"];
    assert!(!meta["correlationId"].as_str().unwrap().is_empty());
    assert!(meta["timestamp"].is_i64());
    assert_eq!(meta["busId"], "test-bus");

    let mut fields = json.as_object().unwrap().clone();
    fields.remove("_meta");
    assert_eq!(
        serde_json::Value::Object(fields),
        json!({"type": "all", "reason": "manual", "timestamp": 1000})
    );
}

#[tokio::test]
async fn test_correlation_ids_are_unique_and_bus_id_matches() {
    let bus = EventBus::new("ids").unwrap();
    let recorder = Recorder::<SiteRemoved>::new();
    bus.on(recorder.listener()).unwrap();

    for _ in 0..1000 {
        bus.emit(test_site_removed("s")).await.unwrap();
    }

    let ids: HashSet<String> = recorder.correlation_ids().into_iter().collect();
    assert_eq!(ids.len(), 1000);
    assert!(recorder.envelopes().iter().all(|e| e.metadata().bus_id == "ids"));
}

#[tokio::test]
async fn test_timestamps_never_decrease() {
    let bus = EventBus::new("clock").unwrap();
    let recorder = Recorder::<SiteRemoved>::new();
    bus.on(recorder.listener()).unwrap();

    for _ in 0..200 {
        bus.emit(test_site_removed("s")).await.unwrap();
    }

    let stamps: Vec<i64> = recorder
        .envelopes()
        .iter()
        .map(|e| e.metadata().timestamp)
        .collect();
    assert!(stamps.windows(2).all(|pair| pair[0] <= pair[1]));
}

#[tokio::test]
async fn test_once_listener_fires_once() {
    let bus = EventBus::new("test-bus").unwrap();
    let recorder = Recorder::<SiteRemoved>::new();
    bus.once(recorder.listener()).unwrap();

    for _ in 0..3 {
        bus.emit(test_site_removed("s")).await.unwrap();
    }

    assert_eq!(recorder.len(), 1);
    assert_eq!(bus.listener_count::<SiteRemoved>(), 0);
}

#[tokio::test]
async fn test_failing_once_listener_is_still_removed() {
    setup_test_logging_default();
    let bus = EventBus::new("test-bus").unwrap();
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    bus.once(&Listener::<SiteRemoved>::sync(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
        anyhow::bail!("first delivery fails")
    }))
    .unwrap();

    bus.emit(test_site_removed("s")).await.unwrap();
    bus.emit(test_site_removed("s")).await.unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(bus.listener_count::<SiteRemoved>(), 0);
}

#[tokio::test]
async fn test_off_without_listener_removes_all() {
    let bus = EventBus::new("test-bus").unwrap();
    let first = Recorder::<SiteAdded>::new();
    let second = Recorder::<SiteAdded>::new();
    bus.on(first.listener()).unwrap();
    bus.once(second.listener()).unwrap();

    assert_eq!(bus.off::<SiteAdded>(None), 2);
    bus.emit(test_site_added("s")).await.unwrap();

    assert!(first.is_empty());
    assert!(second.is_empty());
    assert_eq!(bus.diagnostics().listener_count(EventName::SiteAdded), 0);
}

#[tokio::test]
async fn test_off_specific_listener_keeps_others() {
    let bus = EventBus::new("test-bus").unwrap();
    let kept = Recorder::<SiteAdded>::new();
    let dropped = Recorder::<SiteAdded>::new();
    bus.on(kept.listener()).unwrap();
    bus.on(dropped.listener()).unwrap();
    bus.on(dropped.listener()).unwrap();

    assert_eq!(bus.off(Some(dropped.listener())), 2);
    assert_eq!(bus.off(Some(dropped.listener())), 0);
    bus.emit(test_site_added("s")).await.unwrap();

    assert_eq!(kept.len(), 1);
    assert!(dropped.is_empty());
}

#[tokio::test]
async fn test_failing_listener_does_not_stop_later_listeners() {
    setup_test_logging_default();
    let bus = EventBus::new("test-bus").unwrap();
    let second_calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&second_calls);

    bus.on(&Listener::<ConfigChanged>::sync(|_| anyhow::bail!("listener exploded")))
        .unwrap();
    bus.on(&Listener::<ConfigChanged>::sync(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }))
    .unwrap();

    let result = bus
        .emit(test_config_changed("historyLimit", Some(json!(100)), json!(500)))
        .await;

    assert!(result.is_ok());
    assert_eq!(second_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_panicking_listener_is_isolated() {
    let bus = EventBus::new("test-bus").unwrap();
    let after = Recorder::<SiteRemoved>::new();
    bus.on(&Listener::<SiteRemoved>::new(|envelope| async move {
        assert!(envelope.site_identifier.is_empty(), "listener panicked");
        Ok(())
    }))
    .unwrap();
    bus.on(after.listener()).unwrap();

    bus.emit(test_site_removed("s")).await.unwrap();

    assert_eq!(after.len(), 1);
}

#[tokio::test]
async fn test_listener_error_hook_receives_failures() {
    let reports = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&reports);
    let bus = EventBus::builder("hooked")
        .on_listener_error(move |error| {
            let kind = match &error.failure {
                ListenerFailure::Failed(e) => format!("failed: {e}"),
                ListenerFailure::Panicked(msg) => format!("panicked: {msg}"),
            };
            sink.lock().unwrap().push((error.event, error.listener.clone(), kind));
        })
        .build()
        .unwrap();

    bus.on(&Listener::<SiteRemoved>::sync(|_| anyhow::bail!("disk full")).named("persist"))
        .unwrap();
    bus.on(&Listener::<SiteRemoved>::sync(|_| panic!("bad state")).named("ui"))
        .unwrap();

    bus.emit(test_site_removed("s")).await.unwrap();

    let reports = reports.lock().unwrap();
    assert_eq!(reports.len(), 2);
    assert_eq!(
        reports[0],
        (
            EventName::SiteRemoved,
            "persist".to_string(),
            "failed: disk full".to_string()
        )
    );
    assert_eq!(reports[1].1, "ui");
    assert_eq!(reports[1].2, "panicked: bad state");
}

#[tokio::test]
async fn test_async_listener_is_awaited_before_emit_returns() {
    let bus = EventBus::new("test-bus").unwrap();
    let done = Arc::new(AtomicUsize::new(0));
    let flag = Arc::clone(&done);
    bus.on(&Listener::<SiteRemoved>::new(move |_| {
        let flag = Arc::clone(&flag);
        async move {
            tokio::task::yield_now().await;
            flag.store(1, Ordering::SeqCst);
            Ok(())
        }
    }))
    .unwrap();

    bus.emit(test_site_removed("s")).await.unwrap();

    assert_eq!(done.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_config_errors() {
    let err = EventBus::new("  ").unwrap_err();
    assert!(matches!(err, BusError::Configuration { field: "id", .. }));

    let err = EventBus::builder("b").max_middleware(0).build().unwrap_err();
    assert!(matches!(
        err,
        BusError::Configuration {
            field: "max_middleware",
            ..
        }
    ));

    let err = EventBus::builder("b")
        .max_listeners_per_event(0)
        .build()
        .unwrap_err();
    assert!(matches!(
        err,
        BusError::Configuration {
            field: "max_listeners_per_event",
            ..
        }
    ));
}
