//! End-to-end engine behavior with in-process host ports

use std::sync::{Arc, Mutex};
use std::time::Duration;

use crumbtrail_core::{
    config::{ConfigBuilder, ConfigError, TelemetryConfig},
    domain::{Breadcrumb, DomEvent, ErrorInfo, HostError, ThrownValue},
    ports::{
        FrameEvent, ManualClock, MetricCategory, PerformanceEntry, ReportRequest,
        ReportTransport,
    },
};
use crumbtrail_telemetry::{
    ChannelFrameSource, ChannelPerformanceSource, DispatchOutcome, ErrorHook, HostCapabilities,
    TelemetryEngine, TelemetryError,
};

#[derive(Default)]
struct RecordingTransport {
    sent: Mutex<Vec<ReportRequest>>,
}

impl RecordingTransport {
    fn bodies(&self) -> Vec<serde_json::Value> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|r| serde_json::from_slice(&r.body).unwrap())
            .collect()
    }
}

#[async_trait::async_trait]
impl ReportTransport for RecordingTransport {
    async fn send(&self, request: ReportRequest) -> anyhow::Result<()> {
        self.sent.lock().unwrap().push(request);
        Ok(())
    }
}

fn base_config() -> ConfigBuilder {
    ConfigBuilder::new().report_url("https://collector.test/report")
}

fn entry(name: &str) -> PerformanceEntry {
    PerformanceEntry {
        name: name.into(),
        start_time: 120.5,
        duration: 3.0,
    }
}

#[tokio::test]
async fn test_buffer_keeps_last_three() {
    let engine = TelemetryEngine::builder(base_config().max_breadcrumbs(3).build())
        .transport(Arc::new(RecordingTransport::default()))
        .start()
        .unwrap();

    for n in 1..=5 {
        engine.record(Breadcrumb::click(format!("b{n}")));
    }

    let targets: Vec<_> = engine
        .snapshot()
        .into_iter()
        .filter_map(|b| b.target)
        .collect();
    assert_eq!(targets, vec!["b3", "b4", "b5"]);
    engine.shutdown().await;
}

#[tokio::test]
async fn test_repeat_error_throttled_within_window() {
    let clock = Arc::new(ManualClock::new(0));
    let transport = Arc::new(RecordingTransport::default());
    let engine = TelemetryEngine::builder(base_config().error_throttle_time_ms(1_000).build())
        .clock(clock.clone())
        .transport(transport.clone())
        .start()
        .unwrap();

    let error = || ErrorInfo::new("E", "https://app.test/");
    assert_eq!(engine.report_error(error()), DispatchOutcome::Attempted);
    clock.set(500);
    assert_eq!(engine.report_error(error()), DispatchOutcome::Suppressed);
    clock.set(1_500);
    assert_eq!(engine.report_error(error()), DispatchOutcome::Attempted);

    assert!(engine.drain(Duration::from_secs(1)).await);
    assert_eq!(transport.sent.lock().unwrap().len(), 2);
    engine.shutdown().await;
}

#[tokio::test]
async fn test_missing_report_url_fails_before_attaching() {
    let hook = Arc::new(ErrorHook::new());
    let performance = Arc::new(ChannelPerformanceSource::new());
    let (frames, frame_tx) = ChannelFrameSource::new();

    let err = TelemetryEngine::builder(TelemetryConfig::default())
        .error_source(hook.clone())
        .performance_source(performance.clone())
        .frame_source(Box::new(frames))
        .start()
        .err()
        .unwrap();

    assert!(matches!(
        err,
        TelemetryError::Config(ConfigError::MissingReportUrl)
    ));
    assert_eq!(hook.subscriber_count(), 0);
    assert!(!performance.push(MetricCategory::Paint, entry("first-paint")));
    assert!(frame_tx.send(FrameEvent::Frame { at_ms: 0 }).is_err());
}

#[tokio::test]
async fn test_unsupported_category_does_not_block_others() {
    let performance = Arc::new(ChannelPerformanceSource::new().without(MetricCategory::LayoutShift));
    let mut engine = TelemetryEngine::builder(base_config().max_breadcrumbs(50).build())
        .transport(Arc::new(RecordingTransport::default()))
        .performance_source(performance.clone())
        .start()
        .unwrap();

    let observed = engine.observed_categories().to_vec();
    assert_eq!(observed.len(), 4);
    assert!(!observed.contains(&MetricCategory::LayoutShift));

    for category in MetricCategory::ALL {
        let delivered = performance.push(category, entry(category.as_str()));
        assert_eq!(delivered, category != MetricCategory::LayoutShift);
    }

    drop(performance);
    engine.wait_for_sources().await;

    let crumbs = engine.snapshot();
    assert_eq!(crumbs.len(), 4);
    assert!(crumbs.iter().all(|b| b.kind == Breadcrumb::PERFORMANCE));
    assert!(crumbs
        .iter()
        .all(|b| b.target.as_deref() != Some("layout-shift")));
    assert_eq!(
        engine
            .metrics()
            .observer_failures_total
            .with_label_values(&["layout-shift"])
            .get(),
        1
    );
    engine.shutdown().await;
}

#[tokio::test]
async fn test_unavailable_observer_still_starts() {
    let engine = TelemetryEngine::builder(base_config().build())
        .transport(Arc::new(RecordingTransport::default()))
        .performance_source(Arc::new(ChannelPerformanceSource::unavailable()))
        .start()
        .unwrap();

    assert!(engine.observed_categories().is_empty());
    assert_eq!(
        engine
            .metrics()
            .observer_failures_total
            .with_label_values(&["paint"])
            .get(),
        1
    );
    engine.shutdown().await;
}

#[tokio::test]
async fn test_host_errors_flow_through_hook() {
    let transport = Arc::new(RecordingTransport::default());
    let previous_calls = Arc::new(Mutex::new(0));
    let counter = Arc::clone(&previous_calls);
    let hook = Arc::new(ErrorHook::with_previous(Arc::new(move |_: &HostError| {
        *counter.lock().unwrap() += 1;
    })));

    let engine = TelemetryEngine::builder(base_config().build())
        .transport(transport.clone())
        .error_source(hook.clone())
        .host_capabilities(HostCapabilities::framework(2))
        .start()
        .unwrap();

    engine.record(Breadcrumb::click("a#details"));
    hook.emit(
        &HostError::new(
            ThrownValue::Message("render failed".into()),
            "https://app.test/item/7",
        )
        .with_info("render")
        .with_component("ItemCard"),
    );

    assert!(engine.drain(Duration::from_secs(1)).await);
    assert_eq!(*previous_calls.lock().unwrap(), 1);

    let bodies = transport.bodies();
    assert_eq!(bodies.len(), 1);
    assert_eq!(bodies[0]["error"]["message"], "render failed");
    assert_eq!(bodies[0]["error"]["info"], "render in <ItemCard>");
    assert_eq!(bodies[0]["breadcrumbs"][0]["target"], "a#details");

    engine.shutdown().await;
    hook.emit(&HostError::new(ThrownValue::Unknown, "https://app.test/"));
    assert_eq!(transport.sent.lock().unwrap().len(), 1);
    assert_eq!(*previous_calls.lock().unwrap(), 2);
}

#[tokio::test]
async fn test_sensitive_input_is_redacted() {
    let engine = TelemetryEngine::builder(base_config().build())
        .transport(Arc::new(RecordingTransport::default()))
        .start()
        .unwrap();

    engine.handle_dom_event(DomEvent::Input {
        target: "input#card".into(),
        value: "4111 1111 1111 1111".into(),
    });
    for (i, key) in ["9", "7", "8", "0", "1"].iter().enumerate() {
        engine.handle_dom_event(DomEvent::KeyDown {
            target: "input#sku".into(),
            key: key.to_string(),
            at_ms: 1_000 + i as u64 * 10,
        });
    }
    engine.handle_dom_event(DomEvent::KeyDown {
        target: "input#sku".into(),
        key: "Enter".into(),
        at_ms: 1_050,
    });

    let crumbs = engine.snapshot();
    assert_eq!(crumbs.len(), 2);
    assert_eq!(crumbs[0].kind, Breadcrumb::INPUT);
    assert_eq!(crumbs[0].value.as_deref(), Some("length:19"));
    assert_eq!(crumbs[1].kind, Breadcrumb::SCAN);
    assert_eq!(crumbs[1].value.as_deref(), Some("length:5"));
    engine.shutdown().await;
}

#[tokio::test]
async fn test_resource_failure_is_reported() {
    let transport = Arc::new(RecordingTransport::default());
    let engine = TelemetryEngine::builder(base_config().build())
        .transport(transport.clone())
        .start()
        .unwrap();

    let outcome = engine.handle_dom_event(DomEvent::ResourceError {
        tag: "IMG".into(),
        src: "/static/logo.png".into(),
        page_url: "https://app.test/".into(),
    });
    assert_eq!(outcome, Some(DispatchOutcome::Attempted));

    assert!(engine.drain(Duration::from_secs(1)).await);
    let bodies = transport.bodies();
    assert_eq!(
        bodies[0]["error"]["message"],
        "Failed to load img: /static/logo.png"
    );
    engine.shutdown().await;
}

#[tokio::test]
async fn test_frame_drops_become_breadcrumbs() {
    let clock = Arc::new(ManualClock::new(0));
    let (frames, frame_tx) = ChannelFrameSource::new();
    let mut engine = TelemetryEngine::builder(base_config().build())
        .clock(clock.clone())
        .transport(Arc::new(RecordingTransport::default()))
        .frame_source(Box::new(frames))
        .start()
        .unwrap();

    // 80ms gap is a drop; the hidden stretch is not.
    for event in [
        FrameEvent::Frame { at_ms: 0 },
        FrameEvent::Frame { at_ms: 16 },
        FrameEvent::Frame { at_ms: 96 },
        FrameEvent::Visibility {
            visible: false,
            at_ms: 100,
        },
        FrameEvent::Visibility {
            visible: true,
            at_ms: 5_000,
        },
        FrameEvent::Frame { at_ms: 5_010 },
        FrameEvent::Frame { at_ms: 5_026 },
    ] {
        frame_tx.send(event).unwrap();
    }
    drop(frame_tx);
    engine.wait_for_sources().await;

    let drops: Vec<_> = engine
        .snapshot()
        .into_iter()
        .filter(|b| b.target.as_deref() == Some("frame-drop"))
        .collect();
    assert_eq!(drops.len(), 1);
    let value: serde_json::Value =
        serde_json::from_str(drops[0].value.as_deref().unwrap()).unwrap();
    assert_eq!(value["frameTime"], 80);
    assert_eq!(value["count"], 1);
    assert_eq!(engine.metrics().frame_drops_total.get(), 1);
    engine.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_frame_window_ignores_engine_clock_offset() {
    // Engine clock far ahead of the host's frame stamps.
    let clock = Arc::new(ManualClock::new(10_000));
    let (frames, frame_tx) = ChannelFrameSource::new();
    let engine = TelemetryEngine::builder(base_config().build())
        .clock(clock.clone())
        .transport(Arc::new(RecordingTransport::default()))
        .frame_source(Box::new(frames))
        .start()
        .unwrap();

    for at_ms in [0, 16, 80, 96, 160, 176, 192, 208] {
        frame_tx.send(FrameEvent::Frame { at_ms }).unwrap();
    }
    tokio::time::sleep(Duration::from_millis(500)).await;

    let counts: Vec<_> = engine
        .snapshot()
        .into_iter()
        .filter(|b| b.target.as_deref() == Some("frame-drop"))
        .map(|b| {
            let value: serde_json::Value =
                serde_json::from_str(b.value.as_deref().unwrap()).unwrap();
            (value["frameTime"].as_u64().unwrap(), value["count"].as_u64().unwrap())
        })
        .collect();
    assert_eq!(counts, vec![(64, 2)]);

    drop(frame_tx);
    engine.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_idle_page_emits_trailing_frame_drop() {
    let (frames, frame_tx) = ChannelFrameSource::new();
    let engine = TelemetryEngine::builder(base_config().build())
        .transport(Arc::new(RecordingTransport::default()))
        .frame_source(Box::new(frames))
        .start()
        .unwrap();

    frame_tx.send(FrameEvent::Frame { at_ms: 0 }).unwrap();
    frame_tx.send(FrameEvent::Frame { at_ms: 90 }).unwrap();
    tokio::time::sleep(Duration::from_millis(101)).await;

    let drops: Vec<_> = engine
        .snapshot()
        .into_iter()
        .filter(|b| b.target.as_deref() == Some("frame-drop"))
        .collect();
    assert_eq!(drops.len(), 1);
    let value: serde_json::Value =
        serde_json::from_str(drops[0].value.as_deref().unwrap()).unwrap();
    assert_eq!(value["count"], 1);

    drop(frame_tx);
    engine.shutdown().await;
}
