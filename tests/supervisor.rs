//! End-to-end tests driving the async supervisor through an in-memory bus.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Value, json};
use unitvisor::{
    BusCall, Config, Event, EventKind, FeatureDescriptor, FeatureStatus, MemoryBus, RunState,
    Severity, Subscribe, Supervisor, SupervisorBuilder, SupervisorError, SupervisorHandle,
    Telemetry, UnitDescriptor,
};

const STATE: &str = "/cps/x/u1/feat/soldagem/$state";

#[derive(Default)]
struct Recorder {
    events: Mutex<Vec<Event>>,
}

impl Recorder {
    fn saw(&self, kind: EventKind, reason: Option<&str>) -> bool {
        self.events
            .lock()
            .iter()
            .any(|e| e.kind == kind && (reason.is_none() || e.reason.as_deref() == reason))
    }
}

#[async_trait]
impl Subscribe for Recorder {
    async fn on_event(&self, event: &Event) {
        self.events.lock().push(event.clone());
    }

    fn name(&self) -> &'static str {
        "recorder"
    }
}

fn prop(id: &str, value: Value) -> Value {
    json!({"idShort": id, "modelType": {"name": "Property"}, "value": value})
}

fn welder_definition() -> Value {
    json!({
        "submodels": [
            {
                "idShort": "DataConnection",
                "submodelElements": [
                    prop("CpsId", json!("CPS-001")),
                    prop("Name", json!("Welder")),
                    prop("MqttServer", json!("broker.local")),
                    prop("MqttBaseTopic", json!("/cps/x/u1")),
                ]
            },
            {
                "idShort": "Functions",
                "submodelElements": [{
                    "idShort": "soldagem",
                    "value": [
                        prop("Name", json!("Welding")),
                        prop("AllowedStatuses", json!("ativo|falha|espera|manutencao")),
                    ]
                }]
            }
        ]
    })
}

struct Harness {
    bus: Arc<MemoryBus>,
    recorder: Arc<Recorder>,
    sup: Arc<Supervisor>,
    handle: SupervisorHandle,
}

fn harness() -> Harness {
    let bus = Arc::new(MemoryBus::new());
    let recorder = Arc::new(Recorder::default());
    let subs: Vec<Arc<dyn Subscribe>> = vec![recorder.clone()];
    let sup = SupervisorBuilder::new(Config::default())
        .with_subscribers(subs)
        .build(bus.clone());
    let handle = sup.start().unwrap();
    Harness {
        bus,
        recorder,
        sup,
        handle,
    }
}

async fn eventually<F, Fut>(what: &str, mut check: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    for _ in 0..400 {
        if check().await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached: {what}");
}

async fn running_welder(h: &Harness) {
    h.handle.register(welder_definition()).await.unwrap();
    h.handle.add("welder", true).await.unwrap();
    let bus = h.bus.clone();
    eventually("welder subscribed", || {
        let bus = bus.clone();
        async move { bus.subscribed().len() == 12 }
    })
    .await;
}

#[tokio::test]
async fn test_failure_report_raises_one_high_alert_and_stop_suppresses() {
    let h = harness();
    running_welder(&h).await;

    assert!(h.bus.deliver(STATE, json!({"status": "falha", "ts": 1000}).to_string()));
    let handle = h.handle.clone();
    eventually("alert raised", || {
        let handle = handle.clone();
        async move { handle.alerts().await.unwrap().len() == 1 }
    })
    .await;

    let alert = &h.handle.alerts().await.unwrap()[0];
    assert_eq!(alert.id, "CPS-001-soldagem-1000");
    assert_eq!(alert.severity, Severity::High);
    assert_eq!(alert.unit_name, "Welder");
    let unit = h.handle.unit("CPS-001").await.unwrap().unwrap();
    assert_eq!(unit.features[0].status, FeatureStatus::Failure);

    h.handle.set_run_state("CPS-001", RunState::Stopped).await.unwrap();
    let bus = h.bus.clone();
    eventually("welder unsubscribed", || {
        let bus = bus.clone();
        async move { bus.subscribed().is_empty() }
    })
    .await;

    // A message already in flight when the unit stopped.
    h.bus.inject(STATE, json!({"status": "ativo", "ts": 2000}).to_string());
    let rec = h.recorder.clone();
    eventually("in-flight message discarded", || {
        let rec = rec.clone();
        async move { rec.saw(EventKind::MessageDiscarded, Some("not_running")) }
    })
    .await;

    let unit = h.handle.unit("CPS-001").await.unwrap().unwrap();
    assert_eq!(unit.features[0].status, FeatureStatus::Failure);
    assert_eq!(h.handle.alerts().await.unwrap().len(), 1);

    h.sup.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_bogus_status_is_rejected_without_alert() {
    let h = harness();
    running_welder(&h).await;

    h.bus.deliver(STATE, json!({"status": "bogus"}).to_string());
    let rec = h.recorder.clone();
    eventually("status rejected", || {
        let rec = rec.clone();
        async move { rec.saw(EventKind::StatusRejected, Some("bogus")) }
    })
    .await;

    let unit = h.handle.unit("welder").await.unwrap().unwrap();
    assert_eq!(unit.features[0].status, FeatureStatus::Unknown);
    assert!(unit.features[0].last_update.is_some());
    assert!(h.handle.alerts().await.unwrap().is_empty());

    h.sup.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_reconnect_resubscribes_full_set() {
    let h = harness();
    running_welder(&h).await;

    h.bus.reconnect();
    assert!(h.bus.subscribed().is_empty());
    let bus = h.bus.clone();
    eventually("resubscribed after reconnect", || {
        let bus = bus.clone();
        async move { bus.subscribed().len() == 12 }
    })
    .await;

    let subscribes = h
        .bus
        .calls()
        .iter()
        .filter(|c| matches!(c, BusCall::Subscribe(_)))
        .count();
    assert_eq!(subscribes, 2);

    h.sup.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_connection_error_voids_subscriptions_until_reconnect() {
    let h = harness();
    running_welder(&h).await;

    h.bus.fail("broker reset");
    let rec = h.recorder.clone();
    eventually("connection lost", || {
        let rec = rec.clone();
        async move { rec.saw(EventKind::ConnectionLost, None) }
    })
    .await;
    assert!(h.handle.subscribed().await.unwrap().is_empty());

    h.bus.reconnect();
    let handle = h.handle.clone();
    eventually("engine resubscribed", || {
        let handle = handle.clone();
        async move { handle.subscribed().await.unwrap().len() == 12 }
    })
    .await;

    h.sup.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_reconcile_is_idempotent_on_the_wire() {
    let h = harness();
    running_welder(&h).await;
    let before = h.bus.calls().len();

    h.handle.set_run_state("CPS-001", RunState::Running).await.unwrap();
    assert_eq!(h.handle.add("CPS-001", true).await.unwrap_err().as_label(), "unit_already_active");
    h.handle.names().await.unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert_eq!(h.bus.calls().len(), before);
    h.sup.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_data_topic_telemetry_and_alert_marker() {
    let h = harness();
    running_welder(&h).await;

    h.bus.deliver("cps/x/u1/data", json!({"temp": 21.5}).to_string());
    let handle = h.handle.clone();
    eventually("telemetry cached", || {
        let handle = handle.clone();
        async move { handle.telemetry("welder").await.unwrap().is_some() }
    })
    .await;
    assert_eq!(
        h.handle.telemetry("welder").await.unwrap(),
        Some(Telemetry::Structured(json!({"temp": 21.5})))
    );

    h.bus.deliver(
        "/cps/x/u1/data",
        json!({"type": "alert", "severity": "medium", "component": "Cooler"}).to_string(),
    );
    let handle = h.handle.clone();
    eventually("data alert raised", || {
        let handle = handle.clone();
        async move { !handle.alerts().await.unwrap().is_empty() }
    })
    .await;
    let alert = &h.handle.alerts().await.unwrap()[0];
    assert_eq!(alert.component, "Cooler");
    assert_eq!(alert.severity, Severity::Medium);

    let overview = h.handle.overview().await.unwrap();
    assert_eq!(overview.len(), 1);
    assert!(overview[0].starts_with("Welder (CPS-001) @ broker.local/cps/x/u1 [running]"));

    h.sup.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_unplug_forgets_unit_and_unsubscribes() {
    let h = harness();
    running_welder(&h).await;

    h.handle.unplug("Welder").await.unwrap();
    assert!(h.handle.units().await.unwrap().is_empty());
    assert!(h.handle.names().await.unwrap().is_empty());
    assert_eq!(
        h.handle.unplug("Welder").await.unwrap_err(),
        SupervisorError::NotFound { unit: "Welder".into() }
    );

    let bus = h.bus.clone();
    eventually("unsubscribed after unplug", || {
        let bus = bus.clone();
        async move { bus.subscribed().is_empty() }
    })
    .await;

    h.sup.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_traffic_after_removal_is_dropped() {
    let h = harness();
    running_welder(&h).await;

    assert!(h.handle.remove("welder").await.unwrap());
    h.bus.inject(STATE, json!({"status": "falha", "ts": 1}).to_string());

    let rec = h.recorder.clone();
    eventually("late report discarded", || {
        let rec = rec.clone();
        async move { rec.saw(EventKind::MessageDiscarded, Some("no_owner")) }
    })
    .await;
    assert!(h.handle.alerts().await.unwrap().is_empty());
    assert!(!h.recorder.saw(EventKind::FeatureUpdated, None));
    assert!(!h.recorder.saw(EventKind::AlertRaised, None));

    h.sup.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_duplicate_base_routes_to_first_running_unit() {
    let h = harness();
    let twin = |id: &str| {
        UnitDescriptor::new(id, id, "cps/x")
            .with_feature(FeatureDescriptor::new("weld", "Weld").with_allowed(["ativo", "falha"]))
    };
    h.handle.register_descriptor(twin("A")).await.unwrap();
    h.handle.register_descriptor(twin("B")).await.unwrap();
    h.handle.add("A", true).await.unwrap();
    h.handle.add("B", false).await.unwrap();

    let bus = h.bus.clone();
    eventually("first unit subscribed", || {
        let bus = bus.clone();
        async move { bus.subscribed().len() == 12 }
    })
    .await;
    assert!(h.bus.deliver("cps/x/feat/weld/$state", json!({"status": "falha"}).to_string()));

    let handle = h.handle.clone();
    eventually("first unit updated", || {
        let handle = handle.clone();
        async move {
            handle
                .unit("A")
                .await
                .unwrap()
                .is_some_and(|u| u.features[0].status == FeatureStatus::Failure)
        }
    })
    .await;
    let twin_b = h.handle.unit("B").await.unwrap().unwrap();
    assert_eq!(twin_b.features[0].status, FeatureStatus::Unknown);
    let alerts = h.handle.alerts().await.unwrap();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].unit_id, "A");

    h.sup.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_invalid_definition_is_returned_to_caller() {
    let h = harness();
    let err = h.handle.register(json!({"submodels": "nope"})).await.unwrap_err();
    assert_eq!(err.as_label(), "invalid_definition");
    assert!(h.handle.names().await.unwrap().is_empty());
    h.sup.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_start_twice_and_calls_after_shutdown() {
    let h = harness();
    assert_eq!(h.sup.start().unwrap_err(), SupervisorError::AlreadyStarted);

    h.sup.shutdown().await.unwrap();
    assert!(h.bus.calls().contains(&BusCall::Disconnect));
    assert_eq!(h.handle.names().await.unwrap_err(), SupervisorError::Closed);

    let rec = h.recorder.clone();
    eventually("shutdown announced", || {
        let rec = rec.clone();
        async move { rec.saw(EventKind::ShutdownRequested, None) }
    })
    .await;
}

#[tokio::test]
async fn test_definitions_loaded_from_directory() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("welder.json"),
        serde_json::to_vec(&welder_definition()).unwrap(),
    )
    .unwrap();

    let h = harness();
    for raw in unitvisor::load_definitions(dir.path()).await.unwrap() {
        h.handle.register(raw).await.unwrap();
    }
    assert_eq!(h.handle.names().await.unwrap(), vec!["Welder".to_string()]);
    h.sup.shutdown().await.unwrap();
}
