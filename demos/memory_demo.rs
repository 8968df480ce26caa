//! # Example: memory_demo
//!
//! Supervises one welding unit over the in-memory bus and prints what the
//! operator would see.
//!
//! ## Flow
//! ```text
//! register(definition) ──► add("welder", running) ──► subscribe 12 topics
//!   ├─► data:   {"temp": 21.5}            ─► telemetry cached
//!   ├─► $state: {"status": "falha"}       ─► Failure + high alert
//!   └─► stop ──► unsubscribe, later traffic discarded
//! ```
//!
//! ## Run
//! ```bash
//! RUST_LOG=debug cargo run --example memory_demo
//! ```

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tracing_subscriber::EnvFilter;
use unitvisor::{Config, LogWriter, MemoryBus, RunState, Subscribe, SupervisorBuilder};

#[tokio::main(flavor = "multi_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let bus = Arc::new(MemoryBus::new());
    let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter::new())];
    let sup = SupervisorBuilder::new(Config::default())
        .with_subscribers(subs)
        .build(bus.clone());
    let handle = sup.start()?;

    handle
        .register(json!({
            "submodels": [
                {
                    "idShort": "DataConnection",
                    "submodelElements": [
                        { "idShort": "CpsId", "modelType": "Property", "value": "CPS-001" },
                        { "idShort": "Name", "modelType": "Property", "value": "Welder" },
                        { "idShort": "MqttBaseTopic", "modelType": "Property", "value": "/cps/demo/u1" }
                    ]
                },
                {
                    "idShort": "Functions",
                    "submodelElements": [{
                        "idShort": "soldagem",
                        "value": [
                            { "idShort": "Name", "modelType": "Property", "value": "Welding" },
                            { "idShort": "AllowedStatuses", "modelType": "Property", "value": "ativo|falha|manutencao" }
                        ]
                    }]
                }
            ]
        }))
        .await?;
    handle.add("welder", true).await?;
    tokio::time::sleep(Duration::from_millis(50)).await;

    bus.deliver("cps/demo/u1/data", json!({"temp": 21.5}).to_string());
    bus.deliver(
        "/cps/demo/u1/feat/soldagem/$state",
        json!({"status": "FALHA", "details": {"code": 7}}).to_string(),
    );
    tokio::time::sleep(Duration::from_millis(50)).await;

    for line in handle.overview().await? {
        println!("{line}");
    }
    for alert in handle.alerts().await? {
        println!("alert {} [{}] {}", alert.id, alert.severity, alert.component);
    }

    handle.set_run_state("CPS-001", RunState::Stopped).await?;
    bus.inject("cps/demo/u1/data", json!({"temp": 99}).to_string());
    tokio::time::sleep(Duration::from_millis(50)).await;
    println!("telemetry after stop: {:?}", handle.telemetry("welder").await?);

    sup.shutdown().await?;
    Ok(())
}
