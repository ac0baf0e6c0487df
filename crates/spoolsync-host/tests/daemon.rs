use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use spoolsync_history::HistoryStore;
use spoolsync_host::{ChannelTransport, HostConfig, NdjsonReplay, TrackerDaemon, open_session};
use spoolsync_inventory::{
    ActiveTrayRegistry, MemInventory, Spool, TAG_FIELD, TrayLayout, encode_extra_value,
};
use spoolsync_plan::{PlanError, PlanResult, PlanSource, SlotUsage, UsagePlan};
use spoolsync_tracker::{SessionConfig, TrackerSession};
use tokio::sync::broadcast;

struct OnePlan(UsagePlan);

#[async_trait]
impl PlanSource for OnePlan {
    async fn fetch_plan(&self, reference: &str) -> PlanResult<UsagePlan> {
        if reference == self.0.file {
            Ok(self.0.clone())
        } else {
            Err(PlanError::MissingEntry(reference.to_string()))
        }
    }
}

fn tagged(id: i64, tag: &str) -> Spool {
    let mut spool = Spool::new(id);
    spool.extra.insert(TAG_FIELD.into(), encode_extra_value(tag));
    spool
}

const LOG: &str = r#"{"print":{"gcode_state":"PREPARE","print_type":"local","gcode_file":"cube.3mf","stg_cur":0,"ams":{"tray_tar":"255","ams":[{"id":"0","humidity":"5","temp":"25.0","tray":[{"id":"1","tray_uuid":"AAAA","tray_sub_brands":"PLA Basic"}]}]}}}
{"print":{"gcode_state":"RUNNING"}}
garbage line
{"print":{"stg_cur":4,"ams":{"tray_tar":"1"}}}
"#;

#[tokio::test]
async fn replayed_log_assigns_tray_and_books_job() {
    let inventory = MemInventory::new([tagged(5, "AAAA")]);
    let plan = UsagePlan::new("cube.3mf")
        .with_slot(SlotUsage::new(1, 12.5))
        .with_order(BTreeMap::from([(1, 0)]));
    let session = TrackerSession::new(
        ActiveTrayRegistry::new(Arc::new(inventory.clone())),
        Arc::new(OnePlan(plan)),
        HistoryStore::open_in_memory().expect("history"),
        SessionConfig::new(TrayLayout::for_printer("P1S")),
    );
    let (_shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let mut daemon = TrackerDaemon::new(NdjsonReplay::new(LOG.as_bytes()), session, shutdown_rx);

    let stats = daemon.run().await.expect("run");

    assert_eq!(stats.messages, 3);
    assert_eq!(stats.jobs_started, 1);
    assert_eq!(stats.filament_changes, 1);
    assert_eq!(stats.reconciliations, 1);
    assert_eq!(stats.trays_assigned, 1);
    assert_eq!(stats.grams_booked, 12.5);
    assert_eq!(inventory.deductions(), vec![(5, 12.5)]);

    let published = daemon.transport().published();
    assert_eq!(published.len(), 2);
    assert!(published.iter().all(|p| p.topic == "device/P1S/request"));
    assert_eq!(published[0].payload["info"]["command"], "get_version");
    assert_eq!(published[1].payload["pushing"]["command"], "pushall");
    assert!(daemon.scanner().last_config().ams.is_some());

    let trays = daemon.tray_status();
    assert_eq!(trays.len(), 1);
    assert_eq!(trays[0].tray, "P1S_0_1");
    assert!(trays[0].matched);
    assert_eq!(trays[0].spool, Some(5));
}

#[tokio::test]
async fn shutdown_signal_stops_daemon() {
    let dir = tempfile::tempdir().expect("tmp");
    let config = HostConfig {
        printer_id: "P1S".into(),
        history_db: dir.path().join("history.db"),
        ..HostConfig::default()
    };
    let session = open_session(&config, Arc::new(MemInventory::default()), None).expect("session");
    let (transport, inbound, mut outbound) = ChannelTransport::pair(8);
    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let mut daemon = TrackerDaemon::new(transport, session, shutdown_rx);

    let driver = async {
        let first = outbound.recv().await.expect("announce");
        assert_eq!(first.topic, "device/P1S/request");
        inbound
            .send(json!({"print": {"gcode_state": "IDLE"}}))
            .await
            .expect("send");
        shutdown_tx.send(()).expect("signal");
    };
    let (result, ()) = tokio::join!(daemon.run(), driver);

    assert!(result.is_ok());
    assert!(dir.path().join("history.db").exists());
}

#[tokio::test]
async fn bare_file_names_need_a_printer_store() {
    let dir = tempfile::tempdir().expect("tmp");
    let config = HostConfig {
        printer_id: "P1S".into(),
        auto_spend: true,
        history_db: dir.path().join("data").join("history.db"),
        ..HostConfig::default()
    };
    let inventory = MemInventory::new([Spool::new(1)]);
    let mut session =
        open_session(&config, Arc::new(inventory.clone()), None).expect("session");

    session
        .process_message(&json!({"print": {"gcode_state": "PREPARE", "print_type": "local", "gcode_file": "cube.3mf", "ams": {"tray_tar": "255"}}}))
        .await;
    let outcome = session
        .process_message(&json!({"print": {"gcode_state": "RUNNING"}}))
        .await;

    assert_eq!(outcome.events.len(), 1);
    assert!(outcome.reconciled.is_empty());
    assert!(session.pending().is_none());
    assert!(inventory.deductions().is_empty());
    assert!(session.history().prints_with_filament().expect("history").is_empty());
}
