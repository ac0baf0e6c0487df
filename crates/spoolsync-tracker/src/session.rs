use std::path::PathBuf;
use std::sync::Arc;

use serde_json::Value;
use spoolsync_history::{HistoryStore, NewFilamentUsage, NewPrint, PrintId};
use spoolsync_inventory::{ActiveTrayRegistry, TrayLayout};
use spoolsync_plan::{PlanSource, UsagePlan};
use tracing::{debug, info, warn};

use crate::detect::{NO_TRAY, StageEvent, detect, project_file_url};
use crate::mapping::{PendingMapping, TrayMapping};
use crate::reconcile::{ReconcileReport, reconcile};
use crate::state::{PrinterState, as_int, bool_at, int_at, lookup};

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub layout: TrayLayout,
    /// Start jobs and book consumption. When off, state is still tracked.
    pub auto_spend: bool,
    /// Where plate thumbnails are written; `None` skips them.
    pub thumbnail_dir: Option<PathBuf>,
}

impl SessionConfig {
    pub fn new(layout: TrayLayout) -> Self {
        Self {
            layout,
            auto_spend: true,
            thumbnail_dir: None,
        }
    }
}

/// What one processed message led to.
#[derive(Debug, Default)]
pub struct CycleOutcome {
    pub events: Vec<StageEvent>,
    pub reconciled: Vec<ReconcileReport>,
}

/// Owns everything a single printer's telemetry stream mutates.
pub struct TrackerSession {
    state: PrinterState,
    pending: Option<PendingMapping>,
    registry: ActiveTrayRegistry,
    plans: Arc<dyn PlanSource>,
    history: HistoryStore,
    config: SessionConfig,
    last_cloud_url: Option<String>,
}

impl TrackerSession {
    pub fn new(
        registry: ActiveTrayRegistry,
        plans: Arc<dyn PlanSource>,
        history: HistoryStore,
        config: SessionConfig,
    ) -> Self {
        Self {
            state: PrinterState::new(),
            pending: None,
            registry,
            plans,
            history,
            config,
            last_cloud_url: None,
        }
    }

    pub fn state(&self) -> &PrinterState {
        &self.state
    }

    pub fn pending(&self) -> Option<&PendingMapping> {
        self.pending.as_ref()
    }

    pub fn registry(&self) -> &ActiveTrayRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut ActiveTrayRegistry {
        &mut self.registry
    }

    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Fold one telemetry report into the session and act on any transition
    /// it causes. The previous-state snapshot is taken last.
    pub async fn process_message(&mut self, delta: &Value) -> CycleOutcome {
        let mut outcome = CycleOutcome::default();
        if !delta.is_object() {
            debug!("ignoring non-object telemetry message");
            return outcome;
        }
        self.state.apply(delta);

        if self.config.auto_spend {
            if let Some(url) = project_file_url(delta) {
                if self.last_cloud_url.as_deref() != Some(url) {
                    let url = url.to_string();
                    if let Some(report) = self.start_cloud_job(url).await {
                        outcome.reconciled.push(report);
                    }
                }
            }

            let events = detect(self.state.previous(), self.state.current());
            for event in &events {
                let report = match event {
                    StageEvent::JobStarted { file } => self.start_job(file).await,
                    StageEvent::FilamentChange { target_tray } => {
                        self.filament_change(*target_tray).await
                    }
                };
                outcome.reconciled.extend(report);
            }
            outcome.events = events;
        }

        self.state.commit();
        outcome
    }

    async fn start_job(&mut self, file: &str) -> Option<ReconcileReport> {
        if let Some(stale) = self.pending.take() {
            warn!(
                file = %stale.plan().file,
                mapped = stale.mapping().len(),
                "discarding incomplete tray mapping"
            );
        }
        info!(%file, "print job started");
        let external = self.uses_external_spool();
        self.forget_job_fields();

        let plan = load_plan(self.plans.as_ref(), file).await?;
        let print_id = self.record_print(&plan, "local");

        if external {
            info!(%file, "job prints from the external spool");
            return Some(self.settle(&plan, None, print_id).await);
        }

        let loaded = int_at(self.state.current(), &["print", "ams", "tray_tar"]).unwrap_or(NO_TRAY);
        let mut pending = PendingMapping::new(plan, print_id);
        pending.map_filament(loaded);
        self.pending = Some(pending);
        None
    }

    async fn filament_change(&mut self, target_tray: i64) -> Option<ReconcileReport> {
        let Some(pending) = self.pending.as_mut() else {
            debug!(tray = target_tray, "tray change outside of a tracked job");
            return None;
        };
        if !pending.map_filament(target_tray) {
            return None;
        }
        let (plan, print_id, mapping) = self.pending.take()?.into_parts();
        Some(self.settle(&plan, Some(&mapping), print_id).await)
    }

    async fn start_cloud_job(&mut self, url: String) -> Option<ReconcileReport> {
        info!(%url, "cloud print job announced");
        self.last_cloud_url = Some(url.clone());

        let current = self.state.current();
        let mapping = if bool_at(current, &["print", "use_ams"]) == Some(true) {
            let trays: Vec<i64> = lookup(current, &["print", "ams_mapping"])
                .and_then(Value::as_array)
                .map(|entries| entries.iter().map(|v| as_int(v).unwrap_or(-1)).collect())
                .unwrap_or_default();
            Some(TrayMapping::from_printer_mapping(&trays))
        } else {
            None
        };
        self.forget_job_fields();

        let plan = load_plan(self.plans.as_ref(), &url).await?;
        let print_id = self.record_print(&plan, "cloud");
        Some(self.settle(&plan, mapping.as_ref(), print_id).await)
    }

    /// `use_ams` and `ams_mapping` arrive with a job's command echo; they must
    /// not decide how a later job is routed.
    fn forget_job_fields(&mut self) {
        self.state.forget(&["print", "use_ams"]);
        self.state.forget(&["print", "ams_mapping"]);
    }

    /// An explicit `use_ams: false`, or no AMS telemetry at all.
    fn uses_external_spool(&self) -> bool {
        let current = self.state.current();
        bool_at(current, &["print", "use_ams"]) == Some(false)
            || lookup(current, &["print", "ams"]).is_none()
    }

    async fn settle(
        &mut self,
        plan: &UsagePlan,
        mapping: Option<&TrayMapping>,
        print_id: Option<PrintId>,
    ) -> ReconcileReport {
        let report = reconcile(&mut self.registry, &self.config.layout, plan, mapping).await;
        if let Some(print_id) = print_id {
            for (slot, spool) in &report.resolved {
                if let Err(err) = self.history.update_filament_spool(print_id, *slot, *spool) {
                    warn!(print = print_id, slot, error = %err, "failed to link spool in history");
                }
            }
        }
        report
    }

    fn record_print(&self, plan: &UsagePlan, print_type: &str) -> Option<PrintId> {
        let mut print = NewPrint::new(&plan.file, print_type);
        print.image_file = self.save_thumbnail(plan);

        let print_id = match self.history.insert_print(&print) {
            Ok(id) => id,
            Err(err) => {
                warn!(file = %plan.file, error = %err, "failed to record print");
                return None;
            }
        };
        for usage in plan.slots.values() {
            let row = NewFilamentUsage {
                slot: usage.slot,
                filament_type: usage.material.clone().unwrap_or_default(),
                color: usage.color.clone().unwrap_or_default(),
                grams_used: usage.grams,
            };
            if let Err(err) = self.history.insert_filament_usage(print_id, &row) {
                warn!(print = print_id, slot = usage.slot, error = %err, "failed to record filament usage");
            }
        }
        Some(print_id)
    }

    fn save_thumbnail(&self, plan: &UsagePlan) -> Option<String> {
        let dir = self.config.thumbnail_dir.as_ref()?;
        let png = plan.thumbnail.as_ref()?;
        let name = format!("{}.png", chrono::Local::now().format("%Y%m%d%H%M%S"));
        let path = dir.join(&name);
        let written = std::fs::create_dir_all(dir).and_then(|_| std::fs::write(&path, png));
        match written {
            Ok(()) => Some(name),
            Err(err) => {
                warn!(path = %path.display(), error = %err, "failed to save plate thumbnail");
                None
            }
        }
    }
}

async fn load_plan(plans: &dyn PlanSource, reference: &str) -> Option<UsagePlan> {
    match plans.fetch_plan(reference).await {
        Ok(plan) => Some(plan),
        Err(err) => {
            warn!(file = %reference, error = %err, "no usage plan; job will not be booked");
            None
        }
    }
}
