use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use spoolsync_inventory::{
    ACTIVE_TRAY_FIELD, ActiveTrayRegistry, Inventory, InventoryCall, InventoryError,
    InventoryResult, InventorySettings, MemInventory, Spool, SpoolId, TAG_FIELD, TrayLayout,
    encode_extra_value,
};

/// Fails the next `patch_extra` for one spool, then behaves normally.
struct FlakyInventory {
    inner: MemInventory,
    fail_patch: Mutex<Option<SpoolId>>,
}

impl FlakyInventory {
    fn new(inner: MemInventory, fail_patch: SpoolId) -> Self {
        Self {
            inner,
            fail_patch: Mutex::new(Some(fail_patch)),
        }
    }
}

#[async_trait]
impl Inventory for FlakyInventory {
    async fn list_spools(&self) -> InventoryResult<Vec<Spool>> {
        self.inner.list_spools().await
    }

    async fn get_spool(&self, id: SpoolId) -> InventoryResult<Spool> {
        self.inner.get_spool(id).await
    }

    async fn settings(&self) -> InventoryResult<InventorySettings> {
        self.inner.settings().await
    }

    async fn patch_extra(
        &self,
        id: SpoolId,
        extra: &BTreeMap<String, String>,
    ) -> InventoryResult<Spool> {
        let fail = {
            let mut pending = self.fail_patch.lock().unwrap();
            if *pending == Some(id) {
                *pending = None;
                true
            } else {
                false
            }
        };
        if fail {
            return Err(InventoryError::Status {
                status: 503,
                body: "unavailable".into(),
            });
        }
        self.inner.patch_extra(id, extra).await
    }

    async fn use_weight(&self, id: SpoolId, grams: f64) -> InventoryResult<Spool> {
        self.inner.use_weight(id, grams).await
    }
}

fn holders(inventory: &MemInventory, ids: &[SpoolId], key: &str) -> Vec<SpoolId> {
    ids.iter()
        .copied()
        .filter(|id| inventory.spool(*id).is_some_and(|s| s.is_active_for(key)))
        .collect()
}

fn spool(id: i64) -> Spool {
    Spool::new(id)
}

fn spool_in(id: i64, tray_key: &str) -> Spool {
    let mut spool = Spool::new(id);
    spool
        .extra
        .insert(ACTIVE_TRAY_FIELD.into(), encode_extra_value(tray_key));
    spool
}

async fn registry_with(spools: Vec<Spool>) -> (ActiveTrayRegistry, MemInventory) {
    let inventory = MemInventory::new(spools);
    let mut registry = ActiveTrayRegistry::new(Arc::new(inventory.clone()));
    registry.refresh().await.expect("refresh");
    (registry, inventory)
}

#[tokio::test]
async fn later_assignment_takes_over_tray() {
    let layout = TrayLayout::for_printer("P1S");
    let tray = layout.in_unit(0, 1);
    let (mut registry, inventory) = registry_with(vec![spool(1), spool(2)]).await;

    assert!(registry.set_active(1, &tray).await.expect("assign A"));
    assert_eq!(registry.resolve(&tray), Some(1));

    assert!(registry.set_active(2, &tray).await.expect("assign B"));
    assert_eq!(registry.resolve(&tray), Some(2));

    let first = inventory.spool(1).expect("spool 1");
    assert_eq!(first.active_tray(), None);
    assert!(!first.is_active_for(&tray.key()));
    assert_eq!(
        inventory.spool(2).and_then(|s| s.active_tray()).as_deref(),
        Some("P1S_0_1")
    );
}

#[tokio::test]
async fn reassigning_same_tray_is_a_noop() {
    let layout = TrayLayout::for_printer("P1S");
    let tray = layout.in_unit(0, 2);
    let (mut registry, inventory) = registry_with(vec![spool_in(5, &tray.key())]).await;

    assert!(!registry.set_active(5, &tray).await.expect("assign"));
    assert!(inventory.calls().is_empty());
}

#[tokio::test]
async fn assignment_keeps_other_extras() {
    let layout = TrayLayout::for_printer("P1S");
    let tray = layout.in_unit(1, 0);
    let mut tagged = spool(3);
    tagged
        .extra
        .insert(TAG_FIELD.into(), encode_extra_value("C0FFEE"));
    let (mut registry, inventory) = registry_with(vec![tagged]).await;

    registry.set_active(3, &tray).await.expect("assign");

    let calls = inventory.calls();
    assert_eq!(calls.len(), 1);
    let InventoryCall::PatchExtra { spool, extra } = &calls[0] else {
        panic!("expected patch, got {:?}", calls[0]);
    };
    assert_eq!(*spool, 3);
    assert_eq!(extra.get(TAG_FIELD).map(String::as_str), Some("\"C0FFEE\""));
    assert_eq!(
        extra.get(ACTIVE_TRAY_FIELD).map(String::as_str),
        Some("\"P1S_1_0\"")
    );
    assert_eq!(registry.spool_by_tag("C0FFEE").map(|s| s.id), Some(3));
}

#[tokio::test]
async fn spool_missing_from_cache_is_fetched() {
    let layout = TrayLayout::for_printer("P1S");
    let tray = layout.external();
    let inventory = MemInventory::new(vec![]);
    let mut registry = ActiveTrayRegistry::new(Arc::new(inventory.clone()));
    inventory.insert(spool(11));

    assert!(registry.set_active(11, &tray).await.expect("assign"));
    assert_eq!(registry.resolve(&tray), Some(11));
}

#[tokio::test]
async fn unknown_tray_resolves_to_none() {
    let layout = TrayLayout::for_printer("P1S");
    let (registry, _) = registry_with(vec![spool_in(1, "P1S_0_0")]).await;
    assert_eq!(registry.resolve(&layout.in_unit(0, 3)), None);
}

#[tokio::test]
async fn failed_release_keeps_single_holder_and_retry_recovers() {
    let layout = TrayLayout::for_printer("P1S");
    let tray = layout.in_unit(0, 1);
    let key = tray.key();
    let inventory = MemInventory::new(vec![spool_in(1, &key), spool(2)]);
    let mut registry =
        ActiveTrayRegistry::new(Arc::new(FlakyInventory::new(inventory.clone(), 1)));
    registry.refresh().await.expect("refresh");

    assert!(registry.set_active(2, &tray).await.is_err());
    assert_eq!(holders(&inventory, &[1, 2], &key), vec![1]);
    assert_eq!(registry.resolve(&tray), Some(1));

    assert!(registry.set_active(2, &tray).await.expect("retry"));
    assert_eq!(holders(&inventory, &[1, 2], &key), vec![2]);
    assert_eq!(registry.resolve(&tray), Some(2));
}

#[tokio::test]
async fn active_spool_with_competing_holder_is_not_a_noop() {
    let layout = TrayLayout::for_printer("P1S");
    let tray = layout.in_unit(0, 3);
    let key = tray.key();
    let (mut registry, inventory) =
        registry_with(vec![spool_in(1, &key), spool_in(2, &key)]).await;

    assert!(registry.set_active(2, &tray).await.expect("assign"));
    assert_eq!(holders(&inventory, &[1, 2], &key), vec![2]);
    assert_eq!(registry.resolve(&tray), Some(2));
    // Spool 2 already held the tray; only spool 1 is patched.
    assert_eq!(inventory.calls().len(), 1);

    assert!(!registry.set_active(2, &tray).await.expect("again"));
}
