//! The generic reconciliation engine.
//!
//! [`MoMgrImpl`] implements every northbound and transaction operation in
//! terms of a [`MoMgr`] hook set, a [`ConfigStore`] handle and three
//! external collaborators:
//!
//! - a [`CapabilityIndex`] consulted before create and detail reads
//! - a [`DriverClient`] delivering records to controllers
//! - a [`ConfigNotifier`] receiving committed changes
//!
//! The store handle is never owned by the engine. Each operation borrows it
//! for the duration of one call chain.

mod audit;
mod crud;
pub(crate) mod import;
mod plane;
mod read;
pub(crate) mod rename;
mod tx;

pub use audit::{AuditContext, AuditDiffStatus};
pub use import::ImportType;

use crate::capability::{
    check_attributes, check_instance_count, CapabilityIndex, StaticCapabilityTable,
};
use crate::config::EngineConfig;
use crate::driver::{DriverClient, DriverRequest, DriverResponse, DriverResultCode};
use crate::kt::default_registry;
use crate::momgr::{read_main, MoMgr, MoMgrRegistry};
use crate::notify::ConfigNotifier;
use crate::status::{consolidated_attr_status, consolidated_status};
use crate::{is_absent, is_exhausted, UpllError, UpllResult};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, trace};
use upll_dal::{ConfigStore, DbSubOp, DiffRecord, DiffSpec, MatchOpts, UpdateOp};
use upll_types::{
    ConfigKey, ConfigKeyVal, ConfigVal, DataType, InterfaceType, KeyFlowList, KeyType, KeyVrtIf,
    KeyVtn, Operation, Option1, Option2, RecordFlags, RecordStatus, RenameComponent, TableRole,
    ValVtnCtrlrSpan,
};

/// Engine statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MoMgrStats {
    /// Number of records created.
    pub creates: u64,
    /// Number of records updated.
    pub updates: u64,
    /// Number of records deleted, cascaded children included.
    pub deletes: u64,
    /// Number of renames applied.
    pub renames: u64,
    /// Number of read requests served.
    pub reads: u64,
    /// Number of requests sent to a driver.
    pub driver_requests: u64,
    /// Number of driver requests that failed at the transport or were
    /// answered with an error.
    pub driver_failures: u64,
    /// Number of records an audit could not push.
    pub audit_failures: u64,
    /// Benign absences folded into success.
    pub folded_absences: u64,
    /// Number of records queued by the transaction update phase.
    pub tx_records_queued: u64,
}

/// Live counters behind [`MoMgrStats`].
#[derive(Debug, Default)]
struct Counters {
    creates: AtomicU64,
    updates: AtomicU64,
    deletes: AtomicU64,
    renames: AtomicU64,
    reads: AtomicU64,
    driver_requests: AtomicU64,
    driver_failures: AtomicU64,
    audit_failures: AtomicU64,
    folded_absences: AtomicU64,
    tx_records_queued: AtomicU64,
}

fn bump(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
}

/// The reconciliation engine.
pub struct MoMgrImpl {
    registry: MoMgrRegistry,
    capabilities: Arc<dyn CapabilityIndex>,
    driver: Arc<dyn DriverClient>,
    notifier: Arc<dyn ConfigNotifier>,
    config: EngineConfig,
    counters: Counters,
}

impl fmt::Debug for MoMgrImpl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MoMgrImpl")
            .field("key_types", &self.registry.keys().collect::<Vec<_>>())
            .field("config", &self.config)
            .field("stats", &self.stats())
            .finish()
    }
}

impl MoMgrImpl {
    /// Creates an engine with every built-in key type registered.
    ///
    /// The capability index is the static table of `config`, empty if the
    /// configuration has none.
    pub fn new(
        config: EngineConfig,
        driver: Arc<dyn DriverClient>,
        notifier: Arc<dyn ConfigNotifier>,
    ) -> Self {
        let capabilities: Arc<dyn CapabilityIndex> =
            Arc::new(config.capabilities.clone().unwrap_or_else(StaticCapabilityTable::new));
        Self {
            registry: default_registry(),
            capabilities,
            driver,
            notifier,
            config,
            counters: Counters::default(),
        }
    }

    /// Replaces the capability index.
    pub fn with_capabilities(mut self, capabilities: Arc<dyn CapabilityIndex>) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Replaces the key type managers.
    pub fn with_registry(mut self, registry: MoMgrRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Returns the engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Returns a snapshot of the engine counters.
    pub fn stats(&self) -> MoMgrStats {
        let c = &self.counters;
        MoMgrStats {
            creates: c.creates.load(Ordering::Relaxed),
            updates: c.updates.load(Ordering::Relaxed),
            deletes: c.deletes.load(Ordering::Relaxed),
            renames: c.renames.load(Ordering::Relaxed),
            reads: c.reads.load(Ordering::Relaxed),
            driver_requests: c.driver_requests.load(Ordering::Relaxed),
            driver_failures: c.driver_failures.load(Ordering::Relaxed),
            audit_failures: c.audit_failures.load(Ordering::Relaxed),
            folded_absences: c.folded_absences.load(Ordering::Relaxed),
            tx_records_queued: c.tx_records_queued.load(Ordering::Relaxed),
        }
    }

    pub(crate) fn driver(&self) -> Arc<dyn DriverClient> {
        Arc::clone(&self.driver)
    }

    /// Returns the manager of `kt`.
    pub fn manager(&self, kt: KeyType) -> UpllResult<&dyn MoMgr> {
        self.registry
            .get(&kt)
            .map(|m| m.as_ref())
            .ok_or_else(|| UpllError::bad_request(format!("no manager for {}", kt)))
    }

    /// Registered managers, parent-first.
    pub(crate) fn managers(&self) -> impl Iterator<Item = &dyn MoMgr> + '_ {
        KeyType::ALL
            .iter()
            .filter_map(|kt| self.registry.get(kt).map(|m| m.as_ref()))
    }

    /// Folds "nothing found" into an empty batch.
    ///
    /// Used at existence checks and enumeration reads only.
    pub(crate) fn absent_as_empty(
        &self,
        result: Result<Vec<ConfigKeyVal>, upll_dal::DalError>,
    ) -> UpllResult<Vec<ConfigKeyVal>> {
        match result.map_err(UpllError::from) {
            Err(e) if is_absent(&e) => {
                bump(&self.counters.folded_absences);
                Ok(Vec::new())
            }
            other => other,
        }
    }

    /// Returns whether `pattern` selects a row of `table` in `dt`.
    pub(crate) fn exists(
        &self,
        store: &dyn ConfigStore,
        pattern: &ConfigKeyVal,
        dt: DataType,
        matching: MatchOpts,
        table: TableRole,
    ) -> UpllResult<bool> {
        Ok(store.record_exists(pattern, dt, &matching, table)?)
    }

    /// Checks the capability index for `op` on `ctrlr`.
    ///
    /// Create checks the instance limit and the create bitmap, update the
    /// create bitmap, STATE reads the state bitmap and other reads the read
    /// bitmap.
    pub fn validate_capability(
        &self,
        store: &dyn ConfigStore,
        op: Operation,
        dt: DataType,
        ckv: &ConfigKeyVal,
        ctrlr: &str,
    ) -> UpllResult<()> {
        let kt = ckv.key_type();
        let mgr = self.manager(kt)?;
        let flags = mgr.capability_flags(ckv);
        let missing = |what: &str| UpllError::not_supported(ctrlr, format!("{} of {}", what, kt));
        match op {
            Operation::Create => {
                let entry = self
                    .capabilities
                    .get_create_capability(ctrlr, kt)
                    .ok_or_else(|| missing("create"))?;
                let pattern = ConfigKeyVal::new(ConfigKey::empty(kt)).on_ctrlr(ctrlr, "");
                let count = store.record_count(
                    &pattern,
                    dt,
                    &DbSubOp::read_multiple().with_matching(MatchOpts::ctrlr()),
                    mgr.push_table(),
                )?;
                check_instance_count(ctrlr, &entry, count)?;
                check_attributes(ctrlr, kt, &entry, &flags)
            }
            Operation::Update => {
                let entry = self
                    .capabilities
                    .get_create_capability(ctrlr, kt)
                    .ok_or_else(|| missing("update"))?;
                check_attributes(ctrlr, kt, &entry, &flags)
            }
            op if op.is_read() => {
                let entry = if dt == DataType::State {
                    self.capabilities.get_state_capability(ctrlr, kt)
                } else {
                    self.capabilities.get_read_capability(ctrlr, kt)
                }
                .ok_or_else(|| missing("read"))?;
                check_attributes(ctrlr, kt, &entry, &flags)
            }
            _ => Ok(()),
        }
    }

    /// Copies controller, domain and lineage flags from the parent's MAIN
    /// row into `ckv`.
    pub fn inherit_from_parent(
        &self,
        store: &dyn ConfigStore,
        ckv: &mut ConfigKeyVal,
        dt: DataType,
    ) -> UpllResult<()> {
        let Some(parent_key) = ckv.key.parent() else {
            return Ok(());
        };
        let parent = match read_main(store, &ConfigKeyVal::new(parent_key.clone()), dt) {
            Ok(p) => p,
            Err(e) if is_absent(&e) => {
                return Err(UpllError::ParentDoesNotExist(parent_key.to_string()))
            }
            Err(e) => return Err(e),
        };
        ckv.user_data.ctrlr_id = parent.user_data.ctrlr_id.clone();
        ckv.user_data.domain_id = parent.user_data.domain_id.clone();
        ckv.user_data.flags.inherit(&parent.flags());
        Ok(())
    }

    /// Sends one record to one controller's driver.
    ///
    /// A transport failure is returned as [`UpllError::DriverTransport`];
    /// a delivered response is returned as is, whatever its result code.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn send_to_driver(
        &self,
        ctrlr: &str,
        domain: &str,
        op: Operation,
        dt: DataType,
        option1: Option1,
        payload: ConfigKeyVal,
        synchronous: bool,
    ) -> UpllResult<DriverResponse> {
        let request = DriverRequest {
            ctrlr_id: ctrlr.to_string(),
            domain_id: domain.to_string(),
            service_name: self.config.driver_service_name.clone(),
            service_version: self.config.driver_service_version,
            operation: op,
            datatype: dt,
            option1,
            option2: Option2::None,
            ckv: payload,
        };
        bump(&self.counters.driver_requests);
        debug!(
            ctrlr = %ctrlr,
            domain = %domain,
            op = %op,
            dt = %dt,
            key = %request.ckv.key,
            "sending request to driver"
        );
        self.driver
            .send_req_to_driver(&request, synchronous)
            .map_err(|e| {
                bump(&self.counters.driver_failures);
                UpllError::DriverTransport {
                    ctrlr: e.ctrlr_id,
                    message: e.message,
                }
            })
    }

    /// Turns a non-success driver result code into an error.
    pub(crate) fn check_response(
        &self,
        ctrlr: &str,
        response: DriverResponse,
    ) -> UpllResult<Option<ConfigKeyVal>> {
        match response.result_code {
            DriverResultCode::Success => Ok(response.ckv),
            DriverResultCode::CtrDisconnected => {
                bump(&self.counters.driver_failures);
                Err(UpllError::CtrDisconnected(ctrlr.to_string()))
            }
            code => {
                bump(&self.counters.driver_failures);
                Err(UpllError::DriverResult {
                    ctrlr: ctrlr.to_string(),
                    code,
                })
            }
        }
    }

    /// Walks a diff cursor to the end, handing each row to `f`.
    ///
    /// Cursor exhaustion ends the walk with success. Any other error, from
    /// the store or from `f`, ends it with that error. The cursor is closed
    /// exactly once on every path.
    pub(crate) fn drain_diff<F>(
        &self,
        store: &mut dyn ConfigStore,
        spec: &DiffSpec,
        mut f: F,
    ) -> UpllResult<()>
    where
        F: FnMut(&mut dyn ConfigStore, DiffRecord) -> UpllResult<()>,
    {
        let mut cursor = store.open_diff_cursor(spec)?;
        let result = loop {
            match store.next_record(&mut cursor) {
                Ok(record) => {
                    if let Err(e) = f(&mut *store, record) {
                        break Err(e);
                    }
                }
                Err(e) => {
                    let e = UpllError::from(e);
                    if is_exhausted(&e) {
                        trace!(cursor = cursor.id(), "diff cursor exhausted");
                        bump(&self.counters.folded_absences);
                        break Ok(());
                    }
                    break Err(e);
                }
            }
        };
        let closed = store.close_cursor(cursor, result.is_ok());
        result?;
        closed?;
        Ok(())
    }

    /// Recomputes a MAIN row's status from its CTRLR rows.
    ///
    /// The status is reset to `UNKNOWN` first, so only the current set of
    /// controller rows contributes.
    pub(crate) fn consolidate_main_status(
        &self,
        store: &mut dyn ConfigStore,
        key: &ConfigKey,
        dt: DataType,
    ) -> UpllResult<()> {
        let pattern = ConfigKeyVal::new(key.clone());
        let mut main = match read_main(&*store, &pattern, dt) {
            Ok(m) => m,
            Err(e) if is_absent(&e) => return Ok(()),
            Err(e) => return Err(e),
        };
        main.status = RecordStatus::default();
        let rows = self.absent_as_empty(store.read_config_db(
            &pattern,
            dt,
            &DbSubOp::read_multiple(),
            TableRole::Ctrlr,
        ))?;
        main.status.row = consolidated_status(rows.iter().map(|r| r.status.row));
        main.status.attrs = consolidated_attr_status(
            rows.iter().map(|r| r.status.attrs.as_slice()),
        );
        trace!(
            key = %key,
            status = %main.status.row,
            ctrlr_rows = rows.len(),
            "consolidated status"
        );
        store.update_config_db(&main, dt, UpdateOp::Update, &MatchOpts::none(), TableRole::Main)?;
        Ok(())
    }

    /// (controller, domain) pairs the VTN spans in `dt`.
    pub fn vtn_spans(
        &self,
        store: &dyn ConfigStore,
        dt: DataType,
        vtn: &str,
    ) -> UpllResult<Vec<(String, String)>> {
        let rows = self.absent_as_empty(store.read_config_db(
            &ConfigKeyVal::new(KeyVtn::new(vtn)),
            dt,
            &DbSubOp::read_multiple(),
            TableRole::Ctrlr,
        ))?;
        Ok(rows
            .iter()
            .filter_map(|r| Some((r.ctrlr_id()?.to_string(), r.domain_id()?.to_string())))
            .collect())
    }

    /// Takes one reference on the VTN's span onto (`ctrlr`, `domain`).
    ///
    /// A new span fans every VTN-scoped key type's configuration out to the
    /// new pair.
    pub(crate) fn add_vtn_span(
        &self,
        store: &mut dyn ConfigStore,
        dt: DataType,
        vtn: &str,
        ctrlr: &str,
        domain: &str,
    ) -> UpllResult<()> {
        let pattern = ConfigKeyVal::new(KeyVtn::new(vtn)).on_ctrlr(ctrlr, domain);
        let existing = self.absent_as_empty(store.read_config_db(
            &pattern,
            dt,
            &DbSubOp::read().with_matching(MatchOpts::ctrlr_domain()),
            TableRole::Ctrlr,
        ))?;
        if let Some(mut row) = existing.into_iter().next() {
            if let Some(ConfigVal::VtnCtrlrSpan(span)) = row.val_mut() {
                span.ref_count = span.ref_count.saturating_add(1);
            }
            store.update_config_db(
                &row,
                dt,
                UpdateOp::Update,
                &MatchOpts::ctrlr_domain(),
                TableRole::Ctrlr,
            )?;
            return Ok(());
        }

        let vtn_row = read_main(&*store, &ConfigKeyVal::new(KeyVtn::new(vtn)), dt)?;
        let mut row = ConfigKeyVal::with_val(
            KeyVtn::new(vtn),
            ConfigVal::VtnCtrlrSpan(ValVtnCtrlrSpan { ref_count: 1 }),
        )
        .on_ctrlr(ctrlr, domain);
        row.user_data.flags = vtn_row.flags().rename_bits();
        store.update_config_db(&row, dt, UpdateOp::Create, &MatchOpts::none(), TableRole::Ctrlr)?;
        debug!(vtn = %vtn, ctrlr = %ctrlr, domain = %domain, dt = %dt, "vtn span added");

        for mgr in self.managers().filter(|m| m.vtn_scoped()) {
            self.fan_out_to_span(store, mgr, dt, vtn, ctrlr, domain)?;
        }
        Ok(())
    }

    /// Drops one reference on the VTN's span onto (`ctrlr`, `domain`).
    ///
    /// The last reference removes the span and every VTN-scoped controller
    /// row for the pair.
    pub(crate) fn remove_vtn_span(
        &self,
        store: &mut dyn ConfigStore,
        dt: DataType,
        vtn: &str,
        ctrlr: &str,
        domain: &str,
    ) -> UpllResult<()> {
        let pattern = ConfigKeyVal::new(KeyVtn::new(vtn)).on_ctrlr(ctrlr, domain);
        let existing = self.absent_as_empty(store.read_config_db(
            &pattern,
            dt,
            &DbSubOp::read().with_matching(MatchOpts::ctrlr_domain()),
            TableRole::Ctrlr,
        ))?;
        let Some(mut row) = existing.into_iter().next() else {
            trace!(vtn = %vtn, ctrlr = %ctrlr, "no span to release");
            return Ok(());
        };
        let remaining = match row.val_mut() {
            Some(ConfigVal::VtnCtrlrSpan(span)) => {
                span.ref_count = span.ref_count.saturating_sub(1);
                span.ref_count
            }
            _ => 0,
        };
        if remaining > 0 {
            store.update_config_db(
                &row,
                dt,
                UpdateOp::Update,
                &MatchOpts::ctrlr_domain(),
                TableRole::Ctrlr,
            )?;
            return Ok(());
        }

        store.update_config_db(
            &pattern,
            dt,
            UpdateOp::Delete,
            &MatchOpts::ctrlr_domain(),
            TableRole::Ctrlr,
        )?;
        debug!(vtn = %vtn, ctrlr = %ctrlr, domain = %domain, dt = %dt, "vtn span removed");
        for mgr in self.managers().filter(|m| m.vtn_scoped()) {
            let scoped = vtn_pattern(mgr.key_type(), vtn).on_ctrlr(ctrlr, domain);
            match store.update_config_db(
                &scoped,
                dt,
                UpdateOp::Delete,
                &MatchOpts::ctrlr_domain(),
                TableRole::Ctrlr,
            ) {
                Ok(_) => {}
                Err(e) => {
                    let e = UpllError::from(e);
                    if !is_absent(&e) {
                        return Err(e);
                    }
                    bump(&self.counters.folded_absences);
                }
            }
        }
        Ok(())
    }

    /// Creates the CTRLR rows of every `mgr` MAIN row of the VTN for one
    /// new span. Controllers lacking the capability are skipped.
    fn fan_out_to_span(
        &self,
        store: &mut dyn ConfigStore,
        mgr: &dyn MoMgr,
        dt: DataType,
        vtn: &str,
        ctrlr: &str,
        domain: &str,
    ) -> UpllResult<()> {
        let mains = self.absent_as_empty(store.read_config_db(
            &vtn_pattern(mgr.key_type(), vtn),
            dt,
            &DbSubOp::read_multiple(),
            TableRole::Main,
        ))?;
        for main in mains {
            self.create_ctrlr_row(store, mgr, dt, &main, ctrlr, domain)?;
        }
        Ok(())
    }

    /// Creates one CTRLR row of `main`, unless it exists or the controller
    /// does not support the key type.
    pub(crate) fn create_ctrlr_row(
        &self,
        store: &mut dyn ConfigStore,
        mgr: &dyn MoMgr,
        dt: DataType,
        main: &ConfigKeyVal,
        ctrlr: &str,
        domain: &str,
    ) -> UpllResult<bool> {
        let row = mgr.ctrlr_row(main, ctrlr, domain);
        if self.exists(&*store, &row, dt, MatchOpts::ctrlr_domain(), TableRole::Ctrlr)? {
            return Ok(false);
        }
        if dt == DataType::Candidate {
            match mgr.validate_capability(self, &*store, Operation::Create, dt, &row, ctrlr) {
                Ok(()) => {}
                Err(UpllError::NotSupportedByCtrlr { reason, .. }) => {
                    debug!(key = %main.key, ctrlr = %ctrlr, reason = %reason, "controller skipped");
                    return Ok(false);
                }
                Err(e) => return Err(e),
            }
        }
        store.update_config_db(&row, dt, UpdateOp::Create, &MatchOpts::none(), TableRole::Ctrlr)?;
        Ok(true)
    }

    /// Sets or clears the vlink/portmap lineage of a vrouter interface and
    /// of every record bound to it in `dt`.
    pub fn set_vlink_portmap_configuration(
        &self,
        store: &mut dyn ConfigStore,
        dt: DataType,
        if_key: &KeyVrtIf,
        interface: Option<InterfaceType>,
    ) -> UpllResult<()> {
        let mut row = read_main(&*store, &ConfigKeyVal::new(if_key.clone()), dt)?;
        let lineage = RecordFlags {
            vlink_configured: interface == Some(InterfaceType::Vlink),
            portmap_configured: interface == Some(InterfaceType::Portmap),
            ..RecordFlags::default()
        };
        row.user_data.flags.set_interface(lineage);
        store.update_config_db(&row, dt, UpdateOp::Update, &MatchOpts::none(), TableRole::Main)?;

        let bound = self
            .managers()
            .filter(|m| m.key_type() != KeyType::VrtIf)
            .filter(|m| ConfigKey::empty(m.key_type()).vrt_if_key().is_some());
        for mgr in bound {
            let pattern = mgr.get_child_config_key(Some(&row))?;
            let children = self.absent_as_empty(store.read_config_db(
                &pattern,
                dt,
                &DbSubOp::read_multiple(),
                TableRole::Main,
            ))?;
            for mut child in children {
                child.user_data.flags.set_interface(lineage);
                store.update_config_db(
                    &child,
                    dt,
                    UpdateOp::Update,
                    &MatchOpts::none(),
                    TableRole::Main,
                )?;
            }
        }
        debug!(interface = ?interface, dt = %dt, key = %row.key, "interface lineage updated");
        Ok(())
    }

    /// Moves a flow list's reference count by `delta`.
    pub(crate) fn adjust_flowlist_ref(
        &self,
        store: &mut dyn ConfigStore,
        dt: DataType,
        name: &str,
        delta: i32,
    ) -> UpllResult<()> {
        let pattern = ConfigKeyVal::new(KeyFlowList::new(name));
        let mut row = match read_main(&*store, &pattern, dt) {
            Ok(row) => row,
            Err(e) if is_absent(&e) && delta < 0 => {
                trace!(flowlist = %name, "released reference to absent flow list");
                return Ok(());
            }
            Err(e) if is_absent(&e) => {
                return Err(UpllError::semantic(format!("flow list {} does not exist", name)))
            }
            Err(e) => return Err(e),
        };
        match row.val_mut() {
            Some(ConfigVal::FlowList(v)) => v.ref_count = v.ref_count.saturating_add_signed(delta),
            _ => {
                return Err(UpllError::generic(format!(
                    "flow list {} has no value",
                    name
                )))
            }
        }
        store.update_config_db(&row, dt, UpdateOp::Update, &MatchOpts::none(), TableRole::Main)?;
        Ok(())
    }
}

/// An enumeration pattern of `kt` restricted to one VTN.
pub(crate) fn vtn_pattern(kt: KeyType, vtn: &str) -> ConfigKeyVal {
    let mut key = ConfigKey::empty(kt);
    key.rename_component(RenameComponent::Vtn, vtn);
    ConfigKeyVal::new(key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::LoopbackDriver;
    use crate::notify::BufferedNotifier;
    use pretty_assertions::assert_eq;
    use upll_dal::{DiffOp, InMemoryStore};
    use upll_types::ValVtn;

    fn engine() -> MoMgrImpl {
        MoMgrImpl::new(
            EngineConfig::default(),
            Arc::new(LoopbackDriver),
            Arc::new(BufferedNotifier::new()),
        )
    }

    fn vtn_row(name: &str) -> ConfigKeyVal {
        ConfigKeyVal::with_val(KeyVtn::new(name), ConfigVal::Vtn(ValVtn::default()))
    }

    #[test]
    fn test_drain_diff_folds_exhaustion() {
        let engine = engine();
        let mut store = InMemoryStore::new();
        for name in ["a", "b"] {
            store
                .update_config_db(
                    &vtn_row(name),
                    DataType::Candidate,
                    UpdateOp::Create,
                    &MatchOpts::none(),
                    TableRole::Main,
                )
                .unwrap();
        }
        let spec = DiffSpec::new(
            KeyType::Vtn,
            TableRole::Main,
            DataType::Candidate,
            DataType::Running,
            DiffOp::Create,
        );
        let mut seen = Vec::new();
        engine
            .drain_diff(&mut store, &spec, |_, rec| {
                seen.push(rec.record.key.to_string());
                Ok(())
            })
            .unwrap();
        assert_eq!(seen, vec!["VTN:a", "VTN:b"]);
        assert_eq!(store.open_cursor_count(), 0);
        assert_eq!(store.stats().cursors_closed, 1);
    }

    #[test]
    fn test_drain_diff_closes_on_error() {
        let engine = engine();
        let mut store = InMemoryStore::new();
        store
            .update_config_db(
                &vtn_row("a"),
                DataType::Candidate,
                UpdateOp::Create,
                &MatchOpts::none(),
                TableRole::Main,
            )
            .unwrap();
        let spec = DiffSpec::new(
            KeyType::Vtn,
            TableRole::Main,
            DataType::Candidate,
            DataType::Running,
            DiffOp::Create,
        );
        let err = engine
            .drain_diff(&mut store, &spec, |_, _| Err(UpllError::generic("stop")))
            .unwrap_err();
        assert_eq!(err, UpllError::generic("stop"));
        assert_eq!(store.open_cursor_count(), 0);
    }

    #[test]
    fn test_drain_diff_does_not_fold_closure_absence() {
        let engine = engine();
        let mut store = InMemoryStore::new();
        store
            .update_config_db(
                &vtn_row("a"),
                DataType::Candidate,
                UpdateOp::Create,
                &MatchOpts::none(),
                TableRole::Main,
            )
            .unwrap();
        let spec = DiffSpec::new(
            KeyType::Vtn,
            TableRole::Main,
            DataType::Candidate,
            DataType::Running,
            DiffOp::Create,
        );
        let err = engine
            .drain_diff(&mut store, &spec, |_, _| Err(UpllError::NoSuchInstance))
            .unwrap_err();
        assert_eq!(err, UpllError::NoSuchInstance);
        assert_eq!(store.open_cursor_count(), 0);
    }

    #[test]
    fn test_span_refcount() {
        let engine = engine();
        let mut store = InMemoryStore::new();
        let dt = DataType::Candidate;
        store
            .update_config_db(
                &vtn_row("v"),
                dt,
                UpdateOp::Create,
                &MatchOpts::none(),
                TableRole::Main,
            )
            .unwrap();

        engine.add_vtn_span(&mut store, dt, "v", "c1", "d1").unwrap();
        engine.add_vtn_span(&mut store, dt, "v", "c1", "d1").unwrap();
        engine.add_vtn_span(&mut store, dt, "v", "c2", "d1").unwrap();
        assert_eq!(
            engine.vtn_spans(&store, dt, "v").unwrap(),
            vec![("c1".to_string(), "d1".to_string()), ("c2".to_string(), "d1".to_string())]
        );

        engine.remove_vtn_span(&mut store, dt, "v", "c1", "d1").unwrap();
        assert_eq!(engine.vtn_spans(&store, dt, "v").unwrap().len(), 2);
        engine.remove_vtn_span(&mut store, dt, "v", "c1", "d1").unwrap();
        assert_eq!(
            engine.vtn_spans(&store, dt, "v").unwrap(),
            vec![("c2".to_string(), "d1".to_string())]
        );
        engine.remove_vtn_span(&mut store, dt, "v", "c1", "d1").unwrap();
    }

    #[test]
    fn test_unknown_manager() {
        let engine = engine().with_registry(MoMgrRegistry::new());
        assert!(matches!(
            engine.manager(KeyType::Vtn),
            Err(UpllError::BadRequest(_))
        ));
    }
}
