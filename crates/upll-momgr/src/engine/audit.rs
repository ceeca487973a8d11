//! Audit: push RUNNING onto a controller whose configuration drifted.
//!
//! The AUDIT plane holds what the controller reported. For one controller
//! the engine walks the RUNNING/AUDIT difference per key type, pushes each
//! differing record synchronously and marks rejected records `INVALID` in
//! RUNNING. A rejected record never aborts the walk.

use super::{bump, MoMgrImpl};
use crate::momgr::MoMgr;
use crate::tx_update::CtrlrCommitStatus;
use crate::{UpllError, UpllResult};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace, warn};
use upll_dal::{ConfigStore, DbSubOp, DiffOp, DiffSpec, MatchOpts, UpdateOp};
use upll_types::{
    ConfigKey, ConfigKeyVal, ConfigStatus, DataType, KeyType, Operation, Option1, TableRole,
    UpdateCtrlrPhase,
};

/// How far RUNNING and AUDIT differ, ordered by severity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditDiffStatus {
    /// Both planes hold the same records.
    #[default]
    NoDiff,
    /// Only status bookkeeping differs.
    OnlyCsDiff,
    /// The controller configuration differs.
    ConfigDiff,
}

/// State of one controller's audit.
#[derive(Debug, Clone, PartialEq)]
pub struct AuditContext {
    /// Controller under audit.
    pub ctrlr_id: String,
    /// Worst difference seen so far.
    pub diff_status: AuditDiffStatus,
    /// Records the controller rejected, in UNC names.
    pub failed_records: Vec<ConfigKeyVal>,
    /// Records pushed to the controller.
    pub pushed: usize,
    first_error: Option<UpllError>,
}

impl AuditContext {
    /// Starts the audit of `ctrlr_id` with no difference seen.
    pub fn new(ctrlr_id: impl Into<String>) -> Self {
        Self {
            ctrlr_id: ctrlr_id.into(),
            diff_status: AuditDiffStatus::NoDiff,
            failed_records: Vec::new(),
            pushed: 0,
            first_error: None,
        }
    }

    fn note(&mut self, status: AuditDiffStatus) {
        self.diff_status = self.diff_status.max(status);
    }

    fn fail(&mut self, record: ConfigKeyVal, err: UpllError) {
        self.failed_records.push(record);
        if self.first_error.is_none() {
            self.first_error = Some(err);
        }
    }

    /// First failure of the whole audit, across calls.
    pub fn first_error(&self) -> Option<&UpllError> {
        self.first_error.as_ref()
    }

    /// The audit outcome in the shape a commit reports it.
    pub fn commit_status(&self) -> CtrlrCommitStatus {
        CtrlrCommitStatus {
            ctrlr_id: self.ctrlr_id.clone(),
            result: match &self.first_error {
                Some(e) => Err(e.clone()),
                None => Ok(()),
            },
            err_records: self.failed_records.clone(),
        }
    }
}

fn is_driver_error(err: &UpllError) -> bool {
    matches!(
        err,
        UpllError::DriverTransport { .. }
            | UpllError::DriverResult { .. }
            | UpllError::CtrDisconnected(_)
    )
}

impl MoMgrImpl {
    /// Pushes one phase of `kt`'s RUNNING/AUDIT difference onto the audited
    /// controller.
    ///
    /// Returns this call's first driver failure once the whole difference
    /// has been walked. An update whose interface lineage changed is pushed
    /// as the create or delete the lineage change implies.
    pub fn audit_update_controller(
        &self,
        store: &mut dyn ConfigStore,
        kt: KeyType,
        phase: UpdateCtrlrPhase,
        ctx: &mut AuditContext,
    ) -> UpllResult<()> {
        let mgr = self.manager(kt)?;
        if !mgr.pushes_to_driver() {
            return Ok(());
        }
        let op = phase.operation();
        let diff = match phase {
            UpdateCtrlrPhase::Create => DiffOp::Create,
            UpdateCtrlrPhase::Update => DiffOp::Update,
            UpdateCtrlrPhase::Delete => DiffOp::Delete,
        };
        let table = mgr.push_table();
        let mut spec = DiffSpec::new(kt, table, DataType::Running, DataType::Audit, diff)
            .for_ctrlr(ctx.ctrlr_id.clone());
        if phase == UpdateCtrlrPhase::Update {
            spec = spec.including_status();
        }

        let mut first_failure: Option<UpllError> = None;
        self.drain_diff(store, &spec, |store, rec| {
            if rec.record.ctrlr_id() != Some(ctx.ctrlr_id.as_str()) {
                return Ok(());
            }
            let gate = mgr.tx_gate(op, &rec.record, rec.previous.as_ref());
            if let (UpdateCtrlrPhase::Update, Some(prev)) = (phase, &rec.previous) {
                // A lineage change turns the update into a create or delete
                // even when the values match.
                let reclassified = gate.is_some_and(|wire_op| wire_op != op);
                if !reclassified && mgr.filter_attributes(&rec.record, prev) {
                    trace!(key = %rec.record.key, "status-only difference");
                    ctx.note(AuditDiffStatus::OnlyCsDiff);
                    return Ok(());
                }
            }
            ctx.note(AuditDiffStatus::ConfigDiff);
            let Some(wire_op) = gate else {
                return Ok(());
            };
            if wire_op == Operation::Update && !mgr.push_update() {
                return Ok(());
            }
            let source = if wire_op == Operation::Delete && op != Operation::Delete {
                rec.previous.as_ref().unwrap_or(&rec.record)
            } else {
                &rec.record
            };
            let mut payload = mgr.driver_payload(source, wire_op);
            let rename_dt = if op == Operation::Delete {
                DataType::Audit
            } else {
                DataType::Running
            };
            mgr.get_renamed_controller_key(self, &*store, &mut payload, rename_dt)?;
            let domain = rec.record.domain_id().unwrap_or_default().to_string();
            ctx.pushed += 1;

            let outcome = self
                .send_to_driver(
                    &ctx.ctrlr_id,
                    &domain,
                    wire_op,
                    DataType::Running,
                    Option1::Normal,
                    payload,
                    true,
                )
                .and_then(|resp| self.check_response(&ctx.ctrlr_id, resp).map(|_| ()));
            if let Err(e) = outcome {
                warn!(
                    ctrlr = %ctx.ctrlr_id,
                    key = %rec.record.key,
                    op = %wire_op,
                    error = %e,
                    "audit push rejected"
                );
                bump(&self.counters.audit_failures);
                if op != Operation::Delete {
                    self.mark_invalid(store, mgr, &rec.record)?;
                }
                first_failure.get_or_insert_with(|| e.clone());
                ctx.fail(rec.record, e);
            }
            Ok(())
        })?;

        first_failure.map_or(Ok(()), Err)
    }

    /// Audits every key type: deletes children first, then creates and
    /// updates parents first. Driver failures do not stop the walk.
    pub fn audit_all(&self, store: &mut dyn ConfigStore, ctx: &mut AuditContext) -> UpllResult<()> {
        let mut order: Vec<(KeyType, UpdateCtrlrPhase)> = KeyType::ALL
            .iter()
            .rev()
            .map(|kt| (*kt, UpdateCtrlrPhase::Delete))
            .collect();
        for phase in [UpdateCtrlrPhase::Create, UpdateCtrlrPhase::Update] {
            order.extend(KeyType::ALL.iter().map(|kt| (*kt, phase)));
        }

        let mut first = None;
        for (kt, phase) in order {
            if !self.registry.contains_key(&kt) {
                continue;
            }
            match self.audit_update_controller(store, kt, phase, ctx) {
                Ok(()) => {}
                Err(e) if is_driver_error(&e) => {
                    first.get_or_insert(e);
                }
                Err(e) => return Err(e),
            }
        }
        info!(
            ctrlr = %ctx.ctrlr_id,
            diff = ?ctx.diff_status,
            pushed = ctx.pushed,
            failed = ctx.failed_records.len(),
            "audit finished"
        );
        first.map_or(Ok(()), Err)
    }

    /// Stamps RUNNING with the outcome of an audit or commit on one
    /// controller.
    ///
    /// Rejected records become `INVALID`. Every other record the controller
    /// holds becomes `APPLIED` when the controller accepted the push.
    pub fn audit_commit_ctrlr_status(
        &self,
        store: &mut dyn ConfigStore,
        status: &CtrlrCommitStatus,
    ) -> UpllResult<()> {
        for mgr in self.managers().filter(|m| m.pushes_to_driver()) {
            let table = mgr.push_table();
            let pattern =
                ConfigKeyVal::new(ConfigKey::empty(mgr.key_type())).on_ctrlr(&status.ctrlr_id, "");
            let rows = self.absent_as_empty(store.read_config_db(
                &pattern,
                DataType::Running,
                &DbSubOp::read_multiple().with_matching(MatchOpts::ctrlr()),
                table,
            ))?;
            for mut row in rows {
                let stamp = if status.is_failed_record(&row) {
                    ConfigStatus::Invalid
                } else if mgr.tx_gate(Operation::Create, &row, None).is_none() {
                    ConfigStatus::NotApplied
                } else if status.result.is_ok() {
                    ConfigStatus::Applied
                } else {
                    continue;
                };
                mgr.update_config_status(&mut row, stamp);
                store.update_config_db(
                    &row,
                    DataType::Running,
                    UpdateOp::Update,
                    &matching(table),
                    table,
                )?;
                if table == TableRole::Ctrlr {
                    self.consolidate_main_status(store, &row.key, DataType::Running)?;
                }
            }
        }
        debug!(ctrlr = %status.ctrlr_id, "audit status stamped");
        Ok(())
    }

    fn mark_invalid(
        &self,
        store: &mut dyn ConfigStore,
        mgr: &dyn MoMgr,
        record: &ConfigKeyVal,
    ) -> UpllResult<()> {
        let table = mgr.push_table();
        let pattern = if table.is_per_controller() {
            record.key_only()
        } else {
            ConfigKeyVal::new(record.key.clone())
        };
        let rows = self.absent_as_empty(store.read_config_db(
            &pattern,
            DataType::Running,
            &DbSubOp::read().with_matching(matching(table)),
            table,
        ))?;
        let Some(mut row) = rows.into_iter().next() else {
            trace!(key = %record.key, "rejected record no longer in running");
            return Ok(());
        };
        mgr.update_config_status(&mut row, ConfigStatus::Invalid);
        store.update_config_db(&row, DataType::Running, UpdateOp::Update, &matching(table), table)?;
        if table == TableRole::Ctrlr {
            self.consolidate_main_status(store, &row.key, DataType::Running)?;
        }
        Ok(())
    }
}

fn matching(table: TableRole) -> MatchOpts {
    if table.is_per_controller() {
        MatchOpts::ctrlr_domain()
    } else {
        MatchOpts::none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::StaticCapabilityTable;
    use crate::config::EngineConfig;
    use crate::driver::{
        DriverClient, DriverRequest, DriverResponse, DriverResultCode, DriverTransportError,
    };
    use crate::notify::BufferedNotifier;
    use pretty_assertions::assert_eq;
    use std::sync::{Arc, Mutex};
    use upll_dal::InMemoryStore;
    use upll_types::{
        Attr, ConfigVal, KeyVrt, KeyVrtIf, KeyVrtIfFlowFilter, KeyVtn, ValVrt, ValVtn,
    };

    #[derive(Default)]
    struct RejectingDriver {
        reject: Vec<String>,
        seen: Mutex<Vec<String>>,
    }

    impl DriverClient for RejectingDriver {
        fn send_req_to_driver(
            &self,
            request: &DriverRequest,
            _synchronous: bool,
        ) -> Result<DriverResponse, DriverTransportError> {
            let key = request.ckv.key.to_string();
            self.seen
                .lock()
                .unwrap()
                .push(format!("{} {}", request.operation, key));
            if self.reject.contains(&key) {
                return Ok(DriverResponse::failure(DriverResultCode::Failure));
            }
            Ok(DriverResponse::success(None))
        }
    }

    fn vrt(name: &str) -> ConfigKeyVal {
        let val = ValVrt {
            controller_id: Attr::Valid("c1".into()),
            domain_id: Attr::Valid("d1".into()),
            ..ValVrt::default()
        };
        ConfigKeyVal::with_val(KeyVrt::new("v1", name), ConfigVal::Vrt(val)).on_ctrlr("c1", "d1")
    }

    fn running_with(names: &[&str]) -> InMemoryStore {
        let mut store = InMemoryStore::new();
        let vtn = ConfigKeyVal::with_val(KeyVtn::new("v1"), ConfigVal::Vtn(ValVtn::default()));
        store
            .update_config_db(
                &vtn,
                DataType::Running,
                UpdateOp::Create,
                &MatchOpts::none(),
                TableRole::Main,
            )
            .unwrap();
        for name in names {
            store
                .update_config_db(
                    &vrt(name),
                    DataType::Running,
                    UpdateOp::Create,
                    &MatchOpts::none(),
                    TableRole::Main,
                )
                .unwrap();
        }
        store
    }

    fn engine(driver: Arc<RejectingDriver>) -> MoMgrImpl {
        MoMgrImpl::new(EngineConfig::default(), driver, Arc::new(BufferedNotifier::new()))
            .with_capabilities(Arc::new(StaticCapabilityTable::new().allow("c1", KeyType::Vrt)))
    }

    #[test]
    fn test_rejection_isolated() {
        let driver = Arc::new(RejectingDriver {
            reject: vec!["VROUTER:v1/r2".into()],
            ..RejectingDriver::default()
        });
        let engine = engine(driver.clone());
        let mut store = running_with(&["r1", "r2", "r3"]);
        let mut ctx = AuditContext::new("c1");

        let err = engine
            .audit_update_controller(&mut store, KeyType::Vrt, UpdateCtrlrPhase::Create, &mut ctx)
            .unwrap_err();
        assert!(matches!(err, UpllError::DriverResult { .. }));
        assert_eq!(driver.seen.lock().unwrap().len(), 3);
        assert_eq!(ctx.failed_records.len(), 1);
        assert_eq!(ctx.diff_status, AuditDiffStatus::ConfigDiff);
        assert_eq!(store.open_cursor_count(), 0);

        let rows = store.rows(KeyType::Vrt, TableRole::Main, DataType::Running);
        let statuses: Vec<_> = rows.iter().map(|r| r.status.row).collect();
        assert_eq!(
            statuses,
            vec![ConfigStatus::Unknown, ConfigStatus::Invalid, ConfigStatus::Unknown]
        );
        assert_eq!(engine.stats().audit_failures, 1);
    }

    #[test]
    fn test_status_only_difference() {
        let driver = Arc::new(RejectingDriver::default());
        let engine = engine(driver.clone());
        let mut store = running_with(&["r1"]);
        store
            .copy_table(KeyType::Vrt, TableRole::Main, DataType::Running, DataType::Audit)
            .unwrap();
        let mut row = vrt("r1");
        row.status.row = ConfigStatus::Applied;
        store
            .update_config_db(
                &row,
                DataType::Running,
                UpdateOp::Update,
                &MatchOpts::none(),
                TableRole::Main,
            )
            .unwrap();

        let mut ctx = AuditContext::new("c1");
        engine
            .audit_update_controller(&mut store, KeyType::Vrt, UpdateCtrlrPhase::Update, &mut ctx)
            .unwrap();
        assert_eq!(ctx.diff_status, AuditDiffStatus::OnlyCsDiff);
        assert!(driver.seen.lock().unwrap().is_empty());
    }

    fn interface_filter(vlink: bool) -> ConfigKeyVal {
        let key = KeyVrtIfFlowFilter::new(KeyVrtIf::new("v1", "r1", "if1"), 0);
        let mut ckv = ConfigKeyVal::new(key).on_ctrlr("c1", "d1");
        ckv.user_data.flags.vlink_configured = vlink;
        ckv
    }

    /// Audits the update phase of one interface filter whose lineage is
    /// `running` in RUNNING and `audited` in AUDIT.
    fn audit_lineage(running: bool, audited: bool) -> (AuditContext, Vec<String>) {
        let driver = Arc::new(RejectingDriver::default());
        let engine = engine(driver.clone());
        let mut store = InMemoryStore::new();
        for (row, dt) in [
            (interface_filter(running), DataType::Running),
            (interface_filter(audited), DataType::Audit),
        ] {
            store
                .update_config_db(&row, dt, UpdateOp::Create, &MatchOpts::none(), TableRole::Main)
                .unwrap();
        }

        let mut ctx = AuditContext::new("c1");
        engine
            .audit_update_controller(
                &mut store,
                KeyType::VrtIfFlowFilter,
                UpdateCtrlrPhase::Update,
                &mut ctx,
            )
            .unwrap();
        assert_eq!(store.open_cursor_count(), 0);
        let seen = driver.seen.lock().unwrap().clone();
        (ctx, seen)
    }

    #[test]
    fn test_lineage_gain_is_pushed_as_create() {
        let (ctx, seen) = audit_lineage(true, false);
        assert_eq!(ctx.diff_status, AuditDiffStatus::ConfigDiff);
        assert_eq!(ctx.pushed, 1);
        assert_eq!(seen, vec!["CREATE VRTIF_FLOWFILTER:v1/r1/if1/in"]);
    }

    #[test]
    fn test_lineage_loss_is_pushed_as_delete() {
        let (ctx, seen) = audit_lineage(false, true);
        assert_eq!(ctx.diff_status, AuditDiffStatus::ConfigDiff);
        assert_eq!(ctx.pushed, 1);
        assert_eq!(seen, vec!["DELETE VRTIF_FLOWFILTER:v1/r1/if1/in"]);
    }

    #[test]
    fn test_unchanged_lineage_has_no_diff() {
        let (ctx, seen) = audit_lineage(true, true);
        assert_eq!(ctx.diff_status, AuditDiffStatus::NoDiff);
        assert!(seen.is_empty());
    }

    #[test]
    fn test_unchanged_lineage_status_change_is_not_pushed() {
        let driver = Arc::new(RejectingDriver::default());
        let engine = engine(driver.clone());
        let mut store = InMemoryStore::new();
        let mut running = interface_filter(true);
        running.status.row = ConfigStatus::Applied;
        for (row, dt) in [(running, DataType::Running), (interface_filter(true), DataType::Audit)] {
            store
                .update_config_db(&row, dt, UpdateOp::Create, &MatchOpts::none(), TableRole::Main)
                .unwrap();
        }

        let mut ctx = AuditContext::new("c1");
        engine
            .audit_update_controller(
                &mut store,
                KeyType::VrtIfFlowFilter,
                UpdateCtrlrPhase::Update,
                &mut ctx,
            )
            .unwrap();
        assert_eq!(ctx.diff_status, AuditDiffStatus::OnlyCsDiff);
        assert_eq!(ctx.pushed, 0);
        assert!(driver.seen.lock().unwrap().is_empty());
    }

    #[test]
    fn test_commit_status_stamps_running() {
        let driver = Arc::new(RejectingDriver::default());
        let engine = engine(driver);
        let mut store = running_with(&["r1", "r2"]);
        let status = CtrlrCommitStatus {
            ctrlr_id: "c1".into(),
            result: Ok(()),
            err_records: vec![vrt("r2")],
        };
        engine.audit_commit_ctrlr_status(&mut store, &status).unwrap();
        let rows = store.rows(KeyType::Vrt, TableRole::Main, DataType::Running);
        assert_eq!(rows[0].status.row, ConfigStatus::Applied);
        assert_eq!(rows[1].status.row, ConfigStatus::Invalid);
    }
}
