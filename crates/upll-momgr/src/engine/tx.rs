//! Commit: vote, push and copy CANDIDATE into RUNNING.

use super::{bump, MoMgrImpl};
use crate::momgr::MoMgr;
use crate::tx_update::{CtrlrCommitStatus, TxDispatcher, TxRequest, TxUpdateUtil};
use crate::{UpllError, UpllResult};
use tracing::{debug, error, info, trace};
use upll_dal::{ConfigStore, DiffOp, DiffRecord, DiffSpec, MatchOpts, UpdateOp};
use upll_types::{ConfigKey, ConfigStatus, DataType, KeyType, Operation, TableRole};

/// Order in which the copy and update phases visit operations.
const PHASES: [Operation; 3] = [Operation::Delete, Operation::Create, Operation::Update];

fn diff_op(op: Operation) -> UpllResult<DiffOp> {
    match op {
        Operation::Create => Ok(DiffOp::Create),
        Operation::Update => Ok(DiffOp::Update),
        Operation::Delete => Ok(DiffOp::Delete),
        other => Err(UpllError::bad_request(format!("{} has no diff", other))),
    }
}

fn update_op(op: Operation) -> UpdateOp {
    match op {
        Operation::Create => UpdateOp::Create,
        Operation::Delete => UpdateOp::Delete,
        _ => UpdateOp::Update,
    }
}

fn table_matching(table: TableRole) -> MatchOpts {
    if table.is_per_controller() {
        MatchOpts::ctrlr_domain()
    } else {
        MatchOpts::none()
    }
}

impl MoMgrImpl {
    /// Re-runs the semantic checks on every created and updated MAIN row of
    /// `kt` in CANDIDATE.
    pub fn tx_vote(&self, store: &mut dyn ConfigStore, kt: KeyType) -> UpllResult<()> {
        let mgr = self.manager(kt)?;
        for op in [DiffOp::Create, DiffOp::Update] {
            let spec = DiffSpec::new(
                kt,
                TableRole::Main,
                DataType::Candidate,
                DataType::Running,
                op,
            );
            self.drain_diff(store, &spec, |store, rec| {
                mgr.validate_attribute(self, &*store, &rec.record, DataType::Candidate)
                    .map_err(|e| {
                        debug!(key = %rec.record.key, error = %e, "vote rejected record");
                        UpllError::semantic(format!("{}: {}", rec.record.key, e))
                    })
            })?;
        }
        Ok(())
    }

    pub fn tx_vote_all(&self, store: &mut dyn ConfigStore) -> UpllResult<()> {
        for kt in KeyType::ALL {
            if self.registry.contains_key(&kt) {
                self.tx_vote(store, kt)?;
            }
        }
        Ok(())
    }

    /// Queues the `op` diff of `kt` for the drivers.
    ///
    /// Each row passes the manager's gate, is renamed to controller names
    /// and is queued on its controller's lane.
    pub fn tx_update_controller(
        &self,
        store: &mut dyn ConfigStore,
        kt: KeyType,
        op: Operation,
        util: &mut TxUpdateUtil,
    ) -> UpllResult<()> {
        let mgr = self.manager(kt)?;
        if !mgr.pushes_to_driver() || (op == Operation::Update && !mgr.push_update()) {
            return Ok(());
        }
        let spec = DiffSpec::new(
            kt,
            mgr.push_table(),
            DataType::Candidate,
            DataType::Running,
            diff_op(op)?,
        );
        let mut queued = 0u64;
        let result = self.drain_diff(store, &spec, |store, rec| {
            let Some(wire_op) = mgr.tx_gate(op, &rec.record, rec.previous.as_ref()) else {
                trace!(key = %rec.record.key, op = %op, "record not pushed");
                return Ok(());
            };
            let (Some(ctrlr), Some(domain)) = (rec.record.ctrlr_id(), rec.record.domain_id()) else {
                return Err(UpllError::generic(format!(
                    "{} has no controller",
                    rec.record.key
                )));
            };
            let (ctrlr, domain) = (ctrlr.to_string(), domain.to_string());
            let source = if wire_op == Operation::Delete && op != Operation::Delete {
                rec.previous.as_ref().unwrap_or(&rec.record)
            } else {
                &rec.record
            };
            let mut driver_ckv = mgr.driver_payload(source, wire_op);
            let rename_dt = if wire_op == Operation::Delete {
                DataType::Running
            } else {
                DataType::Candidate
            };
            mgr.get_renamed_controller_key(self, &*store, &mut driver_ckv, rename_dt)?;
            util.enqueue(TxRequest {
                ctrlr_id: ctrlr,
                domain_id: domain,
                op: wire_op,
                key_type: kt,
                driver_ckv,
                unc_ckv: rec.record,
            });
            queued += 1;
            Ok(())
        });
        for _ in 0..queued {
            bump(&self.counters.tx_records_queued);
        }
        if let Err(e) = &result {
            error!(kt = %kt, op = %op, error = %e, "update phase aborted");
        }
        result
    }

    /// Queues every key type: deletes children first, then creates and
    /// updates parents first.
    pub fn tx_update_all(
        &self,
        store: &mut dyn ConfigStore,
        util: &mut TxUpdateUtil,
    ) -> UpllResult<()> {
        for kt in KeyType::ALL.iter().rev() {
            if self.registry.contains_key(kt) {
                self.tx_update_controller(store, *kt, Operation::Delete, util)?;
            }
        }
        for op in [Operation::Create, Operation::Update] {
            for kt in KeyType::ALL {
                if self.registry.contains_key(&kt) {
                    self.tx_update_controller(store, kt, op, util)?;
                }
            }
        }
        debug!(queued = util.len(), "update phase finished");
        Ok(())
    }

    /// Copies every CANDIDATE change of `kt` into RUNNING, stamping
    /// per-controller status from the dispatch outcome.
    pub fn tx_copy_candidate_to_running(
        &self,
        store: &mut dyn ConfigStore,
        kt: KeyType,
        statuses: &[CtrlrCommitStatus],
    ) -> UpllResult<()> {
        let mut touched = Vec::new();
        for op in PHASES {
            self.copy_op(store, kt, op, statuses, &mut touched)?;
        }
        self.consolidate_touched(store, &touched)
    }

    pub fn tx_copy_all(
        &self,
        store: &mut dyn ConfigStore,
        statuses: &[CtrlrCommitStatus],
    ) -> UpllResult<()> {
        let mut touched = Vec::new();
        for kt in KeyType::ALL.iter().rev() {
            if self.registry.contains_key(kt) {
                self.copy_op(store, *kt, Operation::Delete, statuses, &mut touched)?;
            }
        }
        for op in [Operation::Create, Operation::Update] {
            for kt in KeyType::ALL {
                if self.registry.contains_key(&kt) {
                    self.copy_op(store, kt, op, statuses, &mut touched)?;
                }
            }
        }
        self.consolidate_touched(store, &touched)
    }

    /// Runs a whole commit: vote, update, dispatch and copy.
    pub async fn commit(
        &self,
        store: &mut dyn ConfigStore,
        session_id: u32,
        config_id: u32,
    ) -> UpllResult<Vec<CtrlrCommitStatus>> {
        self.tx_vote_all(store)?;
        let mut util = TxUpdateUtil::new(session_id, config_id);
        self.tx_update_all(store, &mut util)?;
        let statuses = TxDispatcher::new(self.driver(), &self.config)
            .dispatch(util)
            .await;
        self.tx_copy_all(store, &statuses)?;
        info!(
            session_id,
            config_id,
            controllers = statuses.len(),
            failed = statuses.iter().filter(|s| s.result.is_err()).count(),
            "commit finished"
        );
        Ok(statuses)
    }

    fn copy_op(
        &self,
        store: &mut dyn ConfigStore,
        kt: KeyType,
        op: Operation,
        statuses: &[CtrlrCommitStatus],
        touched: &mut Vec<ConfigKey>,
    ) -> UpllResult<()> {
        let mgr = self.manager(kt)?;
        let stamps_ctrlr_rows = mgr.pushes_to_driver() && mgr.push_table() == TableRole::Ctrlr;
        for table in mgr.tables() {
            let table = *table;
            let spec = DiffSpec::new(
                kt,
                table,
                DataType::Candidate,
                DataType::Running,
                diff_op(op)?,
            );
            self.drain_diff(store, &spec, |store, rec| {
                let mut row = rec.record.clone();
                if op != Operation::Delete {
                    let status = if mgr.pushes_to_driver() && table == mgr.push_table() {
                        commit_status(mgr, op, &rec, statuses)
                    } else {
                        None
                    };
                    match (status, &rec.previous) {
                        (Some(status), _) => mgr.update_config_status(&mut row, status),
                        (None, Some(prev)) => row.status = prev.status.clone(),
                        (None, None) => {}
                    }
                }
                store.update_config_db(
                    &row,
                    DataType::Running,
                    update_op(op),
                    &table_matching(table),
                    table,
                )?;
                if table == TableRole::Main {
                    self.notifier.buffer_notification(op, DataType::Running, &rec.record);
                }
                if stamps_ctrlr_rows && table == TableRole::Ctrlr && !touched.contains(&row.key) {
                    touched.push(row.key.clone());
                }
                Ok(())
            })?;
        }
        Ok(())
    }

    fn consolidate_touched(
        &self,
        store: &mut dyn ConfigStore,
        touched: &[ConfigKey],
    ) -> UpllResult<()> {
        for key in touched {
            self.consolidate_main_status(store, key, DataType::Running)?;
        }
        Ok(())
    }
}

/// Status a pushed row takes in RUNNING, or `None` to keep the previous one.
fn commit_status(
    mgr: &dyn MoMgr,
    op: Operation,
    rec: &DiffRecord,
    statuses: &[CtrlrCommitStatus],
) -> Option<ConfigStatus> {
    match mgr.tx_gate(op, &rec.record, rec.previous.as_ref()) {
        None | Some(Operation::Delete) => Some(ConfigStatus::NotApplied),
        Some(Operation::Update) if !mgr.push_update() => None,
        Some(_) => {
            let outcome = rec
                .record
                .ctrlr_id()
                .and_then(|c| statuses.iter().find(|s| s.ctrlr_id == c));
            Some(match outcome {
                Some(status) => status.record_status(&rec.record),
                None => ConfigStatus::NotApplied,
            })
        }
    }
}
