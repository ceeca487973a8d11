//! Northbound create, update and delete.

use super::{bump, MoMgrImpl};
use crate::momgr::{read_main, MoMgr};
use crate::request::IpcReqRespHeader;
use crate::{is_absent, UpllError, UpllResult};
use tracing::{debug, trace};
use upll_dal::{ConfigStore, DbSubOp, MatchOpts, UpdateOp};
use upll_types::{ConfigKeyVal, DataType, Operation, TableRole};

impl MoMgrImpl {
    /// Creates one record in the request's plane.
    ///
    /// Order: message syntax, semantic references, parent presence,
    /// existence, controller lookup, capability, MAIN insert, reference
    /// bookkeeping, then the CTRLR fan-out of VTN-scoped key types.
    pub fn create_mo(
        &self,
        req: &IpcReqRespHeader,
        ikey: &ConfigKeyVal,
        store: &mut dyn ConfigStore,
    ) -> UpllResult<()> {
        let mgr = self.manager(ikey.key_type())?;
        mgr.validate_message(req, ikey)?;
        let dt = req.datatype;
        mgr.validate_attribute(self, &*store, ikey, dt)?;

        if let Some(parent) = ikey.key.parent() {
            let pattern = ConfigKeyVal::new(parent.clone());
            if !self.exists(&*store, &pattern, dt, MatchOpts::none(), TableRole::Main)? {
                return Err(UpllError::ParentDoesNotExist(parent.to_string()));
            }
        }
        if self.exists(&*store, ikey, dt, MatchOpts::none(), TableRole::Main)? {
            return Err(UpllError::InstanceExists(ikey.key.to_string()));
        }

        let mut row = mgr.dup_config_key_val(ikey, TableRole::Main)?;
        mgr.get_controller_domain_id(self, &*store, &mut row, dt)?;
        if dt == DataType::Candidate && !mgr.vtn_scoped() {
            if let Some(ctrlr) = row.ctrlr_id().map(str::to_string) {
                mgr.validate_capability(self, &*store, Operation::Create, dt, &row, &ctrlr)?;
            }
        }

        store.update_config_db(&row, dt, UpdateOp::Create, &MatchOpts::none(), TableRole::Main)?;
        mgr.update_references(self, store, dt, Operation::Create, Some(&row), None)?;

        if mgr.vtn_scoped() {
            if let Some(vtn) = row.key.vtn_name() {
                for (ctrlr, domain) in self.vtn_spans(&*store, dt, vtn)? {
                    self.create_ctrlr_row(store, mgr, dt, &row, &ctrlr, &domain)?;
                }
            }
        }

        bump(&self.counters.creates);
        debug!(key = %row, dt = %dt, "created");
        Ok(())
    }

    /// Applies an update request to an existing record.
    pub fn update_mo(
        &self,
        req: &IpcReqRespHeader,
        ikey: &ConfigKeyVal,
        store: &mut dyn ConfigStore,
    ) -> UpllResult<()> {
        let mgr = self.manager(ikey.key_type())?;
        if !mgr.supports_update() {
            return Err(UpllError::NotAllowedForThisKt(ikey.key_type().to_string()));
        }
        mgr.validate_message(req, ikey)?;
        let dt = req.datatype;

        let old = read_main(&*store, ikey, dt)?;
        let mut row = old.clone();
        mgr.apply_update(&mut row, ikey)?;
        mgr.validate_attribute(self, &*store, &row, dt)?;
        if dt == DataType::Candidate && !mgr.vtn_scoped() {
            if let Some(ctrlr) = row.ctrlr_id() {
                mgr.validate_capability(self, &*store, Operation::Update, dt, ikey, ctrlr)?;
            }
        }

        store.update_config_db(&row, dt, UpdateOp::Update, &MatchOpts::none(), TableRole::Main)?;
        mgr.update_references(self, store, dt, Operation::Update, Some(&row), Some(&old))?;

        if mgr.vtn_scoped() {
            let ctrlr_rows = self.absent_as_empty(store.read_config_db(
                &ConfigKeyVal::new(row.key.clone()),
                dt,
                &DbSubOp::read_multiple(),
                TableRole::Ctrlr,
            ))?;
            for mut ctrlr_row in ctrlr_rows {
                ctrlr_row.vals = row.vals.clone();
                store.update_config_db(
                    &ctrlr_row,
                    dt,
                    UpdateOp::Update,
                    &MatchOpts::ctrlr_domain(),
                    TableRole::Ctrlr,
                )?;
            }
        }

        bump(&self.counters.updates);
        debug!(key = %row, dt = %dt, "updated");
        Ok(())
    }

    /// Deletes a record and everything below it.
    ///
    /// The record must exist. Its own dependents are checked with
    /// `is_referenced` before anything is removed; descendants found by the
    /// cascade are removed without that check.
    pub fn delete_mo(
        &self,
        req: &IpcReqRespHeader,
        ikey: &ConfigKeyVal,
        store: &mut dyn ConfigStore,
    ) -> UpllResult<()> {
        let mgr = self.manager(ikey.key_type())?;
        mgr.validate_message(req, ikey)?;
        let dt = req.datatype;

        let row = read_main(&*store, &ConfigKeyVal::new(ikey.key.clone()), dt)?;
        mgr.is_referenced(self, &*store, &row, dt)?;
        self.delete_children(store, mgr, &row, dt)?;
        self.delete_record(store, mgr, &row, dt)?;

        bump(&self.counters.deletes);
        debug!(key = %row, dt = %dt, "deleted");
        Ok(())
    }

    fn delete_children(
        &self,
        store: &mut dyn ConfigStore,
        mgr: &dyn MoMgr,
        parent: &ConfigKeyVal,
        dt: DataType,
    ) -> UpllResult<()> {
        for child_kt in mgr.child_key_types() {
            let child_mgr = self.manager(*child_kt)?;
            let pattern = child_mgr.get_child_config_key(Some(parent))?;
            let read = DbSubOp::read_multiple();
            let children = match store.read_config_db(&pattern, dt, &read, TableRole::Main) {
                Ok(rows) => rows,
                Err(e) => {
                    let e = UpllError::from(e);
                    if is_absent(&e) {
                        trace!(parent = %parent.key, child = %child_kt, "nothing to cascade");
                        bump(&self.counters.folded_absences);
                        continue;
                    }
                    return Err(e);
                }
            };
            for child in children {
                self.delete_children(store, child_mgr, &child, dt)?;
                self.delete_record(store, child_mgr, &child, dt)?;
            }
        }
        Ok(())
    }

    /// Removes one record's rows from every table and releases what it
    /// holds on other records.
    fn delete_record(
        &self,
        store: &mut dyn ConfigStore,
        mgr: &dyn MoMgr,
        row: &ConfigKeyVal,
        dt: DataType,
    ) -> UpllResult<()> {
        let pattern = ConfigKeyVal::new(row.key.clone());
        store.update_config_db(
            &pattern,
            dt,
            UpdateOp::Delete,
            &MatchOpts::none(),
            TableRole::Main,
        )?;
        for table in mgr.tables().iter().filter(|t| **t != TableRole::Main) {
            let deleted =
                store.update_config_db(&pattern, dt, UpdateOp::Delete, &MatchOpts::none(), *table);
            if let Err(e) = deleted {
                let e = UpllError::from(e);
                if !is_absent(&e) {
                    return Err(e);
                }
            }
        }
        mgr.update_references(self, store, dt, Operation::Delete, None, Some(row))
    }
}
