//! The per-key-type hook set.
//!
//! [`MoMgr`] is what a key type supplies to the generic engine: key
//! construction, validation, value duplication, status bookkeeping, driver
//! payload shaping and the gating rules of the push path. Every hook that
//! has a sensible generic behaviour carries a default; a key type overrides
//! only what differs.

use crate::engine::{rename, MoMgrImpl};
use crate::request::{validate_header, IpcReqRespHeader};
use crate::{UpllError, UpllResult};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use upll_dal::{ConfigStore, DbSubOp};
use upll_types::{
    ConfigKey, ConfigKeyVal, ConfigStatus, ConfigVal, DataType, KeyType, Operation,
    RenameComponent, TableRole, ValidFlag,
};

/// Dispatch table from key type to its manager.
pub type MoMgrRegistry = BTreeMap<KeyType, Arc<dyn MoMgr>>;

/// Hooks a key type plugs into [`MoMgrImpl`].
pub trait MoMgr: Send + Sync + fmt::Debug {
    fn key_type(&self) -> KeyType;

    /// Tables this key type keeps rows in, MAIN first.
    fn tables(&self) -> &'static [TableRole];

    fn parent_key_type(&self) -> Option<KeyType>;

    /// Key types whose keys embed this key type's key.
    fn child_key_types(&self) -> &'static [KeyType] {
        &[]
    }

    /// Builds a key of this key type from a related key.
    ///
    /// With no parent the result is an all-wildcard enumeration pattern.
    /// Parents of an unrelated key type are rejected with a generic error.
    fn get_child_config_key(&self, parent: Option<&ConfigKeyVal>) -> UpllResult<ConfigKeyVal>;

    /// Returns the key of the immediate ancestor.
    fn get_parent_config_key(&self, ikey: &ConfigKeyVal) -> UpllResult<ConfigKeyVal> {
        if ikey.key_type() != self.key_type() {
            return Err(UpllError::generic(format!(
                "{} is not a {} key",
                ikey.key,
                self.key_type()
            )));
        }
        ikey.key
            .parent()
            .map(ConfigKeyVal::new)
            .ok_or_else(|| UpllError::generic(format!("{} has no parent", self.key_type())))
    }

    /// Field-level syntax of the key.
    fn validate_key(&self, key: &ConfigKey, op: Operation) -> UpllResult<()>;

    /// Field-level syntax of the value on create and update.
    fn validate_val(&self, _ikey: &ConfigKeyVal, _op: Operation) -> UpllResult<()> {
        Ok(())
    }

    fn validate_message(&self, req: &IpcReqRespHeader, ikey: &ConfigKeyVal) -> UpllResult<()> {
        validate_header(req, ikey, self.key_type())?;
        self.validate_key(&ikey.key, req.operation)?;
        if matches!(req.operation, Operation::Create | Operation::Update) {
            self.validate_val(ikey, req.operation)?;
        }
        Ok(())
    }

    /// Cross-table semantic checks in plane `dt`.
    fn validate_attribute(
        &self,
        _engine: &MoMgrImpl,
        _store: &dyn ConfigStore,
        _ikey: &ConfigKeyVal,
        _dt: DataType,
    ) -> UpllResult<()> {
        Ok(())
    }

    /// Allocates an empty value of the shape stored in `table`.
    fn alloc_val(&self, table: TableRole) -> Option<ConfigVal>;

    /// Copies a request record into the shape stored in `table`.
    fn dup_config_key_val(
        &self,
        ikey: &ConfigKeyVal,
        table: TableRole,
    ) -> UpllResult<ConfigKeyVal> {
        if !self.tables().contains(&table) {
            return Err(UpllError::generic(format!(
                "{} has no {}",
                self.key_type(),
                table
            )));
        }
        let mut dup = ikey.clone();
        dup.status = Default::default();
        Ok(dup)
    }

    /// Sets the row status and the status of every valid attribute.
    fn update_config_status(&self, ckv: &mut ConfigKeyVal, status: ConfigStatus) {
        ckv.status.row = status;
        ckv.status.attrs = ckv
            .val()
            .map(ConfigVal::valid_flags)
            .unwrap_or_default()
            .into_iter()
            .map(|flag| {
                if flag == ValidFlag::Valid {
                    status
                } else {
                    ConfigStatus::Unknown
                }
            })
            .collect();
    }

    /// Returns true when `new` and `old` carry the same configuration and
    /// differ at most in status bookkeeping.
    fn filter_attributes(&self, new: &ConfigKeyVal, old: &ConfigKeyVal) -> bool {
        new.key == old.key && new.vals == old.vals
    }

    /// Validity flags checked against a capability bitmap.
    fn capability_flags(&self, ckv: &ConfigKeyVal) -> Vec<ValidFlag> {
        ckv.val().map(ConfigVal::valid_flags).unwrap_or_default()
    }

    /// Checks the capability index before a create, update or read.
    fn validate_capability(
        &self,
        engine: &MoMgrImpl,
        store: &dyn ConfigStore,
        op: Operation,
        dt: DataType,
        ckv: &ConfigKeyVal,
        ctrlr: &str,
    ) -> UpllResult<()> {
        engine.validate_capability(store, op, dt, ckv, ctrlr)
    }

    /// Refuses deletion while something still depends on `ikey`.
    fn is_referenced(
        &self,
        _engine: &MoMgrImpl,
        _store: &dyn ConfigStore,
        _ikey: &ConfigKeyVal,
        _dt: DataType,
    ) -> UpllResult<()> {
        Ok(())
    }

    /// Fills in controller, domain and lineage flags before a create.
    ///
    /// The default inherits them from the parent's MAIN row.
    fn get_controller_domain_id(
        &self,
        engine: &MoMgrImpl,
        store: &dyn ConfigStore,
        ckv: &mut ConfigKeyVal,
        dt: DataType,
    ) -> UpllResult<()> {
        engine.inherit_from_parent(store, ckv, dt)
    }

    /// Rewrites UNC names in `ckv` to the names its controller knows.
    fn get_renamed_controller_key(
        &self,
        engine: &MoMgrImpl,
        store: &dyn ConfigStore,
        ckv: &mut ConfigKeyVal,
        dt: DataType,
    ) -> UpllResult<()> {
        rename::get_renamed_controller_key(engine, store, ckv, dt)
    }

    /// Rewrites controller names in `ckv` to UNC names.
    fn get_renamed_unc_key(
        &self,
        engine: &MoMgrImpl,
        store: &dyn ConfigStore,
        ckv: &mut ConfigKeyVal,
        dt: DataType,
    ) -> UpllResult<()> {
        rename::get_renamed_unc_key(engine, store, ckv, dt)
    }

    /// Name component a rename of this key type rewrites.
    fn rename_component(&self) -> Option<RenameComponent> {
        None
    }

    /// Shapes the record sent to the driver.
    fn driver_payload(&self, ckv: &ConfigKeyVal, op: Operation) -> ConfigKeyVal {
        if op == Operation::Delete {
            ckv.key_only()
        } else {
            let mut payload = ckv.clone();
            payload.status = Default::default();
            payload
        }
    }

    /// Decides the wire operation for a diff row, or `None` to skip it.
    fn tx_gate(
        &self,
        op: Operation,
        _new: &ConfigKeyVal,
        _old: Option<&ConfigKeyVal>,
    ) -> Option<Operation> {
        Some(op)
    }

    /// Whether northbound updates are accepted.
    fn supports_update(&self) -> bool {
        true
    }

    /// Whether update diffs are pushed to controllers.
    fn push_update(&self) -> bool {
        true
    }

    /// Whether the key type is ever sent to a controller.
    fn pushes_to_driver(&self) -> bool {
        true
    }

    /// Whether the key type fans out to every controller its VTN spans.
    fn vtn_scoped(&self) -> bool {
        false
    }

    /// Table whose rows are pushed and carry per-controller status.
    fn push_table(&self) -> TableRole {
        if self.tables().contains(&TableRole::Ctrlr) {
            TableRole::Ctrlr
        } else {
            TableRole::Main
        }
    }

    /// Builds the CTRLR row of `main` for one controller and domain.
    fn ctrlr_row(&self, main: &ConfigKeyVal, ctrlr: &str, domain: &str) -> ConfigKeyVal {
        let mut row = ConfigKeyVal::new(main.key.clone()).on_ctrlr(ctrlr, domain);
        row.vals = main.vals.clone();
        row.user_data.flags = main.flags();
        row
    }

    /// Whether a detail read of this record may query the controller.
    fn read_detail_eligible(&self, _ckv: &ConfigKeyVal) -> bool {
        true
    }

    /// Folds a detail-read response into the caller's record.
    fn construct_read_detail_response(
        &self,
        ckv: &mut ConfigKeyVal,
        response: Option<ConfigKeyVal>,
        _ctrlr: &str,
        _domain: &str,
    ) -> UpllResult<()> {
        if let Some(resp) = response {
            ckv.vals.extend(resp.vals);
        }
        Ok(())
    }

    /// Applies an update request to the stored record.
    fn apply_update(&self, existing: &mut ConfigKeyVal, update: &ConfigKeyVal) -> UpllResult<()> {
        match (existing.val_mut(), update.val()) {
            (Some(ours), Some(theirs)) => {
                if !ours.merge_from(theirs) {
                    return Err(UpllError::bad_request(format!(
                        "value shape does not match {}",
                        self.key_type()
                    )));
                }
            }
            (None, Some(theirs)) => existing.vals.push(theirs.clone()),
            (_, None) => {}
        }
        Ok(())
    }

    /// Maintains rows other key types keep about this one.
    fn update_references(
        &self,
        _engine: &MoMgrImpl,
        _store: &mut dyn ConfigStore,
        _dt: DataType,
        _op: Operation,
        _new: Option<&ConfigKeyVal>,
        _old: Option<&ConfigKeyVal>,
    ) -> UpllResult<()> {
        Ok(())
    }

    /// Checks imported rows against CANDIDATE and RUNNING.
    fn merge_validate(
        &self,
        engine: &MoMgrImpl,
        store: &dyn ConfigStore,
        ctrlr: &str,
        import_type: crate::engine::ImportType,
    ) -> UpllResult<()> {
        crate::engine::import::merge_validate_generic(
            engine,
            store,
            self.key_type(),
            ctrlr,
            import_type,
        )
    }

    /// Moves imported rows into CANDIDATE.
    fn merge_import_to_candidate(
        &self,
        engine: &MoMgrImpl,
        store: &mut dyn ConfigStore,
        ctrlr: &str,
    ) -> UpllResult<()> {
        crate::engine::import::merge_import_generic(engine, store, self.key_type(), ctrlr)
    }
}

/// Reads the MAIN row selected by `key` in `dt`.
pub(crate) fn read_main(
    store: &dyn ConfigStore,
    key: &ConfigKeyVal,
    dt: DataType,
) -> UpllResult<ConfigKeyVal> {
    let mut rows = store.read_config_db(key, dt, &DbSubOp::read(), TableRole::Main)?;
    rows.pop().ok_or(UpllError::NoSuchInstance)
}
