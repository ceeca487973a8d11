//! Vrouter manager.
//!
//! A vrouter names its controller and domain in its value. Creating one
//! places the owning VTN on that pair; deleting the last one removes it.

use super::{
    check_description, check_name, check_optional_name, child_key, vrt_key_from, wrong_key,
    wrong_val,
};
use crate::engine::MoMgrImpl;
use crate::momgr::MoMgr;
use crate::{UpllError, UpllResult};
use upll_dal::ConfigStore;
use upll_types::{
    Attr, ConfigKey, ConfigKeyVal, ConfigVal, DataType, KeyType, Operation, RenameComponent,
    TableRole, ValRename, ValVrt, MAX_LEN_CTRLR_ID, MAX_LEN_DOMAIN_ID, MAX_LEN_VNODE_NAME,
    MAX_LEN_VTN_NAME,
};

#[derive(Debug, Default, Clone, Copy)]
pub struct VrtMoMgr;

fn vrt_val(ckv: &ConfigKeyVal) -> Option<&ValVrt> {
    ckv.vals.iter().find_map(|v| match v {
        ConfigVal::Vrt(v) => Some(v),
        _ => None,
    })
}

/// Controller and domain a vrouter record lives on.
fn placement(ckv: &ConfigKeyVal) -> Option<(&str, &str, &str)> {
    Some((ckv.key.vtn_name()?, ckv.ctrlr_id()?, ckv.domain_id()?))
}

impl MoMgr for VrtMoMgr {
    fn key_type(&self) -> KeyType {
        KeyType::Vrt
    }

    fn tables(&self) -> &'static [TableRole] {
        &[TableRole::Main, TableRole::Rename]
    }

    fn parent_key_type(&self) -> Option<KeyType> {
        Some(KeyType::Vtn)
    }

    fn child_key_types(&self) -> &'static [KeyType] {
        &[KeyType::VrtIf]
    }

    fn get_child_config_key(&self, parent: Option<&ConfigKeyVal>) -> UpllResult<ConfigKeyVal> {
        child_key(KeyType::Vrt, parent, vrt_key_from)
    }

    fn validate_key(&self, key: &ConfigKey, op: Operation) -> UpllResult<()> {
        match key {
            ConfigKey::Vrt(k) => {
                check_name("vtn_name", &k.vtn_key.vtn_name, MAX_LEN_VTN_NAME, op)?;
                check_name("vrouter_name", &k.vrouter_name, MAX_LEN_VNODE_NAME, op)
            }
            other => Err(wrong_key(KeyType::Vrt, other)),
        }
    }

    fn validate_val(&self, ikey: &ConfigKeyVal, op: Operation) -> UpllResult<()> {
        let val = match ikey.val() {
            Some(ConfigVal::Vrt(v)) => v,
            Some(_) => return Err(wrong_val(KeyType::Vrt)),
            None if op == Operation::Create => {
                return Err(UpllError::syntax("vrouter needs a controller and domain"))
            }
            None => return Ok(()),
        };
        if op == Operation::Create && !(val.controller_id.is_valid() && val.domain_id.is_valid()) {
            return Err(UpllError::syntax("vrouter needs a controller and domain"));
        }
        check_optional_name("controller_id", &val.controller_id, MAX_LEN_CTRLR_ID)?;
        check_optional_name("domain_id", &val.domain_id, MAX_LEN_DOMAIN_ID)?;
        check_description(&val.description)
    }

    fn alloc_val(&self, table: TableRole) -> Option<ConfigVal> {
        match table {
            TableRole::Main => Some(ConfigVal::Vrt(ValVrt::default())),
            TableRole::Rename => Some(ConfigVal::Rename(ValRename::default())),
            _ => None,
        }
    }

    fn get_controller_domain_id(
        &self,
        engine: &MoMgrImpl,
        store: &dyn ConfigStore,
        ckv: &mut ConfigKeyVal,
        dt: DataType,
    ) -> UpllResult<()> {
        engine.inherit_from_parent(store, ckv, dt)?;
        let (ctrlr, domain) = match vrt_val(ckv) {
            Some(v) => (v.controller_id.value().cloned(), v.domain_id.value().cloned()),
            None => (None, None),
        };
        match (ctrlr, domain) {
            (Some(ctrlr), Some(domain)) => {
                ckv.user_data.ctrlr_id = Some(ctrlr);
                ckv.user_data.domain_id = Some(domain);
                Ok(())
            }
            _ => Err(UpllError::syntax(format!("{} has no controller", ckv.key))),
        }
    }

    fn rename_component(&self) -> Option<RenameComponent> {
        Some(RenameComponent::Vnode)
    }

    /// The placement of a vrouter is fixed once created.
    fn apply_update(&self, existing: &mut ConfigKeyVal, update: &ConfigKeyVal) -> UpllResult<()> {
        if let (Some(ours), Some(theirs)) = (vrt_val(existing), vrt_val(update)) {
            let moved = |a: &Attr<String>, b: &Attr<String>| {
                b.value().is_some_and(|v| a.value() != Some(v))
            };
            if moved(&ours.controller_id, &theirs.controller_id)
                || moved(&ours.domain_id, &theirs.domain_id)
            {
                return Err(UpllError::semantic(format!(
                    "{} cannot move to another controller",
                    existing.key
                )));
            }
        }
        match (existing.val_mut(), update.val()) {
            (Some(ours), Some(theirs)) => {
                if !ours.merge_from(theirs) {
                    return Err(wrong_val(KeyType::Vrt));
                }
            }
            (None, Some(theirs)) => existing.vals.push(theirs.clone()),
            (_, None) => {}
        }
        Ok(())
    }

    fn update_references(
        &self,
        engine: &MoMgrImpl,
        store: &mut dyn ConfigStore,
        dt: DataType,
        op: Operation,
        new: Option<&ConfigKeyVal>,
        old: Option<&ConfigKeyVal>,
    ) -> UpllResult<()> {
        match op {
            Operation::Create => {
                if let Some((vtn, ctrlr, domain)) = new.and_then(placement) {
                    engine.add_vtn_span(store, dt, vtn, ctrlr, domain)?;
                }
            }
            Operation::Delete => {
                if let Some((vtn, ctrlr, domain)) = old.and_then(placement) {
                    engine.remove_vtn_span(store, dt, vtn, ctrlr, domain)?;
                }
            }
            _ => {}
        }
        Ok(())
    }
}
