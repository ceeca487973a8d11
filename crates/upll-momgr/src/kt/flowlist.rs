//! Flow list manager.
//!
//! Flow lists are a global namespace. They are never pushed on their own;
//! controllers learn them through the flow-filter entries that name them,
//! which is also what keeps their reference count.

use super::{check_name, wrong_key, wrong_val};
use crate::engine::MoMgrImpl;
use crate::momgr::{read_main, MoMgr};
use crate::{is_absent, UpllError, UpllResult};
use upll_dal::ConfigStore;
use upll_types::{
    ConfigKey, ConfigKeyVal, ConfigVal, DataType, KeyFlowList, KeyType, Operation, TableRole,
    ValFlowList, MAX_LEN_FLOWLIST_NAME,
};

#[derive(Debug, Default, Clone, Copy)]
pub struct FlowListMoMgr;

fn flowlist_val(ckv: &ConfigKeyVal) -> Option<&ValFlowList> {
    ckv.vals.iter().find_map(|v| match v {
        ConfigVal::FlowList(v) => Some(v),
        _ => None,
    })
}

impl MoMgr for FlowListMoMgr {
    fn key_type(&self) -> KeyType {
        KeyType::FlowList
    }

    fn tables(&self) -> &'static [TableRole] {
        &[TableRole::Main]
    }

    fn parent_key_type(&self) -> Option<KeyType> {
        None
    }

    fn get_child_config_key(&self, parent: Option<&ConfigKeyVal>) -> UpllResult<ConfigKeyVal> {
        match parent.map(|p| &p.key) {
            None => Ok(ConfigKeyVal::new(KeyFlowList::default())),
            Some(ConfigKey::FlowList(k)) => Ok(ConfigKeyVal::new(k.clone())),
            Some(other) => Err(UpllError::generic(format!(
                "cannot derive a {} key from {}",
                KeyType::FlowList,
                other.key_type()
            ))),
        }
    }

    fn validate_key(&self, key: &ConfigKey, op: Operation) -> UpllResult<()> {
        match key {
            ConfigKey::FlowList(k) => {
                check_name("flowlist_name", &k.flowlist_name, MAX_LEN_FLOWLIST_NAME, op)
            }
            other => Err(wrong_key(KeyType::FlowList, other)),
        }
    }

    fn validate_val(&self, ikey: &ConfigKeyVal, _op: Operation) -> UpllResult<()> {
        match ikey.val() {
            None | Some(ConfigVal::FlowList(_)) => Ok(()),
            Some(_) => Err(wrong_val(KeyType::FlowList)),
        }
    }

    fn alloc_val(&self, table: TableRole) -> Option<ConfigVal> {
        match table {
            TableRole::Main => Some(ConfigVal::FlowList(ValFlowList::default())),
            _ => None,
        }
    }

    /// The reference count is owned by the engine, never by a request.
    fn dup_config_key_val(
        &self,
        ikey: &ConfigKeyVal,
        table: TableRole,
    ) -> UpllResult<ConfigKeyVal> {
        if !self.tables().contains(&table) {
            return Err(UpllError::generic(format!("{} has no {}", KeyType::FlowList, table)));
        }
        let mut dup = ikey.clone();
        dup.status = Default::default();
        if table == TableRole::Main {
            match dup.val_mut() {
                Some(ConfigVal::FlowList(v)) => v.ref_count = 0,
                Some(_) => {}
                None => dup.vals.push(ConfigVal::FlowList(ValFlowList::default())),
            }
        }
        Ok(dup)
    }

    fn filter_attributes(&self, new: &ConfigKeyVal, old: &ConfigKeyVal) -> bool {
        new.key == old.key
            && flowlist_val(new).map(|v| &v.ip_type) == flowlist_val(old).map(|v| &v.ip_type)
    }

    fn is_referenced(
        &self,
        _engine: &MoMgrImpl,
        store: &dyn ConfigStore,
        ikey: &ConfigKeyVal,
        dt: DataType,
    ) -> UpllResult<()> {
        let row = match read_main(store, &ConfigKeyVal::new(ikey.key.clone()), dt) {
            Ok(row) => row,
            Err(e) if is_absent(&e) => return Ok(()),
            Err(e) => return Err(e),
        };
        match flowlist_val(&row) {
            Some(v) if v.ref_count > 0 => Err(UpllError::semantic(format!(
                "{} is used by {} flow-filter entries",
                row.key, v.ref_count
            ))),
            _ => Ok(()),
        }
    }

    fn pushes_to_driver(&self) -> bool {
        false
    }
}
