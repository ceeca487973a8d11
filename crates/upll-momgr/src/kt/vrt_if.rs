//! Vrouter interface manager.

use super::{check_description, check_name, child_key, vrt_if_key_from, wrong_key, wrong_val};
use crate::momgr::MoMgr;
use crate::UpllResult;
use upll_types::{
    ConfigKey, ConfigKeyVal, ConfigVal, KeyType, Operation, TableRole, ValVrtIf,
    MAX_LEN_INTERFACE_NAME, MAX_LEN_VNODE_NAME, MAX_LEN_VTN_NAME,
};

#[derive(Debug, Default, Clone, Copy)]
pub struct VrtIfMoMgr;

impl MoMgr for VrtIfMoMgr {
    fn key_type(&self) -> KeyType {
        KeyType::VrtIf
    }

    fn tables(&self) -> &'static [TableRole] {
        &[TableRole::Main]
    }

    fn parent_key_type(&self) -> Option<KeyType> {
        Some(KeyType::Vrt)
    }

    fn child_key_types(&self) -> &'static [KeyType] {
        &[KeyType::VrtIfFlowFilter]
    }

    fn get_child_config_key(&self, parent: Option<&ConfigKeyVal>) -> UpllResult<ConfigKeyVal> {
        child_key(KeyType::VrtIf, parent, vrt_if_key_from)
    }

    fn validate_key(&self, key: &ConfigKey, op: Operation) -> UpllResult<()> {
        match key {
            ConfigKey::VrtIf(k) => {
                check_name("vtn_name", &k.vrt_key.vtn_key.vtn_name, MAX_LEN_VTN_NAME, op)?;
                check_name("vrouter_name", &k.vrt_key.vrouter_name, MAX_LEN_VNODE_NAME, op)?;
                check_name("if_name", &k.if_name, MAX_LEN_INTERFACE_NAME, op)
            }
            other => Err(wrong_key(KeyType::VrtIf, other)),
        }
    }

    fn validate_val(&self, ikey: &ConfigKeyVal, _op: Operation) -> UpllResult<()> {
        match ikey.val() {
            None => Ok(()),
            Some(ConfigVal::VrtIf(v)) => check_description(&v.description),
            Some(_) => Err(wrong_val(KeyType::VrtIf)),
        }
    }

    fn alloc_val(&self, table: TableRole) -> Option<ConfigVal> {
        match table {
            TableRole::Main => Some(ConfigVal::VrtIf(ValVrtIf::default())),
            _ => None,
        }
    }
}
