//! VTN manager.
//!
//! A VTN has no controller of its own. Its CTRLR rows are reference-counted
//! spans onto the (controller, domain) pairs its vrouters live on, and those
//! rows are what gets pushed.

use super::{check_description, check_name, child_key, wrong_key, wrong_val};
use crate::momgr::MoMgr;
use crate::UpllResult;
use upll_types::{
    ConfigKey, ConfigKeyVal, ConfigVal, KeyType, Operation, RenameComponent, TableRole,
    ValRename, ValVtn, ValVtnCtrlrSpan, MAX_LEN_VTN_NAME,
};

#[derive(Debug, Default, Clone, Copy)]
pub struct VtnMoMgr;

impl MoMgr for VtnMoMgr {
    fn key_type(&self) -> KeyType {
        KeyType::Vtn
    }

    fn tables(&self) -> &'static [TableRole] {
        &[TableRole::Main, TableRole::Ctrlr, TableRole::Rename]
    }

    fn parent_key_type(&self) -> Option<KeyType> {
        None
    }

    fn child_key_types(&self) -> &'static [KeyType] {
        &[KeyType::Vrt, KeyType::VtnFlowFilter, KeyType::VtnPolicingMap]
    }

    fn get_child_config_key(&self, parent: Option<&ConfigKeyVal>) -> UpllResult<ConfigKeyVal> {
        child_key(KeyType::Vtn, parent, |key| match key {
            ConfigKey::Vtn(k) => Some(k.clone()),
            _ => None,
        })
    }

    fn validate_key(&self, key: &ConfigKey, op: Operation) -> UpllResult<()> {
        match key {
            ConfigKey::Vtn(k) => check_name("vtn_name", &k.vtn_name, MAX_LEN_VTN_NAME, op),
            other => Err(wrong_key(KeyType::Vtn, other)),
        }
    }

    fn validate_val(&self, ikey: &ConfigKeyVal, _op: Operation) -> UpllResult<()> {
        match ikey.val() {
            None => Ok(()),
            Some(ConfigVal::Vtn(v)) => check_description(&v.description),
            Some(_) => Err(wrong_val(KeyType::Vtn)),
        }
    }

    fn alloc_val(&self, table: TableRole) -> Option<ConfigVal> {
        match table {
            TableRole::Main => Some(ConfigVal::Vtn(ValVtn::default())),
            TableRole::Ctrlr => Some(ConfigVal::VtnCtrlrSpan(ValVtnCtrlrSpan::default())),
            TableRole::Rename => Some(ConfigVal::Rename(ValRename::default())),
            TableRole::Convert => None,
        }
    }

    fn rename_component(&self) -> Option<RenameComponent> {
        Some(RenameComponent::Vtn)
    }

    /// Controllers only learn the VTN's name.
    fn driver_payload(&self, ckv: &ConfigKeyVal, _op: Operation) -> ConfigKeyVal {
        ckv.key_only()
    }

    fn push_update(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::UpllError;
    use pretty_assertions::assert_eq;
    use upll_types::{Attr, KeyVrt, KeyVtn};

    #[test]
    fn test_key_syntax() {
        let mgr = VtnMoMgr;
        assert!(mgr.validate_key(&KeyVtn::new("vtn_1").into(), Operation::Create).is_ok());
        assert!(matches!(
            mgr.validate_key(&KeyVtn::new("bad name").into(), Operation::Create),
            Err(UpllError::CfgSyntax(_))
        ));
        assert!(matches!(
            mgr.validate_key(&KeyVrt::new("v", "r").into(), Operation::Create),
            Err(UpllError::BadRequest(_))
        ));
    }

    #[test]
    fn test_description_checked() {
        let mgr = VtnMoMgr;
        let long = ConfigKeyVal::with_val(
            KeyVtn::new("v1"),
            ConfigVal::Vtn(ValVtn {
                description: Attr::Valid("x".repeat(200)),
            }),
        );
        assert!(mgr.validate_val(&long, Operation::Create).is_err());
    }

    #[test]
    fn test_payload_is_key_only() {
        let ckv = ConfigKeyVal::with_val(KeyVtn::new("v1"), ConfigVal::Vtn(ValVtn::default()))
            .on_ctrlr("c1", "d1");
        let payload = VtnMoMgr.driver_payload(&ckv, Operation::Create);
        assert!(payload.vals.is_empty());
        assert_eq!(payload.ctrlr_id(), Some("c1"));
    }
}
