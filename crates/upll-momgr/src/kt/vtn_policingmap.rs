//! VTN policing-map manager. Like the VTN flow filter it is pushed to every
//! pair the VTN spans.

use super::{check_name, check_optional_name, child_key, wrong_key, wrong_val};
use crate::engine::{import, MoMgrImpl};
use crate::momgr::MoMgr;
use crate::{UpllError, UpllResult};
use upll_dal::ConfigStore;
use upll_types::{
    ConfigKey, ConfigKeyVal, ConfigVal, KeyType, KeyVtnPolicingMap, Operation, TableRole,
    ValPolicingMap, MAX_LEN_POLICER_NAME, MAX_LEN_VTN_NAME,
};

#[derive(Debug, Default, Clone, Copy)]
pub struct VtnPolicingMapMoMgr;

impl MoMgr for VtnPolicingMapMoMgr {
    fn key_type(&self) -> KeyType {
        KeyType::VtnPolicingMap
    }

    fn tables(&self) -> &'static [TableRole] {
        &[TableRole::Main, TableRole::Ctrlr]
    }

    fn parent_key_type(&self) -> Option<KeyType> {
        Some(KeyType::Vtn)
    }

    fn get_child_config_key(&self, parent: Option<&ConfigKeyVal>) -> UpllResult<ConfigKeyVal> {
        child_key(KeyType::VtnPolicingMap, parent, |key| match key {
            ConfigKey::VtnPolicingMap(k) => Some(k.clone()),
            ConfigKey::Vtn(k) => Some(KeyVtnPolicingMap { vtn_key: k.clone() }),
            _ => None,
        })
    }

    fn validate_key(&self, key: &ConfigKey, op: Operation) -> UpllResult<()> {
        match key {
            ConfigKey::VtnPolicingMap(k) => {
                check_name("vtn_name", &k.vtn_key.vtn_name, MAX_LEN_VTN_NAME, op)
            }
            other => Err(wrong_key(KeyType::VtnPolicingMap, other)),
        }
    }

    fn validate_val(&self, ikey: &ConfigKeyVal, op: Operation) -> UpllResult<()> {
        match ikey.val() {
            Some(ConfigVal::PolicingMap(v)) => {
                if op == Operation::Create && !v.policer_name.is_valid() {
                    return Err(UpllError::syntax("policing map needs a policer name"));
                }
                check_optional_name("policer_name", &v.policer_name, MAX_LEN_POLICER_NAME)
            }
            Some(_) => Err(wrong_val(KeyType::VtnPolicingMap)),
            None if op == Operation::Create => {
                Err(UpllError::syntax("policing map needs a policer name"))
            }
            None => Ok(()),
        }
    }

    fn alloc_val(&self, table: TableRole) -> Option<ConfigVal> {
        match table {
            TableRole::Main | TableRole::Ctrlr => {
                Some(ConfigVal::PolicingMap(ValPolicingMap::default()))
            }
            _ => None,
        }
    }

    fn vtn_scoped(&self) -> bool {
        true
    }

    fn merge_import_to_candidate(
        &self,
        engine: &MoMgrImpl,
        store: &mut dyn ConfigStore,
        ctrlr: &str,
    ) -> UpllResult<()> {
        import::merge_vtn_scoped(engine, store, self, ctrlr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use upll_types::Attr;

    fn policing(name: Attr<String>) -> ConfigKeyVal {
        ConfigKeyVal::with_val(
            KeyVtnPolicingMap::new("v1"),
            ConfigVal::PolicingMap(ValPolicingMap { policer_name: name }),
        )
    }

    #[test]
    fn test_policer_name_required_on_create() {
        let mgr = VtnPolicingMapMoMgr;
        assert!(mgr
            .validate_val(&policing(Attr::Valid("pol1".into())), Operation::Create)
            .is_ok());
        assert!(matches!(
            mgr.validate_val(&policing(Attr::Invalid), Operation::Create),
            Err(UpllError::CfgSyntax(_))
        ));
        assert!(mgr
            .validate_val(&policing(Attr::ValidNoValue), Operation::Update)
            .is_ok());
    }

    #[test]
    fn test_policer_name_syntax() {
        let long = policing(Attr::Valid("p".repeat(MAX_LEN_POLICER_NAME + 1)));
        assert!(VtnPolicingMapMoMgr.validate_val(&long, Operation::Update).is_err());
    }
}
