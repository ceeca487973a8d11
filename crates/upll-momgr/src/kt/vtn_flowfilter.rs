//! VTN flow-filter manager.
//!
//! A VTN flow filter carries no attributes. It is applied on every
//! (controller, domain) pair its VTN spans, one CTRLR row per pair.

use super::{check_direction, check_name, child_key, wrong_key};
use crate::engine::{import, MoMgrImpl};
use crate::momgr::MoMgr;
use crate::{UpllError, UpllResult};
use upll_dal::ConfigStore;
use upll_types::{
    ConfigKey, ConfigKeyVal, ConfigVal, KeyType, KeyVtnFlowFilter, Operation, TableRole,
    MAX_LEN_VTN_NAME,
};

#[derive(Debug, Default, Clone, Copy)]
pub struct VtnFlowFilterMoMgr;

impl MoMgr for VtnFlowFilterMoMgr {
    fn key_type(&self) -> KeyType {
        KeyType::VtnFlowFilter
    }

    fn tables(&self) -> &'static [TableRole] {
        &[TableRole::Main, TableRole::Ctrlr]
    }

    fn parent_key_type(&self) -> Option<KeyType> {
        Some(KeyType::Vtn)
    }

    fn get_child_config_key(&self, parent: Option<&ConfigKeyVal>) -> UpllResult<ConfigKeyVal> {
        child_key(KeyType::VtnFlowFilter, parent, |key| match key {
            ConfigKey::VtnFlowFilter(k) => Some(k.clone()),
            ConfigKey::Vtn(k) => Some(KeyVtnFlowFilter {
                vtn_key: k.clone(),
                ..KeyVtnFlowFilter::default()
            }),
            _ => None,
        })
    }

    fn validate_key(&self, key: &ConfigKey, op: Operation) -> UpllResult<()> {
        match key {
            ConfigKey::VtnFlowFilter(k) => {
                check_name("vtn_name", &k.vtn_key.vtn_name, MAX_LEN_VTN_NAME, op)?;
                check_direction(k.input_direction, op)
            }
            other => Err(wrong_key(KeyType::VtnFlowFilter, other)),
        }
    }

    fn validate_val(&self, ikey: &ConfigKeyVal, _op: Operation) -> UpllResult<()> {
        if ikey.vals.is_empty() {
            Ok(())
        } else {
            Err(UpllError::bad_request("a vtn flow filter takes no value"))
        }
    }

    fn alloc_val(&self, _table: TableRole) -> Option<ConfigVal> {
        None
    }

    fn supports_update(&self) -> bool {
        false
    }

    fn vtn_scoped(&self) -> bool {
        true
    }

    /// Each controller answers with its own counters.
    fn construct_read_detail_response(
        &self,
        ckv: &mut ConfigKeyVal,
        response: Option<ConfigKeyVal>,
        ctrlr: &str,
        domain: &str,
    ) -> UpllResult<()> {
        let Some(resp) = response else {
            return Ok(());
        };
        for val in resp.vals {
            if let ConfigVal::VtnFlowFilterCtrlrStats(mut stats) = val {
                stats.ctrlr_id = ctrlr.to_string();
                stats.domain_id = domain.to_string();
                ckv.vals.push(ConfigVal::VtnFlowFilterCtrlrStats(stats));
            }
        }
        Ok(())
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
    use pretty_assertions::assert_eq;
    use upll_types::{ValVtnFlowFilterCtrlrStats, DIRECTION_SENTINEL};

    #[test]
    fn test_direction_sentinel_only_on_reads() {
        let mgr = VtnFlowFilterMoMgr;
        let any: ConfigKey = KeyVtnFlowFilter::new("v1", DIRECTION_SENTINEL).into();
        assert!(mgr.validate_key(&any, Operation::ReadSibling).is_ok());
        assert!(matches!(
            mgr.validate_key(&any, Operation::Create),
            Err(UpllError::CfgSyntax(_))
        ));
        let input: ConfigKey = KeyVtnFlowFilter::new("v1", 0).into();
        assert!(mgr.validate_key(&input, Operation::Create).is_ok());
    }

    #[test]
    fn test_value_rejected() {
        let ikey = ConfigKeyVal::with_val(
            KeyVtnFlowFilter::new("v1", 0),
            ConfigVal::VtnFlowFilterCtrlrStats(ValVtnFlowFilterCtrlrStats::default()),
        );
        assert!(matches!(
            VtnFlowFilterMoMgr.validate_val(&ikey, Operation::Create),
            Err(UpllError::BadRequest(_))
        ));
    }

    #[test]
    fn test_detail_stamps_controller() {
        let mut ckv = ConfigKeyVal::new(KeyVtnFlowFilter::new("v1", 0));
        let resp = ConfigKeyVal::with_val(
            KeyVtnFlowFilter::new("v1", 0),
            ConfigVal::VtnFlowFilterCtrlrStats(ValVtnFlowFilterCtrlrStats {
                packets: 10,
                octets: 640,
                ..ValVtnFlowFilterCtrlrStats::default()
            }),
        );
        VtnFlowFilterMoMgr
            .construct_read_detail_response(&mut ckv, Some(resp), "c1", "d1")
            .unwrap();
        VtnFlowFilterMoMgr
            .construct_read_detail_response(&mut ckv, None, "c2", "d1")
            .unwrap();
        assert_eq!(
            ckv.vals,
            vec![ConfigVal::VtnFlowFilterCtrlrStats(ValVtnFlowFilterCtrlrStats {
                ctrlr_id: "c1".into(),
                domain_id: "d1".into(),
                packets: 10,
                octets: 640,
            })]
        );
    }
}
