//! Vrouter interface flow-filter manager.
//!
//! A filter bound to an interface only exists on the controller once the
//! interface is backed by a vlink or a portmap. The interface lineage flags
//! on the record decide whether a diff row is pushed at all, and a change of
//! lineage between RUNNING and CANDIDATE turns an update into a create or a
//! delete on the wire.

use super::{check_direction, check_name, child_key, vrt_if_flowfilter_key_from, wrong_key};
use crate::engine::MoMgrImpl;
use crate::momgr::MoMgr;
use crate::{UpllError, UpllResult};
use upll_dal::{ConfigStore, DbSubOp};
use upll_types::{
    Attr, ConfigKey, ConfigKeyVal, ConfigVal, DataType, InterfaceType, KeyType, Operation,
    RecordFlags, TableRole, ValDriverVrtIf, MAX_LEN_INTERFACE_NAME, MAX_LEN_VNODE_NAME,
    MAX_LEN_VTN_NAME,
};

#[derive(Debug, Default, Clone, Copy)]
pub struct VrtIfFlowFilterMoMgr;

/// Wire operation of an interface-bound diff row, or `None` when the
/// controller has nothing to learn.
pub(super) fn interface_gate(
    op: Operation,
    new: &ConfigKeyVal,
    old: Option<&ConfigKeyVal>,
) -> Option<Operation> {
    let now = new.flags().interface_configured();
    match op {
        Operation::Update => {
            let before = old.map_or(now, |o| o.flags().interface_configured());
            match (before, now) {
                (true, true) => Some(Operation::Update),
                (true, false) => Some(Operation::Delete),
                (false, true) => Some(Operation::Create),
                (false, false) => None,
            }
        }
        _ => now.then_some(op),
    }
}

/// Adapter value naming what backs the interface.
fn interface_val(flags: RecordFlags) -> ConfigVal {
    let interface_type = if flags.vlink_configured {
        Attr::Valid(InterfaceType::Vlink)
    } else if flags.portmap_configured {
        Attr::Valid(InterfaceType::Portmap)
    } else {
        Attr::Invalid
    };
    ConfigVal::DriverVrtIf(ValDriverVrtIf { interface_type })
}

/// Driver record of an interface-bound row: the adapter value first, then
/// the row's own values unless the row is being deleted.
pub(super) fn interface_payload(ckv: &ConfigKeyVal, op: Operation) -> ConfigKeyVal {
    let mut payload = ckv.key_only();
    if op != Operation::Delete {
        payload.vals = ckv.vals.clone();
    }
    payload.vals.insert(0, interface_val(ckv.flags()));
    payload
}

/// Drops the adapter value from a controller answer.
fn without_interface_val(vals: Vec<ConfigVal>) -> impl Iterator<Item = ConfigVal> {
    vals.into_iter()
        .filter(|v| !matches!(v, ConfigVal::DriverVrtIf(_)))
}

impl MoMgr for VrtIfFlowFilterMoMgr {
    fn key_type(&self) -> KeyType {
        KeyType::VrtIfFlowFilter
    }

    fn tables(&self) -> &'static [TableRole] {
        &[TableRole::Main]
    }

    fn parent_key_type(&self) -> Option<KeyType> {
        Some(KeyType::VrtIf)
    }

    fn child_key_types(&self) -> &'static [KeyType] {
        &[KeyType::VrtIfFlowFilterEntry]
    }

    fn get_child_config_key(&self, parent: Option<&ConfigKeyVal>) -> UpllResult<ConfigKeyVal> {
        child_key(KeyType::VrtIfFlowFilter, parent, vrt_if_flowfilter_key_from)
    }

    fn validate_key(&self, key: &ConfigKey, op: Operation) -> UpllResult<()> {
        match key {
            ConfigKey::VrtIfFlowFilter(k) => {
                let if_key = &k.if_key;
                check_name("vtn_name", &if_key.vrt_key.vtn_key.vtn_name, MAX_LEN_VTN_NAME, op)?;
                check_name("vrouter_name", &if_key.vrt_key.vrouter_name, MAX_LEN_VNODE_NAME, op)?;
                check_name("if_name", &if_key.if_name, MAX_LEN_INTERFACE_NAME, op)?;
                check_direction(k.direction, op)
            }
            other => Err(wrong_key(KeyType::VrtIfFlowFilter, other)),
        }
    }

    fn validate_val(&self, ikey: &ConfigKeyVal, _op: Operation) -> UpllResult<()> {
        if ikey.vals.is_empty() {
            Ok(())
        } else {
            Err(UpllError::bad_request("an interface flow filter takes no value"))
        }
    }

    fn alloc_val(&self, _table: TableRole) -> Option<ConfigVal> {
        None
    }

    fn is_referenced(
        &self,
        engine: &MoMgrImpl,
        store: &dyn ConfigStore,
        ikey: &ConfigKeyVal,
        dt: DataType,
    ) -> UpllResult<()> {
        let pattern = engine
            .manager(KeyType::VrtIfFlowFilterEntry)?
            .get_child_config_key(Some(ikey))?;
        let entries = store.record_count(&pattern, dt, &DbSubOp::read_multiple(), TableRole::Main)?;
        if entries > 0 {
            return Err(UpllError::semantic(format!(
                "{} still has {} entries",
                ikey.key, entries
            )));
        }
        Ok(())
    }

    fn driver_payload(&self, ckv: &ConfigKeyVal, op: Operation) -> ConfigKeyVal {
        interface_payload(ckv, op)
    }

    fn tx_gate(
        &self,
        op: Operation,
        new: &ConfigKeyVal,
        old: Option<&ConfigKeyVal>,
    ) -> Option<Operation> {
        interface_gate(op, new, old)
    }

    fn supports_update(&self) -> bool {
        false
    }

    fn read_detail_eligible(&self, ckv: &ConfigKeyVal) -> bool {
        ckv.flags().interface_configured()
    }

    fn construct_read_detail_response(
        &self,
        ckv: &mut ConfigKeyVal,
        response: Option<ConfigKeyVal>,
        _ctrlr: &str,
        _domain: &str,
    ) -> UpllResult<()> {
        if let Some(resp) = response {
            ckv.vals.extend(without_interface_val(resp.vals));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use upll_types::{KeyVrtIf, KeyVrtIfFlowFilter};

    fn filter(vlink: bool, portmap: bool) -> ConfigKeyVal {
        let mut ckv = ConfigKeyVal::new(
            KeyVrtIfFlowFilter::new(KeyVrtIf::new("v1", "r1", "if1"), 0),
        )
            .on_ctrlr("c1", "d1");
        ckv.user_data.flags.vlink_configured = vlink;
        ckv.user_data.flags.portmap_configured = portmap;
        ckv
    }

    #[test]
    fn test_gate_follows_interface_lineage() {
        let on = filter(true, false);
        let off = filter(false, false);
        assert_eq!(interface_gate(Operation::Create, &on, None), Some(Operation::Create));
        assert_eq!(interface_gate(Operation::Create, &off, None), None);
        assert_eq!(interface_gate(Operation::Delete, &off, None), None);
        assert_eq!(
            interface_gate(Operation::Update, &on, Some(&on)),
            Some(Operation::Update)
        );
        assert_eq!(
            interface_gate(Operation::Update, &off, Some(&on)),
            Some(Operation::Delete)
        );
        assert_eq!(
            interface_gate(Operation::Update, &on, Some(&off)),
            Some(Operation::Create)
        );
        assert_eq!(interface_gate(Operation::Update, &off, Some(&off)), None);
    }

    #[test]
    fn test_payload_names_the_interface() {
        let payload = VrtIfFlowFilterMoMgr.driver_payload(&filter(false, true), Operation::Create);
        assert_eq!(
            payload.vals,
            vec![ConfigVal::DriverVrtIf(ValDriverVrtIf {
                interface_type: Attr::Valid(InterfaceType::Portmap),
            })]
        );
        assert_eq!(payload.ctrlr_id(), Some("c1"));
    }

    #[test]
    fn test_detail_only_when_configured() {
        assert!(VrtIfFlowFilterMoMgr.read_detail_eligible(&filter(true, false)));
        assert!(!VrtIfFlowFilterMoMgr.read_detail_eligible(&filter(false, false)));
    }
}
