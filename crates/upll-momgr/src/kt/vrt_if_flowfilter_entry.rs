//! Vrouter interface flow-filter entry manager.
//!
//! Entries are pushed under the same interface lineage rules as their
//! filter. An entry naming a flow list holds one reference on it in the
//! entry's plane.

use super::vrt_if_flowfilter::{interface_gate, interface_payload};
use super::{
    check_direction, check_name, check_optional_name, child_key,
    vrt_if_flowfilter_entry_key_from, wrong_key, wrong_val,
};
use crate::engine::MoMgrImpl;
use crate::momgr::MoMgr;
use crate::{UpllError, UpllResult};
use upll_dal::{ConfigStore, MatchOpts};
use upll_types::{
    ConfigKey, ConfigKeyVal, ConfigVal, DataType, FlowFilterAction, KeyFlowList, KeyType,
    Operation, TableRole, ValFlowFilterEntry, MAX_LEN_FLOWLIST_NAME, MAX_LEN_INTERFACE_NAME,
    MAX_LEN_VNODE_NAME, MAX_LEN_VTN_NAME,
};

const MAX_DSCP: u8 = 63;
const MAX_PRIORITY: u8 = 7;

#[derive(Debug, Default, Clone, Copy)]
pub struct VrtIfFlowFilterEntryMoMgr;

fn flowlist_of(ckv: &ConfigKeyVal) -> Option<&str> {
    ckv.flow_filter_entry()
        .and_then(|v| v.flowlist_name.value())
        .map(String::as_str)
}

fn check_range(field: &str, attr: Option<&u8>, max: u8) -> UpllResult<()> {
    match attr {
        Some(v) if *v > max => Err(UpllError::syntax(format!("{} {} exceeds {}", field, v, max))),
        _ => Ok(()),
    }
}

fn check_entry(val: &ValFlowFilterEntry, op: Operation) -> UpllResult<()> {
    check_optional_name("flowlist_name", &val.flowlist_name, MAX_LEN_FLOWLIST_NAME)?;
    check_optional_name("redirect_node", &val.redirect_node, MAX_LEN_VNODE_NAME)?;
    check_optional_name("redirect_port", &val.redirect_port, MAX_LEN_INTERFACE_NAME)?;
    check_optional_name("nwm_name", &val.nwm_name, MAX_LEN_VNODE_NAME)?;
    check_range("dscp", val.dscp.value(), MAX_DSCP)?;
    check_range("priority", val.priority.value(), MAX_PRIORITY)?;
    if op == Operation::Create
        && val.action.value() == Some(&FlowFilterAction::Redirect)
        && !(val.redirect_node.is_valid() && val.redirect_port.is_valid())
    {
        return Err(UpllError::syntax("redirect needs a node and a port"));
    }
    Ok(())
}

impl MoMgr for VrtIfFlowFilterEntryMoMgr {
    fn key_type(&self) -> KeyType {
        KeyType::VrtIfFlowFilterEntry
    }

    fn tables(&self) -> &'static [TableRole] {
        &[TableRole::Main]
    }

    fn parent_key_type(&self) -> Option<KeyType> {
        Some(KeyType::VrtIfFlowFilter)
    }

    fn get_child_config_key(&self, parent: Option<&ConfigKeyVal>) -> UpllResult<ConfigKeyVal> {
        child_key(KeyType::VrtIfFlowFilterEntry, parent, vrt_if_flowfilter_entry_key_from)
    }

    fn validate_key(&self, key: &ConfigKey, op: Operation) -> UpllResult<()> {
        let ConfigKey::VrtIfFlowFilterEntry(k) = key else {
            return Err(wrong_key(KeyType::VrtIfFlowFilterEntry, key));
        };
        let ff = &k.flowfilter_key;
        let vrt = &ff.if_key.vrt_key;
        check_name("vtn_name", &vrt.vtn_key.vtn_name, MAX_LEN_VTN_NAME, op)?;
        check_name("vrouter_name", &vrt.vrouter_name, MAX_LEN_VNODE_NAME, op)?;
        check_name("if_name", &ff.if_key.if_name, MAX_LEN_INTERFACE_NAME, op)?;
        check_direction(ff.direction, op)?;
        if k.sequence_num == 0 && !op.is_read() {
            return Err(UpllError::syntax("sequence_num must be at least 1"));
        }
        Ok(())
    }

    fn validate_val(&self, ikey: &ConfigKeyVal, op: Operation) -> UpllResult<()> {
        match ikey.val() {
            None => Ok(()),
            Some(ConfigVal::FlowFilterEntry(v)) => check_entry(v, op),
            Some(_) => Err(wrong_val(KeyType::VrtIfFlowFilterEntry)),
        }
    }

    /// A named flow list must exist in the same plane.
    fn validate_attribute(
        &self,
        _engine: &MoMgrImpl,
        store: &dyn ConfigStore,
        ikey: &ConfigKeyVal,
        dt: DataType,
    ) -> UpllResult<()> {
        let Some(name) = flowlist_of(ikey) else {
            return Ok(());
        };
        let pattern = ConfigKeyVal::new(KeyFlowList::new(name));
        if store.record_exists(&pattern, dt, &MatchOpts::none(), TableRole::Main)? {
            Ok(())
        } else {
            Err(UpllError::semantic(format!("flow list {} does not exist", name)))
        }
    }

    fn alloc_val(&self, table: TableRole) -> Option<ConfigVal> {
        match table {
            TableRole::Main => Some(ConfigVal::FlowFilterEntry(ValFlowFilterEntry::default())),
            _ => None,
        }
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

    fn read_detail_eligible(&self, ckv: &ConfigKeyVal) -> bool {
        ckv.flags().interface_configured()
    }

    /// Only the counters of the answer are kept.
    fn construct_read_detail_response(
        &self,
        ckv: &mut ConfigKeyVal,
        response: Option<ConfigKeyVal>,
        _ctrlr: &str,
        _domain: &str,
    ) -> UpllResult<()> {
        let stats = response
            .into_iter()
            .flat_map(|resp| resp.vals)
            .filter(|v| matches!(v, ConfigVal::FlowFilterEntryStats(_)));
        ckv.vals.extend(stats);
        Ok(())
    }

    fn update_references(
        &self,
        engine: &MoMgrImpl,
        store: &mut dyn ConfigStore,
        dt: DataType,
        _op: Operation,
        new: Option<&ConfigKeyVal>,
        old: Option<&ConfigKeyVal>,
    ) -> UpllResult<()> {
        let before = old.and_then(flowlist_of);
        let after = new.and_then(flowlist_of);
        if before == after {
            return Ok(());
        }
        if let Some(name) = before {
            engine.adjust_flowlist_ref(store, dt, name, -1)?;
        }
        if let Some(name) = after {
            engine.adjust_flowlist_ref(store, dt, name, 1)?;
        }
        Ok(())
    }
}
