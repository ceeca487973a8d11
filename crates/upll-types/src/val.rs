//! Typed value structs.

use crate::{Attr, MacAddress, ValidFlag};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ValVtn {
    #[serde(default)]
    pub description: Attr<String>,
}

/// Reference-counted span of a VTN onto one (controller, domain) pair.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ValVtnCtrlrSpan {
    pub ref_count: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ValVrt {
    #[serde(default)]
    pub controller_id: Attr<String>,
    #[serde(default)]
    pub domain_id: Attr<String>,
    #[serde(default)]
    pub description: Attr<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ValVrtIf {
    #[serde(default)]
    pub description: Attr<String>,
    #[serde(default)]
    pub admin_status: Attr<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlowListIpType {
    Ip,
    Ipv6,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ValFlowList {
    #[serde(default)]
    pub ip_type: Attr<FlowListIpType>,
    /// Number of flow-filter entries naming this flow list in the same plane.
    #[serde(default)]
    pub ref_count: u32,
}

/// Controller-visible names of a renamed object.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ValRename {
    #[serde(default)]
    pub vtn_name: Attr<String>,
    #[serde(default)]
    pub vnode_name: Attr<String>,
    #[serde(default)]
    pub flowlist_name: Attr<String>,
}

impl ValRename {
    /// Returns true if every valid attribute of `pattern` equals ours.
    pub fn matches(&self, pattern: &ValRename) -> bool {
        fn attr_matches(ours: &Attr<String>, pattern: &Attr<String>) -> bool {
            match pattern {
                Attr::Valid(v) => ours.value() == Some(v),
                _ => true,
            }
        }
        attr_matches(&self.vtn_name, &pattern.vtn_name)
            && attr_matches(&self.vnode_name, &pattern.vnode_name)
            && attr_matches(&self.flowlist_name, &pattern.flowlist_name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlowFilterAction {
    Pass,
    Drop,
    Redirect,
}

/// Flow-filter entry attributes.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ValFlowFilterEntry {
    #[serde(default)]
    pub flowlist_name: Attr<String>,
    #[serde(default)]
    pub action: Attr<FlowFilterAction>,
    #[serde(default)]
    pub redirect_node: Attr<String>,
    #[serde(default)]
    pub redirect_port: Attr<String>,
    #[serde(default)]
    pub modify_dst_mac: Attr<MacAddress>,
    #[serde(default)]
    pub modify_src_mac: Attr<MacAddress>,
    #[serde(default)]
    pub nwm_name: Attr<String>,
    #[serde(default)]
    pub dscp: Attr<u8>,
    #[serde(default)]
    pub priority: Attr<u8>,
}

impl ValFlowFilterEntry {
    pub const ATTR_COUNT: usize = 9;

    /// Validity of each attribute in declaration order.
    pub fn valid_flags(&self) -> Vec<ValidFlag> {
        vec![
            self.flowlist_name.flag(),
            self.action.flag(),
            self.redirect_node.flag(),
            self.redirect_port.flag(),
            self.modify_dst_mac.flag(),
            self.modify_src_mac.flag(),
            self.nwm_name.flag(),
            self.dscp.flag(),
            self.priority.flag(),
        ]
    }

    fn merge_from(&mut self, update: &ValFlowFilterEntry) {
        self.flowlist_name.merge_from(&update.flowlist_name);
        self.action.merge_from(&update.action);
        self.redirect_node.merge_from(&update.redirect_node);
        self.redirect_port.merge_from(&update.redirect_port);
        self.modify_dst_mac.merge_from(&update.modify_dst_mac);
        self.modify_src_mac.merge_from(&update.modify_src_mac);
        self.nwm_name.merge_from(&update.nwm_name);
        self.dscp.merge_from(&update.dscp);
        self.priority.merge_from(&update.priority);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ValPolicingMap {
    #[serde(default)]
    pub policer_name: Attr<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InterfaceType {
    Vlink,
    Portmap,
}

/// Southbound adapter value telling the driver what backs the interface a
/// flow filter is bound to.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ValDriverVrtIf {
    #[serde(default)]
    pub interface_type: Attr<InterfaceType>,
}

/// Per-entry counters returned by a detail read.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ValFlowFilterEntryStats {
    pub software_packets: u64,
    pub software_octets: u64,
    pub hardware_packets: u64,
    pub hardware_octets: u64,
}

/// Per-controller counters of a VTN flow filter returned by a detail read.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ValVtnFlowFilterCtrlrStats {
    pub ctrlr_id: String,
    pub domain_id: String,
    pub packets: u64,
    pub octets: u64,
}

/// A value of any registered shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "val", rename_all = "snake_case")]
pub enum ConfigVal {
    Vtn(ValVtn),
    VtnCtrlrSpan(ValVtnCtrlrSpan),
    Vrt(ValVrt),
    VrtIf(ValVrtIf),
    FlowList(ValFlowList),
    Rename(ValRename),
    FlowFilterEntry(ValFlowFilterEntry),
    PolicingMap(ValPolicingMap),
    DriverVrtIf(ValDriverVrtIf),
    FlowFilterEntryStats(ValFlowFilterEntryStats),
    VtnFlowFilterCtrlrStats(ValVtnFlowFilterCtrlrStats),
}

impl ConfigVal {
    /// Returns true if `pattern`, used as a value filter, selects `self`.
    ///
    /// Rename values match on the pattern's valid attributes only, so a pattern
    /// carrying just a controller-side VTN name finds the row that maps it.
    pub fn matches(&self, pattern: &ConfigVal) -> bool {
        match (self, pattern) {
            (ConfigVal::Rename(ours), ConfigVal::Rename(p)) => ours.matches(p),
            (ours, p) => ours == p,
        }
    }

    /// Validity of each configurable attribute, in declaration order.
    pub fn valid_flags(&self) -> Vec<ValidFlag> {
        match self {
            ConfigVal::Vtn(v) => vec![v.description.flag()],
            ConfigVal::Vrt(v) => vec![
                v.controller_id.flag(),
                v.domain_id.flag(),
                v.description.flag(),
            ],
            ConfigVal::VrtIf(v) => vec![v.description.flag(), v.admin_status.flag()],
            ConfigVal::FlowList(v) => vec![v.ip_type.flag()],
            ConfigVal::Rename(v) => vec![
                v.vtn_name.flag(),
                v.vnode_name.flag(),
                v.flowlist_name.flag(),
            ],
            ConfigVal::FlowFilterEntry(v) => v.valid_flags(),
            ConfigVal::PolicingMap(v) => vec![v.policer_name.flag()],
            ConfigVal::DriverVrtIf(v) => vec![v.interface_type.flag()],
            ConfigVal::VtnCtrlrSpan(_)
            | ConfigVal::FlowFilterEntryStats(_)
            | ConfigVal::VtnFlowFilterCtrlrStats(_) => Vec::new(),
        }
    }

    /// Applies an update value of the same shape. Returns false if the
    /// shapes differ, leaving `self` untouched.
    pub fn merge_from(&mut self, update: &ConfigVal) -> bool {
        match (self, update) {
            (ConfigVal::Vtn(ours), ConfigVal::Vtn(u)) => {
                ours.description.merge_from(&u.description);
            }
            (ConfigVal::Vrt(ours), ConfigVal::Vrt(u)) => {
                ours.controller_id.merge_from(&u.controller_id);
                ours.domain_id.merge_from(&u.domain_id);
                ours.description.merge_from(&u.description);
            }
            (ConfigVal::VrtIf(ours), ConfigVal::VrtIf(u)) => {
                ours.description.merge_from(&u.description);
                ours.admin_status.merge_from(&u.admin_status);
            }
            (ConfigVal::FlowList(ours), ConfigVal::FlowList(u)) => {
                ours.ip_type.merge_from(&u.ip_type);
            }
            (ConfigVal::FlowFilterEntry(ours), ConfigVal::FlowFilterEntry(u)) => {
                ours.merge_from(u);
            }
            (ConfigVal::PolicingMap(ours), ConfigVal::PolicingMap(u)) => {
                ours.policer_name.merge_from(&u.policer_name);
            }
            (ours, u) if std::mem::discriminant(&*ours) == std::mem::discriminant(u) => {
                *ours = u.clone();
            }
            _ => return false,
        }
        true
    }
}
