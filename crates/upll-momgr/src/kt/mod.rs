//! Built-in key-type managers.
//!
//! Each manager is a unit struct implementing [`MoMgr`]; only the hooks that
//! differ from the generic behaviour are overridden.

mod flowlist;
mod vrt;
mod vrt_if;
mod vrt_if_flowfilter;
mod vrt_if_flowfilter_entry;
mod vtn;
mod vtn_flowfilter;
mod vtn_policingmap;

pub use flowlist::FlowListMoMgr;
pub use vrt::VrtMoMgr;
pub use vrt_if::VrtIfMoMgr;
pub use vrt_if_flowfilter::VrtIfFlowFilterMoMgr;
pub use vrt_if_flowfilter_entry::VrtIfFlowFilterEntryMoMgr;
pub use vtn::VtnMoMgr;
pub use vtn_flowfilter::VtnFlowFilterMoMgr;
pub use vtn_policingmap::VtnPolicingMapMoMgr;

use crate::momgr::{MoMgr, MoMgrRegistry};
use crate::{UpllError, UpllResult};
use std::sync::Arc;
use upll_types::{
    validate_description, validate_name, Attr, ConfigKey, ConfigKeyVal, FlowDirection, KeyType,
    KeyVrt, KeyVrtIf, KeyVrtIfFlowFilter, KeyVrtIfFlowFilterEntry, Operation,
};

/// Registry with every built-in key type.
pub fn default_registry() -> MoMgrRegistry {
    let managers: [Arc<dyn MoMgr>; 8] = [
        Arc::new(VtnMoMgr),
        Arc::new(FlowListMoMgr),
        Arc::new(VrtMoMgr),
        Arc::new(VrtIfMoMgr),
        Arc::new(VtnFlowFilterMoMgr),
        Arc::new(VtnPolicingMapMoMgr),
        Arc::new(VrtIfFlowFilterMoMgr),
        Arc::new(VrtIfFlowFilterEntryMoMgr),
    ];
    managers.into_iter().map(|m| (m.key_type(), m)).collect()
}

/// Checks a name column. Reads may leave it empty to enumerate.
fn check_name(field: &'static str, value: &str, max_len: usize, op: Operation) -> UpllResult<()> {
    if value.is_empty() && op.is_read() {
        return Ok(());
    }
    Ok(validate_name(field, value, max_len)?)
}

/// Checks a direction column. Reads may carry the sentinel.
fn check_direction(raw: u8, op: Operation) -> UpllResult<()> {
    Ok(FlowDirection::validate(raw, op.is_read())?)
}

fn check_optional_name(field: &'static str, attr: &Attr<String>, max_len: usize) -> UpllResult<()> {
    if let Some(value) = attr.value() {
        validate_name(field, value, max_len)?;
    }
    Ok(())
}

fn check_description(attr: &Attr<String>) -> UpllResult<()> {
    if let Some(value) = attr.value() {
        validate_description("description", value)?;
    }
    Ok(())
}

fn wrong_key(kt: KeyType, key: &ConfigKey) -> UpllError {
    UpllError::bad_request(format!("{} key given to {} manager", key.key_type(), kt))
}

fn wrong_val(kt: KeyType) -> UpllError {
    UpllError::bad_request(format!("value shape does not match {}", kt))
}

/// Builds a key of `kt` from `parent` with `derive`, or an all-wildcard key
/// without a parent.
fn child_key<K>(
    kt: KeyType,
    parent: Option<&ConfigKeyVal>,
    derive: impl Fn(&ConfigKey) -> Option<K>,
) -> UpllResult<ConfigKeyVal>
where
    K: Into<ConfigKey>,
{
    let Some(parent) = parent else {
        return Ok(ConfigKeyVal::new(ConfigKey::empty(kt)));
    };
    derive(&parent.key).map(ConfigKeyVal::new).ok_or_else(|| {
        UpllError::generic(format!(
            "cannot derive a {} key from {}",
            kt,
            parent.key_type()
        ))
    })
}

fn vrt_key_from(key: &ConfigKey) -> Option<KeyVrt> {
    match key {
        ConfigKey::Vtn(k) => Some(KeyVrt {
            vtn_key: k.clone(),
            ..KeyVrt::default()
        }),
        ConfigKey::Vrt(k) => Some(k.clone()),
        _ => None,
    }
}

fn vrt_if_key_from(key: &ConfigKey) -> Option<KeyVrtIf> {
    match key {
        ConfigKey::VrtIf(k) => Some(k.clone()),
        other => vrt_key_from(other).map(|vrt_key| KeyVrtIf {
            vrt_key,
            ..KeyVrtIf::default()
        }),
    }
}

fn vrt_if_flowfilter_key_from(key: &ConfigKey) -> Option<KeyVrtIfFlowFilter> {
    match key {
        ConfigKey::VrtIfFlowFilter(k) => Some(k.clone()),
        other => vrt_if_key_from(other).map(|if_key| KeyVrtIfFlowFilter {
            if_key,
            ..KeyVrtIfFlowFilter::default()
        }),
    }
}

fn vrt_if_flowfilter_entry_key_from(key: &ConfigKey) -> Option<KeyVrtIfFlowFilterEntry> {
    match key {
        ConfigKey::VrtIfFlowFilterEntry(k) => Some(k.clone()),
        other => vrt_if_flowfilter_key_from(other).map(|flowfilter_key| KeyVrtIfFlowFilterEntry {
            flowfilter_key,
            ..KeyVrtIfFlowFilterEntry::default()
        }),
    }
}
