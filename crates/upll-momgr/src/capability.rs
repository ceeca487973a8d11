//! Per-controller capability index.
//!
//! A controller declares, per key type, which attributes it accepts on
//! create, read and state queries, and how many instances it can hold. The
//! engine consults the index before any store mutation on create and before
//! any driver request on a detail read.

use crate::{UpllError, UpllResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use upll_types::{KeyType, ValidFlag};

/// One capability record.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CapabilityEntry {
    /// Instance limit on the controller. Zero means unlimited.
    #[serde(default)]
    pub max_instance_count: u32,
    /// Supported flag per attribute, in value declaration order.
    #[serde(default)]
    pub attrs: Vec<bool>,
}

impl CapabilityEntry {
    /// An entry supporting the first `attr_count` attributes with no limit.
    pub fn supporting(attr_count: usize) -> Self {
        Self {
            max_instance_count: 0,
            attrs: vec![true; attr_count],
        }
    }

    pub fn with_max_instances(mut self, max: u32) -> Self {
        self.max_instance_count = max;
        self
    }

    /// Marks one attribute unsupported.
    pub fn without_attr(mut self, index: usize) -> Self {
        if let Some(slot) = self.attrs.get_mut(index) {
            *slot = false;
        }
        self
    }

    fn supports(&self, index: usize) -> bool {
        self.attrs.get(index).copied().unwrap_or(false)
    }
}

/// Lookup into a controller capability index.
pub trait CapabilityIndex: Send + Sync {
    fn get_create_capability(&self, ctrlr: &str, kt: KeyType) -> Option<CapabilityEntry>;
    fn get_read_capability(&self, ctrlr: &str, kt: KeyType) -> Option<CapabilityEntry>;
    fn get_state_capability(&self, ctrlr: &str, kt: KeyType) -> Option<CapabilityEntry>;
}

/// Capabilities of one key type on one controller.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct KtCapability {
    #[serde(default)]
    pub create: Option<CapabilityEntry>,
    #[serde(default)]
    pub read: Option<CapabilityEntry>,
    #[serde(default)]
    pub state: Option<CapabilityEntry>,
}

/// Capability index held in memory, loadable from the engine config file.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StaticCapabilityTable {
    controllers: BTreeMap<String, BTreeMap<KeyType, KtCapability>>,
}

/// Attribute slots granted by [`StaticCapabilityTable::allow`].
const ALLOW_ALL_ATTRS: usize = 16;

impl StaticCapabilityTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Grants create, read and state support for every attribute of `kt`.
    pub fn allow(mut self, ctrlr: impl Into<String>, kt: KeyType) -> Self {
        let entry = CapabilityEntry::supporting(ALLOW_ALL_ATTRS);
        self.controllers.entry(ctrlr.into()).or_default().insert(
            kt,
            KtCapability {
                create: Some(entry.clone()),
                read: Some(entry.clone()),
                state: Some(entry),
            },
        );
        self
    }

    /// Sets the full capability record of `kt` on `ctrlr`.
    pub fn set(mut self, ctrlr: impl Into<String>, kt: KeyType, cap: KtCapability) -> Self {
        self.controllers
            .entry(ctrlr.into())
            .or_default()
            .insert(kt, cap);
        self
    }

    pub fn controllers(&self) -> impl Iterator<Item = &str> {
        self.controllers.keys().map(String::as_str)
    }

    fn kt(&self, ctrlr: &str, kt: KeyType) -> Option<&KtCapability> {
        self.controllers.get(ctrlr).and_then(|m| m.get(&kt))
    }
}

impl CapabilityIndex for StaticCapabilityTable {
    fn get_create_capability(&self, ctrlr: &str, kt: KeyType) -> Option<CapabilityEntry> {
        self.kt(ctrlr, kt).and_then(|c| c.create.clone())
    }

    fn get_read_capability(&self, ctrlr: &str, kt: KeyType) -> Option<CapabilityEntry> {
        self.kt(ctrlr, kt).and_then(|c| c.read.clone())
    }

    fn get_state_capability(&self, ctrlr: &str, kt: KeyType) -> Option<CapabilityEntry> {
        self.kt(ctrlr, kt).and_then(|c| c.state.clone())
    }
}

/// Checks that every attribute sent (valid or valid-no-value) is supported.
pub fn check_attributes(
    ctrlr: &str,
    kt: KeyType,
    entry: &CapabilityEntry,
    flags: &[ValidFlag],
) -> UpllResult<()> {
    for (index, flag) in flags.iter().enumerate() {
        if *flag != ValidFlag::Invalid && !entry.supports(index) {
            return Err(UpllError::not_supported(
                ctrlr,
                format!("{} attribute {} not supported", kt, index),
            ));
        }
    }
    Ok(())
}

/// Checks the instance limit of a create entry against the current count.
pub fn check_instance_count(
    ctrlr: &str,
    entry: &CapabilityEntry,
    current: u32,
) -> UpllResult<()> {
    if entry.max_instance_count != 0 && current >= entry.max_instance_count {
        return Err(UpllError::ExceedsResourceLimit(ctrlr.to_string()));
    }
    Ok(())
}
