//! The key + values + user-data record exchanged between layers.

use crate::{
    ConfigKey, ConfigStatus, ConfigVal, KeyType, RecordFlags, ValFlowFilterEntry, ValRename,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Out-of-band per-record metadata.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UserData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ctrlr_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain_id: Option<String>,
    #[serde(default)]
    pub flags: RecordFlags,
}

/// Config status of a stored row and of each of its attributes.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RecordStatus {
    #[serde(default)]
    pub row: ConfigStatus,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attrs: Vec<ConfigStatus>,
}

/// One configuration record.
///
/// A record with a key and no values is valid for existence checks and
/// deletes. Batches of sibling records are plain `Vec<ConfigKeyVal>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigKeyVal {
    pub key: ConfigKey,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub vals: Vec<ConfigVal>,
    #[serde(default)]
    pub user_data: UserData,
    #[serde(default)]
    pub status: RecordStatus,
}

impl ConfigKeyVal {
    /// Creates a key-only record.
    pub fn new(key: impl Into<ConfigKey>) -> Self {
        Self {
            key: key.into(),
            vals: Vec::new(),
            user_data: UserData::default(),
            status: RecordStatus::default(),
        }
    }

    /// Creates a record with one value.
    pub fn with_val(key: impl Into<ConfigKey>, val: ConfigVal) -> Self {
        let mut ckv = Self::new(key);
        ckv.vals.push(val);
        ckv
    }

    /// Sets the controller and domain, builder style.
    pub fn on_ctrlr(mut self, ctrlr_id: impl Into<String>, domain_id: impl Into<String>) -> Self {
        self.user_data.ctrlr_id = Some(ctrlr_id.into());
        self.user_data.domain_id = Some(domain_id.into());
        self
    }

    pub fn key_type(&self) -> KeyType {
        self.key.key_type()
    }

    pub fn ctrlr_id(&self) -> Option<&str> {
        self.user_data.ctrlr_id.as_deref()
    }

    pub fn domain_id(&self) -> Option<&str> {
        self.user_data.domain_id.as_deref()
    }

    pub fn flags(&self) -> RecordFlags {
        self.user_data.flags
    }

    /// Returns the primary value, if any.
    pub fn val(&self) -> Option<&ConfigVal> {
        self.vals.first()
    }

    pub fn val_mut(&mut self) -> Option<&mut ConfigVal> {
        self.vals.first_mut()
    }

    /// Returns the flow-filter entry value, wherever it sits in the chain.
    pub fn flow_filter_entry(&self) -> Option<&ValFlowFilterEntry> {
        self.vals.iter().find_map(|v| match v {
            ConfigVal::FlowFilterEntry(e) => Some(e),
            _ => None,
        })
    }

    /// Returns the rename value, wherever it sits in the chain.
    pub fn rename_val(&self) -> Option<&ValRename> {
        self.vals.iter().find_map(|v| match v {
            ConfigVal::Rename(r) => Some(r),
            _ => None,
        })
    }

    /// Returns a key-only copy, keeping controller and domain.
    pub fn key_only(&self) -> Self {
        Self {
            key: self.key.clone(),
            vals: Vec::new(),
            user_data: self.user_data.clone(),
            status: RecordStatus::default(),
        }
    }

    /// Returns true if both records carry the same configuration: key, values
    /// and user data. Status is bookkeeping and is ignored.
    pub fn same_config(&self, other: &ConfigKeyVal) -> bool {
        self.key == other.key && self.vals == other.vals && self.user_data == other.user_data
    }

    /// Clears controller, domain and flags before a record leaves the engine.
    pub fn strip_user_data(&mut self) {
        self.user_data = UserData::default();
    }
}

impl fmt::Display for ConfigKeyVal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key)?;
        if let Some(ctrlr) = self.ctrlr_id() {
            write!(f, "@{}", ctrlr)?;
            if let Some(domain) = self.domain_id() {
                write!(f, "/{}", domain)?;
            }
        }
        Ok(())
    }
}
