//! Common UPLL types for the VTN coordinator's managed-object layer.
//!
//! This crate provides the vocabulary shared by the configuration store and
//! the managed-object managers:
//!
//! - [`KeyType`] / [`TableRole`]: which schema a record conforms to and which
//!   table (main, per-controller, rename) it lives in
//! - [`DataType`]: the configuration planes (CANDIDATE, RUNNING, ...)
//! - [`ConfigStatus`] / [`Attr`]: per-record and per-attribute status and
//!   three-state attribute validity
//! - [`RecordFlags`]: rename and vlink/portmap lineage of a record
//! - [`ConfigKey`] / [`ConfigVal`]: typed key and value structs
//! - [`ConfigKeyVal`]: the key + value chain + user data unit of work
//! - [`MacAddress`]: 48-bit MAC used by flow-filter modify actions

mod ckv;
mod flags;
mod key;
mod keytype;
mod mac;
mod name;
mod plane;
mod status;
mod val;

pub use ckv::{ConfigKeyVal, RecordStatus, UserData};
pub use flags::RecordFlags;
pub use key::{
    ConfigKey, FlowDirection, KeyColumn, KeyFlowList, KeyVrt, KeyVrtIf, KeyVrtIfFlowFilter,
    KeyVrtIfFlowFilterEntry, KeyVtn, KeyVtnFlowFilter, KeyVtnPolicingMap, RenameComponent,
    DIRECTION_SENTINEL,
};
pub use keytype::{KeyType, TableRole};
pub use mac::MacAddress;
pub use name::{
    validate_description, validate_name, MAX_LEN_CTRLR_ID, MAX_LEN_DESCRIPTION, MAX_LEN_DOMAIN_ID,
    MAX_LEN_FLOWLIST_NAME, MAX_LEN_INTERFACE_NAME, MAX_LEN_POLICER_NAME, MAX_LEN_VNODE_NAME,
    MAX_LEN_VTN_NAME,
};
pub use plane::{DataType, Operation, Option1, Option2, UpdateCtrlrPhase};
pub use status::{Attr, ConfigStatus, ValidFlag};
pub use val::{
    ConfigVal, FlowFilterAction, FlowListIpType, InterfaceType, ValDriverVrtIf, ValFlowFilterEntry,
    ValFlowFilterEntryStats, ValFlowList, ValPolicingMap, ValRename, ValVrt, ValVrtIf, ValVtn,
    ValVtnCtrlrSpan, ValVtnFlowFilterCtrlrStats,
};

/// Common error type for parsing failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("invalid MAC address format: {0}")]
    InvalidMacAddress(String),

    #[error("invalid key type: {0}")]
    InvalidKeyType(String),

    #[error("invalid datatype: {0}")]
    InvalidDataType(String),

    #[error("invalid {field}: '{value}' ({reason})")]
    InvalidName {
        field: &'static str,
        value: String,
        reason: &'static str,
    },

    #[error("invalid flow direction: {0}")]
    InvalidDirection(u8),
}
