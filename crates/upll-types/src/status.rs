//! Configuration status and attribute validity.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Whether a record's configuration has been confirmed on its controller(s).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfigStatus {
    Applied,
    NotApplied,
    PartiallyApplied,
    Invalid,
    NotSupported,
    #[default]
    Unknown,
}

impl fmt::Display for ConfigStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConfigStatus::Applied => "APPLIED",
            ConfigStatus::NotApplied => "NOT_APPLIED",
            ConfigStatus::PartiallyApplied => "PARTIALLY_APPLIED",
            ConfigStatus::Invalid => "INVALID",
            ConfigStatus::NotSupported => "NOT_SUPPORTED",
            ConfigStatus::Unknown => "UNKNOWN",
        };
        f.write_str(s)
    }
}

/// Validity of one attribute, as carried in capability checks and driver
/// payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidFlag {
    Invalid,
    Valid,
    ValidNoValue,
}

/// An attribute value together with its validity.
///
/// `ValidNoValue` means the attribute was sent on purpose without a value
/// (clear it); `Invalid` means it was not sent at all.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Attr<T> {
    #[default]
    Invalid,
    ValidNoValue,
    Valid(T),
}

impl<T> Attr<T> {
    /// Returns the value if the attribute is valid.
    pub fn value(&self) -> Option<&T> {
        match self {
            Attr::Valid(v) => Some(v),
            _ => None,
        }
    }

    /// Returns true if the attribute carries a value.
    pub fn is_valid(&self) -> bool {
        matches!(self, Attr::Valid(_))
    }

    /// Returns true if the attribute was sent (with or without a value).
    pub fn is_present(&self) -> bool {
        !matches!(self, Attr::Invalid)
    }

    /// Returns the validity flag of this attribute.
    pub fn flag(&self) -> ValidFlag {
        match self {
            Attr::Invalid => ValidFlag::Invalid,
            Attr::ValidNoValue => ValidFlag::ValidNoValue,
            Attr::Valid(_) => ValidFlag::Valid,
        }
    }

    /// Applies an update: a valid value replaces, `ValidNoValue` clears and
    /// `Invalid` leaves the current value untouched.
    pub fn merge_from(&mut self, update: &Attr<T>)
    where
        T: Clone,
    {
        match update {
            Attr::Valid(v) => *self = Attr::Valid(v.clone()),
            Attr::ValidNoValue => *self = Attr::Invalid,
            Attr::Invalid => {}
        }
    }
}

impl<T> From<T> for Attr<T> {
    fn from(value: T) -> Self {
        Attr::Valid(value)
    }
}
