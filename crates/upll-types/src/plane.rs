//! Configuration planes, operations and request options.

use crate::ParseError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A configuration plane (datatype).
///
/// Each plane is an independent snapshot of the same schema. STATE reads are
/// served from the RUNNING tables; see [`DataType::storage_plane`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    Candidate,
    Running,
    Startup,
    State,
    Import,
    Audit,
}

impl DataType {
    /// Returns the plane whose tables back this datatype.
    pub fn storage_plane(&self) -> DataType {
        match self {
            DataType::State => DataType::Running,
            other => *other,
        }
    }

    /// Returns the plane name.
    pub fn as_str(&self) -> &'static str {
        match self {
            DataType::Candidate => "CANDIDATE",
            DataType::Running => "RUNNING",
            DataType::Startup => "STARTUP",
            DataType::State => "STATE",
            DataType::Import => "IMPORT",
            DataType::Audit => "AUDIT",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DataType {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [
            DataType::Candidate,
            DataType::Running,
            DataType::Startup,
            DataType::State,
            DataType::Import,
            DataType::Audit,
        ]
        .into_iter()
        .find(|dt| dt.as_str().eq_ignore_ascii_case(s))
        .ok_or_else(|| ParseError::InvalidDataType(s.to_string()))
    }
}

/// A northbound or southbound operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Create,
    Update,
    Delete,
    Read,
    ReadSibling,
    ReadSiblingBegin,
    ReadSiblingCount,
    Rename,
}

impl Operation {
    /// Returns true for the read family.
    pub fn is_read(&self) -> bool {
        matches!(
            self,
            Operation::Read
                | Operation::ReadSibling
                | Operation::ReadSiblingBegin
                | Operation::ReadSiblingCount
        )
    }

    /// Returns true for the sibling-read family.
    pub fn is_sibling_read(&self) -> bool {
        matches!(
            self,
            Operation::ReadSibling | Operation::ReadSiblingBegin | Operation::ReadSiblingCount
        )
    }

    /// Returns true for operations that mutate a plane.
    pub fn is_write(&self) -> bool {
        matches!(
            self,
            Operation::Create | Operation::Update | Operation::Delete | Operation::Rename
        )
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Operation::Create => "CREATE",
            Operation::Update => "UPDATE",
            Operation::Delete => "DELETE",
            Operation::Read => "READ",
            Operation::ReadSibling => "READ_SIBLING",
            Operation::ReadSiblingBegin => "READ_SIBLING_BEGIN",
            Operation::ReadSiblingCount => "READ_SIBLING_COUNT",
            Operation::Rename => "RENAME",
        };
        f.write_str(s)
    }
}

/// First request option.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Option1 {
    #[default]
    Normal,
    /// Live controller query; only meaningful on the STATE datatype.
    Detail,
    Count,
}

/// Second request option.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Option2 {
    #[default]
    None,
    Neighbor,
    L2Domain,
}

/// Phase of an audit pass.
///
/// Kept distinct from [`Operation`]: an audit phase names the direction of
/// the RUNNING vs AUDIT difference, not a northbound request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateCtrlrPhase {
    Create,
    Update,
    Delete,
}

impl UpdateCtrlrPhase {
    /// The operation a record found in this phase is pushed with.
    pub fn operation(&self) -> Operation {
        match self {
            UpdateCtrlrPhase::Create => Operation::Create,
            UpdateCtrlrPhase::Update => Operation::Update,
            UpdateCtrlrPhase::Delete => Operation::Delete,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_reads_come_from_running() {
        assert_eq!(DataType::State.storage_plane(), DataType::Running);
        assert_eq!(DataType::Candidate.storage_plane(), DataType::Candidate);
        assert_eq!(DataType::Audit.storage_plane(), DataType::Audit);
    }

    #[test]
    fn test_datatype_parse() {
        assert_eq!("running".parse::<DataType>().unwrap(), DataType::Running);
        assert!("scratch".parse::<DataType>().is_err());
    }

    #[test]
    fn test_operation_families() {
        assert!(Operation::ReadSiblingCount.is_read());
        assert!(Operation::ReadSiblingCount.is_sibling_read());
        assert!(!Operation::Read.is_sibling_read());
        assert!(Operation::Rename.is_write());
        assert!(!Operation::Read.is_write());
    }
}
