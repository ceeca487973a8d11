//! Key-type tags and table roles.

use crate::ParseError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identifies the schema a [`crate::ConfigKey`] conforms to.
///
/// The declaration order is parent-first: iterating [`KeyType::ALL`] visits a
/// key type only after every key type it depends on. Import merge and
/// startup loading rely on this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum KeyType {
    /// Virtual tenant network.
    Vtn,
    /// Flow list referenced by flow-filter entries.
    FlowList,
    /// Virtual router inside a VTN.
    Vrt,
    /// Interface of a virtual router.
    VrtIf,
    /// VTN-scoped flow filter, fanned out to every controller the VTN spans.
    VtnFlowFilter,
    /// VTN-scoped policing map.
    VtnPolicingMap,
    /// Flow filter bound to a vrouter interface.
    VrtIfFlowFilter,
    /// Entry of a vrouter interface flow filter.
    VrtIfFlowFilterEntry,
}

impl KeyType {
    /// Every key type, parent-first.
    pub const ALL: [KeyType; 8] = [
        KeyType::Vtn,
        KeyType::FlowList,
        KeyType::Vrt,
        KeyType::VrtIf,
        KeyType::VtnFlowFilter,
        KeyType::VtnPolicingMap,
        KeyType::VrtIfFlowFilter,
        KeyType::VrtIfFlowFilterEntry,
    ];

    /// Returns the wire name of the key type.
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyType::Vtn => "VTN",
            KeyType::FlowList => "FLOWLIST",
            KeyType::Vrt => "VROUTER",
            KeyType::VrtIf => "VRT_IF",
            KeyType::VtnFlowFilter => "VTN_FLOWFILTER",
            KeyType::VtnPolicingMap => "VTN_POLICINGMAP",
            KeyType::VrtIfFlowFilter => "VRTIF_FLOWFILTER",
            KeyType::VrtIfFlowFilterEntry => "VRTIF_FLOWFILTER_ENTRY",
        }
    }
}

impl fmt::Display for KeyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for KeyType {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        KeyType::ALL
            .iter()
            .copied()
            .find(|kt| kt.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| ParseError::InvalidKeyType(s.to_string()))
    }
}

/// The table a record of a key type is stored in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TableRole {
    /// The authoritative business record.
    Main,
    /// One row per (key, controller, domain).
    Ctrlr,
    /// UNC name to controller name mapping.
    Rename,
    /// Format conversion table. No key type registered here uses it.
    Convert,
}

impl TableRole {
    /// Returns true if rows of this table are identified by controller and
    /// domain in addition to their key.
    pub fn is_per_controller(&self) -> bool {
        matches!(self, TableRole::Ctrlr | TableRole::Rename)
    }
}

impl fmt::Display for TableRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TableRole::Main => "MAINTBL",
            TableRole::Ctrlr => "CTRLRTBL",
            TableRole::Rename => "RENAMETBL",
            TableRole::Convert => "CONVERTTBL",
        };
        f.write_str(s)
    }
}
