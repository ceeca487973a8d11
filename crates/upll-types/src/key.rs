//! Typed key structs.
//!
//! Parent keys are nested by value: an entry key embeds its flow-filter key,
//! which embeds its interface key, and so on up to the VTN. Every key can be
//! flattened into a list of [`KeyColumn`]s, which is what the store matches
//! and orders on.

use crate::{KeyType, ParseError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Direction value meaning "no direction filter bound yet".
///
/// A key carrying this value matches every direction when used as a match pattern,
/// while the column is still filled in on the records read back.
pub const DIRECTION_SENTINEL: u8 = 0xFE;

/// Flow-filter direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum FlowDirection {
    In = 0,
    Out = 1,
}

impl FlowDirection {
    /// Checks a raw direction field. The sentinel is accepted only when
    /// `allow_sentinel` is set (enumeration patterns).
    pub fn validate(raw: u8, allow_sentinel: bool) -> Result<(), ParseError> {
        if raw == DIRECTION_SENTINEL && allow_sentinel {
            return Ok(());
        }
        FlowDirection::try_from(raw).map(|_| ())
    }
}

impl TryFrom<u8> for FlowDirection {
    type Error = ParseError;

    fn try_from(raw: u8) -> Result<Self, Self::Error> {
        match raw {
            0 => Ok(FlowDirection::In),
            1 => Ok(FlowDirection::Out),
            other => Err(ParseError::InvalidDirection(other)),
        }
    }
}

impl From<FlowDirection> for u8 {
    fn from(dir: FlowDirection) -> u8 {
        dir as u8
    }
}

/// One flattened key column.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum KeyColumn {
    Name(String),
    Num(u32),
    Direction(u8),
}

impl KeyColumn {
    /// Returns true if this column must be left out of a match clause.
    pub fn is_wildcard(&self) -> bool {
        match self {
            KeyColumn::Name(n) => n.is_empty(),
            KeyColumn::Num(n) => *n == 0,
            KeyColumn::Direction(d) => *d == DIRECTION_SENTINEL,
        }
    }

    /// Returns true if `self`, used as a match pattern column, selects `stored`.
    pub fn selects(&self, stored: &KeyColumn) -> bool {
        self.is_wildcard() || self == stored
    }
}

impl fmt::Display for KeyColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyColumn::Name(n) if n.is_empty() => f.write_str("*"),
            KeyColumn::Name(n) => f.write_str(n),
            KeyColumn::Num(0) => f.write_str("*"),
            KeyColumn::Num(n) => write!(f, "{}", n),
            KeyColumn::Direction(0) => f.write_str("in"),
            KeyColumn::Direction(1) => f.write_str("out"),
            KeyColumn::Direction(DIRECTION_SENTINEL) => f.write_str("*"),
            KeyColumn::Direction(d) => write!(f, "dir{}", d),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct KeyVtn {
    pub vtn_name: String,
}

impl KeyVtn {
    pub fn new(vtn_name: impl Into<String>) -> Self {
        Self {
            vtn_name: vtn_name.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct KeyFlowList {
    pub flowlist_name: String,
}

impl KeyFlowList {
    pub fn new(flowlist_name: impl Into<String>) -> Self {
        Self {
            flowlist_name: flowlist_name.into(),
        }
    }
}

/// Virtual router key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct KeyVrt {
    pub vtn_key: KeyVtn,
    pub vrouter_name: String,
}

impl KeyVrt {
    pub fn new(vtn_name: impl Into<String>, vrouter_name: impl Into<String>) -> Self {
        Self {
            vtn_key: KeyVtn::new(vtn_name),
            vrouter_name: vrouter_name.into(),
        }
    }
}

/// Virtual router interface key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct KeyVrtIf {
    pub vrt_key: KeyVrt,
    pub if_name: String,
}

impl KeyVrtIf {
    pub fn new(
        vtn_name: impl Into<String>,
        vrouter_name: impl Into<String>,
        if_name: impl Into<String>,
    ) -> Self {
        Self {
            vrt_key: KeyVrt::new(vtn_name, vrouter_name),
            if_name: if_name.into(),
        }
    }
}

/// VTN flow-filter key. `input_direction` may hold [`DIRECTION_SENTINEL`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KeyVtnFlowFilter {
    pub vtn_key: KeyVtn,
    pub input_direction: u8,
}

impl KeyVtnFlowFilter {
    pub fn new(vtn_name: impl Into<String>, input_direction: u8) -> Self {
        Self {
            vtn_key: KeyVtn::new(vtn_name),
            input_direction,
        }
    }
}

impl Default for KeyVtnFlowFilter {
    fn default() -> Self {
        Self {
            vtn_key: KeyVtn::default(),
            input_direction: DIRECTION_SENTINEL,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct KeyVtnPolicingMap {
    pub vtn_key: KeyVtn,
}

impl KeyVtnPolicingMap {
    pub fn new(vtn_name: impl Into<String>) -> Self {
        Self {
            vtn_key: KeyVtn::new(vtn_name),
        }
    }
}

/// Flow filter bound to a vrouter interface.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KeyVrtIfFlowFilter {
    pub if_key: KeyVrtIf,
    pub direction: u8,
}

impl KeyVrtIfFlowFilter {
    pub fn new(if_key: KeyVrtIf, direction: u8) -> Self {
        Self { if_key, direction }
    }
}

impl Default for KeyVrtIfFlowFilter {
    fn default() -> Self {
        Self {
            if_key: KeyVrtIf::default(),
            direction: DIRECTION_SENTINEL,
        }
    }
}

/// Entry of a vrouter interface flow filter. A zero `sequence_num` is a
/// wildcard.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct KeyVrtIfFlowFilterEntry {
    pub flowfilter_key: KeyVrtIfFlowFilter,
    pub sequence_num: u16,
}

impl KeyVrtIfFlowFilterEntry {
    pub fn new(flowfilter_key: KeyVrtIfFlowFilter, sequence_num: u16) -> Self {
        Self {
            flowfilter_key,
            sequence_num,
        }
    }
}

/// Which name a rename rewrites.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenameComponent {
    Vtn,
    Vnode,
    FlowList,
}

/// A key of any registered key type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "key_type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConfigKey {
    Vtn(KeyVtn),
    FlowList(KeyFlowList),
    Vrt(KeyVrt),
    VrtIf(KeyVrtIf),
    VtnFlowFilter(KeyVtnFlowFilter),
    VtnPolicingMap(KeyVtnPolicingMap),
    VrtIfFlowFilter(KeyVrtIfFlowFilter),
    VrtIfFlowFilterEntry(KeyVrtIfFlowFilterEntry),
}

impl ConfigKey {
    /// An all-wildcard key of the given type, usable as an enumeration pattern.
    pub fn empty(kt: KeyType) -> Self {
        match kt {
            KeyType::Vtn => ConfigKey::Vtn(KeyVtn::default()),
            KeyType::FlowList => ConfigKey::FlowList(KeyFlowList::default()),
            KeyType::Vrt => ConfigKey::Vrt(KeyVrt::default()),
            KeyType::VrtIf => ConfigKey::VrtIf(KeyVrtIf::default()),
            KeyType::VtnFlowFilter => ConfigKey::VtnFlowFilter(KeyVtnFlowFilter::default()),
            KeyType::VtnPolicingMap => ConfigKey::VtnPolicingMap(KeyVtnPolicingMap::default()),
            KeyType::VrtIfFlowFilter => ConfigKey::VrtIfFlowFilter(KeyVrtIfFlowFilter::default()),
            KeyType::VrtIfFlowFilterEntry => {
                ConfigKey::VrtIfFlowFilterEntry(KeyVrtIfFlowFilterEntry::default())
            }
        }
    }

    pub fn key_type(&self) -> KeyType {
        match self {
            ConfigKey::Vtn(_) => KeyType::Vtn,
            ConfigKey::FlowList(_) => KeyType::FlowList,
            ConfigKey::Vrt(_) => KeyType::Vrt,
            ConfigKey::VrtIf(_) => KeyType::VrtIf,
            ConfigKey::VtnFlowFilter(_) => KeyType::VtnFlowFilter,
            ConfigKey::VtnPolicingMap(_) => KeyType::VtnPolicingMap,
            ConfigKey::VrtIfFlowFilter(_) => KeyType::VrtIfFlowFilter,
            ConfigKey::VrtIfFlowFilterEntry(_) => KeyType::VrtIfFlowFilterEntry,
        }
    }

    /// Flattens the key, outermost ancestor first.
    pub fn columns(&self) -> Vec<KeyColumn> {
        fn vtn(k: &KeyVtn) -> Vec<KeyColumn> {
            vec![KeyColumn::Name(k.vtn_name.clone())]
        }
        fn vrt(k: &KeyVrt) -> Vec<KeyColumn> {
            let mut cols = vtn(&k.vtn_key);
            cols.push(KeyColumn::Name(k.vrouter_name.clone()));
            cols
        }
        fn vrt_if(k: &KeyVrtIf) -> Vec<KeyColumn> {
            let mut cols = vrt(&k.vrt_key);
            cols.push(KeyColumn::Name(k.if_name.clone()));
            cols
        }
        fn vrt_if_ff(k: &KeyVrtIfFlowFilter) -> Vec<KeyColumn> {
            let mut cols = vrt_if(&k.if_key);
            cols.push(KeyColumn::Direction(k.direction));
            cols
        }

        match self {
            ConfigKey::Vtn(k) => vtn(k),
            ConfigKey::FlowList(k) => vec![KeyColumn::Name(k.flowlist_name.clone())],
            ConfigKey::Vrt(k) => vrt(k),
            ConfigKey::VrtIf(k) => vrt_if(k),
            ConfigKey::VtnFlowFilter(k) => {
                let mut cols = vtn(&k.vtn_key);
                cols.push(KeyColumn::Direction(k.input_direction));
                cols
            }
            ConfigKey::VtnPolicingMap(k) => vtn(&k.vtn_key),
            ConfigKey::VrtIfFlowFilter(k) => vrt_if_ff(k),
            ConfigKey::VrtIfFlowFilterEntry(k) => {
                let mut cols = vrt_if_ff(&k.flowfilter_key);
                cols.push(KeyColumn::Num(u32::from(k.sequence_num)));
                cols
            }
        }
    }

    /// Returns true if `self`, used as a match pattern, selects the stored key.
    pub fn selects(&self, stored: &ConfigKey) -> bool {
        self.key_type() == stored.key_type()
            && self
                .columns()
                .iter()
                .zip(stored.columns().iter())
                .all(|(p, s)| p.selects(s))
    }

    /// Returns true if no column is a wildcard.
    pub fn is_fully_specified(&self) -> bool {
        self.columns().iter().all(|c| !c.is_wildcard())
    }

    /// Returns the immediate ancestor key, or `None` for root key types.
    pub fn parent(&self) -> Option<ConfigKey> {
        match self {
            ConfigKey::Vtn(_) | ConfigKey::FlowList(_) => None,
            ConfigKey::Vrt(k) => Some(ConfigKey::Vtn(k.vtn_key.clone())),
            ConfigKey::VrtIf(k) => Some(ConfigKey::Vrt(k.vrt_key.clone())),
            ConfigKey::VtnFlowFilter(k) => Some(ConfigKey::Vtn(k.vtn_key.clone())),
            ConfigKey::VtnPolicingMap(k) => Some(ConfigKey::Vtn(k.vtn_key.clone())),
            ConfigKey::VrtIfFlowFilter(k) => Some(ConfigKey::VrtIf(k.if_key.clone())),
            ConfigKey::VrtIfFlowFilterEntry(k) => {
                Some(ConfigKey::VrtIfFlowFilter(k.flowfilter_key.clone()))
            }
        }
    }

    /// Returns the VTN name embedded in the key, if any.
    pub fn vtn_name(&self) -> Option<&str> {
        self.vtn_key().map(|k| k.vtn_name.as_str())
    }

    fn vtn_key(&self) -> Option<&KeyVtn> {
        match self {
            ConfigKey::Vtn(k) => Some(k),
            ConfigKey::FlowList(_) => None,
            ConfigKey::Vrt(k) => Some(&k.vtn_key),
            ConfigKey::VrtIf(k) => Some(&k.vrt_key.vtn_key),
            ConfigKey::VtnFlowFilter(k) => Some(&k.vtn_key),
            ConfigKey::VtnPolicingMap(k) => Some(&k.vtn_key),
            ConfigKey::VrtIfFlowFilter(k) => Some(&k.if_key.vrt_key.vtn_key),
            ConfigKey::VrtIfFlowFilterEntry(k) => Some(&k.flowfilter_key.if_key.vrt_key.vtn_key),
        }
    }

    fn vtn_key_mut(&mut self) -> Option<&mut KeyVtn> {
        match self {
            ConfigKey::Vtn(k) => Some(k),
            ConfigKey::FlowList(_) => None,
            ConfigKey::Vrt(k) => Some(&mut k.vtn_key),
            ConfigKey::VrtIf(k) => Some(&mut k.vrt_key.vtn_key),
            ConfigKey::VtnFlowFilter(k) => Some(&mut k.vtn_key),
            ConfigKey::VtnPolicingMap(k) => Some(&mut k.vtn_key),
            ConfigKey::VrtIfFlowFilter(k) => Some(&mut k.if_key.vrt_key.vtn_key),
            ConfigKey::VrtIfFlowFilterEntry(k) => {
                Some(&mut k.flowfilter_key.if_key.vrt_key.vtn_key)
            }
        }
    }

    /// Returns the vnode (vrouter) name embedded in the key, if any.
    pub fn vnode_name(&self) -> Option<&str> {
        self.vrt_key().map(|k| k.vrouter_name.as_str())
    }

    fn vrt_key(&self) -> Option<&KeyVrt> {
        match self {
            ConfigKey::Vrt(k) => Some(k),
            ConfigKey::VrtIf(k) => Some(&k.vrt_key),
            ConfigKey::VrtIfFlowFilter(k) => Some(&k.if_key.vrt_key),
            ConfigKey::VrtIfFlowFilterEntry(k) => Some(&k.flowfilter_key.if_key.vrt_key),
            _ => None,
        }
    }

    fn vrt_key_mut(&mut self) -> Option<&mut KeyVrt> {
        match self {
            ConfigKey::Vrt(k) => Some(k),
            ConfigKey::VrtIf(k) => Some(&mut k.vrt_key),
            ConfigKey::VrtIfFlowFilter(k) => Some(&mut k.if_key.vrt_key),
            ConfigKey::VrtIfFlowFilterEntry(k) => Some(&mut k.flowfilter_key.if_key.vrt_key),
            _ => None,
        }
    }

    /// Returns the interface key embedded in the key, if any.
    pub fn vrt_if_key(&self) -> Option<&KeyVrtIf> {
        match self {
            ConfigKey::VrtIf(k) => Some(k),
            ConfigKey::VrtIfFlowFilter(k) => Some(&k.if_key),
            ConfigKey::VrtIfFlowFilterEntry(k) => Some(&k.flowfilter_key.if_key),
            _ => None,
        }
    }

    /// Returns the flow-list name of a flow-list key.
    pub fn flowlist_name(&self) -> Option<&str> {
        match self {
            ConfigKey::FlowList(k) => Some(k.flowlist_name.as_str()),
            _ => None,
        }
    }

    /// Returns the name a rename of `component` rewrites, if the key has it.
    pub fn component(&self, component: RenameComponent) -> Option<&str> {
        match component {
            RenameComponent::Vtn => self.vtn_name(),
            RenameComponent::Vnode => self.vnode_name(),
            RenameComponent::FlowList => self.flowlist_name(),
        }
    }

    /// Rewrites one name component in place. Returns false if the key does
    /// not embed that component.
    pub fn rename_component(&mut self, component: RenameComponent, new_name: &str) -> bool {
        match component {
            RenameComponent::Vtn => match self.vtn_key_mut() {
                Some(k) => {
                    k.vtn_name = new_name.to_string();
                    true
                }
                None => false,
            },
            RenameComponent::Vnode => match self.vrt_key_mut() {
                Some(k) => {
                    k.vrouter_name = new_name.to_string();
                    true
                }
                None => false,
            },
            RenameComponent::FlowList => match self {
                ConfigKey::FlowList(k) => {
                    k.flowlist_name = new_name.to_string();
                    true
                }
                _ => false,
            },
        }
    }

    /// Returns the direction field of a flow-filter key.
    pub fn direction(&self) -> Option<u8> {
        match self {
            ConfigKey::VtnFlowFilter(k) => Some(k.input_direction),
            ConfigKey::VrtIfFlowFilter(k) => Some(k.direction),
            ConfigKey::VrtIfFlowFilterEntry(k) => Some(k.flowfilter_key.direction),
            _ => None,
        }
    }
}

impl fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:", self.key_type())?;
        for (i, col) in self.columns().iter().enumerate() {
            if i > 0 {
                f.write_str("/")?;
            }
            write!(f, "{}", col)?;
        }
        Ok(())
    }
}

impl From<KeyVtn> for ConfigKey {
    fn from(k: KeyVtn) -> Self {
        ConfigKey::Vtn(k)
    }
}

impl From<KeyFlowList> for ConfigKey {
    fn from(k: KeyFlowList) -> Self {
        ConfigKey::FlowList(k)
    }
}

impl From<KeyVrt> for ConfigKey {
    fn from(k: KeyVrt) -> Self {
        ConfigKey::Vrt(k)
    }
}

impl From<KeyVrtIf> for ConfigKey {
    fn from(k: KeyVrtIf) -> Self {
        ConfigKey::VrtIf(k)
    }
}

impl From<KeyVtnFlowFilter> for ConfigKey {
    fn from(k: KeyVtnFlowFilter) -> Self {
        ConfigKey::VtnFlowFilter(k)
    }
}

impl From<KeyVtnPolicingMap> for ConfigKey {
    fn from(k: KeyVtnPolicingMap) -> Self {
        ConfigKey::VtnPolicingMap(k)
    }
}

impl From<KeyVrtIfFlowFilter> for ConfigKey {
    fn from(k: KeyVrtIfFlowFilter) -> Self {
        ConfigKey::VrtIfFlowFilter(k)
    }
}

impl From<KeyVrtIfFlowFilterEntry> for ConfigKey {
    fn from(k: KeyVrtIfFlowFilterEntry) -> Self {
        ConfigKey::VrtIfFlowFilterEntry(k)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn entry(dir: u8, seq: u16) -> ConfigKey {
        KeyVrtIfFlowFilterEntry::new(
            KeyVrtIfFlowFilter::new(KeyVrtIf::new("vtn1", "vrt1", "if1"), dir),
            seq,
        )
        .into()
    }

    #[test]
    fn test_columns_are_outermost_first() {
        assert_eq!(
            entry(0, 10).columns(),
            vec![
                KeyColumn::Name("vtn1".into()),
                KeyColumn::Name("vrt1".into()),
                KeyColumn::Name("if1".into()),
                KeyColumn::Direction(0),
                KeyColumn::Num(10),
            ]
        );
    }

    #[test]
    fn test_direction_sentinel_is_wildcard() {
        let pattern = entry(DIRECTION_SENTINEL, 10);
        assert!(pattern.selects(&entry(0, 10)));
        assert!(pattern.selects(&entry(1, 10)));
        assert!(!pattern.selects(&entry(1, 11)));
    }

    #[test]
    fn test_concrete_direction_is_exact() {
        assert!(entry(0, 10).selects(&entry(0, 10)));
        assert!(!entry(0, 10).selects(&entry(1, 10)));
        assert!(!entry(1, 0).selects(&entry(0, 4)));
        assert!(entry(1, 0).selects(&entry(1, 4)));
    }

    #[test]
    fn test_empty_key_selects_everything_of_its_type() {
        let pattern = ConfigKey::empty(KeyType::VrtIfFlowFilterEntry);
        assert!(pattern.selects(&entry(0, 1)));
        assert!(!pattern.is_fully_specified());
        assert!(!ConfigKey::empty(KeyType::Vtn).selects(&KeyVrt::new("a", "b").into()));
    }

    #[test]
    fn test_parent_chain() {
        let mut key = entry(1, 3);
        let mut chain = vec![key.key_type()];
        while let Some(p) = key.parent() {
            chain.push(p.key_type());
            key = p;
        }
        assert_eq!(
            chain,
            vec![
                KeyType::VrtIfFlowFilterEntry,
                KeyType::VrtIfFlowFilter,
                KeyType::VrtIf,
                KeyType::Vrt,
                KeyType::Vtn,
            ]
        );
    }

    #[test]
    fn test_rename_component() {
        let mut key = entry(0, 7);
        assert!(key.rename_component(RenameComponent::Vtn, "vtn2"));
        assert!(key.rename_component(RenameComponent::Vnode, "vrt9"));
        assert!(!key.rename_component(RenameComponent::FlowList, "fl"));
        assert_eq!(key.vtn_name(), Some("vtn2"));
        assert_eq!(key.vnode_name(), Some("vrt9"));

        let mut vtn_ff: ConfigKey = KeyVtnFlowFilter::new("vtn1", 0).into();
        assert!(!vtn_ff.rename_component(RenameComponent::Vnode, "x"));
    }

    #[test]
    fn test_direction_validation() {
        assert!(FlowDirection::validate(0, false).is_ok());
        assert!(FlowDirection::validate(1, false).is_ok());
        assert!(FlowDirection::validate(DIRECTION_SENTINEL, true).is_ok());
        assert_eq!(
            FlowDirection::validate(DIRECTION_SENTINEL, false),
            Err(ParseError::InvalidDirection(DIRECTION_SENTINEL))
        );
        assert!(FlowDirection::validate(2, true).is_err());
    }

    #[test]
    fn test_display() {
        assert_eq!(
            entry(1, 5).to_string(),
            "VRTIF_FLOWFILTER_ENTRY:vtn1/vrt1/if1/out/5"
        );
        assert_eq!(
            ConfigKey::empty(KeyType::VtnFlowFilter).to_string(),
            "VTN_FLOWFILTER:*/*"
        );
    }
}
