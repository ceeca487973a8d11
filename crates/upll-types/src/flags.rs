//! Rename and vlink/portmap lineage of a record.

use serde::{Deserialize, Serialize};

/// Out-of-band lineage flags carried in a record's user data.
///
/// The rename flags tell the push path whether a controller-name lookup is
/// needed at all; the interface flags gate whether an interface-bound record
/// is ever sent to a controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct RecordFlags {
    #[serde(default)]
    pub vtn_renamed: bool,
    #[serde(default)]
    pub vnode_renamed: bool,
    #[serde(default)]
    pub flowlist_renamed: bool,
    #[serde(default)]
    pub vlink_configured: bool,
    #[serde(default)]
    pub portmap_configured: bool,
}

impl RecordFlags {
    /// Returns true if any name in the record differs on some controller.
    pub fn any_renamed(&self) -> bool {
        self.vtn_renamed || self.vnode_renamed || self.flowlist_renamed
    }

    /// Returns true if the owning interface is backed by a vlink or portmap.
    pub fn interface_configured(&self) -> bool {
        self.vlink_configured || self.portmap_configured
    }

    /// Returns only the rename lineage.
    pub fn rename_bits(&self) -> RecordFlags {
        RecordFlags {
            vtn_renamed: self.vtn_renamed,
            vnode_renamed: self.vnode_renamed,
            flowlist_renamed: self.flowlist_renamed,
            ..RecordFlags::default()
        }
    }

    /// Returns only the interface lineage.
    pub fn interface_bits(&self) -> RecordFlags {
        RecordFlags {
            vlink_configured: self.vlink_configured,
            portmap_configured: self.portmap_configured,
            ..RecordFlags::default()
        }
    }

    /// Inherits the lineage a child record takes from its parent.
    ///
    /// Rename bits accumulate. Interface bits are copied from the parent
    /// because they describe the parent interface, not the child.
    pub fn inherit(&mut self, parent: &RecordFlags) {
        self.vtn_renamed |= parent.vtn_renamed;
        self.vnode_renamed |= parent.vnode_renamed;
        self.flowlist_renamed |= parent.flowlist_renamed;
        self.vlink_configured = parent.vlink_configured;
        self.portmap_configured = parent.portmap_configured;
    }

    /// Replaces the interface lineage, keeping the rename lineage.
    pub fn set_interface(&mut self, interface: RecordFlags) {
        self.vlink_configured = interface.vlink_configured;
        self.portmap_configured = interface.portmap_configured;
    }
}
