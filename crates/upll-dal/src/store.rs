//! The store contract.

use crate::DalResult;
use std::collections::VecDeque;
use std::fmt;
use upll_types::{ConfigKeyVal, DataType, KeyType, TableRole};

/// Read flavour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOp {
    /// First row selected by the pattern.
    Read,
    /// Every row selected by the pattern.
    ReadMultiple,
    /// Rows sharing the pattern's parent whose last key column sorts strictly
    /// after the pattern's.
    ReadSibling,
    /// Rows sharing the pattern's parent, from the first.
    ReadSiblingBegin,
    /// Like `ReadSiblingBegin`, counted by [`ConfigStore::record_count`].
    ReadSiblingCount,
    /// Existence pattern, served by [`ConfigStore::record_exists`].
    IsRecordExists,
}

/// Which non-key columns take part in the match clause.
///
/// Key columns always take part, except wildcard columns (empty names, zero
/// sequence numbers and the direction sentinel).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MatchOpts {
    pub ctrlr: bool,
    pub domain: bool,
    pub value: bool,
}

impl MatchOpts {
    /// Key columns only.
    pub const fn none() -> Self {
        Self {
            ctrlr: false,
            domain: false,
            value: false,
        }
    }

    /// Key columns plus controller and domain.
    pub const fn ctrlr_domain() -> Self {
        Self {
            ctrlr: true,
            domain: true,
            value: false,
        }
    }

    /// Key columns plus controller.
    pub const fn ctrlr() -> Self {
        Self {
            ctrlr: true,
            domain: false,
            value: false,
        }
    }

    /// Key columns plus value columns.
    pub const fn value() -> Self {
        Self {
            ctrlr: false,
            domain: false,
            value: true,
        }
    }
}

/// Sub-operation of a read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DbSubOp {
    pub read_op: ReadOp,
    pub matching: MatchOpts,
    /// Upper bound on returned rows; `None` is unbounded.
    pub max_rep_count: Option<u32>,
}

impl DbSubOp {
    pub const fn new(read_op: ReadOp, matching: MatchOpts) -> Self {
        Self {
            read_op,
            matching,
            max_rep_count: None,
        }
    }

    /// Single read on key columns.
    pub const fn read() -> Self {
        Self::new(ReadOp::Read, MatchOpts::none())
    }

    /// Multiple read on key columns.
    pub const fn read_multiple() -> Self {
        Self::new(ReadOp::ReadMultiple, MatchOpts::none())
    }

    pub const fn with_matching(mut self, matching: MatchOpts) -> Self {
        self.matching = matching;
        self
    }

    pub const fn with_max_rep_count(mut self, max: u32) -> Self {
        self.max_rep_count = Some(max);
        self
    }
}

/// Row-level mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOp {
    Create,
    Update,
    Delete,
}

impl fmt::Display for UpdateOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UpdateOp::Create => f.write_str("create"),
            UpdateOp::Update => f.write_str("update"),
            UpdateOp::Delete => f.write_str("delete"),
        }
    }
}

/// Which side of a two-plane difference a cursor walks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiffOp {
    /// In the new plane, absent from the old one.
    Create,
    /// In both planes with different contents.
    Update,
    /// In the old plane, absent from the new one.
    Delete,
}

impl fmt::Display for DiffOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiffOp::Create => f.write_str("create"),
            DiffOp::Update => f.write_str("update"),
            DiffOp::Delete => f.write_str("delete"),
        }
    }
}

/// What a diff cursor enumerates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffSpec {
    pub key_type: KeyType,
    pub table: TableRole,
    pub new_dt: DataType,
    pub old_dt: DataType,
    pub op: DiffOp,
    /// Restricts create and update diffs to one controller. Delete diffs are
    /// never filtered; callers post-filter them.
    pub ctrlr: Option<String>,
    /// Whether a status-only change counts as an update.
    pub include_status: bool,
}

impl DiffSpec {
    pub fn new(
        key_type: KeyType,
        table: TableRole,
        new_dt: DataType,
        old_dt: DataType,
        op: DiffOp,
    ) -> Self {
        Self {
            key_type,
            table,
            new_dt,
            old_dt,
            op,
            ctrlr: None,
            include_status: false,
        }
    }

    pub fn for_ctrlr(mut self, ctrlr: impl Into<String>) -> Self {
        self.ctrlr = Some(ctrlr.into());
        self
    }

    pub fn including_status(mut self) -> Self {
        self.include_status = true;
        self
    }
}

/// One row of a diff.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffRecord {
    /// The new-plane row for create and update, the old-plane row for
    /// delete.
    pub record: ConfigKeyVal,
    /// The old-plane row of an update.
    pub previous: Option<ConfigKeyVal>,
}

/// An open diff cursor.
///
/// Cursors are closed by value through [`ConfigStore::close_cursor`], so a
/// cursor can be closed at most once.
#[derive(Debug)]
pub struct DiffCursor {
    pub(crate) id: u64,
    pub(crate) pending: VecDeque<DiffRecord>,
}

impl DiffCursor {
    pub fn id(&self) -> u64 {
        self.id
    }
}

/// Storage operations the engine depends on.
///
/// One store handle serves one logical transaction at a time; it is passed
/// down the call chain as `&mut dyn ConfigStore`.
pub trait ConfigStore: Send {
    /// Reads rows selected by `pattern`.
    ///
    /// # Errors
    ///
    /// `RecordNotFound` if nothing matches.
    fn read_config_db(
        &self,
        pattern: &ConfigKeyVal,
        dt: DataType,
        subop: &DbSubOp,
        table: TableRole,
    ) -> DalResult<Vec<ConfigKeyVal>>;

    /// Counts rows selected by `pattern`. Zero is not an error.
    fn record_count(
        &self,
        pattern: &ConfigKeyVal,
        dt: DataType,
        subop: &DbSubOp,
        table: TableRole,
    ) -> DalResult<u32>;

    /// Returns whether any row is selected by `pattern`.
    fn record_exists(
        &self,
        pattern: &ConfigKeyVal,
        dt: DataType,
        matching: &MatchOpts,
        table: TableRole,
    ) -> DalResult<bool>;

    /// Applies one row mutation and returns the number of rows affected.
    ///
    /// # Errors
    ///
    /// - `RecordExists` when creating a row that is already present
    /// - `RecordNotFound` when updating or deleting a missing row
    fn update_config_db(
        &mut self,
        record: &ConfigKeyVal,
        dt: DataType,
        op: UpdateOp,
        matching: &MatchOpts,
        table: TableRole,
    ) -> DalResult<u32>;

    /// Opens a cursor over the difference described by `spec`.
    fn open_diff_cursor(&mut self, spec: &DiffSpec) -> DalResult<DiffCursor>;

    /// Returns the next diff row.
    ///
    /// # Errors
    ///
    /// `RecordNotFound` once the cursor is exhausted.
    fn next_record(&mut self, cursor: &mut DiffCursor) -> DalResult<DiffRecord>;

    /// Closes a cursor.
    fn close_cursor(&mut self, cursor: DiffCursor, commit: bool) -> DalResult<()>;

    /// Replaces the contents of one table in `to` with those in `from`.
    fn copy_table(
        &mut self,
        key_type: KeyType,
        table: TableRole,
        from: DataType,
        to: DataType,
    ) -> DalResult<()>;

    /// Removes every row of one table in one plane.
    fn clear_table(&mut self, key_type: KeyType, table: TableRole, dt: DataType)
        -> DalResult<()>;
}
