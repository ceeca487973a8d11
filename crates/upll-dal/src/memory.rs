//! Ordered in-memory [`ConfigStore`] backend.

use crate::store::{
    ConfigStore, DbSubOp, DiffCursor, DiffOp, DiffRecord, DiffSpec, MatchOpts, ReadOp, UpdateOp,
};
use crate::{DalError, DalResult};
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use tracing::trace;
use upll_types::{ConfigKeyVal, DataType, KeyColumn, KeyType, TableRole};

/// Key columns, then controller and domain for per-controller tables.
type RowId = (Vec<KeyColumn>, String, String);
type Table = BTreeMap<RowId, ConfigKeyVal>;

/// Counters kept by [`InMemoryStore`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub rows_written: u64,
    pub cursors_opened: u64,
    pub cursors_closed: u64,
}

/// A [`ConfigStore`] kept in ordered maps, one per (key type, table, plane).
///
/// Iteration order is key-column order, so reads and diffs are
/// deterministic. Diff cursors are snapshots taken when the cursor opens.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    tables: HashMap<(KeyType, TableRole, DataType), Table>,
    open_cursors: HashSet<u64>,
    next_cursor_id: u64,
    stats: StoreStats,
    failing_updates: HashSet<(KeyType, DataType)>,
    failing_reads: HashSet<(KeyType, DataType)>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> StoreStats {
        self.stats
    }

    /// Number of cursors opened and not yet closed.
    pub fn open_cursor_count(&self) -> usize {
        self.open_cursors.len()
    }

    /// Makes every subsequent mutation of `key_type` in `dt` fail.
    pub fn fail_updates(&mut self, key_type: KeyType, dt: DataType) {
        self.failing_updates.insert((key_type, dt.storage_plane()));
    }

    /// Makes every subsequent read of `key_type` in `dt` fail.
    pub fn fail_reads(&mut self, key_type: KeyType, dt: DataType) {
        self.failing_reads.insert((key_type, dt.storage_plane()));
    }

    pub fn clear_faults(&mut self) {
        self.failing_updates.clear();
        self.failing_reads.clear();
    }

    /// Returns every row of one table in key order.
    pub fn rows(&self, key_type: KeyType, table: TableRole, dt: DataType) -> Vec<ConfigKeyVal> {
        self.tables
            .get(&(key_type, table, dt.storage_plane()))
            .map(|t| t.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Returns the number of rows of one table.
    pub fn row_count(&self, key_type: KeyType, table: TableRole, dt: DataType) -> usize {
        self.tables
            .get(&(key_type, table, dt.storage_plane()))
            .map_or(0, |t| t.len())
    }

    fn row_id(record: &ConfigKeyVal, table: TableRole) -> RowId {
        if table.is_per_controller() {
            (
                record.key.columns(),
                record.ctrlr_id().unwrap_or_default().to_string(),
                record.domain_id().unwrap_or_default().to_string(),
            )
        } else {
            (record.key.columns(), String::new(), String::new())
        }
    }

    fn table(&self, key_type: KeyType, table: TableRole, dt: DataType) -> Option<&Table> {
        self.tables.get(&(key_type, table, dt.storage_plane()))
    }

    fn check_read(&self, key_type: KeyType, dt: DataType) -> DalResult<()> {
        if self.failing_reads.contains(&(key_type, dt.storage_plane())) {
            return Err(DalError::ConnectionLost(format!(
                "read of {} in {} failed",
                key_type, dt
            )));
        }
        Ok(())
    }

    fn selected<'a>(
        &'a self,
        pattern: &'a ConfigKeyVal,
        dt: DataType,
        read_op: ReadOp,
        matching: &'a MatchOpts,
        table: TableRole,
    ) -> impl Iterator<Item = &'a ConfigKeyVal> + 'a {
        self.table(pattern.key_type(), table, dt)
            .into_iter()
            .flat_map(|t| t.values())
            .filter(move |row| selects(pattern, row, read_op, matching))
    }
}

/// Returns true if `pattern` selects `row` under the given read flavour.
fn selects(
    pattern: &ConfigKeyVal,
    row: &ConfigKeyVal,
    read_op: ReadOp,
    matching: &MatchOpts,
) -> bool {
    if pattern.key_type() != row.key_type() {
        return false;
    }
    let pattern_cols = pattern.key.columns();
    let row_cols = row.key.columns();
    let sibling = matches!(
        read_op,
        ReadOp::ReadSibling | ReadOp::ReadSiblingBegin | ReadOp::ReadSiblingCount
    );
    let prefix = if sibling {
        pattern_cols.len().saturating_sub(1)
    } else {
        pattern_cols.len()
    };
    if !pattern_cols[..prefix]
        .iter()
        .zip(&row_cols[..prefix])
        .all(|(p, r)| p.selects(r))
    {
        return false;
    }
    if read_op == ReadOp::ReadSibling {
        if let (Some(p), Some(r)) = (pattern_cols.last(), row_cols.last()) {
            if !p.is_wildcard() && r <= p {
                return false;
            }
        }
    }
    if matching.ctrlr && pattern.user_data.ctrlr_id != row.user_data.ctrlr_id {
        return false;
    }
    if matching.domain && pattern.user_data.domain_id != row.user_data.domain_id {
        return false;
    }
    if matching.value
        && !pattern
            .vals
            .iter()
            .all(|pv| row.vals.iter().any(|rv| rv.matches(pv)))
    {
        return false;
    }
    true
}

impl ConfigStore for InMemoryStore {
    fn read_config_db(
        &self,
        pattern: &ConfigKeyVal,
        dt: DataType,
        subop: &DbSubOp,
        table: TableRole,
    ) -> DalResult<Vec<ConfigKeyVal>> {
        self.check_read(pattern.key_type(), dt)?;
        let limit = match subop.read_op {
            ReadOp::Read | ReadOp::IsRecordExists => 1,
            _ => subop.max_rep_count.map_or(usize::MAX, |m| m as usize),
        };
        let rows: Vec<ConfigKeyVal> = self
            .selected(pattern, dt, subop.read_op, &subop.matching, table)
            .take(limit)
            .cloned()
            .collect();
        trace!(
            key = %pattern.key,
            dt = %dt,
            table = %table,
            read_op = ?subop.read_op,
            rows = rows.len(),
            "read_config_db"
        );
        if rows.is_empty() {
            return Err(DalError::RecordNotFound);
        }
        Ok(rows)
    }

    fn record_count(
        &self,
        pattern: &ConfigKeyVal,
        dt: DataType,
        subop: &DbSubOp,
        table: TableRole,
    ) -> DalResult<u32> {
        self.check_read(pattern.key_type(), dt)?;
        let count = self
            .selected(pattern, dt, subop.read_op, &subop.matching, table)
            .count();
        Ok(u32::try_from(count).unwrap_or(u32::MAX))
    }

    fn record_exists(
        &self,
        pattern: &ConfigKeyVal,
        dt: DataType,
        matching: &MatchOpts,
        table: TableRole,
    ) -> DalResult<bool> {
        self.check_read(pattern.key_type(), dt)?;
        Ok(self
            .selected(pattern, dt, ReadOp::Read, matching, table)
            .next()
            .is_some())
    }

    fn update_config_db(
        &mut self,
        record: &ConfigKeyVal,
        dt: DataType,
        op: UpdateOp,
        matching: &MatchOpts,
        table: TableRole,
    ) -> DalResult<u32> {
        let kt = record.key_type();
        let dt = dt.storage_plane();
        if self.failing_updates.contains(&(kt, dt)) {
            return Err(DalError::general(format!("{} of {} in {} failed", op, kt, dt)));
        }
        trace!(key = %record, dt = %dt, table = %table, op = %op, "update_config_db");

        let affected = match op {
            UpdateOp::Create => {
                if !record.key.is_fully_specified() {
                    return Err(DalError::general(format!(
                        "create with wildcard key {}",
                        record.key
                    )));
                }
                let id = Self::row_id(record, table);
                let rows = self.tables.entry((kt, table, dt)).or_default();
                if rows.contains_key(&id) {
                    return Err(DalError::RecordExists);
                }
                rows.insert(id, record.clone());
                1
            }
            UpdateOp::Update => {
                let id = Self::row_id(record, table);
                let row = self
                    .tables
                    .get_mut(&(kt, table, dt))
                    .and_then(|rows| rows.get_mut(&id))
                    .ok_or(DalError::RecordNotFound)?;
                *row = record.clone();
                1
            }
            UpdateOp::Delete => {
                let Some(rows) = self.tables.get_mut(&(kt, table, dt)) else {
                    return Err(DalError::RecordNotFound);
                };
                let before = rows.len();
                rows.retain(|_, row| !selects(record, row, ReadOp::ReadMultiple, matching));
                let removed = before - rows.len();
                if removed == 0 {
                    return Err(DalError::RecordNotFound);
                }
                u32::try_from(removed).unwrap_or(u32::MAX)
            }
        };
        self.stats.rows_written += u64::from(affected);
        Ok(affected)
    }

    fn open_diff_cursor(&mut self, spec: &DiffSpec) -> DalResult<DiffCursor> {
        self.check_read(spec.key_type, spec.new_dt)?;
        let empty = Table::new();
        let new = self
            .table(spec.key_type, spec.table, spec.new_dt)
            .unwrap_or(&empty);
        let old = self
            .table(spec.key_type, spec.table, spec.old_dt)
            .unwrap_or(&empty);
        let on_ctrlr = |rec: &ConfigKeyVal| {
            spec.ctrlr
                .as_deref()
                .map_or(true, |c| rec.ctrlr_id() == Some(c))
        };

        let pending: VecDeque<DiffRecord> = match spec.op {
            DiffOp::Create => new
                .iter()
                .filter(|(id, rec)| !old.contains_key(*id) && on_ctrlr(*rec))
                .map(|(_, rec)| DiffRecord {
                    record: rec.clone(),
                    previous: None,
                })
                .collect(),
            DiffOp::Delete => old
                .iter()
                .filter(|(id, _)| !new.contains_key(*id))
                .map(|(_, rec)| DiffRecord {
                    record: rec.clone(),
                    previous: None,
                })
                .collect(),
            DiffOp::Update => new
                .iter()
                .filter(|(_, rec)| on_ctrlr(*rec))
                .filter_map(|(id, rec)| {
                    let prev = old.get(id)?;
                    let changed = if spec.include_status {
                        rec != prev
                    } else {
                        !rec.same_config(prev)
                    };
                    changed.then(|| DiffRecord {
                        record: rec.clone(),
                        previous: Some(prev.clone()),
                    })
                })
                .collect(),
        };

        self.next_cursor_id += 1;
        let id = self.next_cursor_id;
        self.open_cursors.insert(id);
        self.stats.cursors_opened += 1;
        trace!(
            cursor = id,
            key_type = %spec.key_type,
            table = %spec.table,
            new_dt = %spec.new_dt,
            old_dt = %spec.old_dt,
            op = %spec.op,
            rows = pending.len(),
            "opened diff cursor"
        );
        Ok(DiffCursor { id, pending })
    }

    fn next_record(&mut self, cursor: &mut DiffCursor) -> DalResult<DiffRecord> {
        if !self.open_cursors.contains(&cursor.id) {
            return Err(DalError::CursorClosed(cursor.id));
        }
        cursor.pending.pop_front().ok_or(DalError::RecordNotFound)
    }

    fn close_cursor(&mut self, cursor: DiffCursor, commit: bool) -> DalResult<()> {
        if !self.open_cursors.remove(&cursor.id) {
            return Err(DalError::CursorClosed(cursor.id));
        }
        self.stats.cursors_closed += 1;
        trace!(cursor = cursor.id, commit, "closed diff cursor");
        Ok(())
    }

    fn copy_table(
        &mut self,
        key_type: KeyType,
        table: TableRole,
        from: DataType,
        to: DataType,
    ) -> DalResult<()> {
        let to = to.storage_plane();
        if self.failing_updates.contains(&(key_type, to)) {
            return Err(DalError::general(format!("copy of {} into {} failed", key_type, to)));
        }
        let rows = self.table(key_type, table, from).cloned().unwrap_or_default();
        trace!(
            key_type = %key_type,
            table = %table,
            from = %from,
            to = %to,
            rows = rows.len(),
            "copy_table"
        );
        self.stats.rows_written += rows.len() as u64;
        self.tables.insert((key_type, table, to), rows);
        Ok(())
    }

    fn clear_table(
        &mut self,
        key_type: KeyType,
        table: TableRole,
        dt: DataType,
    ) -> DalResult<()> {
        let dt = dt.storage_plane();
        if self.failing_updates.contains(&(key_type, dt)) {
            return Err(DalError::general(format!("clear of {} in {} failed", key_type, dt)));
        }
        trace!(key_type = %key_type, table = %table, dt = %dt, "clear_table");
        self.tables.remove(&(key_type, table, dt));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use upll_types::{
        Attr, ConfigStatus, ConfigVal, KeyVrtIf, KeyVrtIfFlowFilter, KeyVrtIfFlowFilterEntry,
        KeyVtn, KeyVtnFlowFilter, ValRename, DIRECTION_SENTINEL,
    };

    fn entry(dir: u8, seq: u16) -> ConfigKeyVal {
        ConfigKeyVal::new(KeyVrtIfFlowFilterEntry::new(
            KeyVrtIfFlowFilter::new(KeyVrtIf::new("vtn1", "vrt1", "if1"), dir),
            seq,
        ))
    }

    fn create(store: &mut InMemoryStore, rec: &ConfigKeyVal, dt: DataType, table: TableRole) {
        store
            .update_config_db(rec, dt, UpdateOp::Create, &MatchOpts::none(), table)
            .unwrap();
    }

    #[test]
    fn test_create_twice_reports_exists() {
        let mut store = InMemoryStore::new();
        let vtn = ConfigKeyVal::new(KeyVtn::new("vtn1"));
        create(&mut store, &vtn, DataType::Candidate, TableRole::Main);
        let err = store
            .update_config_db(
                &vtn,
                DataType::Candidate,
                UpdateOp::Create,
                &MatchOpts::none(),
                TableRole::Main,
            )
            .unwrap_err();
        assert_eq!(err, DalError::RecordExists);
        assert_eq!(store.row_count(KeyType::Vtn, TableRole::Main, DataType::Candidate), 1);
    }

    #[test]
    fn test_create_rejects_wildcard_key() {
        let mut store = InMemoryStore::new();
        let pattern = entry(DIRECTION_SENTINEL, 1);
        assert!(matches!(
            store.update_config_db(
                &pattern,
                DataType::Candidate,
                UpdateOp::Create,
                &MatchOpts::none(),
                TableRole::Main,
            ),
            Err(DalError::General(_))
        ));
    }

    #[test]
    fn test_update_and_delete_missing_row() {
        let mut store = InMemoryStore::new();
        let vtn = ConfigKeyVal::new(KeyVtn::new("vtn1"));
        for op in [UpdateOp::Update, UpdateOp::Delete] {
            assert_eq!(
                store.update_config_db(
                    &vtn,
                    DataType::Candidate,
                    op,
                    &MatchOpts::none(),
                    TableRole::Main,
                ),
                Err(DalError::RecordNotFound)
            );
        }
    }

    #[test]
    fn test_sentinel_direction_read() {
        let mut store = InMemoryStore::new();
        for (dir, seq) in [(0, 1), (0, 2), (1, 1)] {
            create(&mut store, &entry(dir, seq), DataType::Candidate, TableRole::Main);
        }

        let all = store
            .read_config_db(
                &entry(DIRECTION_SENTINEL, 0),
                DataType::Candidate,
                &DbSubOp::read_multiple(),
                TableRole::Main,
            )
            .unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[2].key.direction(), Some(1));

        let inbound = store
            .read_config_db(
                &entry(0, 0),
                DataType::Candidate,
                &DbSubOp::read_multiple(),
                TableRole::Main,
            )
            .unwrap();
        assert_eq!(inbound.len(), 2);
        assert!(inbound.iter().all(|r| r.key.direction() == Some(0)));
    }

    #[test]
    fn test_sibling_reads() {
        let mut store = InMemoryStore::new();
        for seq in [5, 10, 15, 20] {
            create(&mut store, &entry(0, seq), DataType::Candidate, TableRole::Main);
        }
        let after = store
            .read_config_db(
                &entry(0, 10),
                DataType::Candidate,
                &DbSubOp::new(ReadOp::ReadSibling, MatchOpts::none()).with_max_rep_count(1),
                TableRole::Main,
            )
            .unwrap();
        assert_eq!(after, vec![entry(0, 15)]);

        let begin = store
            .read_config_db(
                &entry(0, 20),
                DataType::Candidate,
                &DbSubOp::new(ReadOp::ReadSiblingBegin, MatchOpts::none()),
                TableRole::Main,
            )
            .unwrap();
        assert_eq!(begin.len(), 4);

        let count = store
            .record_count(
                &entry(0, 20),
                DataType::Candidate,
                &DbSubOp::new(ReadOp::ReadSiblingCount, MatchOpts::none()),
                TableRole::Main,
            )
            .unwrap();
        assert_eq!(count, 4);

        assert_eq!(
            store.read_config_db(
                &entry(0, 20),
                DataType::Candidate,
                &DbSubOp::new(ReadOp::ReadSibling, MatchOpts::none()),
                TableRole::Main,
            ),
            Err(DalError::RecordNotFound)
        );
    }

    #[test]
    fn test_ctrlr_rows_are_distinct() {
        let mut store = InMemoryStore::new();
        let ff = ConfigKeyVal::new(KeyVtnFlowFilter::new("vtn1", 0));
        create(&mut store, &ff.clone().on_ctrlr("a", "d1"), DataType::Candidate, TableRole::Ctrlr);
        create(&mut store, &ff.clone().on_ctrlr("b", "d1"), DataType::Candidate, TableRole::Ctrlr);
        assert_eq!(
            store.row_count(KeyType::VtnFlowFilter, TableRole::Ctrlr, DataType::Candidate),
            2
        );

        store
            .update_config_db(
                &ff.clone().on_ctrlr("a", "d1"),
                DataType::Candidate,
                UpdateOp::Delete,
                &MatchOpts::ctrlr_domain(),
                TableRole::Ctrlr,
            )
            .unwrap();
        let left = store.rows(KeyType::VtnFlowFilter, TableRole::Ctrlr, DataType::Candidate);
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].ctrlr_id(), Some("b"));
    }

    #[test]
    fn test_value_match() {
        let mut store = InMemoryStore::new();
        let rename = ConfigKeyVal::with_val(
            KeyVtn::new("unc_vtn"),
            ConfigVal::Rename(ValRename {
                vtn_name: Attr::Valid("ctr_vtn".into()),
                ..Default::default()
            }),
        )
        .on_ctrlr("a", "d1");
        create(&mut store, &rename, DataType::Candidate, TableRole::Rename);

        let pattern = ConfigKeyVal::with_val(
            KeyVtn::default(),
            ConfigVal::Rename(ValRename {
                vtn_name: Attr::Valid("ctr_vtn".into()),
                ..Default::default()
            }),
        )
        .on_ctrlr("a", "d1");
        let subop = DbSubOp::read().with_matching(MatchOpts {
            ctrlr: true,
            domain: true,
            value: true,
        });
        let found = store
            .read_config_db(&pattern, DataType::Candidate, &subop, TableRole::Rename)
            .unwrap();
        assert_eq!(found[0].key.vtn_name(), Some("unc_vtn"));
    }

    #[test]
    fn test_state_reads_running() {
        let mut store = InMemoryStore::new();
        let vtn = ConfigKeyVal::new(KeyVtn::new("vtn1"));
        create(&mut store, &vtn, DataType::Running, TableRole::Main);
        assert!(store
            .record_exists(&vtn, DataType::State, &MatchOpts::none(), TableRole::Main)
            .unwrap());
    }

    #[test]
    fn test_diff_cursor() {
        let mut store = InMemoryStore::new();
        let a = ConfigKeyVal::new(KeyVtn::new("a"));
        let b = ConfigKeyVal::new(KeyVtn::new("b"));
        let c = ConfigKeyVal::new(KeyVtn::new("c"));
        create(&mut store, &a, DataType::Candidate, TableRole::Main);
        create(&mut store, &b, DataType::Candidate, TableRole::Main);
        create(&mut store, &b, DataType::Running, TableRole::Main);
        create(&mut store, &c, DataType::Running, TableRole::Main);

        let spec = |op| DiffSpec::new(
            KeyType::Vtn,
            TableRole::Main,
            DataType::Candidate,
            DataType::Running,
            op,
        );

        let mut cursor = store.open_diff_cursor(&spec(DiffOp::Create)).unwrap();
        assert_eq!(store.next_record(&mut cursor).unwrap().record, a);
        assert_eq!(store.next_record(&mut cursor), Err(DalError::RecordNotFound));
        store.close_cursor(cursor, true).unwrap();

        let mut cursor = store.open_diff_cursor(&spec(DiffOp::Delete)).unwrap();
        assert_eq!(store.next_record(&mut cursor).unwrap().record, c);
        store.close_cursor(cursor, true).unwrap();

        let mut cursor = store.open_diff_cursor(&spec(DiffOp::Update)).unwrap();
        assert_eq!(store.next_record(&mut cursor), Err(DalError::RecordNotFound));
        store.close_cursor(cursor, true).unwrap();

        assert_eq!(store.open_cursor_count(), 0);
        assert_eq!(store.stats().cursors_opened, 3);
        assert_eq!(store.stats().cursors_closed, 3);
    }

    #[test]
    fn test_status_only_change_is_an_update_only_when_included() {
        let mut store = InMemoryStore::new();
        let vtn = ConfigKeyVal::new(KeyVtn::new("a"));
        create(&mut store, &vtn, DataType::Running, TableRole::Main);
        let mut audited = vtn.clone();
        audited.status.row = ConfigStatus::Applied;
        create(&mut store, &audited, DataType::Audit, TableRole::Main);

        let spec = DiffSpec::new(
            KeyType::Vtn,
            TableRole::Main,
            DataType::Running,
            DataType::Audit,
            DiffOp::Update,
        );
        let mut cursor = store.open_diff_cursor(&spec).unwrap();
        assert_eq!(store.next_record(&mut cursor), Err(DalError::RecordNotFound));
        store.close_cursor(cursor, false).unwrap();

        let mut cursor = store.open_diff_cursor(&spec.including_status()).unwrap();
        let rec = store.next_record(&mut cursor).unwrap();
        assert_eq!(rec.previous.unwrap().status.row, ConfigStatus::Applied);
        store.close_cursor(cursor, false).unwrap();
    }

    #[test]
    fn test_delete_diff_ignores_ctrlr_filter() {
        let mut store = InMemoryStore::new();
        let ff = ConfigKeyVal::new(KeyVtnFlowFilter::new("vtn1", 0));
        create(&mut store, &ff.clone().on_ctrlr("a", "d"), DataType::Running, TableRole::Ctrlr);
        create(&mut store, &ff.clone().on_ctrlr("b", "d"), DataType::Running, TableRole::Ctrlr);
        create(&mut store, &ff.clone().on_ctrlr("b", "d"), DataType::Audit, TableRole::Ctrlr);

        let spec = DiffSpec::new(
            KeyType::VtnFlowFilter,
            TableRole::Ctrlr,
            DataType::Running,
            DataType::Audit,
            DiffOp::Create,
        )
            .for_ctrlr("b");
        let mut cursor = store.open_diff_cursor(&spec).unwrap();
        assert_eq!(store.next_record(&mut cursor), Err(DalError::RecordNotFound));
        store.close_cursor(cursor, true).unwrap();

        let spec = DiffSpec::new(
            KeyType::VtnFlowFilter,
            TableRole::Ctrlr,
            DataType::Audit,
            DataType::Running,
            DiffOp::Delete,
        )
            .for_ctrlr("b");
        let mut cursor = store.open_diff_cursor(&spec).unwrap();
        assert_eq!(store.next_record(&mut cursor).unwrap().record.ctrlr_id(), Some("a"));
        store.close_cursor(cursor, true).unwrap();
    }

    #[test]
    fn test_copy_and_clear_table() {
        let mut store = InMemoryStore::new();
        create(
            &mut store,
            &ConfigKeyVal::new(KeyVtn::new("a")),
            DataType::Running,
            TableRole::Main,
        );
        store
            .copy_table(KeyType::Vtn, TableRole::Main, DataType::Running, DataType::Startup)
            .unwrap();
        assert_eq!(store.row_count(KeyType::Vtn, TableRole::Main, DataType::Startup), 1);
        store.clear_table(KeyType::Vtn, TableRole::Main, DataType::Startup).unwrap();
        assert_eq!(store.row_count(KeyType::Vtn, TableRole::Main, DataType::Startup), 0);
    }

    #[test]
    fn test_fault_injection() {
        let mut store = InMemoryStore::new();
        store.fail_updates(KeyType::Vtn, DataType::Running);
        let vtn = ConfigKeyVal::new(KeyVtn::new("a"));
        assert!(store
            .update_config_db(
                &vtn,
                DataType::Running,
                UpdateOp::Create,
                &MatchOpts::none(),
                TableRole::Main,
            )
            .is_err());
        create(&mut store, &vtn, DataType::Candidate, TableRole::Main);

        store.fail_reads(KeyType::Vtn, DataType::Candidate);
        assert!(matches!(
            store.read_config_db(&vtn, DataType::Candidate, &DbSubOp::read(), TableRole::Main),
            Err(DalError::ConnectionLost(_))
        ));
        store.clear_faults();
        assert!(store
            .read_config_db(&vtn, DataType::Candidate, &DbSubOp::read(), TableRole::Main)
            .is_ok());
    }
}
