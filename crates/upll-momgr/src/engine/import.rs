//! Merging a controller's imported configuration into CANDIDATE.

use super::{vtn_pattern, MoMgrImpl};
use crate::momgr::MoMgr;
use crate::{UpllError, UpllResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info, trace};
use upll_dal::{ConfigStore, DbSubOp, MatchOpts, UpdateOp};
use upll_types::{
    ConfigKey, ConfigKeyVal, ConfigVal, DataType, KeyType, KeyVtn, RecordStatus, TableRole,
    ValVtnCtrlrSpan,
};

/// How an import relates to the existing configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportType {
    /// The controller's configuration is merged as a whole.
    Full,
    /// Only records not yet known are merged; records known to other
    /// controllers or committed elsewhere conflict.
    Partial,
}

fn enumerate(kt: KeyType) -> ConfigKeyVal {
    ConfigKeyVal::new(ConfigKey::empty(kt))
}

/// Rejects imported MAIN rows of `kt` that clash with CANDIDATE or, on a
/// partial import, with RUNNING or another controller.
pub(crate) fn merge_validate_generic(
    engine: &MoMgrImpl,
    store: &dyn ConfigStore,
    kt: KeyType,
    ctrlr: &str,
    import_type: ImportType,
) -> UpllResult<()> {
    let mgr = engine.manager(kt)?;
    let imported = engine.absent_as_empty(store.read_config_db(
        &enumerate(kt),
        DataType::Import,
        &DbSubOp::read_multiple(),
        TableRole::Main,
    ))?;
    for row in imported {
        if import_type == ImportType::Partial {
            if let Some(owner) = row.ctrlr_id() {
                if owner != ctrlr {
                    return Err(UpllError::MergeConflict(format!(
                        "{} belongs to {}",
                        row.key, owner
                    )));
                }
            }
        }
        let pattern = ConfigKeyVal::new(row.key.clone());
        let candidate = engine.absent_as_empty(store.read_config_db(
            &pattern,
            DataType::Candidate,
            &DbSubOp::read(),
            TableRole::Main,
        ))?;
        match candidate.first() {
            Some(existing) if !mgr.filter_attributes(&row, existing) => {
                return Err(UpllError::MergeConflict(format!(
                    "{} differs from candidate",
                    row.key
                )));
            }
            Some(_) => {}
            None if import_type == ImportType::Partial => {
                let matching = MatchOpts::none();
                if engine.exists(store, &pattern, DataType::Running, matching, TableRole::Main)? {
                    return Err(UpllError::MergeConflict(format!(
                        "{} was removed from candidate",
                        row.key
                    )));
                }
            }
            None => {}
        }
    }
    Ok(())
}

/// Copies every imported row of `kt` that CANDIDATE lacks.
pub(crate) fn merge_import_generic(
    engine: &MoMgrImpl,
    store: &mut dyn ConfigStore,
    kt: KeyType,
    ctrlr: &str,
) -> UpllResult<()> {
    let mgr = engine.manager(kt)?;
    let mut copied = 0usize;
    for table in mgr.tables() {
        let table = *table;
        let rows = engine.absent_as_empty(store.read_config_db(
            &enumerate(kt),
            DataType::Import,
            &DbSubOp::read_multiple(),
            table,
        ))?;
        for row in rows {
            let (pattern, matching) = if table.is_per_controller() {
                (row.key_only(), MatchOpts::ctrlr_domain())
            } else {
                (ConfigKeyVal::new(row.key.clone()), MatchOpts::none())
            };
            if engine.exists(&*store, &pattern, DataType::Candidate, matching, table)? {
                continue;
            }
            let mut fresh = row;
            fresh.status = RecordStatus::default();
            store.update_config_db(
                &fresh,
                DataType::Candidate,
                UpdateOp::Create,
                &MatchOpts::none(),
                table,
            )?;
            copied += 1;
        }
    }
    debug!(kt = %kt, ctrlr = %ctrlr, copied, "imported rows merged");
    Ok(())
}

/// Merges a VTN-scoped key type.
///
/// A VTN spanning only the importing controller's pairs is new: its
/// imported MAIN rows are copied and fanned out to every span. A VTN known
/// before keeps its CANDIDATE rows, which are fanned out to the imported
/// pairs, and the imported controller rows are dropped.
pub(crate) fn merge_vtn_scoped(
    engine: &MoMgrImpl,
    store: &mut dyn ConfigStore,
    mgr: &dyn MoMgr,
    ctrlr: &str,
) -> UpllResult<()> {
    let kt = mgr.key_type();
    let vtns = engine.absent_as_empty(store.read_config_db(
        &enumerate(KeyType::Vtn),
        DataType::Import,
        &DbSubOp::read_multiple(),
        TableRole::Main,
    ))?;
    for vtn_row in vtns {
        let Some(vtn) = vtn_row.key.vtn_name().map(str::to_string) else {
            continue;
        };
        let candidate_spans = engine.vtn_spans(&*store, DataType::Candidate, &vtn)?;
        let import_spans = engine.vtn_spans(&*store, DataType::Import, &vtn)?;
        let wholly_new = candidate_spans.len() == import_spans.len();
        trace!(vtn = %vtn, kt = %kt, wholly_new, "merging vtn-scoped rows");

        let (source, spans) = if wholly_new {
            (DataType::Import, &candidate_spans)
        } else {
            (DataType::Candidate, &import_spans)
        };
        let mains = engine.absent_as_empty(store.read_config_db(
            &vtn_pattern(kt, &vtn),
            source,
            &DbSubOp::read_multiple(),
            TableRole::Main,
        ))?;
        for main in mains {
            if source == DataType::Import
                && !engine.exists(
                    &*store,
                    &ConfigKeyVal::new(main.key.clone()),
                    DataType::Candidate,
                    MatchOpts::none(),
                    TableRole::Main,
                )?
            {
                let mut fresh = main.clone();
                fresh.status = RecordStatus::default();
                store.update_config_db(
                    &fresh,
                    DataType::Candidate,
                    UpdateOp::Create,
                    &MatchOpts::none(),
                    TableRole::Main,
                )?;
            }
            for (c, d) in spans {
                let row = mgr.ctrlr_row(&main, c, d);
                let matching = MatchOpts::ctrlr_domain();
                if !engine.exists(&*store, &row, DataType::Candidate, matching, TableRole::Ctrlr)? {
                    store.update_config_db(
                        &row,
                        DataType::Candidate,
                        UpdateOp::Create,
                        &MatchOpts::none(),
                        TableRole::Ctrlr,
                    )?;
                }
            }
        }
    }
    debug!(kt = %kt, ctrlr = %ctrlr, "vtn-scoped import merged");
    Ok(())
}

impl MoMgrImpl {
    /// Validates and merges the IMPORT plane into CANDIDATE for every key
    /// type, then recomputes the reference counts the merge invalidated.
    pub fn merge_import_all(
        &self,
        store: &mut dyn ConfigStore,
        ctrlr: &str,
        import_type: ImportType,
    ) -> UpllResult<()> {
        for mgr in self.managers() {
            mgr.merge_validate(self, &*store, ctrlr, import_type)?;
        }
        for mgr in self.managers() {
            mgr.merge_import_to_candidate(self, store, ctrlr)?;
        }
        self.recount_vtn_spans(store, DataType::Candidate)?;
        self.recount_flowlist_refs(store, DataType::Candidate)?;
        info!(ctrlr = %ctrlr, import_type = ?import_type, "import merged");
        Ok(())
    }

    /// Sets every span's reference count to the number of vrouters placed
    /// on it, creating spans a merged vrouter needs.
    ///
    /// Spans with no vrouter keep their count; the controller may hold other
    /// vnodes on them.
    pub(crate) fn recount_vtn_spans(
        &self,
        store: &mut dyn ConfigStore,
        dt: DataType,
    ) -> UpllResult<()> {
        let vrts = self.absent_as_empty(store.read_config_db(
            &enumerate(KeyType::Vrt),
            dt,
            &DbSubOp::read_multiple(),
            TableRole::Main,
        ))?;
        let mut counts: BTreeMap<(String, String, String), u32> = BTreeMap::new();
        for vrt in &vrts {
            if let (Some(vtn), Some(c), Some(d)) =
                (vrt.key.vtn_name(), vrt.ctrlr_id(), vrt.domain_id())
            {
                *counts
                    .entry((vtn.to_string(), c.to_string(), d.to_string()))
                    .or_default() += 1;
            }
        }
        for ((vtn, c, d), count) in counts {
            let pattern =
                ConfigKeyVal::new(KeyVtn::new(vtn.as_str())).on_ctrlr(c.as_str(), d.as_str());
            let existing = self.absent_as_empty(store.read_config_db(
                &pattern,
                dt,
                &DbSubOp::read().with_matching(MatchOpts::ctrlr_domain()),
                TableRole::Ctrlr,
            ))?;
            match existing.into_iter().next() {
                Some(mut row) => {
                    if let Some(ConfigVal::VtnCtrlrSpan(span)) = row.val_mut() {
                        span.ref_count = count;
                    }
                    store.update_config_db(
                        &row,
                        dt,
                        UpdateOp::Update,
                        &MatchOpts::ctrlr_domain(),
                        TableRole::Ctrlr,
                    )?;
                }
                None => {
                    let mut row = pattern;
                    row.vals = vec![ConfigVal::VtnCtrlrSpan(ValVtnCtrlrSpan { ref_count: count })];
                    store.update_config_db(
                        &row,
                        dt,
                        UpdateOp::Create,
                        &MatchOpts::none(),
                        TableRole::Ctrlr,
                    )?;
                }
            }
        }
        Ok(())
    }

    /// Sets every flow list's reference count to the number of entries
    /// naming it.
    pub(crate) fn recount_flowlist_refs(
        &self,
        store: &mut dyn ConfigStore,
        dt: DataType,
    ) -> UpllResult<()> {
        let entries = self.absent_as_empty(store.read_config_db(
            &enumerate(KeyType::VrtIfFlowFilterEntry),
            dt,
            &DbSubOp::read_multiple(),
            TableRole::Main,
        ))?;
        let mut counts: BTreeMap<String, u32> = BTreeMap::new();
        for entry in &entries {
            if let Some(name) = entry.flow_filter_entry().and_then(|v| v.flowlist_name.value()) {
                *counts.entry(name.clone()).or_default() += 1;
            }
        }
        let flowlists = self.absent_as_empty(store.read_config_db(
            &enumerate(KeyType::FlowList),
            dt,
            &DbSubOp::read_multiple(),
            TableRole::Main,
        ))?;
        for mut row in flowlists {
            let count = row
                .key
                .flowlist_name()
                .and_then(|n| counts.get(n))
                .copied()
                .unwrap_or(0);
            if let Some(ConfigVal::FlowList(v)) = row.val_mut() {
                if v.ref_count == count {
                    continue;
                }
                v.ref_count = count;
            }
            store.update_config_db(
                &row,
                dt,
                UpdateOp::Update,
                &MatchOpts::none(),
                TableRole::Main,
            )?;
        }
        Ok(())
    }
}
