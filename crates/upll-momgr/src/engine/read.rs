//! Northbound reads, including live STATE+DETAIL queries.

use super::{bump, MoMgrImpl};
use crate::momgr::MoMgr;
use crate::request::IpcReqRespHeader;
use crate::{UpllError, UpllResult};
use tracing::debug;
use upll_dal::{ConfigStore, DbSubOp, MatchOpts, ReadOp};
use upll_types::{ConfigKeyVal, DataType, Operation, Option1, TableRole};

impl MoMgrImpl {
    /// Reads the records selected by `ikey`.
    ///
    /// A fully specified key reads one record, a partial key every record it
    /// selects up to the configured limit.
    pub fn read_mo(
        &self,
        req: &IpcReqRespHeader,
        ikey: &ConfigKeyVal,
        store: &dyn ConfigStore,
    ) -> UpllResult<Vec<ConfigKeyVal>> {
        let mgr = self.manager(ikey.key_type())?;
        mgr.validate_message(req, ikey)?;
        let subop = if ikey.key.is_fully_specified() {
            DbSubOp::read()
        } else {
            DbSubOp::read_multiple().with_max_rep_count(self.config.max_rep_count)
        };
        let rows = store.read_config_db(ikey, req.datatype, &subop, TableRole::Main)?;
        self.finish_read(req, mgr, store, rows)
    }

    /// Reads the siblings of `ikey`: from the first with
    /// `ReadSiblingBegin`, strictly after it with `ReadSibling`.
    pub fn read_sibling_mo(
        &self,
        req: &IpcReqRespHeader,
        ikey: &ConfigKeyVal,
        store: &dyn ConfigStore,
    ) -> UpllResult<Vec<ConfigKeyVal>> {
        let mgr = self.manager(ikey.key_type())?;
        mgr.validate_message(req, ikey)?;
        let read_op = match req.operation {
            Operation::ReadSibling => ReadOp::ReadSibling,
            Operation::ReadSiblingBegin => ReadOp::ReadSiblingBegin,
            other => {
                return Err(UpllError::bad_request(format!(
                    "{} is not a sibling read",
                    other
                )))
            }
        };
        let subop =
            DbSubOp::new(read_op, MatchOpts::none()).with_max_rep_count(self.sibling_limit(req));
        let rows = store.read_config_db(ikey, req.datatype, &subop, TableRole::Main)?;
        self.finish_read(req, mgr, store, rows)
    }

    /// Counts the siblings of `ikey`.
    pub fn read_sibling_count(
        &self,
        req: &IpcReqRespHeader,
        ikey: &ConfigKeyVal,
        store: &dyn ConfigStore,
    ) -> UpllResult<u32> {
        let mgr = self.manager(ikey.key_type())?;
        mgr.validate_message(req, ikey)?;
        if req.operation != Operation::ReadSiblingCount {
            return Err(UpllError::bad_request(format!(
                "{} is not a sibling count",
                req.operation
            )));
        }
        bump(&self.counters.reads);
        Ok(store.record_count(
            ikey,
            req.datatype,
            &DbSubOp::new(ReadOp::ReadSiblingCount, MatchOpts::none()),
            TableRole::Main,
        )?)
    }

    fn sibling_limit(&self, req: &IpcReqRespHeader) -> u32 {
        if req.rep_count > 0 {
            req.rep_count.min(self.config.max_rep_count)
        } else {
            self.config.max_rep_count
        }
    }

    fn finish_read(
        &self,
        req: &IpcReqRespHeader,
        mgr: &dyn MoMgr,
        store: &dyn ConfigStore,
        mut rows: Vec<ConfigKeyVal>,
    ) -> UpllResult<Vec<ConfigKeyVal>> {
        if req.datatype == DataType::State && req.option1 == Option1::Detail {
            for row in rows.iter_mut() {
                self.read_detail(store, mgr, row)?;
            }
        }
        for row in rows.iter_mut() {
            row.strip_user_data();
        }
        bump(&self.counters.reads);
        Ok(rows)
    }

    /// Queries every controller owning `row` and folds the answers in.
    fn read_detail(
        &self,
        store: &dyn ConfigStore,
        mgr: &dyn MoMgr,
        row: &mut ConfigKeyVal,
    ) -> UpllResult<()> {
        if !mgr.read_detail_eligible(row) {
            debug!(key = %row.key, "record not eligible for a controller query");
            return Ok(());
        }
        let targets: Vec<(String, String)> = if mgr.vtn_scoped() {
            self.absent_as_empty(store.read_config_db(
                &ConfigKeyVal::new(row.key.clone()),
                DataType::State,
                &DbSubOp::read_multiple(),
                TableRole::Ctrlr,
            ))?
            .iter()
            .filter_map(|r| Some((r.ctrlr_id()?.to_string(), r.domain_id()?.to_string())))
            .collect()
        } else {
            match (row.ctrlr_id(), row.domain_id()) {
                (Some(c), Some(d)) => vec![(c.to_string(), d.to_string())],
                _ => Vec::new(),
            }
        };

        for (ctrlr, domain) in targets {
            mgr.validate_capability(self, store, Operation::Read, DataType::State, row, &ctrlr)?;

            let mut ctrlr_key = row.clone();
            ctrlr_key.user_data.ctrlr_id = Some(ctrlr.clone());
            ctrlr_key.user_data.domain_id = Some(domain.clone());
            mgr.get_renamed_controller_key(self, store, &mut ctrlr_key, DataType::Running)?;
            let payload = mgr.driver_payload(&ctrlr_key, Operation::Read);

            let response = self.send_to_driver(
                &ctrlr,
                &domain,
                Operation::Read,
                DataType::State,
                Option1::Detail,
                payload,
                true,
            )?;
            let response = match self.check_response(&ctrlr, response)? {
                Some(mut resp) => {
                    resp.user_data.ctrlr_id = Some(ctrlr.clone());
                    resp.user_data.domain_id = Some(domain.clone());
                    mgr.get_renamed_unc_key(self, store, &mut resp, DataType::Running)?;
                    if resp.key != row.key {
                        return Err(UpllError::generic(format!(
                            "driver answered {} for {}",
                            resp.key, row.key
                        )));
                    }
                    Some(resp)
                }
                None => None,
            };
            mgr.construct_read_detail_response(row, response, &ctrlr, &domain)?;
        }
        Ok(())
    }
}
