//! Request scripts.
//!
//! A script is a YAML or JSON list of northbound requests and transaction
//! steps, run in order against one engine and one store. Each step yields a
//! [`StepOutcome`] carrying the result code the request dispatcher would
//! have returned.
//!
//! ```yaml
//! steps:
//!   - step: create
//!     record: { key: { key_type: VTN, vtn_name: vtn1 } }
//!   - step: commit
//!   - step: read
//!     datatype: running
//!     record: { key: { key_type: VTN, vtn_name: vtn1 } }
//! ```

use crate::config::ConfigError;
use crate::engine::{AuditContext, ImportType, MoMgrImpl};
use crate::error::{result_code, UpllError, UpllResult};
use crate::request::IpcReqRespHeader;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{info, warn};
use upll_dal::{ConfigStore, MatchOpts, UpdateOp};
use upll_types::{
    ConfigKeyVal, DataType, InterfaceType, KeyVrtIf, Operation, Option1, TableRole,
};

fn candidate() -> DataType {
    DataType::Candidate
}

fn main_table() -> TableRole {
    TableRole::Main
}

/// How a sibling read starts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SiblingMode {
    /// Records strictly after the given key.
    #[default]
    Next,
    /// Records from the first sibling on.
    Begin,
    /// Number of siblings only.
    Count,
}

/// One scripted step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum ScriptStep {
    Create {
        #[serde(default = "candidate")]
        datatype: DataType,
        record: ConfigKeyVal,
    },
    Update {
        record: ConfigKeyVal,
    },
    Delete {
        record: ConfigKeyVal,
    },
    Rename {
        #[serde(default = "candidate")]
        datatype: DataType,
        record: ConfigKeyVal,
    },
    Read {
        #[serde(default = "candidate")]
        datatype: DataType,
        record: ConfigKeyVal,
        /// Query the owning controllers; STATE only.
        #[serde(default)]
        detail: bool,
    },
    ReadSibling {
        #[serde(default = "candidate")]
        datatype: DataType,
        record: ConfigKeyVal,
        #[serde(default)]
        mode: SiblingMode,
        #[serde(default)]
        rep_count: u32,
    },
    /// Binds a vrouter interface to a vlink or portmap, or unbinds it.
    SetInterface {
        #[serde(default = "candidate")]
        datatype: DataType,
        interface: KeyVrtIf,
        #[serde(default)]
        kind: Option<InterfaceType>,
    },
    /// Writes a row directly into a plane, bypassing validation. Used to
    /// stage what a controller reports into AUDIT or IMPORT.
    Seed {
        datatype: DataType,
        #[serde(default = "main_table")]
        table: TableRole,
        record: ConfigKeyVal,
    },
    Commit {
        #[serde(default)]
        session_id: u32,
        #[serde(default)]
        config_id: u32,
    },
    /// Discards uncommitted CANDIDATE changes.
    Abort,
    Audit {
        ctrlr: String,
    },
    Import {
        ctrlr: String,
        #[serde(default = "full_import")]
        import_type: ImportType,
    },
    SaveStartup,
    ClearStartup,
    LoadStartup,
}

fn full_import() -> ImportType {
    ImportType::Full
}

impl ScriptStep {
    pub fn name(&self) -> &'static str {
        match self {
            ScriptStep::Create { .. } => "create",
            ScriptStep::Update { .. } => "update",
            ScriptStep::Delete { .. } => "delete",
            ScriptStep::Rename { .. } => "rename",
            ScriptStep::Read { .. } => "read",
            ScriptStep::ReadSibling { .. } => "read_sibling",
            ScriptStep::SetInterface { .. } => "set_interface",
            ScriptStep::Seed { .. } => "seed",
            ScriptStep::Commit { .. } => "commit",
            ScriptStep::Abort => "abort",
            ScriptStep::Audit { .. } => "audit",
            ScriptStep::Import { .. } => "import",
            ScriptStep::SaveStartup => "save_startup",
            ScriptStep::ClearStartup => "clear_startup",
            ScriptStep::LoadStartup => "load_startup",
        }
    }
}

/// A list of steps.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Script {
    /// Stop at the first step that does not succeed.
    pub stop_on_error: bool,
    pub steps: Vec<ScriptStep>,
}

impl Script {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Ok(serde_json::from_str(&text)?),
            _ => Ok(serde_yaml::from_str(&text)?),
        }
    }
}

/// Result of one step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepOutcome {
    pub index: usize,
    pub step: &'static str,
    pub code: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub records: Vec<ConfigKeyVal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<u32>,
    /// Result code per controller of a commit or audit.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub controllers: BTreeMap<String, &'static str>,
}

impl StepOutcome {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

#[derive(Default)]
struct StepOutput {
    records: Vec<ConfigKeyVal>,
    count: Option<u32>,
    controllers: BTreeMap<String, &'static str>,
}

impl StepOutput {
    fn records(records: Vec<ConfigKeyVal>) -> Self {
        Self {
            records,
            ..Self::default()
        }
    }
}

/// Runs every step of `script` in order.
pub async fn run_script(
    engine: &MoMgrImpl,
    store: &mut dyn ConfigStore,
    script: &Script,
) -> Vec<StepOutcome> {
    let mut outcomes = Vec::with_capacity(script.steps.len());
    for (index, step) in script.steps.iter().enumerate() {
        let result = run_step(engine, store, step).await;
        let code = result_code(&result);
        let outcome = match result {
            Ok(out) => StepOutcome {
                index,
                step: step.name(),
                code,
                error: None,
                records: out.records,
                count: out.count,
                controllers: out.controllers,
            },
            Err(e) => {
                warn!(index, step = step.name(), error = %e, "step failed");
                StepOutcome {
                    index,
                    step: step.name(),
                    code,
                    error: Some(e.to_string()),
                    records: Vec::new(),
                    count: None,
                    controllers: BTreeMap::new(),
                }
            }
        };
        let failed = !outcome.is_success();
        outcomes.push(outcome);
        if failed && script.stop_on_error {
            info!(index, "script stopped at failed step");
            break;
        }
    }
    outcomes
}

async fn run_step(
    engine: &MoMgrImpl,
    store: &mut dyn ConfigStore,
    step: &ScriptStep,
) -> UpllResult<StepOutput> {
    match step {
        ScriptStep::Create { datatype, record } => {
            let req = IpcReqRespHeader::new(Operation::Create, *datatype);
            engine.create_mo(&req, record, store)?;
        }
        ScriptStep::Update { record } => {
            let req = IpcReqRespHeader::new(Operation::Update, DataType::Candidate);
            engine.update_mo(&req, record, store)?;
        }
        ScriptStep::Delete { record } => {
            let req = IpcReqRespHeader::new(Operation::Delete, DataType::Candidate);
            engine.delete_mo(&req, record, store)?;
        }
        ScriptStep::Rename { datatype, record } => {
            let req = IpcReqRespHeader::new(Operation::Rename, *datatype);
            engine.rename_mo(&req, record, store)?;
        }
        ScriptStep::Read {
            datatype,
            record,
            detail,
        } => {
            let mut req = IpcReqRespHeader::new(Operation::Read, *datatype);
            if *detail {
                req = req.with_option1(Option1::Detail);
            }
            return Ok(StepOutput::records(engine.read_mo(&req, record, &*store)?));
        }
        ScriptStep::ReadSibling {
            datatype,
            record,
            mode,
            rep_count,
        } => {
            let op = match mode {
                SiblingMode::Next => Operation::ReadSibling,
                SiblingMode::Begin => Operation::ReadSiblingBegin,
                SiblingMode::Count => Operation::ReadSiblingCount,
            };
            let req = IpcReqRespHeader::new(op, *datatype).with_rep_count(*rep_count);
            if *mode == SiblingMode::Count {
                let req = req.with_option1(Option1::Count);
                return Ok(StepOutput {
                    count: Some(engine.read_sibling_count(&req, record, &*store)?),
                    ..StepOutput::default()
                });
            }
            return Ok(StepOutput::records(engine.read_sibling_mo(&req, record, &*store)?));
        }
        ScriptStep::SetInterface {
            datatype,
            interface,
            kind,
        } => engine.set_vlink_portmap_configuration(store, *datatype, interface, *kind)?,
        ScriptStep::Seed {
            datatype,
            table,
            record,
        } => {
            let matching = if table.is_per_controller() {
                MatchOpts::ctrlr_domain()
            } else {
                MatchOpts::none()
            };
            store
                .update_config_db(record, *datatype, UpdateOp::Create, &matching, *table)
                .map_err(UpllError::from)?;
        }
        ScriptStep::Commit {
            session_id,
            config_id,
        } => {
            let statuses = engine.commit(store, *session_id, *config_id).await?;
            let controllers: BTreeMap<_, _> = statuses
                .iter()
                .map(|s| (s.ctrlr_id.clone(), result_code(&s.result)))
                .collect();
            if let Some(err) = statuses.into_iter().find_map(|s| s.result.err()) {
                warn!(error = %err, "commit finished with controller failures");
            }
            return Ok(StepOutput {
                controllers,
                ..StepOutput::default()
            });
        }
        ScriptStep::Abort => engine.copy_running_to_candidate(store)?,
        ScriptStep::Audit { ctrlr } => {
            let mut ctx = AuditContext::new(ctrlr.clone());
            let audited = engine.audit_all(store, &mut ctx);
            let status = ctx.commit_status();
            engine.audit_commit_ctrlr_status(store, &status)?;
            audited?;
            let mut controllers = BTreeMap::new();
            controllers.insert(ctrlr.clone(), result_code(&status.result));
            return Ok(StepOutput {
                records: ctx.failed_records,
                controllers,
                ..StepOutput::default()
            });
        }
        ScriptStep::Import { ctrlr, import_type } => {
            engine.merge_import_all(store, ctrlr, *import_type)?
        }
        ScriptStep::SaveStartup => engine.copy_running_to_startup(store)?,
        ScriptStep::ClearStartup => engine.clear_startup(store)?,
        ScriptStep::LoadStartup => engine.load_startup(store)?,
    }
    Ok(StepOutput::default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::driver::LoopbackDriver;
    use crate::notify::BufferedNotifier;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;
    use upll_dal::InMemoryStore;

    const SCRIPT: &str = r#"
steps:
  - step: create
    record: { key: { key_type: VTN, vtn_name: vtn1 } }
  - step: create
    record: { key: { key_type: VTN, vtn_name: vtn1 } }
  - step: commit
  - step: read
    datatype: running
    record: { key: { key_type: VTN, vtn_name: vtn1 } }
  - step: delete
    record: { key: { key_type: VTN, vtn_name: nope } }
"#;

    fn engine() -> MoMgrImpl {
        MoMgrImpl::new(
            EngineConfig::default(),
            Arc::new(LoopbackDriver),
            Arc::new(BufferedNotifier::new()),
        )
    }

    #[test]
    fn test_parse_yaml_script() {
        let script: Script = serde_yaml::from_str(SCRIPT).unwrap();
        let names: Vec<_> = script.steps.iter().map(ScriptStep::name).collect();
        assert_eq!(names, vec!["create", "create", "commit", "read", "delete"]);
        assert!(!script.stop_on_error);
    }

    #[tokio::test]
    async fn test_run_reports_result_codes() {
        let script: Script = serde_yaml::from_str(SCRIPT).unwrap();
        let mut store = InMemoryStore::new();
        let outcomes = run_script(&engine(), &mut store, &script).await;

        let codes: Vec<_> = outcomes.iter().map(|o| o.code).collect();
        assert_eq!(
            codes,
            vec![
                "UPLL_RC_SUCCESS",
                "UPLL_RC_ERR_INSTANCE_EXISTS",
                "UPLL_RC_SUCCESS",
                "UPLL_RC_SUCCESS",
                "UPLL_RC_ERR_NO_SUCH_INSTANCE",
            ]
        );
        assert_eq!(outcomes[3].records.len(), 1);
        assert_eq!(store.open_cursor_count(), 0);
    }

    #[tokio::test]
    async fn test_stop_on_error() {
        let mut script: Script = serde_yaml::from_str(SCRIPT).unwrap();
        script.stop_on_error = true;
        let mut store = InMemoryStore::new();
        let outcomes = run_script(&engine(), &mut store, &script).await;
        assert_eq!(outcomes.len(), 2);
        assert!(!outcomes[1].is_success());
    }
}
