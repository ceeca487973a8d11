//! Test fixtures for common engine scenarios
//!
//! Provides a scriptable driver, capability tables and record builders for
//! the built-in key types, plus a [`TestBed`] bundling an engine with its
//! store and collaborators.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};
use upll_dal::InMemoryStore;
use upll_momgr::driver::DriverTransportError;
use upll_momgr::{
    BufferedNotifier, CtrlrCommitStatus, DriverClient, DriverRequest, DriverResponse,
    DriverResultCode, EngineConfig, IpcReqRespHeader, MoMgrImpl, StaticCapabilityTable,
    UpllResult,
};
use upll_types::{ConfigKeyVal, DataType, KeyType, Operation};

#[derive(Debug, Default)]
struct DriverScript {
    reject: HashSet<String>,
    unreachable: HashSet<String>,
    disconnected: HashSet<String>,
    read_answer: Option<ConfigKeyVal>,
}

/// Driver that records every request and answers from a script.
///
/// Requests are matched on the controller-side key as displayed, for
/// example `VTN:vtn1` or `VROUTER:vtn1/vrt1`.
#[derive(Debug, Default)]
pub struct RecordingDriver {
    seen: Mutex<Vec<DriverRequest>>,
    script: Mutex<DriverScript>,
}

impl RecordingDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answers requests for `key` with a FAILURE result code.
    pub fn reject_key(&self, key: impl Into<String>) {
        self.script().reject.insert(key.into());
    }

    /// Fails every request to `ctrlr` at the transport.
    pub fn lose_ctrlr(&self, ctrlr: impl Into<String>) {
        self.script().unreachable.insert(ctrlr.into());
    }

    /// Answers every request to `ctrlr` with CTR_DISCONNECTED.
    pub fn disconnect_ctrlr(&self, ctrlr: impl Into<String>) {
        self.script().disconnected.insert(ctrlr.into());
    }

    /// Payload returned to READ requests.
    pub fn answer_reads_with(&self, ckv: ConfigKeyVal) {
        self.script().read_answer = Some(ckv);
    }

    /// Forgets the script; recorded requests are kept.
    pub fn heal(&self) {
        *self.script() = DriverScript::default();
    }

    pub fn requests(&self) -> Vec<DriverRequest> {
        self.seen.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Recorded requests as `OP KEY@ctrlr` lines, oldest first.
    pub fn trace(&self) -> Vec<String> {
        self.requests()
            .iter()
            .map(|r| format!("{} {}@{}", r.operation, r.ckv.key, r.ctrlr_id))
            .collect()
    }

    /// Takes the recorded requests.
    pub fn take(&self) -> Vec<DriverRequest> {
        std::mem::take(&mut *self.seen.lock().unwrap_or_else(PoisonError::into_inner))
    }

    fn script(&self) -> std::sync::MutexGuard<'_, DriverScript> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl DriverClient for RecordingDriver {
    fn send_req_to_driver(
        &self,
        request: &DriverRequest,
        _synchronous: bool,
    ) -> Result<DriverResponse, DriverTransportError> {
        self.seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request.clone());

        let script = self.script();
        if script.unreachable.contains(&request.ctrlr_id) {
            return Err(DriverTransportError {
                ctrlr_id: request.ctrlr_id.clone(),
                message: "connection refused".to_string(),
            });
        }
        if script.disconnected.contains(&request.ctrlr_id) {
            return Ok(DriverResponse::failure(DriverResultCode::CtrDisconnected));
        }
        if script.reject.contains(&request.ckv.key.to_string()) {
            return Ok(DriverResponse::failure(DriverResultCode::Failure));
        }
        if request.operation == Operation::Read {
            return Ok(DriverResponse::success(script.read_answer.clone()));
        }
        Ok(DriverResponse::success(None))
    }
}

/// Capability table granting every key type on each controller.
pub fn full_capabilities(ctrlrs: &[&str]) -> StaticCapabilityTable {
    ctrlrs.iter().fold(StaticCapabilityTable::new(), |table, ctrlr| {
        KeyType::ALL
            .iter()
            .fold(table, |table, kt| table.allow(*ctrlr, *kt))
    })
}

/// Installs a test-writer subscriber once per process.
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_target(false)
        .with_level(true)
        .try_init();
}

/// Record builders for the built-in key types
pub mod records {
    use upll_types::{
        Attr, ConfigKeyVal, ConfigVal, FlowFilterAction, FlowListIpType, KeyFlowList, KeyVrt,
        KeyVrtIf, KeyVrtIfFlowFilter, KeyVrtIfFlowFilterEntry, KeyVtn, KeyVtnFlowFilter,
        KeyVtnPolicingMap, ValFlowFilterEntry, ValFlowList, ValPolicingMap, ValRename, ValVrt,
        ValVrtIf, ValVtn,
    };

    /// Default domain vrouters are placed on.
    pub const DOMAIN: &str = "dom1";

    pub fn vtn(name: &str) -> ConfigKeyVal {
        ConfigKeyVal::with_val(KeyVtn::new(name), ConfigVal::Vtn(ValVtn::default()))
    }

    pub fn vtn_described(name: &str, description: &str) -> ConfigKeyVal {
        ConfigKeyVal::with_val(
            KeyVtn::new(name),
            ConfigVal::Vtn(ValVtn {
                description: Attr::Valid(description.to_string()),
            }),
        )
    }

    /// A vrouter on `ctrlr` in [`DOMAIN`].
    pub fn vrt(vtn: &str, name: &str, ctrlr: &str) -> ConfigKeyVal {
        vrt_in(vtn, name, ctrlr, DOMAIN)
    }

    pub fn vrt_in(vtn: &str, name: &str, ctrlr: &str, domain: &str) -> ConfigKeyVal {
        ConfigKeyVal::with_val(
            KeyVrt::new(vtn, name),
            ConfigVal::Vrt(ValVrt {
                controller_id: Attr::Valid(ctrlr.to_string()),
                domain_id: Attr::Valid(domain.to_string()),
                description: Attr::Invalid,
            }),
        )
    }

    pub fn vrt_if_key(vtn: &str, vrt: &str, if_name: &str) -> KeyVrtIf {
        KeyVrtIf::new(vtn, vrt, if_name)
    }

    pub fn vrt_if(vtn: &str, vrt: &str, if_name: &str) -> ConfigKeyVal {
        ConfigKeyVal::with_val(
            vrt_if_key(vtn, vrt, if_name),
            ConfigVal::VrtIf(ValVrtIf {
                description: Attr::Invalid,
                admin_status: Attr::Valid(true),
            }),
        )
    }

    pub fn vrt_if_flowfilter_key(
        vtn: &str,
        vrt: &str,
        if_name: &str,
        direction: u8,
    ) -> KeyVrtIfFlowFilter {
        KeyVrtIfFlowFilter::new(vrt_if_key(vtn, vrt, if_name), direction)
    }

    pub fn vrt_if_flowfilter(vtn: &str, vrt: &str, if_name: &str, direction: u8) -> ConfigKeyVal {
        ConfigKeyVal::new(vrt_if_flowfilter_key(vtn, vrt, if_name, direction))
    }

    /// A pass entry, optionally matching a flow list.
    pub fn flowfilter_entry(
        ff: KeyVrtIfFlowFilter,
        sequence_num: u16,
        flowlist: Option<&str>,
    ) -> ConfigKeyVal {
        ConfigKeyVal::with_val(
            KeyVrtIfFlowFilterEntry::new(ff, sequence_num),
            ConfigVal::FlowFilterEntry(ValFlowFilterEntry {
                flowlist_name: flowlist.map_or(Attr::Invalid, |f| Attr::Valid(f.to_string())),
                action: Attr::Valid(FlowFilterAction::Pass),
                ..ValFlowFilterEntry::default()
            }),
        )
    }

    pub fn flowlist(name: &str) -> ConfigKeyVal {
        ConfigKeyVal::with_val(
            KeyFlowList::new(name),
            ConfigVal::FlowList(ValFlowList {
                ip_type: Attr::Valid(FlowListIpType::Ip),
                ref_count: 0,
            }),
        )
    }

    pub fn vtn_flowfilter(vtn: &str, direction: u8) -> ConfigKeyVal {
        ConfigKeyVal::new(KeyVtnFlowFilter::new(vtn, direction))
    }

    pub fn vtn_policingmap(vtn: &str, policer: &str) -> ConfigKeyVal {
        ConfigKeyVal::with_val(
            KeyVtnPolicingMap::new(vtn),
            ConfigVal::PolicingMap(ValPolicingMap {
                policer_name: Attr::Valid(policer.to_string()),
            }),
        )
    }

    /// Rename request moving VTN `from` to `to`.
    pub fn rename_vtn(from: &str, to: &str) -> ConfigKeyVal {
        ConfigKeyVal::with_val(
            KeyVtn::new(from),
            ConfigVal::Rename(ValRename {
                vtn_name: Attr::Valid(to.to_string()),
                ..ValRename::default()
            }),
        )
    }

    /// Rename request moving vrouter `from` of `vtn` to `to`.
    pub fn rename_vrt(vtn: &str, from: &str, to: &str) -> ConfigKeyVal {
        ConfigKeyVal::with_val(
            KeyVrt::new(vtn, from),
            ConfigVal::Rename(ValRename {
                vnode_name: Attr::Valid(to.to_string()),
                ..ValRename::default()
            }),
        )
    }
}

/// An engine wired to a [`RecordingDriver`], a [`BufferedNotifier`] and an
/// empty [`InMemoryStore`].
pub struct TestBed {
    pub engine: MoMgrImpl,
    pub store: InMemoryStore,
    pub driver: Arc<RecordingDriver>,
    pub notifier: Arc<BufferedNotifier>,
}

impl TestBed {
    /// A test bed whose controllers support every key type.
    pub fn new(ctrlrs: &[&str]) -> Self {
        Self::with_config(
            EngineConfig {
                capabilities: Some(full_capabilities(ctrlrs)),
                ..EngineConfig::default()
            },
        )
    }

    pub fn with_config(config: EngineConfig) -> Self {
        init_test_logging();
        let driver = Arc::new(RecordingDriver::new());
        let notifier = Arc::new(BufferedNotifier::new());
        let engine = MoMgrImpl::new(config, driver.clone(), notifier.clone());
        Self {
            engine,
            store: InMemoryStore::new(),
            driver,
            notifier,
        }
    }

    pub fn create(&mut self, ckv: &ConfigKeyVal) -> UpllResult<()> {
        self.create_in(DataType::Candidate, ckv)
    }

    pub fn create_in(&mut self, dt: DataType, ckv: &ConfigKeyVal) -> UpllResult<()> {
        let req = IpcReqRespHeader::new(Operation::Create, dt);
        self.engine.create_mo(&req, ckv, &mut self.store)
    }

    pub fn update(&mut self, ckv: &ConfigKeyVal) -> UpllResult<()> {
        let req = IpcReqRespHeader::new(Operation::Update, DataType::Candidate);
        self.engine.update_mo(&req, ckv, &mut self.store)
    }

    pub fn delete(&mut self, ckv: &ConfigKeyVal) -> UpllResult<()> {
        let req = IpcReqRespHeader::new(Operation::Delete, DataType::Candidate);
        self.engine.delete_mo(&req, ckv, &mut self.store)
    }

    pub fn rename(&mut self, ckv: &ConfigKeyVal) -> UpllResult<()> {
        let req = IpcReqRespHeader::new(Operation::Rename, DataType::Candidate);
        self.engine.rename_mo(&req, ckv, &mut self.store)
    }

    pub fn read(&self, dt: DataType, ckv: &ConfigKeyVal) -> UpllResult<Vec<ConfigKeyVal>> {
        let req = IpcReqRespHeader::new(Operation::Read, dt);
        self.engine.read_mo(&req, ckv, &self.store)
    }

    /// Commits CANDIDATE into RUNNING.
    pub async fn commit(&mut self) -> UpllResult<Vec<CtrlrCommitStatus>> {
        self.engine.commit(&mut self.store, 1, 1).await
    }

    /// VTN `vtn` with one vrouter `vrt` on `ctrlr` and one interface `if1`.
    pub fn populate_vrouter(&mut self, vtn: &str, vrt: &str, ctrlr: &str) -> UpllResult<()> {
        if self.read(DataType::Candidate, &records::vtn(vtn)).is_err() {
            self.create(&records::vtn(vtn))?;
        }
        self.create(&records::vrt(vtn, vrt, ctrlr))?;
        self.create(&records::vrt_if(vtn, vrt, "if1"))
    }
}
