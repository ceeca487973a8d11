//! Driver-bound commit queue.
//!
//! The transaction update phase queues one [`TxRequest`] per diff row. The
//! [`TxDispatcher`] then delivers the queue with one serial lane per
//! controller, lanes running concurrently up to the configured limit, and
//! reports a [`CtrlrCommitStatus`] per controller.

use crate::config::EngineConfig;
use crate::driver::{DriverClient, DriverRequest, DriverResultCode};
use crate::{UpllError, UpllResult};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};
use upll_types::{ConfigKeyVal, ConfigStatus, DataType, KeyType, Operation, Option1, Option2};

/// One record queued for a controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxRequest {
    /// Controller the record is delivered to.
    pub ctrlr_id: String,
    /// Domain of the record on that controller.
    pub domain_id: String,
    /// Wire operation, after any gate reclassification.
    pub op: Operation,
    /// Key type of the diff row.
    pub key_type: KeyType,
    /// Payload in controller names.
    pub driver_ckv: ConfigKeyVal,
    /// The diff row in UNC names, reported back on failure.
    pub unc_ckv: ConfigKeyVal,
}

/// Queue filled by the transaction update phase.
#[derive(Debug, Default)]
pub struct TxUpdateUtil {
    queue: Vec<TxRequest>,
    session_id: u32,
    config_id: u32,
}

impl TxUpdateUtil {
    /// Creates an empty queue for one commit session.
    pub fn new(session_id: u32, config_id: u32) -> Self {
        Self {
            queue: Vec::new(),
            session_id,
            config_id,
        }
    }

    /// Appends a record; lanes keep enqueue order.
    pub fn enqueue(&mut self, request: TxRequest) {
        self.queue.push(request);
    }

    /// Returns the number of queued records.
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Returns true if nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Returns the queued records in enqueue order.
    pub fn requests(&self) -> &[TxRequest] {
        &self.queue
    }

    /// Returns the client session the queue belongs to.
    pub fn session_id(&self) -> u32 {
        self.session_id
    }

    /// Returns the configuration id of the commit.
    pub fn config_id(&self) -> u32 {
        self.config_id
    }

    /// Controllers with at least one queued record.
    pub fn affected_ctrlrs(&self) -> BTreeSet<String> {
        self.queue.iter().map(|r| r.ctrlr_id.clone()).collect()
    }

    /// Splits the queue into per-controller lanes, each keeping queue order.
    pub fn into_lanes(self) -> BTreeMap<String, Vec<TxRequest>> {
        let mut lanes: BTreeMap<String, Vec<TxRequest>> = BTreeMap::new();
        for request in self.queue {
            lanes.entry(request.ctrlr_id.clone()).or_default().push(request);
        }
        lanes
    }
}

/// Outcome of delivering one controller's lane.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CtrlrCommitStatus {
    /// Controller the lane was delivered to.
    pub ctrlr_id: String,
    /// First failure of the lane, if any.
    pub result: UpllResult<()>,
    /// Records the driver rejected, in UNC names.
    pub err_records: Vec<ConfigKeyVal>,
}

impl CtrlrCommitStatus {
    /// Status of a controller that accepted every record.
    pub fn ok(ctrlr_id: impl Into<String>) -> Self {
        Self {
            ctrlr_id: ctrlr_id.into(),
            result: Ok(()),
            err_records: Vec::new(),
        }
    }

    /// Returns true if the driver rejected `ckv`.
    pub fn is_failed_record(&self, ckv: &ConfigKeyVal) -> bool {
        self.err_records.iter().any(|r| r.key == ckv.key)
    }

    /// Status a record of this controller takes in RUNNING.
    ///
    /// Rejected records are `INVALID`. The rest of a lane that stopped on a
    /// disconnect are `NOT_APPLIED`.
    pub fn record_status(&self, ckv: &ConfigKeyVal) -> ConfigStatus {
        if self.is_failed_record(ckv) {
            return ConfigStatus::Invalid;
        }
        match &self.result {
            Ok(()) | Err(UpllError::DriverResult { .. }) => ConfigStatus::Applied,
            Err(_) => ConfigStatus::NotApplied,
        }
    }
}

/// Delivers a [`TxUpdateUtil`] queue to the controllers.
pub struct TxDispatcher {
    driver: Arc<dyn DriverClient>,
    service_name: String,
    service_version: u32,
    concurrency: usize,
}

impl TxDispatcher {
    pub fn new(driver: Arc<dyn DriverClient>, config: &EngineConfig) -> Self {
        Self {
            driver,
            service_name: config.driver_service_name.clone(),
            service_version: config.driver_service_version,
            concurrency: config.dispatch_concurrency.max(1),
        }
    }

    /// Delivers every lane and returns the per-controller outcomes sorted
    /// by controller id.
    pub async fn dispatch(&self, util: TxUpdateUtil) -> Vec<CtrlrCommitStatus> {
        let session_id = util.session_id();
        let config_id = util.config_id();
        let lanes = util.into_lanes();
        info!(
            session_id,
            config_id,
            controllers = lanes.len(),
            "dispatching commit"
        );

        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut set = JoinSet::new();
        for (ctrlr, lane) in lanes {
            let driver = Arc::clone(&self.driver);
            let semaphore = Arc::clone(&semaphore);
            let service_name = self.service_name.clone();
            let service_version = self.service_version;
            set.spawn(async move {
                // The semaphore is never closed.
                let _permit = semaphore.acquire_owned().await.ok();
                let lane_ctrlr = ctrlr.clone();
                let joined = tokio::task::spawn_blocking(move || {
                    run_lane(driver.as_ref(), &service_name, service_version, &lane_ctrlr, lane)
                })
                .await;
                match joined {
                    Ok(status) => status,
                    Err(e) => CtrlrCommitStatus {
                        ctrlr_id: ctrlr,
                        result: Err(UpllError::generic(format!("lane task failed: {}", e))),
                        err_records: Vec::new(),
                    },
                }
            });
        }

        let mut results = Vec::new();
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok(status) => results.push(status),
                Err(e) => error!(error = %e, "dispatch task panicked"),
            }
        }
        results.sort_by(|a, b| a.ctrlr_id.cmp(&b.ctrlr_id));
        results
    }
}

/// Delivers one controller's records in order.
///
/// A rejected record is remembered and the lane goes on. A lost controller
/// stops the lane.
fn run_lane(
    driver: &dyn DriverClient,
    service_name: &str,
    service_version: u32,
    ctrlr: &str,
    lane: Vec<TxRequest>,
) -> CtrlrCommitStatus {
    let mut status = CtrlrCommitStatus::ok(ctrlr);
    let total = lane.len();
    for request in lane {
        let wire = DriverRequest {
            ctrlr_id: request.ctrlr_id.clone(),
            domain_id: request.domain_id.clone(),
            service_name: service_name.to_string(),
            service_version,
            operation: request.op,
            datatype: DataType::Candidate,
            option1: Option1::Normal,
            option2: Option2::None,
            ckv: request.driver_ckv,
        };
        match driver.send_req_to_driver(&wire, false) {
            Err(e) => {
                warn!(ctrlr = %ctrlr, error = %e, "driver unreachable, lane stopped");
                status.result = Err(UpllError::CtrDisconnected(ctrlr.to_string()));
                break;
            }
            Ok(response) => match response.result_code {
                DriverResultCode::Success => {}
                DriverResultCode::CtrDisconnected => {
                    warn!(ctrlr = %ctrlr, "controller disconnected, lane stopped");
                    status.result = Err(UpllError::CtrDisconnected(ctrlr.to_string()));
                    break;
                }
                code => {
                    warn!(
                        ctrlr = %ctrlr,
                        key = %request.unc_ckv.key,
                        code = %code,
                        "driver rejected record"
                    );
                    status.err_records.push(request.unc_ckv);
                    if status.result.is_ok() {
                        status.result = Err(UpllError::DriverResult {
                            ctrlr: ctrlr.to_string(),
                            code,
                        });
                    }
                }
            },
        }
    }
    debug!(
        ctrlr = %ctrlr,
        records = total,
        rejected = status.err_records.len(),
        "lane finished"
    );
    status
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::{DriverResponse, DriverTransportError};
    use pretty_assertions::assert_eq;
    use std::sync::Mutex;
    use upll_types::KeyVtn;

    /// Rejects requests whose key names are listed, loses the listed
    /// controllers and records everything it sees.
    #[derive(Default)]
    struct ScriptedDriver {
        reject: Vec<String>,
        unreachable: Vec<String>,
        seen: Mutex<Vec<(String, String)>>,
    }

    impl DriverClient for ScriptedDriver {
        fn send_req_to_driver(
            &self,
            request: &DriverRequest,
            _synchronous: bool,
        ) -> Result<DriverResponse, DriverTransportError> {
            self.seen
                .lock()
                .unwrap()
                .push((request.ctrlr_id.clone(), request.ckv.key.to_string()));
            if self.unreachable.contains(&request.ctrlr_id) {
                return Err(DriverTransportError {
                    ctrlr_id: request.ctrlr_id.clone(),
                    message: "connection refused".into(),
                });
            }
            if self.reject.contains(&request.ckv.key.to_string()) {
                return Ok(DriverResponse::failure(DriverResultCode::Failure));
            }
            Ok(DriverResponse::success(None))
        }
    }

    fn request(ctrlr: &str, vtn: &str) -> TxRequest {
        let ckv = ConfigKeyVal::new(KeyVtn::new(vtn)).on_ctrlr(ctrlr, "d1");
        TxRequest {
            ctrlr_id: ctrlr.to_string(),
            domain_id: "d1".to_string(),
            op: Operation::Create,
            key_type: KeyType::Vtn,
            driver_ckv: ckv.clone(),
            unc_ckv: ckv,
        }
    }

    #[test]
    fn test_lanes_keep_order() {
        let mut util = TxUpdateUtil::new(1, 2);
        util.enqueue(request("c2", "a"));
        util.enqueue(request("c1", "b"));
        util.enqueue(request("c2", "c"));
        assert_eq!(util.len(), 3);
        assert_eq!(
            util.affected_ctrlrs().into_iter().collect::<Vec<_>>(),
            vec!["c1", "c2"]
        );
        let lanes = util.into_lanes();
        let c2: Vec<_> = lanes["c2"].iter().map(|r| r.driver_ckv.key.to_string()).collect();
        assert_eq!(c2, vec!["VTN:a", "VTN:c"]);
    }

    #[tokio::test]
    async fn test_dispatch_isolates_rejections() {
        let driver = Arc::new(ScriptedDriver {
            reject: vec!["VTN:bad".into()],
            ..ScriptedDriver::default()
        });
        let dispatcher = TxDispatcher::new(driver.clone(), &EngineConfig::default());
        let mut util = TxUpdateUtil::new(1, 1);
        util.enqueue(request("c1", "bad"));
        util.enqueue(request("c1", "good"));
        util.enqueue(request("c2", "other"));

        let statuses = dispatcher.dispatch(util).await;
        assert_eq!(statuses.len(), 2);
        assert_eq!(statuses[0].ctrlr_id, "c1");
        assert_eq!(statuses[0].err_records.len(), 1);
        assert!(matches!(statuses[0].result, Err(UpllError::DriverResult { .. })));
        assert_eq!(
            statuses[0].record_status(&ConfigKeyVal::new(KeyVtn::new("good"))),
            ConfigStatus::Applied
        );
        assert_eq!(
            statuses[0].record_status(&ConfigKeyVal::new(KeyVtn::new("bad"))),
            ConfigStatus::Invalid
        );
        assert_eq!(statuses[1].result, Ok(()));
        assert_eq!(driver.seen.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_unreachable_controller_stops_lane() {
        let driver = Arc::new(ScriptedDriver {
            unreachable: vec!["c1".into()],
            ..ScriptedDriver::default()
        });
        let dispatcher = TxDispatcher::new(driver.clone(), &EngineConfig::default());
        let mut util = TxUpdateUtil::new(1, 1);
        util.enqueue(request("c1", "a"));
        util.enqueue(request("c1", "b"));

        let statuses = dispatcher.dispatch(util).await;
        assert_eq!(
            statuses[0].result,
            Err(UpllError::CtrDisconnected("c1".into()))
        );
        assert_eq!(
            statuses[0].record_status(&ConfigKeyVal::new(KeyVtn::new("b"))),
            ConfigStatus::NotApplied
        );
        assert_eq!(driver.seen.lock().unwrap().len(), 1);
    }
}
