//! Southbound driver request contract.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use tracing::debug;
use upll_types::{ConfigKeyVal, DataType, Operation, Option1, Option2};

/// Result code carried inside a delivered driver response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriverResultCode {
    Success,
    Failure,
    NotSupported,
    CtrDisconnected,
}

impl fmt::Display for DriverResultCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DriverResultCode::Success => "SUCCESS",
            DriverResultCode::Failure => "FAILURE",
            DriverResultCode::NotSupported => "NOT_SUPPORTED",
            DriverResultCode::CtrDisconnected => "CTR_DISCONNECTED",
        };
        f.write_str(s)
    }
}

/// One record sent to the driver of one controller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriverRequest {
    pub ctrlr_id: String,
    pub domain_id: String,
    pub service_name: String,
    pub service_version: u32,
    pub operation: Operation,
    pub datatype: DataType,
    pub option1: Option1,
    pub option2: Option2,
    pub ckv: ConfigKeyVal,
}

/// A delivered driver response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriverResponse {
    pub result_code: DriverResultCode,
    pub ckv: Option<ConfigKeyVal>,
}

impl DriverResponse {
    pub fn success(ckv: Option<ConfigKeyVal>) -> Self {
        Self {
            result_code: DriverResultCode::Success,
            ckv,
        }
    }

    pub fn failure(code: DriverResultCode) -> Self {
        Self {
            result_code: code,
            ckv: None,
        }
    }
}

/// The request never reached the driver.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("transport to {ctrlr_id} failed: {message}")]
pub struct DriverTransportError {
    pub ctrlr_id: String,
    pub message: String,
}

/// RPC client delivering one record to one controller's driver.
///
/// A transport failure and a delivered failure response are reported
/// separately: the first as `Err`, the second as `Ok` with a non-success
/// [`DriverResultCode`].
pub trait DriverClient: Send + Sync {
    fn send_req_to_driver(
        &self,
        request: &DriverRequest,
        synchronous: bool,
    ) -> Result<DriverResponse, DriverTransportError>;
}

/// Driver that accepts every request and answers reads with no payload.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoopbackDriver;

impl DriverClient for LoopbackDriver {
    fn send_req_to_driver(
        &self,
        request: &DriverRequest,
        synchronous: bool,
    ) -> Result<DriverResponse, DriverTransportError> {
        debug!(
            ctrlr = %request.ctrlr_id,
            domain = %request.domain_id,
            op = %request.operation,
            key = %request.ckv.key,
            synchronous,
            "loopback driver request"
        );
        Ok(DriverResponse::success(None))
    }
}
