//! Result codes of the managed-object layer.
//!
//! Every engine operation returns [`UpllResult`]. Two of the variants,
//! [`UpllError::NoSuchInstance`] and [`UpllError::InstanceExists`], are
//! ordinary outcomes of existence checks; [`is_exhausted`] and [`is_absent`]
//! name the places where "nothing there" is folded into success.

use crate::driver::DriverResultCode;
use thiserror::Error;
use upll_dal::DalError;
use upll_types::ParseError;

/// Result type alias for engine operations.
pub type UpllResult<T> = Result<T, UpllError>;

/// Errors surfaced by the engine and its key-type managers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UpllError {
    /// Malformed request: missing key, wrong key type, wrong operation.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// A field is out of its declared range.
    #[error("configuration syntax error: {0}")]
    CfgSyntax(String),

    #[error("option1 not allowed: {0}")]
    InvalidOption1(String),

    #[error("option2 not allowed: {0}")]
    InvalidOption2(String),

    #[error("operation not allowed for datatype {0}")]
    NotAllowedForThisDt(String),

    #[error("operation not allowed for key type {0}")]
    NotAllowedForThisKt(String),

    /// Dangling or still-held reference.
    #[error("semantic error: {0}")]
    CfgSemantic(String),

    #[error("parent does not exist: {0}")]
    ParentDoesNotExist(String),

    #[error("instance already exists: {0}")]
    InstanceExists(String),

    #[error("no such instance")]
    NoSuchInstance,

    #[error("not supported by controller {ctrlr}: {reason}")]
    NotSupportedByCtrlr { ctrlr: String, reason: String },

    #[error("instance limit reached on controller {0}")]
    ExceedsResourceLimit(String),

    #[error("merge conflict: {0}")]
    MergeConflict(String),

    /// Store connection lost or access refused.
    #[error("database access error: {0}")]
    DbAccess(String),

    #[error("generic error: {0}")]
    Generic(String),

    /// The driver request could not be delivered.
    #[error("driver transport to {ctrlr} failed: {message}")]
    DriverTransport { ctrlr: String, message: String },

    /// The driver answered with a failure code.
    #[error("driver on {ctrlr} returned {code}")]
    DriverResult {
        ctrlr: String,
        code: DriverResultCode,
    },

    #[error("controller {0} is disconnected")]
    CtrDisconnected(String),
}

impl UpllError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    pub fn syntax(message: impl Into<String>) -> Self {
        Self::CfgSyntax(message.into())
    }

    pub fn semantic(message: impl Into<String>) -> Self {
        Self::CfgSemantic(message.into())
    }

    pub fn generic(message: impl Into<String>) -> Self {
        Self::Generic(message.into())
    }

    pub fn not_supported(ctrlr: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::NotSupportedByCtrlr {
            ctrlr: ctrlr.into(),
            reason: reason.into(),
        }
    }

    /// Stable result-code name reported to the request dispatcher.
    pub fn code(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "UPLL_RC_ERR_BAD_REQUEST",
            Self::CfgSyntax(_) => "UPLL_RC_ERR_CFG_SYNTAX",
            Self::InvalidOption1(_) => "UPLL_RC_ERR_INVALID_OPTION1",
            Self::InvalidOption2(_) => "UPLL_RC_ERR_INVALID_OPTION2",
            Self::NotAllowedForThisDt(_) => "UPLL_RC_ERR_NOT_ALLOWED_FOR_THIS_DT",
            Self::NotAllowedForThisKt(_) => "UPLL_RC_ERR_NOT_ALLOWED_FOR_THIS_KT",
            Self::CfgSemantic(_) => "UPLL_RC_ERR_CFG_SEMANTIC",
            Self::ParentDoesNotExist(_) => "UPLL_RC_ERR_PARENT_DOES_NOT_EXIST",
            Self::InstanceExists(_) => "UPLL_RC_ERR_INSTANCE_EXISTS",
            Self::NoSuchInstance => "UPLL_RC_ERR_NO_SUCH_INSTANCE",
            Self::NotSupportedByCtrlr { .. } => "UPLL_RC_ERR_NOT_SUPPORTED_BY_CTRLR",
            Self::ExceedsResourceLimit(_) => "UPLL_RC_ERR_EXCEEDS_RESOURCE_LIMIT",
            Self::MergeConflict(_) => "UPLL_RC_ERR_MERGE_CONFLICT",
            Self::DbAccess(_) => "UPLL_RC_ERR_DB_ACCESS",
            Self::Generic(_) => "UPLL_RC_ERR_GENERIC",
            Self::DriverTransport { .. } => "UPLL_RC_ERR_DRIVER_TRANSPORT",
            Self::DriverResult { .. } => "UPLL_RC_ERR_DRIVER_RESULT",
            Self::CtrDisconnected(_) => "UPLL_RC_ERR_CTR_DISCONNECTED",
        }
    }
}

/// Result-code name of an outcome, `UPLL_RC_SUCCESS` for `Ok`.
pub fn result_code<T>(result: &UpllResult<T>) -> &'static str {
    match result {
        Ok(_) => "UPLL_RC_SUCCESS",
        Err(e) => e.code(),
    }
}

/// True when a diff cursor ran out of rows.
///
/// Applied at the end of a cursor loop only.
pub fn is_exhausted(err: &UpllError) -> bool {
    matches!(err, UpllError::NoSuchInstance)
}

/// True when a pattern found nothing.
///
/// Applied at existence checks and at the per-child step of a delete
/// cascade only.
pub fn is_absent(err: &UpllError) -> bool {
    matches!(err, UpllError::NoSuchInstance)
}

impl From<DalError> for UpllError {
    fn from(err: DalError) -> Self {
        match err {
            DalError::RecordNotFound => Self::NoSuchInstance,
            DalError::RecordExists => Self::InstanceExists("record".to_string()),
            DalError::ConnectionLost(m) => Self::DbAccess(m),
            DalError::General(m) => Self::Generic(m),
            DalError::CursorClosed(id) => Self::Generic(format!("cursor {} is not open", id)),
        }
    }
}

impl From<ParseError> for UpllError {
    fn from(err: ParseError) -> Self {
        Self::CfgSyntax(err.to_string())
    }
}
