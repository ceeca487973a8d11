//! Northbound request header and its generic validation.

use crate::{UpllError, UpllResult};
use serde::{Deserialize, Serialize};
use upll_types::{ConfigKeyVal, DataType, KeyType, Operation, Option1, Option2};

/// Header accompanying every request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IpcReqRespHeader {
    /// Client session that issued the request.
    #[serde(default)]
    pub clnt_sess_id: u32,
    /// Configuration id held by the session.
    #[serde(default)]
    pub config_id: u32,
    /// Requested operation.
    pub operation: Operation,
    /// Plane the request targets.
    pub datatype: DataType,
    /// Primary option: normal, detailed or count.
    #[serde(default)]
    pub option1: Option1,
    /// Secondary option; only `None` is accepted.
    #[serde(default)]
    pub option2: Option2,
    /// Maximum number of records a sibling read may return; zero means the
    /// engine default.
    #[serde(default)]
    pub rep_count: u32,
}

impl IpcReqRespHeader {
    /// Creates a header with no session and default options.
    pub fn new(operation: Operation, datatype: DataType) -> Self {
        Self {
            clnt_sess_id: 0,
            config_id: 0,
            operation,
            datatype,
            option1: Option1::Normal,
            option2: Option2::None,
            rep_count: 0,
        }
    }

    /// Sets the primary option.
    pub fn with_option1(mut self, option1: Option1) -> Self {
        self.option1 = option1;
        self
    }

    /// Sets the secondary option.
    pub fn with_option2(mut self, option2: Option2) -> Self {
        self.option2 = option2;
        self
    }

    /// Caps the number of records a sibling read returns.
    pub fn with_rep_count(mut self, rep_count: u32) -> Self {
        self.rep_count = rep_count;
        self
    }

    /// Binds the header to a client session and its configuration id.
    pub fn with_session(mut self, clnt_sess_id: u32, config_id: u32) -> Self {
        self.clnt_sess_id = clnt_sess_id;
        self.config_id = config_id;
        self
    }
}

/// Datatypes each operation may target.
fn allowed_datatypes(op: Operation) -> &'static [DataType] {
    match op {
        Operation::Create | Operation::Rename => &[DataType::Candidate, DataType::Import],
        Operation::Update | Operation::Delete => &[DataType::Candidate],
        Operation::Read => &[
            DataType::Candidate,
            DataType::Running,
            DataType::Startup,
            DataType::State,
            DataType::Import,
        ],
        Operation::ReadSibling | Operation::ReadSiblingBegin | Operation::ReadSiblingCount => &[
            DataType::Candidate,
            DataType::Running,
            DataType::Startup,
            DataType::State,
        ],
    }
}

/// Checks the parts of a request every key type validates the same way:
/// key type, operation against datatype, and the option combination.
pub fn validate_header(
    req: &IpcReqRespHeader,
    ikey: &ConfigKeyVal,
    expected: KeyType,
) -> UpllResult<()> {
    if ikey.key_type() != expected {
        return Err(UpllError::bad_request(format!(
            "key type {} sent to {} manager",
            ikey.key_type(),
            expected
        )));
    }
    if !allowed_datatypes(req.operation).contains(&req.datatype) {
        return Err(UpllError::NotAllowedForThisDt(format!(
            "{} on {}",
            req.operation, req.datatype
        )));
    }
    match req.option1 {
        Option1::Normal => {}
        Option1::Detail if req.operation.is_read() && req.datatype == DataType::State => {}
        Option1::Count if req.operation == Operation::ReadSiblingCount => {}
        other => {
            return Err(UpllError::InvalidOption1(format!(
                "{:?} with {} on {}",
                other, req.operation, req.datatype
            )))
        }
    }
    if req.option2 != Option2::None {
        return Err(UpllError::InvalidOption2(format!("{:?}", req.option2)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use upll_types::{KeyVtn, KeyVtnFlowFilter};

    fn vtn() -> ConfigKeyVal {
        ConfigKeyVal::new(KeyVtn::new("vtn1"))
    }

    #[test]
    fn test_wrong_key_type_is_bad_request() {
        let req = IpcReqRespHeader::new(Operation::Create, DataType::Candidate);
        let ff = ConfigKeyVal::new(KeyVtnFlowFilter::new("vtn1", 0));
        assert!(matches!(
            validate_header(&req, &ff, KeyType::Vtn),
            Err(UpllError::BadRequest(_))
        ));
    }

    #[test]
    fn test_datatype_rules() {
        let ok = IpcReqRespHeader::new(Operation::Create, DataType::Import);
        assert!(validate_header(&ok, &vtn(), KeyType::Vtn).is_ok());

        let running = IpcReqRespHeader::new(Operation::Update, DataType::Running);
        assert!(matches!(
            validate_header(&running, &vtn(), KeyType::Vtn),
            Err(UpllError::NotAllowedForThisDt(_))
        ));

        let sibling_import = IpcReqRespHeader::new(Operation::ReadSibling, DataType::Import);
        assert!(matches!(
            validate_header(&sibling_import, &vtn(), KeyType::Vtn),
            Err(UpllError::NotAllowedForThisDt(_))
        ));
    }

    #[test]
    fn test_detail_only_on_state() {
        let state = IpcReqRespHeader::new(Operation::Read, DataType::State)
            .with_option1(Option1::Detail);
        assert!(validate_header(&state, &vtn(), KeyType::Vtn).is_ok());

        let running = IpcReqRespHeader::new(Operation::Read, DataType::Running)
            .with_option1(Option1::Detail);
        assert!(matches!(
            validate_header(&running, &vtn(), KeyType::Vtn),
            Err(UpllError::InvalidOption1(_))
        ));
    }

    #[test]
    fn test_option2_rejected() {
        let req = IpcReqRespHeader::new(Operation::Read, DataType::Candidate)
            .with_option2(Option2::Neighbor);
        assert!(matches!(
            validate_header(&req, &vtn(), KeyType::Vtn),
            Err(UpllError::InvalidOption2(_))
        ));
    }
}
