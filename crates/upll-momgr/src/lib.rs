//! UPLL managed-object managers.
//!
//! This crate reconciles the northbound configuration planes of the VTN
//! coordinator with the controllers that realize them:
//!
//! - [`MoMgr`]: the hook set each key type supplies
//! - [`MoMgrImpl`]: the generic engine running create, update, delete,
//!   rename, read, commit, audit and import on top of those hooks
//! - [`TxUpdateUtil`] / [`TxDispatcher`]: the per-controller push queue of a
//!   commit and its concurrent delivery
//! - [`kt`]: the built-in key types (VTN, vrouter, interface, flow list and
//!   the flow-filter and policing-map families)
//!
//! # Architecture
//!
//! A request flows through the engine in a fixed order:
//!
//! 1. Message syntax and semantic checks of the key type's manager
//! 2. Parent and existence checks against the request's plane
//! 3. Controller lookup and capability check
//! 4. Row writes in MAIN, then the per-controller and rename tables
//!
//! Commit and audit walk the difference between two planes, push each row
//! to its controller in controller names, and stamp RUNNING with the
//! per-controller outcome.
//!
//! # Example
//!
//! ```ignore
//! use upll_momgr::{kt::default_registry, EngineConfig, MoMgrImpl};
//! use upll_momgr::driver::LoopbackDriver;
//! use upll_momgr::notify::BufferedNotifier;
//!
//! let engine = MoMgrImpl::new(
//!     EngineConfig::default(),
//!     Arc::new(LoopbackDriver),
//!     Arc::new(BufferedNotifier::new()),
//! );
//! let statuses = engine.commit(&mut store, session_id, config_id).await?;
//! ```

pub mod capability;
pub mod config;
pub mod driver;
pub mod engine;
pub mod error;
pub mod kt;
pub mod momgr;
pub mod notify;
pub mod request;
pub mod script;
pub mod status;
pub mod tx_update;

// Re-export commonly used items at crate root
pub use capability::{CapabilityEntry, CapabilityIndex, KtCapability, StaticCapabilityTable};
pub use config::{defaults, ConfigError, EngineConfig};
pub use driver::{DriverClient, DriverRequest, DriverResponse, DriverResultCode, LoopbackDriver};
pub use engine::{AuditContext, AuditDiffStatus, ImportType, MoMgrImpl, MoMgrStats};
pub use error::{is_absent, is_exhausted, result_code, UpllError, UpllResult};
pub use momgr::{MoMgr, MoMgrRegistry};
pub use notify::{BufferedNotifier, ConfigNotifier, Notification};
pub use request::IpcReqRespHeader;
pub use tx_update::{CtrlrCommitStatus, TxDispatcher, TxRequest, TxUpdateUtil};
