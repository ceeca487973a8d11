//! Configuration store contract for the UPLL managed-object layer.
//!
//! The engine never talks to a database directly. Everything it needs from
//! storage goes through [`ConfigStore`]:
//!
//! - [`ConfigStore::read_config_db`]: single, multiple and sibling reads
//! - [`ConfigStore::update_config_db`]: create/update/delete of one row (or a
//!   wildcard set of rows for delete)
//! - [`ConfigStore::open_diff_cursor`] / [`ConfigStore::next_record`] /
//!   [`ConfigStore::close_cursor`]: the set difference of two planes for one
//!   operation kind
//! - [`ConfigStore::copy_table`] / [`ConfigStore::clear_table`]: whole-plane
//!   maintenance
//!
//! [`InMemoryStore`] is a complete backend kept in ordered maps. It is what
//! the daemon and the tests run against.
//!
//! # Example
//!
//! ```
//! use upll_dal::{ConfigStore, DbSubOp, InMemoryStore, MatchOpts, UpdateOp};
//! use upll_types::{ConfigKeyVal, DataType, KeyVtn, TableRole};
//!
//! let mut store = InMemoryStore::new();
//! let vtn = ConfigKeyVal::new(KeyVtn::new("vtn1"));
//! store
//!     .update_config_db(
//!         &vtn,
//!         DataType::Candidate,
//!         UpdateOp::Create,
//!         &MatchOpts::none(),
//!         TableRole::Main,
//!     )
//!     .unwrap();
//!
//! let rows = store
//!     .read_config_db(&vtn, DataType::Candidate, &DbSubOp::read(), TableRole::Main)
//!     .unwrap();
//! assert_eq!(rows.len(), 1);
//! ```

mod error;
mod memory;
mod store;

pub use error::{DalError, DalResult};
pub use memory::{InMemoryStore, StoreStats};
pub use store::{
    ConfigStore, DbSubOp, DiffCursor, DiffOp, DiffRecord, DiffSpec, MatchOpts, ReadOp, UpdateOp,
};
