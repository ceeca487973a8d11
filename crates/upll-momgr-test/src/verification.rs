//! Verification helpers for testing the engine
//!
//! Provides assertion helpers over the planes of an [`InMemoryStore`]

use thiserror::Error;
use upll_dal::InMemoryStore;
use upll_types::{ConfigKey, ConfigKeyVal, ConfigStatus, DataType, KeyType, TableRole};

/// Verification error types
#[derive(Error, Debug, PartialEq, Eq)]
pub enum VerificationError {
    #[error("Expected row '{key}' not found in {table:?} of {dt}")]
    RowNotFound {
        key: String,
        table: TableRole,
        dt: DataType,
    },

    #[error("Unexpected row '{key}' in {table:?} of {dt}")]
    UnexpectedRow {
        key: String,
        table: TableRole,
        dt: DataType,
    },

    #[error("Status mismatch for '{key}' in {dt}: expected {expected}, got {actual}")]
    StatusMismatch {
        key: String,
        dt: DataType,
        expected: ConfigStatus,
        actual: ConfigStatus,
    },

    #[error("Expected {expected} {kt} rows in {table:?} of {dt}, found {actual}")]
    RowCountMismatch {
        kt: KeyType,
        table: TableRole,
        dt: DataType,
        expected: usize,
        actual: usize,
    },

    #[error("{0} diff cursors left open")]
    OpenCursors(usize),
}

/// Result type for verification operations
pub type VerifyResult<T> = Result<T, VerificationError>;

/// Store verification helper
pub struct StoreVerifier<'a> {
    store: &'a InMemoryStore,
}

impl<'a> StoreVerifier<'a> {
    /// Create a new store verifier
    pub fn new(store: &'a InMemoryStore) -> Self {
        Self { store }
    }

    /// Every row of `key` in `table` of `dt`, one per controller for
    /// per-controller tables
    pub fn rows_of(&self, key: &ConfigKey, table: TableRole, dt: DataType) -> Vec<ConfigKeyVal> {
        self.store
            .rows(key.key_type(), table, dt)
            .into_iter()
            .filter(|r| r.key == *key)
            .collect()
    }

    /// The MAIN row of `key` in `dt`
    pub fn main_row(&self, key: &ConfigKey, dt: DataType) -> VerifyResult<ConfigKeyVal> {
        self.rows_of(key, TableRole::Main, dt)
            .into_iter()
            .next()
            .ok_or_else(|| VerificationError::RowNotFound {
                key: key.to_string(),
                table: TableRole::Main,
                dt,
            })
    }

    /// Verify that `key` has a row in `table` of `dt`
    pub fn assert_exists(
        &self,
        key: &ConfigKey,
        table: TableRole,
        dt: DataType,
    ) -> VerifyResult<()> {
        if self.rows_of(key, table, dt).is_empty() {
            return Err(VerificationError::RowNotFound {
                key: key.to_string(),
                table,
                dt,
            });
        }
        Ok(())
    }

    /// Verify that `key` has no row in `table` of `dt`
    pub fn assert_absent(
        &self,
        key: &ConfigKey,
        table: TableRole,
        dt: DataType,
    ) -> VerifyResult<()> {
        if !self.rows_of(key, table, dt).is_empty() {
            return Err(VerificationError::UnexpectedRow {
                key: key.to_string(),
                table,
                dt,
            });
        }
        Ok(())
    }

    /// Verify the consolidated status of the MAIN row of `key`
    pub fn assert_status(
        &self,
        key: &ConfigKey,
        dt: DataType,
        expected: ConfigStatus,
    ) -> VerifyResult<()> {
        let actual = self.main_row(key, dt)?.status.row;
        if actual != expected {
            return Err(VerificationError::StatusMismatch {
                key: key.to_string(),
                dt,
                expected,
                actual,
            });
        }
        Ok(())
    }

    /// Verify the status of the CTRLR row of `key` on `ctrlr`
    pub fn assert_ctrlr_status(
        &self,
        key: &ConfigKey,
        ctrlr: &str,
        dt: DataType,
        expected: ConfigStatus,
    ) -> VerifyResult<()> {
        let row = self
            .rows_of(key, TableRole::Ctrlr, dt)
            .into_iter()
            .find(|r| r.ctrlr_id() == Some(ctrlr))
            .ok_or_else(|| VerificationError::RowNotFound {
                key: format!("{}@{}", key, ctrlr),
                table: TableRole::Ctrlr,
                dt,
            })?;
        if row.status.row != expected {
            return Err(VerificationError::StatusMismatch {
                key: format!("{}@{}", key, ctrlr),
                dt,
                expected,
                actual: row.status.row,
            });
        }
        Ok(())
    }

    /// Verify the number of rows of `kt` in `table` of `dt`
    pub fn assert_row_count(
        &self,
        kt: KeyType,
        table: TableRole,
        dt: DataType,
        expected: usize,
    ) -> VerifyResult<()> {
        let actual = self.store.row_count(kt, table, dt);
        if actual != expected {
            return Err(VerificationError::RowCountMismatch {
                kt,
                table,
                dt,
                expected,
                actual,
            });
        }
        Ok(())
    }

    /// Verify that every diff cursor was closed
    pub fn assert_no_open_cursors(&self) -> VerifyResult<()> {
        match self.store.open_cursor_count() {
            0 => Ok(()),
            n => Err(VerificationError::OpenCursors(n)),
        }
    }

    /// Verify that CANDIDATE and RUNNING hold the same configuration for
    /// `kt`, ignoring status
    pub fn assert_planes_converged(&self, kt: KeyType) -> VerifyResult<()> {
        let candidate = self.store.rows(kt, TableRole::Main, DataType::Candidate);
        let running = self.store.rows(kt, TableRole::Main, DataType::Running);
        for row in &candidate {
            if !running.iter().any(|r| r.same_config(row)) {
                return Err(VerificationError::RowNotFound {
                    key: row.key.to_string(),
                    table: TableRole::Main,
                    dt: DataType::Running,
                });
            }
        }
        self.assert_row_count(kt, TableRole::Main, DataType::Running, candidate.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use upll_dal::{ConfigStore, MatchOpts, UpdateOp};
    use upll_types::KeyVtn;

    #[test]
    fn test_verifier_reports_missing_rows() {
        let mut store = InMemoryStore::new();
        let key: ConfigKey = KeyVtn::new("v1").into();
        store
            .update_config_db(
                &ConfigKeyVal::new(key.clone()),
                DataType::Candidate,
                UpdateOp::Create,
                &MatchOpts::none(),
                TableRole::Main,
            )
            .unwrap();

        let verifier = StoreVerifier::new(&store);
        assert!(verifier.assert_exists(&key, TableRole::Main, DataType::Candidate).is_ok());
        assert!(matches!(
            verifier.assert_exists(&key, TableRole::Main, DataType::Running),
            Err(VerificationError::RowNotFound { .. })
        ));
        assert!(verifier
            .assert_status(&key, DataType::Candidate, ConfigStatus::Unknown)
            .is_ok());
        assert!(matches!(
            verifier.assert_planes_converged(KeyType::Vtn),
            Err(VerificationError::RowNotFound { .. })
        ));
        assert!(verifier.assert_no_open_cursors().is_ok());
    }
}
