//! Report error types.

use std::time::Duration;

use chrono::NaiveDate;
use thiserror::Error;
use vitrine_shared::AppError;
use vitrine_shared::types::BranchId;

use crate::branch::AuthorizationError;
use crate::period::PeriodTag;

use super::row::Dataset;

/// Errors that can occur during report generation.
#[derive(Debug, Error)]
pub enum ReportError {
    /// Branch permissions could not be determined.
    #[error(transparent)]
    Authorization(#[from] AuthorizationError),

    /// A fetch needed for the headline totals failed.
    #[error("Mandatory {dataset} fetch failed for branch {branch}, period {period}: {message}")]
    MandatoryFetch {
        /// Dataset being fetched.
        dataset: Dataset,
        /// Branch being fetched.
        branch: BranchId,
        /// Period being fetched.
        period: PeriodTag,
        /// Underlying failure.
        message: String,
    },

    /// The tenant's branch list could not be read.
    #[error("Could not list branches for tenant: {0}")]
    BranchDirectory(String),

    /// Malformed request parameter.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Invalid date range.
    #[error("Invalid date range: start {start} is after end {end}")]
    InvalidDateRange {
        /// Start date.
        start: NaiveDate,
        /// End date.
        end: NaiveDate,
    },

    /// The report needs at least one explicit branch.
    #[error("This report requires at least one specific branch")]
    MissingBranchSelection,

    /// Too many branches were requested.
    #[error("Too many branches requested: {requested} (maximum {max})")]
    TooManyBranches {
        /// Number requested.
        requested: usize,
        /// Configured maximum.
        max: usize,
    },

    /// The fan-out did not finish within its deadline.
    #[error("Report data did not arrive within {0:?}")]
    Timeout(Duration),
}

impl ReportError {
    /// Returns true when the caller sent something unusable.
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidRequest(_)
                | Self::InvalidDateRange { .. }
                | Self::MissingBranchSelection
                | Self::TooManyBranches { .. }
        )
    }
}

impl From<ReportError> for AppError {
    fn from(err: ReportError) -> Self {
        match err {
            // Lookup details stay in the logs.
            ReportError::Authorization(_) => {
                Self::Forbidden("Could not verify branch permissions".to_string())
            }
            ReportError::Timeout(_) => Self::Timeout(err.to_string()),
            ReportError::MandatoryFetch { .. } | ReportError::BranchDirectory(_) => {
                Self::ExternalService(err.to_string())
            }
            e if e.is_client_error() => Self::Validation(e.to_string()),
            e => Self::Internal(e.to_string()),
        }
    }
}
