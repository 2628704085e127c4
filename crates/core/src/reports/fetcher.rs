//! Parallel per-branch, per-period fetching.
//!
//! One data source call is issued for every `(branch, period)` pair. Calls run
//! concurrently inside the caller's task, so dropping the returned future
//! abandons every outstanding call. Results are collected by key, which makes
//! the outcome independent of completion order.

use std::collections::{BTreeMap, BTreeSet};
use std::pin::pin;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error, warn};
use vitrine_shared::types::{BranchId, TenantId};

use crate::period::{PeriodTag, ReportPeriod};

use super::error::ReportError;
use super::row::{Dataset, ItemRow, RawReportRow, ReferenceRow};

// ============================================================================
// Data source seam
// ============================================================================

/// What to fetch, independent of branch and period.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportQuery {
    /// Tenant whose data store is queried.
    pub tenant: TenantId,
    /// Dataset to fetch.
    pub dataset: Dataset,
    /// Extra dataset parameters, passed through to the source.
    pub params: Value,
}

impl ReportQuery {
    /// Creates a query without extra parameters.
    #[must_use]
    pub fn new(tenant: TenantId, dataset: Dataset) -> Self {
        Self {
            tenant,
            dataset,
            params: Value::Object(serde_json::Map::new()),
        }
    }

    /// Replaces the extra parameters.
    #[must_use]
    pub fn with_params(mut self, params: Value) -> Self {
        self.params = params;
        self
    }

    /// Same query against another dataset.
    #[must_use]
    pub fn for_dataset(&self, dataset: Dataset) -> Self {
        Self {
            tenant: self.tenant,
            dataset,
            params: self.params.clone(),
        }
    }
}

/// One call to the data source.
#[derive(Debug, Clone, Copy)]
pub struct SourceRequest<'a> {
    /// Tenant whose data store is queried.
    pub tenant: TenantId,
    /// Dataset to fetch.
    pub dataset: Dataset,
    /// The single branch this call covers.
    pub branch: &'a BranchId,
    /// The period this call covers.
    pub period: &'a ReportPeriod,
    /// Extra dataset parameters.
    pub params: &'a Value,
}

/// Data source failures.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The source could not be reached.
    #[error("data source unavailable: {0}")]
    Unavailable(String),
    /// The source rejected or failed the query.
    #[error("query failed: {0}")]
    Query(String),
    /// The tenant has no usable data store.
    #[error("unknown tenant: {0}")]
    UnknownTenant(TenantId),
}

/// External data source holding per-branch raw aggregates.
#[async_trait]
pub trait ReportSource: Send + Sync {
    /// Returns the raw records for one branch and period.
    async fn fetch_rows(&self, request: SourceRequest<'_>) -> Result<Vec<Value>, SourceError>;

    /// Lists the active branches of a tenant.
    async fn list_branches(&self, tenant: TenantId) -> Result<Vec<BranchId>, SourceError>;
}

// ============================================================================
// Fetch types
// ============================================================================

/// Branches approved for one request.
///
/// Only the engine creates these, after authorization and negotiation, so the
/// fetcher can never be asked for an implicit "everything".
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ScopedBranches(Vec<BranchId>);

impl ScopedBranches {
    pub(crate) const fn new(branches: Vec<BranchId>) -> Self {
        Self(branches)
    }

    /// The approved branches.
    #[must_use]
    pub fn as_slice(&self) -> &[BranchId] {
        &self.0
    }

    /// Number of approved branches.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true when no branch was approved.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Slot of one fetch result.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct FetchKey {
    /// Period fetched.
    #[serde(rename = "periodo")]
    pub period: PeriodTag,
    /// Branch fetched.
    #[serde(rename = "filial")]
    pub branch: BranchId,
}

/// Whether a failed fetch fails the whole request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchRequirement {
    /// Needed for the headline totals; any failure is fatal.
    Mandatory,
    /// Comparison or reference data; failures degrade to empty.
    Optional,
}

/// Collected rows of one fan-out.
#[derive(Debug, Clone, Default)]
pub struct FetchResults {
    /// Rows per slot. Failed optional slots hold an empty list.
    pub rows: BTreeMap<FetchKey, Vec<RawReportRow>>,
    /// Slots that failed or timed out and were treated as empty.
    pub degraded: BTreeSet<FetchKey>,
    /// Rows with at least one coerced field.
    pub malformed_rows: usize,
}

impl FetchResults {
    /// Item rows fetched for `period`, across branches.
    pub fn items(&self, period: PeriodTag) -> impl Iterator<Item = &ItemRow> {
        self.rows
            .iter()
            .filter(move |(key, _)| key.period == period)
            .flat_map(|(_, rows)| rows)
            .filter_map(|row| match row {
                RawReportRow::Item(item) => Some(item),
                RawReportRow::Reference(_) => None,
            })
    }

    /// Reference rows fetched for `period`, across branches.
    pub fn references(&self, period: PeriodTag) -> impl Iterator<Item = &ReferenceRow> {
        self.rows
            .iter()
            .filter(move |(key, _)| key.period == period)
            .flat_map(|(_, rows)| rows)
            .filter_map(|row| match row {
                RawReportRow::Reference(reference) => Some(reference),
                RawReportRow::Item(_) => None,
            })
    }
}

// ============================================================================
// Fetcher
// ============================================================================

/// Runs the per-branch fan-out against a `ReportSource`.
#[derive(Clone)]
pub struct ParallelReportFetcher {
    source: Arc<dyn ReportSource>,
    max_concurrent: usize,
    timeout: Duration,
}

impl std::fmt::Debug for ParallelReportFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParallelReportFetcher")
            .field("max_concurrent", &self.max_concurrent)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl ParallelReportFetcher {
    /// Creates a fetcher. A concurrency cap of zero is treated as one.
    #[must_use]
    pub fn new(source: Arc<dyn ReportSource>, max_concurrent: usize, timeout: Duration) -> Self {
        Self {
            source,
            max_concurrent: max_concurrent.max(1),
            timeout,
        }
    }

    /// Fetches every `(branch, period)` pair concurrently.
    ///
    /// With `FetchRequirement::Optional`, failed or timed-out pairs are logged,
    /// recorded in `degraded` and treated as empty.
    ///
    /// # Errors
    ///
    /// With `FetchRequirement::Mandatory`, the first failure returns
    /// `ReportError::MandatoryFetch` and abandons the remaining calls; running
    /// out of time returns `ReportError::Timeout`.
    pub async fn fetch_all(
        &self,
        branches: &ScopedBranches,
        periods: &[ReportPeriod],
        query: &ReportQuery,
        requirement: FetchRequirement,
    ) -> Result<FetchResults, ReportError> {
        let mut results = FetchResults::default();
        let expected: Vec<FetchKey> = periods
            .iter()
            .flat_map(|period| {
                branches.as_slice().iter().map(|branch| FetchKey {
                    period: period.tag,
                    branch: branch.clone(),
                })
            })
            .collect();

        if expected.is_empty() {
            return Ok(results);
        }

        let fetches: Vec<_> = periods
            .iter()
            .flat_map(|period| {
                branches.as_slice().iter().map(move |branch| (branch, period))
            })
            .map(|(branch, period)| async move {
                let request = SourceRequest {
                    tenant: query.tenant,
                    dataset: query.dataset,
                    branch,
                    period,
                    params: &query.params,
                };
                let outcome = self.source.fetch_rows(request).await;
                let key = FetchKey {
                    period: period.tag,
                    branch: branch.clone(),
                };
                (key, outcome)
            })
            .collect();

        let drive = async {
            let mut pending = pin!(
                stream::iter(fetches)
                .buffer_unordered(self.max_concurrent)
            );

            while let Some((key, outcome)) = pending.next().await {
                match outcome {
                    Ok(raw_rows) => {
                        let mut rows = Vec::with_capacity(raw_rows.len());
                        for raw in &raw_rows {
                            let parsed = query.dataset.parse_row(&key.branch, raw);
                            if parsed.malformed {
                                results.malformed_rows += 1;
                            }
                            rows.push(parsed.row);
                        }
                        results.rows.insert(key, rows);
                    }
                    Err(err) => match requirement {
                        FetchRequirement::Mandatory => {
                            error!(
                                dataset = %query.dataset,
                                branch = %key.branch,
                                period = %key.period,
                                error = %err,
                                "Mandatory report fetch failed"
                            );
                            return Err(ReportError::MandatoryFetch {
                                dataset: query.dataset,
                                branch: key.branch,
                                period: key.period,
                                message: err.to_string(),
                            });
                        }
                        FetchRequirement::Optional => {
                            warn!(
                                dataset = %query.dataset,
                                branch = %key.branch,
                                period = %key.period,
                                error = %err,
                                "Auxiliary report fetch failed; treating as empty"
                            );
                            results.degraded.insert(key.clone());
                            results.rows.insert(key, Vec::new());
                        }
                    },
                }
            }
            Ok(())
        };

        let outcome = tokio::time::timeout(self.timeout, drive).await;
        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(err)) => return Err(err),
            Err(_) => match requirement {
                FetchRequirement::Mandatory => {
                    error!(
                        dataset = %query.dataset,
                        timeout = ?self.timeout,
                        completed = results.rows.len(),
                        expected = expected.len(),
                        "Mandatory report fetch timed out"
                    );
                    return Err(ReportError::Timeout(self.timeout));
                }
                FetchRequirement::Optional => {
                    let missing: Vec<FetchKey> = expected
                        .iter()
                        .filter(|key| !results.rows.contains_key(*key))
                        .cloned()
                        .collect();
                    for key in missing {
                        warn!(
                            dataset = %query.dataset,
                            branch = %key.branch,
                            period = %key.period,
                            "Auxiliary report fetch timed out; treating as empty"
                        );
                        results.degraded.insert(key.clone());
                        results.rows.insert(key, Vec::new());
                    }
                }
            },
        }

        debug!(
            dataset = %query.dataset,
            fetches = expected.len(),
            degraded = results.degraded.len(),
            malformed_rows = results.malformed_rows,
            "Report fan-out finished"
        );
        Ok(results)
    }
}
