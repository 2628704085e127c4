//! The report engine.
//!
//! `ReportEngine::run` is the single entry point for every report kind:
//! validate, derive periods, resolve and negotiate branches, fan out, build
//! the hierarchy, compare, and assemble a page.

use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{debug, error, info};
use vitrine_shared::ReportsConfig;
use vitrine_shared::types::{BranchId, PageRequest, TenantId};

use crate::branch::{
    BranchAuthorizationResolver, BranchGrantSource, BranchSelection, CallerContext, negotiate,
};
use crate::period::{PeriodSet, PeriodTag, ReportPeriod};

use super::comparison::{PeriodComparison, TotalsIndex, attach_comparisons};
use super::error::ReportError;
use super::fetcher::{
    FetchRequirement, FetchResults, ParallelReportFetcher, ReportQuery, ReportSource,
    ScopedBranches,
};
use super::hierarchy::{HierarchyAggregator, HierarchyNode, ReferenceTotals};
use super::kinds::{
    MAX_HORIZON_DAYS, ReportKind, ReportParams, StatementTotals, apply_coverage, curve_summary,
    filter_curves, statement_indicators,
};
use super::page::{ReportExtras, ReportMeta, ReportPage};

/// A validated-at-the-edge report request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportRequest {
    /// Requested branch filter.
    pub branches: BranchSelection,
    /// First day of the current period.
    pub period_start: NaiveDate,
    /// Last day of the current period.
    pub period_end: NaiveDate,
    /// Page of top-level groups.
    pub page: PageRequest,
    /// Whether to compare against PAM and PAA.
    pub compare: bool,
    /// Kind-specific parameters.
    pub params: ReportParams,
}

impl ReportRequest {
    /// Creates a request for all branches with default paging.
    #[must_use]
    pub fn new(period_start: NaiveDate, period_end: NaiveDate) -> Self {
        Self {
            branches: BranchSelection::All,
            period_start,
            period_end,
            page: PageRequest::default(),
            compare: false,
            params: ReportParams::default(),
        }
    }
}

/// Runs reports for every kind.
#[derive(Clone)]
pub struct ReportEngine {
    resolver: BranchAuthorizationResolver,
    source: Arc<dyn ReportSource>,
    fetcher: ParallelReportFetcher,
    config: ReportsConfig,
}

impl std::fmt::Debug for ReportEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReportEngine")
            .field("fetcher", &self.fetcher)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ReportEngine {
    /// Creates an engine.
    #[must_use]
    pub fn new(
        grants: Arc<dyn BranchGrantSource>,
        source: Arc<dyn ReportSource>,
        config: ReportsConfig,
    ) -> Self {
        let fetcher = ParallelReportFetcher::new(
            Arc::clone(&source),
            config.max_concurrent_fetches,
            config.fetch_timeout(),
        );
        Self {
            resolver: BranchAuthorizationResolver::new(grants),
            source,
            fetcher,
            config,
        }
    }

    /// Engine configuration.
    #[must_use]
    pub const fn config(&self) -> &ReportsConfig {
        &self.config
    }

    /// Runs one report for `caller`.
    ///
    /// # Errors
    ///
    /// Returns a client error for invalid requests before anything is fetched,
    /// `ReportError::Authorization` when branch permissions cannot be read,
    /// and a fetch error when current-period data cannot be obtained.
    pub async fn run(
        &self,
        kind: ReportKind,
        caller: &CallerContext,
        request: &ReportRequest,
    ) -> Result<ReportPage, ReportError> {
        self.validate(kind, request)?;
        let periods = PeriodSet::derive(request.period_start, request.period_end)?;

        let scope = self.resolver.resolve(caller).await?;
        let negotiated = negotiate(&request.branches, &scope);
        let branches = self.scope_branches(caller.tenant, negotiated).await?;

        info!(
            kind = %kind,
            tenant = %caller.tenant,
            user = %caller.user,
            branches = branches.len(),
            start = %periods.current.start,
            end = %periods.current.end,
            days = periods.current.days(),
            "Running report"
        );

        let compare = kind.always_compares() || (request.compare && kind.supports_comparison());
        let baselines: Vec<ReportPeriod> = if compare {
            periods.baselines().to_vec()
        } else {
            Vec::new()
        };

        let query = ReportQuery::new(caller.tenant, kind.primary_dataset())
            .with_params(request.params.to_source_params(kind));
        let reference_query = kind.reference_dataset().map(|dataset| query.for_dataset(dataset));
        let current = [periods.current];

        let (primary, baseline, reference) = tokio::try_join!(
            self.fetcher
                .fetch_all(&branches, &current, &query, FetchRequirement::Mandatory),
            self.fetcher
                .fetch_all(&branches, &baselines, &query, FetchRequirement::Optional),
            async {
                match &reference_query {
                    Some(reference_query) => {
                        self.fetcher
                            .fetch_all(
                                &branches,
                                &current,
                                reference_query,
                                FetchRequirement::Optional,
                            )
                            .await
                    }
                    None => Ok(FetchResults::default()),
                }
            },
        )?;

        let mut hierarchy = shape(kind, &primary, PeriodTag::Current, &request.params);
        let mut extras = ReportExtras::default();

        match kind {
            ReportKind::Loss => {
                if reference_query.is_some() {
                    let totals = ReferenceTotals::from_rows(
                        reference.references(PeriodTag::Current),
                        kind.reference_level(),
                    );
                    HierarchyAggregator::merge_reference_totals(&mut hierarchy, &totals);
                }
            }
            ReportKind::RuptureByCurve => {
                extras.curve_summary = Some(curve_summary(&hierarchy));
            }
            ReportKind::RuptureForecast => {
                let reference_date = request.params.reference_date.unwrap_or(periods.current.end);
                apply_coverage(&mut hierarchy, request.params.horizon(), reference_date);
            }
            ReportKind::Dre => {
                extras.indicators = Some(statement_indicators(
                    &StatementTotals::from_items(primary.items(PeriodTag::Current)),
                    &StatementTotals::from_items(baseline.items(PeriodTag::Pam)),
                    &StatementTotals::from_items(baseline.items(PeriodTag::Paa)),
                ));
            }
        }

        // Filtering can reorder siblings.
        HierarchyAggregator::sort_hierarchy(&mut hierarchy);

        if compare {
            let pam = shape(kind, &baseline, PeriodTag::Pam, &request.params);
            let paa = shape(kind, &baseline, PeriodTag::Paa, &request.params);
            attach_comparisons(
                &mut hierarchy,
                &TotalsIndex::from_hierarchy(&pam),
                &TotalsIndex::from_hierarchy(&paa),
            );

            if kind != ReportKind::Dre {
                extras.comparisons = Some(headline_comparisons(&hierarchy, &pam, &paa));
            }
            extras.compared_periods = Some(baselines.clone());
        }

        let mut degraded: Vec<_> = primary.degraded.into_iter().collect();
        degraded.extend(baseline.degraded);
        degraded.extend(reference.degraded);
        degraded.sort();

        let malformed_rows =
            primary.malformed_rows + baseline.malformed_rows + reference.malformed_rows;
        if malformed_rows > 0 {
            debug!(kind = %kind, malformed_rows, "Coerced malformed report rows");
        }

        let meta = ReportMeta {
            kind,
            period: periods.current,
            branches: branches.as_slice().to_vec(),
            degraded,
        };
        let page = ReportPage::assemble(hierarchy, request.page, meta, extras);

        debug!(
            kind = %kind,
            total_records = page.total_records,
            degraded = page.meta.degraded.len(),
            "Report assembled"
        );
        Ok(page)
    }

    fn validate(&self, kind: ReportKind, request: &ReportRequest) -> Result<(), ReportError> {
        request
            .page
            .validate(self.config.max_page_size)
            .map_err(ReportError::InvalidRequest)?;

        let requested = request.branches.requested_len();
        if requested > self.config.max_requested_branches {
            return Err(ReportError::TooManyBranches {
                requested,
                max: self.config.max_requested_branches,
            });
        }

        if kind.requires_specific_branches() && request.branches.require_specific().is_none() {
            return Err(ReportError::MissingBranchSelection);
        }

        if let Some(days) = request.params.horizon_days
            && (days == 0 || days > MAX_HORIZON_DAYS)
        {
            return Err(ReportError::InvalidRequest(format!(
                "horizonte_dias must be between 1 and {MAX_HORIZON_DAYS}"
            )));
        }

        Ok(())
    }

    async fn scope_branches(
        &self,
        tenant: TenantId,
        negotiated: Option<Vec<BranchId>>,
    ) -> Result<ScopedBranches, ReportError> {
        match negotiated {
            Some(branches) => Ok(ScopedBranches::new(branches)),
            None => {
                let branches = self.source.list_branches(tenant).await.map_err(|e| {
                    error!(tenant = %tenant, error = %e, "Failed to list tenant branches");
                    ReportError::BranchDirectory(e.to_string())
                })?;
                Ok(ScopedBranches::new(branches))
            }
        }
    }
}

/// Builds the hierarchy of one period and applies item-level filters.
fn shape(
    kind: ReportKind,
    results: &FetchResults,
    period: PeriodTag,
    params: &ReportParams,
) -> Vec<HierarchyNode> {
    let mut nodes = HierarchyAggregator::aggregate(results.items(period).cloned(), kind.depth());
    if kind == ReportKind::RuptureByCurve {
        filter_curves(&mut nodes, &params.curves);
    }
    nodes
}

fn headline_comparisons(
    current: &[HierarchyNode],
    pam: &[HierarchyNode],
    paa: &[HierarchyNode],
) -> Vec<PeriodComparison> {
    let current = HierarchyAggregator::flatten_totals(current);
    let pam = HierarchyAggregator::flatten_totals(pam);
    let paa = HierarchyAggregator::flatten_totals(paa);
    vec![
        PeriodComparison::compare("total_valor", current.value, pam.value, paa.value),
        PeriodComparison::compare("total_qtde", current.quantity, pam.quantity, paa.quantity),
    ]
}
