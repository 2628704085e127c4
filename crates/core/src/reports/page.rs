//! Report response assembly.

use serde::Serialize;
use vitrine_shared::types::{BranchId, PageMeta, PageRequest};

use crate::period::ReportPeriod;

use super::comparison::PeriodComparison;
use super::fetcher::FetchKey;
use super::hierarchy::{HierarchyAggregator, HierarchyNode, ReportTotals};
use super::kinds::{CurveSummary, ReportKind};

/// Request context echoed back in the page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportMeta {
    /// Report kind.
    #[serde(rename = "relatorio")]
    pub kind: ReportKind,
    /// Current period.
    #[serde(rename = "periodo")]
    pub period: ReportPeriod,
    /// Branches the report covers.
    #[serde(rename = "filiais")]
    pub branches: Vec<BranchId>,
    /// Auxiliary fetches that failed and were treated as empty.
    #[serde(rename = "fetches_degradados")]
    pub degraded: Vec<FetchKey>,
}

/// Kind-specific additions to a page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReportExtras {
    /// DRE headline indicators.
    #[serde(rename = "indicadores", skip_serializing_if = "Option::is_none")]
    pub indicators: Option<Vec<PeriodComparison>>,
    /// Rupture per-curve summary.
    #[serde(rename = "resumo_curvas", skip_serializing_if = "Option::is_none")]
    pub curve_summary: Option<Vec<CurveSummary>>,
    /// Headline totals compared against PAM / PAA.
    #[serde(rename = "comparativos", skip_serializing_if = "Option::is_none")]
    pub comparisons: Option<Vec<PeriodComparison>>,
    /// Baseline periods used for comparisons.
    #[serde(rename = "periodos_comparados", skip_serializing_if = "Option::is_none")]
    pub compared_periods: Option<Vec<ReportPeriod>>,
}

/// One page of a report. Built once, never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportPage {
    /// Number of top-level groups across all pages.
    pub total_records: u64,
    /// Page number, 1-based.
    pub page: u32,
    /// Top-level groups per page.
    pub page_size: u32,
    /// Number of pages; zero when there are no groups.
    pub total_pages: u64,
    /// Totals over the whole hierarchy, not just this page.
    #[serde(rename = "totais")]
    pub totals: ReportTotals,
    /// The top-level groups on this page, with their full subtrees.
    #[serde(rename = "hierarquia")]
    pub hierarchy: Vec<HierarchyNode>,
    /// Request context.
    #[serde(flatten)]
    pub meta: ReportMeta,
    /// Kind-specific additions.
    #[serde(flatten)]
    pub extras: ReportExtras,
}

impl ReportPage {
    /// Slices the top level of `hierarchy` into the requested page.
    ///
    /// A page past the end is empty but still carries the real totals and
    /// page count.
    #[must_use]
    pub fn assemble(
        hierarchy: Vec<HierarchyNode>,
        request: PageRequest,
        meta: ReportMeta,
        extras: ReportExtras,
    ) -> Self {
        let totals = HierarchyAggregator::flatten_totals(&hierarchy);
        let pagination = PageMeta::new(request, hierarchy.len() as u64);
        let slice: Vec<HierarchyNode> = hierarchy
            .into_iter()
            .skip(request.offset())
            .take(request.limit())
            .collect();

        Self {
            total_records: pagination.total_records,
            page: pagination.page,
            page_size: pagination.page_size,
            total_pages: pagination.total_pages,
            totals,
            hierarchy: slice,
            meta,
            extras,
        }
    }
}
