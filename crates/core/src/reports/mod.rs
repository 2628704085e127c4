//! Branch-scoped hierarchical reports.
//!
//! This module provides the reporting pipeline shared by every report kind:
//! - Parallel per-branch fetching with partial-failure tolerance
//! - Hierarchical aggregation with sorted rollups
//! - PAM / PAA comparisons
//! - Page assembly

pub mod comparison;
pub mod engine;
pub mod error;
pub mod fetcher;
pub mod hierarchy;
pub mod kinds;
pub mod page;
pub mod row;


pub use comparison::{PeriodComparison, TotalsIndex, attach_comparisons, delta_pct, ratio_pct};
pub use engine::{ReportEngine, ReportRequest};
pub use error::ReportError;
pub use fetcher::{
    FetchKey, FetchRequirement, FetchResults, ParallelReportFetcher, ReportQuery, ReportSource,
    ScopedBranches, SourceError, SourceRequest,
};
pub use hierarchy::{
    HierarchyAggregator, HierarchyNode, LineExtras, LineItem, ReferenceTotals, ReportTotals,
};
pub use kinds::{CurveSummary, ReportKind, ReportParams, StatementTotals};
pub use page::{ReportExtras, ReportMeta, ReportPage};
pub use row::{
    Curve, Dataset, GroupKey, HierarchyPath, ItemDetail, ItemRow, RawReportRow, ReferenceRow,
    StatementNature,
};
