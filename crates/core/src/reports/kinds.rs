//! Report kinds and their kind-specific post-processing.
//!
//! Every kind runs through the same engine. A kind only picks its datasets,
//! its hierarchy depth, and what happens to the tree once it is built.

use std::collections::BTreeSet;

use chrono::{Days, NaiveDate};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;
use serde_json::{Value, json};

use super::comparison::{PeriodComparison, ratio_pct};
use super::hierarchy::{HierarchyNode, LineItem};
use super::row::{Curve, Dataset, ItemDetail, ItemRow, StatementNature};

/// Default forecast horizon, in days.
pub const DEFAULT_HORIZON_DAYS: u32 = 7;

/// Longest forecast horizon a caller may ask for.
pub const MAX_HORIZON_DAYS: u32 = 365;

/// The reports served by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ReportKind {
    /// Losses by department, with sector sales as reference.
    #[serde(rename = "perdas")]
    Loss,
    /// Out-of-stock items by department, with ABCD curves.
    #[serde(rename = "ruptura_curva")]
    RuptureByCurve,
    /// Items expected to run out of stock within a horizon.
    #[serde(rename = "projecao_ruptura")]
    RuptureForecast,
    /// Income statement compared against PAM and PAA.
    #[serde(rename = "dre")]
    Dre,
}

impl std::fmt::Display for ReportKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Loss => "perdas",
            Self::RuptureByCurve => "ruptura_curva",
            Self::RuptureForecast => "projecao_ruptura",
            Self::Dre => "dre",
        })
    }
}

impl ReportKind {
    /// Dataset whose current-period fetch is mandatory.
    #[must_use]
    pub const fn primary_dataset(self) -> Dataset {
        match self {
            Self::Loss => Dataset::LossItems,
            Self::RuptureByCurve => Dataset::RuptureByCurve,
            Self::RuptureForecast => Dataset::RuptureForecast,
            Self::Dre => Dataset::StatementLines,
        }
    }

    /// Optional reference dataset merged into the hierarchy.
    #[must_use]
    pub const fn reference_dataset(self) -> Option<Dataset> {
        match self {
            Self::Loss => Some(Dataset::SectorSales),
            Self::RuptureByCurve | Self::RuptureForecast | Self::Dre => None,
        }
    }

    /// Number of grouping levels above the line items.
    #[must_use]
    pub const fn depth(self) -> usize {
        match self {
            Self::Loss => 3,
            Self::RuptureByCurve | Self::RuptureForecast => 1,
            Self::Dre => 2,
        }
    }

    /// Level the reference totals attach to.
    #[must_use]
    pub const fn reference_level(self) -> usize {
        1
    }

    /// Kinds that refuse to run over "all branches".
    #[must_use]
    pub const fn requires_specific_branches(self) -> bool {
        matches!(self, Self::RuptureForecast)
    }

    /// Kinds that always fetch PAM and PAA.
    #[must_use]
    pub const fn always_compares(self) -> bool {
        matches!(self, Self::Dre)
    }

    /// Kinds that can fetch PAM and PAA when asked.
    #[must_use]
    pub const fn supports_comparison(self) -> bool {
        !matches!(self, Self::RuptureForecast)
    }
}

/// Kind-specific request parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReportParams {
    /// Curves to keep; empty keeps all.
    pub curves: BTreeSet<Curve>,
    /// Forecast horizon in days.
    pub horizon_days: Option<u32>,
    /// Date the forecast is projected from.
    pub reference_date: Option<NaiveDate>,
}

impl ReportParams {
    /// Forecast horizon, defaulted.
    #[must_use]
    pub fn horizon(&self) -> u32 {
        self.horizon_days.unwrap_or(DEFAULT_HORIZON_DAYS)
    }

    /// Parameters forwarded to the data source.
    #[must_use]
    pub fn to_source_params(&self, kind: ReportKind) -> Value {
        match kind {
            ReportKind::RuptureByCurve if !self.curves.is_empty() => {
                json!({ "curvas": self.curves })
            }
            ReportKind::RuptureForecast => json!({ "horizonte_dias": self.horizon() }),
            _ => json!({}),
        }
    }
}

// ============================================================================
// Rupture by curve
// ============================================================================

/// Keeps only items whose curve is in `curves`. An empty set keeps everything.
pub fn filter_curves(nodes: &mut Vec<HierarchyNode>, curves: &BTreeSet<Curve>) {
    if curves.is_empty() {
        return;
    }
    HierarchyNode::retain_items(nodes, &mut |item: &LineItem| {
        item.extras.curve.is_some_and(|curve| curves.contains(&curve))
    });
}

/// Per-curve totals of a rupture report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CurveSummary {
    /// Curve.
    #[serde(rename = "curva")]
    pub curve: Curve,
    /// Number of items.
    #[serde(rename = "total_itens")]
    pub items: usize,
    /// Quantity total.
    #[serde(rename = "total_qtde")]
    pub quantity: Decimal,
    /// Value total.
    #[serde(rename = "total_valor")]
    pub value: Decimal,
    /// Share of the report's value, in percent.
    #[serde(rename = "perc_valor")]
    pub value_pct: Decimal,
}

/// Summarises items by curve, in curve order.
#[must_use]
pub fn curve_summary(nodes: &[HierarchyNode]) -> Vec<CurveSummary> {
    let mut buckets: std::collections::BTreeMap<Curve, (usize, Decimal, Decimal)> =
        std::collections::BTreeMap::new();
    let mut grand_total = Decimal::ZERO;
    visit_items(nodes, &mut |item: &LineItem| {
        let curve = item.extras.curve.unwrap_or(Curve::Unclassified);
        let bucket = buckets.entry(curve).or_default();
        bucket.0 += 1;
        bucket.1 += item.quantity;
        bucket.2 += item.value;
        grand_total += item.value;
    });

    buckets
        .into_iter()
        .map(|(curve, (items, quantity, value))| CurveSummary {
            curve,
            items,
            quantity,
            value,
            value_pct: ratio_pct(value, grand_total),
        })
        .collect()
}

// ============================================================================
// Rupture forecast
// ============================================================================

/// Computes stock coverage for every item and keeps those that run out within
/// `horizon_days` of `reference_date`.
///
/// Items with no sales and positive stock never run out and are dropped.
/// Items with no stock left are kept with zero coverage.
pub fn apply_coverage(nodes: &mut Vec<HierarchyNode>, horizon_days: u32, reference_date: NaiveDate) {
    visit_items_mut(nodes, &mut |item: &mut LineItem| {
        let (Some(stock), Some(avg)) = (item.extras.stock, item.extras.avg_daily_sales) else {
            return;
        };
        let coverage = if stock <= Decimal::ZERO {
            Some(Decimal::ZERO)
        } else if avg > Decimal::ZERO {
            stock
                .checked_div(avg)
                .map(|days| days.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero))
        } else {
            None
        };
        item.extras.coverage_days = coverage;
        item.extras.projected_rupture = coverage
            .and_then(|days| days.floor().to_u64())
            .and_then(|days| reference_date.checked_add_days(Days::new(days)));
    });

    let horizon = Decimal::from(horizon_days);
    HierarchyNode::retain_items(nodes, &mut |item: &LineItem| {
        item.extras.coverage_days.is_some_and(|days| days < horizon)
    });
}

// ============================================================================
// DRE
// ============================================================================

/// Sums of statement lines by nature for one period.
///
/// Lines are read as magnitudes; the sign of each indicator comes from its
/// nature.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatementTotals {
    /// Gross revenue.
    pub revenue: Decimal,
    /// Revenue deductions.
    pub deductions: Decimal,
    /// Cost of goods sold.
    pub cost: Decimal,
    /// Operating expenses.
    pub expenses: Decimal,
}

impl StatementTotals {
    /// Sums `items` by nature. Items of other natures are ignored.
    #[must_use]
    pub fn from_items<'a>(items: impl IntoIterator<Item = &'a ItemRow>) -> Self {
        let mut totals = Self::default();
        for item in items {
            let ItemDetail::Statement { nature } = item.detail else {
                continue;
            };
            let amount = item.value.abs();
            match nature {
                StatementNature::Revenue => totals.revenue += amount,
                StatementNature::Deduction => totals.deductions += amount,
                StatementNature::Cost => totals.cost += amount,
                StatementNature::Expense => totals.expenses += amount,
                StatementNature::Other => {}
            }
        }
        totals
    }

    /// Revenue net of deductions.
    #[must_use]
    pub fn net_revenue(&self) -> Decimal {
        self.revenue - self.deductions
    }

    /// Net revenue minus cost of goods sold.
    #[must_use]
    pub fn gross_profit(&self) -> Decimal {
        self.net_revenue() - self.cost
    }

    /// Gross profit minus expenses.
    #[must_use]
    pub fn net_result(&self) -> Decimal {
        self.gross_profit() - self.expenses
    }

    fn indicators(&self) -> [(&'static str, Decimal); 7] {
        [
            ("receita_bruta", self.revenue),
            ("deducoes", self.deductions),
            ("receita_liquida", self.net_revenue()),
            ("cmv", self.cost),
            ("lucro_bruto", self.gross_profit()),
            ("despesas", self.expenses),
            ("resultado_liquido", self.net_result()),
        ]
    }
}

/// Headline DRE indicators compared across the three periods.
#[must_use]
pub fn statement_indicators(
    current: &StatementTotals,
    pam: &StatementTotals,
    paa: &StatementTotals,
) -> Vec<PeriodComparison> {
    current
        .indicators()
        .into_iter()
        .zip(pam.indicators())
        .zip(paa.indicators())
        .map(|(((metric, now), (_, before)), (_, year_ago))| {
            PeriodComparison::compare(metric, now, before, year_ago)
        })
        .collect()
}

fn visit_items(nodes: &[HierarchyNode], f: &mut impl FnMut(&LineItem)) {
    for node in nodes {
        node.items.iter().for_each(&mut *f);
        visit_items(&node.children, f);
    }
}

fn visit_items_mut(nodes: &mut [HierarchyNode], f: &mut impl FnMut(&mut LineItem)) {
    for node in nodes {
        node.items.iter_mut().for_each(&mut *f);
        visit_items_mut(&mut node.children, f);
    }
}
