//! Period-over-period comparisons.

use std::collections::HashMap;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;

use super::hierarchy::HierarchyNode;
use super::row::HierarchyPath;

/// Metric name used for node-level comparisons.
pub const NODE_METRIC: &str = "total_valor";

/// Current value of a metric against its PAM and PAA baselines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PeriodComparison {
    /// Metric name.
    #[serde(rename = "metrica")]
    pub metric: String,
    /// Current-period value.
    #[serde(rename = "atual")]
    pub current: Decimal,
    /// Previous-month value.
    pub pam: Decimal,
    /// Same-month-previous-year value.
    pub paa: Decimal,
    /// Signed change against PAM, in percent.
    #[serde(rename = "variacao_pam_pct")]
    pub delta_pam_pct: Decimal,
    /// Signed change against PAA, in percent.
    #[serde(rename = "variacao_paa_pct")]
    pub delta_paa_pct: Decimal,
}

impl PeriodComparison {
    /// Compares `current` against both baselines.
    ///
    /// Deltas are plain signed numbers; whether a decrease is good depends on
    /// the metric and is left to the presentation layer.
    #[must_use]
    pub fn compare(metric: impl Into<String>, current: Decimal, pam: Decimal, paa: Decimal) -> Self {
        Self {
            metric: metric.into(),
            current,
            pam,
            paa,
            delta_pam_pct: delta_pct(current, pam),
            delta_paa_pct: delta_pct(current, paa),
        }
    }
}

/// `(current - baseline) / baseline * 100`, rounded to two places.
///
/// A zero baseline yields zero.
#[must_use]
pub fn delta_pct(current: Decimal, baseline: Decimal) -> Decimal {
    if baseline.is_zero() {
        return Decimal::ZERO;
    }
    current
        .checked_sub(baseline)
        .and_then(|diff| diff.checked_div(baseline))
        .and_then(|ratio| ratio.checked_mul(Decimal::ONE_HUNDRED))
        .map_or(Decimal::ZERO, round_pct)
}

/// `part / whole * 100`, rounded to two places. A zero `whole` yields zero.
#[must_use]
pub fn ratio_pct(part: Decimal, whole: Decimal) -> Decimal {
    if whole.is_zero() {
        return Decimal::ZERO;
    }
    part.checked_div(whole)
        .and_then(|ratio| ratio.checked_mul(Decimal::ONE_HUNDRED))
        .map_or(Decimal::ZERO, round_pct)
}

fn round_pct(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Node totals of one period's hierarchy, keyed by path.
#[derive(Debug, Clone, Default)]
pub struct TotalsIndex(HashMap<HierarchyPath, Decimal>);

impl TotalsIndex {
    /// Indexes every node of `nodes`.
    #[must_use]
    pub fn from_hierarchy(nodes: &[HierarchyNode]) -> Self {
        let mut index = HashMap::new();
        collect_totals(nodes, &HierarchyPath::default(), &mut index);
        Self(index)
    }

    /// Total at `path`, zero when the node does not exist in this period.
    #[must_use]
    pub fn get(&self, path: &HierarchyPath) -> Decimal {
        self.0.get(path).copied().unwrap_or_default()
    }
}

fn collect_totals(
    nodes: &[HierarchyNode],
    parent: &HierarchyPath,
    index: &mut HashMap<HierarchyPath, Decimal>,
) {
    for node in nodes {
        let path = parent.child(node.key.clone());
        collect_totals(&node.children, &path, index);
        index.insert(path, node.total_value);
    }
}

/// Attaches a `total_valor` comparison to every node of the current hierarchy.
///
/// Nodes that only exist in a baseline period are not added.
pub fn attach_comparisons(nodes: &mut [HierarchyNode], pam: &TotalsIndex, paa: &TotalsIndex) {
    attach_at(nodes, &HierarchyPath::default(), pam, paa);
}

fn attach_at(
    nodes: &mut [HierarchyNode],
    parent: &HierarchyPath,
    pam: &TotalsIndex,
    paa: &TotalsIndex,
) {
    for node in nodes {
        let path = parent.child(node.key.clone());
        node.comparison = Some(PeriodComparison::compare(
            NODE_METRIC,
            node.total_value,
            pam.get(&path),
            paa.get(&path),
        ));
        attach_at(&mut node.children, &path, pam, paa);
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use rust_decimal_macros::dec;

    use super::*;

    #[rstest]
    #[case(dec!(100), dec!(0), dec!(0))]
    #[case(dec!(150), dec!(100), dec!(50))]
    #[case(dec!(50), dec!(100), dec!(-50))]
    #[case(dec!(100), dec!(300), dec!(-66.67))]
    #[case(dec!(0), dec!(80), dec!(-100))]
    #[case(dec!(-20), dec!(-10), dec!(100))]
    fn test_delta_pct(#[case] current: Decimal, #[case] baseline: Decimal, #[case] expected: Decimal) {
        assert_eq!(delta_pct(current, baseline), expected);
    }

    #[test]
    fn test_zero_baseline_is_zero_not_infinite() {
        let cmp = PeriodComparison::compare("valor", dec!(100), dec!(0), dec!(50));
        assert_eq!(cmp.delta_pam_pct, Decimal::ZERO);
        assert_eq!(cmp.delta_paa_pct, dec!(100));
        assert_eq!(cmp.metric, "valor");
    }

    #[test]
    fn test_ratio_pct() {
        assert_eq!(ratio_pct(dec!(25), dec!(1000)), dec!(2.5));
        assert_eq!(ratio_pct(dec!(1), dec!(3)), dec!(33.33));
        assert_eq!(ratio_pct(dec!(1), dec!(0)), Decimal::ZERO);
    }

    #[test]
    fn test_comparison_serializes_with_report_field_names() {
        let cmp = PeriodComparison::compare("total_valor", dec!(110), dec!(100), dec!(0));
        let json = serde_json::to_value(&cmp).unwrap();
        assert_eq!(json["metrica"], "total_valor");
        let decimal = |field: &str| json[field].as_str().unwrap().parse::<Decimal>().unwrap();
        assert_eq!(decimal("atual"), dec!(110));
        assert_eq!(decimal("variacao_pam_pct"), dec!(10));
        assert_eq!(decimal("variacao_paa_pct"), Decimal::ZERO);
    }
}
