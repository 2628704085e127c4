//! Hierarchical aggregation of line items.
//!
//! Rows are folded in a single pass into a fixed-depth tree keyed by grouping
//! names. Rows from different branches that share a path merge into the same
//! node. Every node's totals equal the sum of its children (or of its items at
//! the deepest level).

use std::cmp::Ordering;
use std::collections::HashMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use vitrine_shared::types::BranchId;

use super::comparison::{PeriodComparison, ratio_pct};
use super::row::{Curve, GroupKey, HierarchyPath, ItemDetail, ItemRow, ReferenceRow, StatementNature};

/// Kind-specific fields of a leaf line item.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LineExtras {
    /// ABCD curve, for rupture rows.
    #[serde(rename = "curva", skip_serializing_if = "Option::is_none")]
    pub curve: Option<Curve>,
    /// Units on hand, for forecast rows.
    #[serde(rename = "estoque", skip_serializing_if = "Option::is_none")]
    pub stock: Option<Decimal>,
    /// Average daily sales, for forecast rows.
    #[serde(rename = "venda_media_dia", skip_serializing_if = "Option::is_none")]
    pub avg_daily_sales: Option<Decimal>,
    /// Days until stock runs out.
    #[serde(rename = "dias_cobertura", skip_serializing_if = "Option::is_none")]
    pub coverage_days: Option<Decimal>,
    /// Projected stock-out date.
    #[serde(rename = "data_ruptura_prevista", skip_serializing_if = "Option::is_none")]
    pub projected_rupture: Option<NaiveDate>,
    /// Statement line classification.
    #[serde(rename = "natureza", skip_serializing_if = "Option::is_none")]
    pub nature: Option<StatementNature>,
}

/// A leaf line item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LineItem {
    /// Branch the row came from.
    #[serde(rename = "filial")]
    pub branch: BranchId,
    /// Product or account code.
    #[serde(rename = "codigo")]
    pub entity_id: String,
    /// Descriptive text.
    #[serde(rename = "descricao")]
    pub description: String,
    /// Quantity.
    #[serde(rename = "qtde")]
    pub quantity: Decimal,
    /// Value.
    #[serde(rename = "valor")]
    pub value: Decimal,
    /// Kind-specific fields.
    #[serde(flatten)]
    pub extras: LineExtras,
}

impl From<ItemRow> for LineItem {
    fn from(row: ItemRow) -> Self {
        let mut extras = LineExtras::default();
        match row.detail {
            ItemDetail::Plain => {}
            ItemDetail::Curve { curve } => extras.curve = Some(curve),
            ItemDetail::Coverage {
                stock,
                avg_daily_sales,
            } => {
                extras.stock = Some(stock);
                extras.avg_daily_sales = Some(avg_daily_sales);
            }
            ItemDetail::Statement { nature } => extras.nature = Some(nature),
        }

        Self {
            branch: row.branch,
            entity_id: row.entity_id,
            description: row.description,
            quantity: row.quantity,
            value: row.value,
            extras,
        }
    }
}

/// One grouping node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HierarchyNode {
    /// Grouping key.
    #[serde(rename = "nome")]
    pub key: GroupKey,
    /// Depth, zero at the top level.
    #[serde(rename = "nivel")]
    pub depth: usize,
    /// Sum of quantities below this node.
    #[serde(rename = "total_qtde")]
    pub total_quantity: Decimal,
    /// Sum of values below this node.
    #[serde(rename = "total_valor")]
    pub total_value: Decimal,
    /// Reference metric merged after aggregation.
    #[serde(rename = "venda_setor", skip_serializing_if = "Option::is_none")]
    pub reference_value: Option<Decimal>,
    /// `total_value` as a percentage of `reference_value`.
    #[serde(rename = "perc_venda_setor", skip_serializing_if = "Option::is_none")]
    pub reference_ratio_pct: Option<Decimal>,
    /// Comparison against PAM / PAA.
    #[serde(rename = "comparativo", skip_serializing_if = "Option::is_none")]
    pub comparison: Option<PeriodComparison>,
    /// Child nodes, empty at the deepest level.
    #[serde(rename = "subgrupos", skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<HierarchyNode>,
    /// Line items, only at the deepest level.
    #[serde(rename = "itens", skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<LineItem>,
}

impl HierarchyNode {
    /// Total number of line items below this node.
    #[must_use]
    pub fn item_count(&self) -> usize {
        self.items.len() + self.children.iter().map(Self::item_count).sum::<usize>()
    }

    /// Removes items failing `keep` and recomputes totals, dropping emptied nodes.
    pub fn retain_items(nodes: &mut Vec<Self>, keep: &mut impl FnMut(&LineItem) -> bool) {
        for node in nodes.iter_mut() {
            if node.children.is_empty() {
                node.items.retain(|item| keep(item));
                node.total_quantity = node.items.iter().map(|i| i.quantity).sum();
                node.total_value = node.items.iter().map(|i| i.value).sum();
            } else {
                Self::retain_items(&mut node.children, keep);
                node.total_quantity = node.children.iter().map(|c| c.total_quantity).sum();
                node.total_value = node.children.iter().map(|c| c.total_value).sum();
            }
        }
        nodes.retain(|node| !node.children.is_empty() || !node.items.is_empty());
    }
}

/// Aggregate totals over a whole hierarchy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReportTotals {
    /// Sum of top-level quantities.
    #[serde(rename = "total_qtde")]
    pub quantity: Decimal,
    /// Sum of top-level values.
    #[serde(rename = "total_valor")]
    pub value: Decimal,
    /// Sum of top-level reference values, when merged.
    #[serde(rename = "venda_setor", skip_serializing_if = "Option::is_none")]
    pub reference_value: Option<Decimal>,
    /// `value` as a percentage of `reference_value`.
    #[serde(rename = "perc_venda_setor", skip_serializing_if = "Option::is_none")]
    pub reference_ratio_pct: Option<Decimal>,
    /// Number of line items.
    #[serde(rename = "total_itens")]
    pub items: usize,
}

/// Reference totals keyed by grouping path.
#[derive(Debug, Clone, Default)]
pub struct ReferenceTotals {
    level: usize,
    totals: HashMap<HierarchyPath, Decimal>,
}

impl ReferenceTotals {
    /// Sums reference rows per path of `level` keys, across branches.
    #[must_use]
    pub fn from_rows<'a>(rows: impl IntoIterator<Item = &'a ReferenceRow>, level: usize) -> Self {
        let mut totals: HashMap<HierarchyPath, Decimal> = HashMap::new();
        for row in rows {
            *totals
                .entry(HierarchyPath::fitted(&row.keys, level))
                .or_default() += row.value;
        }
        Self { level, totals }
    }

    /// Number of grouping levels the totals are keyed by.
    #[must_use]
    pub const fn level(&self) -> usize {
        self.level
    }

    /// Reference at `path`, zero when absent.
    #[must_use]
    pub fn get(&self, path: &HierarchyPath) -> Decimal {
        self.totals.get(path).copied().unwrap_or_default()
    }
}

// ============================================================================
// Aggregator
// ============================================================================

/// Builds sorted hierarchies from line items.
pub struct HierarchyAggregator;

impl HierarchyAggregator {
    /// Folds `items` into a tree of `depth` grouping levels, then sorts it.
    ///
    /// Missing keys are padded with the unclassified bucket; surplus keys are
    /// ignored. A depth of zero is treated as one.
    #[must_use]
    pub fn aggregate(items: impl IntoIterator<Item = ItemRow>, depth: usize) -> Vec<HierarchyNode> {
        let depth = depth.max(1);
        let mut root = NodeBuilder::root();

        for item in items {
            let path = HierarchyPath::fitted(&item.keys, depth);
            let (quantity, value) = (item.quantity, item.value);

            let mut node = &mut root;
            for (level, key) in path.keys().iter().enumerate() {
                node = node.child_mut(key, level);
                node.quantity += quantity;
                node.value += value;
            }
            node.items.push(LineItem::from(item));
        }

        let mut nodes = root.into_children();
        Self::sort_hierarchy(&mut nodes);
        nodes
    }

    /// Sorts every sibling list: descending value, unclassified last, then name.
    ///
    /// Line items are sorted by descending value, then code and branch.
    pub fn sort_hierarchy(nodes: &mut [HierarchyNode]) {
        nodes.sort_by(compare_nodes);
        for node in nodes {
            Self::sort_hierarchy(&mut node.children);
            node.items.sort_by(compare_items);
        }
    }

    /// Sets `reference_value` and `reference_ratio_pct` on every node at the
    /// level `totals` is keyed by. Nodes without a reference get zero.
    pub fn merge_reference_totals(nodes: &mut [HierarchyNode], totals: &ReferenceTotals) {
        merge_at(nodes, &HierarchyPath::default(), totals);
    }

    /// Sums the top level of a hierarchy.
    #[must_use]
    pub fn flatten_totals(nodes: &[HierarchyNode]) -> ReportTotals {
        let reference_value = nodes
            .iter()
            .filter_map(|node| node.reference_value)
            .reduce(|a, b| a + b);
        let value: Decimal = nodes.iter().map(|node| node.total_value).sum();

        ReportTotals {
            quantity: nodes.iter().map(|node| node.total_quantity).sum(),
            value,
            reference_value,
            reference_ratio_pct: reference_value.map(|reference| ratio_pct(value, reference)),
            items: nodes.iter().map(HierarchyNode::item_count).sum(),
        }
    }
}

fn merge_at(nodes: &mut [HierarchyNode], parent: &HierarchyPath, totals: &ReferenceTotals) {
    for node in nodes {
        let path = parent.child(node.key.clone());
        if path.len() == totals.level() {
            let reference = totals.get(&path);
            node.reference_value = Some(reference);
            node.reference_ratio_pct = Some(ratio_pct(node.total_value, reference));
        } else if path.len() < totals.level() {
            merge_at(&mut node.children, &path, totals);
        }
    }
}

fn compare_nodes(a: &HierarchyNode, b: &HierarchyNode) -> Ordering {
    a.key
        .is_unclassified()
        .cmp(&b.key.is_unclassified())
        .then_with(|| b.total_value.cmp(&a.total_value))
        .then_with(|| a.key.cmp(&b.key))
}

fn compare_items(a: &LineItem, b: &LineItem) -> Ordering {
    b.value
        .cmp(&a.value)
        .then_with(|| a.entity_id.cmp(&b.entity_id))
        .then_with(|| a.branch.cmp(&b.branch))
}

/// Mutable node used during the fold. Children keep first-seen order until
/// the final sort.
struct NodeBuilder {
    key: GroupKey,
    depth: usize,
    quantity: Decimal,
    value: Decimal,
    index: HashMap<GroupKey, usize>,
    children: Vec<NodeBuilder>,
    items: Vec<LineItem>,
}

impl NodeBuilder {
    fn root() -> Self {
        Self::new(GroupKey::Unclassified, 0)
    }

    fn new(key: GroupKey, depth: usize) -> Self {
        Self {
            key,
            depth,
            quantity: Decimal::ZERO,
            value: Decimal::ZERO,
            index: HashMap::new(),
            children: Vec::new(),
            items: Vec::new(),
        }
    }

    fn child_mut(&mut self, key: &GroupKey, depth: usize) -> &mut Self {
        let slot = if let Some(&slot) = self.index.get(key) {
            slot
        } else {
            self.children.push(Self::new(key.clone(), depth));
            let slot = self.children.len() - 1;
            self.index.insert(key.clone(), slot);
            slot
        };
        &mut self.children[slot]
    }

    fn into_children(self) -> Vec<HierarchyNode> {
        self.children.into_iter().map(Self::into_node).collect()
    }

    fn into_node(self) -> HierarchyNode {
        HierarchyNode {
            key: self.key,
            depth: self.depth,
            total_quantity: self.quantity,
            total_value: self.value,
            reference_value: None,
            reference_ratio_pct: None,
            comparison: None,
            children: self.children.into_iter().map(Self::into_node).collect(),
            items: self.items,
        }
    }
}
