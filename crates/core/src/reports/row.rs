//! Typed raw rows, validated once at the fetch boundary.
//!
//! The data source hands back loosely typed JSON objects. Each dataset knows
//! which fields it expects; everything downstream works on `RawReportRow`.
//! A malformed field never fails a row: numbers fall back to zero and grouping
//! keys fall back to the unclassified bucket.

use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Serialize, Serializer};
use serde_json::Value;
use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;
use vitrine_shared::types::BranchId;

/// Label shown for rows without a usable grouping key.
pub const UNCLASSIFIED_LABEL: &str = "SEM DEPARTAMENTO";

/// Values the source uses to mean "no group".
const UNCLASSIFIED_SENTINELS: &[&str] = &[
    "SEM DEPARTAMENTO",
    "SEM SETOR",
    "SEM GRUPO",
    "NAO CLASSIFICADO",
    "NAO INFORMADO",
];

// ============================================================================
// Grouping keys
// ============================================================================

/// One level of a hierarchy path. Rows merge by name, never by source id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum GroupKey {
    /// A named group, trimmed.
    Named(String),
    /// Missing, blank, or sentinel key.
    Unclassified,
}

impl GroupKey {
    /// Builds a key from raw text.
    #[must_use]
    pub fn from_raw(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Self::Unclassified;
        }
        let folded = fold_accents(trimmed).to_ascii_uppercase();
        if UNCLASSIFIED_SENTINELS.contains(&folded.as_str()) {
            Self::Unclassified
        } else {
            Self::Named(trimmed.to_string())
        }
    }

    /// Builds a key from an optional JSON field.
    #[must_use]
    pub fn from_value(value: Option<&Value>) -> Self {
        match value {
            Some(Value::String(s)) => Self::from_raw(s),
            Some(Value::Number(n)) => Self::Named(n.to_string()),
            _ => Self::Unclassified,
        }
    }

    /// Returns true for the unclassified bucket.
    #[must_use]
    pub const fn is_unclassified(&self) -> bool {
        matches!(self, Self::Unclassified)
    }

    /// Display label.
    #[must_use]
    pub fn label(&self) -> &str {
        match self {
            Self::Named(name) => name,
            Self::Unclassified => UNCLASSIFIED_LABEL,
        }
    }
}

impl std::fmt::Display for GroupKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl Serialize for GroupKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

/// Ordered composite key locating a node in a hierarchy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HierarchyPath(Vec<GroupKey>);

impl HierarchyPath {
    /// Creates a path from keys as given.
    #[must_use]
    pub const fn new(keys: Vec<GroupKey>) -> Self {
        Self(keys)
    }

    /// Creates a path of exactly `depth` keys, padding with unclassified.
    #[must_use]
    pub fn fitted(keys: &[GroupKey], depth: usize) -> Self {
        let mut fitted: Vec<GroupKey> = keys.iter().take(depth).cloned().collect();
        fitted.resize(depth, GroupKey::Unclassified);
        Self(fitted)
    }

    /// Returns the keys.
    #[must_use]
    pub fn keys(&self) -> &[GroupKey] {
        &self.0
    }

    /// Returns a new path with `key` appended.
    #[must_use]
    pub fn child(&self, key: GroupKey) -> Self {
        let mut keys = self.0.clone();
        keys.push(key);
        Self(keys)
    }

    /// Number of levels.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true for the root path.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Display for HierarchyPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, key) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" > ")?;
            }
            f.write_str(key.label())?;
        }
        Ok(())
    }
}

// ============================================================================
// Classifications
// ============================================================================

/// ABCD sales classification of a product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Curve {
    /// Top sellers.
    A,
    /// Second bucket.
    B,
    /// Third bucket.
    C,
    /// Tail.
    D,
    /// No usable classification.
    #[serde(rename = "SEM CURVA")]
    Unclassified,
}

impl Curve {
    /// Parses `A`-`D` (case-insensitive, optionally prefixed with `curva`).
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let upper = raw.trim().to_ascii_uppercase();
        let code = upper.strip_prefix("CURVA").map_or(upper.as_str(), str::trim);
        match code {
            "A" => Self::A,
            "B" => Self::B,
            "C" => Self::C,
            "D" => Self::D,
            _ => Self::Unclassified,
        }
    }
}

impl FromStr for Curve {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match Self::parse(s) {
            Self::Unclassified => Err(format!("unknown curve: {s}")),
            curve => Ok(curve),
        }
    }
}

/// Role of an income-statement line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatementNature {
    /// Gross revenue.
    Revenue,
    /// Taxes and returns deducted from revenue.
    Deduction,
    /// Cost of goods sold.
    Cost,
    /// Operating expenses.
    Expense,
    /// Anything else; reported but not part of the indicators.
    Other,
}

impl StatementNature {
    /// Classifies a free-text nature label.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let folded = fold_accents(raw.trim()).to_ascii_uppercase();
        if folded.starts_with("RECEITA") || folded == "FATURAMENTO" {
            Self::Revenue
        } else if folded.starts_with("DEDUC") || folded.starts_with("IMPOSTO") {
            Self::Deduction
        } else if folded.starts_with("CMV") || folded.starts_with("CUSTO") {
            Self::Cost
        } else if folded.starts_with("DESPESA") {
            Self::Expense
        } else {
            Self::Other
        }
    }
}

// ============================================================================
// Rows
// ============================================================================

/// Kind-specific measures carried by an item row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemDetail {
    /// No extra measures.
    Plain,
    /// Rupture row with its ABCD curve.
    Curve {
        /// Product classification.
        curve: Curve,
    },
    /// Forecast row with stock coverage inputs.
    Coverage {
        /// Units on hand.
        stock: Decimal,
        /// Average units sold per day.
        avg_daily_sales: Decimal,
    },
    /// Income-statement line.
    Statement {
        /// Line classification.
        nature: StatementNature,
    },
}

/// A line item destined for a hierarchy leaf.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemRow {
    /// Branch the row was fetched for.
    pub branch: BranchId,
    /// Grouping keys, outermost first.
    pub keys: Vec<GroupKey>,
    /// Product or account code.
    pub entity_id: String,
    /// Descriptive text.
    pub description: String,
    /// Quantity measure.
    pub quantity: Decimal,
    /// Monetary measure.
    pub value: Decimal,
    /// Kind-specific measures.
    pub detail: ItemDetail,
}

/// A reference total for one grouping key (e.g. sector sales).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceRow {
    /// Branch the row was fetched for.
    pub branch: BranchId,
    /// Grouping keys, outermost first.
    pub keys: Vec<GroupKey>,
    /// Reference value.
    pub value: Decimal,
}

/// One validated record from the data source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawReportRow {
    /// A line item.
    Item(ItemRow),
    /// A reference total.
    Reference(ReferenceRow),
}

/// A parsed row plus whether any field had to be coerced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedRow {
    /// The validated row.
    pub row: RawReportRow,
    /// True if a numeric field was missing or unparsable.
    pub malformed: bool,
}

// ============================================================================
// Datasets
// ============================================================================

/// A query the data source can answer for one branch and period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Dataset {
    /// Lost / written-off items by department.
    LossItems,
    /// Sales per tier-3 department, used as the loss reference.
    SectorSales,
    /// Out-of-stock items with their ABCD curve.
    RuptureByCurve,
    /// Stock coverage inputs per product.
    RuptureForecast,
    /// Income-statement lines.
    StatementLines,
}

impl std::fmt::Display for Dataset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::LossItems => "loss_items",
            Self::SectorSales => "sector_sales",
            Self::RuptureByCurve => "rupture_by_curve",
            Self::RuptureForecast => "rupture_forecast",
            Self::StatementLines => "statement_lines",
        })
    }
}

impl Dataset {
    /// Name of the stored procedure in the tenant schema.
    #[must_use]
    pub const fn procedure(self) -> &'static str {
        match self {
            Self::LossItems => "rpt_perdas",
            Self::SectorSales => "rpt_venda_setor",
            Self::RuptureByCurve => "rpt_ruptura_curva",
            Self::RuptureForecast => "rpt_projecao_ruptura",
            Self::StatementLines => "rpt_dre",
        }
    }

    /// Grouping key fields, outermost first.
    #[must_use]
    pub const fn key_fields(self) -> &'static [&'static str] {
        match self {
            Self::LossItems => &["dept3", "dept2", "dept1"],
            Self::SectorSales => &["dept3"],
            Self::RuptureByCurve | Self::RuptureForecast => &["dept1"],
            Self::StatementLines => &["natureza", "grupo"],
        }
    }

    /// Validates one raw record fetched for `branch`.
    #[must_use]
    pub fn parse_row(self, branch: &BranchId, raw: &Value) -> ParsedRow {
        let fields = RawFields::new(raw);
        let keys = self
            .key_fields()
            .iter()
            .map(|name| GroupKey::from_value(fields.get(name)))
            .collect();

        if self == Self::SectorSales {
            let (value, ok) = coerce_decimal(fields.get("venda"));
            return ParsedRow {
                row: RawReportRow::Reference(ReferenceRow {
                    branch: branch.clone(),
                    keys,
                    value,
                }),
                malformed: !ok || !fields.is_object(),
            };
        }

        let (value, value_ok) = coerce_decimal(fields.get("valor"));
        let mut malformed = !value_ok || !fields.is_object();

        let (quantity, detail) = match self {
            Self::StatementLines => {
                let nature = fields
                    .get("natureza")
                    .and_then(Value::as_str)
                    .map_or(StatementNature::Other, StatementNature::parse);
                (Decimal::ZERO, ItemDetail::Statement { nature })
            }
            Self::RuptureForecast => {
                let (stock, stock_ok) = coerce_decimal(fields.get("estoque"));
                let (avg, avg_ok) = coerce_decimal(fields.get("venda_media_dia"));
                malformed |= !stock_ok || !avg_ok;
                (
                    stock,
                    ItemDetail::Coverage {
                        stock,
                        avg_daily_sales: avg,
                    },
                )
            }
            Self::RuptureByCurve => {
                let (quantity, ok) = coerce_decimal(fields.get("qtde"));
                malformed |= !ok;
                let curve = fields
                    .get("curva")
                    .and_then(Value::as_str)
                    .map_or(Curve::Unclassified, Curve::parse);
                (quantity, ItemDetail::Curve { curve })
            }
            Self::LossItems | Self::SectorSales => {
                let (quantity, ok) = coerce_decimal(fields.get("qtde"));
                malformed |= !ok;
                (quantity, ItemDetail::Plain)
            }
        };

        let entity_field = if self == Self::StatementLines {
            "conta"
        } else {
            "codigo"
        };

        ParsedRow {
            row: RawReportRow::Item(ItemRow {
                branch: branch.clone(),
                keys,
                entity_id: fields.text(entity_field),
                description: fields.text("descricao"),
                quantity,
                value,
                detail,
            }),
            malformed,
        }
    }
}

struct RawFields<'a>(Option<&'a serde_json::Map<String, Value>>);

impl<'a> RawFields<'a> {
    fn new(raw: &'a Value) -> Self {
        Self(raw.as_object())
    }

    const fn is_object(&self) -> bool {
        self.0.is_some()
    }

    fn get(&self, name: &str) -> Option<&'a Value> {
        self.0.and_then(|map| map.get(name))
    }

    fn text(&self, name: &str) -> String {
        match self.get(name) {
            Some(Value::String(s)) => s.trim().to_string(),
            Some(Value::Number(n)) => n.to_string(),
            _ => String::new(),
        }
    }
}

/// Largest magnitude accepted for a single field. Anything above it is
/// treated as malformed so report totals can never overflow.
const MAX_FIELD_MAGNITUDE: i64 = 1_000_000_000_000_000;

/// Parses a numeric field; the flag is false when zero was substituted.
///
/// Accepts JSON numbers and strings such as `"12.5"`, `"12,50"` and
/// `"1.234,56"`. Without a comma the dot is the decimal point, so `"1.234"`
/// reads as one point two three four. Values whose magnitude exceeds one
/// quadrillion are rejected.
#[must_use]
pub fn coerce_decimal(value: Option<&Value>) -> (Decimal, bool) {
    let parsed = match value {
        Some(Value::Number(n)) => n
            .as_i64()
            .map(Decimal::from)
            .or_else(|| parse_decimal_text(&n.to_string())),
        Some(Value::String(s)) => parse_decimal_text(s),
        _ => None,
    };
    parsed
        .filter(|d| d.abs() <= Decimal::from(MAX_FIELD_MAGNITUDE))
        .map_or((Decimal::ZERO, false), |d| (d, true))
}

// A comma marks pt-BR notation: dots are thousands separators there.
fn parse_decimal_text(raw: &str) -> Option<Decimal> {
    let compact: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    if compact.is_empty() {
        return None;
    }
    let normalized = if compact.contains(',') {
        compact.replace('.', "").replace(',', ".")
    } else {
        compact
    };
    Decimal::from_str(&normalized)
        .or_else(|_| Decimal::from_scientific(&normalized))
        .ok()
}

fn fold_accents(s: &str) -> String {
    s.nfd().filter(|c| !is_combining_mark(*c)).collect()
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use rust_decimal_macros::dec;
    use serde_json::json;

    use super::*;

    fn branch() -> BranchId {
        "10".parse().unwrap()
    }

    #[test]
    fn test_coerce_decimal_formats() {
        assert_eq!(coerce_decimal(Some(&json!(12))), (dec!(12), true));
        assert_eq!(coerce_decimal(Some(&json!(12.5))), (dec!(12.5), true));
        assert_eq!(coerce_decimal(Some(&json!("12,50"))), (dec!(12.50), true));
        assert_eq!(coerce_decimal(Some(&json!("1.234,56"))), (dec!(1234.56), true));
        assert_eq!(coerce_decimal(Some(&json!(" 7.25 "))), (dec!(7.25), true));
        assert_eq!(coerce_decimal(Some(&json!("1e3"))), (dec!(1000), true));
    }

    #[test]
    fn test_coerce_decimal_falls_back_to_zero() {
        assert_eq!(coerce_decimal(None), (Decimal::ZERO, false));
        assert_eq!(coerce_decimal(Some(&Value::Null)), (Decimal::ZERO, false));
        assert_eq!(coerce_decimal(Some(&json!("abc"))), (Decimal::ZERO, false));
        assert_eq!(coerce_decimal(Some(&json!(""))), (Decimal::ZERO, false));
        assert_eq!(coerce_decimal(Some(&json!(true))), (Decimal::ZERO, false));
    }

    #[test]
    fn test_coerce_decimal_rejects_out_of_range_magnitudes() {
        let huge = json!("79228162514264337593543950335");
        assert_eq!(coerce_decimal(Some(&huge)), (Decimal::ZERO, false));
        assert_eq!(
            coerce_decimal(Some(&json!("-1000000000000000,01"))),
            (Decimal::ZERO, false)
        );
        assert_eq!(
            coerce_decimal(Some(&json!(1_000_000_000_000_000_i64))),
            (dec!(1000000000000000), true)
        );
    }

    #[rstest]
    #[case("1.234", dec!(1.234))]
    #[case("1.234,56", dec!(1234.56))]
    #[case("1.234.567,8", dec!(1234567.8))]
    #[case("-0,5", dec!(-0.5))]
    fn test_coerce_decimal_dot_and_comma_notation(#[case] raw: &str, #[case] expected: Decimal) {
        assert_eq!(coerce_decimal(Some(&json!(raw))), (expected, true));
    }

    #[test]
    fn test_group_key_sentinels() {
        assert_eq!(GroupKey::from_raw("  "), GroupKey::Unclassified);
        assert_eq!(GroupKey::from_raw("sem departamento"), GroupKey::Unclassified);
        assert_eq!(GroupKey::from_raw("NÃO CLASSIFICADO"), GroupKey::Unclassified);
        assert_eq!(GroupKey::from_raw(" SECOS "), GroupKey::Named("SECOS".into()));
        assert_eq!(GroupKey::from_raw("NA\u{303}O CLASSIFICADO"), GroupKey::Unclassified);
        assert_eq!(GroupKey::from_raw("Não Informado"), GroupKey::Unclassified);
        assert_eq!(GroupKey::from_value(None), GroupKey::Unclassified);
        assert_eq!(GroupKey::from_value(Some(&json!(42))), GroupKey::Named("42".into()));
    }

    #[test]
    fn test_group_key_with_separator_characters_stays_distinct() {
        let a = HierarchyPath::new(vec![GroupKey::from_raw("A|B"), GroupKey::from_raw("C")]);
        let b = HierarchyPath::new(vec![GroupKey::from_raw("A"), GroupKey::from_raw("B|C")]);
        assert_ne!(a, b);
    }

    #[test]
    fn test_path_fitting_and_display() {
        let keys = vec![GroupKey::Named("MERCEARIA".into())];
        let path = HierarchyPath::fitted(&keys, 3);
        assert_eq!(path.len(), 3);
        assert_eq!(path.to_string(), "MERCEARIA > SEM DEPARTAMENTO > SEM DEPARTAMENTO");
        assert_eq!(HierarchyPath::fitted(path.keys(), 1).to_string(), "MERCEARIA");
    }

    #[test]
    fn test_curve_and_nature_parsing() {
        assert_eq!(Curve::parse("a"), Curve::A);
        assert_eq!(Curve::parse("Curva C"), Curve::C);
        assert_eq!(Curve::parse("Z"), Curve::Unclassified);
        assert!("E".parse::<Curve>().is_err());
        assert_eq!(StatementNature::parse("Receita Bruta"), StatementNature::Revenue);
        assert_eq!(StatementNature::parse("DEDUÇÕES"), StatementNature::Deduction);
        assert_eq!(StatementNature::parse("DEDUC\u{327}O\u{303}ES"), StatementNature::Deduction);
        assert_eq!(StatementNature::parse("Dedução sobre vendas"), StatementNature::Deduction);
        assert_eq!(StatementNature::parse("CMV"), StatementNature::Cost);
        assert_eq!(StatementNature::parse("Despesas Operacionais"), StatementNature::Expense);
        assert_eq!(StatementNature::parse("Outros"), StatementNature::Other);
    }

    #[test]
    fn test_parse_loss_row() {
        let raw = json!({
            "dept3": "MERCEARIA", "dept2": "SECOS", "dept1": null,
            "codigo": 789, "descricao": " Arroz 5kg ", "qtde": "3", "valor": "120,00"
        });
        let parsed = Dataset::LossItems.parse_row(&branch(), &raw);
        assert!(!parsed.malformed);
        let RawReportRow::Item(item) = parsed.row else {
            panic!("expected item row");
        };
        assert_eq!(item.keys[2], GroupKey::Unclassified);
        assert_eq!(item.entity_id, "789");
        assert_eq!(item.description, "Arroz 5kg");
        assert_eq!(item.quantity, dec!(3));
        assert_eq!(item.value, dec!(120.00));
        assert_eq!(item.detail, ItemDetail::Plain);
    }

    #[test]
    fn test_parse_malformed_row_does_not_fail() {
        let parsed = Dataset::LossItems.parse_row(&branch(), &json!({"valor": "n/a"}));
        assert!(parsed.malformed);
        let RawReportRow::Item(item) = parsed.row else {
            panic!("expected item row");
        };
        assert_eq!(item.value, Decimal::ZERO);
        assert!(item.keys.iter().all(GroupKey::is_unclassified));

        let parsed = Dataset::LossItems.parse_row(&branch(), &json!([1, 2]));
        assert!(parsed.malformed);
    }

    #[test]
    fn test_parse_reference_row() {
        let raw = json!({"dept3": "MERCEARIA", "venda": 1000});
        let parsed = Dataset::SectorSales.parse_row(&branch(), &raw);
        assert_eq!(
            parsed.row,
            RawReportRow::Reference(ReferenceRow {
                branch: branch(),
                keys: vec![GroupKey::Named("MERCEARIA".into())],
                value: dec!(1000),
            })
        );
    }

    #[test]
    fn test_parse_forecast_and_statement_rows() {
        let raw = json!({"dept1": "ARROZ", "codigo": "1", "estoque": "10", "venda_media_dia": "2,5", "valor": 50});
        let RawReportRow::Item(item) = Dataset::RuptureForecast.parse_row(&branch(), &raw).row else {
            panic!("expected item row");
        };
        assert_eq!(
            item.detail,
            ItemDetail::Coverage {
                stock: dec!(10),
                avg_daily_sales: dec!(2.5)
            }
        );

        let raw = json!({"natureza": "CMV", "grupo": "Mercadorias", "conta": "3.1", "valor": "900"});
        let RawReportRow::Item(item) = Dataset::StatementLines.parse_row(&branch(), &raw).row else {
            panic!("expected item row");
        };
        assert_eq!(item.entity_id, "3.1");
        assert_eq!(
            item.detail,
            ItemDetail::Statement {
                nature: StatementNature::Cost
            }
        );
    }
}
