use crate::models::amount;
use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Line kind. Headings only structure the statement and never carry figures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LineKind {
    #[default]
    Standard,
    Title,
    Subtitle,
}

impl LineKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LineKind::Standard => "STANDARD",
            LineKind::Title => "TITLE",
            LineKind::Subtitle => "SUBTITLE",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s.trim().to_ascii_uppercase().as_str() {
            "TITLE" => LineKind::Title,
            "SUBTITLE" => LineKind::Subtitle,
            _ => LineKind::Standard,
        }
    }

    pub fn is_heading(&self) -> bool {
        matches!(self, LineKind::Title | LineKind::Subtitle)
    }
}

/// Line template read from a base order or a subcontract order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineTemplate {
    pub line_ref: i64,
    #[serde(default)]
    pub article: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub kind: LineKind,
    #[serde(default)]
    pub unit: String,
    #[serde(
        serialize_with = "amount::serialize",
        deserialize_with = "amount::deserialize"
    )]
    pub unit_price: BigDecimal,
    #[serde(
        serialize_with = "amount::serialize",
        deserialize_with = "amount::deserialize"
    )]
    pub quantity: BigDecimal,
}

/// Quantities and amounts of one row (line or amendment).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LineFigures {
    #[serde(serialize_with = "amount::serialize")]
    pub unit_price: BigDecimal,
    #[serde(serialize_with = "amount::serialize")]
    pub precedent_qty: BigDecimal,
    #[serde(serialize_with = "amount::serialize")]
    pub current_qty: BigDecimal,
    #[serde(serialize_with = "amount::serialize")]
    pub total_qty: BigDecimal,
    #[serde(serialize_with = "amount::serialize")]
    pub precedent_amount: BigDecimal,
    #[serde(serialize_with = "amount::serialize")]
    pub current_amount: BigDecimal,
    #[serde(serialize_with = "amount::serialize")]
    pub total_amount: BigDecimal,
}

/// Statement line cloned from an order line.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LineItem {
    pub id: i64,
    pub line_ref: i64,
    pub article: String,
    pub description: String,
    pub kind: LineKind,
    pub unit: String,
    #[serde(flatten)]
    pub figures: LineFigures,
}

/// Free-form add-on line attached to one statement.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Amendment {
    pub id: i64,
    pub article: String,
    pub description: String,
    pub kind: LineKind,
    pub unit: String,
    #[serde(flatten)]
    pub figures: LineFigures,
}

/// Numeric patch shared by lines and amendments.
///
/// Each field accepts a number, a formatted string (`"1 234,50"`) or `null`.
/// Absent fields keep their stored value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FiguresPatch {
    #[serde(default, deserialize_with = "amount::deserialize_some")]
    pub unit_price: Option<Value>,
    #[serde(default, deserialize_with = "amount::deserialize_some")]
    pub precedent_qty: Option<Value>,
    #[serde(default, deserialize_with = "amount::deserialize_some")]
    pub current_qty: Option<Value>,
    #[serde(default, deserialize_with = "amount::deserialize_some")]
    pub precedent_amount: Option<Value>,
}

impl FiguresPatch {
    /// Precedent amount follows quantity × price unless entered explicitly.
    pub fn rederives_precedent(&self) -> bool {
        self.precedent_amount.is_none()
            && (self.unit_price.is_some() || self.precedent_qty.is_some())
    }
}

/// Input for adding an amendment.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AmendmentInput {
    #[serde(default)]
    pub article: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub kind: LineKind,
    #[serde(default)]
    pub unit: String,
    #[serde(flatten)]
    pub figures: FiguresPatch,
}

/// Input for editing an amendment.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AmendmentPatch {
    pub article: Option<String>,
    pub description: Option<String>,
    pub kind: Option<LineKind>,
    pub unit: Option<String>,
    #[serde(flatten)]
    pub figures: FiguresPatch,
}
