use crate::models::amount;
use bigdecimal::BigDecimal;
use serde::Serialize;

/// Precedent / current / total amounts of a group of rows
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Subtotal {
    #[serde(serialize_with = "amount::serialize")]
    pub precedent: BigDecimal,
    #[serde(serialize_with = "amount::serialize")]
    pub current: BigDecimal,
    #[serde(serialize_with = "amount::serialize")]
    pub total: BigDecimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatementTotals {
    pub lines: Subtotal,
    pub amendments: Subtotal,
    pub grand: Subtotal,
}

/// Flat-rate VAT applied to the grand total
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VatSummary {
    #[serde(serialize_with = "amount::serialize")]
    pub rate: BigDecimal,
    pub vat: Subtotal,
    pub gross: Subtotal,
}
