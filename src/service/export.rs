//! CSV rendering of one statement.

use crate::error::{LedgerError, Result};
use crate::models::{LineFigures, StatementView, Subtotal};
use bigdecimal::BigDecimal;

const HEADER: [&str; 13] = [
    "section",
    "id",
    "article",
    "description",
    "kind",
    "unit",
    "unit_price",
    "precedent_qty",
    "current_qty",
    "total_qty",
    "precedent_amount",
    "current_amount",
    "total_amount",
];

fn money(value: &BigDecimal) -> String {
    value.with_scale(2).to_string()
}

fn quantity(value: &BigDecimal) -> String {
    value.normalized().to_string()
}

fn figure_columns(figures: &LineFigures) -> [String; 7] {
    [
        money(&figures.unit_price),
        quantity(&figures.precedent_qty),
        quantity(&figures.current_qty),
        quantity(&figures.total_qty),
        money(&figures.precedent_amount),
        money(&figures.current_amount),
        money(&figures.total_amount),
    ]
}

fn subtotal_record(label: &str, subtotal: &Subtotal) -> Vec<String> {
    let mut record = vec![
        "subtotal".to_string(),
        String::new(),
        String::new(),
        label.to_string(),
    ];
    record.extend(std::iter::repeat(String::new()).take(6));
    record.push(money(&subtotal.precedent));
    record.push(money(&subtotal.current));
    record.push(money(&subtotal.total));
    record
}

/// Lines, then amendments, then the lines / amendments / grand subtotals.
pub fn statement_to_csv(view: &StatementView) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(HEADER)?;

    for line in &view.statement.lines {
        let mut record = vec![
            "line".to_string(),
            line.id.to_string(),
            line.article.clone(),
            line.description.clone(),
            line.kind.as_str().to_string(),
            line.unit.clone(),
        ];
        record.extend(figure_columns(&line.figures));
        writer.write_record(&record)?;
    }

    for amendment in &view.statement.amendments {
        let mut record = vec![
            "amendment".to_string(),
            amendment.id.to_string(),
            amendment.article.clone(),
            amendment.description.clone(),
            amendment.kind.as_str().to_string(),
            amendment.unit.clone(),
        ];
        record.extend(figure_columns(&amendment.figures));
        writer.write_record(&record)?;
    }

    writer.write_record(subtotal_record("lines", &view.totals.lines))?;
    writer.write_record(subtotal_record("amendments", &view.totals.amendments))?;
    writer.write_record(subtotal_record("grand", &view.totals.grand))?;

    let bytes = writer
        .into_inner()
        .map_err(|e| LedgerError::Internal(format!("flushing csv: {}", e)))?;
    String::from_utf8(bytes).map_err(|e| LedgerError::Internal(format!("csv encoding: {}", e)))
}
