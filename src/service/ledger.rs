//! Statement state machine.
//!
//! A statement is a draft until finalized; finalized statements reject every
//! line and amendment write. Sequence numbers are gapless within a scope and
//! only the tail of a scope can be deleted. Stores run these rules inside their
//! transactions, so the checks always see the committed state.

use crate::error::{LedgerError, Result};
use crate::models::{
    Amendment, AmendmentInput, AmendmentPatch, Change, FiguresPatch, LineFigures, LineItem,
    LineKind, LineTemplate, MetaPatch, Mutation, Scope, Statement, StatementHeader,
    StatementState,
};
use crate::service::calculator::{coerce, coerce_or, compute_line, zero_figures};
use bigdecimal::{BigDecimal, Zero};
use chrono::{DateTime, Utc};

/// Next sequence number given the current maximum of a scope.
pub fn next_sequence(current_max: Option<i32>) -> i32 {
    current_max.map_or(1, |max| max + 1)
}

/// Fails unless `statement` is the tail of its scope.
pub fn ensure_tail(statement: &Statement, current_max: Option<i32>) -> Result<()> {
    match current_max {
        Some(max) if max == statement.sequence_number => Ok(()),
        Some(max) => Err(LedgerError::conflict(format!(
            "statement #{} is not the last of {} (last is #{})",
            statement.sequence_number, statement.scope, max
        ))),
        None => Err(LedgerError::not_found(format!("statement {}", statement.id))),
    }
}

/// Anchor for the subcontractor track: the latest client statement of the site.
pub fn select_anchor<'a>(
    client_statements: impl IntoIterator<Item = &'a Statement>,
) -> Option<&'a Statement> {
    client_statements
        .into_iter()
        .filter(|s| matches!(s.scope, Scope::Client { .. }))
        .max_by_key(|s| s.sequence_number)
}

fn blank_to_none(value: String) -> Option<String> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value)
    }
}

fn figures_from_template(template: &LineTemplate) -> LineFigures {
    compute_line(
        template.kind,
        template.unit_price.clone(),
        BigDecimal::zero(),
        BigDecimal::zero(),
        None,
    )
}

/// Recomputes figures after a patch, keeping unpatched fields.
fn patch_figures(kind: LineKind, stored: &LineFigures, patch: &FiguresPatch) -> Result<LineFigures> {
    let unit_price = coerce_or(patch.unit_price.as_ref(), &stored.unit_price)?;
    let precedent_qty = coerce_or(patch.precedent_qty.as_ref(), &stored.precedent_qty)?;
    let current_qty = coerce_or(patch.current_qty.as_ref(), &stored.current_qty)?;
    let precedent_amount = match &patch.precedent_amount {
        Some(value) => Some(coerce(value)?),
        None if patch.rederives_precedent() => None,
        None => Some(stored.precedent_amount.clone()),
    };

    Ok(compute_line(
        kind,
        unit_price,
        precedent_qty,
        current_qty,
        precedent_amount,
    ))
}

impl LineItem {
    pub fn from_template(id: i64, template: &LineTemplate) -> Self {
        Self {
            id,
            line_ref: template.line_ref,
            article: template.article.clone(),
            description: template.description.clone(),
            kind: template.kind,
            unit: template.unit.clone(),
            figures: figures_from_template(template),
        }
    }
}

impl Amendment {
    pub fn create(id: i64, input: AmendmentInput) -> Result<Self> {
        if input.article.trim().is_empty() && input.description.trim().is_empty() {
            return Err(LedgerError::validation(
                "an amendment needs an article or a description",
            ));
        }
        let figures = patch_figures(input.kind, &zero_figures(), &input.figures)?;

        Ok(Self {
            id,
            article: input.article,
            description: input.description,
            kind: input.kind,
            unit: input.unit,
            figures,
        })
    }

    fn apply_patch(&mut self, patch: AmendmentPatch) -> Result<()> {
        let mut next = self.clone();
        if let Some(article) = patch.article {
            next.article = article;
        }
        if let Some(description) = patch.description {
            next.description = description;
        }
        if let Some(kind) = patch.kind {
            next.kind = kind;
        }
        if let Some(unit) = patch.unit {
            next.unit = unit;
        }
        if next.article.trim().is_empty() && next.description.trim().is_empty() {
            return Err(LedgerError::validation(
                "an amendment needs an article or a description",
            ));
        }
        next.figures = patch_figures(next.kind, &self.figures, &patch.figures)?;
        *self = next;
        Ok(())
    }
}

impl Statement {
    /// Builds a fresh draft with zeroed quantities from order line templates.
    #[allow(clippy::too_many_arguments)]
    pub fn seed(
        id: i64,
        scope: Scope,
        sequence_number: i32,
        order_id: Option<i64>,
        anchor_statement_id: Option<i64>,
        header: StatementHeader,
        templates: &[LineTemplate],
        now: DateTime<Utc>,
    ) -> Self {
        let lines = templates
            .iter()
            .enumerate()
            .map(|(idx, t)| LineItem::from_template(idx as i64 + 1, t))
            .collect();

        Self {
            id,
            scope,
            sequence_number,
            order_id,
            anchor_statement_id,
            state: StatementState::Draft,
            date: header.date.unwrap_or_else(|| now.date_naive()),
            billing_month: header.billing_month.and_then(blank_to_none),
            comments: header.comments.and_then(blank_to_none),
            lines,
            amendments: Vec::new(),
            next_amendment_id: 1,
            version: 0,
            created_at: now,
        }
    }

    pub fn is_finalized(&self) -> bool {
        matches!(self.state, StatementState::Finalized { .. })
    }

    fn ensure_draft(&self) -> Result<()> {
        if self.is_finalized() {
            return Err(LedgerError::conflict(format!(
                "statement #{} of {} is finalized",
                self.sequence_number, self.scope
            )));
        }
        Ok(())
    }

    fn line_mut(&mut self, line_id: i64) -> Result<&mut LineItem> {
        let statement_id = self.id;
        self.lines
            .iter_mut()
            .find(|l| l.id == line_id)
            .ok_or_else(|| {
                LedgerError::not_found(format!("line {} on statement {}", line_id, statement_id))
            })
    }

    fn amendment_position(&self, amendment_id: i64) -> Result<usize> {
        self.amendments
            .iter()
            .position(|a| a.id == amendment_id)
            .ok_or_else(|| {
                LedgerError::not_found(format!(
                    "amendment {} on statement {}",
                    amendment_id, self.id
                ))
            })
    }

    fn update_meta(&mut self, patch: MetaPatch) {
        if let Some(date) = patch.date {
            self.date = date;
        }
        if let Some(billing_month) = patch.billing_month {
            self.billing_month = blank_to_none(billing_month);
        }
        if let Some(comments) = patch.comments {
            self.comments = blank_to_none(comments);
        }
    }

    /// Applies one write. On error the statement is left untouched.
    pub fn apply(&mut self, mutation: Mutation, now: DateTime<Utc>) -> Result<Change> {
        match mutation {
            Mutation::UpdateMeta(patch) => {
                self.update_meta(patch);
                Ok(Change::Header)
            }
            Mutation::Finalize => match self.state {
                StatementState::Draft => {
                    self.state = StatementState::Finalized { finalized_at: now };
                    Ok(Change::Header)
                }
                StatementState::Finalized { .. } => Err(LedgerError::conflict(format!(
                    "statement #{} of {} is already finalized",
                    self.sequence_number, self.scope
                ))),
            },
            Mutation::Reopen => match self.state {
                StatementState::Finalized { .. } => {
                    self.state = StatementState::Draft;
                    Ok(Change::Header)
                }
                StatementState::Draft => Err(LedgerError::conflict(format!(
                    "statement #{} of {} is not finalized",
                    self.sequence_number, self.scope
                ))),
            },
            Mutation::UpdateLine { line_id, patch } => {
                self.ensure_draft()?;
                let line = self.line_mut(line_id)?;
                line.figures = patch_figures(line.kind, &line.figures, &patch)?;
                Ok(Change::LineUpserted(line_id))
            }
            Mutation::DeleteLine { line_id } => {
                self.ensure_draft()?;
                self.line_mut(line_id)?;
                self.lines.retain(|l| l.id != line_id);
                Ok(Change::LineRemoved(line_id))
            }
            Mutation::AddAmendment(input) => {
                self.ensure_draft()?;
                let amendment = Amendment::create(self.next_amendment_id, input)?;
                let id = amendment.id;
                self.amendments.push(amendment);
                self.next_amendment_id += 1;
                Ok(Change::AmendmentUpserted(id))
            }
            Mutation::UpdateAmendment {
                amendment_id,
                patch,
            } => {
                self.ensure_draft()?;
                let idx = self.amendment_position(amendment_id)?;
                self.amendments[idx].apply_patch(patch)?;
                Ok(Change::AmendmentUpserted(amendment_id))
            }
            Mutation::DeleteAmendment { amendment_id } => {
                self.ensure_draft()?;
                let idx = self.amendment_position(amendment_id)?;
                self.amendments.remove(idx);
                Ok(Change::AmendmentRemoved(amendment_id))
            }
        }
    }
}
