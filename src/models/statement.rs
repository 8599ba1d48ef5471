use crate::models::{
    Amendment, AmendmentInput, AmendmentPatch, FiguresPatch, LineItem, LineTemplate,
    StatementTotals, VatSummary,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Numbering scope: the client track of a site, or one subcontractor on a site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "track", rename_all = "snake_case")]
pub enum Scope {
    Client { site_id: i64 },
    Subcontractor { site_id: i64, subcontractor_id: i64 },
}

impl Scope {
    pub fn site_id(&self) -> i64 {
        match self {
            Scope::Client { site_id } | Scope::Subcontractor { site_id, .. } => *site_id,
        }
    }

    pub fn subcontractor_id(&self) -> Option<i64> {
        match self {
            Scope::Client { .. } => None,
            Scope::Subcontractor {
                subcontractor_id, ..
            } => Some(*subcontractor_id),
        }
    }

    pub fn from_parts(site_id: i64, subcontractor_id: Option<i64>) -> Self {
        match subcontractor_id {
            Some(subcontractor_id) => Scope::Subcontractor {
                site_id,
                subcontractor_id,
            },
            None => Scope::Client { site_id },
        }
    }

    /// Key serializing creations and deletions within the scope.
    pub fn lock_key(&self) -> String {
        match self {
            Scope::Client { site_id } => format!("progress:site:{}", site_id),
            Scope::Subcontractor {
                site_id,
                subcontractor_id,
            } => format!("progress:site:{}:sub:{}", site_id, subcontractor_id),
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Client { site_id } => write!(f, "site {}", site_id),
            Scope::Subcontractor {
                site_id,
                subcontractor_id,
            } => write!(f, "subcontractor {} on site {}", subcontractor_id, site_id),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StatementState {
    Draft,
    Finalized { finalized_at: DateTime<Utc> },
}

/// Progress statement, client or subcontractor track.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Statement {
    pub id: i64,
    #[serde(flatten)]
    pub scope: Scope,
    pub sequence_number: i32,
    /// Base order (client track) or subcontract order (subcontractor track)
    pub order_id: Option<i64>,
    pub anchor_statement_id: Option<i64>,
    #[serde(flatten)]
    pub state: StatementState,
    pub date: NaiveDate,
    pub billing_month: Option<String>,
    pub comments: Option<String>,
    pub lines: Vec<LineItem>,
    pub amendments: Vec<Amendment>,
    #[serde(skip)]
    pub next_amendment_id: i64,
    pub version: i64,
    pub created_at: DateTime<Utc>,
}

/// Header fields supplied on creation.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StatementHeader {
    pub date: Option<NaiveDate>,
    pub billing_month: Option<String>,
    pub comments: Option<String>,
}

/// Client statement to create when a subcontractor statement needs an anchor.
#[derive(Debug, Clone, Default)]
pub struct AnchorSeed {
    pub base_order_id: Option<i64>,
    pub templates: Vec<LineTemplate>,
}

#[derive(Debug, Clone)]
pub struct NewStatement {
    pub scope: Scope,
    pub order_id: Option<i64>,
    pub header: StatementHeader,
    pub templates: Vec<LineTemplate>,
    /// Required for the subcontractor track
    pub anchor: Option<AnchorSeed>,
}

/// Header update. Locking goes through `Mutation::Finalize` only.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MetaPatch {
    pub date: Option<NaiveDate>,
    pub billing_month: Option<String>,
    pub comments: Option<String>,
}

/// Every write a statement accepts after creation.
#[derive(Debug, Clone)]
pub enum Mutation {
    UpdateMeta(MetaPatch),
    Finalize,
    Reopen,
    UpdateLine { line_id: i64, patch: FiguresPatch },
    DeleteLine { line_id: i64 },
    AddAmendment(AmendmentInput),
    UpdateAmendment { amendment_id: i64, patch: AmendmentPatch },
    DeleteAmendment { amendment_id: i64 },
}

/// Rows touched by an applied mutation, besides the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Change {
    Header,
    LineUpserted(i64),
    LineRemoved(i64),
    AmendmentUpserted(i64),
    AmendmentRemoved(i64),
}

/// Statement as returned to callers, with its recomputed totals.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatementView {
    #[serde(flatten)]
    pub statement: Statement,
    pub finalized: bool,
    pub totals: StatementTotals,
    pub vat: VatSummary,
}
