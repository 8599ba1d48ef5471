pub mod amount;
pub mod line;
pub mod order;
pub mod statement;
pub mod totals;

pub use line::{
    Amendment, AmendmentInput, AmendmentPatch, FiguresPatch, LineFigures, LineItem, LineKind,
    LineTemplate,
};
pub use order::{BaseOrder, OrderSeed, Site, SubcontractOrder};
pub use statement::{
    AnchorSeed, Change, MetaPatch, Mutation, NewStatement, Scope, Statement, StatementHeader,
    StatementState, StatementView,
};
pub use totals::{StatementTotals, Subtotal, VatSummary};
