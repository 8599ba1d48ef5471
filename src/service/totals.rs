use crate::models::{Amendment, LineFigures, LineItem, StatementTotals, Subtotal, VatSummary};
use crate::service::calculator::round2;
use bigdecimal::{BigDecimal, Zero};

impl Subtotal {
    pub fn zero() -> Self {
        Self {
            precedent: BigDecimal::zero(),
            current: BigDecimal::zero(),
            total: BigDecimal::zero(),
        }
    }

    /// Sums already-rounded row amounts.
    pub fn from_rows<'a>(rows: impl IntoIterator<Item = &'a LineFigures>) -> Self {
        let mut sum = Self::zero();
        for row in rows {
            sum.precedent += &row.precedent_amount;
            sum.current += &row.current_amount;
            sum.total += &row.total_amount;
        }
        Self {
            precedent: round2(&sum.precedent),
            current: round2(&sum.current),
            total: round2(&sum.total),
        }
    }

    pub fn plus(&self, other: &Subtotal) -> Subtotal {
        Subtotal {
            precedent: round2(&(&self.precedent + &other.precedent)),
            current: round2(&(&self.current + &other.current)),
            total: round2(&(&self.total + &other.total)),
        }
    }

    fn map(&self, f: impl Fn(&BigDecimal) -> BigDecimal) -> Subtotal {
        Subtotal {
            precedent: f(&self.precedent),
            current: f(&self.current),
            total: f(&self.total),
        }
    }
}

pub fn aggregate(lines: &[LineItem], amendments: &[Amendment]) -> StatementTotals {
    let lines = Subtotal::from_rows(lines.iter().map(|l| &l.figures));
    let amendments = Subtotal::from_rows(amendments.iter().map(|a| &a.figures));
    let grand = lines.plus(&amendments);

    StatementTotals {
        lines,
        amendments,
        grand,
    }
}

/// Applies a flat VAT percentage to the grand total.
pub fn vat_summary(grand: &Subtotal, rate_percent: &BigDecimal) -> VatSummary {
    let hundred = BigDecimal::from(100);
    let vat = grand.map(|amount| round2(&(amount * rate_percent / &hundred)));
    let gross = grand.plus(&vat);

    VatSummary {
        rate: rate_percent.clone(),
        vat,
        gross,
    }
}
