#![allow(dead_code)]

use bigdecimal::BigDecimal;
use progress_billing::config::LedgerConfig;
use progress_billing::db::{MemoryOrders, MemoryStore};
use progress_billing::models::{BaseOrder, LineKind, LineTemplate, Site, SubcontractOrder};
use progress_billing::LedgerService;
use std::str::FromStr;
use std::sync::Arc;

pub const SITE: &str = "CH-001";
/// Site with no base order
pub const BARE_SITE: &str = "CH-002";
pub const SUBCONTRACTOR: i64 = 4;

// Line ids of a statement seeded from the base order below
pub const TITLE_LINE: i64 = 1;
pub const EARTHWORK_LINE: i64 = 2;
pub const SUBTITLE_LINE: i64 = 3;
pub const FORMWORK_LINE: i64 = 4;

pub fn dec(value: &str) -> BigDecimal {
    BigDecimal::from_str(value).unwrap()
}

fn template(line_ref: i64, kind: LineKind, description: &str, price: &str) -> LineTemplate {
    LineTemplate {
        line_ref,
        article: format!("{}.0", line_ref),
        description: description.to_string(),
        kind,
        unit: if kind.is_heading() { String::new() } else { "m3".to_string() },
        unit_price: dec(price),
        quantity: dec("10"),
    }
}

pub fn orders() -> MemoryOrders {
    let orders = MemoryOrders::new();
    orders.insert_site(Site {
        id: 1,
        code: SITE.to_string(),
        name: "Résidence des Tilleuls".to_string(),
    });
    orders.insert_site(Site {
        id: 2,
        code: BARE_SITE.to_string(),
        name: "Entrepôt".to_string(),
    });
    orders.insert_base_order(BaseOrder {
        id: 10,
        site_id: 1,
        lines: vec![
            template(101, LineKind::Title, "Lot 1 - Gros oeuvre", "0"),
            template(102, LineKind::Standard, "Terrassement", "100"),
            template(103, LineKind::Subtitle, "Fondations", "0"),
            template(104, LineKind::Standard, "Coffrage", "12.5"),
        ],
    });
    orders.insert_subcontract_order(SubcontractOrder {
        id: 20,
        site_id: 1,
        subcontractor_id: SUBCONTRACTOR,
        lines: vec![template(201, LineKind::Standard, "Étanchéité", "80")],
    });
    orders
}

pub fn ledger_with(allow_reopen: bool) -> Arc<LedgerService> {
    let config = LedgerConfig {
        vat_rate: 20.0,
        allow_reopen,
    };
    Arc::new(LedgerService::new(
        Arc::new(MemoryStore::new()),
        Arc::new(orders()),
        &config,
    ))
}

pub fn ledger() -> Arc<LedgerService> {
    ledger_with(false)
}
