pub mod calculator;
pub mod coordinator;
pub mod export;
pub mod ledger;
pub mod statements;
pub mod totals;

pub use coordinator::DualTrackCoordinator;
pub use statements::LedgerService;
