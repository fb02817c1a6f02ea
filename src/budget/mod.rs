//! Time-windowed spend accounting for metered services.
//!
//! Every service may carry up to one limit per [`WindowKind`]. Windows reset
//! lazily: the first access after the calendar period rolls over replaces the
//! stale window with a zeroed one.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

mod clock;
mod ledger;
pub mod pricing;
mod status;
mod store;
mod window;

pub use clock::{Clock, ManualClock, SystemClock};
pub use ledger::{
    BudgetViolation, DEFAULT_RECORD_RETENTION, Reservation, ServiceUsage, UsageLedger, UsageRecord,
};
pub use pricing::{
    CharacterPricing, PricingTable, PricingTableBuilder, TokenPricing, estimate_tokens,
    global_pricing_table,
};
pub use status::{HealthLevel, ServiceStatus, WindowStatus};
pub use store::{JsonFileStore, LedgerSnapshot, UsageStore};
pub use window::{BudgetLimit, BudgetWindow, UnknownWindowKind, WindowKind};

/// Scale factor for storing Decimal costs as AtomicU64 (6 decimal places precision).
pub(crate) const COST_SCALE_FACTOR: Decimal = dec!(1_000_000);
