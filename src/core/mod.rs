pub mod aggregate;
pub mod classify;
pub mod country;
pub mod engine;
pub mod error;
pub mod line_item;
pub mod period;
pub mod rates;
pub mod returns;
pub mod split;
pub mod tariff;
pub mod tax;

// Flat public surface for the commands.
pub use aggregate::{rgr_claim_lines, AggregateRow, BoxAssignment, ComputedLine, RgrClaimLine};
pub use classify::Category;
pub use engine::{run, RunConfig, RunOutput};
pub use error::Rejection;
pub use line_item::{read_csv as read_line_items, LineItemRecord, LoadedItems};
pub use period::ReportingPeriod;
pub use rates::RateTable;
pub use returns::{
    DutchVatReturn, DutyClaimLine, DutyReturnClaim, FinancialSummary, OssReturn, RevenueSummary,
    VatDifference,
};
pub use split::DutyRevenuePolicy;
pub use tariff::Tariff;
