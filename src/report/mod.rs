pub mod assembler;
pub mod evaluator;

pub use assembler::write_report;
pub use assembler::ReportRow;
pub use assembler::DERIVED_HEADERS;
pub use evaluator::evaluate;
pub use evaluator::quote_profit_percent;
pub use evaluator::usd_profit_percent;
pub use evaluator::Thresholds;
