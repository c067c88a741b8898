pub mod oracle;
pub mod valuation;

pub use oracle::HttpPriceOracle;
pub use oracle::PriceOracle;
pub use valuation::UsdValuationEngine;
