pub mod types;

pub use types::load_config;
pub use types::parse_date_ms;
pub use types::Config;
pub use types::SignatureSource;
