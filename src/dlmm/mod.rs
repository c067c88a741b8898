pub mod api;
pub mod classifier;
pub mod events;
pub mod program;
#[cfg(test)]
pub mod testutil;

pub use api::DlmmApiClient;
pub use api::DlmmPair;
pub use api::PairRegistry;
pub use api::TokenDirectory;
pub use api::UnclaimedFees;
pub use classifier::classify_transaction;
pub use classifier::Classification;
pub use classifier::MeteoraTransaction;
pub use events::extract_events;
pub use events::events_for_position;
