pub mod client;
pub mod rpc_helpers;

pub use client::RetryConfig;
pub use client::SolanaClient;
pub use rpc_helpers::get_parsed_transactions;
pub use rpc_helpers::TRANSACTION_FETCH_CHUNK_SIZE;

use crate::config::Config;

/// Create a Solana client from the application configuration
pub fn create_client_from_config(config: &Config) -> SolanaClient {
    SolanaClient::new(&config.rpc_url)
}
