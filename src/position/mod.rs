pub mod history;
pub mod reconstructor;

pub use history::HistoryError;
pub use history::RpcTransactionHistory;
pub use history::TransactionHistory;
pub use reconstructor::PositionReconstructor;
