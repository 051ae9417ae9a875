pub mod context;
pub mod error;
pub mod inmemory_transaction_manager;

pub use inmemory_transaction_manager::InMemoryTransactionManager;
