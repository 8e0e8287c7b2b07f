mod list;
mod write;

pub use list::TransactionFilter;
