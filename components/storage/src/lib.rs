pub mod budget;
pub mod chunk_cache;
pub mod err;
pub mod predictor;
pub mod probe;
pub mod range_mapper;
pub mod read_log;
pub mod source;
pub mod store;

pub use budget::{RequestBudget, RequestBudgetRef};
pub use range_mapper::{FetchDescriptor, RangeMapper};
pub use read_log::PageRead;
pub use store::{RemoteByteStore, StoreConfig, StoreCounters};
