pub mod env;
pub mod logger;
pub mod object_storage;
pub mod readable_size;
pub mod runtime;
