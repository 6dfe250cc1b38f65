mod config;
pub mod err;
mod file;
pub mod handoff;
mod session;
mod worker;

pub use config::{FileConfig, FileSource, HydratedFile, ServerMode, SessionOptions};
pub use err::{Errno, ToErrno};
pub use file::{FileCursor, VirtualFile, VirtualFileRef};
pub use session::{Session, SessionStats};
pub use worker::{StoreClient, StoreRequest, StoreResponse, StoreWorker};
