//! tinymem-etv: External Truth Verification -- read-only disk hash
//! comparison against the StateMap, with an optional short-TTL cache.

pub mod cache;
pub mod error;
pub mod etv;
pub mod file_reader;

pub use cache::EtvCache;
pub use error::{EtvError, Result};
pub use etv::{EtvChecker, ETVResult};
pub use file_reader::{FileReader, ReadOutcome, StdFileReader};
