pub mod cached;
pub mod catalog;
pub mod report_archive;
pub mod traits;
pub mod ttl_cache;

pub use cached::*;
pub use catalog::*;
pub use report_archive::*;
pub use traits::*;
pub use ttl_cache::*;
