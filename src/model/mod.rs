pub mod assessment;
pub mod common;
pub mod resource;
pub mod saved_info;
pub mod stage;

pub use assessment::*;
pub use common::*;
pub use resource::*;
pub use saved_info::*;
pub use stage::*;
