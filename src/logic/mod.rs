pub mod cascade;
pub mod dispatch;
pub mod normalize;
pub mod session;
pub mod validate;

pub use cascade::*;
pub use dispatch::*;
pub use normalize::*;
pub use session::*;
pub use validate::*;
