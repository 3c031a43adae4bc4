pub mod engine;
pub mod notify;
pub mod store;
pub mod traits;

pub use engine::OrderingEngine;
pub use notify::*;
pub use store::*;
pub use traits::*;
