pub mod filters;
pub mod order;
pub mod outcome;
pub mod plan;

pub use filters::*;
pub use order::*;
pub use outcome::*;
pub use plan::*;
