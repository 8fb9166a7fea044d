pub mod enums;
pub mod marker;
pub mod upload;

pub use marker::*;
pub use upload::*;
