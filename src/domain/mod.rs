pub mod announcement;
pub mod identity;

pub use announcement::*;
pub use identity::*;
