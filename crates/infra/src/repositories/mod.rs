pub mod activities;
pub mod relationships;

pub use activities::*;
pub use relationships::*;
