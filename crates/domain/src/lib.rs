pub mod activities;
pub mod cursor;
pub mod entity;
pub mod error;
pub mod identity;
pub mod ports;
pub mod relationships;
pub mod util;
pub mod visibility;

pub type DomainResult<T> = Result<T, error::DomainError>;
