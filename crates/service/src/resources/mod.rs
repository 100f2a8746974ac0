//! Resource operations: identifier rules and the CRUD contract.

pub mod identifier;
pub mod repository;
