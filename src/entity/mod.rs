//! SeaORM entities for the local transactional store

pub mod account;
pub mod seller;
