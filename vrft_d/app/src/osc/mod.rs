pub mod namespace;
pub mod parameters;
pub mod query;
pub mod vrchat;
