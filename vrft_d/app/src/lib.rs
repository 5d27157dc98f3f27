pub mod modules;
pub mod operator;
pub mod osc;
pub mod runtime;
