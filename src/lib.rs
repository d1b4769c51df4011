pub mod config;
pub mod inet;
pub mod session;
pub mod term;
