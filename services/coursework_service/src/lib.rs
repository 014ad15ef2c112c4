pub mod access;
pub mod activity;
pub mod context;
pub mod model;
pub mod operations;
pub mod store;

pub use context::Context;
