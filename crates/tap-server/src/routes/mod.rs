pub mod actions;
pub mod provider;
