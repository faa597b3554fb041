pub mod api;
pub mod background;
pub mod bootstrap;
pub mod common;
pub mod config;
pub mod database;
pub mod models;
pub mod workflow;

#[cfg(test)]
pub(crate) mod testing;
