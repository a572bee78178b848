pub mod apis;
pub mod common;
pub mod config;
pub mod gateway;
pub mod observability;
pub mod pipeline;

// Layered boundaries for application and infrastructure
pub mod app;
pub mod infra;
