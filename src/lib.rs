pub mod api_connection;
pub mod cli;
pub mod config;
pub mod intake;
pub mod logging;
pub mod menu_aggregator;
pub mod menu_store;
pub mod models;
pub mod planner;
pub mod progress;
pub mod recommendations;
pub mod report;
pub mod storage;
