pub mod bootstrap;
pub mod bridge;
pub mod commands;
pub mod countdown_driver;
pub mod cycle_store;
