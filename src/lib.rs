//! scenariotree - event-sourced scenario and question-tree engine
//!
//! Questions live in a versioned catalog, trees of nodes reference them and
//! carry condition rules, and every change to a scenario is an appended
//! event. Current state, history and navigation are projections of the log.

pub mod authoring;
pub mod catalog;
pub mod cli;
pub mod condition;
pub mod config;
pub mod core;
pub mod events;
pub mod http_server;
pub mod navigation;
pub mod observability;
pub mod projection;
pub mod scenario;
pub mod tree;
