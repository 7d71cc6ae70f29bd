//! Speckle stream activity dashboard.
//!
//! Connects to a Speckle server, fetches a stream's branches, commits and
//! collaborators, and summarizes them as a report with charts, either in the
//! terminal or in an embedded web page.

pub mod analytics;
pub mod cli;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod speckle;
pub mod web;
