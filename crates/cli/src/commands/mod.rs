//! CLI Commands

pub mod config;
pub mod pipeline;
pub mod validate;
pub mod web;
