pub mod commands;
pub mod config;
pub mod error;
pub mod excel;
pub mod llm;
pub mod models;
pub mod presentation;
pub mod prompt;
pub mod services;
pub mod types;
