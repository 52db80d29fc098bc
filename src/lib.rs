pub mod auth;
pub mod config;
pub mod domain;
pub mod error;
pub mod images;
pub mod importer;
pub mod logging;
pub mod server;
pub mod staging;
pub mod storage;
pub mod tasks;
