pub mod cli;
pub mod config;
pub mod db;
pub mod models;
pub mod services;
pub mod storage;
pub mod web;


pub use config::Config;
pub use db::Database;
