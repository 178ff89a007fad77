pub mod config;
pub mod database;
pub mod error;
pub mod models;
pub mod repository;
pub mod routes;
pub mod services;
pub mod ws;
