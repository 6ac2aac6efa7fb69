pub mod db;
pub mod forms;
pub mod server;
pub mod services;
pub mod version;
pub mod web;
