pub mod admin;
pub mod configs;
pub mod files;
pub mod health;
