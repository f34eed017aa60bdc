pub mod auth;
pub mod description;
pub mod products;
pub mod public;
pub mod upload;
