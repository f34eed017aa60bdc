pub mod auth;
pub mod catalog;
pub mod description;
pub mod image;
pub mod media;
pub mod products;
pub mod slug;
