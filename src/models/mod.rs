mod product;
mod user;

pub use product::*;
pub use user::*;
