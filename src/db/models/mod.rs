mod chat;
mod user;

pub use chat::*;
pub use user::*;
