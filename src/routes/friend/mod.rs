mod handler;
mod model;

pub use handler::{add_friend, list_friends, remove_friend, search_users};
