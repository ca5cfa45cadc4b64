mod handler;
mod model;

pub use handler::{close_session, get_walk, open_session, push_position, update_status};
pub use model::{FriendCard, MapRegion, RosterView, WalkSessionView, WalkView};
