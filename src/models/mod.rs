pub mod presence;
pub mod profile;

pub use presence::{
    Coordinates, FriendLink, FriendPresenceView, GeoPoint, PresencePatch, RosterSnapshot,
    UserPresenceRecord,
};
pub use profile::UserProfile;
