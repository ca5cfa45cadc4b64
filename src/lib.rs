use std::sync::Arc;

use config::Config;
use friends::FriendsService;
use profile::ProfileService;
use session::SessionRegistry;
use store::SharedDocumentStore;

pub mod config;
pub mod error;
pub mod friends;
pub mod identity;
pub mod location;
pub mod middleware;
pub mod models;
pub mod presence;
pub mod profile;
pub mod result;
pub mod router;
pub mod routes;
pub mod session;
pub mod store;
pub mod utils;

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn SharedDocumentStore>,
    pub sessions: Arc<SessionRegistry>,
}

impl AppState {
    pub fn new(config: Config, store: Arc<dyn SharedDocumentStore>) -> Self {
        let sessions = Arc::new(SessionRegistry::new(
            Arc::clone(&store),
            (&config).into(),
            config.location_max_fix_age(),
            config.session_idle_timeout(),
        ));
        Self {
            config,
            store,
            sessions,
        }
    }

    pub fn friends(&self) -> FriendsService {
        FriendsService::new(Arc::clone(&self.store))
    }

    pub fn profiles(&self) -> ProfileService {
        ProfileService::new(Arc::clone(&self.store))
    }
}
