//! Shared application state handed to every Tool Server handler.

use std::sync::Arc;

use crate::{config::Config, fleet::FleetManager, inception::InceptionProcessor, route::Router};

/// Everything a tool invocation needs: the live config, the fleet manager,
/// the router built on top of it, and the inception processor for
/// sub-query resolution.
pub struct AppState {
    pub config: Arc<Config>,
    pub fleet: Arc<FleetManager>,
    pub router: Arc<Router>,
    pub inception: Arc<InceptionProcessor>,
}

impl AppState {
    pub fn new(config: Arc<Config>, fleet: Arc<FleetManager>) -> Self {
        let router = Arc::new(Router::new(Arc::clone(&config), Arc::clone(&fleet)));
        let inception = Arc::new(InceptionProcessor::new(Arc::clone(&config), Arc::clone(&fleet)));
        Self { config, fleet, router, inception }
    }
}
