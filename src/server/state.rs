//! Shared application state.

use std::sync::Arc;

use crate::geo::CountryResolver;

use super::matchmaker::Matchmaker;
use super::registry::ConnectionRegistry;

/// State shared by all connection handlers.
///
/// The registry and the matchmaker are the only writers of their respective
/// structures; handlers go through their public contracts and never touch
/// the underlying maps directly.
pub struct AppState {
    pub registry: Arc<ConnectionRegistry>,
    pub matchmaker: Matchmaker,
    /// Geography lookup collaborator; `None` disables resolution and every
    /// connection keeps the "Unknown" placeholder.
    pub geo: Option<Arc<dyn CountryResolver>>,
}

impl AppState {
    pub fn new(geo: Option<Arc<dyn CountryResolver>>) -> Self {
        let registry = Arc::new(ConnectionRegistry::new());
        let matchmaker = Matchmaker::new(registry.clone());
        Self {
            registry,
            matchmaker,
            geo,
        }
    }
}
