//! Application state shared by the web handlers.

use std::sync::Arc;

use crate::vtop::Portal;

/// Immutable for the life of the process: no session is ever stored here.
#[derive(Clone)]
pub struct AppState {
    pub portal: Arc<Portal>,
}

impl AppState {
    pub fn new(portal: Arc<Portal>) -> Self {
        Self { portal }
    }
}
