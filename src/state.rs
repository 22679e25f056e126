use std::sync::Arc;

use crate::progress::ProgressEngine;
use crate::store::ProgressStore;

/// Shared handler state; cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ProgressStore>,
}

impl AppState {
    pub fn new(store: Arc<dyn ProgressStore>) -> Self {
        Self { store }
    }

    pub fn engine(&self) -> ProgressEngine<'_> {
        ProgressEngine::new(self.store.as_ref())
    }
}
