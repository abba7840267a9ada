use std::sync::Arc;

use crate::{image::ImageStorage, stores::UserStore};

pub struct AppData {
    pub store: Arc<dyn UserStore>,
    pub storage: ImageStorage,
}

impl AppData {
    pub fn new(store: Arc<dyn UserStore>, storage: ImageStorage) -> Self {
        Self { store, storage }
    }
}
