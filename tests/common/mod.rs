use actix_web::web;
use authgate_server::config::env_source;
use authgate_server::{AppState, MemoryStore, Settings};
use std::sync::Arc;

pub fn test_settings() -> Settings {
    let mut settings = Settings::load("test", env_source("authgate_integration"))
        .expect("Failed to load test config");
    settings.auth.jwt_secret = "integration_test_secret".to_string();
    settings.auth.password_hash_cost = 4;
    settings
}

pub fn memory_state() -> (web::Data<AppState>, MemoryStore) {
    let store = MemoryStore::new();
    let state = AppState::with_stores(
        test_settings(),
        Arc::new(store.clone()),
        Arc::new(store.clone()),
    );
    (web::Data::new(state), store)
}
