//! Application state shared across handlers

use crate::{repositories::Database, service::RoleService};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState<D: Database> {
    pub role_service: RoleService<D>,
}

impl<D: Database> AppState<D> {
    pub fn new(role_service: RoleService<D>) -> Self {
        Self { role_service }
    }
}
