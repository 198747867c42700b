//! Role administration for the admin backend
//!
//! [`service::RoleService`] owns the role workflows. It reaches storage
//! through the traits in [`repositories`] and clears per-user cached
//! authorization state through [`cache::CacheInvalidator`].

pub mod cache;
pub mod config;
pub mod error;
pub mod models;
pub mod repositories;
pub mod routes;
pub mod service;
pub mod state;
