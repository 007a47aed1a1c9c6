//! Template persistence.
//!
//! - `backend`: the `TemplateRepository` trait shared by every backend
//! - `memory_backend`: `DashMap` storage for development and tests
//! - `postgres_backend`: PostgreSQL storage with JSONB component trees
//! - `client`: remote repository over the HTTP API
//! - `factory`: backend selection from settings

mod backend;
pub mod client;
mod factory;
mod memory_backend;
mod postgres_backend;

pub use backend::{update_rejection, TemplateRepository, COPY_SUFFIX};
pub use client::{ClientConfig, HttpTemplateRepository};
pub use factory::create_template_repository;
pub use memory_backend::MemoryTemplateRepository;
pub use postgres_backend::PostgresTemplateRepository;
