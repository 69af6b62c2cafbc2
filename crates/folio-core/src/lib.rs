//! Folio Core Library
//!
//! This crate provides the core functionality for Folio, a resume workbench
//! that keeps resumes in one of several interchangeable storage backends.
//!
//! # Architecture
//!
//! - **Adapters**: one [`StorageAdapter`] per backend (key-value store,
//!   user-granted directory), each keeping an index plus one document per resume
//! - **Manager**: caches adapters, switches the active one and migrates
//!   resumes between backends with progress reporting
//! - **Store**: persists the backend choice and offers the resume operations
//!
//! # Quick Start
//!
//! ```text
//! let mut store = Store::open().await?;
//!
//! // Create a resume
//! let resume = store.create_resume("Backend engineer", None).await?;
//!
//! // Copy every resume into a directory and make it the active backend
//! store.select_directory("/home/me/resumes").await?;
//! store
//!     .migrate(StorageType::LocalStorage, StorageType::FileSystem, |p| {
//!         println!("{}%", p.percent())
//!     })
//!     .await?;
//! ```
//!
//! # Modules
//!
//! - `store`: Application entry point
//! - `models`: Resume document and index entry
//! - `storage`: Adapters, manager and migration
//! - `config`: Application configuration

pub mod config;
pub mod models;
pub mod storage;
pub mod store;

pub use config::{Config, StorageConfig};
pub use models::{Resume, ResumeMeta};
pub use storage::{
    MigrationProgress, MigrationStatus, StorageAdapter, StorageError, StorageManager,
    StorageResult, StorageType,
};
pub use store::Store;
