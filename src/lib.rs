//! azurite-core: the state machines behind an Azure Blob Storage emulator.
//!
//! This crate holds the protocol-independent core of the blob service: lease
//! state machines, page range bookkeeping, conditional request evaluation and
//! the blob tag query language, wired together by [`BlobService`] over
//! in-memory metadata and extent stores.
//!
//! # Example
//!
//! ```no_run
//! use azurite_core::{BlobService, Config, RequestContext};
//!
//! #[tokio::main]
//! async fn main() {
//!     let service = BlobService::new(Config::default());
//!     let ctx = RequestContext::for_container("devstoreaccount1", "logs");
//!     service.create_container(&ctx).await.unwrap();
//!
//!     let lease = ctx
//!         .with_header("x-ms-lease-action", "acquire")
//!         .with_header("x-ms-lease-duration", "30");
//!     let response = service.container_lease(&lease).await.unwrap();
//!     println!("leased as {:?}", response.lease_id);
//! }
//! ```

pub mod conditions;
pub mod config;
pub mod context;
pub mod error;
pub mod lease;
pub mod models;
pub mod query;
pub mod ranges;
pub mod service;
pub mod storage;

// Re-exports for convenience
pub use config::{Args, Command, Config, DEFAULT_ACCOUNT, DEFAULT_MAX_DOWNLOAD_SIZE};
pub use context::RequestContext;
pub use error::{ErrorCode, StorageError, StorageResult};
pub use models::{BlobModel, BlobType, ContainerModel, PageRange, PersistencyChunk, PAGE_SIZE};
pub use service::{BlobDownload, BlobService, FilteredBlob, LeaseResponse};
pub use storage::{ExtentStore, MemoryExtentStore, MemoryMetadataStore, MetadataStore};
