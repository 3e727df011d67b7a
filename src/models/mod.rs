//! Data models for Azure Blob Storage.

mod blob;
mod container;
mod page;

pub use blob::*;
pub use container::*;
pub use page::*;
