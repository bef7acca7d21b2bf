//! Core library: the faceted tag index, the one-shot scanner that populates
//! it, virtual path resolution, and the adapter a filesystem binding calls.

pub mod config;
pub mod error;
pub mod index;
pub mod resolver;
pub mod scanner;
pub mod vfs;

pub use error::FacetError;
