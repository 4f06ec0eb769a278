//! Core logic: types, errors, config, catalog, resolution, dispatch, sync, repository.

pub mod catalog;
pub mod dispatcher;
pub mod error;
pub mod meta;
pub mod parser;
pub mod repository;
pub mod resolver;
pub mod sync;
pub mod types;
