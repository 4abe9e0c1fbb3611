//! Configuration, secrets, repository sources and the request service.

pub mod bootstrap;
pub mod config;
pub mod service;
pub mod source;
pub mod vault;

pub use bootstrap::{AppBuilder, resolve_config_path};
pub use config::Config;
pub use service::{AnswerResponse, IngestResponse, RepoService, ServiceError, ServiceParts};
pub use source::{GitSource, LocalSource, RepoSource, SourceError};
