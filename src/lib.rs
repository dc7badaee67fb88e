pub mod config;
pub mod context;
pub mod digest;
pub mod error;
pub mod image_config;
pub mod log;
pub mod lookup;
pub mod manifest;
pub mod metrics;
pub mod page;
pub mod paths;
pub mod pull;
pub mod quarantine;
pub mod reference;
pub mod resolver;
pub mod store;
pub mod types;
pub mod urls;


pub use crate::config::Configuration;
pub use crate::context::RequestContext;
pub use crate::error::{NotFound, ResolveError, ResolveResult, ValidationError};
pub use crate::resolver::{Resolver, ResolverSettings};
pub use crate::store::Backends;
