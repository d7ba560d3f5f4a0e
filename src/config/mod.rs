//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks, every error collected)
//!     → MockConfig (validated, immutable)
//!     → stubs.rs (stub and redirect entries → Router)
//! ```
//!
//! # Design Decisions
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - Path templates use the same syntax a [`Format`](crate::format::Format) renders

pub mod loader;
pub mod schema;
pub mod stubs;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{LoggingConfig, MockConfig, RedirectConfig, ServerConfig, StubConfig};
pub use stubs::build_router;
