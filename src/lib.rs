//! # retrofit-rust
//!
//! Declarative HTTP clients assembled at runtime from resolved descriptors.
//!
//! ## Overview
//!
//! A [`ClientDescriptor`] describes one remote API surface: where it lives,
//! how its transport is tuned, which interceptors, converters and call
//! adapters it uses, and how its operations are retried or circuit-broken.
//! [`ClientBuilder`] turns a descriptor into a cached [`BuiltClient`];
//! [`ClientProxy`] puts a typed call surface with fallback handling on top.
//!
//! The crate configures and sequences its collaborators. HTTP is `reqwest`,
//! bodies are `serde_json`, breaker statistics belong to an external
//! [`DegradeEngine`](resilience::DegradeEngine).
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use retrofit_rust::{ClientBuilder, ClientDescriptor, OperationDescriptor, RetrofitContext};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> retrofit_rust::Result<()> {
//!     let context = RetrofitContext::builder().build()?;
//!     let builder = ClientBuilder::new(context);
//!
//!     let descriptor = Arc::new(
//!         ClientDescriptor::new("users")
//!             .with_base_url("${users.base-url:http://localhost:8080}/api")
//!             .with_operation(OperationDescriptor::get("get_user", "users/{id}")),
//!     );
//!     let client = builder.build(&descriptor)?;
//!
//!     let user: serde_json::Value = client.call("get_user").path_param("id", 7).send().await?;
//!     println!("{user}");
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`descriptor`] | Client and operation descriptors |
//! | [`client`] | Builder, built client, per-call requests, proxy |
//! | [`interceptors`] | Interceptor chain, path matching, retry, logging, discovery |
//! | [`resilience`] | Degrade rules, breaker guard, resource names |
//! | [`transport`] | Transport seam, reqwest transport, connection pools |
//! | [`convert`] | Call adapters and body converters |
//! | [`cache`] | Copy-on-write caches and the factory cache |
//! | [`config`] | Global configuration |
//! | [`component`] | Lookup of externally managed components |
//! | [`environment`] | Placeholder resolution |

pub mod cache;
pub mod client;
pub mod component;
pub mod config;
pub mod context;
pub mod convert;
pub mod descriptor;
pub mod environment;
pub mod interceptors;
pub mod resilience;
pub mod transport;

// Re-export main types for convenience
pub use client::{BuiltClient, ClientBuilder, ClientProxy, FallbackFactory, OperationCall};
pub use component::{ComponentProvider, ComponentRegistry, ComponentType};
pub use config::{LogLevel, LogStrategy, RetrofitConfig};
pub use context::{RetrofitContext, RetrofitContextBuilder};
pub use descriptor::{
    ClientDescriptor, ClientTimeouts, DegradeSpec, DegradeStrategy, InterceptMark,
    OperationDescriptor, ReturnType, RetryRule, RetrySpec,
};
pub use environment::{Environment, MapEnvironment, SystemEnvironment};
pub use futures::future::BoxFuture;

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for the library
pub mod error;
pub use error::{Error, ErrorContext};
