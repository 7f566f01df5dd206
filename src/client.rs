//! Client construction and invocation.
//!
//! [`ClientBuilder`] turns a descriptor into a cached [`BuiltClient`];
//! [`ClientProxy`] wraps a typed call surface over it with fallback handling.

pub mod builder;
pub mod call;
pub mod core;
pub mod proxy;

pub use builder::ClientBuilder;
pub use call::OperationCall;
pub use core::{BuiltClient, ClientSnapshot, OperationBinding};
pub use proxy::{ClientProxy, FallbackFactory};
