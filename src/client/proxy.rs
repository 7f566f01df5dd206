//! Typed call surface with fallback handling.

use crate::client::builder::ClientBuilder;
use crate::client::core::BuiltClient;
use crate::component::{lookup_named, ComponentProvider, NamedLookup};
use crate::descriptor::ClientDescriptor;
use crate::{Error, ErrorContext, Result};
use futures::future::BoxFuture;
use std::sync::Arc;
use tracing::debug;

/// Produces a fallback handler bound to the error that triggered it.
pub trait FallbackFactory<A: ?Sized>: Send + Sync {
    fn create(&self, cause: &Error) -> Arc<A>;
}

/// `A` is the call surface, usually a trait object such as `dyn UserApi`.
///
/// ```rust,no_run
/// use async_trait::async_trait;
/// use retrofit_rust::{BuiltClient, ClientBuilder, ClientDescriptor, ClientProxy, Result};
/// use std::sync::Arc;
///
/// #[async_trait]
/// trait Ping: Send + Sync {
///     async fn ping(&self) -> Result<String>;
/// }
///
/// struct HttpPing(Arc<BuiltClient>);
///
/// #[async_trait]
/// impl Ping for HttpPing {
///     async fn ping(&self) -> Result<String> {
///         self.0.call("ping").send().await
///     }
/// }
///
/// # async fn demo(builder: ClientBuilder, descriptor: Arc<ClientDescriptor>) -> Result<()> {
/// let proxy: ClientProxy<dyn Ping> =
///     ClientProxy::create(&builder, &descriptor, |client| -> Arc<dyn Ping> { Arc::new(HttpPing(client)) })?;
/// let pong = proxy.invoke(|api| api.ping()).await?;
/// # Ok(())
/// # }
/// ```
pub struct ClientProxy<A: ?Sized + Send + Sync + 'static> {
    client: Arc<BuiltClient>,
    target: Arc<A>,
    fallback: Option<Arc<A>>,
    fallback_factory: Option<Arc<dyn FallbackFactory<A>>>,
}

impl<A: ?Sized + Send + Sync + 'static> ClientProxy<A> {
    /// Resolve fallbacks, build (or fetch) the client, and bind the call surface.
    ///
    /// Fallbacks are checked first; a misconfigured fallback fails before any
    /// client is built.
    pub fn create<F>(builder: &ClientBuilder, descriptor: &Arc<ClientDescriptor>, bind: F) -> Result<Self>
    where
        F: FnOnce(Arc<BuiltClient>) -> Arc<A>,
    {
        let components = builder.context().components.as_ref();
        let fallback = match &descriptor.fallback {
            Some(name) => Some(resolve_named::<Arc<A>>(components, descriptor, name, "fallback")?),
            None => None,
        };
        let fallback_factory = match &descriptor.fallback_factory {
            Some(name) => Some(resolve_named::<Arc<dyn FallbackFactory<A>>>(
                components,
                descriptor,
                name,
                "fallback_factory",
            )?),
            None => None,
        };

        let client = builder.build(descriptor)?;
        Ok(Self {
            target: bind(Arc::clone(&client)),
            client,
            fallback,
            fallback_factory,
        })
    }

    pub fn client(&self) -> &Arc<BuiltClient> {
        &self.client
    }

    pub fn has_fallback(&self) -> bool {
        self.fallback.is_some() || self.fallback_factory.is_some()
    }

    /// The bound call surface without fallback handling.
    pub fn target(&self) -> &Arc<A> {
        &self.target
    }

    /// Run `call` against the client; on error run it against the fallback
    /// value, else against a handler from the fallback factory, else return
    /// the error unchanged.
    pub async fn invoke<T, F>(&self, call: F) -> Result<T>
    where
        F: for<'a> Fn(&'a A) -> BoxFuture<'a, Result<T>>,
    {
        let err = match call(&*self.target).await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };
        if let Some(fallback) = &self.fallback {
            debug!(client = %self.client.descriptor().id, error = %err, "using fallback");
            return call(&**fallback).await;
        }
        if let Some(factory) = &self.fallback_factory {
            debug!(client = %self.client.descriptor().id, error = %err, "using fallback factory");
            let handler = factory.create(&err);
            return call(&*handler).await;
        }
        Err(err)
    }
}

fn resolve_named<T>(
    components: &dyn ComponentProvider,
    descriptor: &ClientDescriptor,
    name: &str,
    attribute: &str,
) -> Result<T>
where
    T: std::any::Any + Clone + Send + Sync,
{
    let problem = match lookup_named::<T>(components, name) {
        NamedLookup::Found(value) => return Ok(value),
        NamedLookup::Missing => format!("no component named '{}'", name),
        NamedLookup::WrongType => format!(
            "component '{}' is not a {}",
            name,
            std::any::type_name::<T>()
        ),
    };
    Err(Error::configuration_with_context(
        format!("invalid {}: {}", attribute, problem),
        ErrorContext::new()
            .with_field_path(format!("client.{}", attribute))
            .with_details(format!("client={}", descriptor.id))
            .with_source("client_proxy"),
    ))
}
