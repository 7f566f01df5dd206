//! Process-wide memoisation of call-adapter and converter factories.

use super::map::CopyOnWriteMap;
use crate::component::{ComponentProvider, ComponentType};
use crate::convert::{CallAdapterFactory, ConverterFactory};
use crate::Result;
use std::any::TypeId;
use std::sync::Arc;
use tracing::debug;

/// One instance per factory type, shared by every client.
#[derive(Default)]
pub struct FactoryCache {
    call_adapters: CopyOnWriteMap<TypeId, Arc<dyn CallAdapterFactory>>,
    converters: CopyOnWriteMap<TypeId, Arc<dyn ConverterFactory>>,
}

impl FactoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve `own ++ global`, in order, memoising each type.
    pub fn call_adapter_factories(
        &self,
        own: &[ComponentType<dyn CallAdapterFactory>],
        global: &[ComponentType<dyn CallAdapterFactory>],
        provider: &dyn ComponentProvider,
    ) -> Result<Vec<Arc<dyn CallAdapterFactory>>> {
        own.iter()
            .chain(global.iter())
            .map(|ty| {
                self.call_adapters.get_or_insert_with(&ty.type_id(), || {
                    debug!(factory = ty.name(), "instantiating call adapter factory");
                    ty.resolve(provider)
                })
            })
            .collect()
    }

    pub fn converter_factories(
        &self,
        own: &[ComponentType<dyn ConverterFactory>],
        global: &[ComponentType<dyn ConverterFactory>],
        provider: &dyn ComponentProvider,
    ) -> Result<Vec<Arc<dyn ConverterFactory>>> {
        own.iter()
            .chain(global.iter())
            .map(|ty| {
                self.converters.get_or_insert_with(&ty.type_id(), || {
                    debug!(factory = ty.name(), "instantiating converter factory");
                    ty.resolve(provider)
                })
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.call_adapters.len() + self.converters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
