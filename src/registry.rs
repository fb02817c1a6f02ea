//! Providers registered by name, one registry per capability.

use std::collections::HashMap;
use std::sync::Arc;

use crate::provider::{Capability, Provider, SharedProvider};
use crate::{Error, Result};

pub struct ProviderRegistry<C: Capability> {
    providers: Vec<SharedProvider<C>>,
    index: HashMap<String, usize>,
}

impl<C: Capability> Default for ProviderRegistry<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Capability> ProviderRegistry<C> {
    pub fn new() -> Self {
        Self {
            providers: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Register a provider. Names must be unique within the registry.
    pub fn register(&mut self, provider: SharedProvider<C>) -> Result<()> {
        let name = provider.name().to_string();
        if self.index.contains_key(&name) {
            return Err(Error::Config(format!(
                "duplicate {} provider '{}'",
                C::OPERATION,
                name
            )));
        }
        self.index.insert(name, self.providers.len());
        self.providers.push(provider);
        Ok(())
    }

    pub fn register_provider(&mut self, provider: impl Provider<C> + 'static) -> Result<()> {
        self.register(Arc::new(provider))
    }

    pub fn get(&self, name: &str) -> Option<&SharedProvider<C>> {
        self.index.get(name).map(|&i| &self.providers[i])
    }

    /// Resolve `names` into a chain, keeping the given order.
    pub fn chain(&self, names: &[&str]) -> Result<Vec<SharedProvider<C>>> {
        names
            .iter()
            .map(|name| {
                self.get(name)
                    .cloned()
                    .ok_or_else(|| Error::UnknownProvider {
                        operation: C::OPERATION,
                        name: name.to_string(),
                    })
            })
            .collect()
    }

    /// All providers in registration order.
    pub fn all(&self) -> &[SharedProvider<C>] {
        &self.providers
    }

    pub fn names(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    pub fn has_terminal(&self) -> bool {
        crate::selection::has_terminal(&self.providers)
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}
