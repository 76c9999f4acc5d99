//! The engine entry point.

use std::sync::Arc;

use loadout_schema::{LoadoutConfig, Record, SchemaRegistry};
use smol_str::SmolStr;

use crate::association::AssociationLoader;
use crate::backend::Backend;
use crate::collection::{CollectionContext, Params};
use crate::error::QueryResult;
use crate::loaded::{BatchLoader, FnLoader, LoaderMap, LoaderOutput};
use crate::operations::{LoadOperation, UpgradeOperation};
use crate::resolver::ProjectionResolver;
use crate::scope::Scope;

/// Binds a backend to the registered schemas, the configuration and the
/// batch loaders.
///
/// # Example
///
/// ```rust,ignore
/// let posts = datasource
///     .load(datasource.scope("Post")?)
///     .select(SelectionNode::new().fields(["id", "newest_comment"]))
///     .exec()
///     .await?;
/// ```
pub struct Datasource<B: Backend> {
    backend: Arc<B>,
    registry: Arc<SchemaRegistry>,
    config: Arc<LoadoutConfig>,
    loaders: LoaderMap<B>,
}

impl<B: Backend> Datasource<B> {
    /// Create a datasource with the default configuration.
    pub fn new(backend: Arc<B>, registry: Arc<SchemaRegistry>) -> Self {
        Self {
            backend,
            registry,
            config: Arc::new(LoadoutConfig::default()),
            loaders: LoaderMap::new(),
        }
    }

    /// Replace the configuration.
    pub fn with_config(mut self, config: impl Into<Arc<LoadoutConfig>>) -> Self {
        self.config = config.into();
        self
    }

    /// Register the batch loader `name` for an entity.
    ///
    /// Registering a second loader under the same name replaces the first.
    pub fn register_loader(
        &mut self,
        entity: &str,
        name: impl Into<String>,
        loader: impl BatchLoader<B> + 'static,
    ) -> &mut Self {
        let name = name.into();
        crate::loadout_debug!(entity = entity, loader = %name, "Registered batch loader");
        self.loaders
            .insert((SmolStr::new(entity), name), Arc::new(loader));
        self
    }

    /// Register a synchronous closure as a batch loader.
    pub fn register_fn<F>(&mut self, entity: &str, name: impl Into<String>, f: F) -> &mut Self
    where
        F: Fn(&CollectionContext<'_, B>) -> QueryResult<LoaderOutput> + Send + Sync + 'static,
    {
        self.register_loader(entity, name, FnLoader(f))
    }

    /// The backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// The schema registry.
    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    /// The active configuration.
    pub fn config(&self) -> &LoadoutConfig {
        &self.config
    }

    /// A resolver over the registry and configuration.
    pub fn resolver(&self) -> ProjectionResolver<'_> {
        ProjectionResolver::new(&self.registry, &self.config)
    }

    /// An unfiltered scope over an entity's table.
    pub fn scope(&self, entity: &str) -> QueryResult<Scope> {
        let schema = self.registry.get_schema(entity)?;
        Ok(Scope::for_schema(&schema))
    }

    /// Start loading the records of a scope.
    pub fn load(&self, scope: Scope) -> LoadOperation<'_, B> {
        LoadOperation::new(self, scope)
    }

    /// Start upgrading already materialized records to a selection.
    pub fn upgrade(&self, records: Vec<Record>) -> UpgradeOperation<'_, B> {
        UpgradeOperation::new(self, records)
    }

    pub(crate) fn association_loader<'a>(&'a self, params: &'a Params) -> AssociationLoader<'a, B> {
        AssociationLoader::new(
            self.backend.as_ref(),
            self.resolver(),
            &self.config,
            &self.loaders,
            params,
        )
    }
}

impl<B: Backend> Clone for Datasource<B> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            registry: Arc::clone(&self.registry),
            config: Arc::clone(&self.config),
            loaders: self.loaders.clone(),
        }
    }
}

impl<B: Backend> std::fmt::Debug for Datasource<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut loaders: Vec<String> = self
            .loaders
            .keys()
            .map(|(entity, name)| format!("{}.{}", entity, name))
            .collect();
        loaders.sort();
        f.debug_struct("Datasource")
            .field("backend", &self.backend.name())
            .field("entities", &self.registry.entities())
            .field("config", &self.config)
            .field("loaders", &loaders)
            .finish()
    }
}
