//! Application context - builds and tears down the object graph
//!
//! The context owns every instance it creates (except detached ones) and
//! keeps them in creation order. Wiring happens through `&mut self`; the
//! context itself is not meant to be shared between threads while wiring.
//!
//! Failure policy: an error while computing constants or creating early
//! instances tears down everything built so far and fails the build. An error
//! in a later [`ApplicationContext::create`] only fails that call; instances
//! already registered on the way, including the one that failed half way
//! through its injection, stay in the live graph until teardown.

use crate::arithmetic;
use crate::bean::BeanHandle;
use crate::bean_factory::FactoryRegistry;
use crate::component;
use crate::config::{ConfigValue, Environment};
use crate::constants::{CLEANUP_HOOK, DONE_HOOK, LIBRARY_PATH_KEY, LIST_SEPARATORS, NO, YES};
use crate::definition::{DefinitionView, FactoryDocument, PropertyEntry};
use crate::error::{ContainerError, ContainerResult};
use crate::library::LibraryLoader;
use crate::logical::LogicalExpression;
use crate::timespan;
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::Arc;

pub struct ApplicationContext {
    document: Arc<FactoryDocument>,
    environment: Arc<Environment>,
    loader: LibraryLoader,

    /// Live instances in creation order
    owned: Vec<(String, BeanHandle)>,

    /// Name to position in `owned`
    index: HashMap<String, usize>,

    shut_down: bool,
}

impl std::fmt::Debug for ApplicationContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApplicationContext")
            .field("instances", &self.instance_names())
            .field("library_paths", &self.loader.paths())
            .field("shut_down", &self.shut_down)
            .finish()
    }
}

impl ApplicationContext {
    pub fn builder() -> ApplicationContextBuilder {
        ApplicationContextBuilder::new()
    }

    /// Build a context with an empty environment and default options
    pub fn new(document: FactoryDocument) -> ContainerResult<Self> {
        Self::builder().build(document)
    }

    pub fn environment(&self) -> &Arc<Environment> {
        &self.environment
    }

    pub fn document(&self) -> &FactoryDocument {
        &self.document
    }

    /// Create or reuse the instance called `name`
    pub fn create(&mut self, name: &str) -> ContainerResult<BeanHandle> {
        self.create_impl(name, false)
    }

    /// Create an instance the context does not keep
    ///
    /// An instance that is already live is still returned as is.
    pub fn create_detached(&mut self, name: &str) -> ContainerResult<BeanHandle> {
        self.create_impl(name, true)
    }

    /// Create or reuse `name` and view it as `I`
    pub fn create_as<I: ?Sized + 'static>(&mut self, name: &str) -> ContainerResult<Arc<I>> {
        self.create(name)?.cast::<I>()
    }

    /// Live instance called `name`, or the live target of alias `name`
    pub fn find(&self, name: &str) -> Option<BeanHandle> {
        if let Some(handle) = self.lookup(name) {
            return Some(handle);
        }

        let target = DefinitionView::new(name, &self.document, &self.environment)
            .resolve_alias()
            .ok()?;

        if target.is_empty() {
            None
        } else {
            self.lookup(&target)
        }
    }

    pub fn find_as<I: ?Sized + 'static>(&self, name: &str) -> ContainerResult<Option<Arc<I>>> {
        self.find(name).map(|handle| handle.cast::<I>()).transpose()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Names of live instances in creation order
    pub fn instance_names(&self) -> Vec<&str> {
        self.owned.iter().map(|(name, _)| name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.owned.len()
    }

    pub fn is_empty(&self) -> bool {
        self.owned.is_empty()
    }

    /// Tear the graph down; later calls do nothing
    pub fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }

        self.shut_down = true;
        self.destroy_all();
    }

    fn lookup(&self, name: &str) -> Option<BeanHandle> {
        self.index
            .get(name)
            .map(|&position| self.owned[position].1.clone())
    }

    fn start(&mut self, avoid_early: bool) -> ContainerResult<()> {
        self.compute_constants()?;

        if avoid_early {
            tracing::debug!("Skipping creation of early instances");
            return Ok(());
        }

        self.create_early()
    }

    fn compute_constants(&self) -> ContainerResult<()> {
        for constant in &self.document.constants {
            let Some(name) = constant.name.as_deref() else {
                tracing::warn!("Skipping constant without a name");
                continue;
            };

            let (source, value) = if let Some(text) = &constant.text {
                let text = self.environment.expand(text);
                (text.clone(), ConfigValue::String(text))
            } else if let Some(time) = &constant.time {
                let time = self.environment.expand(time);
                let micros = timespan::parse_micros(&time)?;
                (time, ConfigValue::Int(micros))
            } else if let Some(number) = &constant.number {
                let number = self.environment.expand(number);
                let result = arithmetic::evaluate(&number)?;
                (number, Self::number_value(result))
            } else if let Some(condition) = &constant.yes_when {
                let condition = self.environment.expand(condition);
                let holds = LogicalExpression::parse(&condition)?.result();
                (condition, ConfigValue::from(if holds { YES } else { NO }))
            } else {
                return Err(ContainerError::ConstantValueMissing(name.to_string()));
            };

            tracing::debug!("Evaluating constant {} value {} as {:?}", name, source, value);
            self.environment.publish_constant(name, value);
        }

        Ok(())
    }

    /// Integral results are published as integers
    fn number_value(result: f64) -> ConfigValue {
        let integral = result.floor() == result
            && result >= i64::MIN as f64
            && result < i64::MAX as f64;

        if integral {
            ConfigValue::Int(result as i64)
        } else {
            ConfigValue::Float(result)
        }
    }

    fn create_early(&mut self) -> ContainerResult<()> {
        let names: Vec<String> = self
            .document
            .early_instances()
            .map(String::from)
            .collect();

        for name in names {
            tracing::info!("Creating early instance '{}'", name);
            self.create(&name)?;
        }

        Ok(())
    }

    fn create_impl(&mut self, name: &str, detach: bool) -> ContainerResult<BeanHandle> {
        if let Some(existing) = self.lookup(name) {
            tracing::debug!("Returning cached instance of '{}'", name);
            return Ok(existing);
        }

        let target = DefinitionView::new(name, &self.document, &self.environment).resolve_alias()?;
        if target.is_empty() {
            return self.create_no_alias(name, detach);
        }

        if let Some(existing) = self.lookup(&target) {
            tracing::debug!("Instance '{}' reused as alias to '{}'", name, target);
            return Ok(existing);
        }

        tracing::debug!("Resolving alias '{}' to '{}'", name, target);
        self.create_no_alias(&target, detach)
    }

    fn create_no_alias(&mut self, name: &str, detach: bool) -> ContainerResult<BeanHandle> {
        let document = Arc::clone(&self.document);
        let environment = Arc::clone(&self.environment);
        let view = DefinitionView::new(name, &document, &environment);

        view.validate()?;

        let library = view.resolve_library();
        if !library.is_empty() {
            self.loader.load(&library)?;
        }

        let class = view.resolve_class();
        tracing::info!("Creating '{}' as {}", name, class);
        let handle = FactoryRegistry::global().create(&class)?;

        if !detach {
            self.index.insert(name.to_string(), self.owned.len());
            self.owned.push((name.to_string(), handle.clone()));
        }

        self.inject_dependencies(&view, &handle)?;
        Ok(handle)
    }

    fn inject_dependencies(
        &mut self,
        view: &DefinitionView<'_>,
        target: &BeanHandle,
    ) -> ContainerResult<()> {
        for property in view.property_entries() {
            tracing::trace!("Visiting {} entry of '{}'", property.op.as_str(), view.name());

            let Some(name) = property.name.as_deref() else {
                tracing::warn!(
                    "Missing name for {} entry of '{}'",
                    property.op.as_str(),
                    view.name()
                );
                continue;
            };

            if let Err(e) = self.inject_value(view, target, property, name) {
                tracing::error!("Failed to inject {} for '{}': {}", name, view.name(), e);
                return Err(e);
            }
        }

        tracing::debug!("Successfully injected '{}'", view.name());

        if !target.has_hook(DONE_HOOK) {
            tracing::debug!("No hook '{}' defined for {}", DONE_HOOK, target.type_name());
            return Ok(());
        }

        target.call_hook(DONE_HOOK).map_err(|e| {
            tracing::error!("Hook '{}' failed for '{}': {}", DONE_HOOK, view.name(), e);
            e
        })
    }

    /// Dispatch on the value source; `ref` wins over `number`, then `text`,
    /// `time`, `list` and finally `pair`
    fn inject_value(
        &mut self,
        view: &DefinitionView<'_>,
        target: &BeanHandle,
        property: &PropertyEntry,
        name: &str,
    ) -> ContainerResult<()> {
        if let Some(reference) = &property.reference {
            let reference = self.environment.expand(reference);
            tracing::debug!("Injecting '{}' as {} into '{}'", reference, name, view.name());

            let value = self.create(&reference).map_err(|e| {
                tracing::error!("Failed to create reference '{}'", reference);
                e
            })?;
            return target.inject_reference(name, &value);
        }

        if let Some(number) = &property.number {
            let number = arithmetic::evaluate(&self.environment.expand(number))?;
            tracing::debug!("Injecting number {} as {} into '{}'", number, name, view.name());
            return target.inject_number(name, number);
        }

        if let Some(text) = &property.text {
            let text = self.environment.expand(text);
            tracing::debug!("Injecting '{}' as {} into '{}'", text, name, view.name());
            return target.inject_text(name, &text);
        }

        if let Some(time) = &property.time {
            let time = self.environment.expand(time);
            tracing::debug!("Injecting time {} as {} into '{}'", time, name, view.name());
            return target.inject_duration(name, timespan::parse(&time)?);
        }

        if let Some(list) = &property.list {
            let list = self.environment.expand(list);
            tracing::debug!("Injecting list {} as {} into '{}'", list, name, view.name());
            return target.inject_list(name, Self::split_list(&list));
        }

        if !property.pairs.is_empty() {
            if let Some(map) = self.build_map(view, property, name)? {
                tracing::debug!("Injecting map {} into '{}'", name, view.name());
                return target.inject_map(name, map);
            }
        }

        tracing::error!("Malformed configuration entry {} for '{}'", name, view.name());
        Ok(())
    }

    fn split_list(value: &str) -> Vec<String> {
        if value.trim().is_empty() {
            return Vec::new();
        }

        value
            .split(LIST_SEPARATORS)
            .map(|item| item.trim().to_string())
            .collect()
    }

    /// `None` when a pair lacks its text, which makes the entry malformed
    fn build_map(
        &self,
        view: &DefinitionView<'_>,
        property: &PropertyEntry,
        name: &str,
    ) -> ContainerResult<Option<BTreeMap<String, String>>> {
        let mut map = BTreeMap::new();

        for (position, pair) in property.pairs.iter().enumerate() {
            let Some(key) = pair.key.as_deref() else {
                tracing::warn!("Missing key for pair {} of {} in '{}'", position + 1, name, view.name());
                continue;
            };

            let Some(text) = pair.text.as_deref() else {
                tracing::error!("Missing text for pair {} of {} in '{}'", position + 1, name, view.name());
                return Ok(None);
            };

            let key = self.environment.expand(key);
            let text = self.environment.expand(text);
            tracing::trace!("Map pair {} -> {}", key, text);

            if map.contains_key(&key) {
                return Err(ContainerError::wrong_input(format!(
                    "duplicate map key {} for {} when injecting into {}",
                    key,
                    name,
                    view.name()
                )));
            }

            map.insert(key, text);
        }

        Ok(Some(map))
    }

    fn destroy_all(&mut self) {
        self.index.clear();
        let mut remaining = std::mem::take(&mut self.owned);

        if remaining.is_empty() {
            return;
        }

        tracing::info!("Destroying {} instances", remaining.len());

        for (name, handle) in &remaining {
            if !handle.has_hook(CLEANUP_HOOK) {
                continue;
            }

            tracing::debug!("Calling hook '{}' for '{}'", CLEANUP_HOOK, name);
            if let Err(e) = handle.call_hook(CLEANUP_HOOK) {
                tracing::error!("Hook '{}' failed for '{}': {}", CLEANUP_HOOK, name, e);
            }
        }

        while Self::try_destroy(&mut remaining) > 0 {}

        if remaining.is_empty() {
            tracing::info!("All instances destroyed");
            return;
        }

        tracing::warn!(
            "{} instances still referenced, probably a circular dependency",
            remaining.len()
        );

        for (name, handle) in remaining.drain(..) {
            tracing::warn!(
                "Instance '{}' of {} is still referenced ({}), destroying anyway",
                name,
                handle.type_name(),
                handle.reference_count() - 1
            );
        }
    }

    /// Drop every handle only the context still holds, newest first
    fn try_destroy(remaining: &mut Vec<(String, BeanHandle)>) -> usize {
        let mut destroyed = 0;
        let mut position = remaining.len();

        while position > 0 {
            position -= 1;

            if remaining[position].1.reference_count() > 1 {
                continue;
            }

            let (name, handle) = remaining.remove(position);
            tracing::debug!("Destroying '{}' ({})", name, handle.type_name());
            drop(handle);
            destroyed += 1;
        }

        destroyed
    }
}

impl Drop for ApplicationContext {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Configures and builds an [`ApplicationContext`]
#[derive(Default)]
pub struct ApplicationContextBuilder {
    environment: Option<Arc<Environment>>,
    library_paths: Vec<PathBuf>,
    avoid_early: bool,
}

impl ApplicationContextBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn environment(mut self, environment: Arc<Environment>) -> Self {
        self.environment = Some(environment);
        self
    }

    pub fn library_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.library_paths.push(path.into());
        self
    }

    pub fn library_paths<I, P>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.library_paths.extend(paths.into_iter().map(Into::into));
        self
    }

    /// Do not create `init = "early"` instances while building
    pub fn avoid_early(mut self, avoid: bool) -> Self {
        self.avoid_early = avoid;
        self
    }

    /// Register components, compute constants and create early instances
    ///
    /// Library search paths given to the builder come first, followed by
    /// those listed under `weave.library.path` in the environment.
    pub fn build(self, document: FactoryDocument) -> ContainerResult<ApplicationContext> {
        let registered = component::scan_components()?;
        tracing::debug!("{} components registered", registered);

        let environment = self.environment.unwrap_or_default();

        let mut library_paths = self.library_paths;
        if let Some(configured) = environment.get_string(LIBRARY_PATH_KEY) {
            library_paths.extend(std::env::split_paths(&configured));
        }

        let mut context = ApplicationContext {
            document: Arc::new(document),
            environment,
            loader: LibraryLoader::with_paths(library_paths),
            owned: Vec::new(),
            index: HashMap::new(),
            shut_down: false,
        };

        if let Err(e) = context.start(self.avoid_early) {
            tracing::error!("Failed to start application context: {}", e);
            context.shutdown();
            return Err(e);
        }

        tracing::info!(
            "Application context started with {} instances",
            context.len()
        );
        Ok(context)
    }
}
