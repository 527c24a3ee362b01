// weave-core: configuration-driven dependency injection engine
//
// Instances are described in a TOML factory document and wired by name:
// - constants computed from text, time spans, arithmetic and comparisons
// - aliases, early instances and `${name}` placeholders
// - typed property injection with runtime interface casts
// - `done`/`cleanup` hooks and cycle-tolerant teardown
// - classes provided by shared libraries loaded on demand

pub mod arithmetic;
pub mod bean;
pub mod bean_factory;
pub mod cast;
pub mod component;
pub mod config;
pub mod constants;
pub mod context;
pub mod definition;
pub mod error;
pub mod library;
pub mod logging;
pub mod logical;
pub mod plugin;
pub mod timespan;

// Lets `::weave_core::...` paths emitted by the derive resolve inside this crate
extern crate self as weave_core;

use error::ContainerResult;

// Setters and hooks may return () or a Result
pub trait IntoResult {
    fn into_result(self) -> ContainerResult<()>;
}

impl IntoResult for () {
    fn into_result(self) -> ContainerResult<()> {
        Ok(())
    }
}

impl IntoResult for ContainerResult<()> {
    fn into_result(self) -> ContainerResult<()> {
        self
    }
}

impl IntoResult for anyhow::Result<()> {
    fn into_result(self) -> ContainerResult<()> {
        self.map_err(error::ContainerError::from)
    }
}

pub use bean::{BeanDescriptor, BeanHandle, BeanMeta, PropertyKind};
pub use bean_factory::{BeanFactory, ComponentFactory, FactoryRegistry};
pub use cast::{CastRegistry, SharedObject};
pub use component::{scan_components, scan_components_into, Component, ComponentRegistration};
pub use config::{
    ConfigValue, Environment, EnvironmentPropertySource, MapPropertySource, PropertySource,
    TomlPropertySource,
};
pub use constants::*;
pub use context::{ApplicationContext, ApplicationContextBuilder};
pub use definition::{
    AliasEntry, ConstantEntry, DefinitionView, FactoryDocument, InitMode, InstanceEntry,
    PairEntry, PropertyEntry, PropertyOp,
};
pub use error::{ContainerError, ContainerResult as Result, ErrorKind};
pub use library::LibraryLoader;
pub use logging::{LogFormat, LogLevel, LoggingConfig};
pub use logical::LogicalExpression;
pub use plugin::{ComponentHost, EntryStatus};

// Used by the derive macro
pub use inventory;

/// Commonly used traits and types
pub mod prelude {
    pub use crate::bean::{BeanDescriptor, BeanHandle};
    pub use crate::cast::CastRegistry;
    pub use crate::component::Component;
    pub use crate::config::{
        ConfigValue, Environment, EnvironmentPropertySource, MapPropertySource, PropertySource,
        TomlPropertySource,
    };
    pub use crate::context::{ApplicationContext, ApplicationContextBuilder};
    pub use crate::definition::FactoryDocument;
    pub use crate::error::{ContainerError, ContainerResult, ErrorKind};
    pub use crate::logging::{LogFormat, LogLevel, LoggingConfig};
    pub use anyhow::{anyhow, Context};
}
