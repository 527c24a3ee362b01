//! Declarative object graph
//!
//! A [`FactoryDocument`] lists constants, aliases and instances. It is read
//! once and never modified by the application context. [`DefinitionView`]
//! answers the questions the context asks about one name, applying `${...}`
//! interpolation and the `if-yes` gates on the fly.

use crate::config::Environment;
use crate::constants::TRUTHY_VALUES;
use crate::error::{ContainerError, ContainerResult};
use serde::{Deserialize, Deserializer};
use std::fs;
use std::path::Path;

/// Accept strings as well as bare TOML scalars for attribute values
fn scalar<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Scalar {
        Text(String),
        Integer(i64),
        Float(f64),
        Boolean(bool),
    }

    Ok(Option::<Scalar>::deserialize(deserializer)?.map(|value| match value {
        Scalar::Text(s) => s,
        Scalar::Integer(i) => i.to_string(),
        Scalar::Float(f) => f.to_string(),
        Scalar::Boolean(b) => b.to_string(),
    }))
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InitMode {
    #[default]
    Lazy,
    Early,
}

/// `set` assigns a property, `add` appends to it
///
/// Both dispatch to the same setter; the distinction is left to the setter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PropertyOp {
    #[default]
    Set,
    Add,
}

impl PropertyOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            PropertyOp::Set => "set",
            PropertyOp::Add => "add",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PairEntry {
    pub key: Option<String>,
    #[serde(default, deserialize_with = "scalar")]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PropertyEntry {
    #[serde(default)]
    pub op: PropertyOp,
    pub name: Option<String>,
    #[serde(default, rename = "ref")]
    pub reference: Option<String>,
    #[serde(default, deserialize_with = "scalar")]
    pub number: Option<String>,
    #[serde(default, deserialize_with = "scalar")]
    pub text: Option<String>,
    #[serde(default, deserialize_with = "scalar")]
    pub time: Option<String>,
    #[serde(default)]
    pub list: Option<String>,
    #[serde(default, rename = "pair")]
    pub pairs: Vec<PairEntry>,
    #[serde(default, rename = "if-yes", deserialize_with = "scalar")]
    pub if_yes: Option<String>,
}

impl PropertyEntry {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn with_op(mut self, op: PropertyOp) -> Self {
        self.op = op;
        self
    }

    pub fn with_ref(mut self, target: impl Into<String>) -> Self {
        self.reference = Some(target.into());
        self
    }

    pub fn with_number(mut self, number: impl Into<String>) -> Self {
        self.number = Some(number.into());
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_time(mut self, time: impl Into<String>) -> Self {
        self.time = Some(time.into());
        self
    }

    pub fn with_list(mut self, list: impl Into<String>) -> Self {
        self.list = Some(list.into());
        self
    }

    pub fn with_pair(mut self, key: impl Into<String>, text: impl Into<String>) -> Self {
        self.pairs.push(PairEntry {
            key: Some(key.into()),
            text: Some(text.into()),
        });
        self
    }

    pub fn with_if_yes(mut self, gate: impl Into<String>) -> Self {
        self.if_yes = Some(gate.into());
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InstanceEntry {
    pub name: String,
    pub class: Option<String>,
    pub library: Option<String>,
    #[serde(default)]
    pub init: InitMode,
    #[serde(default, rename = "property")]
    pub properties: Vec<PropertyEntry>,
}

impl InstanceEntry {
    pub fn new(name: impl Into<String>, class: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            class: Some(class.into()),
            ..Self::default()
        }
    }

    pub fn with_library(mut self, library: impl Into<String>) -> Self {
        self.library = Some(library.into());
        self
    }

    pub fn with_init(mut self, init: InitMode) -> Self {
        self.init = init;
        self
    }

    pub fn with_property(mut self, property: PropertyEntry) -> Self {
        self.properties.push(property);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AliasEntry {
    pub name: String,
    #[serde(rename = "ref")]
    pub target: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConstantEntry {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "scalar")]
    pub text: Option<String>,
    #[serde(default, deserialize_with = "scalar")]
    pub time: Option<String>,
    #[serde(default, deserialize_with = "scalar")]
    pub number: Option<String>,
    #[serde(default, rename = "yes-when")]
    pub yes_when: Option<String>,
}

/// The whole declarative object graph
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FactoryDocument {
    #[serde(default, rename = "constant")]
    pub constants: Vec<ConstantEntry>,
    #[serde(default, rename = "alias")]
    pub aliases: Vec<AliasEntry>,
    #[serde(default, rename = "instance")]
    pub instances: Vec<InstanceEntry>,
}

impl FactoryDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_toml_str(content: &str) -> ContainerResult<Self> {
        toml::from_str(content)
            .map_err(|e| ContainerError::Config(format!("failed to parse factory document: {}", e)))
    }

    pub fn from_file(path: impl AsRef<Path>) -> ContainerResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            ContainerError::Config(format!("failed to read factory document {:?}: {}", path, e))
        })?;

        tracing::debug!("Loading factory document {:?}", path);
        Self::from_toml_str(&content)
    }

    /// Append all declarations of `other`
    ///
    /// Lookups return the first declaration of a name, so entries merged
    /// later never shadow earlier ones.
    pub fn merge(&mut self, other: FactoryDocument) {
        self.constants.extend(other.constants);
        self.aliases.extend(other.aliases);
        self.instances.extend(other.instances);
    }

    pub fn with_constant(mut self, constant: ConstantEntry) -> Self {
        self.constants.push(constant);
        self
    }

    pub fn with_alias(mut self, name: impl Into<String>, target: impl Into<String>) -> Self {
        self.aliases.push(AliasEntry {
            name: name.into(),
            target: target.into(),
        });
        self
    }

    pub fn with_instance(mut self, instance: InstanceEntry) -> Self {
        self.instances.push(instance);
        self
    }

    pub fn instance(&self, name: &str) -> Option<&InstanceEntry> {
        self.instances.iter().find(|entry| entry.name == name)
    }

    pub fn alias(&self, name: &str) -> Option<&AliasEntry> {
        self.aliases.iter().find(|alias| alias.name == name)
    }

    /// Names of instances declared with `init = "early"`, in document order
    pub fn early_instances(&self) -> impl Iterator<Item = &str> {
        self.instances
            .iter()
            .filter(|entry| entry.init == InitMode::Early)
            .map(|entry| entry.name.as_str())
    }
}

/// Read-only view of the declarations for one name
pub struct DefinitionView<'a> {
    name: &'a str,
    document: &'a FactoryDocument,
    environment: &'a Environment,
}

impl<'a> DefinitionView<'a> {
    pub fn new(name: &'a str, document: &'a FactoryDocument, environment: &'a Environment) -> Self {
        Self {
            name,
            document,
            environment,
        }
    }

    pub fn name(&self) -> &str {
        self.name
    }

    /// The instance declaration, provided it names a class
    pub fn validate(&self) -> ContainerResult<&'a InstanceEntry> {
        let entry = self
            .document
            .instance(self.name)
            .ok_or_else(|| ContainerError::InstanceNotFound(self.name.to_string()))?;

        match entry.class.as_deref() {
            Some(class) if !class.trim().is_empty() => Ok(entry),
            _ => Err(ContainerError::ClassNotSpecified(self.name.to_string())),
        }
    }

    /// Declared class name, empty if none
    pub fn resolve_class(&self) -> String {
        self.document
            .instance(self.name)
            .and_then(|entry| entry.class.as_deref())
            .map(|class| self.environment.expand(class))
            .unwrap_or_default()
    }

    /// Declared library name, empty if none
    pub fn resolve_library(&self) -> String {
        self.document
            .instance(self.name)
            .and_then(|entry| entry.library.as_deref())
            .map(|library| self.environment.expand(library))
            .unwrap_or_default()
    }

    /// Target of the alias with this name, empty if it is not an alias
    pub fn resolve_alias(&self) -> ContainerResult<String> {
        let Some(alias) = self.document.alias(self.name) else {
            return Ok(String::new());
        };

        let target = self.environment.expand(&alias.target);
        if target == self.name {
            return Err(ContainerError::illegal_state(format!(
                "alias {} refers to itself",
                self.name
            )));
        }

        Ok(target)
    }

    pub fn init_mode(&self) -> InitMode {
        self.document
            .instance(self.name)
            .map(|entry| entry.init)
            .unwrap_or_default()
    }

    /// Property entries whose gate allows them, in document order
    pub fn property_entries(&self) -> Vec<&'a PropertyEntry> {
        let Some(entry) = self.document.instance(self.name) else {
            return Vec::new();
        };

        entry
            .properties
            .iter()
            .filter(|property| self.test_conditions(property))
            .collect()
    }

    fn test_conditions(&self, property: &PropertyEntry) -> bool {
        let Some(gate) = property.if_yes.as_deref() else {
            return true;
        };

        let value = self.environment.expand(gate);
        let enabled = TRUTHY_VALUES.contains(&value.as_str());
        if !enabled {
            tracing::trace!(
                "Skipping {} of {} on {}, gate evaluated to '{}'",
                property.op.as_str(),
                property.name.as_deref().unwrap_or("<unnamed>"),
                self.name,
                value
            );
        }

        enabled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MapPropertySource;
    use crate::error::ErrorKind;

    const DOCUMENT: &str = r#"
        [[constant]]
        name = "sum"
        number = "1 + ${FakeNumber}"

        [[alias]]
        name = "simpleAlias"
        ref = "simple"

        [[alias]]
        name = "loop"
        ref = "loop"

        [[instance]]
        name = "simple"
        class = "weave::test::Fake"
        library = "fake"

        [[instance.property]]
        name = "index"
        number = 5

        [[instance.property]]
        op = "add"
        name = "tag"
        text = "first"
        if-yes = "${enabled}"

        [[instance.property]]
        name = "mapping"
        pair = [{ key = "a", text = "1" }, { key = "b", text = "2" }]

        [[instance]]
        name = "early"
        class = "weave::test::Fake"
        init = "early"

        [[instance]]
        name = "classless"
    "#;

    fn environment(enabled: &str) -> Environment {
        Environment::new().with_property_source(
            MapPropertySource::new("test")
                .with_property("FakeNumber", 42i64)
                .with_property("enabled", enabled),
        )
    }

    #[test]
    fn test_parse_document() {
        let document = FactoryDocument::from_toml_str(DOCUMENT).unwrap();

        assert_eq!(document.constants.len(), 1);
        assert_eq!(document.aliases.len(), 2);
        assert_eq!(document.instances.len(), 3);

        let simple = document.instance("simple").unwrap();
        assert_eq!(simple.properties[0].number.as_deref(), Some("5"));
        assert_eq!(simple.properties[1].op, PropertyOp::Add);
        assert_eq!(simple.properties[2].pairs.len(), 2);
        assert_eq!(document.early_instances().collect::<Vec<_>>(), vec!["early"]);
    }

    #[test]
    fn test_unknown_attribute_is_config_error() {
        let error = FactoryDocument::from_toml_str("[[instance]]\nname = \"x\"\nklass = \"y\"\n")
            .unwrap_err();
        assert_eq!(error.kind(), ErrorKind::Config);
    }

    #[test]
    fn test_validate() {
        let document = FactoryDocument::from_toml_str(DOCUMENT).unwrap();
        let env = environment("yes");

        assert!(DefinitionView::new("simple", &document, &env).validate().is_ok());

        let error = DefinitionView::new("missing", &document, &env).validate().unwrap_err();
        assert_eq!(error.kind(), ErrorKind::NotFound);

        let error = DefinitionView::new("classless", &document, &env)
            .validate()
            .unwrap_err();
        assert!(matches!(error, ContainerError::ClassNotSpecified(_)));
    }

    #[test]
    fn test_resolve_class_library_and_alias() {
        let document = FactoryDocument::from_toml_str(DOCUMENT).unwrap();
        let env = environment("yes");

        let view = DefinitionView::new("simple", &document, &env);
        assert_eq!(view.resolve_class(), "weave::test::Fake");
        assert_eq!(view.resolve_library(), "fake");
        assert_eq!(view.resolve_alias().unwrap(), "");

        let early = DefinitionView::new("early", &document, &env);
        assert_eq!(early.resolve_library(), "");
        assert_eq!(early.init_mode(), InitMode::Early);

        let alias = DefinitionView::new("simpleAlias", &document, &env);
        assert_eq!(alias.resolve_alias().unwrap(), "simple");

        let error = DefinitionView::new("loop", &document, &env)
            .resolve_alias()
            .unwrap_err();
        assert_eq!(error.kind(), ErrorKind::IllegalState);
    }

    #[test]
    fn test_property_gates() {
        let document = FactoryDocument::from_toml_str(DOCUMENT).unwrap();

        for truthy in ["y", "yes", "true"] {
            let env = environment(truthy);
            let view = DefinitionView::new("simple", &document, &env);
            assert_eq!(view.property_entries().len(), 3);
        }

        for falsy in ["no", "YES", "1", ""] {
            let env = environment(falsy);
            let view = DefinitionView::new("simple", &document, &env);
            let names: Vec<_> = view
                .property_entries()
                .iter()
                .filter_map(|p| p.name.as_deref())
                .collect();
            assert_eq!(names, vec!["index", "mapping"]);
        }
    }

    #[test]
    fn test_merge_appends() {
        let mut first = FactoryDocument::new()
            .with_instance(InstanceEntry::new("a", "A"))
            .with_alias("b", "a");
        let second = FactoryDocument::new()
            .with_instance(InstanceEntry::new("a", "Other"))
            .with_instance(InstanceEntry::new("c", "C"));

        first.merge(second);

        assert_eq!(first.instances.len(), 3);
        assert_eq!(first.instance("a").unwrap().class.as_deref(), Some("A"));
        assert!(first.instance("c").is_some());
        assert_eq!(first.alias("b").unwrap().target, "a");
    }
}
