//! Bean handle and its injection table
//!
//! A [`BeanHandle`] owns one shared, type-erased object together with the
//! table of setters the object's type declared through a [`BeanDescriptor`].
//! The engine only ever talks to instances through this table: it knows the
//! name and the kind of every property but never the concrete type.

use crate::cast::{CastRegistry, SharedObject};
use crate::component::Component;
use crate::error::{ContainerError, ContainerResult};
use crate::IntoResult;
use std::any::{Any, TypeId};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::marker::PhantomData;
use std::sync::{Arc, Weak};
use std::time::Duration;

type Target = dyn Any + Send + Sync;
type ValueSetter<V> = Box<dyn Fn(&Target, V) -> ContainerResult<()> + Send + Sync>;
type ReferenceSetter = Box<dyn Fn(&Target, &BeanHandle) -> ContainerResult<()> + Send + Sync>;
type TextSetter = Box<dyn Fn(&Target, &str) -> ContainerResult<()> + Send + Sync>;
type HookFn = Box<dyn Fn(&Target) -> ContainerResult<()> + Send + Sync>;

/// Shape of the value a property accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PropertyKind {
    Reference,
    Number,
    Text,
    Duration,
    List,
    Map,
    Hook,
}

impl PropertyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PropertyKind::Reference => "reference",
            PropertyKind::Number => "number",
            PropertyKind::Text => "text",
            PropertyKind::Duration => "time",
            PropertyKind::List => "list",
            PropertyKind::Map => "map",
            PropertyKind::Hook => "hook",
        }
    }
}

impl fmt::Display for PropertyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub(crate) enum Setter {
    Reference(ReferenceSetter),
    Number(ValueSetter<f64>),
    Text(TextSetter),
    Duration(ValueSetter<Duration>),
    List(ValueSetter<Vec<String>>),
    Map(ValueSetter<BTreeMap<String, String>>),
    Hook(HookFn),
}

impl Setter {
    fn kind(&self) -> PropertyKind {
        match self {
            Setter::Reference(_) => PropertyKind::Reference,
            Setter::Number(_) => PropertyKind::Number,
            Setter::Text(_) => PropertyKind::Text,
            Setter::Duration(_) => PropertyKind::Duration,
            Setter::List(_) => PropertyKind::List,
            Setter::Map(_) => PropertyKind::Map,
            Setter::Hook(_) => PropertyKind::Hook,
        }
    }
}

fn target<T: Any>(object: &Target) -> ContainerResult<&T> {
    object.downcast_ref::<T>().ok_or_else(|| {
        ContainerError::illegal_state(format!(
            "setter of {} applied to a foreign object",
            std::any::type_name::<T>()
        ))
    })
}

/// Convert a configuration number into an integer property value
///
/// Rejects values outside of the `i64` range, values with a fractional part
/// and values the target type `N` cannot represent.
pub fn to_integer<N: TryFrom<i64>>(value: f64) -> ContainerResult<N> {
    if !value.is_finite() || value < i64::MIN as f64 || value >= i64::MAX as f64 {
        return Err(ContainerError::wrong_input(format!(
            "number {} is out of range",
            value
        )));
    }

    if value.fract() != 0.0 {
        return Err(ContainerError::wrong_input(format!(
            "given number is not an integer: {}",
            value
        )));
    }

    N::try_from(value as i64).map_err(|_| {
        ContainerError::wrong_input(format!(
            "number {} is out of range for {}",
            value,
            std::any::type_name::<N>()
        ))
    })
}

/// Collects the injectable surface of `T`
///
/// Each method binds one property name to one setter. Binding the same name
/// twice fails with a duplicate error, which surfaces while the type is
/// registered rather than while a configuration is wired.
pub struct BeanDescriptor<T> {
    setters: HashMap<String, Setter>,
    _marker: PhantomData<fn(&T)>,
}

impl<T: Any + Send + Sync> BeanDescriptor<T> {
    pub fn new() -> Self {
        Self {
            setters: HashMap::new(),
            _marker: PhantomData,
        }
    }

    fn bind(&mut self, name: &str, setter: Setter) -> ContainerResult<&mut Self> {
        if self.setters.contains_key(name) {
            return Err(ContainerError::DuplicateProperty {
                property: name.to_string(),
                type_name: std::any::type_name::<T>(),
            });
        }

        self.setters.insert(name.to_string(), setter);
        Ok(self)
    }

    /// Shared reference to another instance, cast to `I` before the call
    pub fn reference<I, F, R>(&mut self, name: &str, setter: F) -> ContainerResult<&mut Self>
    where
        I: ?Sized + 'static,
        F: Fn(&T, Arc<I>) -> R + Send + Sync + 'static,
        R: IntoResult,
    {
        self.bind(
            name,
            Setter::Reference(Box::new(move |object: &Target, value: &BeanHandle| {
                let value = value.cast::<I>()?;
                setter(target::<T>(object)?, value).into_result()
            })),
        )
    }

    /// Like [`reference`](Self::reference) but hands out a `Weak` pointer
    pub fn weak_reference<I, F, R>(&mut self, name: &str, setter: F) -> ContainerResult<&mut Self>
    where
        I: ?Sized + 'static,
        F: Fn(&T, Weak<I>) -> R + Send + Sync + 'static,
        R: IntoResult,
    {
        self.bind(
            name,
            Setter::Reference(Box::new(move |object: &Target, value: &BeanHandle| {
                let value = value.cast::<I>()?;
                setter(target::<T>(object)?, Arc::downgrade(&value)).into_result()
            })),
        )
    }

    pub fn number<F, R>(&mut self, name: &str, setter: F) -> ContainerResult<&mut Self>
    where
        F: Fn(&T, f64) -> R + Send + Sync + 'static,
        R: IntoResult,
    {
        self.bind(
            name,
            Setter::Number(Box::new(move |object: &Target, value: f64| {
                setter(target::<T>(object)?, value).into_result()
            })),
        )
    }

    /// Number property backed by an integer type
    pub fn integer<N, F, R>(&mut self, name: &str, setter: F) -> ContainerResult<&mut Self>
    where
        N: TryFrom<i64> + 'static,
        F: Fn(&T, N) -> R + Send + Sync + 'static,
        R: IntoResult,
    {
        self.bind(
            name,
            Setter::Number(Box::new(move |object: &Target, value: f64| {
                let value = to_integer::<N>(value)?;
                setter(target::<T>(object)?, value).into_result()
            })),
        )
    }

    /// Number property where any non-zero value means `true`
    pub fn boolean<F, R>(&mut self, name: &str, setter: F) -> ContainerResult<&mut Self>
    where
        F: Fn(&T, bool) -> R + Send + Sync + 'static,
        R: IntoResult,
    {
        self.bind(
            name,
            Setter::Number(Box::new(move |object: &Target, value: f64| {
                setter(target::<T>(object)?, value != 0.0).into_result()
            })),
        )
    }

    pub fn text<F, R>(&mut self, name: &str, setter: F) -> ContainerResult<&mut Self>
    where
        F: Fn(&T, &str) -> R + Send + Sync + 'static,
        R: IntoResult,
    {
        self.bind(
            name,
            Setter::Text(Box::new(move |object: &Target, value: &str| {
                setter(target::<T>(object)?, value).into_result()
            })),
        )
    }

    /// Text property that must hold exactly one character
    pub fn character<F, R>(&mut self, name: &str, setter: F) -> ContainerResult<&mut Self>
    where
        F: Fn(&T, char) -> R + Send + Sync + 'static,
        R: IntoResult,
    {
        self.bind(
            name,
            Setter::Text(Box::new(move |object: &Target, value: &str| {
                let mut chars = value.chars();
                let c = match (chars.next(), chars.next()) {
                    (Some(c), None) => c,
                    _ => {
                        return Err(ContainerError::wrong_input(format!(
                            "expected a single character but got '{}'",
                            value
                        )))
                    }
                };
                setter(target::<T>(object)?, c).into_result()
            })),
        )
    }

    pub fn time<F, R>(&mut self, name: &str, setter: F) -> ContainerResult<&mut Self>
    where
        F: Fn(&T, Duration) -> R + Send + Sync + 'static,
        R: IntoResult,
    {
        self.bind(
            name,
            Setter::Duration(Box::new(move |object: &Target, value: Duration| {
                setter(target::<T>(object)?, value).into_result()
            })),
        )
    }

    pub fn list<F, R>(&mut self, name: &str, setter: F) -> ContainerResult<&mut Self>
    where
        F: Fn(&T, Vec<String>) -> R + Send + Sync + 'static,
        R: IntoResult,
    {
        self.bind(
            name,
            Setter::List(Box::new(move |object: &Target, value: Vec<String>| {
                setter(target::<T>(object)?, value).into_result()
            })),
        )
    }

    pub fn map<F, R>(&mut self, name: &str, setter: F) -> ContainerResult<&mut Self>
    where
        F: Fn(&T, BTreeMap<String, String>) -> R + Send + Sync + 'static,
        R: IntoResult,
    {
        self.bind(
            name,
            Setter::Map(Box::new(
                move |object: &Target, value: BTreeMap<String, String>| {
                    setter(target::<T>(object)?, value).into_result()
                },
            )),
        )
    }

    /// Zero-argument lifecycle hook such as `done` or `cleanup`
    pub fn hook<F, R>(&mut self, name: &str, hook: F) -> ContainerResult<&mut Self>
    where
        F: Fn(&T) -> R + Send + Sync + 'static,
        R: IntoResult,
    {
        self.bind(
            name,
            Setter::Hook(Box::new(move |object: &Target| {
                hook(target::<T>(object)?).into_result()
            })),
        )
    }

    pub fn len(&self) -> usize {
        self.setters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.setters.is_empty()
    }
}

impl<T: Any + Send + Sync> Default for BeanDescriptor<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-type metadata shared by every handle of that type
pub struct BeanMeta {
    class_name: &'static str,
    type_id: TypeId,
    type_name: &'static str,
    setters: HashMap<String, Setter>,
}

impl BeanMeta {
    pub(crate) fn new<T: Any + Send + Sync>(
        class_name: &'static str,
        descriptor: BeanDescriptor<T>,
    ) -> Self {
        Self {
            class_name,
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            setters: descriptor.setters,
        }
    }

    /// Run the component's own description of its properties
    pub fn describe<T: Component>() -> ContainerResult<Self> {
        let mut descriptor = BeanDescriptor::<T>::new();
        T::describe(&mut descriptor)?;
        Ok(Self::new(T::class_name(), descriptor))
    }

    pub fn class_name(&self) -> &'static str {
        self.class_name
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }
}

impl fmt::Debug for BeanMeta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut properties: Vec<_> = self.setters.keys().collect();
        properties.sort();

        f.debug_struct("BeanMeta")
            .field("class_name", &self.class_name)
            .field("type_name", &self.type_name)
            .field("properties", &properties)
            .finish()
    }
}

/// Type-erased, reference-counted instance plus its setter table
///
/// Cloning a handle shares ownership of the same object.
#[derive(Clone)]
pub struct BeanHandle {
    object: SharedObject,
    meta: Arc<BeanMeta>,
}

impl BeanHandle {
    pub(crate) fn with_meta<T: Any + Send + Sync>(object: Arc<T>, meta: Arc<BeanMeta>) -> Self {
        debug_assert_eq!(meta.type_id, TypeId::of::<T>());
        Self { object, meta }
    }

    /// Wrap an existing component instance
    pub fn of<T: Component>(object: Arc<T>) -> ContainerResult<Self> {
        let meta = BeanMeta::describe::<T>()?;
        Ok(Self::with_meta(object, Arc::new(meta)))
    }

    /// The shared slot the cast registry operates on
    pub fn raw(&self) -> &SharedObject {
        &self.object
    }

    pub fn reference_count(&self) -> usize {
        Arc::strong_count(&self.object)
    }

    pub fn type_id(&self) -> TypeId {
        self.meta.type_id
    }

    pub fn type_name(&self) -> &'static str {
        self.meta.type_name
    }

    pub fn class_name(&self) -> &'static str {
        self.meta.class_name
    }

    pub fn ptr_eq(&self, other: &BeanHandle) -> bool {
        std::ptr::eq(
            Arc::as_ptr(&self.object) as *const (),
            Arc::as_ptr(&other.object) as *const (),
        )
    }

    /// View the instance as `Arc<I>` through a registered cast edge
    pub fn cast<I: ?Sized + 'static>(&self) -> ContainerResult<Arc<I>> {
        CastRegistry::global().cast::<I>(&self.object, self.meta.type_id, self.meta.type_name)
    }

    /// View the instance as its concrete type
    pub fn downcast<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        Arc::clone(&self.object).downcast::<T>().ok()
    }

    pub fn property_names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.meta.setters.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn property_kind(&self, name: &str) -> Option<PropertyKind> {
        self.meta.setters.get(name).map(Setter::kind)
    }

    fn setter(&self, name: &str, kind: PropertyKind) -> ContainerResult<&Setter> {
        self.meta
            .setters
            .get(name)
            .ok_or_else(|| ContainerError::PropertyNotFound {
                property: name.to_string(),
                kind: kind.as_str(),
                type_name: self.meta.type_name,
            })
    }

    fn mismatch(&self, name: &str, given: PropertyKind, expected: PropertyKind) -> ContainerError {
        ContainerError::wrong_input(format!(
            "property {} of {} expects {} but {} was given",
            name, self.meta.type_name, expected, given
        ))
    }

    pub fn inject_reference(&self, name: &str, value: &BeanHandle) -> ContainerResult<()> {
        match self.setter(name, PropertyKind::Reference)? {
            Setter::Reference(set) => set(&*self.object, value),
            other => Err(self.mismatch(name, PropertyKind::Reference, other.kind())),
        }
    }

    pub fn inject_number(&self, name: &str, value: f64) -> ContainerResult<()> {
        match self.setter(name, PropertyKind::Number)? {
            Setter::Number(set) => set(&*self.object, value),
            other => Err(self.mismatch(name, PropertyKind::Number, other.kind())),
        }
    }

    pub fn inject_text(&self, name: &str, value: &str) -> ContainerResult<()> {
        match self.setter(name, PropertyKind::Text)? {
            Setter::Text(set) => set(&*self.object, value),
            other => Err(self.mismatch(name, PropertyKind::Text, other.kind())),
        }
    }

    pub fn inject_duration(&self, name: &str, value: Duration) -> ContainerResult<()> {
        match self.setter(name, PropertyKind::Duration)? {
            Setter::Duration(set) => set(&*self.object, value),
            other => Err(self.mismatch(name, PropertyKind::Duration, other.kind())),
        }
    }

    pub fn inject_list(&self, name: &str, value: Vec<String>) -> ContainerResult<()> {
        match self.setter(name, PropertyKind::List)? {
            Setter::List(set) => set(&*self.object, value),
            other => Err(self.mismatch(name, PropertyKind::List, other.kind())),
        }
    }

    pub fn inject_map(&self, name: &str, value: BTreeMap<String, String>) -> ContainerResult<()> {
        match self.setter(name, PropertyKind::Map)? {
            Setter::Map(set) => set(&*self.object, value),
            other => Err(self.mismatch(name, PropertyKind::Map, other.kind())),
        }
    }

    pub fn has_hook(&self, name: &str) -> bool {
        matches!(self.meta.setters.get(name), Some(Setter::Hook(_)))
    }

    pub fn call_hook(&self, name: &str) -> ContainerResult<()> {
        match self.meta.setters.get(name) {
            Some(Setter::Hook(hook)) => hook(&*self.object),
            Some(other) => Err(self.mismatch(name, PropertyKind::Hook, other.kind())),
            None => Err(ContainerError::HookNotFound {
                hook: name.to_string(),
                type_name: self.meta.type_name,
            }),
        }
    }
}

impl fmt::Debug for BeanHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BeanHandle")
            .field("class_name", &self.meta.class_name)
            .field("type_name", &self.meta.type_name)
            .field("reference_count", &self.reference_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use parking_lot::Mutex;

    trait Sink: Send + Sync {
        fn id(&self) -> u32;
    }

    #[derive(Default)]
    struct Settings {
        label: Mutex<String>,
        index: Mutex<i32>,
        mark: Mutex<char>,
        enabled: Mutex<bool>,
        timeout: Mutex<Duration>,
        tags: Mutex<Vec<String>>,
        mapping: Mutex<BTreeMap<String, String>>,
        sink: Mutex<Option<Arc<dyn Sink>>>,
        finished: Mutex<bool>,
    }

    impl Sink for Settings {
        fn id(&self) -> u32 {
            7
        }
    }

    impl Settings {
        fn set_index(&self, index: i32) {
            *self.index.lock() = index;
        }

        fn set_sink(&self, sink: Arc<dyn Sink>) {
            *self.sink.lock() = Some(sink);
        }
    }

    impl Component for Settings {
        fn class_name() -> &'static str {
            "weave::test::Settings"
        }

        fn create() -> ContainerResult<Self> {
            Ok(Self::default())
        }

        fn describe(descriptor: &mut BeanDescriptor<Self>) -> ContainerResult<()> {
            descriptor
                .text("label", |this: &Self, value: &str| {
                    *this.label.lock() = value.to_string();
                })?
                .integer("index", Self::set_index)?
                .character("mark", |this: &Self, value: char| *this.mark.lock() = value)?
                .boolean("enabled", |this: &Self, value: bool| *this.enabled.lock() = value)?
                .time("timeout", |this: &Self, value: Duration| *this.timeout.lock() = value)?
                .list("tags", |this: &Self, value: Vec<String>| *this.tags.lock() = value)?
                .map("mapping", |this: &Self, value: BTreeMap<String, String>| {
                    *this.mapping.lock() = value
                })?
                .reference("sink", Self::set_sink)?
                .hook("done", |this: &Self| *this.finished.lock() = true)?;
            Ok(())
        }

        fn casts(registry: &CastRegistry) {
            registry.register::<Self, dyn Sink>(|object: Arc<Self>| -> Arc<dyn Sink> { object });
        }
    }

    struct Lonely;

    impl Component for Lonely {
        fn class_name() -> &'static str {
            "weave::test::Lonely"
        }

        fn create() -> ContainerResult<Self> {
            Ok(Lonely)
        }
    }

    fn handle() -> BeanHandle {
        BeanHandle::of(Arc::new(Settings::default())).unwrap()
    }

    #[test]
    fn test_inject_values() {
        let bean = handle();

        bean.inject_text("label", "Some text").unwrap();
        bean.inject_number("index", 16.0).unwrap();
        bean.inject_text("mark", "x").unwrap();
        bean.inject_number("enabled", 2.0).unwrap();
        bean.inject_duration("timeout", Duration::from_secs(5)).unwrap();
        bean.inject_list("tags", vec!["a".into(), "b".into()]).unwrap();
        bean.inject_map("mapping", BTreeMap::from([("a".into(), "1".into())]))
            .unwrap();

        let settings = bean.downcast::<Settings>().unwrap();
        assert_eq!(*settings.label.lock(), "Some text");
        assert_eq!(*settings.index.lock(), 16);
        assert_eq!(*settings.mark.lock(), 'x');
        assert!(*settings.enabled.lock());
        assert_eq!(*settings.timeout.lock(), Duration::from_secs(5));
        assert_eq!(settings.tags.lock().len(), 2);
        assert_eq!(settings.mapping.lock()["a"], "1");
    }

    #[test]
    fn test_invalid_integer_is_wrong_input() {
        let bean = handle();

        let error = bean.inject_number("index", 1.5).unwrap_err();
        assert_eq!(error.kind(), ErrorKind::WrongInput);

        let error = bean.inject_number("index", 1e12).unwrap_err();
        assert_eq!(error.kind(), ErrorKind::WrongInput);

        let error = bean.inject_number("index", f64::NAN).unwrap_err();
        assert_eq!(error.kind(), ErrorKind::WrongInput);
    }

    #[test]
    fn test_character_too_long_is_wrong_input() {
        let bean = handle();

        let error = bean.inject_text("mark", "xy").unwrap_err();
        assert_eq!(error.kind(), ErrorKind::WrongInput);

        let error = bean.inject_text("mark", "").unwrap_err();
        assert_eq!(error.kind(), ErrorKind::WrongInput);
    }

    #[test]
    fn test_missing_property_and_wrong_kind() {
        let bean = handle();

        let error = bean.inject_text("unknown", "x").unwrap_err();
        assert_eq!(error.kind(), ErrorKind::NotFound);

        let error = bean.inject_text("sink", "other").unwrap_err();
        assert_eq!(error.kind(), ErrorKind::WrongInput);

        assert_eq!(bean.property_kind("sink"), Some(PropertyKind::Reference));
        assert_eq!(bean.property_kind("index"), Some(PropertyKind::Number));
    }

    #[test]
    fn test_hooks() {
        let bean = handle();

        assert!(bean.has_hook("done"));
        assert!(!bean.has_hook("cleanup"));
        assert!(!bean.has_hook("label"));

        bean.call_hook("done").unwrap();
        assert!(*bean.downcast::<Settings>().unwrap().finished.lock());

        let error = bean.call_hook("cleanup").unwrap_err();
        assert_eq!(error.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_inject_reference_casts_and_shares() {
        Settings::register().unwrap();
        Lonely::register().unwrap();

        let bean = handle();
        let other = handle();
        bean.inject_reference("sink", &other).unwrap();

        assert_eq!(other.reference_count(), 2);
        let settings = bean.downcast::<Settings>().unwrap();
        assert_eq!(settings.sink.lock().as_ref().unwrap().id(), 7);

        let lonely = BeanHandle::of(Arc::new(Lonely)).unwrap();
        let error = bean.inject_reference("sink", &lonely).unwrap_err();
        assert_eq!(error.kind(), ErrorKind::CastUnavailable);
    }

    #[test]
    fn test_duplicate_binding() {
        let mut descriptor = BeanDescriptor::<Settings>::new();
        descriptor.text("label", |_: &Settings, _: &str| {}).unwrap();

        let error = descriptor
            .number("label", |_: &Settings, _: f64| {})
            .err()
            .unwrap();
        assert_eq!(error.kind(), ErrorKind::Duplicate);
    }

    #[test]
    fn test_identity_and_reference_count() {
        let bean = handle();
        let copy = bean.clone();

        assert!(bean.ptr_eq(&copy));
        assert!(!bean.ptr_eq(&handle()));
        assert_eq!(bean.reference_count(), 2);
        assert_eq!(bean.class_name(), "weave::test::Settings");
        assert!(bean.property_names().contains(&"mapping"));
    }

    #[test]
    fn test_to_integer_narrowing() {
        assert_eq!(to_integer::<u8>(255.0).unwrap(), 255u8);
        assert!(to_integer::<u8>(256.0).is_err());
        assert!(to_integer::<u32>(-1.0).is_err());
        assert_eq!(to_integer::<i64>(-16.0).unwrap(), -16);
    }
}
