//! Typed configuration properties and the per-component registry.
//!
//! A [`Property`] is a cheap, cloneable handle: the component keeps one copy
//! (usually captured by its handlers) and the registry keeps another, so
//! values set from a pipeline file are immediately visible to the code that
//! reads them.

use crate::pipeline::error::{PipelineError, PipelineResult};
use crate::pipeline::translator::{EnumTable, PropertyValue, Translator, ValueTranslator};
use std::sync::{Arc, RwLock};

struct PropertyInner<T> {
    name: String,
    value: RwLock<T>,
    translator: Box<dyn Translator<T>>,
}

/// Named, typed configuration value with a string translator.
pub struct Property<T> {
    inner: Arc<PropertyInner<T>>,
}

impl<T> Clone for Property<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: PropertyValue> Property<T> {
    /// Property using the value type's own string conversion.
    pub fn new(name: impl Into<String>, default: T) -> Self {
        Self::with_translator(name, default, ValueTranslator)
    }
}

impl<T: Copy + PartialEq + Send + Sync + 'static> Property<T> {
    /// Property translated through an enumeration table.
    pub fn enumerated(name: impl Into<String>, table: &'static EnumTable<T>) -> Self {
        Self::with_translator(name, table.default_value(), table)
    }
}

impl<T: Clone + Send + Sync + 'static> Property<T> {
    pub fn with_translator(
        name: impl Into<String>,
        default: T,
        translator: impl Translator<T>,
    ) -> Self {
        Self {
            inner: Arc::new(PropertyInner {
                name: name.into(),
                value: RwLock::new(default),
                translator: Box::new(translator),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Current value.
    pub fn get(&self) -> T {
        self.inner
            .value
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn set(&self, value: T) {
        *self
            .inner
            .value
            .write()
            .unwrap_or_else(|e| e.into_inner()) = value;
    }

    /// Current value rendered through the translator.
    pub fn to_string_value(&self) -> String {
        let value = self.inner.value.read().unwrap_or_else(|e| e.into_inner());
        self.inner.translator.to_str(&value)
    }

    /// Parse `s` through the translator and store it.
    pub fn set_from_str(&self, s: &str) -> PipelineResult<()> {
        let value = self.inner.translator.from_str(&self.inner.name, s)?;
        self.set(value);
        Ok(())
    }
}

impl<T> std::fmt::Debug for Property<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Property")
            .field("name", &self.inner.name)
            .field("type", &std::any::type_name::<T>())
            .finish()
    }
}

/// Type-erased view used by the registry.
pub trait AnyProperty: Send + Sync {
    fn name(&self) -> &str;

    fn type_name(&self) -> &'static str;

    fn get_string(&self) -> String;

    fn set_string(&self, value: &str) -> PipelineResult<()>;
}

impl<T: Clone + Send + Sync + 'static> AnyProperty for Property<T> {
    fn name(&self) -> &str {
        Property::name(self)
    }

    fn type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }

    fn get_string(&self) -> String {
        self.to_string_value()
    }

    fn set_string(&self, value: &str) -> PipelineResult<()> {
        self.set_from_str(value)
    }
}

/// Properties owned by a single component, in registration order.
pub struct PropertyRegistry {
    owner: String,
    entries: Vec<Box<dyn AnyProperty>>,
}

impl PropertyRegistry {
    pub fn new(owner: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            entries: Vec::new(),
        }
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Add a property to the namespace. Fails if the name is taken.
    pub fn register<T: Clone + Send + Sync + 'static>(
        &mut self,
        property: &Property<T>,
    ) -> PipelineResult<()> {
        if self.contains(property.name()) {
            return Err(PipelineError::Duplicate {
                component: self.owner.clone(),
                kind: "property",
                name: property.name().to_string(),
            });
        }
        tracing::trace!("Component '{}': property '{}'", self.owner, property.name());
        self.entries.push(Box::new(property.clone()));
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|p| p.name() == name)
    }

    fn find(&self, name: &str) -> PipelineResult<&dyn AnyProperty> {
        self.entries
            .iter()
            .find(|p| p.name() == name)
            .map(|p| p.as_ref())
            .ok_or_else(|| PipelineError::UnknownProperty {
                component: self.owner.clone(),
                name: name.to_string(),
            })
    }

    /// Current value of `name` as a string.
    pub fn get(&self, name: &str) -> PipelineResult<String> {
        Ok(self.find(name)?.get_string())
    }

    /// Set `name` from its string form.
    pub fn set(&self, name: &str, value: &str) -> PipelineResult<()> {
        self.find(name)?.set_string(value)?;
        tracing::debug!("Component '{}': {} = {}", self.owner, name, value);
        Ok(())
    }

    /// Apply a batch of settings. Unknown keys are rejected before anything
    /// is written.
    pub fn apply<'a, I>(&self, settings: I) -> PipelineResult<()>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let settings: Vec<(&str, &str)> = settings.into_iter().collect();
        for (key, _) in &settings {
            self.find(key)?;
        }
        for (key, value) in settings {
            self.set(key, value)?;
        }
        Ok(())
    }

    /// Lazy `(name, value)` sequence. Calling it again restarts from the first
    /// property.
    pub fn enumerate(&self) -> PropertyIter<'_> {
        PropertyIter {
            inner: self.entries.iter(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Iterator returned by [`PropertyRegistry::enumerate`].
#[derive(Clone)]
pub struct PropertyIter<'a> {
    inner: std::slice::Iter<'a, Box<dyn AnyProperty>>,
}

impl<'a> Iterator for PropertyIter<'a> {
    type Item = (&'a str, String);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|p| (p.name(), p.get_string()))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}
