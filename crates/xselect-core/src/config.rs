//! Field declarations.
//!
//! A [`FieldConfig`] declares one select control: its name, which fields it
//! depends on, where its options come from, and whether it holds one or many
//! values. [`FieldConfigs`] is the validated, immutable list handed to a
//! store; it owns the [`RelationshipMap`] derived from it.
//!
//! # Invariants
//!
//! 1. Field names are unique within a [`FieldConfigs`].
//! 2. Every parent named by a `depends_on` is declared.
//! 3. The dependency graph is acyclic.
//! 4. The relationship map is built exactly once per [`FieldConfigs`]; clones
//!    share it.

use std::fmt;
use std::future::Future;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use ahash::AHashMap;
use futures::FutureExt;
use futures::future::LocalBoxFuture;
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, LoadError};
use crate::option::{OptionSet, XSelectOption};
use crate::relationships::RelationshipMap;
use crate::value::ParentSnapshot;

/// Single- or multi-select.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectMode {
    #[default]
    Single,
    Multiple,
}

/// A field's normalized dependency.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum DependsOn {
    #[default]
    NoParent,
    SingleParent(String),
    MultiParent(Vec<String>),
}

impl DependsOn {
    /// Normalize a list of parent names: none, one, or several.
    #[must_use]
    pub fn from_names(mut names: Vec<String>) -> Self {
        match names.len() {
            0 => Self::NoParent,
            1 => Self::SingleParent(names.swap_remove(0)),
            _ => Self::MultiParent(names),
        }
    }

    /// Parent names in declaration order.
    #[must_use]
    pub fn parents(&self) -> &[String] {
        match self {
            Self::NoParent => &[],
            Self::SingleParent(p) => std::slice::from_ref(p),
            Self::MultiParent(ps) => ps,
        }
    }

    #[must_use]
    pub fn is_root(&self) -> bool {
        matches!(self, Self::NoParent)
    }

    #[must_use]
    pub fn is_multi(&self) -> bool {
        matches!(self, Self::MultiParent(_))
    }
}

impl From<&str> for DependsOn {
    fn from(name: &str) -> Self {
        Self::SingleParent(name.to_owned())
    }
}

impl From<String> for DependsOn {
    fn from(name: String) -> Self {
        Self::SingleParent(name)
    }
}

impl From<Vec<&str>> for DependsOn {
    fn from(names: Vec<&str>) -> Self {
        Self::from_names(names.into_iter().map(str::to_owned).collect())
    }
}

impl From<Vec<String>> for DependsOn {
    fn from(names: Vec<String>) -> Self {
        Self::from_names(names)
    }
}

impl<const N: usize> From<[&str; N]> for DependsOn {
    fn from(names: [&str; N]) -> Self {
        Self::from_names(names.iter().map(|s| (*s).to_owned()).collect())
    }
}

/// Future returned by an [`OptionLoader`].
pub type LoadFuture = LocalBoxFuture<'static, Result<Vec<XSelectOption>, LoadError>>;

/// Fetches the options reachable under a given parent value.
pub type OptionLoader = Rc<dyn Fn(ParentSnapshot) -> LoadFuture>;

/// Replaces the default reachability filter for one field.
pub type FilterFn = Rc<dyn Fn(&[XSelectOption], &ParentSnapshot) -> Vec<XSelectOption>>;

/// Where a field's options come from.
#[derive(Clone)]
pub enum OptionsSource {
    Static(OptionSet),
    Async(OptionLoader),
}

impl Default for OptionsSource {
    fn default() -> Self {
        Self::Static(OptionSet::empty())
    }
}

impl fmt::Debug for OptionsSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Static(set) => f.debug_tuple("Static").field(&set.len()).finish(),
            Self::Async(_) => f.write_str("Async(..)"),
        }
    }
}

/// Declaration of one cascading select field.
#[derive(Clone, Default)]
pub struct FieldConfig {
    pub name: String,
    pub depends_on: DependsOn,
    pub options: OptionsSource,
    pub filter_options: Option<FilterFn>,
    pub mode: SelectMode,
    pub label: Option<String>,
    pub placeholder: Option<String>,
}

impl FieldConfig {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn depends_on(mut self, parents: impl Into<DependsOn>) -> Self {
        self.depends_on = parents.into();
        self
    }

    #[must_use]
    pub fn options(mut self, options: impl Into<OptionSet>) -> Self {
        self.options = OptionsSource::Static(options.into());
        self
    }

    /// Load options on demand from the field's parent value.
    #[must_use]
    pub fn loader<F, Fut>(mut self, load: F) -> Self
    where
        F: Fn(ParentSnapshot) -> Fut + 'static,
        Fut: Future<Output = Result<Vec<XSelectOption>, LoadError>> + 'static,
    {
        self.options = OptionsSource::Async(Rc::new(move |parent| load(parent).boxed_local()));
        self
    }

    #[must_use]
    pub fn filter_options(
        mut self,
        filter: impl Fn(&[XSelectOption], &ParentSnapshot) -> Vec<XSelectOption> + 'static,
    ) -> Self {
        self.filter_options = Some(Rc::new(filter));
        self
    }

    #[must_use]
    pub fn multiple(mut self) -> Self {
        self.mode = SelectMode::Multiple;
        self
    }

    #[must_use]
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    #[must_use]
    pub fn placeholder(mut self, placeholder: impl Into<String>) -> Self {
        self.placeholder = Some(placeholder.into());
        self
    }

    #[must_use]
    pub fn is_async(&self) -> bool {
        matches!(self.options, OptionsSource::Async(_))
    }
}

impl fmt::Debug for FieldConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldConfig")
            .field("name", &self.name)
            .field("depends_on", &self.depends_on)
            .field("options", &self.options)
            .field("custom_filter", &self.filter_options.is_some())
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}

// ─── Declarative form ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum DeclParents {
    One(String),
    Many(Vec<String>),
}

/// A serde-friendly field declaration with static options.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDecl {
    pub name: String,
    #[serde(default)]
    depends_on: Option<DeclParents>,
    #[serde(default)]
    pub options: Vec<XSelectOption>,
    #[serde(default)]
    pub mode: SelectMode,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub placeholder: Option<String>,
}

impl From<FieldDecl> for FieldConfig {
    fn from(decl: FieldDecl) -> Self {
        let depends_on = match decl.depends_on {
            None => DependsOn::NoParent,
            Some(DeclParents::One(name)) => DependsOn::SingleParent(name),
            Some(DeclParents::Many(names)) => DependsOn::from_names(names),
        };
        Self {
            name: decl.name,
            depends_on,
            options: OptionsSource::Static(OptionSet::new(decl.options)),
            filter_options: None,
            mode: decl.mode,
            label: decl.label,
            placeholder: decl.placeholder,
        }
    }
}

// ─── FieldConfigs ────────────────────────────────────────────────────────────

static NEXT_CONFIG_SET_ID: AtomicU64 = AtomicU64::new(1);

/// Stable identity of a [`FieldConfigs`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConfigSetId(u64);

impl ConfigSetId {
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

struct ConfigsInner {
    id: ConfigSetId,
    fields: Vec<FieldConfig>,
    by_name: AHashMap<String, usize>,
    relationships: Rc<RelationshipMap>,
}

/// Validated, immutable list of field declarations.
#[derive(Clone)]
pub struct FieldConfigs {
    inner: Rc<ConfigsInner>,
}

impl FieldConfigs {
    /// Validate `fields` and derive their relationship map.
    pub fn new(fields: Vec<FieldConfig>) -> Result<Self, ConfigError> {
        let mut by_name = AHashMap::with_capacity(fields.len());
        for (i, field) in fields.iter().enumerate() {
            if by_name.insert(field.name.clone(), i).is_some() {
                return Err(ConfigError::DuplicateField {
                    name: field.name.clone(),
                });
            }
        }
        let relationships = RelationshipMap::build(&fields)?;
        Ok(Self {
            inner: Rc::new(ConfigsInner {
                id: ConfigSetId(NEXT_CONFIG_SET_ID.fetch_add(1, Ordering::Relaxed)),
                fields,
                by_name,
                relationships: Rc::new(relationships),
            }),
        })
    }

    /// Parse a JSON array of [`FieldDecl`]s.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let decls: Vec<FieldDecl> = serde_json::from_str(json)?;
        Self::new(decls.into_iter().map(FieldConfig::from).collect())
    }

    #[must_use]
    pub fn id(&self) -> ConfigSetId {
        self.inner.id
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&FieldConfig> {
        self.inner.by_name.get(name).map(|&i| &self.inner.fields[i])
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.inner.by_name.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldConfig> {
        self.inner.fields.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.fields.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.fields.is_empty()
    }

    /// The relationship map built for this config list.
    #[must_use]
    pub fn relationships(&self) -> &RelationshipMap {
        &self.inner.relationships
    }

    /// Shared handle to the same map [`relationships`](Self::relationships)
    /// borrows.
    #[must_use]
    pub fn relationships_rc(&self) -> Rc<RelationshipMap> {
        Rc::clone(&self.inner.relationships)
    }
}

impl fmt::Debug for FieldConfigs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldConfigs")
            .field("id", &self.inner.id.0)
            .field("fields", &self.inner.fields)
            .finish()
    }
}
