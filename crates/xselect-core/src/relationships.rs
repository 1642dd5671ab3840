//! Parent/child relationship map derived from field declarations.
//!
//! The map is built once per [`FieldConfigs`](crate::config::FieldConfigs)
//! and never changes afterwards, so descendant lists are computed eagerly at
//! build time and served as slices.
//!
//! # Invariants
//!
//! 1. `children(p)` contains `c` iff `c` lists `p` as a parent; children keep
//!    declaration order.
//! 2. `descendants(f)` is the breadth-first closure of `children(f)`, each
//!    field listed once, never including `f` itself.
//! 3. Building fails on unknown parents, repeated parents, and cycles.

use ahash::{AHashMap, AHashSet};
use std::collections::VecDeque;

use crate::config::{DependsOn, FieldConfig};
use crate::error::ConfigError;

/// Derived relationship of one field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldRelationship {
    pub parent: DependsOn,
    pub children: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct RelationshipMap {
    fields: AHashMap<String, FieldRelationship>,
    descendants: AHashMap<String, Vec<String>>,
    order: Vec<String>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    InProgress,
    Done,
}

impl RelationshipMap {
    /// Derive the map from `fields`, rejecting graphs that are not a DAG over
    /// declared names.
    pub fn build(fields: &[FieldConfig]) -> Result<Self, ConfigError> {
        let mut map = Self {
            fields: AHashMap::with_capacity(fields.len()),
            descendants: AHashMap::with_capacity(fields.len()),
            order: Vec::with_capacity(fields.len()),
        };

        for field in fields {
            map.order.push(field.name.clone());
            map.fields.insert(
                field.name.clone(),
                FieldRelationship {
                    parent: field.depends_on.clone(),
                    children: Vec::new(),
                },
            );
        }

        for field in fields {
            let mut seen = AHashSet::new();
            for parent in field.depends_on.parents() {
                if !seen.insert(parent.as_str()) {
                    return Err(ConfigError::DuplicateParent {
                        field: field.name.clone(),
                        parent: parent.clone(),
                    });
                }
                match map.fields.get_mut(parent) {
                    Some(rel) => rel.children.push(field.name.clone()),
                    None => {
                        return Err(ConfigError::UnknownParent {
                            field: field.name.clone(),
                            parent: parent.clone(),
                        });
                    }
                }
            }
        }

        map.check_acyclic()?;

        for name in &map.order {
            let descendants = map.walk_descendants(name);
            map.descendants.insert(name.clone(), descendants);
        }

        Ok(map)
    }

    fn check_acyclic(&self) -> Result<(), ConfigError> {
        let mut marks: AHashMap<&str, Mark> = self
            .order
            .iter()
            .map(|n| (n.as_str(), Mark::Unvisited))
            .collect();
        let mut stack: Vec<&str> = Vec::new();
        for name in &self.order {
            self.visit(name, &mut marks, &mut stack)?;
        }
        Ok(())
    }

    fn visit<'a>(
        &'a self,
        name: &'a str,
        marks: &mut AHashMap<&'a str, Mark>,
        stack: &mut Vec<&'a str>,
    ) -> Result<(), ConfigError> {
        match marks.get(name).copied().unwrap_or(Mark::Done) {
            Mark::Done => return Ok(()),
            Mark::InProgress => {
                let start = stack.iter().position(|n| *n == name).unwrap_or(0);
                let mut path: Vec<String> = stack[start..].iter().map(|n| (*n).to_owned()).collect();
                path.push(name.to_owned());
                return Err(ConfigError::DependencyCycle { path });
            }
            Mark::Unvisited => {}
        }
        marks.insert(name, Mark::InProgress);
        stack.push(name);
        for child in self.children(name) {
            self.visit(child, marks, stack)?;
        }
        stack.pop();
        marks.insert(name, Mark::Done);
        Ok(())
    }

    fn walk_descendants(&self, field: &str) -> Vec<String> {
        let mut out = Vec::new();
        let mut seen: AHashSet<&str> = AHashSet::new();
        let mut queue: VecDeque<&str> = self.children(field).iter().map(String::as_str).collect();
        while let Some(next) = queue.pop_front() {
            if !seen.insert(next) {
                continue;
            }
            out.push(next.to_owned());
            queue.extend(self.children(next).iter().map(String::as_str));
        }
        out
    }

    #[must_use]
    pub fn get(&self, field: &str) -> Option<&FieldRelationship> {
        self.fields.get(field)
    }

    #[must_use]
    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    /// Parents of `field` in declaration order (empty for roots and unknown
    /// names).
    #[must_use]
    pub fn parents(&self, field: &str) -> &[String] {
        self.fields
            .get(field)
            .map_or(&[][..], |rel| rel.parent.parents())
    }

    /// Direct children of `field`.
    #[must_use]
    pub fn children(&self, field: &str) -> &[String] {
        self.fields.get(field).map_or(&[][..], |rel| &rel.children)
    }

    /// All transitive dependents of `field`, breadth-first.
    #[must_use]
    pub fn descendants(&self, field: &str) -> &[String] {
        self.descendants.get(field).map_or(&[][..], Vec::as_slice)
    }

    /// Fields with no parent, in declaration order.
    pub fn roots(&self) -> impl Iterator<Item = &str> {
        self.order
            .iter()
            .filter(|n| self.fields.get(n.as_str()).is_some_and(|r| r.parent.is_root()))
            .map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cascade() -> Vec<FieldConfig> {
        vec![
            FieldConfig::new("country"),
            FieldConfig::new("province").depends_on("country"),
            FieldConfig::new("city").depends_on("province"),
            FieldConfig::new("ward").depends_on("city"),
        ]
    }

    #[test]
    fn children_and_parents() {
        let map = RelationshipMap::build(&cascade()).unwrap();
        assert_eq!(map.children("country"), ["province"]);
        assert_eq!(map.parents("city"), ["province"]);
        assert!(map.parents("country").is_empty());
        assert_eq!(map.roots().collect::<Vec<_>>(), ["country"]);
    }

    #[test]
    fn descendants_breadth_first() {
        let map = RelationshipMap::build(&cascade()).unwrap();
        assert_eq!(map.descendants("country"), ["province", "city", "ward"]);
        assert_eq!(map.descendants("city"), ["ward"]);
        assert!(map.descendants("ward").is_empty());
        assert!(map.descendants("unknown").is_empty());
    }

    #[test]
    fn diamond_listed_once() {
        let map = RelationshipMap::build(&[
            FieldConfig::new("userIds"),
            FieldConfig::new("taskIds").depends_on("userIds"),
            FieldConfig::new("commentIds").depends_on(["userIds", "taskIds"]),
        ])
        .unwrap();
        assert_eq!(map.descendants("userIds"), ["taskIds", "commentIds"]);
        assert_eq!(map.children("taskIds"), ["commentIds"]);
    }

    #[test]
    fn unknown_parent_rejected() {
        let err = RelationshipMap::build(&[FieldConfig::new("city").depends_on("province")])
            .unwrap_err();
        assert!(matches!(err, ConfigError::UnknownParent { .. }));
    }

    #[test]
    fn repeated_parent_rejected() {
        let err = RelationshipMap::build(&[
            FieldConfig::new("a"),
            FieldConfig::new("b").depends_on(["a", "a"]),
        ])
        .unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateParent { .. }));
    }

    #[test]
    fn cycle_rejected_with_path() {
        let err = RelationshipMap::build(&[
            FieldConfig::new("a").depends_on("c"),
            FieldConfig::new("b").depends_on("a"),
            FieldConfig::new("c").depends_on("b"),
        ])
        .unwrap_err();
        match err {
            ConfigError::DependencyCycle { path } => {
                assert_eq!(path.first(), path.last());
                assert_eq!(path.len(), 4);
            }
            other => panic!("expected cycle, got {other:?}"),
        }
    }

    #[test]
    fn self_dependency_is_a_cycle() {
        let err = RelationshipMap::build(&[FieldConfig::new("a").depends_on("a")]).unwrap_err();
        assert!(matches!(err, ConfigError::DependencyCycle { .. }));
    }
}
