//! Per-view collection cache.

use crate::model::Entity;
use std::collections::HashMap;

/// Records keyed by id, iterated in insertion order.
#[derive(Debug, Clone)]
pub struct CollectionCache<T> {
    entries: HashMap<String, T>,
    order: Vec<String>,
}

impl<T> Default for CollectionCache<T> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
            order: Vec::new(),
        }
    }
}

impl<T: Entity> CollectionCache<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a fetched snapshot. Later duplicates replace earlier ones in place.
    pub fn from_snapshot(records: impl IntoIterator<Item = T>) -> Self {
        let mut cache = Self::new();
        for record in records {
            cache.upsert(record);
        }
        cache
    }

    /// Insert a record, or replace it in place if the id is already present.
    pub fn upsert(&mut self, record: T) {
        let id = record.id().to_string();
        if self.entries.insert(id.clone(), record).is_none() {
            self.order.push(id);
        }
    }

    pub fn remove(&mut self, id: &str) -> Option<T> {
        let removed = self.entries.remove(id)?;
        self.order.retain(|existing| existing != id);
        Some(removed)
    }

    pub fn get(&self, id: &str) -> Option<&T> {
        self.entries.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    /// Every record, tombstoned ones included, in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.order.iter().filter_map(|id| self.entries.get(id))
    }

    /// Records that are not tombstoned, in insertion order.
    pub fn visible(&self) -> impl Iterator<Item = &T> {
        self.iter().filter(|record| !record.is_deleted())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Class, Lesson, LessonPlan};

    fn class(id: &str, name: &str) -> Class {
        let mut class = Class::new("t@example.com", name);
        class.set_id(id.to_string());
        class
    }

    #[test]
    fn test_upsert_keeps_position() {
        let mut cache = CollectionCache::new();
        cache.upsert(class("a", "First"));
        cache.upsert(class("b", "Second"));
        cache.upsert(class("a", "Renamed"));

        let names: Vec<_> = cache.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Renamed", "Second"]);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_remove() {
        let mut cache = CollectionCache::from_snapshot([class("a", "A"), class("b", "B")]);
        assert_eq!(cache.remove("a").map(|c| c.name), Some("A".to_string()));
        assert!(cache.remove("a").is_none());
        assert!(!cache.contains("a"));
        assert_eq!(cache.iter().count(), 1);
        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_visible_skips_tombstones() {
        let plan = LessonPlan::new("t@example.com", "Plan");
        let base = class("c", "Class");
        let mut live = Lesson::for_plan(&plan, &base, "T");
        live.set_id("LIVE01".to_string());
        let mut gone = live.clone();
        gone.set_id("GONE01".to_string());
        gone.mark_deleted();

        let cache = CollectionCache::from_snapshot([live, gone]);
        assert_eq!(cache.visible().count(), 1);
        assert_eq!(cache.iter().count(), 2);
        assert!(cache.get("GONE01").is_some_and(|l| l.deleted));
    }
}
