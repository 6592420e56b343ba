//! Ordered feature collection with merge-time de-duplication.
//!
//! Entries are shared as `Arc<SpatialFeature>`. Identity means "the same
//! allocation" (`Arc::ptr_eq`), which lets a query result reference features
//! owned by a decoded tile without copying them. The coarser external id
//! de-duplication recognises the same real-world object clipped into
//! several tiles.

use std::collections::HashSet;
use std::sync::Arc;

use crate::models::{FeatureKind, SpatialFeature};

#[derive(Debug, Clone, Default)]
pub struct FeatureList {
    features: Vec<Arc<SpatialFeature>>,
}

impl FeatureList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self { features: Vec::with_capacity(capacity) }
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Arc<SpatialFeature>> {
        self.features.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Arc<SpatialFeature>> {
        self.features.iter()
    }

    /// Append without any duplicate check
    pub fn append(&mut self, feature: impl Into<Arc<SpatialFeature>>) {
        self.features.push(feature.into());
    }

    /// Append every entry of `other` that is not already present as the
    /// same allocation. Distinct but equal features are both kept.
    pub fn append_all_deduplicated_by_identity(&mut self, other: &FeatureList) {
        let mut seen: HashSet<*const SpatialFeature> =
            self.features.iter().map(Arc::as_ptr).collect();

        for feature in &other.features {
            if seen.insert(Arc::as_ptr(feature)) {
                self.features.push(Arc::clone(feature));
            }
        }
    }

    /// Append every entry of `other` whose external id has not been seen yet.
    ///
    /// Entries without an external id are always appended and never count as
    /// duplicates of each other.
    pub fn append_all_deduplicated_by_external_id(&mut self, other: &FeatureList) {
        let mut seen: HashSet<u64> = self.features.iter().filter_map(|f| f.external_id).collect();

        for feature in &other.features {
            match feature.external_id {
                Some(id) if !seen.insert(id) => {}
                _ => self.features.push(Arc::clone(feature)),
            }
        }
    }

    /// A new list holding only the features of the given kinds
    pub fn filter_kinds(&self, kinds: &[FeatureKind]) -> FeatureList {
        self.features.iter().filter(|f| kinds.contains(&f.kind)).cloned().collect()
    }

    /// Retain entries matching `keep`, preserving order
    pub fn retain(&mut self, mut keep: impl FnMut(&SpatialFeature) -> bool) {
        self.features.retain(|f| keep(f));
    }

    pub fn contains_identical(&self, feature: &Arc<SpatialFeature>) -> bool {
        self.features.iter().any(|f| Arc::ptr_eq(f, feature))
    }
}

impl FromIterator<Arc<SpatialFeature>> for FeatureList {
    fn from_iter<I: IntoIterator<Item = Arc<SpatialFeature>>>(iter: I) -> Self {
        Self { features: iter.into_iter().collect() }
    }
}

impl FromIterator<SpatialFeature> for FeatureList {
    fn from_iter<I: IntoIterator<Item = SpatialFeature>>(iter: I) -> Self {
        Self { features: iter.into_iter().map(Arc::new).collect() }
    }
}

impl Extend<Arc<SpatialFeature>> for FeatureList {
    fn extend<I: IntoIterator<Item = Arc<SpatialFeature>>>(&mut self, iter: I) {
        self.features.extend(iter);
    }
}

impl IntoIterator for FeatureList {
    type Item = Arc<SpatialFeature>;
    type IntoIter = std::vec::IntoIter<Arc<SpatialFeature>>;

    fn into_iter(self) -> Self::IntoIter {
        self.features.into_iter()
    }
}

impl<'a> IntoIterator for &'a FeatureList {
    type Item = &'a Arc<SpatialFeature>;
    type IntoIter = std::slice::Iter<'a, Arc<SpatialFeature>>;

    fn into_iter(self) -> Self::IntoIter {
        self.features.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FeatureGeometry;

    fn poi(name: &str, id: Option<u64>) -> SpatialFeature {
        let feature = SpatialFeature::new(FeatureGeometry::point(0.0, 0.0), FeatureKind::Poi)
            .with_property("name", name);
        match id {
            Some(id) => feature.with_external_id(id),
            None => feature,
        }
    }

    #[test]
    fn test_identity_dedup_keeps_one_instance() {
        let shared = Arc::new(poi("cafe", Some(1)));

        let mut list = FeatureList::new();
        let mut other = FeatureList::new();
        other.append(Arc::clone(&shared));
        other.append(Arc::clone(&shared));

        list.append_all_deduplicated_by_identity(&other);
        list.append_all_deduplicated_by_identity(&other);

        assert_eq!(list.len(), 1);
        assert!(list.contains_identical(&shared));
    }

    #[test]
    fn test_identity_dedup_keeps_equal_copies() {
        let mut other = FeatureList::new();
        other.append(poi("cafe", Some(1)));
        other.append(poi("cafe", Some(1)));

        let mut list = FeatureList::new();
        list.append_all_deduplicated_by_identity(&other);
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn test_external_id_dedup() {
        let mut other = FeatureList::new();
        other.append(poi("west half", Some(7)));
        other.append(poi("east half", Some(7)));

        let mut list = FeatureList::new();
        list.append_all_deduplicated_by_external_id(&other);

        assert_eq!(list.len(), 1);
        assert_eq!(list.get(0).and_then(|f| f.name()), Some("west half"));
    }

    #[test]
    fn test_external_id_dedup_seeds_from_existing_entries() {
        let mut list = FeatureList::new();
        list.append(poi("existing", Some(3)));

        let mut other = FeatureList::new();
        other.append(poi("incoming", Some(3)));
        other.append(poi("new", Some(4)));

        list.append_all_deduplicated_by_external_id(&other);
        let names: Vec<_> = list.iter().filter_map(|f| f.name()).collect();
        assert_eq!(names, vec!["existing", "new"]);
    }

    #[test]
    fn test_missing_external_id_always_appended() {
        let mut other = FeatureList::new();
        other.append(poi("a", None));
        other.append(poi("a", None));

        let mut list = FeatureList::new();
        list.append_all_deduplicated_by_external_id(&other);
        list.append_all_deduplicated_by_external_id(&other);

        assert_eq!(list.len(), 4);
    }

    #[test]
    fn test_filter_kinds_preserves_order() {
        let list: FeatureList = vec![
            poi("one", None),
            SpatialFeature::new(FeatureGeometry::point(0.0, 0.0), FeatureKind::Road),
            poi("two", None),
        ]
        .into_iter()
        .collect();

        let pois = list.filter_kinds(&[FeatureKind::Poi]);
        let names: Vec<_> = pois.iter().filter_map(|f| f.name()).collect();
        assert_eq!(names, vec!["one", "two"]);
    }
}
