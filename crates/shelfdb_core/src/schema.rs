//! Schema: the registry of partitions.
//!
//! A [`Schema`] maps partition names to change-tracked sets. Each entry
//! carries the [`TypeTag`] of its record type; lookups compare tags before
//! handing out a typed set, so a name is never bound to two types.

use crate::change::{ChangeSink, ChangeTrackingSet};
use crate::error::{CoreError, CoreResult};
use crate::record::{Entity, TypeTag};
use crate::set::ConcurrentSet;
use shelfdb_storage::validate_partition_name;
use std::any::Any;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Type-erased view of a `ChangeTrackingSet<R>`.
pub(crate) trait ErasedPartition: Send + Sync {
    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;

    fn attach_erased(&self, sink: &Arc<crate::persistence::DiskPersistence>);

    fn record_count(&self) -> usize;
}

impl<R: Entity> ErasedPartition for ChangeTrackingSet<R> {
    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }

    fn attach_erased(&self, sink: &Arc<crate::persistence::DiskPersistence>) {
        let sink: Arc<dyn ChangeSink<R>> = Arc::clone(sink) as Arc<dyn ChangeSink<R>>;
        self.attach_sink(sink);
    }

    fn record_count(&self) -> usize {
        self.len()
    }
}

#[derive(Clone)]
pub(crate) struct PartitionEntry {
    pub(crate) tag: TypeTag,
    pub(crate) set: Arc<dyn ErasedPartition>,
}

impl PartitionEntry {
    fn new<R: Entity>(set: ChangeTrackingSet<R>) -> Self {
        Self {
            tag: TypeTag::of::<R>(),
            set: Arc::new(set),
        }
    }

    fn downcast<R: Entity>(&self) -> Option<Arc<ChangeTrackingSet<R>>> {
        Arc::clone(&self.set)
            .into_any()
            .downcast::<ChangeTrackingSet<R>>()
            .ok()
    }
}

/// Mapping from partition name to its change-tracked set.
///
/// Created empty, then filled by explicit registration (memory-only use)
/// or by recovery from disk. Registration is permissive: binding a name
/// to the type it already holds is a no-op.
#[derive(Default)]
pub struct Schema {
    partitions: BTreeMap<String, PartitionEntry>,
}

impl Schema {
    /// Creates an empty schema.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an empty partition for `R` under `name`.
    ///
    /// Records persist to a directory named `name`. On restart, recover a
    /// partition whose name is not [`Entity::PARTITION`] with
    /// [`DiskPersistence::update_schema_as`](crate::DiskPersistence::update_schema_as).
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::TypeConflict`] if `name` holds another type, or
    /// a storage error if `name` is not usable as a directory name.
    pub fn register<R: Entity>(&mut self, name: &str) -> CoreResult<()> {
        validate_partition_name(name)?;
        if self.check_type::<R>(name)? {
            return Ok(());
        }
        self.partitions.insert(
            name.to_string(),
            PartitionEntry::new(ChangeTrackingSet::<R>::new(name)),
        );
        Ok(())
    }

    /// Registers an empty partition for `R` under [`Entity::PARTITION`].
    pub fn register_entity<R: Entity>(&mut self) -> CoreResult<()> {
        self.register::<R>(R::PARTITION)
    }

    /// Binds `name` to a populated set, replacing a set of the same type.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::TypeConflict`] if `name` holds another type.
    pub fn insert_set<R: Entity>(&mut self, name: &str, set: ConcurrentSet<R>) -> CoreResult<()> {
        validate_partition_name(name)?;
        self.check_type::<R>(name)?;
        self.partitions.insert(
            name.to_string(),
            PartitionEntry::new(ChangeTrackingSet::from_set(name, set)),
        );
        Ok(())
    }

    /// Checks that `name` is free or bound to `R`.
    ///
    /// Returns `true` if `name` is already bound to `R`.
    pub fn check_type<R: Entity>(&self, name: &str) -> CoreResult<bool> {
        match self.partitions.get(name) {
            None => Ok(false),
            Some(entry) if entry.tag == TypeTag::of::<R>() => Ok(true),
            Some(entry) => Err(CoreError::type_conflict(
                name,
                TypeTag::of::<R>().name(),
                entry.tag.name(),
            )),
        }
    }

    /// Returns true if a partition is registered under `name`.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.partitions.contains_key(name)
    }

    /// Returns the registered partition names in sorted order.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.partitions.keys().map(String::as_str).collect()
    }

    /// Returns the type name registered under `name`.
    #[must_use]
    pub fn type_name_of(&self, name: &str) -> Option<&'static str> {
        self.partitions.get(name).map(|entry| entry.tag.name())
    }

    /// Returns the number of partitions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.partitions.len()
    }

    /// Returns true if no partition is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.partitions.is_empty()
    }

    /// Looks up the typed set registered under `name`.
    pub(crate) fn typed<R: Entity>(&self, name: &str) -> CoreResult<Arc<ChangeTrackingSet<R>>> {
        let entry = self
            .partitions
            .get(name)
            .ok_or_else(|| CoreError::partition_not_found(name))?;
        if entry.tag != TypeTag::of::<R>() {
            return Err(CoreError::type_conflict(
                name,
                TypeTag::of::<R>().name(),
                entry.tag.name(),
            ));
        }
        entry
            .downcast::<R>()
            .ok_or_else(|| CoreError::invalid_operation(format!("partition {name} failed to downcast")))
    }

    pub(crate) fn entries(&self) -> impl Iterator<Item = (&str, &PartitionEntry)> {
        self.partitions.iter().map(|(name, entry)| (name.as_str(), entry))
    }
}

impl std::fmt::Debug for Schema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map()
            .entries(self.partitions.iter().map(|(name, entry)| (name, entry.tag.name())))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{RecordId, TextFields, TextRecord};

    #[derive(Debug, Clone, PartialEq)]
    struct Thing {
        id: RecordId,
    }

    #[derive(Debug, Clone, PartialEq)]
    struct Other {
        id: RecordId,
    }

    macro_rules! id_only_entity {
        ($ty:ident, $partition:literal) => {
            impl Entity for $ty {
                const PARTITION: &'static str = $partition;

                fn id(&self) -> RecordId {
                    self.id
                }

                fn serialize(&self) -> String {
                    TextRecord::new().field("id", self.id.as_u64()).finish()
                }

                fn deserialize(text: &str) -> CoreResult<Self> {
                    Ok($ty {
                        id: TextFields::parse(text)?.id()?,
                    })
                }
            }
        };
    }

    id_only_entity!(Thing, "Thing");
    id_only_entity!(Other, "Other");

    #[test]
    fn register_and_lookup() {
        let mut schema = Schema::new();
        schema.register::<Thing>("things").unwrap();

        let set = schema.typed::<Thing>("things").unwrap();
        assert_eq!(set.partition(), "things");
        assert!(schema.contains("things"));
        assert_eq!(schema.len(), 1);
    }

    #[test]
    fn lookup_with_wrong_type_names_both() {
        let mut schema = Schema::new();
        schema.register::<Thing>("things").unwrap();

        let err = schema.typed::<Other>("things").unwrap_err();
        match &err {
            CoreError::TypeConflict {
                partition,
                requested,
                registered,
            } => {
                assert_eq!(partition, "things");
                assert!(requested.ends_with("Other"));
                assert!(registered.ends_with("Thing"));
            }
            other => panic!("expected TypeConflict, got {other:?}"),
        }
    }

    #[test]
    fn reregistering_same_type_keeps_data() {
        let mut schema = Schema::new();
        schema.register_entity::<Thing>().unwrap();
        schema
            .typed::<Thing>("Thing")
            .unwrap()
            .add(Thing { id: RecordId::new(1) })
            .unwrap();

        schema.register_entity::<Thing>().unwrap();
        assert_eq!(schema.typed::<Thing>("Thing").unwrap().len(), 1);
    }

    #[test]
    fn registering_other_type_conflicts() {
        let mut schema = Schema::new();
        schema.register::<Thing>("things").unwrap();
        let result = schema.register::<Other>("things");
        assert!(matches!(result, Err(CoreError::TypeConflict { .. })));
        assert_eq!(schema.type_name_of("things"), Some(TypeTag::of::<Thing>().name()));
    }

    #[test]
    fn insert_set_replaces_same_type() {
        let mut schema = Schema::new();
        schema.register_entity::<Thing>().unwrap();

        let recovered: ConcurrentSet<Thing> = (1..=3).map(|i| Thing { id: RecordId::new(i) }).collect();
        schema.insert_set("Thing", recovered).unwrap();
        assert_eq!(schema.typed::<Thing>("Thing").unwrap().len(), 3);

        let result = schema.insert_set("Thing", ConcurrentSet::<Other>::new());
        assert!(matches!(result, Err(CoreError::TypeConflict { .. })));
    }

    #[test]
    fn missing_partition() {
        let schema = Schema::new();
        assert!(schema.is_empty());
        assert!(matches!(
            schema.typed::<Thing>("nope"),
            Err(CoreError::PartitionNotFound { .. })
        ));
    }

    #[test]
    fn invalid_names_rejected() {
        let mut schema = Schema::new();
        assert!(schema.register::<Thing>("../up").is_err());
        assert!(schema.register::<Thing>("").is_err());
    }

    #[test]
    fn names_sorted() {
        let mut schema = Schema::new();
        schema.register::<Thing>("b").unwrap();
        schema.register::<Other>("a").unwrap();
        assert_eq!(schema.names(), vec!["a", "b"]);
        assert_eq!(format!("{schema:?}").matches("Thing").count(), 1);
    }
}
