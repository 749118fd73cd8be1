//! Traits shared by identifier-keyed records.

/// A record addressed by a server-issued identifier.
///
/// Delta payloads report a record's full current state; a record with
/// `is_deleted() == true` is a tombstone and must be removed, not stored.
pub trait Entity: Clone {
    /// Collection name used in logs and summaries (e.g. `"accounts"`).
    const COLLECTION: &'static str;

    /// Returns the record identifier.
    fn id(&self) -> &str;

    /// Returns true if this record is a tombstone.
    fn is_deleted(&self) -> bool;

    /// Sets the tombstone flag.
    fn set_deleted(&mut self, deleted: bool);
}

/// A record that can be looked up by display name.
pub trait NamedEntity: Entity {
    /// Returns the display name.
    fn name(&self) -> &str;
}

/// A record that belongs to a parent record of another kind.
pub trait ChildEntity: Entity {
    /// Returns the parent identifier, if the upstream supplied one.
    fn parent_id(&self) -> Option<&str>;
}

macro_rules! impl_entity {
    ($ty:ty, $collection:literal) => {
        impl $crate::Entity for $ty {
            const COLLECTION: &'static str = $collection;

            fn id(&self) -> &str {
                &self.id
            }

            fn is_deleted(&self) -> bool {
                self.deleted
            }

            fn set_deleted(&mut self, deleted: bool) {
                self.deleted = deleted;
            }
        }
    };
    ($ty:ty, $collection:literal, named) => {
        impl_entity!($ty, $collection);

        impl $crate::NamedEntity for $ty {
            fn name(&self) -> &str {
                &self.name
            }
        }
    };
    ($ty:ty, $collection:literal, child = $parent:ident) => {
        impl_entity!($ty, $collection);

        impl $crate::ChildEntity for $ty {
            fn parent_id(&self) -> Option<&str> {
                self.$parent.as_deref()
            }
        }
    };
}

pub(crate) use impl_entity;
