//! Entity types and live instance handles

use std::any::Any;
use std::cell::{Cell, Ref, RefCell, RefMut};
use std::fmt;
use std::rc::Rc;

use crate::error::{OrmError, Result};
use crate::mapping::SchemaBuilder;

/// A record type mapped to one table
///
/// The primary key is not a field of the type: it lives on the [`Handle`]
/// and is assigned by the first save. Columns are declared once, explicitly:
///
/// ```rust
/// use rowbound::{Entity, SchemaBuilder};
///
/// #[derive(Debug, Default)]
/// struct Note {
///     title: String,
///     pinned: bool,
/// }
///
/// impl Entity for Note {
///     const TABLE: &'static str = "Notes";
///
///     fn declare(schema: &mut SchemaBuilder<Self>) {
///         schema
///             .column("title", |n| Some(&n.title), |n, v| n.title = v)
///             .column("pinned", |n| Some(&n.pinned), |n, v| n.pinned = v);
///     }
/// }
/// ```
///
/// Hydration starts from `Default::default()` and applies every non-null
/// column present in the row.
pub trait Entity: Default + 'static {
    /// Table holding the rows of this type
    const TABLE: &'static str;

    /// Name of the implicit integer primary-key column
    const KEY_COLUMN: &'static str = "Id";

    /// Declare the mapped columns, in order
    fn declare(schema: &mut SchemaBuilder<Self>);

    fn type_name() -> &'static str {
        std::any::type_name::<Self>()
            .rsplit("::")
            .next()
            .unwrap_or("entity")
    }
}

pub(crate) struct Slot<T> {
    id: Cell<Option<i64>>,
    orphaned: Cell<bool>,
    value: RefCell<T>,
}

/// A shared handle to one live entity instance
///
/// Clones point at the same instance. Within a session there is at most one
/// instance per persisted key; [`Handle::ptr_eq`] tells whether two handles
/// share it.
///
/// References between entities are held as strong handles. Rows that refer
/// to each other, directly or through a chain, load as an `Rc` cycle and are
/// not freed until one of the links is cleared (for example by setting the
/// reference field to `None`).
pub struct Handle<T> {
    slot: Rc<Slot<T>>,
}

impl<T: Entity> Handle<T> {
    /// Wrap a new, transient instance
    pub fn new(value: T) -> Self {
        Self::with_id(value, None)
    }

    pub(crate) fn with_id(value: T, id: Option<i64>) -> Self {
        Self {
            slot: Rc::new(Slot {
                id: Cell::new(id),
                orphaned: Cell::new(false),
                value: RefCell::new(value),
            }),
        }
    }

    /// Primary key, `None` while transient
    pub fn id(&self) -> Option<i64> {
        self.slot.id.get()
    }

    pub fn is_transient(&self) -> bool {
        self.id().is_none()
    }

    /// Whether the row behind this instance was deleted
    pub fn is_orphaned(&self) -> bool {
        self.slot.orphaned.get()
    }

    /// Borrow the fields; panics while mutably borrowed
    pub fn borrow(&self) -> Ref<'_, T> {
        self.slot.value.borrow()
    }

    /// Mutably borrow the fields; panics while borrowed
    pub fn borrow_mut(&self) -> RefMut<'_, T> {
        self.slot.value.borrow_mut()
    }

    pub(crate) fn try_read(&self) -> Result<Ref<'_, T>> {
        self.slot.value.try_borrow().map_err(|_| {
            OrmError::invalid_state(format!("{} is mutably borrowed", self.describe()))
        })
    }

    pub(crate) fn try_write(&self) -> Result<RefMut<'_, T>> {
        self.slot.value.try_borrow_mut().map_err(|_| {
            OrmError::invalid_state(format!("{} is borrowed", self.describe()))
        })
    }

    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        Rc::ptr_eq(&a.slot, &b.slot)
    }

    /// Assign the key of a freshly inserted row; keys are never reassigned
    pub(crate) fn assign_id(&self, id: i64) {
        debug_assert!(self.slot.id.get().is_none());
        self.slot.id.set(Some(id));
    }

    pub(crate) fn mark_orphaned(&self) {
        self.slot.orphaned.set(true);
    }

    pub(crate) fn into_any(self) -> Rc<dyn Any> {
        self.slot
    }

    pub(crate) fn from_any(any: Rc<dyn Any>) -> Option<Self> {
        any.downcast::<Slot<T>>().ok().map(|slot| Self { slot })
    }

    pub(crate) fn describe(&self) -> String {
        match self.id() {
            Some(id) => format!("{} #{}", T::type_name(), id),
            None => format!("transient {}", T::type_name()),
        }
    }
}

impl<T> Clone for Handle<T> {
    fn clone(&self) -> Self {
        Self {
            slot: Rc::clone(&self.slot),
        }
    }
}

impl<T: Entity + fmt::Debug> fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("Handle");
        s.field("id", &self.id());
        if self.is_orphaned() {
            s.field("orphaned", &true);
        }
        match self.slot.value.try_borrow() {
            Ok(value) => s.field("value", &*value),
            Err(_) => s.field("value", &"<borrowed>"),
        };
        s.finish()
    }
}
