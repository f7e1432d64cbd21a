use std::any::{Any, TypeId};

use serde::{Deserialize, Serialize};

/// Object-safe access to `Any` for business objects.
///
/// Implemented for every sized `'static + Send` type; call it on `&dyn BusinessObject`,
/// never on a `Box<dyn BusinessObject>`, or the box itself is what gets erased.
pub trait AsAny: Any + Send {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
    fn into_any(self: Box<Self>) -> Box<dyn Any + Send>;
}

impl<T: Any + Send> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any + Send> {
        self
    }
}

/// A domain object the portal can activate and dispatch operations against.
///
/// Property storage and change tracking belong to the object. The portal only
/// needs the optional [`EditState`] to mark objects new/old after an operation
/// and to route `save` calls.
pub trait BusinessObject: AsAny + 'static {
    fn edit_state(&self) -> Option<&EditState> {
        None
    }

    fn edit_state_mut(&mut self) -> Option<&mut EditState> {
        None
    }

    /// Untracked objects always count as dirty.
    fn is_dirty(&self) -> bool {
        self.edit_state().map_or(true, EditState::is_dirty)
    }
}

impl dyn BusinessObject {
    /// `TypeId` of the concrete object behind the trait object.
    pub fn concrete_type_id(&self) -> TypeId {
        self.as_any().type_id()
    }

    pub fn is<T: BusinessObject>(&self) -> bool {
        self.as_any().is::<T>()
    }

    pub fn downcast_ref<T: BusinessObject>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }

    pub fn downcast_mut<T: BusinessObject>(&mut self) -> Option<&mut T> {
        self.as_any_mut().downcast_mut::<T>()
    }
}

/// New/dirty/deleted flags of a tracked business object.
///
/// A freshly constructed object is new and dirty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditState {
    is_new: bool,
    is_dirty: bool,
    is_deleted: bool,
}

impl Default for EditState {
    fn default() -> Self {
        Self {
            is_new: true,
            is_dirty: true,
            is_deleted: false,
        }
    }
}

impl EditState {
    pub fn is_new(&self) -> bool {
        self.is_new
    }

    pub fn is_dirty(&self) -> bool {
        self.is_dirty
    }

    pub fn is_deleted(&self) -> bool {
        self.is_deleted
    }

    /// Not yet persisted.
    pub fn mark_new(&mut self) {
        self.is_new = true;
        self.is_dirty = true;
        self.is_deleted = false;
    }

    /// In sync with storage.
    pub fn mark_old(&mut self) {
        self.is_new = false;
        self.is_dirty = false;
    }

    pub fn mark_dirty(&mut self) {
        self.is_dirty = true;
    }

    /// Flag for deletion on the next save.
    pub fn mark_deleted(&mut self) {
        self.is_deleted = true;
        self.is_dirty = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Tracked {
        state: EditState,
    }

    impl BusinessObject for Tracked {
        fn edit_state(&self) -> Option<&EditState> {
            Some(&self.state)
        }

        fn edit_state_mut(&mut self) -> Option<&mut EditState> {
            Some(&mut self.state)
        }
    }

    #[derive(Default)]
    struct Untracked;

    impl BusinessObject for Untracked {}

    #[test]
    fn new_objects_are_new_and_dirty() {
        let state = EditState::default();
        assert!(state.is_new());
        assert!(state.is_dirty());
        assert!(!state.is_deleted());
    }

    #[test]
    fn mark_old_clears_dirty_but_keeps_deleted() {
        let mut state = EditState::default();
        state.mark_deleted();
        state.mark_old();
        assert!(!state.is_new());
        assert!(!state.is_dirty());
        assert!(state.is_deleted());
    }

    #[test]
    fn mark_new_resets_deleted() {
        let mut state = EditState::default();
        state.mark_old();
        state.mark_deleted();
        state.mark_new();
        assert!(state.is_new());
        assert!(!state.is_deleted());
    }

    #[test]
    fn untracked_objects_are_always_dirty() {
        assert!(Untracked.is_dirty());
    }

    #[test]
    fn downcast_through_trait_object() {
        let mut boxed: Box<dyn BusinessObject> = Box::new(Tracked::default());
        assert!(boxed.is::<Tracked>());
        assert!(!boxed.is::<Untracked>());
        boxed
            .downcast_mut::<Tracked>()
            .expect("should downcast")
            .state
            .mark_old();
        assert!(!boxed.is_dirty());
    }
}
