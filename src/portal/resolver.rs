//! Handler registry and operation resolution.
//!
//! Each business object type registers its handlers up front, keyed by
//! operation kind and scope. Several handlers may share a key as overloads;
//! resolution picks the one whose [`Signature`] accepts the criteria.

use std::any::TypeId;
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::sync::Arc;

use super::criteria::{Criteria, Signature};
use super::dispatcher::ChildPortal;
use super::error::PortalError;
use super::object::BusinessObject;
use super::operation::{Operation, OperationKind, Scope};

/// Type-erased handler body.
pub type HandlerFn = Arc<
    dyn Fn(&mut dyn BusinessObject, &Criteria, &mut ChildPortal<'_>) -> anyhow::Result<()>
        + Send
        + Sync,
>;

/// Identity of a registered business object type.
///
/// Equality and hashing use the `TypeId`; `name` is the short type name used
/// in logs, errors and interceptor keys.
#[derive(Clone, Copy)]
pub struct ObjectType {
    id: TypeId,
    name: &'static str,
    construct: fn() -> Box<dyn BusinessObject>,
}

impl ObjectType {
    pub fn of<T: BusinessObject + Default>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: short_type_name(std::any::type_name::<T>()),
            construct: construct_default::<T>,
        }
    }

    pub fn type_id(&self) -> TypeId {
        self.id
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Plain default construction of a bare instance.
    pub fn construct(&self) -> Box<dyn BusinessObject> {
        (self.construct)()
    }
}

impl PartialEq for ObjectType {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ObjectType {}

impl Hash for ObjectType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ObjectType").field(&self.name).finish()
    }
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

fn construct_default<T: BusinessObject + Default>() -> Box<dyn BusinessObject> {
    Box::new(T::default())
}

/// `my_crate::models::Feature` -> `Feature`, `Wrapper<a::B>` -> `Wrapper`.
fn short_type_name(full: &'static str) -> &'static str {
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

/// One registered handler overload.
#[derive(Clone)]
pub struct Handler {
    signature: Signature,
    call: HandlerFn,
}

impl Handler {
    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    pub(crate) fn invoke(
        &self,
        target: &mut dyn BusinessObject,
        criteria: &Criteria,
        portal: &mut ChildPortal<'_>,
    ) -> anyhow::Result<()> {
        (self.call)(target, criteria, portal)
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handler")
            .field("signature", &self.signature)
            .finish_non_exhaustive()
    }
}

struct TypeEntry {
    object_type: ObjectType,
    handlers: HashMap<(OperationKind, Scope), Vec<Handler>>,
}

/// Registry mapping business object types to their handlers.
#[derive(Default)]
pub struct HandlerRegistry {
    types: HashMap<TypeId, TypeEntry>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start (or continue) registering handlers for `T`.
    pub fn register<T: BusinessObject + Default>(&mut self) -> TypeRegistration<'_, T> {
        let entry = self
            .types
            .entry(TypeId::of::<T>())
            .or_insert_with(|| TypeEntry {
                object_type: ObjectType::of::<T>(),
                handlers: HashMap::new(),
            });
        TypeRegistration {
            entry,
            _marker: PhantomData,
        }
    }

    pub fn is_registered<T: BusinessObject>(&self) -> bool {
        self.types.contains_key(&TypeId::of::<T>())
    }

    pub fn object_type(&self, id: TypeId) -> Option<&ObjectType> {
        self.types.get(&id).map(|entry| &entry.object_type)
    }

    /// Find the handler for an operation.
    ///
    /// Among overloads registered for the operation's kind and scope, those whose
    /// signature accepts the criteria are candidates. The most specific candidate
    /// wins; ties go to the earliest registration.
    pub fn resolve(&self, operation: &Operation) -> Result<(&ObjectType, &Handler), PortalError> {
        let entry = self
            .types
            .get(&operation.type_id())
            .ok_or_else(|| PortalError::UnregisteredType {
                type_name: operation.type_name().to_string(),
            })?;

        let not_found = || PortalError::HandlerNotFound {
            type_name: entry.object_type.name().to_string(),
            operation: operation.kind(),
            scope: operation.scope(),
            criteria: operation.criteria().shape(),
        };

        let overloads = entry
            .handlers
            .get(&(operation.kind(), operation.scope()))
            .ok_or_else(not_found)?;

        let mut best: Option<&Handler> = None;
        for handler in overloads {
            if !handler.signature.matches(operation.criteria()) {
                continue;
            }
            match best {
                Some(current)
                    if current.signature.specificity() >= handler.signature.specificity() => {}
                _ => best = Some(handler),
            }
        }

        let handler = best.ok_or_else(not_found)?;
        tracing::trace!(
            object_type = %entry.object_type,
            operation = %operation.kind(),
            scope = %operation.scope(),
            signature = %handler.signature,
            "resolved handler"
        );
        Ok((&entry.object_type, handler))
    }
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.types.values().map(|e| e.object_type))
            .finish()
    }
}

/// Builder returned by [`HandlerRegistry::register`].
pub struct TypeRegistration<'r, T> {
    entry: &'r mut TypeEntry,
    _marker: PhantomData<fn() -> T>,
}

impl<'r, T: BusinessObject> TypeRegistration<'r, T> {
    /// Register a handler overload for `kind` at `scope`.
    pub fn handler<F>(self, kind: OperationKind, scope: Scope, signature: impl Into<Signature>, f: F) -> Self
    where
        F: Fn(&mut T, &Criteria, &mut ChildPortal<'_>) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let type_name = self.entry.object_type.name();
        let call: HandlerFn = Arc::new(
            move |target: &mut dyn BusinessObject,
                  criteria: &Criteria,
                  portal: &mut ChildPortal<'_>| {
                let target = target.downcast_mut::<T>().ok_or_else(|| {
                    anyhow::anyhow!("{} handler received an instance of another type", type_name)
                })?;
                f(target, criteria, portal)
            },
        );
        self.entry
            .handlers
            .entry((kind, scope))
            .or_default()
            .push(Handler {
                signature: signature.into(),
                call,
            });
        self
    }

    pub fn create<F>(self, scope: Scope, signature: impl Into<Signature>, f: F) -> Self
    where
        F: Fn(&mut T, &Criteria, &mut ChildPortal<'_>) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.handler(OperationKind::Create, scope, signature, f)
    }

    pub fn fetch<F>(self, scope: Scope, signature: impl Into<Signature>, f: F) -> Self
    where
        F: Fn(&mut T, &Criteria, &mut ChildPortal<'_>) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.handler(OperationKind::Fetch, scope, signature, f)
    }

    pub fn insert<F>(self, scope: Scope, f: F) -> Self
    where
        F: Fn(&mut T, &Criteria, &mut ChildPortal<'_>) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.handler(OperationKind::Insert, scope, Signature::empty(), f)
    }

    pub fn update<F>(self, scope: Scope, f: F) -> Self
    where
        F: Fn(&mut T, &Criteria, &mut ChildPortal<'_>) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.handler(OperationKind::Update, scope, Signature::empty(), f)
    }

    pub fn delete<F>(self, scope: Scope, f: F) -> Self
    where
        F: Fn(&mut T, &Criteria, &mut ChildPortal<'_>) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.handler(OperationKind::Delete, scope, Signature::empty(), f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::portal::criteria::ParamKind;
    use serde_json::json;

    #[derive(Default)]
    struct Widget {
        picked: &'static str,
    }

    impl BusinessObject for Widget {}

    #[derive(Default)]
    struct Unregistered;

    impl BusinessObject for Unregistered {}

    fn registry() -> HandlerRegistry {
        let mut registry = HandlerRegistry::new();
        registry
            .register::<Widget>()
            .fetch(Scope::Root, [ParamKind::Any], |w: &mut Widget, _, _| {
                w.picked = "any";
                Ok(())
            })
            .fetch(Scope::Root, [ParamKind::String], |w: &mut Widget, _, _| {
                w.picked = "string";
                Ok(())
            })
            .fetch(Scope::Root, Signature::empty(), |w: &mut Widget, _, _| {
                w.picked = "none";
                Ok(())
            })
            .fetch(Scope::Child, [ParamKind::Integer], |w: &mut Widget, _, _| {
                w.picked = "child";
                Ok(())
            });
        registry
    }

    fn picked(registry: &HandlerRegistry, operation: Operation) -> &'static str {
        let (_, handler) = registry.resolve(&operation).expect("should resolve");
        let portal = crate::portal::DataPortal::new(HandlerRegistry::new());
        let mut context = crate::portal::AmbientContext::new();
        let mut child = ChildPortal::new(&portal, &mut context);
        let mut widget = Widget::default();
        handler
            .invoke(&mut widget, operation.criteria(), &mut child)
            .expect("handler should succeed");
        widget.picked
    }

    #[test]
    fn short_names_strip_paths_and_generics() {
        assert_eq!(short_type_name("a::b::Feature"), "Feature");
        assert_eq!(short_type_name("a::List<a::Feature>"), "List");
        assert_eq!(short_type_name("Plain"), "Plain");
    }

    #[test]
    fn most_specific_overload_wins() {
        let registry = registry();
        let op = Operation::root::<Widget>(OperationKind::Fetch, Criteria::single("abc"));
        assert_eq!(picked(&registry, op), "string");
    }

    #[test]
    fn falls_back_to_any_overload() {
        let registry = registry();
        let op = Operation::root::<Widget>(OperationKind::Fetch, Criteria::single(json!(7)));
        assert_eq!(picked(&registry, op), "any");
    }

    #[test]
    fn uuid_overload_beats_string_registered_first() {
        let mut registry = HandlerRegistry::new();
        registry
            .register::<Widget>()
            .fetch(Scope::Root, [ParamKind::String], |w: &mut Widget, _, _| {
                w.picked = "string";
                Ok(())
            })
            .fetch(Scope::Root, [ParamKind::Uuid], |w: &mut Widget, _, _| {
                w.picked = "uuid";
                Ok(())
            });

        let id = "6f1c2a9e-3b4d-4c5e-8f70-123456789abc";
        let op = Operation::root::<Widget>(OperationKind::Fetch, Criteria::single(id));
        assert_eq!(picked(&registry, op), "uuid");

        let op = Operation::root::<Widget>(OperationKind::Fetch, Criteria::single("abc"));
        assert_eq!(picked(&registry, op), "string");
    }

    #[test]
    fn arity_selects_between_overloads() {
        let registry = registry();
        let op = Operation::root::<Widget>(OperationKind::Fetch, Criteria::none());
        assert_eq!(picked(&registry, op), "none");
    }

    #[test]
    fn scope_is_part_of_the_key() {
        let registry = registry();
        let op = Operation::child::<Widget>(OperationKind::Fetch, Criteria::single(json!(1)));
        assert_eq!(picked(&registry, op), "child");

        let op = Operation::child::<Widget>(OperationKind::Fetch, Criteria::single("abc"));
        let err = registry.resolve(&op).unwrap_err();
        assert!(matches!(
            err,
            PortalError::HandlerNotFound { scope: Scope::Child, .. }
        ));
    }

    #[test]
    fn missing_operation_names_type_and_operation() {
        let registry = registry();
        let op = Operation::root::<Widget>(OperationKind::Update, Criteria::none());
        let err = registry.resolve(&op).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("Widget"), "{}", message);
        assert!(message.contains("update"), "{}", message);
        assert!(err.is_resolution());
    }

    #[test]
    fn unregistered_type_is_reported() {
        let registry = registry();
        let op = Operation::root::<Unregistered>(OperationKind::Fetch, Criteria::none());
        assert!(matches!(
            registry.resolve(&op),
            Err(PortalError::UnregisteredType { .. })
        ));
    }
}
