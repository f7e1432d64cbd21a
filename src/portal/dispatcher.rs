//! The data portal: one dispatch from resolution to activation.

use std::any::Any;
use std::sync::Arc;

use super::activator::{Activator, DefaultActivator};
use super::context::AmbientContext;
use super::criteria::Criteria;
use super::error::{ActivationPhase, InterceptHook, PortalError, PortalResult};
use super::interceptor::{InterceptArgs, Interceptor, NoopInterceptor};
use super::object::{AsAny, BusinessObject};
use super::operation::{Operation, OperationKind};
use super::resolver::{Handler, HandlerRegistry, ObjectType};

/// Dispatches lifecycle operations against registered business object types.
///
/// A portal is immutable once built and can be shared between threads; every
/// call takes the request's [`AmbientContext`] explicitly. Cloning is cheap and
/// shares the registry, so a scope can swap strategies with
/// `portal.clone().with_interceptor(...)`.
///
/// For one dispatch the order is:
///
/// 1. resolve the handler (failure: nothing else runs)
/// 2. `Activator::create_instance` for create/fetch (failure: no hooks run)
/// 3. `Interceptor::initialize` (failure: dispatch aborts)
/// 4. the handler, which may dispatch children through its [`ChildPortal`]
/// 5. `Interceptor::complete`, carrying the handler error if there was one
/// 6. `Activator::initialize_instance`, only when the handler succeeded
#[derive(Clone)]
pub struct DataPortal {
    registry: Arc<HandlerRegistry>,
    interceptor: Arc<dyn Interceptor>,
    activator: Arc<dyn Activator>,
}

impl DataPortal {
    /// A portal with no interceptor and default activation.
    pub fn new(registry: HandlerRegistry) -> Self {
        Self {
            registry: Arc::new(registry),
            interceptor: Arc::new(NoopInterceptor),
            activator: Arc::new(DefaultActivator),
        }
    }

    pub fn with_interceptor(self, interceptor: impl Interceptor + 'static) -> Self {
        self.with_shared_interceptor(Arc::new(interceptor))
    }

    pub fn with_shared_interceptor(mut self, interceptor: Arc<dyn Interceptor>) -> Self {
        self.interceptor = interceptor;
        self
    }

    pub fn with_activator(self, activator: impl Activator + 'static) -> Self {
        self.with_shared_activator(Arc::new(activator))
    }

    pub fn with_shared_activator(mut self, activator: Arc<dyn Activator>) -> Self {
        self.activator = activator;
        self
    }

    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    /// Child-scope dispatch outside a handler, e.g. creating a new child
    /// before adding it to a loaded parent.
    pub fn children<'a>(&'a self, context: &'a mut AmbientContext) -> ChildPortal<'a> {
        ChildPortal::new(self, context)
    }

    /// Run one operation.
    ///
    /// Create and fetch allocate through the activator and require `existing`
    /// to be `None`; insert, update and delete run against `existing`.
    pub fn execute(
        &self,
        context: &mut AmbientContext,
        operation: &Operation,
        existing: Option<Box<dyn BusinessObject>>,
    ) -> PortalResult<Box<dyn BusinessObject>> {
        let (object_type, handler) = self.registry.resolve(operation)?;

        match (operation.kind().allocates(), existing) {
            (true, None) => {
                let mut instance = self.create_instance(context, object_type)?;
                self.run(context, operation, object_type, handler, &mut *instance)?;
                Ok(instance)
            }
            (false, Some(mut instance)) => {
                check_target(operation, object_type, &*instance)?;
                self.run(context, operation, object_type, handler, &mut *instance)?;
                Ok(instance)
            }
            (true, Some(_)) => Err(invalid_target(
                operation,
                object_type,
                "the portal allocates the instance for this operation",
            )),
            (false, None) => Err(invalid_target(
                operation,
                object_type,
                "an existing instance is required",
            )),
        }
    }

    /// Run a mutating operation against an object the caller keeps ownership of.
    pub fn execute_in_place(
        &self,
        context: &mut AmbientContext,
        operation: &Operation,
        target: &mut dyn BusinessObject,
    ) -> PortalResult<()> {
        let (object_type, handler) = self.registry.resolve(operation)?;
        if operation.kind().allocates() {
            return Err(invalid_target(
                operation,
                object_type,
                "the portal allocates the instance for this operation",
            ));
        }
        check_target(operation, object_type, &*target)?;
        self.run(context, operation, object_type, handler, target)
    }

    pub fn create<T: BusinessObject>(&self, context: &mut AmbientContext, criteria: Criteria) -> PortalResult<T> {
        let operation = Operation::root::<T>(OperationKind::Create, criteria);
        self.execute(context, &operation, None).and_then(into_typed)
    }

    pub fn fetch<T: BusinessObject>(&self, context: &mut AmbientContext, criteria: Criteria) -> PortalResult<T> {
        let operation = Operation::root::<T>(OperationKind::Fetch, criteria);
        self.execute(context, &operation, None).and_then(into_typed)
    }

    pub fn insert<T: BusinessObject>(&self, context: &mut AmbientContext, object: &mut T) -> PortalResult<()> {
        self.mutate(context, OperationKind::Insert, object)
    }

    pub fn update<T: BusinessObject>(&self, context: &mut AmbientContext, object: &mut T) -> PortalResult<()> {
        self.mutate(context, OperationKind::Update, object)
    }

    pub fn delete<T: BusinessObject>(&self, context: &mut AmbientContext, object: &mut T) -> PortalResult<()> {
        self.mutate(context, OperationKind::Delete, object)
    }

    /// Insert, update or delete depending on the object's edit state.
    ///
    /// Returns the operation that ran, or `None` when there was nothing to save.
    pub fn save<T: BusinessObject>(
        &self,
        context: &mut AmbientContext,
        object: &mut T,
    ) -> PortalResult<Option<OperationKind>> {
        let Some(kind) = save_operation(&*object) else {
            let type_name = std::any::type_name::<T>();
            tracing::debug!(object_type = type_name, "nothing to save");
            return Ok(None);
        };
        self.mutate(context, kind, object)?;
        Ok(Some(kind))
    }

    fn mutate<T: BusinessObject>(
        &self,
        context: &mut AmbientContext,
        kind: OperationKind,
        object: &mut T,
    ) -> PortalResult<()> {
        let operation = Operation::root::<T>(kind, Criteria::none());
        self.execute_in_place(context, &operation, object)
    }

    fn create_instance(
        &self,
        context: &mut AmbientContext,
        object_type: &ObjectType,
    ) -> PortalResult<Box<dyn BusinessObject>> {
        let instance = self
            .activator
            .create_instance(context, object_type)
            .map_err(|source| PortalError::Activation {
                type_name: object_type.name().to_string(),
                phase: ActivationPhase::CreateInstance,
                source,
            })?;

        if instance.concrete_type_id() != object_type.type_id() {
            return Err(PortalError::Activation {
                type_name: object_type.name().to_string(),
                phase: ActivationPhase::CreateInstance,
                source: anyhow::anyhow!("activator returned an instance of a different type"),
            });
        }
        Ok(instance)
    }

    fn run(
        &self,
        context: &mut AmbientContext,
        operation: &Operation,
        object_type: &ObjectType,
        handler: &Handler,
        target: &mut dyn BusinessObject,
    ) -> PortalResult<()> {
        let span = tracing::debug_span!(
            "dispatch",
            object_type = %object_type,
            operation = %operation.kind(),
            scope = %operation.scope()
        );
        let _entered = span.enter();

        let args = InterceptArgs {
            object_type,
            operation: operation.kind(),
            scope: operation.scope(),
            criteria: operation.criteria(),
            exception: None,
        };
        self.interceptor
            .initialize(context, &args)
            .map_err(|source| PortalError::Interceptor {
                type_name: object_type.name().to_string(),
                hook: InterceptHook::Initialize,
                source,
            })?;

        let outcome = {
            let mut children = ChildPortal::new(self, context);
            handler.invoke(target, operation.criteria(), &mut children)
        };

        if outcome.is_ok() {
            mark_edit_state(operation.kind(), target);
        }

        let completed = self.interceptor.complete(
            context,
            &InterceptArgs {
                exception: outcome.as_ref().err(),
                ..args
            },
        );

        if let Err(source) = outcome {
            if let Err(hook_error) = completed {
                tracing::warn!(
                    object_type = %object_type,
                    error = %hook_error,
                    "complete hook failed while a handler error was pending"
                );
            }
            tracing::debug!(object_type = %object_type, error = %source, "handler failed");
            return Err(handler_failure(object_type, operation, source));
        }

        completed.map_err(|source| PortalError::Interceptor {
            type_name: object_type.name().to_string(),
            hook: InterceptHook::Complete,
            source,
        })?;

        self.activator
            .initialize_instance(context, object_type, target)
            .map_err(|source| PortalError::Activation {
                type_name: object_type.name().to_string(),
                phase: ActivationPhase::InitializeInstance,
                source,
            })
    }
}

impl std::fmt::Debug for DataPortal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataPortal")
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

/// The portal as seen from inside a handler.
///
/// Child dispatches run synchronously on the parent handler's stack, through
/// the same interceptor and activator, with `Scope::Child`.
pub struct ChildPortal<'a> {
    portal: &'a DataPortal,
    context: &'a mut AmbientContext,
}

impl<'a> ChildPortal<'a> {
    pub(crate) fn new(portal: &'a DataPortal, context: &'a mut AmbientContext) -> Self {
        Self { portal, context }
    }

    pub fn context(&mut self) -> &mut AmbientContext {
        &mut *self.context
    }

    pub fn create_child<C: BusinessObject>(&mut self, criteria: Criteria) -> PortalResult<C> {
        let operation = Operation::child::<C>(OperationKind::Create, criteria);
        self.portal
            .execute(&mut *self.context, &operation, None)
            .and_then(into_typed)
    }

    pub fn fetch_child<C: BusinessObject>(&mut self, criteria: Criteria) -> PortalResult<C> {
        let operation = Operation::child::<C>(OperationKind::Fetch, criteria);
        self.portal
            .execute(&mut *self.context, &operation, None)
            .and_then(into_typed)
    }

    /// Save one child according to its edit state. Clean children are skipped.
    pub fn update_child<C: BusinessObject>(&mut self, child: &mut C) -> PortalResult<Option<OperationKind>> {
        let Some(kind) = save_operation(&*child) else {
            return Ok(None);
        };
        let operation = Operation::child::<C>(kind, Criteria::none());
        self.portal
            .execute_in_place(&mut *self.context, &operation, child)?;
        Ok(Some(kind))
    }

    pub fn update_children<'c, C, I>(&mut self, children: I) -> PortalResult<()>
    where
        C: BusinessObject,
        I: IntoIterator<Item = &'c mut C>,
    {
        for child in children {
            self.update_child(child)?;
        }
        Ok(())
    }
}

/// Which operation `save` dispatches for an object, if any.
///
/// Clean objects and objects both new and deleted need nothing. Untracked
/// objects always update.
pub fn save_operation(object: &dyn BusinessObject) -> Option<OperationKind> {
    if !object.is_dirty() {
        return None;
    }
    match object.edit_state() {
        None => Some(OperationKind::Update),
        Some(state) if state.is_deleted() => (!state.is_new()).then_some(OperationKind::Delete),
        Some(state) if state.is_new() => Some(OperationKind::Insert),
        Some(_) => Some(OperationKind::Update),
    }
}

fn mark_edit_state(kind: OperationKind, target: &mut dyn BusinessObject) {
    if let Some(state) = target.edit_state_mut() {
        match kind {
            OperationKind::Create | OperationKind::Delete => state.mark_new(),
            OperationKind::Fetch | OperationKind::Insert | OperationKind::Update => state.mark_old(),
        }
    }
}

/// Wrap a handler error, passing failed nested dispatches through untouched.
fn handler_failure(object_type: &ObjectType, operation: &Operation, source: anyhow::Error) -> PortalError {
    let source = match source.downcast::<PortalError>() {
        Ok(nested) if nested.is_dispatch_failure() => return nested,
        Ok(other) => anyhow::Error::from(other),
        Err(source) => source,
    };
    PortalError::HandlerExecution {
        type_name: object_type.name().to_string(),
        operation: operation.kind(),
        scope: operation.scope(),
        source,
    }
}

fn check_target(operation: &Operation, object_type: &ObjectType, target: &dyn BusinessObject) -> PortalResult<()> {
    if target.concrete_type_id() == object_type.type_id() {
        Ok(())
    } else {
        Err(invalid_target(
            operation,
            object_type,
            "the supplied instance is of a different type",
        ))
    }
}

fn invalid_target(operation: &Operation, object_type: &ObjectType, reason: &str) -> PortalError {
    PortalError::InvalidTarget {
        type_name: object_type.name().to_string(),
        operation: operation.kind(),
        reason: reason.to_string(),
    }
}

fn into_typed<T: BusinessObject>(instance: Box<dyn BusinessObject>) -> PortalResult<T> {
    let any: Box<dyn Any + Send> = AsAny::into_any(instance);
    any.downcast::<T>()
        .map(|boxed| *boxed)
        .map_err(|_| PortalError::TypeMismatch {
            expected: std::any::type_name::<T>().to_string(),
        })
}
