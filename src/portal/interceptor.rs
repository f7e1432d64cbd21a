//! Observation hooks that run around every dispatch.

use super::context::AmbientContext;
use super::criteria::Criteria;
use super::operation::{OperationKind, Scope};
use super::resolver::ObjectType;

/// What an interceptor sees about one dispatch.
///
/// Borrowed for the duration of a single hook call. `exception` is always
/// `None` in `initialize` and is the handler's error in `complete` when the
/// handler failed.
#[derive(Debug, Clone, Copy)]
pub struct InterceptArgs<'a> {
    pub object_type: &'a ObjectType,
    pub operation: OperationKind,
    pub scope: Scope,
    pub criteria: &'a Criteria,
    pub exception: Option<&'a anyhow::Error>,
}

impl InterceptArgs<'_> {
    pub fn failed(&self) -> bool {
        self.exception.is_some()
    }
}

/// Cross-cutting observer invoked once before and once after each dispatch.
///
/// `complete` runs whether or not the handler succeeded. An error returned
/// from `initialize` aborts the dispatch before the handler runs.
pub trait Interceptor: Send + Sync {
    fn initialize(&self, context: &mut AmbientContext, args: &InterceptArgs<'_>) -> anyhow::Result<()>;

    fn complete(&self, context: &mut AmbientContext, args: &InterceptArgs<'_>) -> anyhow::Result<()>;
}

/// Used when no interceptor is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopInterceptor;

impl Interceptor for NoopInterceptor {
    fn initialize(&self, _context: &mut AmbientContext, _args: &InterceptArgs<'_>) -> anyhow::Result<()> {
        Ok(())
    }

    fn complete(&self, _context: &mut AmbientContext, _args: &InterceptArgs<'_>) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Logs every dispatch through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingInterceptor;

impl Interceptor for TracingInterceptor {
    fn initialize(&self, _context: &mut AmbientContext, args: &InterceptArgs<'_>) -> anyhow::Result<()> {
        tracing::info!(
            object_type = %args.object_type,
            operation = %args.operation,
            scope = %args.scope,
            criteria = %args.criteria.shape(),
            "dispatch started"
        );
        Ok(())
    }

    fn complete(&self, _context: &mut AmbientContext, args: &InterceptArgs<'_>) -> anyhow::Result<()> {
        match args.exception {
            Some(error) => tracing::warn!(
                object_type = %args.object_type,
                operation = %args.operation,
                scope = %args.scope,
                error = %error,
                "dispatch failed"
            ),
            None => tracing::info!(
                object_type = %args.object_type,
                operation = %args.operation,
                scope = %args.scope,
                "dispatch completed"
            ),
        }
        Ok(())
    }
}

/// Records hook calls into the ambient context.
///
/// `intercept.initialize+{Type}` holds `"Initialize"`, `intercept.complete+{Type}`
/// holds `"Complete"` and, on failure, `intercept.exception+{Type}` holds the
/// error message. `intercept.operation+{Type}` names the last operation seen.
#[derive(Debug, Default, Clone, Copy)]
pub struct AuditInterceptor;

impl AuditInterceptor {
    pub fn initialize_key(type_name: &str) -> String {
        format!("intercept.initialize+{}", type_name)
    }

    pub fn complete_key(type_name: &str) -> String {
        format!("intercept.complete+{}", type_name)
    }

    pub fn exception_key(type_name: &str) -> String {
        format!("intercept.exception+{}", type_name)
    }

    pub fn operation_key(type_name: &str) -> String {
        format!("intercept.operation+{}", type_name)
    }
}

impl Interceptor for AuditInterceptor {
    fn initialize(&self, context: &mut AmbientContext, args: &InterceptArgs<'_>) -> anyhow::Result<()> {
        let name = args.object_type.name();
        context.set(Self::initialize_key(name), "Initialize");
        context.set(Self::operation_key(name), args.operation.as_str());
        Ok(())
    }

    fn complete(&self, context: &mut AmbientContext, args: &InterceptArgs<'_>) -> anyhow::Result<()> {
        let name = args.object_type.name();
        context.set(Self::complete_key(name), "Complete");
        if let Some(error) = args.exception {
            context.set(Self::exception_key(name), error.to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::portal::BusinessObject;
    use serde_json::json;

    #[derive(Default)]
    struct Gadget;

    impl BusinessObject for Gadget {}

    #[test]
    fn audit_records_hook_names() {
        let object_type = ObjectType::of::<Gadget>();
        let criteria = Criteria::none();
        let args = InterceptArgs {
            object_type: &object_type,
            operation: OperationKind::Fetch,
            scope: Scope::Root,
            criteria: &criteria,
            exception: None,
        };
        let mut context = AmbientContext::new();

        AuditInterceptor.initialize(&mut context, &args).unwrap();
        AuditInterceptor.complete(&mut context, &args).unwrap();

        assert_eq!(context.get("intercept.initialize+Gadget").unwrap(), &json!("Initialize"));
        assert_eq!(context.get("intercept.complete+Gadget").unwrap(), &json!("Complete"));
        assert_eq!(context.get("intercept.operation+Gadget").unwrap(), &json!("fetch"));
        assert!(!context.contains("intercept.exception+Gadget"));
    }

    #[test]
    fn audit_records_handler_error_on_complete() {
        let object_type = ObjectType::of::<Gadget>();
        let criteria = Criteria::none();
        let error = anyhow::anyhow!("boom");
        let args = InterceptArgs {
            object_type: &object_type,
            operation: OperationKind::Update,
            scope: Scope::Child,
            criteria: &criteria,
            exception: Some(&error),
        };
        let mut context = AmbientContext::new();

        AuditInterceptor.complete(&mut context, &args).unwrap();

        assert_eq!(context.get_string("intercept.exception+Gadget").unwrap(), "boom");
        assert_eq!(context.get_string("intercept.complete+Gadget").unwrap(), "Complete");
    }
}
