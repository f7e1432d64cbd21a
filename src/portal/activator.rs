//! Pluggable object activation.

use super::context::AmbientContext;
use super::object::BusinessObject;
use super::resolver::ObjectType;

/// Two-phase construction used by the portal instead of building objects directly.
///
/// `create_instance` only runs for operations that allocate (create, fetch).
/// `initialize_instance` runs for every object handed back to a caller, after
/// its handler and interceptor `complete` hook have finished.
pub trait Activator: Send + Sync {
    fn create_instance(
        &self,
        context: &mut AmbientContext,
        object_type: &ObjectType,
    ) -> anyhow::Result<Box<dyn BusinessObject>>;

    fn initialize_instance(
        &self,
        context: &mut AmbientContext,
        object_type: &ObjectType,
        instance: &mut dyn BusinessObject,
    ) -> anyhow::Result<()>;
}

/// Default construction and no post-construction work.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultActivator;

impl Activator for DefaultActivator {
    fn create_instance(
        &self,
        _context: &mut AmbientContext,
        object_type: &ObjectType,
    ) -> anyhow::Result<Box<dyn BusinessObject>> {
        Ok(object_type.construct())
    }

    fn initialize_instance(
        &self,
        _context: &mut AmbientContext,
        _object_type: &ObjectType,
        _instance: &mut dyn BusinessObject,
    ) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Default activation that records each phase into the ambient context:
/// `activate.create+{Type}` holds `"CreateInstance"` and
/// `activate.initialize+{Type}` holds `"InitializeInstance"`.
#[derive(Debug, Default, Clone, Copy)]
pub struct AuditActivator;

impl AuditActivator {
    pub fn create_key(type_name: &str) -> String {
        format!("activate.create+{}", type_name)
    }

    pub fn initialize_key(type_name: &str) -> String {
        format!("activate.initialize+{}", type_name)
    }
}

impl Activator for AuditActivator {
    fn create_instance(
        &self,
        context: &mut AmbientContext,
        object_type: &ObjectType,
    ) -> anyhow::Result<Box<dyn BusinessObject>> {
        context.set(Self::create_key(object_type.name()), "CreateInstance");
        Ok(object_type.construct())
    }

    fn initialize_instance(
        &self,
        context: &mut AmbientContext,
        object_type: &ObjectType,
        _instance: &mut dyn BusinessObject,
    ) -> anyhow::Result<()> {
        context.set(Self::initialize_key(object_type.name()), "InitializeInstance");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Gadget;

    impl BusinessObject for Gadget {}

    #[test]
    fn audit_records_phase_names() {
        let object_type = ObjectType::of::<Gadget>();
        let mut context = AmbientContext::new();

        let mut instance = AuditActivator.create_instance(&mut context, &object_type).unwrap();
        AuditActivator
            .initialize_instance(&mut context, &object_type, &mut *instance)
            .unwrap();

        assert!(instance.is::<Gadget>());
        assert_eq!(context.get_string("activate.create+Gadget").unwrap(), "CreateInstance");
        assert_eq!(context.get_string("activate.initialize+Gadget").unwrap(), "InitializeInstance");
    }
}
