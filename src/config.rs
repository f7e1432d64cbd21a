//! Portal configuration loaded from environment variables.

use std::path::PathBuf;

use crate::db::{self, Database};
use crate::portal::{
    AuditActivator, AuditInterceptor, DataPortal, DefaultActivator, HandlerRegistry,
    NoopInterceptor, TracingInterceptor,
};

pub const INTERCEPTOR_VAR: &str = "ROCKET_PORTAL_INTERCEPTOR";
pub const ACTIVATOR_VAR: &str = "ROCKET_PORTAL_ACTIVATOR";
pub const DB_VAR: &str = "ROCKET_PORTAL_DB";

/// Which interceptor the portal is built with.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum InterceptorKind {
    None,
    #[default]
    Tracing,
    Audit,
}

impl InterceptorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Tracing => "tracing",
            Self::Audit => "audit",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "none" => Some(Self::None),
            "tracing" => Some(Self::Tracing),
            "audit" => Some(Self::Audit),
            _ => None,
        }
    }
}

/// Which activator the portal is built with.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ActivatorKind {
    #[default]
    Default,
    Audit,
}

impl ActivatorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Audit => "audit",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "default" => Some(Self::Default),
            "audit" => Some(Self::Audit),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortalConfig {
    /// From ROCKET_PORTAL_INTERCEPTOR (`none`, `tracing`, `audit`)
    pub interceptor: InterceptorKind,
    /// From ROCKET_PORTAL_ACTIVATOR (`default`, `audit`)
    pub activator: ActivatorKind,
    /// From ROCKET_PORTAL_DB; the platform data directory when unset
    pub database_path: Option<PathBuf>,
}

impl PortalConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through `lookup`. Unknown values fall back to the
    /// defaults with a warning.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let interceptor = lookup(INTERCEPTOR_VAR)
            .map(|value| {
                InterceptorKind::from_str(value.trim()).unwrap_or_else(|| {
                    tracing::warn!(var = INTERCEPTOR_VAR, value = %value, "unknown interceptor, using default");
                    InterceptorKind::default()
                })
            })
            .unwrap_or_default();

        let activator = lookup(ACTIVATOR_VAR)
            .map(|value| {
                ActivatorKind::from_str(value.trim()).unwrap_or_else(|| {
                    tracing::warn!(var = ACTIVATOR_VAR, value = %value, "unknown activator, using default");
                    ActivatorKind::default()
                })
            })
            .unwrap_or_default();

        let database_path = lookup(DB_VAR)
            .filter(|path| !path.trim().is_empty())
            .map(PathBuf::from);

        Self {
            interceptor,
            activator,
            database_path,
        }
    }

    /// No interceptor, default activation, default database location.
    pub fn disabled() -> Self {
        Self {
            interceptor: InterceptorKind::None,
            activator: ActivatorKind::Default,
            database_path: None,
        }
    }

    /// Record every hook and activation phase into the ambient context.
    pub fn audited() -> Self {
        Self {
            interceptor: InterceptorKind::Audit,
            activator: ActivatorKind::Audit,
            database_path: None,
        }
    }

    pub fn with_database_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.database_path = Some(path.into());
        self
    }

    /// Build a portal over `registry` with the configured strategies.
    pub fn build(&self, registry: HandlerRegistry) -> DataPortal {
        let portal = DataPortal::new(registry);
        let portal = match self.interceptor {
            InterceptorKind::None => portal.with_interceptor(NoopInterceptor),
            InterceptorKind::Tracing => portal.with_interceptor(TracingInterceptor),
            InterceptorKind::Audit => portal.with_interceptor(AuditInterceptor),
        };
        match self.activator {
            ActivatorKind::Default => portal.with_activator(DefaultActivator),
            ActivatorKind::Audit => portal.with_activator(AuditActivator),
        }
    }

    /// Open and migrate the configured database.
    pub fn open_database(&self) -> anyhow::Result<Database> {
        let path = match &self.database_path {
            Some(path) => path.clone(),
            None => db::default_path()?,
        };
        tracing::debug!(path = %path.display(), "opening database");
        let db = Database::open(path)?;
        db.migrate()?;
        Ok(db)
    }
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::portal::{AmbientContext, BusinessObject, Criteria, ParamKind, Scope};
    use std::collections::HashMap;

    #[derive(Default)]
    struct Probe;

    impl BusinessObject for Probe {}

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| vars.get(name).cloned()
    }

    fn registry() -> HandlerRegistry {
        let mut registry = HandlerRegistry::new();
        registry
            .register::<Probe>()
            .fetch(Scope::Root, [ParamKind::Integer], |_, _, _| Ok(()));
        registry
    }

    #[test]
    fn defaults_when_nothing_is_set() {
        let config = PortalConfig::from_lookup(|_| None);
        assert_eq!(config.interceptor, InterceptorKind::Tracing);
        assert_eq!(config.activator, ActivatorKind::Default);
        assert!(config.database_path.is_none());
    }

    #[test]
    fn reads_every_variable() {
        let config = PortalConfig::from_lookup(lookup(&[
            (INTERCEPTOR_VAR, "audit"),
            (ACTIVATOR_VAR, "audit"),
            (DB_VAR, "/tmp/portal-test.db"),
        ]));
        assert_eq!(config.interceptor, InterceptorKind::Audit);
        assert_eq!(config.activator, ActivatorKind::Audit);
        assert_eq!(config.database_path, Some(PathBuf::from("/tmp/portal-test.db")));
    }

    #[test]
    fn unknown_values_fall_back_to_defaults() {
        let config = PortalConfig::from_lookup(lookup(&[
            (INTERCEPTOR_VAR, "loud"),
            (ACTIVATOR_VAR, "pooled"),
            (DB_VAR, "  "),
        ]));
        assert_eq!(config.interceptor, InterceptorKind::Tracing);
        assert_eq!(config.activator, ActivatorKind::Default);
        assert!(config.database_path.is_none());
    }

    #[test]
    fn audited_portal_records_into_context() {
        let portal = PortalConfig::audited().build(registry());
        let mut context = AmbientContext::new();

        let _: Probe = portal.fetch(&mut context, Criteria::single(7)).unwrap();

        assert!(context.contains(&AuditInterceptor::initialize_key("Probe")));
        assert!(context.contains(&AuditInterceptor::complete_key("Probe")));
        assert!(context.contains(&AuditActivator::create_key("Probe")));
        assert!(context.contains(&AuditActivator::initialize_key("Probe")));
    }

    #[test]
    fn disabled_portal_leaves_context_empty() {
        let portal = PortalConfig::disabled().build(registry());
        let mut context = AmbientContext::new();

        let _: Probe = portal.fetch(&mut context, Criteria::single(7)).unwrap();

        assert!(context.is_empty());
    }

    #[test]
    fn opens_database_at_configured_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("portal.db");
        let config = PortalConfig::disabled().with_database_path(&path);

        let db = config.open_database().unwrap();

        assert!(path.exists());
        assert!(db.get_features_by_project(uuid::Uuid::new_v4()).unwrap().is_empty());
    }
}
