//! Data portal core.
//!
//! # Components
//!
//! - [`AmbientContext`]: request-scoped key/value bag threaded through every dispatch.
//! - [`Activator`]: two-phase construction (`create_instance`, `initialize_instance`)
//!   used instead of building objects directly.
//! - [`Interceptor`]: `initialize`/`complete` hooks around every dispatch.
//! - [`HandlerRegistry`]: handlers registered per type, operation kind and scope,
//!   resolved by criteria signature.
//! - [`DataPortal`]: runs one operation end to end; handlers reach child objects
//!   through [`ChildPortal`].

mod activator;
mod context;
mod criteria;
mod dispatcher;
mod error;
mod interceptor;
mod object;
mod operation;
mod resolver;

pub use activator::*;
pub use context::*;
pub use criteria::*;
pub use dispatcher::*;
pub use error::*;
pub use interceptor::*;
pub use object::*;
pub use operation::*;
pub use resolver::*;
