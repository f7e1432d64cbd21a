//! A data portal for business objects.
//!
//! [`portal`] dispatches create/fetch/insert/update/delete operations to
//! registered handlers, wrapping each one in interceptor hooks and two-phase
//! activation. [`models`] and [`db`] provide a feature-tracking domain served
//! through it.

pub mod config;
pub mod db;
pub mod models;
pub mod portal;
