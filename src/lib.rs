//! Authorization queries over a collected snapshot of AWS IAM state.
//!
//! The core is an algebra over [Permission] values — inclusion, union,
//! intersection and subtraction under AWS wildcard and condition-operator
//! semantics — with [PermissionSet] maintaining canonical merged form. On
//! top of it sit three queries:
//!
//! * simulate — evaluate one (principal, action, resource) request;
//! * who-can — enumerate principals able to act on a resource;
//! * principal-can — compose a principal's effective permissions into a
//!   single policy document.

#![warn(clippy::all)]

pub mod aggregate;
pub mod catalog;
pub mod cli;
pub mod condition;
pub mod config;
pub mod effect;
pub mod error;
pub mod identity;
pub mod loader;
pub mod org;
pub mod pattern;
pub mod perimeter;
pub mod permission;
pub mod policy;
pub mod principal;
pub mod serutil;
pub mod shrink;
pub mod sim;
pub mod store;
pub mod whocan;

pub use {
    condition::Conditions,
    effect::{Allowed, Denied, Effect, EffectKind},
    error::LensError,
    permission::{AllowSet, DenySet, Permission, PermissionSet, ResourceSpec, SubtractOutcome},
    policy::PolicyDocument,
};
