//! Translates Kubernetes Ingress resources into Gateway API resources, and
//! back.
//!
//! The entry points for whole YAML streams live in [`pipeline`]. The
//! individual steps are usable on their own:
//!
//! - [`annotations`] interprets nginx, Traefik, Istio, AWS ALB and GCE
//!   annotations.
//! - [`converter`] derives a Gateway and HTTPRoutes from the Ingress structure.
//! - [`provider`] applies the defaults of a Gateway API implementation.
//! - [`protocol`] specialises routes for gRPC, TCP and UDP backends.
//! - [`reference_grant`] generates ReferenceGrants for cross-namespace references.
//! - [`reverse`] converts Gateway API resources back into an Ingress.
//! - [`validation`] performs structural checks on input and output documents.

pub mod annotations;
pub mod converter;
pub mod merge;
pub mod pipeline;
pub mod protocol;
pub mod provider;
pub mod reference_grant;
pub mod resources;
pub mod reverse;
pub mod validation;
pub mod yaml;

// External re-exports
pub use k8s_openapi;
pub use serde_yaml;
