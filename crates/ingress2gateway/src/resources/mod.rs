//! Typed models of the Kubernetes resources consumed and produced by the
//! conversions.
//!
//! Metadata always uses [`ObjectMeta`] from `k8s-openapi`. The resource specs
//! are modelled here, as `k8s-openapi` ships neither the Gateway API types nor
//! the legacy Ingress backend layout.
//!
//! [`ObjectMeta`]: k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta

mod gateway;
mod ingress;
mod meta;
mod reference_grant;
mod route;

pub use gateway::*;
pub use ingress::*;
pub use meta::*;
pub use reference_grant::*;
pub use route::*;

pub const GATEWAY_API_GROUP: &str = "gateway.networking.k8s.io";
pub const GATEWAY_API_V1: &str = "v1";
pub const GATEWAY_API_V1BETA1: &str = "v1beta1";
pub const GATEWAY_API_V1ALPHA2: &str = "v1alpha2";

/// Turns a hostname into a string usable inside resource names.
///
/// Dots become dashes and the wildcard `*` becomes `wildcard`, so
/// `*.example.com` turns into `wildcard-example-com`.
pub fn sanitize_hostname(host: &str) -> String {
    host.replace('.', "-").replace('*', "wildcard")
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("example.com", "example-com")]
    #[case("*.example.com", "wildcard-example-com")]
    #[case("*", "wildcard")]
    #[case("localhost", "localhost")]
    fn sanitize_hostname_replaces_dots_and_wildcards(#[case] host: &str, #[case] expected: &str) {
        assert_eq!(sanitize_hostname(host), expected);
    }
}
