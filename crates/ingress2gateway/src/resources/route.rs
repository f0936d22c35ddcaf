//! Types modelling the Gateway API route resources: `HTTPRoute`, `GRPCRoute`,
//! `TCPRoute` and `UDPRoute`.
//!
//! All route kinds share parent and backend references. The [`Route`] trait
//! exposes these uniformly, which is what the cross-namespace reference
//! analysis walks over.

use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use serde::{Deserialize, Serialize};

use crate::resources::{GATEWAY_API_GROUP, GATEWAY_API_V1, GATEWAY_API_V1ALPHA2};

pub const HTTP_ROUTE_KIND: &str = "HTTPRoute";
pub const GRPC_ROUTE_KIND: &str = "GRPCRoute";
pub const TCP_ROUTE_KIND: &str = "TCPRoute";
pub const UDP_ROUTE_KIND: &str = "UDPRoute";

/// Common accessors over every route kind.
pub trait Route {
    /// The resource kind, e.g. `HTTPRoute`.
    fn kind(&self) -> &str;

    fn metadata(&self) -> &ObjectMeta;

    fn parent_refs(&self) -> &[ParentReference];

    /// All backend references across all rules, in rule order.
    fn backend_refs(&self) -> Vec<&BackendRef>;
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParentReference {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,

    #[serde(default)]
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
}

impl ParentReference {
    /// References the Gateway `name` in `namespace`.
    pub fn gateway(name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: Some(namespace.into()),
            ..Self::default()
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendRef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,

    #[serde(default)]
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<i32>,
}

impl BackendRef {
    /// References port `port` of the Service `name` in the route's namespace.
    pub fn service(name: impl Into<String>, port: u16) -> Self {
        Self {
            name: name.into(),
            port: Some(port),
            ..Self::default()
        }
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }
}

// HTTPRoute

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpRoute {
    #[serde(default)]
    pub api_version: String,

    #[serde(default)]
    pub kind: String,

    #[serde(default)]
    pub metadata: ObjectMeta,

    #[serde(default)]
    pub spec: HttpRouteSpec,
}

impl HttpRoute {
    /// Creates a `gateway.networking.k8s.io/v1` HTTPRoute.
    pub fn new(metadata: ObjectMeta, spec: HttpRouteSpec) -> Self {
        Self {
            api_version: format!("{GATEWAY_API_GROUP}/{GATEWAY_API_V1}"),
            kind: HTTP_ROUTE_KIND.to_owned(),
            metadata,
            spec,
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpRouteSpec {
    #[serde(default)]
    pub parent_refs: Vec<ParentReference>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hostnames: Vec<String>,

    #[serde(default)]
    pub rules: Vec<HttpRouteRule>,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpRouteRule {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub matches: Vec<HttpRouteMatch>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub filters: Vec<HttpRouteFilter>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub backend_refs: Vec<BackendRef>,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpRouteMatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<HttpPathMatch>,
}

impl HttpRouteMatch {
    pub fn path(type_: PathMatchType, value: impl Into<String>) -> Self {
        Self {
            path: Some(HttpPathMatch {
                type_,
                value: value.into(),
            }),
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpPathMatch {
    #[serde(default, rename = "type")]
    pub type_: PathMatchType,

    #[serde(default = "HttpPathMatch::default_value")]
    pub value: String,
}

impl HttpPathMatch {
    fn default_value() -> String {
        "/".to_owned()
    }
}

#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq, Serialize, strum::Display)]
pub enum PathMatchType {
    Exact,

    #[default]
    PathPrefix,

    RegularExpression,

    /// Any match type this crate doesn't know about.
    #[serde(other)]
    Unknown,
}

/// A filter applied to requests matching an HTTPRoute rule.
///
/// Only the payloads of the filters produced by the annotation interpreter are
/// modelled; other known filter types parse but keep just their type, and
/// filter types newer than this crate parse as [`HttpRouteFilterType::Unknown`].
#[derive(Clone, Debug, Deserialize, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpRouteFilter {
    #[serde(rename = "type")]
    pub type_: HttpRouteFilterType,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_redirect: Option<HttpRequestRedirectFilter>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url_rewrite: Option<HttpUrlRewriteFilter>,
}

impl HttpRouteFilter {
    /// Redirects plain HTTP requests to HTTPS with a permanent redirect.
    pub fn https_redirect() -> Self {
        Self {
            type_: HttpRouteFilterType::RequestRedirect,
            request_redirect: Some(HttpRequestRedirectFilter {
                scheme: Some("https".to_owned()),
                status_code: Some(301),
                ..HttpRequestRedirectFilter::default()
            }),
            url_rewrite: None,
        }
    }

    /// Replaces the matched path prefix with `replacement`.
    pub fn replace_prefix_match(replacement: impl Into<String>) -> Self {
        Self {
            type_: HttpRouteFilterType::UrlRewrite,
            request_redirect: None,
            url_rewrite: Some(HttpUrlRewriteFilter {
                hostname: None,
                path: Some(HttpPathModifier {
                    type_: HttpPathModifierType::ReplacePrefixMatch,
                    replace_full_path: None,
                    replace_prefix_match: Some(replacement.into()),
                }),
            }),
        }
    }
}

#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq, Serialize, strum::Display)]
pub enum HttpRouteFilterType {
    RequestHeaderModifier,
    ResponseHeaderModifier,
    RequestMirror,
    RequestRedirect,

    #[serde(rename = "URLRewrite")]
    #[strum(serialize = "URLRewrite")]
    UrlRewrite,

    ExtensionRef,

    /// Any filter type this crate doesn't know about, such as `CORS`.
    #[serde(other)]
    Unknown,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpRequestRedirectFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheme: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpUrlRewriteFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<HttpPathModifier>,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpPathModifier {
    #[serde(rename = "type")]
    pub type_: HttpPathModifierType,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replace_full_path: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replace_prefix_match: Option<String>,
}

#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq, Serialize, strum::Display)]
pub enum HttpPathModifierType {
    ReplaceFullPath,
    ReplacePrefixMatch,
}

impl Route for HttpRoute {
    fn kind(&self) -> &str {
        &self.kind
    }

    fn metadata(&self) -> &ObjectMeta {
        &self.metadata
    }

    fn parent_refs(&self) -> &[ParentReference] {
        &self.spec.parent_refs
    }

    fn backend_refs(&self) -> Vec<&BackendRef> {
        self.spec
            .rules
            .iter()
            .flat_map(|rule| &rule.backend_refs)
            .collect()
    }
}

// GRPCRoute

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GrpcRoute {
    #[serde(default)]
    pub api_version: String,

    #[serde(default)]
    pub kind: String,

    #[serde(default)]
    pub metadata: ObjectMeta,

    #[serde(default)]
    pub spec: GrpcRouteSpec,
}

impl GrpcRoute {
    /// Creates a `gateway.networking.k8s.io/v1` GRPCRoute.
    pub fn new(metadata: ObjectMeta, spec: GrpcRouteSpec) -> Self {
        Self {
            api_version: format!("{GATEWAY_API_GROUP}/{GATEWAY_API_V1}"),
            kind: GRPC_ROUTE_KIND.to_owned(),
            metadata,
            spec,
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GrpcRouteSpec {
    #[serde(default)]
    pub parent_refs: Vec<ParentReference>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hostnames: Vec<String>,

    #[serde(default)]
    pub rules: Vec<GrpcRouteRule>,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GrpcRouteRule {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub matches: Vec<GrpcRouteMatch>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub backend_refs: Vec<BackendRef>,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GrpcRouteMatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<GrpcMethodMatch>,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GrpcMethodMatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
}

impl Route for GrpcRoute {
    fn kind(&self) -> &str {
        &self.kind
    }

    fn metadata(&self) -> &ObjectMeta {
        &self.metadata
    }

    fn parent_refs(&self) -> &[ParentReference] {
        &self.spec.parent_refs
    }

    fn backend_refs(&self) -> Vec<&BackendRef> {
        self.spec
            .rules
            .iter()
            .flat_map(|rule| &rule.backend_refs)
            .collect()
    }
}

/// GRPCRoutes are structurally compatible with HTTPRoutes: parent references,
/// hostnames and backends carry over, while method matches (which have no
/// path) become empty matches.
impl From<GrpcRoute> for HttpRoute {
    fn from(route: GrpcRoute) -> Self {
        let rules = route
            .spec
            .rules
            .into_iter()
            .map(|rule| HttpRouteRule {
                matches: rule
                    .matches
                    .iter()
                    .map(|_| HttpRouteMatch::default())
                    .collect(),
                filters: Vec::new(),
                backend_refs: rule.backend_refs,
            })
            .collect();

        Self {
            api_version: route.api_version,
            kind: HTTP_ROUTE_KIND.to_owned(),
            metadata: route.metadata,
            spec: HttpRouteSpec {
                parent_refs: route.spec.parent_refs,
                hostnames: route.spec.hostnames,
                rules,
            },
        }
    }
}

// TCPRoute and UDPRoute

/// The spec shared by the layer 4 routes, which only forward to backends.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct L4RouteSpec {
    #[serde(default)]
    pub parent_refs: Vec<ParentReference>,

    #[serde(default)]
    pub rules: Vec<L4RouteRule>,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct L4RouteRule {
    #[serde(default)]
    pub backend_refs: Vec<BackendRef>,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TcpRoute {
    #[serde(default)]
    pub api_version: String,

    #[serde(default)]
    pub kind: String,

    #[serde(default)]
    pub metadata: ObjectMeta,

    #[serde(default)]
    pub spec: L4RouteSpec,
}

impl TcpRoute {
    /// Creates a `gateway.networking.k8s.io/v1alpha2` TCPRoute.
    pub fn new(metadata: ObjectMeta, spec: L4RouteSpec) -> Self {
        Self {
            api_version: format!("{GATEWAY_API_GROUP}/{GATEWAY_API_V1ALPHA2}"),
            kind: TCP_ROUTE_KIND.to_owned(),
            metadata,
            spec,
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UdpRoute {
    #[serde(default)]
    pub api_version: String,

    #[serde(default)]
    pub kind: String,

    #[serde(default)]
    pub metadata: ObjectMeta,

    #[serde(default)]
    pub spec: L4RouteSpec,
}

impl UdpRoute {
    /// Creates a `gateway.networking.k8s.io/v1alpha2` UDPRoute.
    pub fn new(metadata: ObjectMeta, spec: L4RouteSpec) -> Self {
        Self {
            api_version: format!("{GATEWAY_API_GROUP}/{GATEWAY_API_V1ALPHA2}"),
            kind: UDP_ROUTE_KIND.to_owned(),
            metadata,
            spec,
        }
    }
}

macro_rules! impl_l4_route {
    ($route:ty) => {
        impl Route for $route {
            fn kind(&self) -> &str {
                &self.kind
            }

            fn metadata(&self) -> &ObjectMeta {
                &self.metadata
            }

            fn parent_refs(&self) -> &[ParentReference] {
                &self.spec.parent_refs
            }

            fn backend_refs(&self) -> Vec<&BackendRef> {
                self.spec
                    .rules
                    .iter()
                    .flat_map(|rule| &rule.backend_refs)
                    .collect()
            }
        }
    };
}

impl_l4_route!(TcpRoute);
impl_l4_route!(UdpRoute);

#[cfg(test)]
mod tests {
    use indoc::indoc;

    use super::*;

    #[test]
    fn https_redirect_filter_serializes() {
        let yaml = serde_yaml::to_string(&HttpRouteFilter::https_redirect())
            .expect("filter serializes");

        assert_eq!(
            yaml,
            indoc! {"
                type: RequestRedirect
                requestRedirect:
                  scheme: https
                  statusCode: 301
            "}
        );
    }

    #[test]
    fn url_rewrite_filter_serializes() {
        let yaml = serde_yaml::to_string(&HttpRouteFilter::replace_prefix_match("/"))
            .expect("filter serializes");

        assert_eq!(
            yaml,
            indoc! {"
                type: URLRewrite
                urlRewrite:
                  path:
                    type: ReplacePrefixMatch
                    replacePrefixMatch: /
            "}
        );
    }

    #[test]
    fn unknown_filter_payloads_are_ignored() {
        let filter: HttpRouteFilter = serde_yaml::from_str(indoc! {"
            type: RequestHeaderModifier
            requestHeaderModifier:
              add:
                - name: x-foo
                  value: bar
        "})
        .expect("filter parses");

        assert_eq!(filter.type_, HttpRouteFilterType::RequestHeaderModifier);
    }

    #[test]
    fn grpc_route_converts_to_http_route() {
        let grpc: GrpcRoute = serde_yaml::from_str(indoc! {"
            apiVersion: gateway.networking.k8s.io/v1
            kind: GRPCRoute
            metadata:
              name: grpc
            spec:
              parentRefs:
                - name: gw
              hostnames:
                - grpc.example.com
              rules:
                - matches:
                    - method:
                        service: helloworld.Greeter
                  backendRefs:
                    - name: greeter
                      port: 50051
        "})
        .expect("GRPCRoute parses");

        let http = HttpRoute::from(grpc);

        assert_eq!(http.kind, HTTP_ROUTE_KIND);
        assert_eq!(http.spec.hostnames, vec!["grpc.example.com"]);
        assert_eq!(http.spec.rules[0].matches, vec![HttpRouteMatch::default()]);
        assert_eq!(http.backend_refs()[0].name, "greeter");
    }
}
