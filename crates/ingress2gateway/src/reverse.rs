//! Conversion of Gateway API resources back into an Ingress.
//!
//! The reverse direction is lossy: filters, GRPC method matches and anything
//! else Ingress cannot express are dropped. Only hosts, paths, backends and
//! TLS secrets survive.

use snafu::{ResultExt, Snafu};
use tracing::debug;

use crate::{
    converter::INGRESS_KIND,
    resources::{
        DEFAULT_BACKEND_PORT, GATEWAY_KIND, GRPC_ROUTE_KIND, Gateway, GrpcRoute, HTTP_ROUTE_KIND,
        HttpIngressPath, HttpIngressRuleValue, HttpRoute, HttpRouteMatch, INGRESS_API_VERSION,
        Ingress, IngressBackend, IngressRule, IngressSpec, IngressTls, ListenerProtocol,
        ObjectMetaBuilder, ObjectMetaExt, PathMatchType, PathType,
    },
    yaml,
};

/// The Ingress name used when the Gateway has none.
pub const DEFAULT_INGRESS_NAME: &str = "converted-ingress";

/// Maps gateway classes to ingress classes. Unlisted classes are kept as is.
const GATEWAY_CLASS_TO_INGRESS_CLASS: &[(&str, &str)] = &[
    ("istio", "istio"),
    // Envoy Gateway has no ingress controller of its own.
    ("eg", "nginx"),
    ("contour", "contour"),
    ("kong", "kong"),
    ("nginx", "nginx"),
    ("traefik", "traefik"),
    ("gke-l7-global-external-managed", "gce"),
];

type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("failed to parse Gateway API resources"))]
    ParseDocuments { source: yaml::Error },

    #[snafu(display("failed to read Gateway API resource"))]
    DeserializeResource { source: yaml::Error },
}

/// Converts a Gateway and its HTTPRoutes into a single Ingress.
///
/// Every HTTPS listener contributes a TLS entry. Every route match becomes a
/// path pointing at the first backend of its rule. A route with several
/// hostnames yields one Ingress rule per hostname, all sharing the same
/// paths.
pub fn convert_gateway_to_ingress(gateway: &Gateway, httproutes: &[HttpRoute]) -> Ingress {
    let ingress_class_name = Some(map_gateway_class(&gateway.spec.gateway_class_name))
        .filter(|class| !class.is_empty())
        .map(ToOwned::to_owned);

    let tls = gateway
        .spec
        .listeners
        .iter()
        .filter(|listener| listener.protocol == ListenerProtocol::Https)
        .filter_map(|listener| {
            let entry = IngressTls {
                hosts: listener.hostname.iter().cloned().collect(),
                secret_name: listener
                    .tls
                    .as_ref()
                    .and_then(|tls| tls.certificate_refs.first())
                    .map(|certificate| certificate.name.clone()),
            };
            (entry != IngressTls::default()).then_some(entry)
        })
        .collect();

    let rules = httproutes.iter().flat_map(route_to_rules).collect();

    Ingress {
        api_version: INGRESS_API_VERSION.to_owned(),
        kind: INGRESS_KIND.to_owned(),
        metadata: ObjectMetaBuilder::new()
            .name(gateway.metadata.name_or(DEFAULT_INGRESS_NAME))
            .namespace(gateway.metadata.namespace_or_default())
            .build(),
        spec: IngressSpec {
            ingress_class_name,
            default_backend: None,
            tls,
            rules,
        },
    }
}

fn route_to_rules(route: &HttpRoute) -> Vec<IngressRule> {
    let catch_all = [HttpRouteMatch::default()];

    let paths: Vec<_> = route
        .spec
        .rules
        .iter()
        .filter_map(|rule| rule.backend_refs.first().map(|backend| (rule, backend)))
        .flat_map(|(rule, backend)| {
            let matches = if rule.matches.is_empty() {
                catch_all.as_slice()
            } else {
                rule.matches.as_slice()
            };

            matches.iter().map(move |route_match| {
                let (path_type, path) = route_match
                    .path
                    .as_ref()
                    .map_or((PathMatchType::PathPrefix, "/"), |path| {
                        (path.type_, path.value.as_str())
                    });

                HttpIngressPath {
                    path: Some(path.to_owned()),
                    path_type: Some(map_path_type(path_type)),
                    backend: IngressBackend::service(
                        &backend.name,
                        backend.port.unwrap_or(DEFAULT_BACKEND_PORT),
                    ),
                }
            })
        })
        .collect();

    if route.spec.hostnames.is_empty() {
        if paths.is_empty() {
            return Vec::new();
        }
        return vec![IngressRule {
            host: None,
            http: Some(HttpIngressRuleValue { paths }),
        }];
    }

    route
        .spec
        .hostnames
        .iter()
        .map(|hostname| IngressRule {
            host: Some(hostname.clone()),
            http: Some(HttpIngressRuleValue {
                paths: paths.clone(),
            }),
        })
        .collect()
}

fn map_gateway_class(gateway_class: &str) -> &str {
    GATEWAY_CLASS_TO_INGRESS_CLASS
        .iter()
        .find(|(from, _)| *from == gateway_class)
        .map_or(gateway_class, |&(_, to)| to)
}

fn map_path_type(path_type: PathMatchType) -> PathType {
    match path_type {
        PathMatchType::Exact => PathType::Exact,
        PathMatchType::RegularExpression => PathType::ImplementationSpecific,
        PathMatchType::PathPrefix | PathMatchType::Unknown => PathType::Prefix,
    }
}

/// Reads the Gateway and the HTTPRoutes from a multi-document YAML stream.
///
/// GRPCRoutes are read as HTTPRoutes. If several Gateways are present the
/// last one wins. Documents of any other kind are ignored.
pub fn parse_gateway_resources(input: &str) -> Result<(Option<Gateway>, Vec<HttpRoute>)> {
    let mut gateway: Option<Gateway> = None;
    let mut httproutes: Vec<HttpRoute> = Vec::new();

    for document in yaml::parse_documents(input).context(ParseDocumentsSnafu)? {
        let kind = yaml::document_kind(&document).to_owned();
        match kind.as_str() {
            GATEWAY_KIND => {
                gateway = Some(yaml::from_value(document).context(DeserializeResourceSnafu)?);
            }
            HTTP_ROUTE_KIND => {
                httproutes.push(yaml::from_value(document).context(DeserializeResourceSnafu)?);
            }
            GRPC_ROUTE_KIND => {
                let route: GrpcRoute =
                    yaml::from_value(document).context(DeserializeResourceSnafu)?;
                httproutes.push(route.into());
            }
            kind => debug!(kind, "ignoring document"),
        }
    }

    Ok((gateway, httproutes))
}
