//! Structural conversion of an Ingress into a Gateway and HTTPRoutes.
//!
//! Only the Ingress structure (TLS entries, rules, paths and backends) is
//! considered here. Annotations are interpreted separately by
//! [`annotations`](crate::annotations) and folded in by the
//! [`pipeline`](crate::pipeline).

use std::collections::BTreeMap;

use indexmap::IndexSet;
use snafu::{ResultExt, Snafu, ensure};
use tracing::debug;

use crate::{
    resources::{
        AllowedRoutes, BackendRef, CertificateRef, FromNamespaces, Gateway, GatewaySpec,
        HttpRoute, HttpRouteMatch, HttpRouteRule, HttpRouteSpec, Ingress, IngressBackend,
        Listener, ListenerProtocol, ListenerTls, ObjectMetaBuilder, ObjectMetaExt,
        ParentReference, PathMatchType, PathType, TlsMode, sanitize_hostname,
    },
    yaml,
};

pub const INGRESS_KIND: &str = "Ingress";

/// The Gateway name used when the Ingress has none.
pub const DEFAULT_GATEWAY_NAME: &str = "converted-gateway";

/// The gateway class used when the Ingress has no `ingressClassName`.
pub const DEFAULT_GATEWAY_CLASS: &str = "istio";

pub const HTTP_PORT: u16 = 80;
pub const HTTPS_PORT: u16 = 443;

const WILDCARD_HOST: &str = "*";

type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("failed to parse Ingress"))]
    ParseIngress { source: yaml::Error },

    #[snafu(display("the Ingress document is empty"))]
    EmptyIngress,

    #[snafu(display("expected kind {INGRESS_KIND:?}, got {kind:?}"))]
    WrongKind { kind: String },
}

/// The resources derived from a single Ingress.
#[derive(Clone, Debug, PartialEq)]
pub struct ConvertedResources {
    pub gateway: Gateway,
    pub httproutes: Vec<HttpRoute>,
}

/// Parses a single Ingress YAML document.
pub fn parse_ingress(input: &str) -> Result<Ingress> {
    let document = yaml::parse_document(input).context(ParseIngressSnafu)?;
    yaml::from_value(document).context(ParseIngressSnafu)
}

/// Converts `ingress` into a Gateway plus one HTTPRoute per Ingress rule, and
/// one more for the default backend.
///
/// Every TLS host gets an HTTPS listener on port 443. Every rule host without
/// TLS gets an HTTP listener on port 80, and if no listener results at all a
/// single catch-all HTTP listener is added.
pub fn convert_ingress_to_gateway(ingress: &Ingress) -> Result<ConvertedResources> {
    ensure!(!ingress.is_empty(), EmptyIngressSnafu);
    ensure!(
        ingress.kind == INGRESS_KIND,
        WrongKindSnafu {
            kind: ingress.kind.clone()
        }
    );

    let name = ingress.metadata.name_or(DEFAULT_GATEWAY_NAME);
    let namespace = ingress.metadata.namespace_or_default();
    let spec = &ingress.spec;

    let gateway = Gateway::new(
        ObjectMetaBuilder::new().name(name).namespace(namespace).build(),
        GatewaySpec {
            gateway_class_name: spec
                .ingress_class_name
                .as_deref()
                .filter(|class| !class.is_empty())
                .unwrap_or(DEFAULT_GATEWAY_CLASS)
                .to_owned(),
            listeners: build_listeners(ingress, name),
            addresses: Vec::new(),
        },
    );

    let mut httproutes = Vec::new();
    for rule in &spec.rules {
        let host = rule.host.as_deref().filter(|host| !host.is_empty());
        let rules: Vec<_> = rule
            .paths()
            .iter()
            .map(|path| {
                let match_type = match path.path_type.unwrap_or_default() {
                    PathType::Prefix | PathType::ImplementationSpecific => {
                        PathMatchType::PathPrefix
                    }
                    PathType::Exact | PathType::Unknown => PathMatchType::Exact,
                };
                route_rule(
                    HttpRouteMatch::path(match_type, path.path.as_deref().unwrap_or("/")),
                    &path.backend,
                )
            })
            .collect();

        if rules.is_empty() {
            debug!(ingress = name, ?host, "skipping rule without paths");
            continue;
        }

        let route_name = match host {
            Some(host) => format!("{name}-{}", host.replace('.', "-")),
            None => format!("{name}-default"),
        };
        httproutes.push(http_route(&route_name, namespace, name, host, rules));
    }

    if let Some(backend) = &spec.default_backend
        && !backend.service_name().is_empty()
    {
        let rule = route_rule(
            HttpRouteMatch::path(PathMatchType::PathPrefix, "/"),
            backend,
        );
        httproutes.push(http_route(
            &format!("{name}-default"),
            namespace,
            name,
            None,
            vec![rule],
        ));
    }

    debug!(
        ingress = name,
        listeners = gateway.spec.listeners.len(),
        httproutes = httproutes.len(),
        "converted Ingress"
    );

    Ok(ConvertedResources {
        gateway,
        httproutes,
    })
}

fn build_listeners(ingress: &Ingress, name: &str) -> Vec<Listener> {
    let mut tls_hosts = IndexSet::new();
    let mut tls_secrets = BTreeMap::new();
    for tls in &ingress.spec.tls {
        let secret_name = tls.secret_name.as_deref().filter(|secret| !secret.is_empty());
        for host in &tls.hosts {
            tls_hosts.insert(host.as_str());
            if let Some(secret_name) = secret_name {
                tls_secrets.insert(host.as_str(), secret_name);
            }
        }
    }

    let rule_hosts: IndexSet<&str> = ingress
        .spec
        .rules
        .iter()
        .map(|rule| {
            rule.host
                .as_deref()
                .filter(|host| !host.is_empty())
                .unwrap_or(WILDCARD_HOST)
        })
        .collect();

    let mut listeners: Vec<Listener> = tls_hosts
        .iter()
        .map(|host| {
            let secret_name = tls_secrets
                .get(host)
                .map_or_else(|| format!("{name}-tls"), |secret| (*secret).to_owned());
            Listener {
                tls: Some(ListenerTls {
                    mode: Some(TlsMode::Terminate),
                    certificate_refs: vec![CertificateRef::secret(secret_name)],
                }),
                ..listener(ListenerProtocol::Https, host, HTTPS_PORT)
            }
        })
        .collect();

    listeners.extend(
        rule_hosts
            .difference(&tls_hosts)
            .map(|host| listener(ListenerProtocol::Http, host, HTTP_PORT)),
    );

    if listeners.is_empty() {
        listeners.push(listener(ListenerProtocol::Http, WILDCARD_HOST, HTTP_PORT));
    }

    listeners
}

/// A listener named `{protocol}-{host}`, bound to `host` unless it is the
/// wildcard.
fn listener(protocol: ListenerProtocol, host: &str, port: u16) -> Listener {
    Listener {
        name: format!(
            "{}-{}",
            protocol.to_string().to_lowercase(),
            sanitize_hostname(host)
        ),
        hostname: (host != WILDCARD_HOST).then(|| host.to_owned()),
        port,
        protocol,
        tls: None,
        allowed_routes: Some(AllowedRoutes::from_namespaces(FromNamespaces::Same)),
    }
}

fn route_rule(route_match: HttpRouteMatch, backend: &IngressBackend) -> HttpRouteRule {
    HttpRouteRule {
        matches: vec![route_match],
        filters: Vec::new(),
        backend_refs: vec![BackendRef::service(backend.service_name(), backend.port())],
    }
}

fn http_route(
    name: &str,
    namespace: &str,
    gateway_name: &str,
    host: Option<&str>,
    rules: Vec<HttpRouteRule>,
) -> HttpRoute {
    HttpRoute::new(
        ObjectMetaBuilder::new().name(name).namespace(namespace).build(),
        HttpRouteSpec {
            parent_refs: vec![ParentReference::gateway(gateway_name, namespace)],
            hostnames: host.map(ToOwned::to_owned).into_iter().collect(),
            rules,
        },
    )
}
