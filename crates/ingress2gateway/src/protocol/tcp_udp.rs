//! TCPRoute and UDPRoute generation, plus the detection of layer 4 backends.
//!
//! Detection has two tiers. Annotations are authoritative. Keywords in the
//! service name (`mysql`, `dns`, ...) are a best-effort guess, reported with
//! [`DetectionSource::NameHeuristic`] so that callers can ignore them.

use std::fmt;

use strum::Display;
use tracing::debug;

use crate::{
    annotations::rules::{
        BACKEND_PROTOCOL_ANNOTATION, SSL_PASSTHROUGH_ANNOTATION, TCP_SERVICES_ANNOTATION,
        UDP_SERVICES_ANNOTATION,
    },
    resources::{
        AllowedRoutes, BackendRef, Ingress, L4RouteRule, L4RouteSpec, Listener, ListenerProtocol,
        ObjectMetaBuilder, ParentReference, TCP_ROUTE_KIND, TcpRoute, UDP_ROUTE_KIND, UdpRoute,
        sanitize_hostname,
    },
};

const TCP_KEYWORDS: &[&str] = &["tcp", "mysql", "postgres", "redis", "mongo", "kafka", "amqp"];
const UDP_KEYWORDS: &[&str] = &["udp", "dns", "ntp", "syslog", "tftp", "snmp"];

#[derive(Clone, Copy, Debug, Display, PartialEq, Eq)]
#[strum(serialize_all = "UPPERCASE")]
pub enum StreamProtocol {
    Tcp,
    Udp,
}

/// What a layer 4 backend detection was based on.
#[derive(Clone, Copy, Debug, Display, PartialEq, Eq)]
pub enum DetectionSource {
    /// An annotation explicitly declares the protocol.
    Annotation,

    /// The service name contains a keyword of a well-known protocol.
    NameHeuristic,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BackendDetection {
    pub protocol: StreamProtocol,
    pub source: DetectionSource,
}

impl BackendDetection {
    /// Returns `true` unless the detection is a guess based on the service name.
    pub fn is_authoritative(&self) -> bool {
        self.source == DetectionSource::Annotation
    }
}

/// Detects whether `service_name` is a TCP backend.
///
/// The nginx backend protocol `TCP` or an enabled SSL passthrough count as
/// annotations. Otherwise the service name is matched against well-known TCP
/// protocol keywords, case-insensitively.
pub fn detect_tcp_backend(ingress: &Ingress, service_name: &str) -> Option<BackendDetection> {
    let annotation = |key: &str| {
        ingress
            .metadata
            .annotations
            .as_ref()
            .and_then(|annotations| annotations.get(key))
    };

    let declared = annotation(BACKEND_PROTOCOL_ANNOTATION)
        .is_some_and(|protocol| protocol.eq_ignore_ascii_case("TCP"))
        || annotation(SSL_PASSTHROUGH_ANNOTATION).is_some_and(|value| value == "true");

    detect(StreamProtocol::Tcp, declared, service_name, TCP_KEYWORDS)
}

/// Detects whether `service_name` is a UDP backend.
///
/// Only the nginx backend protocol `UDP` counts as annotation. Otherwise the
/// service name is matched against well-known UDP protocol keywords.
pub fn detect_udp_backend(ingress: &Ingress, service_name: &str) -> Option<BackendDetection> {
    let declared = ingress
        .metadata
        .annotations
        .as_ref()
        .and_then(|annotations| annotations.get(BACKEND_PROTOCOL_ANNOTATION))
        .is_some_and(|protocol| protocol.eq_ignore_ascii_case("UDP"));

    detect(StreamProtocol::Udp, declared, service_name, UDP_KEYWORDS)
}

/// Returns `true` if [`detect_tcp_backend`] finds anything, heuristic or not.
pub fn is_tcp_backend(ingress: &Ingress, service_name: &str) -> bool {
    detect_tcp_backend(ingress, service_name).is_some()
}

/// Returns `true` if [`detect_udp_backend`] finds anything, heuristic or not.
pub fn is_udp_backend(ingress: &Ingress, service_name: &str) -> bool {
    detect_udp_backend(ingress, service_name).is_some()
}

fn detect(
    protocol: StreamProtocol,
    declared: bool,
    service_name: &str,
    keywords: &[&str],
) -> Option<BackendDetection> {
    let source = if declared {
        DetectionSource::Annotation
    } else {
        let service_name = service_name.to_lowercase();
        keywords
            .iter()
            .any(|keyword| service_name.contains(keyword))
            .then_some(DetectionSource::NameHeuristic)?
    };

    Some(BackendDetection { protocol, source })
}

fn l4_spec(namespace: &str, gateway_name: &str, backend: BackendRef) -> L4RouteSpec {
    L4RouteSpec {
        parent_refs: vec![ParentReference::gateway(gateway_name, namespace)],
        rules: vec![L4RouteRule {
            backend_refs: vec![backend],
        }],
    }
}

/// Creates a TCPRoute in `namespace` attached to the Gateway `gateway_name`.
pub fn create_tcp_route(
    name: &str,
    namespace: &str,
    gateway_name: &str,
    backend: BackendRef,
) -> TcpRoute {
    TcpRoute::new(
        ObjectMetaBuilder::new().name(name).namespace(namespace).build(),
        l4_spec(namespace, gateway_name, backend),
    )
}

/// Creates a UDPRoute in `namespace` attached to the Gateway `gateway_name`.
pub fn create_udp_route(
    name: &str,
    namespace: &str,
    gateway_name: &str,
    backend: BackendRef,
) -> UdpRoute {
    UdpRoute::new(
        ObjectMetaBuilder::new().name(name).namespace(namespace).build(),
        l4_spec(namespace, gateway_name, backend),
    )
}

/// Creates a listener only accepting TCPRoutes from the Gateway's namespace.
///
/// The listener is named `tcp-{port}`, or `tcp-{host}-{port}` if a hostname
/// is given.
pub fn create_tcp_listener(hostname: Option<&str>, port: u16) -> Listener {
    let name = match hostname {
        Some(hostname) => format!("tcp-{host}-{port}", host = sanitize_hostname(hostname)),
        None => format!("tcp-{port}"),
    };

    Listener {
        name,
        hostname: hostname.map(ToOwned::to_owned),
        port,
        protocol: ListenerProtocol::Tcp,
        tls: None,
        allowed_routes: Some(AllowedRoutes::same_namespace_of_kind(TCP_ROUTE_KIND)),
    }
}

/// Creates a listener named `udp-{port}` only accepting UDPRoutes from the
/// Gateway's namespace.
pub fn create_udp_listener(port: u16) -> Listener {
    Listener {
        name: format!("udp-{port}"),
        hostname: None,
        port,
        protocol: ListenerProtocol::Udp,
        tls: None,
        allowed_routes: Some(AllowedRoutes::same_namespace_of_kind(UDP_ROUTE_KIND)),
    }
}

/// A port exposed through the nginx `tcp-services` or `udp-services`
/// annotation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StreamService {
    /// The port exposed by the load balancer.
    pub port: u16,
    pub namespace: String,
    pub service: String,
    pub service_port: u16,
}

impl StreamService {
    /// References the target service, qualified with its namespace only if it
    /// differs from `route_namespace`.
    pub fn backend_ref(&self, route_namespace: &str) -> BackendRef {
        let backend = BackendRef::service(&self.service, self.service_port);
        if self.namespace == route_namespace {
            backend
        } else {
            backend.with_namespace(&self.namespace)
        }
    }
}

impl fmt::Display for StreamService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{port}: {namespace}/{service}:{service_port}",
            port = self.port,
            namespace = self.namespace,
            service = self.service,
            service_port = self.service_port
        )
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StreamServices {
    pub tcp: Vec<StreamService>,
    pub udp: Vec<StreamService>,
}

impl StreamServices {
    pub fn is_empty(&self) -> bool {
        self.tcp.is_empty() && self.udp.is_empty()
    }
}

/// Reads the stream services declared by the nginx `tcp-services` and
/// `udp-services` annotations.
///
/// Both take a comma separated list of `port: namespace/service:port`
/// entries. Malformed entries are skipped.
pub fn detect_tcp_udp_services(ingress: &Ingress) -> StreamServices {
    let Some(annotations) = &ingress.metadata.annotations else {
        return StreamServices::default();
    };

    let parse = |key: &str| {
        annotations
            .get(key)
            .map(|value| parse_stream_services(value))
            .unwrap_or_default()
    };

    StreamServices {
        tcp: parse(TCP_SERVICES_ANNOTATION),
        udp: parse(UDP_SERVICES_ANNOTATION),
    }
}

fn parse_stream_services(value: &str) -> Vec<StreamService> {
    value
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .filter_map(|entry| {
            let service = parse_stream_service(entry);
            if service.is_none() {
                debug!(entry, "skipping malformed stream service entry");
            }
            service
        })
        .collect()
}

fn parse_stream_service(entry: &str) -> Option<StreamService> {
    let (port, target) = entry.split_once(':')?;
    let (namespace, target) = target.trim().split_once('/')?;
    let (service, service_port) = target.rsplit_once(':')?;

    if namespace.is_empty() || service.is_empty() {
        return None;
    }

    Some(StreamService {
        port: port.trim().parse().ok()?,
        namespace: namespace.to_owned(),
        service: service.to_owned(),
        service_port: service_port.trim().parse().ok()?,
    })
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use rstest::rstest;

    use super::*;
    use crate::resources::{FromNamespaces, RouteGroupKind, RouteNamespaces};

    fn ingress(annotations: &[(&str, &str)]) -> Ingress {
        let mut ingress = Ingress::default();
        if !annotations.is_empty() {
            ingress.metadata.annotations = Some(
                annotations
                    .iter()
                    .map(|(key, value)| ((*key).to_owned(), (*value).to_owned()))
                    .collect::<BTreeMap<_, _>>(),
            );
        }
        ingress
    }

    #[rstest]
    #[case("mysql-primary", true)]
    #[case("Redis-Cache", true)]
    #[case("web-frontend", false)]
    #[case("", false)]
    fn tcp_name_heuristic(#[case] service_name: &str, #[case] expected: bool) {
        assert_eq!(is_tcp_backend(&ingress(&[]), service_name), expected);
    }

    #[test]
    fn name_heuristic_is_not_authoritative() {
        let detection =
            detect_tcp_backend(&ingress(&[]), "mysql-primary").expect("mysql is detected");

        assert_eq!(detection.protocol, StreamProtocol::Tcp);
        assert_eq!(detection.source, DetectionSource::NameHeuristic);
        assert!(!detection.is_authoritative());
    }

    #[rstest]
    #[case(&[("nginx.ingress.kubernetes.io/backend-protocol", "tcp")])]
    #[case(&[("nginx.ingress.kubernetes.io/ssl-passthrough", "true")])]
    fn tcp_annotations_are_authoritative(#[case] annotations: &[(&str, &str)]) {
        let detection =
            detect_tcp_backend(&ingress(annotations), "web").expect("annotation is detected");

        assert!(detection.is_authoritative());
    }

    #[test]
    fn annotation_wins_over_name_for_source() {
        let detection = detect_tcp_backend(
            &ingress(&[("nginx.ingress.kubernetes.io/backend-protocol", "TCP")]),
            "postgres",
        )
        .expect("annotation is detected");

        assert_eq!(detection.source, DetectionSource::Annotation);
    }

    #[rstest]
    #[case(&[], "coredns", Some(DetectionSource::NameHeuristic))]
    #[case(&[("nginx.ingress.kubernetes.io/backend-protocol", "UDP")], "web", Some(DetectionSource::Annotation))]
    #[case(&[("nginx.ingress.kubernetes.io/ssl-passthrough", "true")], "web", None)]
    #[case(&[], "web-frontend", None)]
    fn udp_detection(
        #[case] annotations: &[(&str, &str)],
        #[case] service_name: &str,
        #[case] expected: Option<DetectionSource>,
    ) {
        let detection = detect_udp_backend(&ingress(annotations), service_name);

        assert_eq!(detection.map(|detection| detection.source), expected);
        assert_eq!(
            is_udp_backend(&ingress(annotations), service_name),
            expected.is_some()
        );
    }

    #[rstest]
    #[case(None, 3306, "tcp-3306")]
    #[case(Some("db.example.com"), 5432, "tcp-db-example-com-5432")]
    #[case(Some("*.example.com"), 6379, "tcp-wildcard-example-com-6379")]
    fn tcp_listener_names(
        #[case] hostname: Option<&str>,
        #[case] port: u16,
        #[case] expected: &str,
    ) {
        let listener = create_tcp_listener(hostname, port);

        assert_eq!(listener.name, expected);
        assert_eq!(listener.hostname.as_deref(), hostname);
        assert_eq!(listener.protocol, ListenerProtocol::Tcp);
    }

    #[test]
    fn udp_listener_only_allows_udp_routes() {
        let listener = create_udp_listener(53);

        assert_eq!(listener.name, "udp-53");
        assert_eq!(
            listener.allowed_routes,
            Some(AllowedRoutes {
                namespaces: Some(RouteNamespaces {
                    from: FromNamespaces::Same,
                }),
                kinds: vec![RouteGroupKind {
                    group: None,
                    kind: "UDPRoute".to_owned(),
                }],
            })
        );
    }

    #[test]
    fn tcp_route_references_gateway_and_backend() {
        let route = create_tcp_route("db", "apps", "gw", BackendRef::service("mysql", 3306));

        assert_eq!(route.api_version, "gateway.networking.k8s.io/v1alpha2");
        assert_eq!(route.kind, "TCPRoute");
        assert_eq!(
            route.spec.parent_refs,
            vec![ParentReference::gateway("gw", "apps")]
        );
        assert_eq!(
            route.spec.rules[0].backend_refs,
            vec![BackendRef::service("mysql", 3306)]
        );
    }

    #[test]
    fn udp_route_kind() {
        let route = create_udp_route("dns", "apps", "gw", BackendRef::service("coredns", 53));
        assert_eq!(route.kind, "UDPRoute");
    }

    #[test]
    fn stream_services_are_parsed() {
        let services = detect_tcp_udp_services(&ingress(&[
            (
                "nginx.ingress.kubernetes.io/tcp-services",
                "3306: db/mysql:3306, 6379: cache/redis:6380",
            ),
            ("nginx.ingress.kubernetes.io/udp-services", "53: kube-system/coredns:53"),
        ]));

        assert_eq!(
            services.tcp,
            vec![
                StreamService {
                    port: 3306,
                    namespace: "db".to_owned(),
                    service: "mysql".to_owned(),
                    service_port: 3306,
                },
                StreamService {
                    port: 6379,
                    namespace: "cache".to_owned(),
                    service: "redis".to_owned(),
                    service_port: 6380,
                },
            ]
        );
        assert_eq!(services.udp.len(), 1);
        assert_eq!(services.udp[0].to_string(), "53: kube-system/coredns:53");
    }

    #[rstest]
    #[case("3306 db/mysql:3306")]
    #[case("3306: mysql:3306")]
    #[case("3306: db/mysql")]
    #[case("mysql: db/mysql:3306")]
    #[case("3306: db/mysql:http")]
    #[case("3306: /mysql:3306")]
    fn malformed_stream_services_are_skipped(#[case] value: &str) {
        let services =
            detect_tcp_udp_services(&ingress(&[("nginx.ingress.kubernetes.io/tcp-services", value)]));
        assert!(services.is_empty());
    }

    #[test]
    fn backend_ref_is_namespaced_across_namespaces() {
        let service = StreamService {
            port: 3306,
            namespace: "db".to_owned(),
            service: "mysql".to_owned(),
            service_port: 3306,
        };

        assert_eq!(service.backend_ref("db").namespace, None);
        assert_eq!(service.backend_ref("apps").namespace.as_deref(), Some("db"));
    }
}
