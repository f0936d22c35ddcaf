//! End to end conversion of YAML streams.
//!
//! [`convert_documents`] turns every Ingress of a multi-document YAML stream
//! into Gateway API resources. Annotations are interpreted and folded into the
//! structural conversion, the provider preset is applied, gRPC and stream
//! backends are specialised and ReferenceGrants are generated. Each step is
//! described on [`convert_documents`].
//!
//! [`reverse_documents`] goes the other way.

use snafu::{OptionExt, ResultExt, Snafu, ensure};
use tracing::{debug, info};

use crate::{
    annotations::{
        ParsedAnnotations, UnsupportedAnnotation, annotation_warnings, parse_all_annotations,
    },
    converter::{
        self, ConvertedResources, DEFAULT_GATEWAY_NAME, INGRESS_KIND, convert_ingress_to_gateway,
    },
    protocol::{
        StreamServices, create_tcp_listener, create_tcp_route, create_udp_listener,
        create_udp_route, detect_tcp_udp_services, into_grpc_routes, is_grpc_backend,
    },
    provider::{Provider, apply_provider_defaults},
    reference_grant::generate_reference_grants,
    resources::{
        Gateway, GrpcRoute, HttpRoute, Ingress, ObjectMetaExt, ReferenceGrant, Route, TcpRoute,
        UdpRoute,
    },
    reverse::{self, convert_gateway_to_ingress, parse_gateway_resources},
    validation::{ValidationIssue, validate_conversion_output, validate_ingress},
    yaml::{self, DocumentWriter},
};

type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("failed to parse input documents"))]
    ParseDocuments { source: yaml::Error },

    #[snafu(display("failed to read Ingress document #{index}"))]
    DeserializeIngress { source: yaml::Error, index: usize },

    #[snafu(display("no Ingress resources found in input"))]
    NoIngressFound,

    #[snafu(display("Ingress {name:?} is invalid: {issues}"))]
    InvalidInput { name: String, issues: String },

    #[snafu(display("failed to convert Ingress {name:?}"))]
    Convert {
        source: converter::Error,
        name: String,
    },

    #[snafu(display("conversion of Ingress {name:?} produced invalid resources: {issues}"))]
    InvalidOutput { name: String, issues: String },

    #[snafu(display("failed to serialize converted resources"))]
    SerializeOutput { source: yaml::Error },

    #[snafu(display("failed to read Gateway API resources"))]
    ReadGatewayResources { source: reverse::Error },

    #[snafu(display("no Gateway resource found in input"))]
    NoGateway,
}

/// Knobs for [`convert_documents`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ConversionOptions {
    /// Applies the preset of this provider to every Gateway.
    pub provider: Option<Provider>,

    /// Converts HTTPRoutes to GRPCRoutes if the annotations point at a gRPC backend.
    pub detect_grpc: bool,

    /// Generates TCP and UDP listeners and routes for nginx stream services.
    pub detect_stream_services: bool,

    /// Validates every Ingress and the resources converted from it.
    pub validate: bool,
}

impl Default for ConversionOptions {
    fn default() -> Self {
        Self {
            provider: None,
            detect_grpc: false,
            detect_stream_services: true,
            validate: true,
        }
    }
}

/// The resources converted from a single Ingress.
#[derive(Clone, Debug, PartialEq)]
pub struct ConversionOutput {
    pub gateway: Gateway,
    pub httproutes: Vec<HttpRoute>,
    pub grpcroutes: Vec<GrpcRoute>,
    pub tcproutes: Vec<TcpRoute>,
    pub udproutes: Vec<UdpRoute>,
    pub reference_grants: Vec<ReferenceGrant>,
}

impl ConversionOutput {
    /// All routes, regardless of their kind.
    pub fn routes(&self) -> Vec<&dyn Route> {
        let httproutes = self.httproutes.iter().map(|route| route as &dyn Route);
        let grpcroutes = self.grpcroutes.iter().map(|route| route as &dyn Route);
        let tcproutes = self.tcproutes.iter().map(|route| route as &dyn Route);
        let udproutes = self.udproutes.iter().map(|route| route as &dyn Route);

        httproutes
            .chain(grpcroutes)
            .chain(tcproutes)
            .chain(udproutes)
            .collect()
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ConversionReport {
    /// One entry per converted Ingress, in input order.
    pub outputs: Vec<ConversionOutput>,

    /// Advisory findings, including one `Unsupported annotation: k=v` line per
    /// unsupported annotation.
    pub warnings: Vec<String>,
    pub unsupported: Vec<UnsupportedAnnotation>,
}

impl ConversionReport {
    /// Serializes every resource as its own YAML document.
    ///
    /// Per Ingress, the Gateway comes first, followed by the HTTPRoutes,
    /// GRPCRoutes, TCPRoutes, UDPRoutes and ReferenceGrants.
    pub fn to_yaml(&self) -> Result<String> {
        let mut writer = DocumentWriter::new();

        for output in &self.outputs {
            writer
                .push(&output.gateway)
                .and_then(|writer| writer.extend(&output.httproutes))
                .and_then(|writer| writer.extend(&output.grpcroutes))
                .and_then(|writer| writer.extend(&output.tcproutes))
                .and_then(|writer| writer.extend(&output.udproutes))
                .and_then(|writer| writer.extend(&output.reference_grants))
                .context(SerializeOutputSnafu)?;
        }

        writer.finish().context(SerializeOutputSnafu)
    }
}

fn format_issues(issues: &[ValidationIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Converts every Ingress in the YAML stream `input`.
///
/// Empty documents and documents of other kinds are skipped. Each Ingress
/// goes through these steps:
///
/// 1. Validation, if enabled. Errors abort with [`Error::InvalidInput`].
/// 2. Interpretation of the nginx, Traefik, Istio, ALB and GCE annotations.
/// 3. Structural conversion into a Gateway and HTTPRoutes.
/// 4. Annotation filters are attached to every HTTPRoute rule, annotation
///    addresses and gateway class are set on the Gateway.
/// 5. The provider preset is applied, if a provider is configured.
/// 6. All HTTPRoutes become GRPCRoutes if gRPC detection is enabled and the
///    backend is gRPC.
/// 7. nginx stream services become TCP and UDP listeners and routes.
/// 8. ReferenceGrants are generated for cross-namespace references.
/// 9. The output is validated, if enabled. Errors abort with
///    [`Error::InvalidOutput`].
pub fn convert_documents(input: &str, options: &ConversionOptions) -> Result<ConversionReport> {
    let mut report = ConversionReport::default();

    for (index, document) in yaml::parse_documents(input)
        .context(ParseDocumentsSnafu)?
        .into_iter()
        .enumerate()
    {
        if document.is_null() {
            debug!(index, "skipping empty document");
            continue;
        }

        let kind = yaml::document_kind(&document);
        if kind != INGRESS_KIND {
            info!(index, kind, "skipping non-Ingress document");
            continue;
        }

        if options.validate {
            let result = validate_ingress(&document);
            ensure!(
                result.is_valid(),
                InvalidInputSnafu {
                    name: document_name(&document),
                    issues: format_issues(&result.errors),
                }
            );
            report
                .warnings
                .extend(result.warnings.iter().map(ToString::to_string));
        }

        let ingress: Ingress =
            yaml::from_value(document).context(DeserializeIngressSnafu { index })?;
        convert_ingress(&ingress, options, &mut report)?;
    }

    ensure!(!report.outputs.is_empty(), NoIngressFoundSnafu);
    Ok(report)
}

fn document_name(document: &serde_yaml::Value) -> String {
    document
        .get("metadata")
        .and_then(|metadata| metadata.get("name"))
        .and_then(serde_yaml::Value::as_str)
        .unwrap_or_default()
        .to_owned()
}

fn convert_ingress(
    ingress: &Ingress,
    options: &ConversionOptions,
    report: &mut ConversionReport,
) -> Result<()> {
    let name = ingress.metadata.name_or(DEFAULT_GATEWAY_NAME);
    debug!(ingress = name, "converting Ingress");

    let annotations = ingress.metadata.annotations_or_empty();
    let parsed = parse_all_annotations(&annotations);

    let ConvertedResources {
        mut gateway,
        mut httproutes,
    } = convert_ingress_to_gateway(ingress).context(ConvertSnafu { name })?;

    apply_annotations(&parsed, &mut gateway, &mut httproutes);

    if let Some(provider) = options.provider {
        gateway = apply_provider_defaults(gateway, provider);
    }

    let config = &parsed.gateway_config;
    let wants_grpc = is_grpc_backend(&annotations, config.backend_protocol.as_deref())
        || config.use_grpc_route == Some(true);
    let grpcroutes = if options.detect_grpc && wants_grpc {
        debug!(ingress = name, "backend speaks gRPC, converting routes to GRPCRoutes");
        let grpcroutes = into_grpc_routes(&httproutes);
        httproutes.clear();
        grpcroutes
    } else {
        Vec::new()
    };

    let mut output = ConversionOutput {
        gateway,
        httproutes,
        grpcroutes,
        tcproutes: Vec::new(),
        udproutes: Vec::new(),
        reference_grants: Vec::new(),
    };

    if options.detect_stream_services {
        add_stream_services(&mut output, &detect_tcp_udp_services(ingress));
    }

    let reference_grants = generate_reference_grants(&output.gateway, &output.routes());
    output.reference_grants = reference_grants;

    if options.validate {
        let result = validate_conversion_output(
            Some(&output.gateway),
            &output.httproutes,
            &output.grpcroutes,
        );
        ensure!(
            result.is_valid(),
            InvalidOutputSnafu {
                name,
                issues: format_issues(&result.errors),
            }
        );
        report
            .warnings
            .extend(result.warnings.iter().map(ToString::to_string));
    }

    if let Some(provider) = options.provider {
        report.warnings.extend(capability_warnings(provider, &output));
    }

    report.warnings.extend(annotation_warnings(&parsed));
    report.unsupported.extend(parsed.unsupported);
    report.outputs.push(output);

    Ok(())
}

/// Attaches the annotation filters to every HTTPRoute rule and applies the
/// Gateway level settings.
fn apply_annotations(
    parsed: &ParsedAnnotations,
    gateway: &mut Gateway,
    httproutes: &mut [HttpRoute],
) {
    if !parsed.filters.is_empty() {
        for rule in httproutes
            .iter_mut()
            .flat_map(|route| &mut route.spec.rules)
        {
            rule.filters.extend(parsed.filters.iter().cloned());
        }
    }

    let config = &parsed.gateway_config;
    if let Some(addresses) = &config.addresses {
        gateway.spec.addresses.clone_from(addresses);
    }
    if let Some(gateway_class_name) = &config.gateway_class_name {
        gateway.spec.gateway_class_name.clone_from(gateway_class_name);
    }
}

fn add_stream_services(output: &mut ConversionOutput, services: &StreamServices) {
    let gateway_name = output.gateway.metadata.name_or(DEFAULT_GATEWAY_NAME).to_owned();
    let namespace = output.gateway.metadata.namespace_or_default().to_owned();

    for service in &services.tcp {
        debug!(%service, "adding TCP stream service");
        output
            .gateway
            .spec
            .listeners
            .push(create_tcp_listener(None, service.port));
        output.tcproutes.push(create_tcp_route(
            &format!("{gateway_name}-tcp-{port}", port = service.port),
            &namespace,
            &gateway_name,
            service.backend_ref(&namespace),
        ));
    }

    for service in &services.udp {
        debug!(%service, "adding UDP stream service");
        output
            .gateway
            .spec
            .listeners
            .push(create_udp_listener(service.port));
        output.udproutes.push(create_udp_route(
            &format!("{gateway_name}-udp-{port}", port = service.port),
            &namespace,
            &gateway_name,
            service.backend_ref(&namespace),
        ));
    }
}

fn capability_warnings(provider: Provider, output: &ConversionOutput) -> Vec<String> {
    let preset = provider.preset();
    let mut warnings = Vec::new();

    if !preset.supports_grpc && !output.grpcroutes.is_empty() {
        warnings.push(format!(
            "{name} does not support GRPCRoute",
            name = preset.display_name
        ));
    }
    if !preset.supports_tcp && !(output.tcproutes.is_empty() && output.udproutes.is_empty()) {
        warnings.push(format!(
            "{name} does not support TCPRoute or UDPRoute",
            name = preset.display_name
        ));
    }

    warnings
}

/// Converts the Gateway API resources in the YAML stream `input` back into an
/// Ingress.
pub fn reverse_documents(input: &str) -> Result<Ingress> {
    let (gateway, httproutes) =
        parse_gateway_resources(input).context(ReadGatewayResourcesSnafu)?;
    let gateway = gateway.context(NoGatewaySnafu)?;

    Ok(convert_gateway_to_ingress(&gateway, &httproutes))
}

#[cfg(test)]
mod tests {
    use indoc::indoc;

    use super::*;
    use crate::resources::{FromNamespaces, HttpRouteFilter, ListenerProtocol};

    const NGINX_INGRESS: &str = indoc! {"
        apiVersion: networking.k8s.io/v1
        kind: Ingress
        metadata:
          name: shop
          namespace: web
          annotations:
            nginx.ingress.kubernetes.io/ssl-redirect: \"true\"
            nginx.ingress.kubernetes.io/limit-rps: \"10\"
            nginx.ingress.kubernetes.io/unknown-thing: \"on\"
        spec:
          ingressClassName: nginx
          rules:
            - host: shop.example.com
              http:
                paths:
                  - path: /
                    pathType: Prefix
                    backend:
                      service:
                        name: storefront
                        port:
                          number: 8080
    "};

    #[test]
    fn annotations_are_folded_into_routes() {
        let report =
            convert_documents(NGINX_INGRESS, &ConversionOptions::default()).expect("converts");

        assert_eq!(report.outputs.len(), 1);
        let output = &report.outputs[0];
        assert_eq!(output.gateway.spec.gateway_class_name, "nginx");
        assert_eq!(
            output.httproutes[0].spec.rules[0].filters,
            vec![HttpRouteFilter::https_redirect()]
        );
        assert_eq!(report.unsupported.len(), 1);
        assert_eq!(
            report.unsupported[0].annotation,
            "nginx.ingress.kubernetes.io/unknown-thing"
        );
        assert!(report.warnings.contains(
            &"Unsupported annotation: nginx.ingress.kubernetes.io/unknown-thing=on".to_owned()
        ));
    }

    #[test]
    fn provider_preset_is_applied() {
        let options = ConversionOptions {
            provider: Some(Provider::Contour),
            ..ConversionOptions::default()
        };
        let report = convert_documents(NGINX_INGRESS, &options).expect("converts");
        let gateway = &report.outputs[0].gateway;

        assert_eq!(gateway.spec.gateway_class_name, "contour");
        // Listeners keep the allowedRoutes set by the conversion.
        for listener in &gateway.spec.listeners {
            let from = listener
                .allowed_routes
                .as_ref()
                .and_then(|routes| routes.namespaces.as_ref())
                .map(|namespaces| namespaces.from);
            assert_eq!(from, Some(FromNamespaces::Same));
        }
    }

    #[test]
    fn gce_class_annotation_replaces_gateway_class() {
        let report = convert_documents(
            indoc! {"
                apiVersion: networking.k8s.io/v1
                kind: Ingress
                metadata:
                  name: internal
                  annotations:
                    kubernetes.io/ingress.class: gce-internal
                    kubernetes.io/ingress.regional-static-ip-name: internal-ip
                spec:
                  defaultBackend:
                    service:
                      name: web
                      port:
                        number: 80
            "},
            &ConversionOptions::default(),
        )
        .expect("converts");
        let gateway = &report.outputs[0].gateway;

        assert_eq!(gateway.spec.gateway_class_name, "gke-l7-rilb");
        assert_eq!(gateway.spec.addresses.len(), 1);
        assert_eq!(gateway.spec.addresses[0].value, "internal-ip");
    }

    #[test]
    fn grpc_backends_get_grpc_routes() {
        let input = indoc! {"
            apiVersion: networking.k8s.io/v1
            kind: Ingress
            metadata:
              name: greeter
              annotations:
                nginx.ingress.kubernetes.io/backend-protocol: GRPC
            spec:
              rules:
                - host: grpc.example.com
                  http:
                    paths:
                      - path: /
                        pathType: Prefix
                        backend:
                          service:
                            name: greeter
                            port:
                              number: 50051
        "};

        let disabled = convert_documents(input, &ConversionOptions::default()).expect("converts");
        assert_eq!(disabled.outputs[0].httproutes.len(), 1);
        assert!(disabled.outputs[0].grpcroutes.is_empty());

        let options = ConversionOptions {
            provider: Some(Provider::Nginx),
            detect_grpc: true,
            ..ConversionOptions::default()
        };
        let enabled = convert_documents(input, &options).expect("converts");
        assert!(enabled.outputs[0].httproutes.is_empty());
        assert_eq!(enabled.outputs[0].grpcroutes.len(), 1);
        assert!(
            enabled
                .warnings
                .contains(&"NGINX Gateway Fabric does not support GRPCRoute".to_owned())
        );
    }

    #[test]
    fn stream_services_become_l4_resources() {
        let report = convert_documents(
            indoc! {"
                apiVersion: networking.k8s.io/v1
                kind: Ingress
                metadata:
                  name: edge
                  namespace: apps
                  annotations:
                    nginx.ingress.kubernetes.io/tcp-services: \"3306: db/mysql:3306\"
                    nginx.ingress.kubernetes.io/udp-services: \"53: apps/coredns:53\"
                spec:
                  rules:
                    - host: edge.example.com
                      http:
                        paths:
                          - path: /
                            backend:
                              service:
                                name: web
                                port:
                                  number: 80
            "},
            &ConversionOptions::default(),
        )
        .expect("converts");
        let output = &report.outputs[0];

        let protocols: Vec<_> = output
            .gateway
            .spec
            .listeners
            .iter()
            .map(|listener| listener.protocol)
            .collect();
        assert_eq!(
            protocols,
            vec![
                ListenerProtocol::Http,
                ListenerProtocol::Tcp,
                ListenerProtocol::Udp
            ]
        );
        assert_eq!(output.tcproutes[0].metadata.name.as_deref(), Some("edge-tcp-3306"));
        assert_eq!(output.udproutes[0].metadata.name.as_deref(), Some("edge-udp-53"));

        assert_eq!(output.reference_grants.len(), 1);
        let grant = &output.reference_grants[0];
        assert_eq!(grant.metadata.namespace.as_deref(), Some("db"));
        assert_eq!(grant.spec.from[0].kind, "TCPRoute");
        assert_eq!(grant.spec.to[0].name.as_deref(), Some("mysql"));
    }

    #[test]
    fn other_documents_are_skipped() {
        let input = format!(
            "{NGINX_INGRESS}---\napiVersion: v1\nkind: Service\nmetadata:\n  name: web\n---\n"
        );
        let report = convert_documents(&input, &ConversionOptions::default()).expect("converts");
        assert_eq!(report.outputs.len(), 1);
    }

    #[test]
    fn input_without_ingress_fails() {
        let error = convert_documents("kind: Service", &ConversionOptions::default())
            .expect_err("no Ingress in input");
        assert!(matches!(error, Error::NoIngressFound));
    }

    #[test]
    fn invalid_input_fails_validation() {
        let input = indoc! {"
            apiVersion: networking.k8s.io/v1
            kind: Ingress
            metadata:
              namespace: web
            spec:
              rules:
                - http:
                    paths:
                      - path: /
        "};

        let error = convert_documents(input, &ConversionOptions::default())
            .expect_err("Ingress is invalid");
        assert!(matches!(error, Error::InvalidInput { .. }));

        let options = ConversionOptions {
            validate: false,
            ..ConversionOptions::default()
        };
        let report = convert_documents(input, &options).expect("converts without validation");
        assert_eq!(
            report.outputs[0].gateway.metadata.name.as_deref(),
            Some("converted-gateway")
        );
    }

    #[test]
    fn report_serializes_all_resources() {
        let report =
            convert_documents(NGINX_INGRESS, &ConversionOptions::default()).expect("converts");
        let yaml = report.to_yaml().expect("report serializes");

        let kinds: Vec<_> = yaml
            .lines()
            .filter_map(|line| line.strip_prefix("kind: "))
            .collect();
        assert_eq!(kinds, vec!["Gateway", "HTTPRoute"]);
        assert!(yaml.starts_with("---\n"));
    }

    #[test]
    fn reverse_requires_gateway() {
        let error = reverse_documents(indoc! {"
            apiVersion: gateway.networking.k8s.io/v1
            kind: HTTPRoute
            metadata:
              name: web
        "})
        .expect_err("no Gateway in input");
        assert!(matches!(error, Error::NoGateway));
    }
}
