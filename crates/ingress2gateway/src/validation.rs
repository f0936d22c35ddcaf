//! Structural validation of Ingress and Gateway API documents.
//!
//! Only the presence and rough shape of fields is checked, there is no schema
//! validation. The checks run on untyped [`Value`]s, so that a missing field
//! is distinguishable from a defaulted one. Problems are reported as
//! [`ValidationIssue`]s and never as errors, leaving it to the caller to
//! decide which severity is fatal.

use std::fmt;

use serde::Serialize;
use serde_yaml::Value;
use strum::Display;

use crate::{
    converter::INGRESS_KIND,
    resources::{
        GATEWAY_API_GROUP, GATEWAY_KIND, GRPC_ROUTE_KIND, Gateway, GrpcRoute, HTTP_ROUTE_KIND,
        HttpRoute, KNOWN_INGRESS_API_VERSIONS,
    },
};

const REQUIRED_FIELDS: &[&str] = &["apiVersion", "kind", "metadata", "spec"];

#[derive(Clone, Copy, Debug, Display, PartialEq, Eq)]
#[strum(serialize_all = "UPPERCASE")]
pub enum Severity {
    Error,
    Warning,
}

/// A single finding, located by a dotted path such as `spec.rules[0].http`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidationIssue {
    pub path: String,
    pub message: String,
    pub severity: Severity,
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.severity, self.path, self.message)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ValidationResult {
    pub errors: Vec<ValidationIssue>,
    pub warnings: Vec<ValidationIssue>,
}

impl ValidationResult {
    /// A result is valid if it has no errors. Warnings don't count.
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ValidationIssue {
            path: path.into(),
            message: message.into(),
            severity: Severity::Error,
        });
    }

    pub fn add_warning(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ValidationIssue {
            path: path.into(),
            message: message.into(),
            severity: Severity::Warning,
        });
    }

    /// Moves all issues of `other` into `self`, prepending `prefix` to their
    /// paths. An empty prefix keeps the paths unchanged.
    pub fn merge_prefixed(&mut self, prefix: &str, other: Self) {
        let prefixed = |mut issue: ValidationIssue| {
            if !prefix.is_empty() {
                issue.path = format!("{prefix}.{path}", path = issue.path);
            }
            issue
        };

        self.errors.extend(other.errors.into_iter().map(prefixed));
        self.warnings.extend(other.warnings.into_iter().map(prefixed));
    }

    /// All issues, errors first.
    pub fn issues(&self) -> impl Iterator<Item = &ValidationIssue> {
        self.errors.iter().chain(&self.warnings)
    }
}

/// Whether a value counts as set. Null, `false`, zero and empty strings,
/// lists and maps don't.
fn is_set(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(value)) => *value,
        Some(Value::Number(number)) => number.as_f64().is_some_and(|number| number != 0.0),
        Some(Value::String(value)) => !value.is_empty(),
        Some(Value::Sequence(values)) => !values.is_empty(),
        Some(Value::Mapping(values)) => !values.is_empty(),
        Some(Value::Tagged(_)) => true,
    }
}

fn str_field<'a>(document: &'a Value, key: &str) -> &'a str {
    document.get(key).and_then(Value::as_str).unwrap_or_default()
}

fn sequence_field<'a>(document: &'a Value, key: &str) -> &'a [Value] {
    document
        .get(key)
        .and_then(Value::as_sequence)
        .map_or(&[], Vec::as_slice)
}

fn check_required_fields(document: &Value, result: &mut ValidationResult) {
    for field in REQUIRED_FIELDS {
        if document.get(field).is_none() {
            result.add_error(*field, format!("Missing required field: {field}"));
        }
    }
}

fn check_kind(document: &Value, expected: &str, result: &mut ValidationResult) {
    let kind = str_field(document, "kind");
    if kind != expected {
        result.add_error("kind", format!("Expected '{expected}', got '{kind}'"));
    }
}

/// Validates an Ingress document.
pub fn validate_ingress(ingress: &Value) -> ValidationResult {
    let mut result = ValidationResult::default();

    if !is_set(Some(ingress)) {
        result.add_error("", "Empty ingress object");
        return result;
    }

    check_required_fields(ingress, &mut result);

    let api_version = str_field(ingress, "apiVersion");
    if !KNOWN_INGRESS_API_VERSIONS.contains(&api_version) {
        result.add_warning("apiVersion", format!("Unexpected apiVersion: {api_version}"));
    }

    check_kind(ingress, INGRESS_KIND, &mut result);

    let name = ingress.get("metadata").and_then(|metadata| metadata.get("name"));
    if !is_set(name) {
        result.add_error("metadata.name", "Missing required field: name");
    }

    let Some(spec) = ingress.get("spec").filter(|spec| is_set(Some(*spec))) else {
        result.add_warning("spec", "Empty spec");
        return result;
    };

    if !is_set(spec.get("rules")) && !is_set(spec.get("defaultBackend")) {
        result.add_warning("spec", "No rules or defaultBackend defined");
    }

    for (index, rule) in sequence_field(spec, "rules").iter().enumerate() {
        validate_ingress_rule(rule, &format!("spec.rules[{index}]"), &mut result);
    }

    for (index, tls) in sequence_field(spec, "tls").iter().enumerate() {
        let path = format!("spec.tls[{index}]");
        if !is_set(tls.get("hosts")) {
            result.add_warning(&path, "TLS configuration has no hosts");
        }
        if !is_set(tls.get("secretName")) {
            result.add_warning(&path, "TLS configuration has no secretName");
        }
    }

    result
}

fn validate_ingress_rule(rule: &Value, path: &str, result: &mut ValidationResult) {
    let Some(http) = rule.get("http").filter(|http| is_set(Some(*http))) else {
        result.add_warning(path, "Rule has no http configuration");
        return;
    };

    let paths = sequence_field(http, "paths");
    if paths.is_empty() {
        result.add_warning(format!("{path}.http"), "No paths defined");
    }

    for (index, entry) in paths.iter().enumerate() {
        let entry_path = format!("{path}.http.paths[{index}]");
        let Some(backend) = entry.get("backend").filter(|backend| is_set(Some(*backend))) else {
            result.add_error(entry_path, "Missing backend");
            continue;
        };

        // The legacy layout names the service directly on the backend.
        let service_name = match backend.get("service") {
            Some(service) if is_set(Some(service)) => service.get("name"),
            _ => backend.get("serviceName"),
        };
        if !is_set(service_name) {
            result.add_error(format!("{entry_path}.backend"), "Missing service name");
        }
    }
}

/// Validates a Gateway document.
pub fn validate_gateway(gateway: &Value) -> ValidationResult {
    let mut result = ValidationResult::default();

    if !is_set(Some(gateway)) {
        result.add_error("", "Empty gateway object");
        return result;
    }

    check_required_fields(gateway, &mut result);

    let api_version = str_field(gateway, "apiVersion");
    if !api_version.starts_with(&format!("{GATEWAY_API_GROUP}/")) {
        result.add_warning("apiVersion", format!("Unexpected apiVersion: {api_version}"));
    }

    check_kind(gateway, GATEWAY_KIND, &mut result);

    let spec = gateway.get("spec").unwrap_or(&Value::Null);
    if !is_set(spec.get("gatewayClassName")) {
        result.add_error("spec.gatewayClassName", "Missing gatewayClassName");
    }

    let listeners = sequence_field(spec, "listeners");
    if listeners.is_empty() {
        result.add_warning("spec.listeners", "No listeners defined");
    }

    for (index, listener) in listeners.iter().enumerate() {
        for field in ["name", "port", "protocol"] {
            if !is_set(listener.get(field)) {
                result.add_error(
                    format!("spec.listeners[{index}].{field}"),
                    format!("Missing listener {field}"),
                );
            }
        }
    }

    result
}

/// Validates an HTTPRoute document.
pub fn validate_httproute(route: &Value) -> ValidationResult {
    let mut result = ValidationResult::default();

    if !is_set(Some(route)) {
        result.add_error("", "Empty HTTPRoute object");
        return result;
    }

    check_required_fields(route, &mut result);
    check_kind(route, HTTP_ROUTE_KIND, &mut result);

    let spec = route.get("spec").unwrap_or(&Value::Null);
    if !is_set(spec.get("parentRefs")) {
        result.add_error("spec.parentRefs", "Missing parentRefs");
    }

    let rules = sequence_field(spec, "rules");
    if rules.is_empty() {
        result.add_warning("spec.rules", "No rules defined");
    }

    for (index, rule) in rules.iter().enumerate() {
        if !is_set(rule.get("backendRefs")) {
            result.add_warning(format!("spec.rules[{index}]"), "No backendRefs defined");
        }
    }

    result
}

/// Validates a document of any supported kind.
///
/// Returns [`None`] for kinds without validation rules.
pub fn validate_document(document: &Value) -> Option<ValidationResult> {
    match str_field(document, "kind") {
        INGRESS_KIND => Some(validate_ingress(document)),
        GATEWAY_KIND => Some(validate_gateway(document)),
        HTTP_ROUTE_KIND => Some(validate_httproute(document)),
        _ => None,
    }
}

fn to_value<T: Serialize>(resource: &T, path: &str, result: &mut ValidationResult) -> Option<Value> {
    match serde_yaml::to_value(resource) {
        Ok(value) => Some(value),
        Err(error) => {
            result.add_error(path, format!("Could not serialize resource: {error}"));
            None
        }
    }
}

/// Validates the resources produced by a conversion.
///
/// Issues of the HTTPRoutes are prefixed with `httproutes[{index}]`. GRPCRoutes
/// are only checked for their kind.
pub fn validate_conversion_output(
    gateway: Option<&Gateway>,
    httproutes: &[HttpRoute],
    grpcroutes: &[GrpcRoute],
) -> ValidationResult {
    let mut result = ValidationResult::default();

    if let Some(gateway) = gateway
        && let Some(gateway) = to_value(gateway, "gateway", &mut result)
    {
        result.merge_prefixed("", validate_gateway(&gateway));
    }

    for (index, route) in httproutes.iter().enumerate() {
        let prefix = format!("httproutes[{index}]");
        if let Some(route) = to_value(route, &prefix, &mut result) {
            result.merge_prefixed(&prefix, validate_httproute(&route));
        }
    }

    for (index, route) in grpcroutes.iter().enumerate() {
        if route.kind != GRPC_ROUTE_KIND {
            result.add_error(
                format!("grpcroutes[{index}].kind"),
                format!("Expected '{GRPC_ROUTE_KIND}'"),
            );
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use indoc::indoc;
    use rstest::rstest;

    use super::*;
    use crate::{
        converter::convert_ingress_to_gateway,
        resources::{GrpcRouteSpec, ObjectMetaBuilder},
        yaml,
    };

    fn document(input: &str) -> Value {
        yaml::parse_document(input).expect("fixture is valid YAML")
    }

    fn messages(issues: &[ValidationIssue]) -> Vec<String> {
        issues.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn valid_ingress_has_no_issues() {
        let result = validate_ingress(&document(indoc! {"
            apiVersion: networking.k8s.io/v1
            kind: Ingress
            metadata:
              name: web
            spec:
              tls:
                - hosts: [example.com]
                  secretName: example-tls
              rules:
                - host: example.com
                  http:
                    paths:
                      - path: /
                        pathType: Prefix
                        backend:
                          service:
                            name: web
                            port:
                              number: 80
                - http:
                    paths:
                      - backend:
                          serviceName: legacy
                          servicePort: 8080
        "}));

        assert!(result.is_valid());
        assert_eq!(result.warnings, Vec::new());
    }

    #[test]
    fn ingress_issues_are_located() {
        let result = validate_ingress(&document(indoc! {"
            apiVersion: extensions/v2
            kind: Ingress
            metadata: {}
            spec:
              tls:
                - secretName: example-tls
              rules:
                - host: example.com
                - http:
                    paths:
                      - path: /
                      - backend:
                          service:
                            port:
                              number: 80
        "}));

        assert_eq!(
            messages(&result.errors),
            vec![
                "[ERROR] metadata.name: Missing required field: name",
                "[ERROR] spec.rules[1].http.paths[0]: Missing backend",
                "[ERROR] spec.rules[1].http.paths[1].backend: Missing service name",
            ]
        );
        assert_eq!(
            messages(&result.warnings),
            vec![
                "[WARNING] apiVersion: Unexpected apiVersion: extensions/v2",
                "[WARNING] spec.rules[0]: Rule has no http configuration",
                "[WARNING] spec.tls[0]: TLS configuration has no hosts",
            ]
        );
    }

    #[test]
    fn missing_fields_and_wrong_kind() {
        let result = validate_ingress(&document("kind: Service"));

        assert_eq!(
            messages(&result.errors),
            vec![
                "[ERROR] apiVersion: Missing required field: apiVersion",
                "[ERROR] metadata: Missing required field: metadata",
                "[ERROR] spec: Missing required field: spec",
                "[ERROR] kind: Expected 'Ingress', got 'Service'",
                "[ERROR] metadata.name: Missing required field: name",
            ]
        );
        assert_eq!(
            messages(&result.warnings),
            vec![
                "[WARNING] apiVersion: Unexpected apiVersion: ",
                "[WARNING] spec: Empty spec",
            ]
        );
    }

    #[rstest]
    #[case::ingress(validate_ingress, "Empty ingress object")]
    #[case::gateway(validate_gateway, "Empty gateway object")]
    #[case::httproute(validate_httproute, "Empty HTTPRoute object")]
    fn empty_documents_are_errors(
        #[case] validate: fn(&Value) -> ValidationResult,
        #[case] expected: &str,
    ) {
        let result = validate(&Value::Null);

        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].path, "");
        assert_eq!(result.errors[0].message, expected);
    }

    #[test]
    fn ingress_without_rules_warns() {
        let result = validate_ingress(&document(indoc! {"
            apiVersion: networking.k8s.io/v1
            kind: Ingress
            metadata:
              name: web
            spec:
              ingressClassName: nginx
        "}));

        assert!(result.is_valid());
        assert_eq!(
            messages(&result.warnings),
            vec!["[WARNING] spec: No rules or defaultBackend defined"]
        );
    }

    #[test]
    fn gateway_listener_fields_are_required() {
        let result = validate_gateway(&document(indoc! {"
            apiVersion: networking.k8s.io/v1
            kind: Gateway
            metadata:
              name: web
            spec:
              listeners:
                - name: http
                  port: 0
                  protocol: HTTP
                - port: 443
        "}));

        assert_eq!(
            messages(&result.errors),
            vec![
                "[ERROR] spec.gatewayClassName: Missing gatewayClassName",
                "[ERROR] spec.listeners[0].port: Missing listener port",
                "[ERROR] spec.listeners[1].name: Missing listener name",
                "[ERROR] spec.listeners[1].protocol: Missing listener protocol",
            ]
        );
        assert_eq!(
            messages(&result.warnings),
            vec!["[WARNING] apiVersion: Unexpected apiVersion: networking.k8s.io/v1"]
        );
    }

    #[test]
    fn gateway_without_listeners_warns() {
        let result = validate_gateway(&document(indoc! {"
            apiVersion: gateway.networking.k8s.io/v1
            kind: Gateway
            metadata:
              name: web
            spec:
              gatewayClassName: istio
        "}));

        assert!(result.is_valid());
        assert_eq!(
            messages(&result.warnings),
            vec!["[WARNING] spec.listeners: No listeners defined"]
        );
    }

    #[test]
    fn httproute_requires_parent_refs() {
        let result = validate_httproute(&document(indoc! {"
            apiVersion: gateway.networking.k8s.io/v1
            kind: HTTPRoute
            metadata:
              name: web
            spec:
              rules:
                - matches:
                    - path:
                        type: PathPrefix
                        value: /
        "}));

        assert_eq!(
            messages(&result.errors),
            vec!["[ERROR] spec.parentRefs: Missing parentRefs"]
        );
        assert_eq!(
            messages(&result.warnings),
            vec!["[WARNING] spec.rules[0]: No backendRefs defined"]
        );
    }

    #[rstest]
    #[case("kind: Ingress", true)]
    #[case("kind: Gateway", true)]
    #[case("kind: HTTPRoute", true)]
    #[case("kind: Service", false)]
    fn documents_are_dispatched_by_kind(#[case] input: &str, #[case] validated: bool) {
        assert_eq!(validate_document(&document(input)).is_some(), validated);
    }

    #[test]
    fn converted_output_is_valid() {
        let ingress = crate::converter::parse_ingress(indoc! {"
            apiVersion: networking.k8s.io/v1
            kind: Ingress
            metadata:
              name: web
            spec:
              rules:
                - host: example.com
                  http:
                    paths:
                      - path: /
                        pathType: Prefix
                        backend:
                          service:
                            name: web
                            port:
                              number: 80
        "})
        .expect("ingress parses");
        let converted = convert_ingress_to_gateway(&ingress).expect("ingress converts");

        let result =
            validate_conversion_output(Some(&converted.gateway), &converted.httproutes, &[]);

        assert!(result.is_valid());
        assert_eq!(result.warnings, Vec::new());
    }

    #[test]
    fn output_issues_are_prefixed() {
        let route = HttpRoute::new(
            ObjectMetaBuilder::new().name("web").build(),
            crate::resources::HttpRouteSpec::default(),
        );
        let grpc = GrpcRoute {
            kind: "HTTPRoute".to_owned(),
            ..GrpcRoute::new(ObjectMetaBuilder::new().build(), GrpcRouteSpec::default())
        };

        let result = validate_conversion_output(None, &[route], &[grpc]);

        assert_eq!(
            messages(&result.errors),
            vec![
                "[ERROR] httproutes[0].spec.parentRefs: Missing parentRefs",
                "[ERROR] grpcroutes[0].kind: Expected 'GRPCRoute'",
            ]
        );
        assert_eq!(
            messages(&result.warnings),
            vec!["[WARNING] httproutes[0].spec.rules: No rules defined"]
        );
    }

    #[test]
    fn merge_prefixed_keeps_paths_without_prefix() {
        let mut other = ValidationResult::default();
        other.add_error("kind", "Expected 'Gateway', got ''");
        other.add_warning("spec.listeners", "No listeners defined");

        let mut result = ValidationResult::default();
        result.merge_prefixed("", other.clone());
        result.merge_prefixed("gateways[1]", other);

        let paths: Vec<_> = result.issues().map(|issue| issue.path.as_str()).collect();
        assert_eq!(
            paths,
            vec![
                "kind",
                "gateways[1].kind",
                "spec.listeners",
                "gateways[1].spec.listeners"
            ]
        );
    }
}
