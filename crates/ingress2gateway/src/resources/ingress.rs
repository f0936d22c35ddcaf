//! Types modelling the `networking.k8s.io` Ingress resource.
//!
//! The types are deliberately lenient: every field defaults when missing so that
//! partially filled documents still parse, and both the current
//! (`service.name`/`service.port`) and the legacy (`serviceName`/`servicePort`)
//! backend layouts are accepted.

use k8s_openapi::apimachinery::pkg::{apis::meta::v1::ObjectMeta, util::intstr::IntOrString};
use serde::{Deserialize, Serialize};

/// The apiVersion written for Ingress resources produced by the reverse conversion.
pub const INGRESS_API_VERSION: &str = "networking.k8s.io/v1";

/// Ingress apiVersions accepted without a validation warning.
pub const KNOWN_INGRESS_API_VERSIONS: &[&str] = &[
    "networking.k8s.io/v1",
    "networking.k8s.io/v1beta1",
    "extensions/v1beta1",
];

/// The port used whenever a backend port is missing or cannot be parsed as a number.
pub const DEFAULT_BACKEND_PORT: u16 = 80;

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Ingress {
    #[serde(default)]
    pub api_version: String,

    #[serde(default)]
    pub kind: String,

    #[serde(default)]
    pub metadata: ObjectMeta,

    #[serde(default)]
    pub spec: IngressSpec,
}

impl Ingress {
    /// Returns `true` if the document carried no content at all.
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngressSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ingress_class_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_backend: Option<IngressBackend>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tls: Vec<IngressTls>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rules: Vec<IngressRule>,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngressTls {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hosts: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_name: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngressRule {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http: Option<HttpIngressRuleValue>,
}

impl IngressRule {
    /// The path entries of this rule, empty if the rule has no `http` block.
    pub fn paths(&self) -> &[HttpIngressPath] {
        self.http.as_ref().map_or(&[], |http| http.paths.as_slice())
    }
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpIngressRuleValue {
    #[serde(default)]
    pub paths: Vec<HttpIngressPath>,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpIngressPath {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path_type: Option<PathType>,

    #[serde(default)]
    pub backend: IngressBackend,
}

/// The Ingress path matching semantics.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq, Serialize, strum::Display)]
pub enum PathType {
    Exact,

    #[default]
    Prefix,

    ImplementationSpecific,

    /// Any value Kubernetes doesn't define. Treated like [`PathType::Exact`].
    #[serde(other)]
    Unknown,
}

/// A backend reference, either in the `networking.k8s.io/v1` layout
/// (`service`) or in the legacy `v1beta1` layout (`serviceName` and
/// `servicePort`).
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngressBackend {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<IngressServiceBackend>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_port: Option<IntOrString>,
}

impl IngressBackend {
    /// Creates a backend pointing at the given service port number.
    pub fn service(name: impl Into<String>, port: u16) -> Self {
        Self {
            service: Some(IngressServiceBackend {
                name: name.into(),
                port: Some(ServiceBackendPort {
                    number: Some(i32::from(port)),
                    name: None,
                }),
            }),
            ..Self::default()
        }
    }

    /// The referenced service name, empty if none is set.
    pub fn service_name(&self) -> &str {
        match &self.service {
            Some(service) => &service.name,
            None => self.service_name.as_deref().unwrap_or_default(),
        }
    }

    /// The referenced service port.
    ///
    /// Named ports cannot be resolved without the cluster, so anything which is not
    /// a positive port number resolves to [`DEFAULT_BACKEND_PORT`].
    pub fn port(&self) -> u16 {
        let raw = match &self.service {
            Some(IngressServiceBackend {
                port: Some(port), ..
            }) => match (port.number, &port.name) {
                (Some(number), _) if number != 0 => Some(number.to_string()),
                (_, Some(name)) => Some(name.clone()),
                _ => None,
            },
            Some(_) => None,
            None => self.service_port.as_ref().map(|port| match port {
                IntOrString::Int(number) => number.to_string(),
                IntOrString::String(name) => name.clone(),
            }),
        };

        raw.as_deref().map_or(DEFAULT_BACKEND_PORT, parse_port)
    }
}

/// Parses a port given as a decimal string, falling back to [`DEFAULT_BACKEND_PORT`].
pub fn parse_port(value: &str) -> u16 {
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return DEFAULT_BACKEND_PORT;
    }

    match value.parse::<u16>() {
        Ok(port) if port != 0 => port,
        _ => DEFAULT_BACKEND_PORT,
    }
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngressServiceBackend {
    #[serde(default)]
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<ServiceBackendPort>,
}

/// The port of a service backend.
///
/// Besides the `number`/`name` mapping, a bare number or name is accepted in
/// place of the mapping. Values of any other shape parse as an unset port.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", from = "RawServiceBackendPort")]
pub struct ServiceBackendPort {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number: Option<i32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawServiceBackendPort {
    Number(i32),
    Name(String),
    Fields {
        #[serde(default)]
        number: Option<i32>,

        #[serde(default)]
        name: Option<String>,
    },
    Other(serde_yaml::Value),
}

impl From<RawServiceBackendPort> for ServiceBackendPort {
    fn from(raw: RawServiceBackendPort) -> Self {
        match raw {
            RawServiceBackendPort::Number(number) => Self {
                number: Some(number),
                name: None,
            },
            RawServiceBackendPort::Name(name) => Self {
                number: None,
                name: Some(name),
            },
            RawServiceBackendPort::Fields { number, name } => Self { number, name },
            RawServiceBackendPort::Other(_) => Self::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use indoc::indoc;
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("8080", 8080)]
    #[case("443", 443)]
    #[case("http", 80)]
    #[case("", 80)]
    #[case("0", 80)]
    #[case("-1", 80)]
    #[case("70000", 80)]
    fn parse_port_falls_back_to_default(#[case] input: &str, #[case] expected: u16) {
        assert_eq!(parse_port(input), expected);
    }

    #[test]
    fn backend_supports_current_layout() {
        let backend: IngressBackend = serde_yaml::from_str(indoc! {"
            service:
              name: api-svc
              port:
                number: 8080
        "})
        .expect("backend parses");

        assert_eq!(backend.service_name(), "api-svc");
        assert_eq!(backend.port(), 8080);
    }

    #[test]
    fn backend_supports_legacy_layout() {
        let backend: IngressBackend = serde_yaml::from_str(indoc! {"
            serviceName: legacy-svc
            servicePort: 9090
        "})
        .expect("backend parses");

        assert_eq!(backend.service_name(), "legacy-svc");
        assert_eq!(backend.port(), 9090);
    }

    #[rstest]
    #[case::number("8080", 8080)]
    #[case::numeric_name("\"9090\"", 9090)]
    #[case::name("http", DEFAULT_BACKEND_PORT)]
    #[case::list("[8080]", DEFAULT_BACKEND_PORT)]
    fn backend_supports_bare_port(#[case] port: &str, #[case] expected: u16) {
        let backend: IngressBackend =
            serde_yaml::from_str(&format!("service:\n  name: api-svc\n  port: {port}\n"))
                .expect("backend parses");

        assert_eq!(backend.service_name(), "api-svc");
        assert_eq!(backend.port(), expected);
    }

    #[test]
    fn named_port_resolves_to_default() {
        let backend: IngressBackend = serde_yaml::from_str(indoc! {"
            service:
              name: web
              port:
                name: http
        "})
        .expect("backend parses");

        assert_eq!(backend.port(), DEFAULT_BACKEND_PORT);
    }

    #[test]
    fn unknown_path_type_parses() {
        let path: HttpIngressPath = serde_yaml::from_str(indoc! {"
            path: /foo
            pathType: Regex
            backend:
              serviceName: foo
        "})
        .expect("path parses");

        assert_eq!(path.path_type, Some(PathType::Unknown));
    }

    #[test]
    fn default_ingress_is_empty() {
        assert!(Ingress::default().is_empty());
    }
}
