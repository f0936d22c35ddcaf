use std::collections::BTreeMap;

use crate::{
    annotations::{is_truthy, rules::ConfigSlot},
    merge::impl_merge_fields,
    resources::GatewayAddress,
};

pub const GCE_EXTERNAL_GATEWAY_CLASS: &str = "gke-l7-global-external-managed";
pub const GCE_INTERNAL_GATEWAY_CLASS: &str = "gke-l7-rilb";

/// Gateway level settings recovered from annotations.
///
/// Every field is optional. Fragments from several controller dialects are
/// combined with [`Merge`](crate::merge::Merge), field by field.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GatewayConfig {
    /// Replaces the gateway class derived from the Ingress.
    pub gateway_class_name: Option<String>,

    /// Copied to `Gateway.spec.addresses`.
    pub addresses: Option<Vec<GatewayAddress>>,

    pub use_grpc_route: Option<bool>,
    pub backend_tls: Option<bool>,
    pub backend_protocol: Option<String>,
    pub ingress_class: Option<String>,
    pub istio_revision: Option<String>,

    pub cors_enabled: Option<bool>,
    pub cors_allow_origins: Option<Vec<String>>,
    pub cors_allow_methods: Option<Vec<String>>,
    pub cors_allow_headers: Option<Vec<String>>,
    pub canary: Option<bool>,
    pub canary_weight: Option<u32>,

    pub certificate_arn: Option<String>,

    /// Parsed from JSON such as `[{"HTTP": 80}, {"HTTPS": 443}]`.
    pub listen_ports: Option<Vec<BTreeMap<String, u16>>>,
    pub scheme: Option<String>,
    pub target_type: Option<String>,
    pub group_name: Option<String>,

    pub pre_shared_certs: Option<Vec<String>>,
    pub managed_certificates: Option<Vec<String>>,
    pub frontend_config: Option<String>,
    pub backend_config: Option<String>,
    pub neg: Option<String>,

    /// Port name to protocol, parsed from JSON such as `{"grpc": "HTTP2"}`.
    pub app_protocols: Option<BTreeMap<String, String>>,
}

impl_merge_fields!(GatewayConfig {
    gateway_class_name,
    addresses,
    use_grpc_route,
    backend_tls,
    backend_protocol,
    ingress_class,
    istio_revision,
    cors_enabled,
    cors_allow_origins,
    cors_allow_methods,
    cors_allow_headers,
    canary,
    canary_weight,
    certificate_arn,
    listen_ports,
    scheme,
    target_type,
    group_name,
    pre_shared_certs,
    managed_certificates,
    frontend_config,
    backend_config,
    neg,
    app_protocols,
});

impl GatewayConfig {
    /// Stores `value` in `slot`, pushing any migration warnings.
    ///
    /// Values which fail to parse leave the slot untouched and produce a
    /// warning instead of an error.
    pub(super) fn set(&mut self, slot: ConfigSlot, value: &str, warnings: &mut Vec<String>) {
        match slot {
            ConfigSlot::CertificateArn
            | ConfigSlot::ListenPorts
            | ConfigSlot::AlbBackendProtocol
            | ConfigSlot::Scheme
            | ConfigSlot::TargetType
            | ConfigSlot::GroupName => self.set_alb(slot, value, warnings),
            ConfigSlot::GceIngressClass
            | ConfigSlot::GlobalStaticIp
            | ConfigSlot::RegionalStaticIp
            | ConfigSlot::PreSharedCerts
            | ConfigSlot::ManagedCertificates
            | ConfigSlot::FrontendConfig
            | ConfigSlot::BackendConfig
            | ConfigSlot::Neg
            | ConfigSlot::AppProtocols => self.set_gce(slot, value, warnings),
            _ => self.set_generic(slot, value, warnings),
        }
    }

    fn set_generic(&mut self, slot: ConfigSlot, value: &str, warnings: &mut Vec<String>) {
        match slot {
            ConfigSlot::BackendProtocol => self.backend_protocol = Some(value.to_uppercase()),
            ConfigSlot::CorsEnabled => {
                if is_truthy(value) {
                    self.cors_enabled = Some(true);
                }
            }
            ConfigSlot::CorsAllowOrigins => self.cors_allow_origins = Some(split_list(value)),
            ConfigSlot::CorsAllowMethods => self.cors_allow_methods = Some(split_list(value)),
            ConfigSlot::CorsAllowHeaders => self.cors_allow_headers = Some(split_list(value)),
            ConfigSlot::Canary => self.canary = Some(is_truthy(value)),
            ConfigSlot::CanaryWeight => match value.trim().parse() {
                Ok(weight) => self.canary_weight = Some(weight),
                Err(_) => warnings.push(format!("Could not parse canary-weight: {value}")),
            },

            ConfigSlot::IngressClass => self.ingress_class = Some(value.to_owned()),
            ConfigSlot::IstioRevision => self.istio_revision = Some(value.to_owned()),
            _ => {}
        }
    }

    fn set_alb(&mut self, slot: ConfigSlot, value: &str, warnings: &mut Vec<String>) {
        match slot {
            ConfigSlot::CertificateArn => {
                self.certificate_arn = Some(value.to_owned());
                warnings.push(format!(
                    "ACM certificate ARN '{value}' needs to be converted to Kubernetes Secret or \
                     provider-specific certificate reference"
                ));
            }
            ConfigSlot::ListenPorts => match serde_json::from_str(value) {
                Ok(ports) => self.listen_ports = Some(ports),
                Err(_) => warnings.push(format!("Could not parse listen-ports: {value}")),
            },
            ConfigSlot::AlbBackendProtocol => match value.to_uppercase().as_str() {
                "GRPC" => self.use_grpc_route = Some(true),
                "HTTPS" => self.backend_tls = Some(true),
                _ => {}
            },
            ConfigSlot::Scheme => {
                self.scheme = Some(value.to_owned());
                if value == "internal" {
                    warnings.push(
                        "Internal load balancer requires provider-specific GatewayClass or \
                         Gateway annotation"
                            .to_owned(),
                    );
                }
            }
            ConfigSlot::TargetType => {
                self.target_type = Some(value.to_owned());
                warnings.push(format!(
                    "Target type '{value}' is provider-specific configuration"
                ));
            }
            ConfigSlot::GroupName => {
                self.group_name = Some(value.to_owned());
                warnings.push(format!(
                    "Ingress group '{value}' - all Ingresses in this group should reference the \
                     same Gateway"
                ));
            }
            _ => {}
        }
    }

    fn set_gce(&mut self, slot: ConfigSlot, value: &str, warnings: &mut Vec<String>) {
        match slot {
            ConfigSlot::GceIngressClass => match value {
                "gce" => self.gateway_class_name = Some(GCE_EXTERNAL_GATEWAY_CLASS.to_owned()),
                "gce-internal" => {
                    self.gateway_class_name = Some(GCE_INTERNAL_GATEWAY_CLASS.to_owned());
                }
                _ => {}
            },
            ConfigSlot::GlobalStaticIp => {
                self.addresses = Some(vec![GatewayAddress::named(value)]);
            }
            ConfigSlot::RegionalStaticIp => {
                self.addresses = Some(vec![GatewayAddress::named(value)]);
                warnings.push("Regional static IP requires regional Gateway class".to_owned());
            }
            ConfigSlot::PreSharedCerts => {
                let certs = split_list(value);
                warnings.push(format!(
                    "Pre-shared certificates [{}] need to be referenced in Gateway TLS config",
                    certs.join(", ")
                ));
                self.pre_shared_certs = Some(certs);
            }
            ConfigSlot::ManagedCertificates => {
                let certs = split_list(value);
                warnings.push(format!(
                    "Managed certificates [{}] should be referenced via ManagedCertificate \
                     resources in Gateway",
                    certs.join(", ")
                ));
                self.managed_certificates = Some(certs);
            }
            ConfigSlot::FrontendConfig => {
                self.frontend_config = Some(value.to_owned());
                warnings.push(format!(
                    "FrontendConfig '{value}' features need manual migration to Gateway policies"
                ));
            }
            ConfigSlot::BackendConfig => {
                self.backend_config = Some(value.to_owned());
                warnings.push(format!(
                    "BackendConfig '{value}' features need manual migration to GCPBackendPolicy \
                     or HealthCheckPolicy"
                ));
            }
            ConfigSlot::Neg => {
                self.neg = Some(value.to_owned());
                warnings.push("NEG configuration is typically automatic with GKE Gateway".to_owned());
            }
            ConfigSlot::AppProtocols => {
                match serde_json::from_str::<BTreeMap<String, String>>(value) {
                    Ok(protocols) => {
                        for (port, protocol) in &protocols {
                            match protocol.to_uppercase().as_str() {
                                "HTTP2" => warnings.push(format!(
                                    "Port {port} uses HTTP2 - ensure backend supports it"
                                )),
                                "GRPC" => self.use_grpc_route = Some(true),
                                _ => {}
                            }
                        }
                        self.app_protocols = Some(protocols);
                    }
                    Err(_) => warnings.push(format!("Could not parse app-protocols: {value}")),
                }
            }
            _ => {}
        }
    }
}

/// Splits a comma separated annotation value, trimming each item.
fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(ToOwned::to_owned)
        .collect()
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::merge::merge;

    fn set(slot: ConfigSlot, value: &str) -> (GatewayConfig, Vec<String>) {
        let mut config = GatewayConfig::default();
        let mut warnings = Vec::new();
        config.set(slot, value, &mut warnings);
        (config, warnings)
    }

    #[rstest]
    #[case("gce", Some(GCE_EXTERNAL_GATEWAY_CLASS))]
    #[case("gce-internal", Some(GCE_INTERNAL_GATEWAY_CLASS))]
    #[case("nginx", None)]
    fn gce_ingress_class_selects_gateway_class(#[case] value: &str, #[case] expected: Option<&str>) {
        let (config, _) = set(ConfigSlot::GceIngressClass, value);
        assert_eq!(config.gateway_class_name.as_deref(), expected);
    }

    #[test]
    fn listen_ports_parse_as_json() {
        let (config, warnings) = set(ConfigSlot::ListenPorts, r#"[{"HTTP": 80}, {"HTTPS": 443}]"#);

        assert!(warnings.is_empty());
        assert_eq!(
            config.listen_ports,
            Some(vec![
                BTreeMap::from([("HTTP".to_owned(), 80)]),
                BTreeMap::from([("HTTPS".to_owned(), 443)]),
            ])
        );
    }

    #[rstest]
    #[case(ConfigSlot::ListenPorts, "not json", "Could not parse listen-ports: not json")]
    #[case(ConfigSlot::AppProtocols, "{broken", "Could not parse app-protocols: {broken")]
    #[case(ConfigSlot::CanaryWeight, "heavy", "Could not parse canary-weight: heavy")]
    fn malformed_values_warn(#[case] slot: ConfigSlot, #[case] value: &str, #[case] warning: &str) {
        let (config, warnings) = set(slot, value);

        assert_eq!(config, GatewayConfig::default());
        assert_eq!(warnings, vec![warning]);
    }

    #[test]
    fn app_protocols_detect_grpc_and_http2() {
        let (config, warnings) = set(
            ConfigSlot::AppProtocols,
            r#"{"grpc-port": "GRPC", "h2-port": "HTTP2"}"#,
        );

        assert_eq!(config.use_grpc_route, Some(true));
        assert_eq!(
            warnings,
            vec!["Port h2-port uses HTTP2 - ensure backend supports it"]
        );
    }

    #[test]
    fn certificate_lists_are_trimmed() {
        let (config, _) = set(ConfigSlot::PreSharedCerts, "cert-a, cert-b ,");
        assert_eq!(
            config.pre_shared_certs,
            Some(vec!["cert-a".to_owned(), "cert-b".to_owned()])
        );
    }

    #[test]
    fn merge_prefers_overrides_per_field() {
        let alb = GatewayConfig {
            use_grpc_route: Some(false),
            scheme: Some("internal".to_owned()),
            ..GatewayConfig::default()
        };
        let gce = GatewayConfig {
            use_grpc_route: Some(true),
            neg: Some(r#"{"ingress": true}"#.to_owned()),
            ..GatewayConfig::default()
        };

        let merged = merge(gce, &alb);

        assert_eq!(merged.use_grpc_route, Some(true));
        assert_eq!(merged.scheme.as_deref(), Some("internal"));
        assert!(merged.neg.is_some());
    }
}
