//! Static tables mapping controller specific annotation keys to their effect.
//!
//! Every known key maps to exactly one [`AnnotationEffect`]. The interpreter in
//! the parent module folds the effects of all present annotations into a
//! [`ParsedAnnotations`](super::ParsedAnnotations).

pub const ALB_PREFIX: &str = "alb.ingress.kubernetes.io/";

pub const INGRESS_CLASS_ANNOTATION: &str = "kubernetes.io/ingress.class";
pub const BACKEND_PROTOCOL_ANNOTATION: &str = "nginx.ingress.kubernetes.io/backend-protocol";
pub const GRPC_BACKEND_ANNOTATION: &str = "nginx.ingress.kubernetes.io/grpc-backend";
pub const SSL_PASSTHROUGH_ANNOTATION: &str = "nginx.ingress.kubernetes.io/ssl-passthrough";
pub const TCP_SERVICES_ANNOTATION: &str = "nginx.ingress.kubernetes.io/tcp-services";
pub const UDP_SERVICES_ANNOTATION: &str = "nginx.ingress.kubernetes.io/udp-services";

/// Substrings marking an annotation as belonging to one of the generic
/// controllers (nginx, Traefik, Istio) even when its key is unknown.
const GENERIC_VENDOR_MARKERS: &[&str] = &["nginx.", "traefik.", "istio.", "kubernetes.io/ingress"];

const GCE_PREFIXES: &[&str] = &["ingress.gcp.", "networking.gke.", "cloud.google.com/"];

/// A known annotation key together with its documentation and effect.
#[derive(Debug)]
pub struct AnnotationRule {
    /// The full annotation key. A trailing `*` matches any suffix.
    pub key: &'static str,
    pub description: &'static str,
    pub gateway_equivalent: &'static str,
    pub effect: AnnotationEffect,
}

impl AnnotationRule {
    const fn new(
        key: &'static str,
        description: &'static str,
        gateway_equivalent: &'static str,
        effect: AnnotationEffect,
    ) -> Self {
        Self {
            key,
            description,
            gateway_equivalent,
            effect,
        }
    }

    /// Returns `true` if `key` is matched by this rule.
    pub fn matches(&self, key: &str) -> bool {
        match self.key.strip_suffix('*') {
            Some(prefix) => key.starts_with(prefix),
            None => self.key == key,
        }
    }

    /// The part of `key` matched by the trailing wildcard, or the whole key for
    /// exact rules.
    pub fn wildcard_suffix<'a>(&self, key: &'a str) -> &'a str {
        self.key
            .strip_suffix('*')
            .and_then(|prefix| key.strip_prefix(prefix))
            .unwrap_or(key)
    }
}

/// What a recognised annotation does to the conversion.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AnnotationEffect {
    /// Appends an HTTPRoute filter built from the value.
    AddFilter(FilterKind),

    /// Stores the value in a typed slot of the gateway configuration.
    SetConfig(ConfigSlot),

    /// Emits a migration warning only.
    Warn(Hint),

    /// Records the annotation as unsupported, optionally with a warning.
    TrackUnsupported {
        reason: &'static str,
        hint: Option<Hint>,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FilterKind {
    /// `URLRewrite` replacing the matched prefix with the value.
    RewriteTarget,

    /// `RequestRedirect` to HTTPS, only when the value is truthy.
    HttpsRedirectIfTruthy,

    /// `RequestRedirect` to HTTPS regardless of the value, which for ALB is a
    /// port number.
    HttpsRedirect,
}

/// The warning message emitted for an annotation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Hint {
    /// The annotation is known but has no direct conversion.
    NotConverted,

    /// Built from the rule's description and Gateway API equivalent.
    Described,

    RateLimit,
    IpWhitelist,
    StreamServices,
    Middlewares,
    Priority,
    AlbAction,
    AlbCondition,
}

impl Hint {
    /// Renders the warning for `key=value` matched by `rule`.
    pub fn message(self, rule: &AnnotationRule, key: &str, value: &str) -> String {
        match self {
            Hint::NotConverted => {
                format!("Annotation {key}={value} noted but not directly converted")
            }
            Hint::Described => format!("{}: {}", rule.description, rule.gateway_equivalent),
            Hint::RateLimit => {
                format!("Rate limiting ({value} rps) requires provider-specific configuration")
            }
            Hint::IpWhitelist => {
                format!("IP whitelist ({value}) requires AuthorizationPolicy or provider config")
            }
            Hint::StreamServices => {
                format!("Stream services ({value}) are converted to TCPRoute/UDPRoute resources")
            }
            Hint::Middlewares => format!(
                "Traefik middlewares ({value}) require manual conversion to Gateway API filters"
            ),
            Hint::Priority => {
                format!("Route priority ({value}) not directly supported in Gateway API")
            }
            Hint::AlbAction => format!(
                "ALB action '{}' requires manual conversion to HTTPRoute filters",
                rule.wildcard_suffix(key)
            ),
            Hint::AlbCondition => format!(
                "ALB condition '{}' requires manual conversion to HTTPRoute matches",
                rule.wildcard_suffix(key)
            ),
        }
    }
}

/// A typed slot of [`GatewayConfig`](super::GatewayConfig).
///
/// How the raw value is parsed into the slot lives next to the config type.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConfigSlot {
    // nginx
    BackendProtocol,
    CorsEnabled,
    CorsAllowOrigins,
    CorsAllowMethods,
    CorsAllowHeaders,
    Canary,
    CanaryWeight,

    // Istio
    IngressClass,
    IstioRevision,

    // AWS ALB
    CertificateArn,
    ListenPorts,
    AlbBackendProtocol,
    Scheme,
    TargetType,
    GroupName,

    // GCE
    GceIngressClass,
    GlobalStaticIp,
    RegionalStaticIp,
    PreSharedCerts,
    ManagedCertificates,
    FrontendConfig,
    BackendConfig,
    Neg,
    AppProtocols,
}

use AnnotationEffect::{AddFilter, SetConfig, TrackUnsupported, Warn};

pub static NGINX_RULES: &[AnnotationRule] = &[
    AnnotationRule::new(
        "nginx.ingress.kubernetes.io/rewrite-target",
        "Rewrites the request path",
        "HTTPRoute.filters[].urlRewrite",
        AddFilter(FilterKind::RewriteTarget),
    ),
    AnnotationRule::new(
        "nginx.ingress.kubernetes.io/ssl-redirect",
        "Redirects HTTP to HTTPS",
        "HTTPRoute.filters[].requestRedirect",
        AddFilter(FilterKind::HttpsRedirectIfTruthy),
    ),
    AnnotationRule::new(
        "nginx.ingress.kubernetes.io/force-ssl-redirect",
        "Redirects HTTP to HTTPS even without TLS",
        "HTTPRoute.filters[].requestRedirect",
        AddFilter(FilterKind::HttpsRedirectIfTruthy),
    ),
    AnnotationRule::new(
        "nginx.ingress.kubernetes.io/proxy-body-size",
        "Maximum request body size",
        "Provider-specific policy",
        Warn(Hint::NotConverted),
    ),
    AnnotationRule::new(
        "nginx.ingress.kubernetes.io/proxy-connect-timeout",
        "Backend connect timeout",
        "HTTPRoute.rules[].timeouts",
        Warn(Hint::NotConverted),
    ),
    AnnotationRule::new(
        "nginx.ingress.kubernetes.io/proxy-read-timeout",
        "Backend read timeout",
        "HTTPRoute.rules[].timeouts",
        Warn(Hint::NotConverted),
    ),
    AnnotationRule::new(
        "nginx.ingress.kubernetes.io/proxy-send-timeout",
        "Backend send timeout",
        "HTTPRoute.rules[].timeouts",
        Warn(Hint::NotConverted),
    ),
    AnnotationRule::new(
        "nginx.ingress.kubernetes.io/limit-rps",
        "Requests per second limit",
        "Provider-specific rate limit policy",
        Warn(Hint::RateLimit),
    ),
    AnnotationRule::new(
        "nginx.ingress.kubernetes.io/limit-connections",
        "Concurrent connection limit",
        "Provider-specific rate limit policy",
        Warn(Hint::NotConverted),
    ),
    AnnotationRule::new(
        "nginx.ingress.kubernetes.io/whitelist-source-range",
        "Allowed client source ranges",
        "AuthorizationPolicy or provider config",
        Warn(Hint::IpWhitelist),
    ),
    AnnotationRule::new(
        "nginx.ingress.kubernetes.io/cors-allow-origin",
        "Allowed CORS origins",
        "HTTPRoute CORS filter",
        SetConfig(ConfigSlot::CorsAllowOrigins),
    ),
    AnnotationRule::new(
        "nginx.ingress.kubernetes.io/cors-allow-methods",
        "Allowed CORS methods",
        "HTTPRoute CORS filter",
        SetConfig(ConfigSlot::CorsAllowMethods),
    ),
    AnnotationRule::new(
        "nginx.ingress.kubernetes.io/cors-allow-headers",
        "Allowed CORS headers",
        "HTTPRoute CORS filter",
        SetConfig(ConfigSlot::CorsAllowHeaders),
    ),
    AnnotationRule::new(
        "nginx.ingress.kubernetes.io/enable-cors",
        "Enables CORS",
        "HTTPRoute CORS filter",
        SetConfig(ConfigSlot::CorsEnabled),
    ),
    AnnotationRule::new(
        "nginx.ingress.kubernetes.io/app-root",
        "Redirects `/` to the application root",
        "HTTPRoute.filters[].requestRedirect",
        Warn(Hint::NotConverted),
    ),
    AnnotationRule::new(
        BACKEND_PROTOCOL_ANNOTATION,
        "Backend protocol (HTTP/HTTPS/GRPC/GRPCS)",
        "BackendTLSPolicy or GRPCRoute",
        SetConfig(ConfigSlot::BackendProtocol),
    ),
    AnnotationRule::new(
        GRPC_BACKEND_ANNOTATION,
        "Marks the backend as gRPC",
        "GRPCRoute",
        Warn(Hint::Described),
    ),
    AnnotationRule::new(
        SSL_PASSTHROUGH_ANNOTATION,
        "Passes TLS through to the backend",
        "TLS listener in Passthrough mode with TCPRoute",
        Warn(Hint::Described),
    ),
    AnnotationRule::new(
        TCP_SERVICES_ANNOTATION,
        "Exposed TCP stream services",
        "TCP listeners with TCPRoute",
        Warn(Hint::StreamServices),
    ),
    AnnotationRule::new(
        UDP_SERVICES_ANNOTATION,
        "Exposed UDP stream services",
        "UDP listeners with UDPRoute",
        Warn(Hint::StreamServices),
    ),
    AnnotationRule::new(
        "nginx.ingress.kubernetes.io/canary",
        "Marks the Ingress as a canary",
        "Weighted HTTPRoute.rules[].backendRefs",
        SetConfig(ConfigSlot::Canary),
    ),
    AnnotationRule::new(
        "nginx.ingress.kubernetes.io/canary-weight",
        "Percentage of traffic sent to the canary",
        "HTTPRoute.rules[].backendRefs[].weight",
        SetConfig(ConfigSlot::CanaryWeight),
    ),
];

pub static TRAEFIK_RULES: &[AnnotationRule] = &[
    AnnotationRule::new(
        "traefik.ingress.kubernetes.io/router.middlewares",
        "Middlewares attached to the router",
        "HTTPRoute.filters",
        Warn(Hint::Middlewares),
    ),
    AnnotationRule::new(
        "traefik.ingress.kubernetes.io/router.entrypoints",
        "Entrypoints the router listens on",
        "Gateway.spec.listeners",
        TrackUnsupported {
            reason: "No Gateway API equivalent",
            hint: None,
        },
    ),
    AnnotationRule::new(
        "traefik.ingress.kubernetes.io/router.tls",
        "Enables TLS on the router",
        "Gateway.spec.listeners[].tls",
        TrackUnsupported {
            reason: "No Gateway API equivalent",
            hint: None,
        },
    ),
    AnnotationRule::new(
        "traefik.ingress.kubernetes.io/router.priority",
        "Router matching priority",
        "HTTPRoute rule ordering (not directly supported)",
        Warn(Hint::Priority),
    ),
];

pub static ISTIO_RULES: &[AnnotationRule] = &[
    AnnotationRule::new(
        INGRESS_CLASS_ANNOTATION,
        "Ingress class",
        "Gateway.spec.gatewayClassName",
        SetConfig(ConfigSlot::IngressClass),
    ),
    AnnotationRule::new(
        "istio.io/rev",
        "Istio control plane revision",
        "Gateway label istio.io/rev",
        SetConfig(ConfigSlot::IstioRevision),
    ),
];

pub static ALB_RULES: &[AnnotationRule] = &[
    AnnotationRule::new(
        "alb.ingress.kubernetes.io/scheme",
        "Load balancer scheme (internal/internet-facing)",
        "Gateway infrastructure annotation",
        SetConfig(ConfigSlot::Scheme),
    ),
    AnnotationRule::new(
        "alb.ingress.kubernetes.io/target-type",
        "Target type (ip/instance)",
        "Provider-specific configuration",
        SetConfig(ConfigSlot::TargetType),
    ),
    AnnotationRule::new(
        "alb.ingress.kubernetes.io/listen-ports",
        "Listener ports configuration",
        "Gateway.spec.listeners",
        SetConfig(ConfigSlot::ListenPorts),
    ),
    AnnotationRule::new(
        "alb.ingress.kubernetes.io/certificate-arn",
        "ACM certificate ARN",
        "Gateway.spec.listeners[].tls.certificateRefs",
        SetConfig(ConfigSlot::CertificateArn),
    ),
    AnnotationRule::new(
        "alb.ingress.kubernetes.io/ssl-redirect",
        "SSL redirect port",
        "HTTPRoute.filters[].requestRedirect",
        AddFilter(FilterKind::HttpsRedirect),
    ),
    AnnotationRule::new(
        "alb.ingress.kubernetes.io/healthcheck-path",
        "Health check path",
        "HealthCheckPolicy (provider-specific)",
        Warn(Hint::Described),
    ),
    AnnotationRule::new(
        "alb.ingress.kubernetes.io/healthcheck-interval-seconds",
        "Health check interval",
        "HealthCheckPolicy (provider-specific)",
        Warn(Hint::Described),
    ),
    AnnotationRule::new(
        "alb.ingress.kubernetes.io/backend-protocol",
        "Backend protocol (HTTP/HTTPS/GRPC)",
        "BackendTLSPolicy or GRPCRoute",
        SetConfig(ConfigSlot::AlbBackendProtocol),
    ),
    AnnotationRule::new(
        "alb.ingress.kubernetes.io/actions.*",
        "Custom actions (redirect, fixed-response)",
        "HTTPRoute.filters",
        TrackUnsupported {
            reason: "Complex ALB action",
            hint: Some(Hint::AlbAction),
        },
    ),
    AnnotationRule::new(
        "alb.ingress.kubernetes.io/conditions.*",
        "Custom routing conditions",
        "HTTPRoute.matches",
        TrackUnsupported {
            reason: "Complex ALB condition",
            hint: Some(Hint::AlbCondition),
        },
    ),
    AnnotationRule::new(
        "alb.ingress.kubernetes.io/group.name",
        "Ingress group name",
        "Multiple HTTPRoutes with same parentRef",
        SetConfig(ConfigSlot::GroupName),
    ),
    AnnotationRule::new(
        "alb.ingress.kubernetes.io/group.order",
        "Ingress group order",
        "HTTPRoute ordering (not directly supported)",
        Warn(Hint::Described),
    ),
    AnnotationRule::new(
        "alb.ingress.kubernetes.io/load-balancer-attributes",
        "ALB attributes",
        "Provider-specific Gateway annotations",
        Warn(Hint::Described),
    ),
    AnnotationRule::new(
        "alb.ingress.kubernetes.io/target-group-attributes",
        "Target group attributes",
        "Provider-specific BackendPolicy",
        Warn(Hint::Described),
    ),
    AnnotationRule::new(
        "alb.ingress.kubernetes.io/subnets",
        "Subnet IDs or names",
        "GatewayClass parameters or Gateway annotation",
        Warn(Hint::Described),
    ),
    AnnotationRule::new(
        "alb.ingress.kubernetes.io/security-groups",
        "Security group IDs",
        "GatewayClass parameters or Gateway annotation",
        Warn(Hint::Described),
    ),
    AnnotationRule::new(
        "alb.ingress.kubernetes.io/wafv2-acl-arn",
        "WAF ACL ARN",
        "Provider-specific policy",
        Warn(Hint::Described),
    ),
];

pub static GCE_RULES: &[AnnotationRule] = &[
    AnnotationRule::new(
        INGRESS_CLASS_ANNOTATION,
        "Ingress class (gce, gce-internal)",
        "Gateway.spec.gatewayClassName",
        SetConfig(ConfigSlot::GceIngressClass),
    ),
    AnnotationRule::new(
        "kubernetes.io/ingress.global-static-ip-name",
        "Global static IP name",
        "Gateway.spec.addresses",
        SetConfig(ConfigSlot::GlobalStaticIp),
    ),
    AnnotationRule::new(
        "kubernetes.io/ingress.regional-static-ip-name",
        "Regional static IP name",
        "Gateway.spec.addresses",
        SetConfig(ConfigSlot::RegionalStaticIp),
    ),
    AnnotationRule::new(
        "ingress.gcp.kubernetes.io/pre-shared-cert",
        "Pre-shared SSL certificate",
        "Gateway.spec.listeners[].tls",
        SetConfig(ConfigSlot::PreSharedCerts),
    ),
    AnnotationRule::new(
        "networking.gke.io/managed-certificates",
        "GKE managed certificates",
        "Gateway.spec.listeners[].tls.certificateRefs",
        SetConfig(ConfigSlot::ManagedCertificates),
    ),
    AnnotationRule::new(
        "networking.gke.io/v1beta1.FrontendConfig",
        "Frontend configuration",
        "Gateway configuration + policies",
        SetConfig(ConfigSlot::FrontendConfig),
    ),
    AnnotationRule::new(
        "cloud.google.com/backend-config",
        "Backend configuration",
        "BackendPolicy (provider-specific)",
        SetConfig(ConfigSlot::BackendConfig),
    ),
    AnnotationRule::new(
        "cloud.google.com/neg",
        "Network Endpoint Groups",
        "Provider-specific backend configuration",
        SetConfig(ConfigSlot::Neg),
    ),
    AnnotationRule::new(
        "cloud.google.com/app-protocols",
        "Application protocols per port",
        "BackendTLSPolicy or route type",
        SetConfig(ConfigSlot::AppProtocols),
    ),
];

/// A set of rule tables interpreted together, with the policy for keys none
/// of the tables know.
#[derive(Debug)]
pub struct RuleSet {
    pub tables: &'static [&'static [AnnotationRule]],

    /// Returns `true` for unknown keys that still belong to this rule set and
    /// are therefore reported as unsupported.
    pub claims: fn(&str) -> bool,

    pub unknown_reason: &'static str,
}

impl RuleSet {
    /// Finds the first rule matching `key`.
    pub fn lookup(&self, key: &str) -> Option<&'static AnnotationRule> {
        self.tables
            .iter()
            .flat_map(|table| table.iter())
            .find(|rule| rule.matches(key))
    }
}

/// nginx, Traefik and Istio.
pub static GENERIC_RULES: RuleSet = RuleSet {
    tables: &[NGINX_RULES, TRAEFIK_RULES, ISTIO_RULES],
    // `kubernetes.io/ingress.*` keys known to the GCE tables are left to them.
    claims: |key| {
        GENERIC_VENDOR_MARKERS.iter().any(|marker| key.contains(marker))
            && GCE_RULE_SET.lookup(key).is_none()
    },
    unknown_reason: "Unknown annotation",
};

pub static ALB_RULE_SET: RuleSet = RuleSet {
    tables: &[ALB_RULES],
    claims: |key| key.starts_with(ALB_PREFIX),
    unknown_reason: "Unknown ALB annotation",
};

pub static GCE_RULE_SET: RuleSet = RuleSet {
    tables: &[GCE_RULES],
    claims: |key| GCE_PREFIXES.iter().any(|prefix| key.starts_with(prefix)),
    unknown_reason: "GCE-specific annotation",
};

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("alb.ingress.kubernetes.io/actions.forward", true)]
    #[case("alb.ingress.kubernetes.io/actions.", true)]
    #[case("alb.ingress.kubernetes.io/conditions.forward", false)]
    #[case("alb.ingress.kubernetes.io/actions", false)]
    fn wildcard_rules_match_by_prefix(#[case] key: &str, #[case] expected: bool) {
        let rule = ALB_RULE_SET
            .lookup("alb.ingress.kubernetes.io/actions.x")
            .expect("actions rule exists");
        assert_eq!(rule.matches(key), expected);
    }

    #[test]
    fn wildcard_suffix_recovers_sub_name() {
        let rule = ALB_RULE_SET
            .lookup("alb.ingress.kubernetes.io/conditions.api")
            .expect("conditions rule exists");
        assert_eq!(
            rule.wildcard_suffix("alb.ingress.kubernetes.io/conditions.api"),
            "api"
        );
    }

    #[rstest]
    #[case(NGINX_RULES)]
    #[case(TRAEFIK_RULES)]
    #[case(ISTIO_RULES)]
    #[case(ALB_RULES)]
    #[case(GCE_RULES)]
    fn table_keys_are_unique(#[case] table: &[AnnotationRule]) {
        let mut keys: Vec<_> = table.iter().map(|rule| rule.key).collect();
        keys.sort_unstable();
        keys.dedup();
        assert_eq!(keys.len(), table.len());
    }

    #[rstest]
    #[case("nginx.ingress.kubernetes.io/unknown", true)]
    #[case("traefik.ingress.kubernetes.io/router.unknown", true)]
    #[case("sidecar.istio.io/inject", true)]
    #[case("kubernetes.io/ingress.allow-http", true)]
    #[case("kubernetes.io/ingress.global-static-ip-name", false)]
    #[case("example.com/owner", false)]
    fn generic_rules_claim_vendor_keys(#[case] key: &str, #[case] expected: bool) {
        assert_eq!((GENERIC_RULES.claims)(key), expected);
    }
}
