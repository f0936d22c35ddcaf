//! Presets for the Gateway API implementations a conversion can target.

use std::collections::BTreeMap;

use strum::{Display, EnumIter, EnumString, IntoEnumIterator};
use tracing::debug;

use crate::resources::{AllowedRoutes, FromNamespaces, Gateway};

/// A Gateway API implementation, identified by its lowercase id.
///
/// Parsing is case insensitive. Use [`Provider::from_id_or_default`] to fall
/// back to [`Provider::Istio`] for unknown ids.
#[derive(
    Clone, Copy, Debug, Default, Display, EnumIter, EnumString, PartialEq, Eq, Hash, PartialOrd, Ord,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Provider {
    #[default]
    Istio,
    Envoy,
    Contour,
    Kong,
    Nginx,
    Traefik,
    Gke,
}

/// The defaults a [`Provider`] applies to a converted Gateway.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProviderPreset {
    pub display_name: &'static str,
    pub gateway_class: &'static str,
    pub supports_grpc: bool,
    pub supports_tcp: bool,

    /// Annotations added to the Gateway metadata.
    pub default_annotations: &'static [(&'static str, &'static str)],

    /// Where listeners accept routes from, unless a listener says otherwise.
    pub allowed_routes_from: FromNamespaces,
}

impl Provider {
    /// Parses a provider id, falling back to [`Provider::Istio`].
    pub fn from_id_or_default(id: &str) -> Self {
        id.parse().unwrap_or_else(|_| {
            debug!(provider = id, "unknown provider, falling back to istio");
            Self::default()
        })
    }

    /// All providers in a stable order.
    pub fn all() -> impl Iterator<Item = Self> {
        Self::iter()
    }

    pub fn preset(self) -> ProviderPreset {
        const SAME: FromNamespaces = FromNamespaces::Same;

        match self {
            Self::Istio => ProviderPreset {
                display_name: "Istio",
                gateway_class: "istio",
                supports_grpc: true,
                supports_tcp: true,
                default_annotations: &[],
                allowed_routes_from: SAME,
            },
            Self::Envoy => ProviderPreset {
                display_name: "Envoy Gateway",
                gateway_class: "eg",
                supports_grpc: true,
                supports_tcp: true,
                default_annotations: &[],
                allowed_routes_from: SAME,
            },
            Self::Contour => ProviderPreset {
                display_name: "Contour",
                gateway_class: "contour",
                supports_grpc: true,
                supports_tcp: true,
                default_annotations: &[],
                allowed_routes_from: FromNamespaces::All,
            },
            Self::Kong => ProviderPreset {
                display_name: "Kong",
                gateway_class: "kong",
                supports_grpc: true,
                supports_tcp: true,
                default_annotations: &[("konghq.com/strip-path", "true")],
                allowed_routes_from: SAME,
            },
            Self::Nginx => ProviderPreset {
                display_name: "NGINX Gateway Fabric",
                gateway_class: "nginx",
                supports_grpc: false,
                supports_tcp: false,
                default_annotations: &[],
                allowed_routes_from: SAME,
            },
            Self::Traefik => ProviderPreset {
                display_name: "Traefik",
                gateway_class: "traefik",
                supports_grpc: true,
                supports_tcp: true,
                default_annotations: &[],
                allowed_routes_from: SAME,
            },
            Self::Gke => ProviderPreset {
                display_name: "GKE Gateway Controller",
                gateway_class: "gke-l7-global-external-managed",
                supports_grpc: true,
                supports_tcp: false,
                default_annotations: &[],
                allowed_routes_from: SAME,
            },
        }
    }
}

/// Applies the defaults of `provider` to `gateway`.
///
/// The gateway class is always replaced. Listeners only receive the provider's
/// `allowedRoutes` if they have none. Provider annotations overwrite existing
/// annotations with the same key.
pub fn apply_provider_defaults(mut gateway: Gateway, provider: Provider) -> Gateway {
    let preset = provider.preset();
    debug!(%provider, gateway_class = preset.gateway_class, "applying provider defaults");

    gateway.spec.gateway_class_name = preset.gateway_class.to_owned();

    for listener in &mut gateway.spec.listeners {
        listener
            .allowed_routes
            .get_or_insert_with(|| AllowedRoutes::from_namespaces(preset.allowed_routes_from));
    }

    if !preset.default_annotations.is_empty() {
        let annotations = gateway
            .metadata
            .annotations
            .get_or_insert_with(BTreeMap::new);
        for (key, value) in preset.default_annotations {
            annotations.insert((*key).to_owned(), (*value).to_owned());
        }
    }

    gateway
}
