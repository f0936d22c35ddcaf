//! Detection of cross-namespace references and generation of the
//! ReferenceGrants permitting them.
//!
//! References are grouped by source namespace, target namespace and target
//! kind. Each group yields exactly one grant, placed in the target namespace.

use std::collections::BTreeSet;

use indexmap::IndexMap;
use tracing::{debug, warn};

use crate::resources::{
    GATEWAY_API_GROUP, GATEWAY_KIND, Gateway, ObjectMetaBuilder, ObjectMetaExt, ReferenceGrant,
    ReferenceGrantFrom, ReferenceGrantSpec, ReferenceGrantTo, Route,
};

const SERVICE_KIND: &str = "Service";
const SECRET_KIND: &str = "Secret";

/// A reference from an object in one namespace to an object in another.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CrossNamespaceRef {
    pub from_namespace: String,
    pub from_kind: String,
    pub to_namespace: String,
    pub to_kind: String,

    /// The name of the referenced object, empty if the reference didn't name one.
    pub to_name: String,
}

/// Lists every reference crossing a namespace boundary.
///
/// These are route parent references to Gateways in another namespace, route
/// backend references to Services in another namespace, and listener
/// certificate references to objects outside the Gateway's namespace.
pub fn detect_cross_namespace_refs(
    gateway: &Gateway,
    routes: &[&dyn Route],
) -> Vec<CrossNamespaceRef> {
    let mut refs = Vec::new();

    for route in routes {
        let route_namespace = route.metadata().namespace_or_default();

        for parent in route.parent_refs() {
            let parent_namespace = parent.namespace.as_deref().unwrap_or(route_namespace);
            if parent_namespace != route_namespace {
                refs.push(CrossNamespaceRef {
                    from_namespace: route_namespace.to_owned(),
                    from_kind: route.kind().to_owned(),
                    to_namespace: parent_namespace.to_owned(),
                    to_kind: GATEWAY_KIND.to_owned(),
                    to_name: parent.name.clone(),
                });
            }
        }

        for backend in route.backend_refs() {
            if let Some(backend_namespace) = backend.namespace.as_deref()
                && check_reference_grant_needed(route_namespace, Some(backend_namespace))
            {
                refs.push(CrossNamespaceRef {
                    from_namespace: route_namespace.to_owned(),
                    from_kind: route.kind().to_owned(),
                    to_namespace: backend_namespace.to_owned(),
                    to_kind: SERVICE_KIND.to_owned(),
                    to_name: backend.name.clone(),
                });
            }
        }
    }

    let gateway_namespace = gateway.metadata.namespace_or_default();
    let certificate_refs = gateway
        .spec
        .listeners
        .iter()
        .filter_map(|listener| listener.tls.as_ref())
        .flat_map(|tls| &tls.certificate_refs);

    for certificate in certificate_refs {
        if let Some(certificate_namespace) = certificate.namespace.as_deref()
            && certificate_namespace != gateway_namespace
        {
            refs.push(CrossNamespaceRef {
                from_namespace: gateway_namespace.to_owned(),
                from_kind: GATEWAY_KIND.to_owned(),
                to_namespace: certificate_namespace.to_owned(),
                to_kind: certificate
                    .kind
                    .clone()
                    .unwrap_or_else(|| SECRET_KIND.to_owned()),
                to_name: certificate.name.clone(),
            });
        }
    }

    refs
}

#[derive(Debug, Default)]
struct GrantGroup {
    from_kinds: BTreeSet<String>,
    to_names: BTreeSet<String>,
}

/// Generates the ReferenceGrants needed by `gateway` and `routes`.
///
/// A grant only names its target if the group references exactly one object.
/// Groups referencing several objects get a grant covering the whole kind.
pub fn generate_reference_grants(gateway: &Gateway, routes: &[&dyn Route]) -> Vec<ReferenceGrant> {
    let mut groups: IndexMap<(String, String, String), GrantGroup> = IndexMap::new();

    for reference in detect_cross_namespace_refs(gateway, routes) {
        let group = groups
            .entry((
                reference.from_namespace,
                reference.to_namespace,
                reference.to_kind,
            ))
            .or_default();
        group.from_kinds.insert(reference.from_kind);
        if !reference.to_name.is_empty() {
            group.to_names.insert(reference.to_name);
        }
    }

    groups
        .into_iter()
        .map(|((from_namespace, to_namespace, to_kind), group)| {
            create_reference_grant(&from_namespace, &to_namespace, &to_kind, group)
        })
        .collect()
}

fn create_reference_grant(
    from_namespace: &str,
    to_namespace: &str,
    to_kind: &str,
    group: GrantGroup,
) -> ReferenceGrant {
    let name = format!(
        "allow-{from_namespace}-to-{kind}",
        kind = to_kind.to_lowercase()
    );

    let to_name = match group.to_names.len() {
        1 => group.to_names.into_iter().next(),
        0 => None,
        _ => {
            warn!(
                grant = %name,
                namespace = to_namespace,
                targets = ?group.to_names,
                "ReferenceGrant covers every {to_kind} in the namespace as several objects are referenced"
            );
            None
        }
    };

    debug!(grant = %name, namespace = to_namespace, "generated ReferenceGrant");

    ReferenceGrant::new(
        ObjectMetaBuilder::new()
            .name(name)
            .namespace(to_namespace)
            .build(),
        ReferenceGrantSpec {
            from: group
                .from_kinds
                .into_iter()
                .map(|kind| ReferenceGrantFrom {
                    group: GATEWAY_API_GROUP.to_owned(),
                    kind,
                    namespace: from_namespace.to_owned(),
                })
                .collect(),
            to: vec![ReferenceGrantTo {
                group: target_group(to_kind).to_owned(),
                kind: to_kind.to_owned(),
                name: to_name,
            }],
        },
    )
}

/// The API group of a reference target. Services and Secrets live in the
/// core group.
fn target_group(kind: &str) -> &'static str {
    match kind {
        SERVICE_KIND | SECRET_KIND => "",
        _ => GATEWAY_API_GROUP,
    }
}

/// Returns `true` if a backend in `backend_namespace` can only be referenced
/// from `route_namespace` with a ReferenceGrant.
pub fn check_reference_grant_needed(route_namespace: &str, backend_namespace: Option<&str>) -> bool {
    backend_namespace.is_some_and(|backend_namespace| {
        !backend_namespace.is_empty() && backend_namespace != route_namespace
    })
}
