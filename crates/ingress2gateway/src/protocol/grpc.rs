//! GRPCRoute generation.

use std::collections::BTreeMap;

use tracing::debug;

use crate::{
    annotations::rules::{BACKEND_PROTOCOL_ANNOTATION, GRPC_BACKEND_ANNOTATION},
    resources::{
        BackendRef, DEFAULT_BACKEND_PORT, DEFAULT_NAMESPACE, GrpcMethodMatch, GrpcRoute,
        GrpcRouteMatch, GrpcRouteRule, GrpcRouteSpec, HttpRoute, ObjectMetaBuilder,
        ObjectMetaExt, ParentReference, Route,
    },
};

/// Annotations whose value marks the backend as gRPC.
const GRPC_INDICATORS: &[&str] = &[BACKEND_PROTOCOL_ANNOTATION, GRPC_BACKEND_ANNOTATION];

/// Returns `true` if the backend speaks gRPC.
///
/// An explicit `backend_protocol` of `GRPC` or `GRPCS` wins. Otherwise the
/// nginx backend protocol and gRPC backend annotations are consulted.
pub fn is_grpc_backend(
    annotations: &BTreeMap<String, String>,
    backend_protocol: Option<&str>,
) -> bool {
    if backend_protocol.is_some_and(|protocol| {
        ["GRPC", "GRPCS"]
            .iter()
            .any(|grpc| protocol.eq_ignore_ascii_case(grpc))
    }) {
        return true;
    }

    GRPC_INDICATORS
        .iter()
        .filter_map(|key| annotations.get(*key))
        .any(|value| {
            ["GRPC", "GRPCS", "TRUE", "YES"]
                .iter()
                .any(|indicator| value.eq_ignore_ascii_case(indicator))
        })
}

/// Creates a GRPCRoute forwarding to a single backend.
///
/// `method_match` takes the `package.Service/Method` form. Values without a
/// `/` are ignored.
pub fn create_grpc_route(
    name: &str,
    namespace: &str,
    gateway_name: &str,
    host: Option<&str>,
    backend: BackendRef,
    method_match: Option<&str>,
) -> GrpcRoute {
    let matches = method_match
        .and_then(|method_match| method_match.rsplit_once('/'))
        .map(|(service, method)| GrpcRouteMatch {
            method: Some(GrpcMethodMatch {
                service: Some(service.to_owned()),
                method: Some(method.to_owned()),
            }),
        })
        .into_iter()
        .collect();

    GrpcRoute::new(
        ObjectMetaBuilder::new().name(name).namespace(namespace).build(),
        GrpcRouteSpec {
            parent_refs: vec![ParentReference::gateway(gateway_name, namespace)],
            hostnames: host.map(ToOwned::to_owned).into_iter().collect(),
            rules: vec![GrpcRouteRule {
                matches,
                backend_refs: vec![backend],
            }],
        },
    )
}

/// Replaces every HTTPRoute by an equivalent GRPCRoute.
///
/// Each GRPCRoute keeps the name, namespace, first parent Gateway, first
/// hostname and first backend of its HTTPRoute.
pub fn into_grpc_routes(httproutes: &[HttpRoute]) -> Vec<GrpcRoute> {
    httproutes
        .iter()
        .map(|route| {
            let namespace = route
                .metadata
                .namespace
                .as_deref()
                .unwrap_or(DEFAULT_NAMESPACE);
            let gateway_name = route
                .spec
                .parent_refs
                .first()
                .map_or("gateway", |parent| parent.name.as_str());
            let backend = route
                .backend_refs()
                .first()
                .map(|backend| (*backend).clone())
                .unwrap_or_else(|| BackendRef::service("service", DEFAULT_BACKEND_PORT));

            create_grpc_route(
                route.metadata.name_or("grpc-route"),
                namespace,
                gateway_name,
                route.spec.hostnames.first().map(String::as_str),
                backend,
                None,
            )
        })
        .collect()
}

/// Converts all `httproutes` to GRPCRoutes if the annotations mark the
/// backend as gRPC.
///
/// Returns the remaining HTTPRoutes and the GRPCRoutes. The conversion is all
/// or nothing: either every route is converted or none is.
pub fn convert_to_grpc_routes(
    httproutes: Vec<HttpRoute>,
    annotations: &BTreeMap<String, String>,
) -> (Vec<HttpRoute>, Vec<GrpcRoute>) {
    if !is_grpc_backend(annotations, None) {
        return (httproutes, Vec::new());
    }

    debug!(count = httproutes.len(), "converting HTTPRoutes to GRPCRoutes");
    (Vec::new(), into_grpc_routes(&httproutes))
}
