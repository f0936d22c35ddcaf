use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use serde::{Deserialize, Serialize};

use crate::resources::{GATEWAY_API_GROUP, GATEWAY_API_V1BETA1};

pub const REFERENCE_GRANT_KIND: &str = "ReferenceGrant";

/// Permits objects in other namespaces to reference objects in the namespace
/// of the grant.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceGrant {
    pub api_version: String,
    pub kind: String,
    pub metadata: ObjectMeta,
    pub spec: ReferenceGrantSpec,
}

impl ReferenceGrant {
    /// Creates a `gateway.networking.k8s.io/v1beta1` ReferenceGrant.
    pub fn new(metadata: ObjectMeta, spec: ReferenceGrantSpec) -> Self {
        Self {
            api_version: format!("{GATEWAY_API_GROUP}/{GATEWAY_API_V1BETA1}"),
            kind: REFERENCE_GRANT_KIND.to_owned(),
            metadata,
            spec,
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceGrantSpec {
    pub from: Vec<ReferenceGrantFrom>,
    pub to: Vec<ReferenceGrantTo>,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceGrantFrom {
    pub group: String,
    pub kind: String,
    pub namespace: String,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceGrantTo {
    /// The API group of the target, `""` for the core group.
    pub group: String,
    pub kind: String,

    /// Restricts the grant to a single object. Absent means every object of the kind.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}
