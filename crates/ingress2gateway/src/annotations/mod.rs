//! Interprets controller specific Ingress annotations.
//!
//! Annotation keys are looked up in static rule tables (see [`rules`]), one per
//! controller: nginx, Traefik and Istio are interpreted together by
//! [`parse_annotations`], AWS ALB and GCE by [`parse_alb_annotations`] and
//! [`parse_gce_annotations`]. Each recognised key contributes route filters,
//! a typed [`GatewayConfig`] fragment, warnings or unsupported entries.
//!
//! Interpretation never fails. Malformed values degrade to warnings.

use std::{collections::BTreeMap, fmt::Display};

use tracing::debug;

use crate::{
    merge::Merge,
    resources::HttpRouteFilter,
};

mod config;
pub mod rules;

pub use config::*;
use rules::{
    ALB_RULE_SET, ALB_RULES, AnnotationEffect, AnnotationRule, FilterKind, GCE_RULE_SET,
    GCE_RULES, GENERIC_RULES, RuleSet,
};

/// Returns `true` for the boolean spellings accepted in annotation values:
/// `true`, `yes` and `1`, in any case.
pub fn is_truthy(value: &str) -> bool {
    ["true", "yes", "1"]
        .iter()
        .any(|truthy| value.eq_ignore_ascii_case(truthy))
}

/// The result of interpreting an annotation map.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ParsedAnnotations {
    /// Filters to attach to every HTTPRoute rule.
    pub filters: Vec<HttpRouteFilter>,
    pub gateway_config: GatewayConfig,
    pub warnings: Vec<String>,
    pub unsupported: Vec<UnsupportedAnnotation>,
}

impl ParsedAnnotations {
    /// Appends everything from `other`.
    ///
    /// Config values set by `other` take precedence over the ones already
    /// present.
    pub fn combine(mut self, other: Self) -> Self {
        self.filters.extend(other.filters);
        self.warnings.extend(other.warnings);
        self.unsupported.extend(other.unsupported);

        let mut gateway_config = other.gateway_config;
        gateway_config.merge(&self.gateway_config);
        self.gateway_config = gateway_config;

        self
    }

    fn apply(&mut self, rule: &AnnotationRule, key: &str, value: &str) {
        debug!(annotation = key, effect = ?rule.effect, "applying annotation");

        match rule.effect {
            AnnotationEffect::AddFilter(kind) => match kind {
                FilterKind::RewriteTarget => {
                    self.filters.push(HttpRouteFilter::replace_prefix_match(value));
                }
                FilterKind::HttpsRedirectIfTruthy => {
                    if is_truthy(value) {
                        self.filters.push(HttpRouteFilter::https_redirect());
                    }
                }
                FilterKind::HttpsRedirect => self.filters.push(HttpRouteFilter::https_redirect()),
            },
            AnnotationEffect::SetConfig(slot) => {
                self.gateway_config.set(slot, value, &mut self.warnings);
            }
            AnnotationEffect::Warn(hint) => self.warnings.push(hint.message(rule, key, value)),
            AnnotationEffect::TrackUnsupported { reason, hint } => {
                if let Some(hint) = hint {
                    self.warnings.push(hint.message(rule, key, value));
                }
                self.unsupported
                    .push(UnsupportedAnnotation::new(key, value, reason));
            }
        }
    }
}

/// An annotation which needs manual migration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnsupportedAnnotation {
    pub annotation: String,
    pub value: String,
    pub reason: String,
}

impl UnsupportedAnnotation {
    pub fn new(
        annotation: impl Into<String>,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            annotation: annotation.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }
}

impl Display for UnsupportedAnnotation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}={}", self.annotation, self.value)
    }
}

/// Folds the effects of every annotation known to `rule_set`.
fn interpret(annotations: &BTreeMap<String, String>, rule_set: &RuleSet) -> ParsedAnnotations {
    let mut parsed = ParsedAnnotations::default();

    for (key, value) in annotations {
        match rule_set.lookup(key) {
            Some(rule) => parsed.apply(rule, key, value),
            None if (rule_set.claims)(key) => {
                parsed.unsupported.push(UnsupportedAnnotation::new(
                    key,
                    value,
                    rule_set.unknown_reason,
                ));
            }
            None => {}
        }
    }

    parsed
}

/// Interprets nginx, Traefik and Istio annotations.
///
/// Unknown keys carrying one of these controllers' prefixes are reported as
/// unsupported, all other keys are ignored.
pub fn parse_annotations(annotations: &BTreeMap<String, String>) -> ParsedAnnotations {
    interpret(annotations, &GENERIC_RULES)
}

/// Interprets AWS Load Balancer Controller annotations
/// (`alb.ingress.kubernetes.io/*`).
pub fn parse_alb_annotations(annotations: &BTreeMap<String, String>) -> ParsedAnnotations {
    interpret(annotations, &ALB_RULE_SET)
}

/// Interprets GKE Ingress annotations.
pub fn parse_gce_annotations(annotations: &BTreeMap<String, String>) -> ParsedAnnotations {
    interpret(annotations, &GCE_RULE_SET)
}

/// Interprets ALB and GCE annotations independently and combines the results,
/// GCE config winning over ALB config.
pub fn parse_cloud_annotations(annotations: &BTreeMap<String, String>) -> ParsedAnnotations {
    parse_alb_annotations(annotations).combine(parse_gce_annotations(annotations))
}

/// Interprets the annotations of every supported controller.
pub fn parse_all_annotations(annotations: &BTreeMap<String, String>) -> ParsedAnnotations {
    parse_annotations(annotations).combine(parse_cloud_annotations(annotations))
}

/// Flattens warnings and unsupported annotations into display lines.
pub fn annotation_warnings(parsed: &ParsedAnnotations) -> Vec<String> {
    parsed
        .warnings
        .iter()
        .cloned()
        .chain(
            parsed
                .unsupported
                .iter()
                .map(|item| format!("Unsupported annotation: {item}")),
        )
        .collect()
}

/// The known AWS ALB annotations with their Gateway API equivalents.
pub fn alb_annotation_docs() -> &'static [AnnotationRule] {
    ALB_RULES
}

/// The known GCE annotations with their Gateway API equivalents.
pub fn gce_annotation_docs() -> &'static [AnnotationRule] {
    GCE_RULES
}
