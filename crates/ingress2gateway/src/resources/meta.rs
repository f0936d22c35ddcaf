use std::collections::BTreeMap;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

/// The namespace assumed for resources which don't specify one.
pub const DEFAULT_NAMESPACE: &str = "default";

/// A builder to build [`ObjectMeta`] objects.
///
/// Only the fields the converters ever populate are supported: name, namespace
/// and annotations.
#[derive(Clone, Debug, Default)]
pub struct ObjectMetaBuilder {
    name: Option<String>,
    namespace: Option<String>,
    annotations: Option<BTreeMap<String, String>>,
}

impl ObjectMetaBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(&mut self, name: impl Into<String>) -> &mut Self {
        self.name = Some(name.into());
        self
    }

    pub fn name_opt(&mut self, name: impl Into<Option<String>>) -> &mut Self {
        self.name = name.into();
        self
    }

    pub fn namespace(&mut self, namespace: impl Into<String>) -> &mut Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn namespace_opt(&mut self, namespace: impl Into<Option<String>>) -> &mut Self {
        self.namespace = namespace.into();
        self
    }

    /// This adds a single annotation to the existing annotations.
    /// It'll override an annotation with the same key.
    pub fn with_annotation(
        &mut self,
        annotation_key: impl Into<String>,
        annotation_value: impl Into<String>,
    ) -> &mut Self {
        self.annotations
            .get_or_insert_with(BTreeMap::new)
            .insert(annotation_key.into(), annotation_value.into());
        self
    }

    /// This adds multiple annotations to the existing annotations.
    /// Any existing annotation with a key that is contained in `annotations` will be overwritten
    pub fn with_annotations(&mut self, annotations: BTreeMap<String, String>) -> &mut Self {
        self.annotations
            .get_or_insert_with(BTreeMap::new)
            .extend(annotations);
        self
    }

    pub fn build(&self) -> ObjectMeta {
        ObjectMeta {
            name: self.name.clone(),
            namespace: self.namespace.clone(),
            annotations: self.annotations.clone(),
            ..ObjectMeta::default()
        }
    }
}

/// Read-only accessors with the fallbacks used throughout the conversion.
pub trait ObjectMetaExt {
    /// Returns the name, or `default` if none is set.
    fn name_or<'a>(&'a self, default: &'a str) -> &'a str;

    /// Returns the namespace, falling back to [`DEFAULT_NAMESPACE`].
    fn namespace_or_default(&self) -> &str;

    /// Returns the annotations, or an empty map.
    fn annotations_or_empty(&self) -> BTreeMap<String, String>;
}

impl ObjectMetaExt for ObjectMeta {
    fn name_or<'a>(&'a self, default: &'a str) -> &'a str {
        self.name.as_deref().unwrap_or(default)
    }

    fn namespace_or_default(&self) -> &str {
        self.namespace.as_deref().unwrap_or(DEFAULT_NAMESPACE)
    }

    fn annotations_or_empty(&self) -> BTreeMap<String, String> {
        self.annotations.clone().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_objectmeta_builder() {
        let meta = ObjectMetaBuilder::new()
            .name("web")
            .namespace("shop")
            .with_annotation("foo", "bar")
            .with_annotations(BTreeMap::from([
                ("foo".to_owned(), "baz".to_owned()),
                ("konghq.com/strip-path".to_owned(), "true".to_owned()),
            ]))
            .build();

        assert_eq!(meta.name.as_deref(), Some("web"));
        assert_eq!(meta.namespace.as_deref(), Some("shop"));
        let annotations = meta.annotations.expect("annotations are set");
        assert_eq!(annotations.len(), 2);
        assert_eq!(annotations.get("foo").map(String::as_str), Some("baz"));
    }

    #[test]
    fn fallbacks_apply_to_empty_metadata() {
        let meta = ObjectMeta::default();

        assert_eq!(meta.name_or("converted-gateway"), "converted-gateway");
        assert_eq!(meta.namespace_or_default(), DEFAULT_NAMESPACE);
        assert!(meta.annotations_or_empty().is_empty());
    }
}
