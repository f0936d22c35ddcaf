use std::collections::BTreeMap;

/// A type that can be merged with itself.
///
/// Annotation interpretation produces configuration fragments from several
/// controller dialects. When two fragments set the same value, the fragment
/// that is merged *into* takes precedence.
///
/// # Example
///
/// ```
/// # use ingress2gateway::merge::Merge;
/// let mut scheme = Some("internal".to_owned());
/// scheme.merge(&Some("internet-facing".to_owned()));
/// assert_eq!(scheme.as_deref(), Some("internal"));
///
/// let mut target_type: Option<String> = None;
/// target_type.merge(&Some("ip".to_owned()));
/// assert_eq!(target_type.as_deref(), Some("ip"));
/// ```
pub trait Merge {
    /// Merge with `defaults`, preferring values from `self` if they are set there
    fn merge(&mut self, defaults: &Self);
}

/// Moving version of [`Merge::merge`], to produce slightly nicer test output
pub fn merge<T: Merge>(mut overrides: T, defaults: &T) -> T {
    overrides.merge(defaults);
    overrides
}

/// A marker trait for types that are merged atomically (as one single value) rather than
/// trying to merge each field individually
pub trait Atomic: Clone {}
impl Atomic for u16 {}
impl Atomic for u32 {}
impl Atomic for bool {}
impl Atomic for String {}
impl<T: Clone> Atomic for Vec<T> {}
impl<K: Clone, V: Clone> Atomic for BTreeMap<K, V> {}

impl<T: Atomic> Merge for Option<T> {
    fn merge(&mut self, defaults: &Self) {
        if self.is_none() {
            *self = defaults.clone();
        }
    }
}

/// Implements [`Merge`] for a struct by merging each listed field.
macro_rules! impl_merge_fields {
    ($ty:ty { $($field:ident),+ $(,)? }) => {
        impl $crate::merge::Merge for $ty {
            fn merge(&mut self, defaults: &Self) {
                $($crate::merge::Merge::merge(&mut self.$field, &defaults.$field);)+
            }
        }
    };
}

pub(crate) use impl_merge_fields;

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default, PartialEq, Eq)]
    struct Mergeable {
        one: Option<u16>,
        two: Option<Vec<String>>,
    }

    impl_merge_fields!(Mergeable { one, two });

    #[test]
    fn merge_prefers_overrides() {
        assert_eq!(
            merge(
                Mergeable {
                    one: Some(0),
                    two: None,
                },
                &Mergeable {
                    one: Some(1),
                    two: Some(vec!["a".to_owned()]),
                }
            ),
            Mergeable {
                one: Some(0),
                two: Some(vec!["a".to_owned()]),
            }
        );
    }

    #[test]
    fn merge_lists_atomically() {
        let mut list = Some(vec!["a".to_owned()]);
        list.merge(&Some(vec!["b".to_owned(), "c".to_owned()]));
        assert_eq!(list, Some(vec!["a".to_owned()]));
    }
}
