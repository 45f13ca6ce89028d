//! Type compatibility, the gate for accepting links.

use super::model::{KindSpec, OptionType};
use crate::value::values_equal;

impl OptionType {
    /// Whether values of this type always fit `other`.
    ///
    /// Kinds must match. Bounds of this type must be no wider than the
    /// bounds of `other`; enums need identical value sets, classes identical
    /// names. Maps and collections compare children pairwise over the smaller
    /// child set.
    pub fn is_compatible(&self, other: &OptionType) -> bool {
        if self.kind != other.kind {
            return false;
        }

        match (&self.spec, &other.spec) {
            (
                KindSpec::Number { min, max },
                KindSpec::Number {
                    min: other_min,
                    max: other_max,
                },
            ) => lower_within(*min, *other_min) && upper_within(*max, *other_max),
            (
                KindSpec::String {
                    pattern,
                    min_len,
                    max_len,
                },
                KindSpec::String {
                    pattern: other_pattern,
                    min_len: other_min,
                    max_len: other_max,
                },
            ) => {
                let pattern_ok = match (pattern, other_pattern) {
                    (_, None) => true,
                    (Some(own), Some(theirs)) => own.as_str() == theirs.as_str(),
                    (None, Some(_)) => false,
                };
                pattern_ok
                    && lower_within(min_len.map(|v| v as f64), other_min.map(|v| v as f64))
                    && upper_within(max_len.map(|v| v as f64), other_max.map(|v| v as f64))
            }
            (KindSpec::Enum { allows }, KindSpec::Enum { allows: theirs }) => {
                allows
                    .iter()
                    .all(|a| theirs.iter().any(|b| values_equal(a, b)))
                    && theirs
                        .iter()
                        .all(|b| allows.iter().any(|a| values_equal(a, b)))
            }
            (
                KindSpec::Mixed { alternatives },
                KindSpec::Mixed {
                    alternatives: theirs,
                },
            ) => {
                alternatives.len() == theirs.len()
                    && alternatives.iter().all(|own| {
                        theirs
                            .iter()
                            .any(|t| t.kind == own.kind && own.is_compatible(t))
                    })
            }
            (KindSpec::Class { class }, KindSpec::Class { class: theirs }) => class == theirs,
            (KindSpec::Map { children }, KindSpec::Map { children: theirs }) => {
                let own_is_smaller = children.len() <= theirs.len();
                let (smaller, larger) = if own_is_smaller {
                    (children, theirs)
                } else {
                    (theirs, children)
                };
                smaller.iter().all(|(name, child)| {
                    larger
                        .iter()
                        .find(|(n, _)| n == name)
                        .is_some_and(|(_, counterpart)| {
                            if own_is_smaller {
                                child.is_compatible(counterpart)
                            } else {
                                counterpart.is_compatible(child)
                            }
                        })
                })
            }
            (KindSpec::ArrayCollection { proto }, KindSpec::ArrayCollection { proto: theirs }) => {
                proto.is_compatible(theirs)
            }
            (
                KindSpec::ObjectCollection { proto, options },
                KindSpec::ObjectCollection {
                    proto: their_proto,
                    options: their_options,
                },
            ) => proto.is_compatible(their_proto) && options.is_compatible(their_options),
            _ => true,
        }
    }
}

fn lower_within(own: Option<f64>, other: Option<f64>) -> bool {
    match other {
        None => true,
        Some(bound) => own.is_some_and(|v| v >= bound),
    }
}

fn upper_within(own: Option<f64>, other: Option<f64>) -> bool {
    match other {
        None => true,
        Some(bound) => own.is_some_and(|v| v <= bound),
    }
}
