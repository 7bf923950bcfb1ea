//! Deep merge of option mappings.

use crate::value::{Map, Value};

/// Merges `overlay` into `base` in place and returns it.
///
/// Mapping values merge recursively; any other overlay value (including
/// sequences) replaces the base value wholesale. A non-mapping base value met
/// by a mapping overlay is replaced by a fresh mapping first.
pub fn merge_into<'a>(overlay: &Map, base: &'a mut Map) -> &'a mut Map {
    for (key, value) in overlay {
        match value {
            Value::Map(nested) => {
                let node = base
                    .entry(key.clone())
                    .or_insert_with(|| Value::Map(Map::new()));
                if !matches!(node, Value::Map(_)) {
                    *node = Value::Map(Map::new());
                }
                if let Value::Map(node) = node {
                    merge_into(nested, node);
                }
            }
            other => {
                base.insert(key.clone(), other.clone());
            }
        }
    }
    base
}

/// Returns `overlay` merged over a copy of `base`; neither input changes.
pub fn merge(overlay: &Map, base: &Map) -> Map {
    let mut out = base.clone();
    merge_into(overlay, &mut out);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::literal::parse;
    use crate::value::Key;

    fn map(text: &str) -> Map {
        match parse(text).unwrap() {
            Value::Map(map) => map,
            other => panic!("expected mapping, got {other:?}"),
        }
    }

    #[test]
    fn nested_mappings_merge_and_overlay_wins() {
        let base = map("{first={inn={foo='dog', n=1}}}");
        let overlay = map("{first={inn={bar='cat', n=5}}}");
        let merged = merge(&overlay, &base);
        assert_eq!(merged, map("{first={inn={foo='dog', bar='cat', n=5}}}"));
    }

    #[test]
    fn copy_leaves_inputs_untouched() {
        let base = map("{pdf={width='8.27in', margin={top='1in'}}}");
        let overlay = map("{pdf={margin={top='2in'}}, waitFor=1000}");
        let (base_before, overlay_before) = (base.clone(), overlay.clone());
        let merged = merge(&overlay, &base);
        assert_eq!(base, base_before);
        assert_eq!(overlay, overlay_before);
        assert_eq!(
            merged,
            map("{pdf={width='8.27in', margin={top='2in'}}, waitFor=1000}")
        );
    }

    #[test]
    fn in_place_merge_mutates_base() {
        let mut base = map("{goto={timeout=1}}");
        merge_into(&map("{goto={timeout=2}}"), &mut base);
        assert_eq!(base, map("{goto={timeout=2}}"));
    }

    #[test]
    fn sequences_are_replaced_not_concatenated() {
        let base = map("{launch={args=['--a', '--b']}}");
        let merged = merge(&map("{launch={args=['--c']}}"), &base);
        assert_eq!(merged, map("{launch={args=['--c']}}"));
    }

    #[test]
    fn null_overlay_overwrites() {
        let base = map("{goto={timeout=1}}");
        let merged = merge(&map("{goto=None}"), &base);
        assert_eq!(merged[&Key::name("goto")], Value::Null);
    }

    #[test]
    fn mapping_overlay_replaces_scalar_base() {
        let base = map("{waitFor=[1000]}");
        let merged = merge(&map("{waitFor={(): ['#ready'], timeout=5}}"), &base);
        assert_eq!(merged, map("{waitFor={(): ['#ready'], timeout=5}}"));
    }

    #[test]
    fn merge_is_idempotent() {
        let base = map("{pdf={width='8.27in', margin={top='1in', left='1in'}}, goto={timeout=1}}");
        let overlay = map("{pdf={printBackground=False, margin={top='0'}}, waitFor=[1]}");
        let once = merge(&overlay, &base);
        let twice = merge(&overlay, &once);
        assert_eq!(once, twice);
    }
}
