use serde_json::{Map, Value};

/// Free-form payment metadata.
pub type Metadata = Map<String, Value>;

/// Which side wins when both maps carry the same key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precedence {
    /// Keep the value already in `base`.
    Existing,
    /// Overwrite with the value from `incoming`.
    Incoming,
}

/// Merges `incoming` into `base`. Keys are only ever added or replaced, never removed.
pub fn merge_metadata(base: &mut Metadata, incoming: Metadata, precedence: Precedence) {
    for (key, value) in incoming {
        match precedence {
            Precedence::Incoming => {
                base.insert(key, value);
            }
            Precedence::Existing => {
                base.entry(key).or_insert(value);
            }
        }
    }
}

/// Builds a `Metadata` map out of `(key, value)` pairs.
pub fn metadata_from<I, K>(pairs: I) -> Metadata
where
    I: IntoIterator<Item = (K, Value)>,
    K: Into<String>,
{
    pairs.into_iter().map(|(k, v)| (k.into(), v)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_incoming_precedence_overwrites_but_keeps_other_keys() {
        let mut base = metadata_from([("a", json!(1)), ("b", json!(2))]);
        merge_metadata(
            &mut base,
            metadata_from([("b", json!(20)), ("c", json!(30))]),
            Precedence::Incoming,
        );
        assert_eq!(Value::Object(base), json!({"a": 1, "b": 20, "c": 30}));
    }

    #[test]
    fn test_existing_precedence_only_adds() {
        let mut base = metadata_from([("initialized_at", json!("t0"))]);
        merge_metadata(
            &mut base,
            metadata_from([("initialized_at", json!("forged")), ("order", json!("o-1"))]),
            Precedence::Existing,
        );
        assert_eq!(
            Value::Object(base),
            json!({"initialized_at": "t0", "order": "o-1"})
        );
    }
}
