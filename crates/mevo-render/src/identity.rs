//! How entities are matched to primitive ids across cycles.

use mevo_types::{EntityKey, Feature};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Strategy for deriving an [`EntityKey`] from a feature.
///
/// `Positional` reproduces the feed's ordinal numbering: the k-th feature of
/// every cycle reuses the k-th feature's ids. `FeatureKey` keys entities by a
/// stable value the feed provides, so an entity keeps its primitives when the
/// feed reorders.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum IdentityStrategy {
    /// Key by position in the feature array.
    #[default]
    Positional,
    /// Key by a property (or the feature `id` when `property` is unset).
    FeatureKey {
        /// Property to read the key from.
        #[serde(default)]
        property: Option<String>,
    },
}

impl IdentityStrategy {
    /// Key for the feature at `index`.
    ///
    /// Under `FeatureKey`, a feature without a usable value falls back to the
    /// feature `id`, then to a positional fallback key.
    pub fn key_for(&self, index: usize, feature: &Feature) -> EntityKey {
        match self {
            Self::Positional => EntityKey::positional(index),
            Self::FeatureKey { property } => property
                .as_deref()
                .and_then(|name| feature.property(name))
                .and_then(value_key)
                .or_else(|| {
                    feature
                        .id
                        .as_ref()
                        .and_then(|id| EntityKey::escaped(&id.to_string()))
                })
                .unwrap_or_else(|| EntityKey::fallback(index)),
        }
    }
}

fn value_key(value: &Value) -> Option<EntityKey> {
    match value {
        Value::String(text) => EntityKey::escaped(text),
        Value::Number(number) => EntityKey::escaped(&number.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use mevo_types::{FeatureId, Geometry};
    use serde_json::{Map, json};

    use super::*;

    fn feature(properties: Value, id: Option<FeatureId>) -> Feature {
        let map: Map<String, Value> = properties.as_object().cloned().unwrap_or_default();
        let mut feature = Feature::new(
            Geometry::Point {
                coordinates: vec![174.78, -41.29],
            },
            map,
        );
        feature.id = id;
        feature
    }

    #[test]
    fn positional_uses_index() {
        let f = feature(json!({"vehicleId": "abc"}), None);
        assert_eq!(IdentityStrategy::Positional.key_for(3, &f).as_str(), "3");
    }

    #[test]
    fn feature_key_prefers_property_then_id_then_fallback() {
        let strategy = IdentityStrategy::FeatureKey {
            property: Some("vehicleId".to_owned()),
        };
        let with_property = feature(
            json!({"vehicleId": "WLG 42"}),
            Some(FeatureId::Text("other".to_owned())),
        );
        assert_eq!(strategy.key_for(0, &with_property).as_str(), "WLG-2042");

        let with_id = feature(json!({}), Some(FeatureId::Number(7.into())));
        assert_eq!(strategy.key_for(0, &with_id).as_str(), "7");

        let bare = feature(json!({"vehicleId": true}), None);
        assert_eq!(strategy.key_for(5, &bare).as_str(), "pos5");
    }

    #[test]
    fn deserializes_from_config() {
        let strategy: IdentityStrategy =
            serde_json::from_value(json!({"strategy": "feature_key", "property": "id"}))
                .unwrap_or_default();
        assert_eq!(
            strategy,
            IdentityStrategy::FeatureKey {
                property: Some("id".to_owned())
            }
        );
    }
}
