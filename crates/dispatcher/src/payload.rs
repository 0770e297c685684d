// Copyright 2025 Crrow
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Events as handed to the dispatcher.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Key under which this dispatcher appears in integration settings.
pub const BEACON_INTEGRATION_KEY: &str = "Beacon";
/// Payload field holding per-integration settings.
pub const INTEGRATIONS_FIELD: &str = "integrations";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, derive_more::Display)]
#[serde(rename_all = "snake_case")]
pub enum PayloadKind {
    Identify,
    Track,
    Screen,
    Alias,
    Group,
}

/// One event record: its kind plus arbitrary JSON fields.
///
/// Serialized as a flat object, `{"type":"track", ...fields}`, with fields in
/// insertion order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payload {
    #[serde(rename = "type")]
    pub kind:   PayloadKind,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Payload {
    #[must_use]
    pub fn new(kind: PayloadKind) -> Self {
        Self {
            kind,
            fields: Map::new(),
        }
    }

    /// A `track` payload for `event`.
    #[must_use]
    pub fn track<S: Into<String>>(event: S) -> Self {
        Self::new(PayloadKind::Track).with_field("event", Value::String(event.into()))
    }

    /// A `screen` payload for the screen called `name`.
    #[must_use]
    pub fn screen<S: Into<String>>(name: S) -> Self {
        Self::new(PayloadKind::Screen).with_field("name", Value::String(name.into()))
    }

    /// An `identify` payload for `user_id`.
    #[must_use]
    pub fn identify<S: Into<String>>(user_id: S) -> Self {
        Self::new(PayloadKind::Identify).with_field("userId", Value::String(user_id.into()))
    }

    #[must_use]
    pub fn with_field<K: Into<String>>(mut self, key: K, value: Value) -> Self {
        self.fields.insert(key.into(), value);
        self
    }

    /// Serializes the payload as it is stored in the queue.
    ///
    /// The payload's own `integrations` object is overlaid with `bundled`
    /// and stripped of [`BEACON_INTEGRATION_KEY`]. `self` is left as is.
    pub fn to_wire(&self, bundled: &Map<String, Value>) -> serde_json::Result<Vec<u8>> {
        let mut fields = self.fields.clone();
        let mut integrations = match fields.shift_remove(INTEGRATIONS_FIELD) {
            Some(Value::Object(map)) => map,
            _ => Map::new(),
        };
        for (key, value) in bundled {
            integrations.insert(key.clone(), value.clone());
        }
        integrations.shift_remove(BEACON_INTEGRATION_KEY);
        fields.insert(INTEGRATIONS_FIELD.to_string(), Value::Object(integrations));

        serde_json::to_vec(&Self {
            kind: self.kind,
            fields,
        })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn bundled() -> Map<String, Value> {
        let Value::Object(map) = json!({"Mixpanel": {"token": "t"}, "Beacon": true}) else {
            unreachable!()
        };
        map
    }

    #[test]
    fn test_wire_form_merges_integrations() {
        let payload = Payload::track("Purchased")
            .with_field("integrations", json!({"Amplitude": false, "Mixpanel": false}));

        let wire: Value = serde_json::from_slice(&payload.to_wire(&bundled()).unwrap()).unwrap();

        assert_eq!(wire["type"], "track");
        assert_eq!(wire["event"], "Purchased");
        assert_eq!(
            wire["integrations"],
            json!({"Amplitude": false, "Mixpanel": {"token": "t"}})
        );
        // caller's copy untouched
        assert_eq!(payload.fields["integrations"]["Mixpanel"], false);
    }

    #[test]
    fn test_wire_form_without_integrations() {
        let payload = Payload::identify("user-1");
        let wire = payload.to_wire(&Map::new()).unwrap();
        assert_eq!(
            std::str::from_utf8(&wire).unwrap(),
            r#"{"type":"identify","userId":"user-1","integrations":{}}"#
        );
    }

    #[test]
    fn test_own_key_is_removed_from_payload_integrations() {
        let payload = Payload::screen("Home").with_field("integrations", json!({"Beacon": false}));
        let wire: Value = serde_json::from_slice(&payload.to_wire(&Map::new()).unwrap()).unwrap();
        assert_eq!(wire["integrations"], json!({}));
    }

    #[test]
    fn test_deserialize_flat_object() {
        let payload: Payload =
            serde_json::from_str(r#"{"type":"alias","previousId":"a","userId":"b"}"#).unwrap();
        assert_eq!(payload.kind, PayloadKind::Alias);
        assert_eq!(payload.fields.len(), 2);
    }
}
