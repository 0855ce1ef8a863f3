use std::collections::HashMap;

/// Raw request input folded once at the boundary: keys trimmed and upper-cased,
/// values trimmed. Everything downstream reads it as-is.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubscriptionInput {
    values: HashMap<String, String>,
}

impl SubscriptionInput {
    pub fn from_pairs<K, V, I>(pairs: I) -> SubscriptionInput
    where
        K: AsRef<str>,
        V: AsRef<str>,
        I: IntoIterator<Item = (K, V)>,
    {
        let values = pairs
            .into_iter()
            .map(|(key, value)| {
                (
                    key.as_ref().trim().to_uppercase(),
                    value.as_ref().trim().to_string(),
                )
            })
            .collect();

        SubscriptionInput { values }
    }

    /// Builds the input from a JSON object body. Non-string scalars are rendered as text,
    /// `null` becomes an empty value.
    pub fn from_json(body: &serde_json::Map<String, serde_json::Value>) -> SubscriptionInput {
        SubscriptionInput::from_pairs(body.iter().map(|(key, value)| {
            let value = match value {
                serde_json::Value::String(text) => text.clone(),
                serde_json::Value::Null => String::new(),
                other => other.to_string(),
            };
            (key.clone(), value)
        }))
    }

    /// `key` must already be upper-case.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Present and non-empty.
    pub fn non_empty(&self, key: &str) -> Option<&str> {
        self.get(key).filter(|value| !value.is_empty())
    }

    pub fn flag(&self, key: &str) -> bool {
        self.get(key).map_or(false, is_truthy_flag)
    }
}

/// `yes`, `true` or `1`, case-insensitive.
pub fn is_truthy_flag(value: &str) -> bool {
    matches!(
        value.trim().to_lowercase().as_str(),
        "yes" | "true" | "1"
    )
}

/// `false`, `no`, `0` and the empty string are false, everything else is true.
pub fn is_falsy_value(value: &str) -> bool {
    matches!(
        value.trim().to_lowercase().as_str(),
        "false" | "no" | "0" | ""
    )
}
