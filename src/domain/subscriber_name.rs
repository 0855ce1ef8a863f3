use unicode_segmentation::UnicodeSegmentation;

const MAX_CHAR_LENGHT: usize = 256;

/// First or last name of a subscriber. Free text: anything is accepted once trimmed, names past
/// the length cap are cut at a grapheme boundary.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SubscriberName(String);

impl SubscriberName {
    pub fn parse(name: String) -> Result<SubscriberName, String> {
        let name = name.trim();

        if name.is_empty() {
            return Err(String::from("A subscriber name can not be blank"));
        }

        Ok(Self(name.graphemes(true).take(MAX_CHAR_LENGHT).collect()))
    }

    /// Absent or blank input means "not supplied" rather than an invalid name.
    pub fn parse_optional(name: Option<&str>) -> Result<Option<SubscriberName>, String> {
        match name.map(str::trim) {
            None | Some("") => Ok(None),
            Some(name) => SubscriberName::parse(name.to_string()).map(Some),
        }
    }
}

impl AsRef<str> for SubscriberName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for SubscriberName {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        SubscriberName::parse(value)
    }
}

impl From<SubscriberName> for String {
    fn from(name: SubscriberName) -> Self {
        name.0
    }
}
