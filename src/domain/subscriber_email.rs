use validator::validate_email;

/// A syntactically valid, normalized (trimmed and lower-cased) email address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SubscriberEmail(String);

impl SubscriberEmail {
    pub fn parse(email: String) -> Result<SubscriberEmail, String> {
        let normalized = email.trim().to_lowercase();

        if normalized.is_empty() {
            return Err(String::from("Missing EMAIL"));
        }

        if !validate_email(&normalized) {
            return Err(format!("{} email is not valid", email.trim()));
        }

        Ok(Self(normalized))
    }

    pub fn domain(&self) -> &str {
        self.0.rsplit_once('@').map(|(_, domain)| domain).unwrap_or("")
    }
}

impl AsRef<str> for SubscriberEmail {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SubscriberEmail {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for SubscriberEmail {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        SubscriberEmail::parse(value)
    }
}

impl From<SubscriberEmail> for String {
    fn from(email: SubscriberEmail) -> Self {
        email.0
    }
}

/// Email validation collaborator. `strict` asks for the stricter policy applied to
/// addresses that replace an existing subscription's email.
pub trait EmailValidator: Send + Sync {
    fn validate(&self, email: &SubscriberEmail, strict: bool) -> Result<(), String>;
}

/// Default validator: RFC syntax always, plus a dotted, alphabetic top-level domain
/// and no IP literal when strict.
#[derive(Debug, Default, Clone)]
pub struct SyntaxEmailValidator;

impl EmailValidator for SyntaxEmailValidator {
    fn validate(&self, email: &SubscriberEmail, strict: bool) -> Result<(), String> {
        if !validate_email(email.as_ref()) {
            return Err(format!("{} email is not valid", email));
        }

        if !strict {
            return Ok(());
        }

        let domain = email.domain();
        let has_alphabetic_tld = domain
            .rsplit_once('.')
            .map(|(host, tld)| {
                !host.is_empty() && tld.len() >= 2 && tld.chars().all(|c| c.is_ascii_alphabetic())
            })
            .unwrap_or(false);

        if domain.starts_with('[') || !has_alphabetic_tld {
            return Err(format!("{} email is not valid", email));
        }

        Ok(())
    }
}
