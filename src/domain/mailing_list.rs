use chrono::{DateTime, Utc};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct MailingList {
    pub id: Uuid,
    pub cid: String,
    pub name: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewMailingList {
    pub name: String,
    pub description: String,
}

impl NewMailingList {
    pub fn parse(name: &str, description: &str) -> Result<NewMailingList, String> {
        let name = name.trim();

        if name.is_empty() {
            return Err(String::from("NAME argument is required"));
        }

        Ok(NewMailingList {
            name: name.to_string(),
            description: description.trim().to_string(),
        })
    }
}

impl MailingList {
    /// A list is addressed by its internal id, its public cid or its name.
    pub fn matches_identifier(&self, identifier: &str) -> bool {
        let identifier = identifier.trim();

        self.cid == identifier
            || self.name == identifier
            || Uuid::parse_str(identifier).map_or(false, |id| id == self.id)
    }
}
