/// Status of a stored subscription row. Deletion is a tombstone on the row, not a status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionStatus {
    /// Row exists but membership was not confirmed nor forced.
    Pending,
    Active,
    Unsubscribed,
}

impl SubscriptionStatus {
    pub fn is_unsubscribed(&self) -> bool {
        matches!(self, SubscriptionStatus::Unsubscribed)
    }

    /// Status a direct subscribe writes to a new row.
    pub fn for_subscribe(force_subscribe: bool) -> SubscriptionStatus {
        if force_subscribe {
            SubscriptionStatus::Active
        } else {
            SubscriptionStatus::Pending
        }
    }

    /// Status of a row after a subscribe lands on it. Active members stay active, anything
    /// else (including unsubscribed rows) takes the requested status.
    pub fn resubscribe(existing: Option<SubscriptionStatus>, requested: SubscriptionStatus) -> Self {
        match existing {
            Some(SubscriptionStatus::Active) => SubscriptionStatus::Active,
            _ => requested,
        }
    }

    pub fn parse(status: String) -> Result<SubscriptionStatus, String> {
        match status.as_str() {
            "pending" => Ok(SubscriptionStatus::Pending),
            "active" => Ok(SubscriptionStatus::Active),
            "unsubscribed" => Ok(SubscriptionStatus::Unsubscribed),
            _ => Err(format!("{} is not a valid subscription status", status)),
        }
    }
}

impl AsRef<str> for SubscriptionStatus {
    fn as_ref(&self) -> &str {
        match self {
            SubscriptionStatus::Pending => "pending",
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::Unsubscribed => "unsubscribed",
        }
    }
}
