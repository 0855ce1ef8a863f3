use std::collections::BTreeMap;

use uuid::Uuid;

use crate::domain::field::{Field, FieldKind, NewField, RESERVED_COLUMNS};
use crate::domain::mailing_list::MailingList;
use crate::domain::subscriber_email::SubscriberEmail;
use crate::domain::subscriber_name::SubscriberName;
use crate::domain::subscription::NewSubscription;
use crate::domain::subscription_input::SubscriptionInput;
use crate::engine::{SubscriptionEngine, SubscriptionError};

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(tag = "warning", rename_all = "snake_case")]
pub enum ResolveWarning {
    /// The field schema could not be loaded; only core identity fields were resolved.
    SchemaUnavailable,
    /// A field pointed at a column owned by the subscription row and was skipped.
    ReservedColumn { key: String, column: String },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedFields {
    pub attributes: BTreeMap<String, String>,
    pub warnings: Vec<ResolveWarning>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedSubscription {
    pub subscription: NewSubscription,
    pub warnings: Vec<ResolveWarning>,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct CreatedField {
    pub id: Uuid,
    pub tag: String,
}

/// Maps raw input onto the list's custom columns. Unknown input keys are ignored.
pub fn resolve_fields(fields: &[Field], input: &SubscriptionInput) -> ResolvedFields {
    let mut resolved = ResolvedFields::default();
    let mut write = |key: &str, column: &str, value: String| {
        if RESERVED_COLUMNS.contains(&column) {
            resolved.warnings.push(ResolveWarning::ReservedColumn {
                key: key.to_string(),
                column: column.to_string(),
            });
        } else {
            resolved.attributes.insert(column.to_string(), value);
        }
    };

    for field in fields {
        match &field.kind {
            FieldKind::Plain { column } => {
                if let Some(raw) = input.get(&field.key.to_uppercase()) {
                    write(&field.key, column, field.field_type.coerce(raw));
                }
            }
            FieldKind::Group { options } => {
                for option in options {
                    if let Some(raw) = input.get(&option.key.to_uppercase()) {
                        write(&option.key, &option.column, option.field_type.coerce(raw));
                    }
                }
            }
        }
    }

    resolved
}

impl SubscriptionEngine {
    /// Builds the subscription record for `list` from raw input. Core identity comes from
    /// `EMAIL`, `FIRST_NAME`, `LAST_NAME` and `TIMEZONE`; custom fields only ever land in the
    /// attribute map. A schema that fails to load degrades to no custom fields.
    #[tracing::instrument(name = "Resolve subscription fields", skip(self, list, input), fields(list_id = %list.id))]
    pub async fn resolve_subscription(
        &self,
        list: &MailingList,
        input: &SubscriptionInput,
    ) -> Result<ResolvedSubscription, SubscriptionError> {
        let email = input
            .non_empty("EMAIL")
            .ok_or_else(|| SubscriptionError::Invalid(String::from("Missing EMAIL")))?;
        let email =
            SubscriberEmail::parse(email.to_string()).map_err(SubscriptionError::Invalid)?;
        let first_name = SubscriberName::parse_optional(input.get("FIRST_NAME"))
            .map_err(SubscriptionError::Invalid)?;
        let last_name = SubscriberName::parse_optional(input.get("LAST_NAME"))
            .map_err(SubscriptionError::Invalid)?;
        let timezone = input.non_empty("TIMEZONE").map(String::from);

        let (fields, mut warnings) = match self.stores.fields.fields_for_list(list.id).await {
            Ok(fields) => (fields, vec![]),
            Err(err) => {
                tracing::warn!("Failed to load fields, resolving without them: {:?}", err);
                (vec![], vec![ResolveWarning::SchemaUnavailable])
            }
        };
        let resolved = resolve_fields(&fields, input);
        warnings.extend(resolved.warnings);

        Ok(ResolvedSubscription {
            subscription: NewSubscription {
                email,
                first_name,
                last_name,
                timezone,
                attributes: resolved.attributes,
            },
            warnings,
        })
    }

    #[tracing::instrument(name = "Create a list field", skip(self, list), fields(list_id = %list.id))]
    pub async fn create_field(
        &self,
        list: &MailingList,
        field: NewField,
    ) -> Result<CreatedField, SubscriptionError> {
        if let Some(group_id) = field.group {
            let group = self
                .stores
                .fields
                .get_record(list.id, group_id)
                .await?
                .ok_or_else(|| {
                    SubscriptionError::Invalid(String::from("Selected group field not found"))
                })?;

            if !group.field_type.is_group() {
                return Err(SubscriptionError::Invalid(format!(
                    "{} is not a group field",
                    group.key
                )));
            }
        }

        let record = self.stores.fields.insert(field.into_record(list.id)).await?;

        Ok(CreatedField {
            id: record.id,
            tag: record.key,
        })
    }
}
