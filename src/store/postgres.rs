use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::postgres::PgRow;
use sqlx::types::Json;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::domain::cid::generate_cid;
use crate::domain::field::{Field, FieldRecord, FieldType};
use crate::domain::mailing_list::{MailingList, NewMailingList};
use crate::domain::subscriber_email::SubscriberEmail;
use crate::domain::subscriber_name::SubscriberName;
use crate::domain::subscription::{NewSubscription, Subscription};
use crate::domain::subscription_status::SubscriptionStatus;
use crate::store::{BlacklistStore, FieldStore, ListStore, StoreError, SubscriptionStore};

const UNIQUE_VIOLATION: &str = "23505";

const SUBSCRIPTION_COLUMNS: &str = "id, cid, list_id, email, first_name, last_name, tz, \
     attributes, status, created_at, updated_at, deleted_at";

const FIELD_COLUMNS: &str = "id, list_id, name, key, description, column_name, field_type, \
     group_id, group_template, default_value, visible";

pub struct PgStore {
    db_pool: PgPool,
}

impl PgStore {
    pub fn new(db_pool: PgPool) -> PgStore {
        PgStore { db_pool }
    }
}

pub async fn migrate(db_pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(db_pool).await
}

fn duplicate_or_database(err: sqlx::Error, message: impl FnOnce() -> String) -> StoreError {
    match &err {
        sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some(UNIQUE_VIOLATION) => {
            StoreError::Duplicate(message())
        }
        _ => StoreError::Database(err),
    }
}

fn to_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn list_from_row(row: &PgRow) -> Result<MailingList, StoreError> {
    Ok(MailingList {
        id: row.try_get("id")?,
        cid: row.try_get("cid")?,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        created_at: row.try_get("created_at")?,
    })
}

fn field_from_row(row: &PgRow) -> Result<FieldRecord, StoreError> {
    let field_type: String = row.try_get("field_type")?;

    Ok(FieldRecord {
        id: row.try_get("id")?,
        list_id: row.try_get("list_id")?,
        name: row.try_get("name")?,
        key: row.try_get("key")?,
        description: row.try_get("description")?,
        column: row.try_get("column_name")?,
        field_type: FieldType::parse(&field_type).map_err(StoreError::Corrupted)?,
        group: row.try_get("group_id")?,
        group_template: row.try_get("group_template")?,
        default_value: row.try_get("default_value")?,
        visible: row.try_get("visible")?,
    })
}

fn optional_name(row: &PgRow, column: &str) -> Result<Option<SubscriberName>, StoreError> {
    let name: Option<String> = row.try_get(column)?;

    SubscriberName::parse_optional(name.as_deref()).map_err(StoreError::Corrupted)
}

fn subscription_from_row(row: &PgRow) -> Result<Subscription, StoreError> {
    let attributes: Json<BTreeMap<String, String>> = row.try_get("attributes")?;

    Ok(Subscription {
        id: row.try_get("id")?,
        cid: row.try_get("cid")?,
        list_id: row.try_get("list_id")?,
        email: SubscriberEmail::parse(row.try_get("email")?).map_err(StoreError::Corrupted)?,
        first_name: optional_name(row, "first_name")?,
        last_name: optional_name(row, "last_name")?,
        timezone: row.try_get("tz")?,
        attributes: attributes.0,
        status: SubscriptionStatus::parse(row.try_get("status")?).map_err(StoreError::Corrupted)?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        deleted_at: row.try_get("deleted_at")?,
    })
}

#[async_trait]
impl ListStore for PgStore {
    #[tracing::instrument(name = "Insert a new list into the database", skip(self))]
    async fn insert(&self, list: NewMailingList) -> Result<MailingList, StoreError> {
        let row = sqlx::query(
            r#"
            INSERT INTO lists (id, cid, name, description, created_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, cid, name, description, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(generate_cid())
        .bind(&list.name)
        .bind(&list.description)
        .bind(Utc::now())
        .fetch_one(&self.db_pool)
        .await?;

        list_from_row(&row)
    }

    async fn get(&self, id: Uuid) -> Result<Option<MailingList>, StoreError> {
        sqlx::query("SELECT id, cid, name, description, created_at FROM lists WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.db_pool)
            .await?
            .as_ref()
            .map(list_from_row)
            .transpose()
    }

    async fn find_by_identifier(&self, identifier: &str) -> Result<Option<MailingList>, StoreError> {
        sqlx::query(
            r#"
            SELECT id, cid, name, description, created_at
            FROM lists
            WHERE cid = $1 OR name = $1 OR id::text = $1
            ORDER BY created_at
            LIMIT 1
            "#,
        )
        .bind(identifier.trim())
        .fetch_optional(&self.db_pool)
        .await?
        .as_ref()
        .map(list_from_row)
        .transpose()
    }

    async fn all(&self) -> Result<Vec<MailingList>, StoreError> {
        sqlx::query("SELECT id, cid, name, description, created_at FROM lists ORDER BY created_at")
            .fetch_all(&self.db_pool)
            .await?
            .iter()
            .map(list_from_row)
            .collect()
    }
}

#[async_trait]
impl FieldStore for PgStore {
    async fn fields_for_list(&self, list_id: Uuid) -> Result<Vec<Field>, StoreError> {
        let records = sqlx::query(&format!(
            "SELECT {} FROM fields WHERE list_id = $1 ORDER BY created_at, id",
            FIELD_COLUMNS
        ))
        .bind(list_id)
        .fetch_all(&self.db_pool)
        .await?
        .iter()
        .map(field_from_row)
        .collect::<Result<Vec<FieldRecord>, StoreError>>()?;

        Ok(Field::assemble(records))
    }

    async fn get_record(&self, list_id: Uuid, id: Uuid) -> Result<Option<FieldRecord>, StoreError> {
        sqlx::query(&format!(
            "SELECT {} FROM fields WHERE list_id = $1 AND id = $2",
            FIELD_COLUMNS
        ))
        .bind(list_id)
        .bind(id)
        .fetch_optional(&self.db_pool)
        .await?
        .as_ref()
        .map(field_from_row)
        .transpose()
    }

    #[tracing::instrument(name = "Insert a new field into the database", skip(self, record), fields(key = %record.key))]
    async fn insert(&self, record: FieldRecord) -> Result<FieldRecord, StoreError> {
        sqlx::query(
            r#"
            INSERT INTO fields
                (id, list_id, name, key, description, column_name, field_type, group_id,
                 group_template, default_value, visible)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(record.id)
        .bind(record.list_id)
        .bind(&record.name)
        .bind(&record.key)
        .bind(&record.description)
        .bind(&record.column)
        .bind(record.field_type.as_ref())
        .bind(record.group)
        .bind(&record.group_template)
        .bind(&record.default_value)
        .bind(record.visible)
        .execute(&self.db_pool)
        .await
        .map_err(|err| {
            duplicate_or_database(err, || {
                format!("Field key {} is already used on this list", record.key)
            })
        })?;

        Ok(record)
    }
}

#[async_trait]
impl SubscriptionStore for PgStore {
    async fn get_by_email(
        &self,
        list_id: Uuid,
        email: &SubscriberEmail,
    ) -> Result<Option<Subscription>, StoreError> {
        sqlx::query(&format!(
            "SELECT {} FROM subscriptions WHERE list_id = $1 AND email = $2 AND deleted_at IS NULL",
            SUBSCRIPTION_COLUMNS
        ))
        .bind(list_id)
        .bind(email.as_ref())
        .fetch_optional(&self.db_pool)
        .await?
        .as_ref()
        .map(subscription_from_row)
        .transpose()
    }

    /// The partial unique index on live `(list_id, email)` rows makes this a single atomic
    /// statement. The status CASE mirrors `SubscriptionStatus::resubscribe`.
    #[tracing::instrument(
        name = "Upsert a subscription into the database",
        skip(self, subscription),
        fields(subscriber_email = %subscription.email)
    )]
    async fn upsert(
        &self,
        list_id: Uuid,
        subscription: &NewSubscription,
        status: SubscriptionStatus,
    ) -> Result<Subscription, StoreError> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO subscriptions
                (id, cid, list_id, email, first_name, last_name, tz, attributes, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $10)
            ON CONFLICT (list_id, email) WHERE deleted_at IS NULL DO UPDATE SET
                first_name = COALESCE(EXCLUDED.first_name, subscriptions.first_name),
                last_name = COALESCE(EXCLUDED.last_name, subscriptions.last_name),
                tz = COALESCE(EXCLUDED.tz, subscriptions.tz),
                attributes = subscriptions.attributes || EXCLUDED.attributes,
                status = CASE
                    WHEN subscriptions.status = 'active' THEN 'active'
                    ELSE EXCLUDED.status
                END,
                updated_at = EXCLUDED.updated_at
            RETURNING {}
            "#,
            SUBSCRIPTION_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(generate_cid())
        .bind(list_id)
        .bind(subscription.email.as_ref())
        .bind(subscription.first_name.as_ref().map(AsRef::<str>::as_ref))
        .bind(subscription.last_name.as_ref().map(AsRef::<str>::as_ref))
        .bind(&subscription.timezone)
        .bind(Json(&subscription.attributes))
        .bind(status.as_ref())
        .bind(Utc::now())
        .fetch_one(&self.db_pool)
        .await
        .map_err(|err| {
            tracing::error!("Failed to execute query: {:?}", err);
            StoreError::Database(err)
        })?;

        subscription_from_row(&row)
    }

    async fn set_status(
        &self,
        list_id: Uuid,
        id: Uuid,
        status: SubscriptionStatus,
    ) -> Result<Option<Subscription>, StoreError> {
        sqlx::query(&format!(
            r#"
            UPDATE subscriptions SET status = $3, updated_at = $4
            WHERE list_id = $1 AND id = $2 AND deleted_at IS NULL
            RETURNING {}
            "#,
            SUBSCRIPTION_COLUMNS
        ))
        .bind(list_id)
        .bind(id)
        .bind(status.as_ref())
        .bind(Utc::now())
        .fetch_optional(&self.db_pool)
        .await?
        .as_ref()
        .map(subscription_from_row)
        .transpose()
    }

    async fn mark_deleted(&self, list_id: Uuid, cid: &str) -> Result<Option<Subscription>, StoreError> {
        sqlx::query(&format!(
            r#"
            UPDATE subscriptions SET deleted_at = $3, updated_at = $3
            WHERE list_id = $1 AND cid = $2 AND deleted_at IS NULL
            RETURNING {}
            "#,
            SUBSCRIPTION_COLUMNS
        ))
        .bind(list_id)
        .bind(cid)
        .bind(Utc::now())
        .fetch_optional(&self.db_pool)
        .await?
        .as_ref()
        .map(subscription_from_row)
        .transpose()
    }

    async fn update_email(
        &self,
        list_id: Uuid,
        id: Uuid,
        email: &SubscriberEmail,
    ) -> Result<Option<Subscription>, StoreError> {
        sqlx::query(&format!(
            r#"
            UPDATE subscriptions SET email = $3, updated_at = $4
            WHERE list_id = $1 AND id = $2 AND deleted_at IS NULL
            RETURNING {}
            "#,
            SUBSCRIPTION_COLUMNS
        ))
        .bind(list_id)
        .bind(id)
        .bind(email.as_ref())
        .bind(Utc::now())
        .fetch_optional(&self.db_pool)
        .await
        .map_err(|err| {
            duplicate_or_database(err, || {
                format!("{} is already subscribed to this list", email)
            })
        })?
        .as_ref()
        .map(subscription_from_row)
        .transpose()
    }

    async fn list(
        &self,
        list_id: Uuid,
        offset: u64,
        limit: u64,
    ) -> Result<(Vec<Subscription>, u64), StoreError> {
        let total: i64 = sqlx::query(
            "SELECT COUNT(*) AS total FROM subscriptions WHERE list_id = $1 AND deleted_at IS NULL",
        )
        .bind(list_id)
        .fetch_one(&self.db_pool)
        .await?
        .try_get("total")?;

        let rows = sqlx::query(&format!(
            r#"
            SELECT {} FROM subscriptions
            WHERE list_id = $1 AND deleted_at IS NULL
            ORDER BY created_at, id
            OFFSET $2 LIMIT $3
            "#,
            SUBSCRIPTION_COLUMNS
        ))
        .bind(list_id)
        .bind(to_i64(offset))
        .bind(to_i64(limit))
        .fetch_all(&self.db_pool)
        .await?
        .iter()
        .map(subscription_from_row)
        .collect::<Result<Vec<Subscription>, StoreError>>()?;

        Ok((rows, total.max(0) as u64))
    }

    async fn list_ids_with_email(&self, email: &SubscriberEmail) -> Result<Vec<Uuid>, StoreError> {
        sqlx::query(
            "SELECT DISTINCT list_id FROM subscriptions WHERE email = $1 AND deleted_at IS NULL",
        )
        .bind(email.as_ref())
        .fetch_all(&self.db_pool)
        .await?
        .iter()
        .map(|row| row.try_get("list_id").map_err(StoreError::from))
        .collect()
    }
}

#[async_trait]
impl BlacklistStore for PgStore {
    async fn add(&self, email: &SubscriberEmail) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO blacklist (email) VALUES ($1) ON CONFLICT (email) DO NOTHING")
            .bind(email.as_ref())
            .execute(&self.db_pool)
            .await?;

        Ok(())
    }

    async fn remove(&self, email: &SubscriberEmail) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM blacklist WHERE email = $1")
            .bind(email.as_ref())
            .execute(&self.db_pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn contains(&self, email: &SubscriberEmail) -> Result<bool, StoreError> {
        let row = sqlx::query("SELECT 1 AS found FROM blacklist WHERE email = $1")
            .bind(email.as_ref())
            .fetch_optional(&self.db_pool)
            .await?;

        Ok(row.is_some())
    }

    async fn search(
        &self,
        offset: u64,
        limit: u64,
        fragment: &str,
    ) -> Result<(Vec<String>, u64), StoreError> {
        let fragment = fragment.trim().to_lowercase();
        let total: i64 = sqlx::query(
            "SELECT COUNT(*) AS total FROM blacklist WHERE strpos(email, $1) > 0",
        )
        .bind(&fragment)
        .fetch_one(&self.db_pool)
        .await?
        .try_get("total")?;

        let emails = sqlx::query(
            r#"
            SELECT email FROM blacklist
            WHERE strpos(email, $1) > 0
            ORDER BY email
            OFFSET $2 LIMIT $3
            "#,
        )
        .bind(&fragment)
        .bind(to_i64(offset))
        .bind(to_i64(limit))
        .fetch_all(&self.db_pool)
        .await?
        .iter()
        .map(|row| row.try_get("email").map_err(StoreError::from))
        .collect::<Result<Vec<String>, StoreError>>()?;

        Ok((emails, total.max(0) as u64))
    }
}
