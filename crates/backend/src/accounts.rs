use chrono::{DateTime, NaiveDate, Utc};
use sqlx::sqlite::{SqlitePool, SqliteRow};
use sqlx::Row;
use uuid::Uuid;

use cadence_types::{Account, NewAccount};

use crate::db::Database;
use crate::row::{decode_uuid, decode_uuid_opt};

const ACCOUNT_COLUMNS: &str = "id, organization_id, account_name, owner_id, contact_first_name, \
     contact_last_name, contact_email, contact_phone, renewal_date, is_active, created_at, updated_at";

/// Accounts are owned by the surrounding CRM; the engine only reads them.
/// The insert path exists so deployments and tests can seed data.
#[derive(Clone)]
pub struct AccountStore {
    pool: SqlitePool,
}

impl AccountStore {
    pub fn new(db: &Database) -> Self {
        AccountStore {
            pool: db.pool().clone(),
        }
    }

    pub async fn insert(
        &self,
        organization_id: Uuid,
        new: NewAccount,
    ) -> Result<Account, sqlx::Error> {
        let now = Utc::now();
        let account = Account {
            id: Uuid::new_v4(),
            organization_id,
            account_name: new.account_name,
            owner_id: new.owner_id,
            contact_first_name: new.contact_first_name,
            contact_last_name: new.contact_last_name,
            contact_email: new.contact_email,
            contact_phone: new.contact_phone,
            renewal_date: new.renewal_date,
            is_active: new.is_active,
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            "INSERT INTO accounts (id, organization_id, account_name, owner_id, contact_first_name, \
             contact_last_name, contact_email, contact_phone, renewal_date, is_active, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        )
        .bind(account.id.to_string())
        .bind(account.organization_id.to_string())
        .bind(account.account_name.clone())
        .bind(account.owner_id.map(|id| id.to_string()))
        .bind(account.contact_first_name.clone())
        .bind(account.contact_last_name.clone())
        .bind(account.contact_email.clone())
        .bind(account.contact_phone.clone())
        .bind(account.renewal_date)
        .bind(account.is_active)
        .bind(account.created_at)
        .bind(account.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(account)
    }

    pub async fn get(
        &self,
        organization_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Account>, sqlx::Error> {
        let row = sqlx::query(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = ?1 AND organization_id = ?2"
        ))
        .bind(id.to_string())
        .bind(organization_id.to_string())
        .fetch_optional(&self.pool)
        .await?;
        row.map(|row| account_from_row(&row)).transpose()
    }

    /// Active accounts of the organization that have a renewal date at all.
    /// Window filtering happens in the trigger evaluator; the fixed ordering
    /// keeps execution output deterministic.
    pub async fn renewal_candidates(
        &self,
        organization_id: Uuid,
    ) -> Result<Vec<Account>, sqlx::Error> {
        let rows = sqlx::query(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts \
             WHERE organization_id = ?1 AND is_active = 1 AND renewal_date IS NOT NULL \
             ORDER BY renewal_date ASC, id ASC"
        ))
        .bind(organization_id.to_string())
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(account_from_row).collect()
    }
}

fn account_from_row(row: &SqliteRow) -> Result<Account, sqlx::Error> {
    Ok(Account {
        id: decode_uuid(row, "id")?,
        organization_id: decode_uuid(row, "organization_id")?,
        account_name: row.try_get("account_name")?,
        owner_id: decode_uuid_opt(row, "owner_id")?,
        contact_first_name: row.try_get("contact_first_name")?,
        contact_last_name: row.try_get("contact_last_name")?,
        contact_email: row.try_get("contact_email")?,
        contact_phone: row.try_get("contact_phone")?,
        renewal_date: row.try_get::<Option<NaiveDate>, _>("renewal_date")?,
        is_active: row.try_get("is_active")?,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
        updated_at: row.try_get::<DateTime<Utc>, _>("updated_at")?,
    })
}
