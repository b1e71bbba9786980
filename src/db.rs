use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

/// User record in the database.
///
/// `subscription_end_date` is the authoritative entitlement state; `is_pro`
/// is an informational projection and is recomputed from the timestamp in
/// every response body.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub is_pro: bool,
    pub subscription_end_date: Option<OffsetDateTime>,
    pub stripe_customer_id: Option<String>,
    pub stripe_subscription_id: Option<String>,
    pub created_at: OffsetDateTime,
}

const USER_COLUMNS: &str = r#"
    id, email, password_hash, is_pro, subscription_end_date,
    stripe_customer_id, stripe_subscription_id, created_at
"#;

impl User {
    /// Find a user by email.
    pub async fn find_by_email(db: &PgPool, email: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    /// Create a new user with hashed password.
    pub async fn create(db: &PgPool, email: &str, password_hash: &str) -> anyhow::Result<User> {
        let user = sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users (email, password_hash) VALUES ($1, $2) RETURNING {USER_COLUMNS}"
        ))
        .bind(email)
        .bind(password_hash)
        .fetch_one(db)
        .await?;
        Ok(user)
    }

    /// Record a completed checkout: entitlement expiry plus the processor's
    /// customer/subscription references. Returns false when no row matched.
    pub async fn activate_subscription(
        db: &PgPool,
        id: Uuid,
        end_date: OffsetDateTime,
        customer_id: Option<&str>,
        subscription_id: Option<&str>,
    ) -> anyhow::Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET is_pro = TRUE,
                subscription_end_date = $2,
                stripe_customer_id = COALESCE($3, stripe_customer_id),
                stripe_subscription_id = COALESCE($4, stripe_subscription_id)
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(end_date)
        .bind(customer_id)
        .bind(subscription_id)
        .execute(db)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
