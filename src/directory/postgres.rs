use async_trait::async_trait;
use std::collections::HashMap;

use super::{AppState, UserDirectory, UserProfile};
use crate::db::DbPool;
use crate::error::AppResult;
use crate::store::validate_user_id;

#[derive(sqlx::FromRow)]
struct ProfileRow {
    user_id: String,
    display_name: String,
    avatar_url: Option<String>,
    device_token: Option<String>,
    app_state: String,
}

impl From<ProfileRow> for UserProfile {
    fn from(row: ProfileRow) -> Self {
        let app_state = row.app_state.parse().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Unexpected app_state in user_profiles, assuming foreground");
            AppState::Foreground
        });
        Self {
            user_id: row.user_id,
            display_name: row.display_name,
            avatar: row.avatar_url,
            device_token: row.device_token,
            app_state,
        }
    }
}

/// PostgreSQL implementation of UserDirectory (`user_profiles` table)
pub struct PostgresDirectory {
    pool: DbPool,
}

impl PostgresDirectory {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserDirectory for PostgresDirectory {
    async fn profile(&self, user_id: &str) -> AppResult<Option<UserProfile>> {
        let profile = sqlx::query_as::<_, ProfileRow>(
            r#"
            SELECT user_id, display_name, avatar_url, device_token, app_state
            FROM user_profiles
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(profile.map(UserProfile::from))
    }

    async fn profiles(&self, user_ids: &[String]) -> AppResult<HashMap<String, UserProfile>> {
        if user_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let rows = sqlx::query_as::<_, ProfileRow>(
            r#"
            SELECT user_id, display_name, avatar_url, device_token, app_state
            FROM user_profiles
            WHERE user_id = ANY($1)
            "#,
        )
        .bind(user_ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| (row.user_id.clone(), UserProfile::from(row)))
            .collect())
    }

    async fn upsert_profile(
        &self,
        user_id: &str,
        display_name: &str,
        avatar: Option<&str>,
    ) -> AppResult<UserProfile> {
        validate_user_id(user_id, "userId")?;
        validate_user_id(display_name, "displayName")?;

        let profile = sqlx::query_as::<_, ProfileRow>(
            r#"
            INSERT INTO user_profiles (user_id, display_name, avatar_url)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id) DO UPDATE SET
                display_name = EXCLUDED.display_name,
                avatar_url = EXCLUDED.avatar_url,
                updated_at = NOW()
            RETURNING user_id, display_name, avatar_url, device_token, app_state
            "#,
        )
        .bind(user_id)
        .bind(display_name.trim())
        .bind(avatar)
        .fetch_one(&self.pool)
        .await?;

        Ok(profile.into())
    }

    async fn set_device_token(&self, user_id: &str, device_token: Option<&str>) -> AppResult<()> {
        validate_user_id(user_id, "userId")?;

        sqlx::query(
            r#"
            INSERT INTO user_profiles (user_id, display_name, device_token)
            VALUES ($1, $1, $2)
            ON CONFLICT (user_id) DO UPDATE SET
                device_token = EXCLUDED.device_token,
                updated_at = NOW()
            "#,
        )
        .bind(user_id)
        .bind(device_token)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn set_app_state(&self, user_id: &str, state: AppState) -> AppResult<()> {
        validate_user_id(user_id, "userId")?;

        sqlx::query(
            r#"
            INSERT INTO user_profiles (user_id, display_name, app_state)
            VALUES ($1, $1, $2)
            ON CONFLICT (user_id) DO UPDATE SET
                app_state = EXCLUDED.app_state,
                updated_at = NOW()
            "#,
        )
        .bind(user_id)
        .bind(state.as_str())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
