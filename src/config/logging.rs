// ============================================================================
// Logging Configuration
// ============================================================================

use crate::utils::log_safe_id;

const DEFAULT_HASH_SALT: &str = "default-salt-please-change";

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    /// Log raw user identifiers instead of salted hashes
    pub enable_user_identifiers: bool,
    pub hash_salt: String,
}

impl LoggingConfig {
    pub(crate) fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            enable_user_identifiers: std::env::var("LOG_USER_IDENTIFIERS")
                .unwrap_or_else(|_| "false".to_string())
                .parse()
                .unwrap_or(false),
            hash_salt: {
                let salt = std::env::var("LOG_HASH_SALT")
                    .unwrap_or_else(|_| DEFAULT_HASH_SALT.to_string());
                if salt.is_empty() || salt == DEFAULT_HASH_SALT {
                    anyhow::bail!("LOG_HASH_SALT must be set to a unique, secret value");
                }
                salt
            },
        })
    }

    /// Identifier as it may appear in logs
    pub fn user_ref(&self, user_id: &str) -> String {
        if self.enable_user_identifiers {
            user_id.to_string()
        } else {
            log_safe_id(user_id, &self.hash_salt)
        }
    }
}
