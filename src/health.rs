use crate::store::MessageStore;
use anyhow::{Context, Result};

pub async fn health_check(store: &dyn MessageStore) -> Result<()> {
    // Check message storage
    store.ping().await.context("Message store is unreachable")?;

    Ok(())
}
