// ============================================================================
// Conversation Aggregator
// ============================================================================
//
// Folds a user's message feed into one summary per counterparty. Nothing is
// stored: summaries are recomputed from the MessageStore on every request.
//
// ============================================================================

use std::collections::HashMap;

use crate::directory::UserDirectory;
use crate::error::AppResult;
use crate::message::{ConversationSummary, Message};
use crate::store::MessageStore;

/// Summary before directory lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationFold {
    pub counterparty_id: String,
    pub last_message: Message,
    pub unread_count: u64,
}

/// Groups a newest-first feed by counterparty.
///
/// The first message seen for a counterparty is its latest, so output order
/// is most recent activity first. Unread counts only messages the user
/// received.
pub fn fold_feed(user_id: &str, feed: Vec<Message>) -> Vec<ConversationFold> {
    let mut folds: Vec<ConversationFold> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for message in feed {
        let counterparty = message.counterparty_of(user_id).to_string();
        let unread = message.receiver_id == user_id && !message.read;

        match index.get(&counterparty) {
            Some(&i) => {
                if unread {
                    folds[i].unread_count += 1;
                }
            }
            None => {
                index.insert(counterparty.clone(), folds.len());
                folds.push(ConversationFold {
                    counterparty_id: counterparty,
                    last_message: message,
                    unread_count: u64::from(unread),
                });
            }
        }
    }

    folds
}

pub struct ConversationAggregator;

impl ConversationAggregator {
    /// One summary per counterparty of `user_id`, most recent first
    pub async fn summarize(
        store: &dyn MessageStore,
        directory: &dyn UserDirectory,
        user_id: &str,
    ) -> AppResult<Vec<ConversationSummary>> {
        let feed = store.list_for_user(user_id).await?;
        if feed.is_empty() {
            return Ok(Vec::new());
        }

        let folds = fold_feed(user_id, feed);
        let ids: Vec<String> = folds.iter().map(|f| f.counterparty_id.clone()).collect();

        // Display data is decoration; a directory outage must not hide conversations
        let profiles = match directory.profiles(&ids).await {
            Ok(profiles) => profiles,
            Err(e) => {
                tracing::warn!(error = %e, "Profile lookup failed, using fallback display names");
                HashMap::new()
            }
        };

        Ok(folds
            .into_iter()
            .map(|fold| {
                let profile = profiles.get(&fold.counterparty_id);
                ConversationSummary {
                    counterparty_display_name: profile
                        .map(|p| p.display_name.clone())
                        .unwrap_or_else(|| fold.counterparty_id.clone()),
                    counterparty_avatar: profile.and_then(|p| p.avatar.clone()),
                    unread: fold.unread_count > 0,
                    unread_count: fold.unread_count,
                    last_message: fold.last_message,
                    counterparty_id: fold.counterparty_id,
                }
            })
            .collect())
    }
}
