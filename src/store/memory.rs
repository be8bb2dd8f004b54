use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{Store, StoredMessage, User};
use crate::error::StoreError;

#[derive(Default)]
struct Tables {
    users: HashMap<String, User>,
    contacts: HashMap<String, Vec<String>>, // user_id -> contact emails
    messages: Vec<StoredMessage>,
}

/// Process-local store. Contents are lost on restart.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn upsert_user(
        &self,
        email: &str,
        username: &str,
        language: &str,
        now: u64,
    ) -> Result<User, StoreError> {
        let mut tables = self.tables.write().await;
        if let Some(user) = tables.users.values_mut().find(|u| u.email == email) {
            user.username = username.to_string();
            user.language = language.to_string();
            user.last_seen = now;
            return Ok(user.clone());
        }

        let user = User {
            id: Uuid::new_v4().simple().to_string(),
            email: email.to_string(),
            username: username.to_string(),
            language: language.to_string(),
            last_seen: now,
        };
        tables.users.insert(user.id.clone(), user.clone());
        Ok(user)
    }

    async fn user(&self, id: &str) -> Result<Option<User>, StoreError> {
        Ok(self.tables.read().await.users.get(id).cloned())
    }

    async fn set_last_seen(&self, id: &str, last_seen: u64) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        let user = tables
            .users
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        user.last_seen = last_seen;
        Ok(())
    }

    async fn add_contact(&self, user_id: &str, contact_email: &str) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        let list = tables.contacts.entry(user_id.to_string()).or_default();
        if list.iter().any(|email| email == contact_email) {
            return Err(StoreError::Duplicate);
        }
        list.push(contact_email.to_string());
        Ok(())
    }

    async fn user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.users.values().find(|u| u.email == email).cloned())
    }

    async fn contacts(&self, user_id: &str) -> Result<Vec<User>, StoreError> {
        let tables = self.tables.read().await;
        let Some(emails) = tables.contacts.get(user_id) else {
            return Ok(Vec::new());
        };
        Ok(emails
            .iter()
            .filter_map(|email| tables.users.values().find(|u| &u.email == email))
            .cloned()
            .collect())
    }

    async fn insert_message(&self, message: StoredMessage) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        if tables.messages.iter().any(|m| m.id == message.id) {
            return Err(StoreError::Duplicate);
        }
        tables.messages.push(message);
        Ok(())
    }

    async fn conversation(&self, a: &str, b: &str) -> Result<Vec<StoredMessage>, StoreError> {
        let tables = self.tables.read().await;
        let mut messages: Vec<StoredMessage> = tables
            .messages
            .iter()
            .filter(|m| m.between(a, b))
            .cloned()
            .collect();
        // stable: equal timestamps keep insertion order
        messages.sort_by_key(|m| m.timestamp);
        Ok(messages)
    }

    async fn last_message(&self, a: &str, b: &str) -> Result<Option<StoredMessage>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .messages
            .iter()
            .filter(|m| m.between(a, b))
            .max_by_key(|m| m.timestamp)
            .cloned())
    }

    async fn mark_read(&self, sender: &str, receiver: &str) -> Result<usize, StoreError> {
        let mut tables = self.tables.write().await;
        let mut changed = 0;
        for message in tables
            .messages
            .iter_mut()
            .filter(|m| m.sender_id == sender && m.receiver_id == receiver && !m.is_read)
        {
            message.is_read = true;
            changed += 1;
        }
        Ok(changed)
    }
}
