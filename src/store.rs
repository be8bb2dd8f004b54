//! Persistence collaborator consulted by the relay and the HTTP API.
//!
//! The relay treats every call here as best-effort: failures are logged by
//! the caller and never block live delivery.

pub mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

pub use memory::MemoryStore;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    pub username: String,
    pub language: String,
    pub last_seen: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredMessage {
    pub id: String,
    pub sender_id: String,
    pub receiver_id: String,
    pub text: Option<String>,
    pub image_data: Option<String>,
    pub sender_lang: String,
    pub timestamp: u64,
    pub is_read: bool,
}

impl StoredMessage {
    /// True if this message belongs to the conversation between `a` and `b`,
    /// in either direction.
    pub fn between(&self, a: &str, b: &str) -> bool {
        (self.sender_id == a && self.receiver_id == b)
            || (self.sender_id == b && self.receiver_id == a)
    }
}

#[async_trait]
pub trait Store: Send + Sync {
    /// Creates the user for `email`, or refreshes its profile if it exists.
    async fn upsert_user(
        &self,
        email: &str,
        username: &str,
        language: &str,
        now: u64,
    ) -> Result<User, StoreError>;

    async fn user(&self, id: &str) -> Result<Option<User>, StoreError>;

    async fn set_last_seen(&self, id: &str, last_seen: u64) -> Result<(), StoreError>;

    async fn add_contact(&self, user_id: &str, contact_email: &str) -> Result<(), StoreError>;

    async fn user_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    /// Registered users in `user_id`'s contact list.
    async fn contacts(&self, user_id: &str) -> Result<Vec<User>, StoreError>;

    async fn insert_message(&self, message: StoredMessage) -> Result<(), StoreError>;

    /// Messages between `a` and `b`, oldest first.
    async fn conversation(&self, a: &str, b: &str) -> Result<Vec<StoredMessage>, StoreError>;

    async fn last_message(&self, a: &str, b: &str) -> Result<Option<StoredMessage>, StoreError>;

    /// Flags every message from `sender` to `receiver` as read and returns
    /// how many changed.
    async fn mark_read(&self, sender: &str, receiver: &str) -> Result<usize, StoreError>;
}
