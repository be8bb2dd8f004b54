//! Request/response endpoints backed by the store: account upsert, contact
//! lists and conversation history.

use std::convert::Infallible;

use log::warn;
use serde::{Deserialize, Serialize};
use serde_json::json;
use warp::http::StatusCode;
use warp::reply::Response;
use warp::{Filter, Rejection, Reply};

use crate::error::StoreError;
use crate::server::Server;
use crate::store::User;

const MAX_BODY: u64 = 64 * 1024;

#[derive(Deserialize)]
pub struct AuthRequest {
    pub email: String,
    pub username: String,
    pub language: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddContactRequest {
    pub user_id: String,
    pub contact_email: String,
}

#[derive(Serialize)]
pub struct ContactSummary {
    #[serde(flatten)]
    pub user: User,
    pub last_message: Option<String>,
    pub last_message_time: Option<u64>,
    pub online: bool,
}

pub fn routes(server: Server) -> impl Filter<Extract = (Response,), Error = Rejection> + Clone {
    let with_server = warp::any().map(move || server.clone());

    let auth = warp::path!("api" / "auth")
        .and(warp::post())
        .and(warp::body::content_length_limit(MAX_BODY))
        .and(warp::body::json())
        .and(with_server.clone())
        .and_then(auth);

    let list_contacts = warp::path!("api" / "contacts" / String)
        .and(warp::get())
        .and(with_server.clone())
        .and_then(list_contacts);

    let add_contact = warp::path!("api" / "contacts")
        .and(warp::post())
        .and(warp::body::content_length_limit(MAX_BODY))
        .and(warp::body::json())
        .and(with_server.clone())
        .and_then(add_contact);

    let history = warp::path!("api" / "messages" / String / String)
        .and(warp::get())
        .and(with_server)
        .and_then(history);

    auth.or(list_contacts)
        .unify()
        .or(add_contact)
        .unify()
        .or(history)
        .unify()
}

fn error_reply(status: StatusCode, message: impl ToString) -> Response {
    warp::reply::with_status(
        warp::reply::json(&json!({ "error": message.to_string() })),
        status,
    )
    .into_response()
}

fn store_error(e: &StoreError) -> Response {
    let status = match e {
        StoreError::Duplicate => StatusCode::BAD_REQUEST,
        StoreError::NotFound(_) => StatusCode::NOT_FOUND,
        StoreError::Unavailable(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    error_reply(status, e)
}

async fn auth(request: AuthRequest, server: Server) -> Result<Response, Infallible> {
    if request.email.is_empty() {
        return Ok(error_reply(StatusCode::BAD_REQUEST, "email is required"));
    }

    let now = server.clock().now_millis();
    match server
        .store()
        .upsert_user(&request.email, &request.username, &request.language, now)
        .await
    {
        Ok(user) => Ok(warp::reply::json(&user).into_response()),
        Err(e) => {
            warn!("Failed to upsert user {}: {}", request.email, e);
            Ok(store_error(&e))
        }
    }
}

async fn list_contacts(user_id: String, server: Server) -> Result<Response, Infallible> {
    let users = match server.store().contacts(&user_id).await {
        Ok(users) => users,
        Err(e) => return Ok(store_error(&e)),
    };

    let mut contacts = Vec::with_capacity(users.len());
    for user in users {
        let last = match server.store().last_message(&user.id, &user_id).await {
            Ok(last) => last,
            Err(e) => {
                warn!("Failed to load last message for {}: {}", user.id, e);
                None
            }
        };
        let online = server.presence().is_online(&user.id).await;
        contacts.push(ContactSummary {
            last_message: last.as_ref().and_then(|m| m.text.clone()),
            last_message_time: last.map(|m| m.timestamp),
            online,
            user,
        });
    }

    Ok(warp::reply::json(&contacts).into_response())
}

async fn add_contact(request: AddContactRequest, server: Server) -> Result<Response, Infallible> {
    if request.user_id.is_empty() || request.contact_email.is_empty() {
        return Ok(error_reply(
            StatusCode::BAD_REQUEST,
            "userId and contactEmail are required",
        ));
    }

    if let Err(e) = server
        .store()
        .add_contact(&request.user_id, &request.contact_email)
        .await
    {
        return Ok(error_reply(StatusCode::BAD_REQUEST, format!("Already added or error: {e}")));
    }

    match server.store().user_by_email(&request.contact_email).await {
        Ok(Some(user)) => Ok(warp::reply::json(&user).into_response()),
        Ok(None) => Ok(warp::reply::json(
            &json!({ "email": request.contact_email, "status": "pending" }),
        )
        .into_response()),
        Err(e) => Ok(store_error(&e)),
    }
}

/// Conversation between the two users, oldest first. Fetching history
/// marks `other_id`'s messages to `user_id` as read.
async fn history(user_id: String, other_id: String, server: Server) -> Result<Response, Infallible> {
    let messages = match server.store().conversation(&user_id, &other_id).await {
        Ok(messages) => messages,
        Err(e) => return Ok(store_error(&e)),
    };

    if let Err(e) = server.store().mark_read(&other_id, &user_id).await {
        warn!("Failed to mark history from {} to {} read: {}", other_id, user_id, e);
    }

    Ok(warp::reply::json(&messages).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryStore, StoredMessage};
    use serde_json::Value;
    use std::sync::Arc;

    fn server() -> Server {
        Server::new(Arc::new(MemoryStore::new()))
    }

    async fn register_user(server: &Server, email: &str, name: &str) -> User {
        let response = warp::test::request()
            .method("POST")
            .path("/api/auth")
            .json(&json!({"email": email, "username": name, "language": "en"}))
            .reply(&routes(server.clone()))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        serde_json::from_slice(response.body()).unwrap()
    }

    #[tokio::test]
    async fn auth_is_an_upsert_by_email() {
        let server = server();
        let first = register_user(&server, "a@x.io", "Alice").await;
        let second = register_user(&server, "a@x.io", "Alicia").await;
        assert_eq!(first.id, second.id);
        assert_eq!(second.username, "Alicia");
    }

    #[tokio::test]
    async fn contacts_include_last_message_and_presence() {
        let server = server();
        let alice = register_user(&server, "a@x.io", "Alice").await;
        let bob = register_user(&server, "b@x.io", "Bob").await;

        let response = warp::test::request()
            .method("POST")
            .path("/api/contacts")
            .json(&json!({"userId": alice.id, "contactEmail": "b@x.io"}))
            .reply(&routes(server.clone()))
            .await;
        assert_eq!(response.status(), StatusCode::OK);

        let duplicate = warp::test::request()
            .method("POST")
            .path("/api/contacts")
            .json(&json!({"userId": alice.id, "contactEmail": "b@x.io"}))
            .reply(&routes(server.clone()))
            .await;
        assert_eq!(duplicate.status(), StatusCode::BAD_REQUEST);

        server
            .store()
            .insert_message(StoredMessage {
                id: "m1".into(),
                sender_id: bob.id.clone(),
                receiver_id: alice.id.clone(),
                text: Some("hola".into()),
                image_data: None,
                sender_lang: "es".into(),
                timestamp: 42,
                is_read: false,
            })
            .await
            .unwrap();
        let (mut session, _rx) = server.lifecycle().connect().await;
        server.lifecycle().register(&mut session, bob.id.clone()).await.unwrap();

        let response = warp::test::request()
            .path(&format!("/api/contacts/{}", alice.id))
            .reply(&routes(server.clone()))
            .await;
        let contacts: Value = serde_json::from_slice(response.body()).unwrap();
        assert_eq!(contacts[0]["id"], Value::String(bob.id.clone()));
        assert_eq!(contacts[0]["last_message"], "hola");
        assert_eq!(contacts[0]["last_message_time"], 42);
        assert_eq!(contacts[0]["online"], true);
    }

    #[tokio::test]
    async fn unknown_contact_email_is_pending() {
        let server = server();
        let alice = register_user(&server, "a@x.io", "Alice").await;

        let response = warp::test::request()
            .method("POST")
            .path("/api/contacts")
            .json(&json!({"userId": alice.id, "contactEmail": "ghost@x.io"}))
            .reply(&routes(server.clone()))
            .await;
        let body: Value = serde_json::from_slice(response.body()).unwrap();
        assert_eq!(body, json!({"email": "ghost@x.io", "status": "pending"}));
    }

    #[tokio::test]
    async fn history_is_ordered_and_marks_incoming_read() {
        let server = server();
        for (id, from, to, ts) in [("2", "b", "a", 20), ("1", "a", "b", 10)] {
            server
                .store()
                .insert_message(StoredMessage {
                    id: id.into(),
                    sender_id: from.into(),
                    receiver_id: to.into(),
                    text: Some(id.into()),
                    image_data: None,
                    sender_lang: "en".into(),
                    timestamp: ts,
                    is_read: false,
                })
                .await
                .unwrap();
        }

        let response = warp::test::request()
            .path("/api/messages/a/b")
            .reply(&routes(server.clone()))
            .await;
        let messages: Vec<StoredMessage> = serde_json::from_slice(response.body()).unwrap();
        assert_eq!(messages[0].id, "1");
        assert_eq!(messages[1].id, "2");

        let after = server.store().conversation("a", "b").await.unwrap();
        assert!(!after[0].is_read, "a's own message stays unread");
        assert!(after[1].is_read, "b's message to a is now read");
    }

    #[tokio::test]
    async fn empty_email_is_rejected() {
        let response = warp::test::request()
            .method("POST")
            .path("/api/auth")
            .json(&json!({"email": "", "username": "x", "language": "en"}))
            .reply(&routes(server()))
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
