//! Realtime database REST client.
//!
//! Talks to a Firebase-style realtime JSON tree: point reads and writes are
//! `GET`/`PUT`/`PATCH` on `{base}/{path}.json`, subscriptions are streaming
//! `GET`s with `Accept: text/event-stream`. Streamed `put`/`patch` events are
//! applied to a local copy of the subtree so every delivery is a full value.

use async_trait::async_trait;
use futures_util::StreamExt;
use presence_common::{Coordinate, PresenceSnapshot, PresenceStatus, UserRecord, USERS_PATH};
use reqwest::header::ACCEPT;
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::mpsc;

use super::event_stream::EventStreamDecoder;
use super::{tree, user_path, PresenceStore, Subscription};
use crate::error::{Error, Result};

/// Payload of streamed `put` and `patch` events.
#[derive(Debug, Deserialize)]
struct StreamPayload {
    path: String,
    #[serde(default)]
    data: Value,
}

/// Presence store backed by a realtime database REST endpoint.
#[derive(Clone)]
pub struct RestStore {
    client: Client,
    base_url: String,
    auth_token: Option<String>,
}

impl RestStore {
    pub fn new(base_url: &str, auth_token: Option<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            auth_token,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}.json", self.base_url, path.trim_matches('/'))
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self.client.request(method, self.url(path));
        match &self.auth_token {
            Some(token) => builder.query(&[("auth", token)]),
            None => builder,
        }
    }

    async fn check(response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(Error::Store(format!("HTTP {}: {}", status, body)))
    }

    async fn get(&self, path: &str) -> Result<Value> {
        let response = self.request(Method::GET, path).send().await?;
        Ok(Self::check(response).await?.json().await?)
    }

    async fn send_json(&self, method: Method, path: &str, body: &Value) -> Result<()> {
        let response = self.request(method, path).json(body).send().await?;
        Self::check(response).await?;
        Ok(())
    }

    /// Open a streaming listener on `path`, decoding the subtree after every change.
    async fn stream<T, F>(&self, path: &str, decode: F) -> Result<Subscription<T>>
    where
        T: Send + 'static,
        F: Fn(&Value) -> T + Send + Sync + 'static,
    {
        let response = self
            .request(Method::GET, path)
            .header(ACCEPT, "text/event-stream")
            .send()
            .await
            .map_err(|e| Error::SubscriptionFailed(e.to_string()))?;
        let response = Self::check(response)
            .await
            .map_err(|e| Error::SubscriptionFailed(e.to_string()))?;

        let label = format!("rest:{}", path);
        Ok(Subscription::spawn(label, move |tx| {
            pump_events(response, tx, decode)
        }))
    }
}

async fn pump_events<T, F>(response: Response, tx: mpsc::Sender<Result<T>>, decode: F)
where
    F: Fn(&Value) -> T,
{
    let mut body = response.bytes_stream();
    let mut decoder = EventStreamDecoder::default();
    let mut subtree = Value::Null;

    while let Some(chunk) = body.next().await {
        let chunk = match chunk {
            Ok(chunk) => chunk,
            Err(e) => {
                let _ = tx.send(Err(Error::SubscriptionFailed(e.to_string()))).await;
                return;
            }
        };

        for event in decoder.feed(&chunk) {
            match event.name.as_str() {
                "put" | "patch" => {
                    let payload: StreamPayload = match serde_json::from_str(&event.data) {
                        Ok(payload) => payload,
                        Err(e) => {
                            tracing::warn!("Ignoring malformed {} event: {}", event.name, e);
                            continue;
                        }
                    };
                    if event.name == "put" {
                        tree::put(&mut subtree, &payload.path, payload.data);
                    } else {
                        tree::patch(&mut subtree, &payload.path, payload.data);
                    }
                    let delivery = decode(&subtree);
                    if tx.send(Ok(delivery)).await.is_err() {
                        return;
                    }
                }
                "keep-alive" => {}
                "cancel" | "auth_revoked" => {
                    let reason = format!("listener {} by server", event.name);
                    let _ = tx.send(Err(Error::SubscriptionFailed(reason))).await;
                    return;
                }
                other => tracing::debug!("Ignoring stream event {}", other),
            }
        }
    }

    let _ = tx
        .send(Err(Error::SubscriptionFailed(
            "stream closed by server".to_string(),
        )))
        .await;
}

fn decode_user(value: &Value) -> Result<Option<UserRecord>> {
    if value.is_null() {
        return Ok(None);
    }
    Ok(Some(serde_json::from_value(value.clone())?))
}

#[async_trait]
impl PresenceStore for RestStore {
    fn backend(&self) -> &'static str {
        "rest"
    }

    async fn read_user(&self, user_id: &str) -> Result<Option<UserRecord>> {
        let value = self.get(&user_path(user_id)).await?;
        decode_user(&value)
    }

    async fn write_user(&self, user_id: &str, record: &UserRecord) -> Result<()> {
        let body = serde_json::to_value(record)?;
        self.send_json(Method::PUT, &user_path(user_id), &body).await
    }

    async fn write_status(&self, user_id: &str, status: PresenceStatus) -> Result<()> {
        let path = format!("{}/status", user_path(user_id));
        self.send_json(Method::PUT, &path, &json!(status.as_str()))
            .await
    }

    async fn write_position(&self, user_id: &str, position: Coordinate) -> Result<()> {
        let body = json!({
            "latitude": position.latitude,
            "longitude": position.longitude,
        });
        self.send_json(Method::PATCH, &user_path(user_id), &body)
            .await
    }

    async fn subscribe_users(&self) -> Result<Subscription<PresenceSnapshot>> {
        self.stream(USERS_PATH, PresenceSnapshot::from_json).await
    }

    async fn subscribe_user(&self, user_id: &str) -> Result<Subscription<Option<UserRecord>>> {
        // An undecodable record has no usable position; treat it as absent.
        self.stream(&user_path(user_id), |value| {
            decode_user(value).ok().flatten()
        })
        .await
    }
}
