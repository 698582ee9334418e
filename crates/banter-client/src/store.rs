//! Transport to the message store.
//!
//! [`MessageStore`] is the fetch contract the rest of the crate is written
//! against; everything behind it is opaque.  [`HttpStore`] implements it
//! against the Banter server's REST API.

use serde::Serialize;

use banter_shared::{ChannelId, Cursor, Message, MessagePage};

use crate::error::ClientError;

/// The message store fetch contract.
///
/// `list` returns one page older than `cursor` (newest page when absent),
/// newest-first.  `create` persists a message in the channel and returns
/// the server-confirmed record.
#[allow(async_fn_in_trait)]
pub trait MessageStore {
    async fn list(
        &self,
        channel: &ChannelId,
        cursor: Option<&Cursor>,
        limit: u32,
    ) -> Result<MessagePage, ClientError>;

    async fn create(
        &self,
        channel: &ChannelId,
        content: &str,
        image_url: Option<&str>,
    ) -> Result<Message, ClientError>;
}

/// HTTP implementation of [`MessageStore`] against the Banter server.
#[derive(Debug, Clone)]
pub struct HttpStore {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

#[derive(Serialize)]
struct CreateMessageBody<'a> {
    content: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    image_url: Option<&'a str>,
}

impl HttpStore {
    /// `base_url` without a trailing slash, e.g. `http://localhost:8080`.
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            token: token.into(),
        }
    }

    fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ClientError> {
        match response.status() {
            s if s.is_success() => Ok(response),
            reqwest::StatusCode::UNAUTHORIZED | reqwest::StatusCode::FORBIDDEN => {
                Err(ClientError::Authorization)
            }
            s => Err(ClientError::Network(format!("server answered {s}"))),
        }
    }
}

impl MessageStore for HttpStore {
    async fn list(
        &self,
        channel: &ChannelId,
        cursor: Option<&Cursor>,
        limit: u32,
    ) -> Result<MessagePage, ClientError> {
        let url = format!("{}/channels/{}/messages", self.base_url, channel);

        let mut request = self
            .client
            .get(url)
            .bearer_auth(&self.token)
            .query(&[("limit", limit.to_string())]);
        if let Some(cursor) = cursor {
            request = request.query(&[("cursor", cursor.0.as_str())]);
        }

        let response = Self::check_status(request.send().await?)?;
        Ok(response.json::<MessagePage>().await?)
    }

    async fn create(
        &self,
        channel: &ChannelId,
        content: &str,
        image_url: Option<&str>,
    ) -> Result<Message, ClientError> {
        let url = format!("{}/channels/{}/messages", self.base_url, channel);

        let response = self
            .client
            .post(url)
            .bearer_auth(&self.token)
            .json(&CreateMessageBody { content, image_url })
            .send()
            .await?;

        let response = Self::check_status(response)?;
        Ok(response.json::<Message>().await?)
    }
}
