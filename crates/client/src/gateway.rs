//! HTTP access to a lunchsync server.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use lunchsync_common::{
    ChatMessageView, DayStatusRow, IsoWeek, PollPage, PollTally, WeekBoard,
};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode, header};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;
use tracing::{debug, warn};

use crate::editor::{ClearRequest, StatusWrite};
use crate::error::{ClientError, ClientResult};

/// A poll started from the chat, as the server returns it.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CreatedPoll {
    /// Tallies in creation order.
    pub poll: PollTally,
    /// The chat message announcing it.
    pub message: ChatMessageView,
}

/// Calls the reconciler makes against the server.
#[async_trait]
pub trait Gateway: Send + Sync {
    /// `GET /week-status`.
    async fn board(&self, week: Option<&IsoWeek>) -> ClientResult<WeekBoard>;

    /// `GET /poll`.
    async fn poll_page(&self) -> ClientResult<PollPage>;

    /// `POST /week-status`.
    async fn save_status(&self, write: &StatusWrite) -> ClientResult<DayStatusRow>;

    /// `DELETE /week-status`; `true` if a row was removed.
    async fn clear_status(&self, request: &ClearRequest) -> ClientResult<bool>;

    /// `POST /week-status/chat`.
    async fn post_chat(&self, iso_week: &IsoWeek, body: &str) -> ClientResult<ChatMessageView>;

    /// `POST /poll/vote`.
    async fn vote(&self, poll_option_id: i64) -> ClientResult<PollTally>;

    /// `POST /poll/unvote`.
    async fn unvote(&self, poll_option_id: i64) -> ClientResult<PollTally>;

    /// `POST /poll/store-from-chat`.
    async fn create_poll(&self, title: Option<&str>, options: &[String])
    -> ClientResult<CreatedPoll>;
}

#[derive(Serialize)]
struct ChatBody<'a> {
    iso_week: &'a IsoWeek,
    body: &'a str,
}

#[derive(Serialize)]
struct VoteBody {
    poll_option_id: i64,
}

#[derive(Serialize)]
struct CreatePollBody<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    title: Option<&'a str>,
    options: &'a [String],
}

#[derive(Deserialize)]
struct Cleared {
    deleted: bool,
}

#[derive(Deserialize)]
struct FieldErrorBody {
    #[serde(default)]
    errors: BTreeMap<String, String>,
}

/// [`Gateway`] over HTTP with a bearer token.
#[derive(Clone)]
pub struct HttpGateway {
    client: Client,
    base_url: String,
    token: String,
}

impl HttpGateway {
    /// Create a gateway for `base_url` acting as the owner of `token`.
    pub fn new(base_url: &str, token: impl Into<String>) -> ClientResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.into(),
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client
            .request(method, format!("{}{path}", self.base_url))
            .bearer_auth(&self.token)
            .header(header::ACCEPT, "application/json")
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> ClientResult<T> {
        let response = request.send().await?;
        decode(response).await
    }
}

/// Map a server response onto a value or a [`ClientError`].
///
/// A closed poll answers 200 with a `voting` field error, so a success body
/// is checked for `errors` before it is decoded.
async fn decode<T: DeserializeOwned>(response: Response) -> ClientResult<T> {
    let status = response.status();
    let url = response.url().path().to_string();

    match status {
        StatusCode::UNAUTHORIZED => return Err(ClientError::Unauthorized),
        StatusCode::UNPROCESSABLE_ENTITY => {
            let body: FieldErrorBody = response.json().await?;
            debug!(path = %url, fields = ?body.errors.keys().collect::<Vec<_>>(), "Request rejected");
            return Err(ClientError::InvalidFields(body.errors));
        }
        s if !s.is_success() => {
            let body: Value = response.json().await.unwrap_or(Value::Null);
            let message = body["error"]["message"]
                .as_str()
                .unwrap_or_default()
                .to_string();
            warn!(path = %url, status = %s, message = %message, "Request failed");
            return Err(ClientError::Rejected {
                status: s.as_u16(),
                message,
            });
        }
        _ => {}
    }

    let body: Value = response.json().await?;
    if let Some(voting) = body["errors"]["voting"].as_str() {
        return Err(ClientError::VotingClosed(voting.to_string()));
    }
    Ok(serde_json::from_value(body)?)
}

#[async_trait]
impl Gateway for HttpGateway {
    async fn board(&self, week: Option<&IsoWeek>) -> ClientResult<WeekBoard> {
        let mut request = self.request(Method::GET, "/week-status");
        if let Some(week) = week {
            request = request.query(&[("week", week.as_str())]);
        }
        self.send(request).await
    }

    async fn poll_page(&self) -> ClientResult<PollPage> {
        self.send(self.request(Method::GET, "/poll")).await
    }

    async fn save_status(&self, write: &StatusWrite) -> ClientResult<DayStatusRow> {
        self.send(self.request(Method::POST, "/week-status").json(write))
            .await
    }

    async fn clear_status(&self, request: &ClearRequest) -> ClientResult<bool> {
        let cleared: Cleared = self
            .send(self.request(Method::DELETE, "/week-status").json(request))
            .await?;
        Ok(cleared.deleted)
    }

    async fn post_chat(&self, iso_week: &IsoWeek, body: &str) -> ClientResult<ChatMessageView> {
        self.send(
            self.request(Method::POST, "/week-status/chat")
                .json(&ChatBody { iso_week, body }),
        )
        .await
    }

    async fn vote(&self, poll_option_id: i64) -> ClientResult<PollTally> {
        self.send(
            self.request(Method::POST, "/poll/vote")
                .json(&VoteBody { poll_option_id }),
        )
        .await
    }

    async fn unvote(&self, poll_option_id: i64) -> ClientResult<PollTally> {
        self.send(
            self.request(Method::POST, "/poll/unvote")
                .json(&VoteBody { poll_option_id }),
        )
        .await
    }

    async fn create_poll(
        &self,
        title: Option<&str>,
        options: &[String],
    ) -> ClientResult<CreatedPoll> {
        self.send(
            self.request(Method::POST, "/poll/store-from-chat")
                .json(&CreatePollBody { title, options }),
        )
        .await
    }
}
