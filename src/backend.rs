use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;
use std::sync::Arc;

use crate::config::{ApiPaths, Config};
use crate::error::{MessagingError, Result};
use crate::models::{
    ConversationSummary, Listing, Message, OutgoingMessage, Peer, PeerId, UnreadCountResponse,
};

/// The REST surface the engine talks to.
#[async_trait]
pub trait MessagingBackend: Send + Sync {
    async fn unread_count(&self) -> Result<u64>;
    async fn conversations(&self) -> Result<Vec<ConversationSummary>>;
    /// Full log with `peer`, oldest first. The server marks it read as a side effect.
    async fn messages_with(&self, peer: PeerId) -> Result<Vec<Message>>;
    async fn send_message(&self, outgoing: &OutgoingMessage) -> Result<Message>;
    async fn search_users(&self, query: &str) -> Result<Vec<Peer>>;
    async fn profile(&self, peer: PeerId) -> Result<Peer>;
}

pub type SharedBackend = Arc<dyn MessagingBackend>;

pub struct HttpBackend {
    http: Client,
    base_url: Url,
    token: Option<String>,
    paths: ApiPaths,
}

impl HttpBackend {
    pub fn new(server_url: &str, token: Option<String>, paths: ApiPaths) -> Result<Self> {
        // Url::join drops the last segment unless the base ends with '/'
        let normalized = if server_url.ends_with('/') {
            server_url.to_string()
        } else {
            format!("{}/", server_url)
        };
        let base_url = Url::parse(&normalized)
            .map_err(|e| MessagingError::Config(format!("invalid server url {:?}: {}", server_url, e)))?;

        Ok(Self {
            http: Client::new(),
            base_url,
            token,
            paths,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(&config.server_url, config.token.clone(), config.paths.clone())
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| MessagingError::Config(format!("invalid endpoint path {:?}: {}", path, e)))
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match self.token {
            Some(ref token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T> {
        crate::debug_log!("GET {}", url);
        let res = self.authorized(self.http.get(url)).send().await?;
        Self::decode(res).await
    }

    async fn decode<T: DeserializeOwned>(res: Response) -> Result<T> {
        let status = res.status();
        let body = res.bytes().await?;
        if !status.is_success() {
            return Err(MessagingError::rejected(status.as_u16(), &body));
        }
        Ok(serde_json::from_slice(&body)?)
    }
}

#[async_trait]
impl MessagingBackend for HttpBackend {
    async fn unread_count(&self) -> Result<u64> {
        let url = self.endpoint(&self.paths.unread_count)?;
        let body: UnreadCountResponse = self.get_json(url).await?;
        Ok(body.unread_count)
    }

    async fn conversations(&self) -> Result<Vec<ConversationSummary>> {
        let url = self.endpoint(&self.paths.conversations)?;
        let listing: Listing<ConversationSummary> = self.get_json(url).await?;
        Ok(listing.into_vec())
    }

    async fn messages_with(&self, peer: PeerId) -> Result<Vec<Message>> {
        let mut url = self.endpoint(&self.paths.thread)?;
        url.query_pairs_mut().append_pair("user_id", &peer.to_string());
        let listing: Listing<Message> = self.get_json(url).await?;
        Ok(listing.into_vec())
    }

    async fn send_message(&self, outgoing: &OutgoingMessage) -> Result<Message> {
        let url = self.endpoint(&self.paths.send)?;
        crate::debug_log!("POST {} (recipient={})", url, outgoing.recipient);
        let res = self
            .authorized(self.http.post(url))
            .json(outgoing)
            .send()
            .await?;
        Self::decode(res).await
    }

    async fn search_users(&self, query: &str) -> Result<Vec<Peer>> {
        let mut url = self.endpoint(&self.paths.user_search)?;
        url.query_pairs_mut().append_pair("search", query);
        let listing: Listing<Peer> = self.get_json(url).await?;
        Ok(listing.into_vec())
    }

    async fn profile(&self, peer: PeerId) -> Result<Peer> {
        let path = self.paths.profile.replace("{id}", &peer.to_string());
        let url = self.endpoint(&path)?;
        self.get_json(url).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoints_join_under_base_path() {
        let backend =
            HttpBackend::new("https://squad.example/app", None, ApiPaths::default()).unwrap();
        let url = backend.endpoint(&backend.paths.conversations).unwrap();
        assert_eq!(url.as_str(), "https://squad.example/app/api/messages/conversations/");
    }

    #[test]
    fn test_leading_slash_does_not_escape_base() {
        let backend =
            HttpBackend::new("https://squad.example/app/", None, ApiPaths::default()).unwrap();
        let url = backend.endpoint("/api/users/").unwrap();
        assert_eq!(url.as_str(), "https://squad.example/app/api/users/");
    }

    #[test]
    fn test_invalid_server_url_is_config_error() {
        let err = HttpBackend::new("not a url", None, ApiPaths::default())
            .err()
            .unwrap();
        assert!(matches!(err, MessagingError::Config(_)));
    }
}
