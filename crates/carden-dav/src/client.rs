//! HTTP CardDAV client.
//!
//! Speaks just enough WebDAV to run a sync pass: PROPFIND for discovery and
//! listing, GET/PUT for resources. Every operation classifies its failure
//! into the shared [`RemoteError`] taxonomy and retries transient ones with
//! bounded backoff before returning.

use std::time::Duration;

use carden_core::{
  RemoteError,
  store::{AddressBook, FetchedResource, RemoteResource},
};
use reqwest::{Method, StatusCode, header};

use crate::{
  retry::with_retry,
  xml::{DavResponse, PropfindProp, parse_multistatus, propfind_body},
};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

// ─── Configuration ───────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct DavConfig {
  /// Server base URL, e.g. `https://dav.example.com`.
  pub base_url: String,
  pub username: String,
  pub password: String,
}

// ─── Client ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct DavClient {
  http:   reqwest::Client,
  config: DavConfig,
}

impl DavClient {
  pub fn new(config: DavConfig) -> Result<Self, RemoteError> {
    let http = reqwest::Client::builder()
      .timeout(REQUEST_TIMEOUT)
      .build()
      .map_err(|e| RemoteError::Config(format!("http client: {e}")))?;
    Ok(Self {
      http,
      config: DavConfig {
        base_url: config.base_url.trim_end_matches('/').to_string(),
        ..config
      },
    })
  }

  /// Turn a server-relative href into an absolute URL.
  fn absolutize(&self, href: &str) -> String {
    if href.starts_with("http://") || href.starts_with("https://") {
      return href.to_string();
    }
    if href.starts_with('/') {
      // keep only the scheme+authority of the base
      if let Some(scheme_end) = self.config.base_url.find("://") {
        let rest = &self.config.base_url[scheme_end + 3..];
        let authority_end =
          rest.find('/').map_or(self.config.base_url.len(), |i| {
            scheme_end + 3 + i
          });
        return format!("{}{}", &self.config.base_url[..authority_end], href);
      }
    }
    format!("{}/{}", self.config.base_url, href.trim_start_matches('/'))
  }

  /// Keep only the contact resources of a Depth-1 listing. The collection
  /// itself comes back as a member, usually with a server-relative href, so
  /// both sides are absolutized before comparison; some servers report a
  /// getetag on the collection too, so etag presence alone cannot exclude it.
  fn member_resources(
    &self,
    collection_url: &str,
    responses: Vec<DavResponse>,
  ) -> Vec<RemoteResource> {
    responses
      .into_iter()
      .filter(|r| {
        !r.href.is_empty()
          && self.absolutize(&r.href).trim_end_matches('/')
            != collection_url.trim_end_matches('/')
      })
      .filter_map(|r| r.etag.map(|etag| RemoteResource { href: r.href, etag }))
      .collect()
  }

  async fn propfind(
    &self,
    url: &str,
    depth: &str,
    props: &[PropfindProp],
  ) -> Result<Vec<DavResponse>, RemoteError> {
    let method = Method::from_bytes(b"PROPFIND")
      .map_err(|e| RemoteError::Other(e.to_string()))?;
    let response = self
      .http
      .request(method, url)
      .basic_auth(&self.config.username, Some(&self.config.password))
      .header("Depth", depth)
      .header(header::CONTENT_TYPE, "application/xml; charset=utf-8")
      .body(propfind_body(props))
      .send()
      .await
      .map_err(|e| classify_transport(url, e))?;

    let status = response.status();
    if status != StatusCode::MULTI_STATUS && !status.is_success() {
      return Err(classify_status(url, status));
    }
    let body = response
      .bytes()
      .await
      .map_err(|e| classify_transport(url, e))?;
    parse_multistatus(&body)
      .map_err(|e| RemoteError::Malformed(format!("multistatus at {url}: {e}")))
  }

  /// Depth-0 PROPFIND asking whether `url` is itself an address book.
  async fn probe_addressbook(&self, url: &str) -> Result<bool, RemoteError> {
    let responses = self
      .propfind(url, "0", &[PropfindProp::ResourceType])
      .await?;
    Ok(responses.first().is_some_and(DavResponse::is_addressbook))
  }
}

// ─── Error classification ────────────────────────────────────────────────────

fn classify_status(target: &str, status: StatusCode) -> RemoteError {
  match status {
    StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
      RemoteError::Auth(format!("{status} at {target}"))
    }
    StatusCode::NOT_FOUND => RemoteError::NotFound(target.to_string()),
    StatusCode::PRECONDITION_FAILED => {
      RemoteError::EtagMismatch(target.to_string())
    }
    StatusCode::REQUEST_TIMEOUT | StatusCode::TOO_MANY_REQUESTS => {
      RemoteError::Transient(format!("{status} at {target}"))
    }
    s if s.is_server_error() => {
      RemoteError::Transient(format!("{s} at {target}"))
    }
    s => RemoteError::Other(format!("unexpected status {s} at {target}")),
  }
}

fn classify_transport(target: &str, err: reqwest::Error) -> RemoteError {
  if err.is_timeout() || err.is_connect() {
    RemoteError::Transient(format!("{err} at {target}"))
  } else {
    RemoteError::Other(format!("{err} at {target}"))
  }
}

fn clean_etag(value: &header::HeaderValue) -> Option<String> {
  value.to_str().ok().map(str::to_string)
}

// ─── AddressBook implementation ──────────────────────────────────────────────

impl AddressBook for DavClient {
  /// Three-step discovery: current-user-principal, then
  /// addressbook-home-set, then the first addressbook collection under it.
  /// Servers that skip well-known discovery are handled by probing whether
  /// the base URL is itself an address book.
  async fn discover(&self) -> Result<String, RemoteError> {
    with_retry("discover", || async {
      let base = self.config.base_url.clone();

      // Some servers are configured with the collection URL directly.
      if self.probe_addressbook(&base).await.unwrap_or(false) {
        tracing::debug!(url = %base, "base url is an address book");
        return Ok(base);
      }

      let principal = self
        .propfind(&base, "0", &[PropfindProp::CurrentUserPrincipal])
        .await?
        .into_iter()
        .find_map(|r| r.current_user_principal)
        .ok_or_else(|| {
          RemoteError::Config(format!("no current-user-principal at {base}"))
        })?;

      let principal_url = self.absolutize(&principal);
      let home = self
        .propfind(&principal_url, "0", &[PropfindProp::AddressbookHomeSet])
        .await?
        .into_iter()
        .find_map(|r| r.addressbook_home_set)
        .ok_or_else(|| {
          RemoteError::Config(format!(
            "no addressbook-home-set at {principal_url}"
          ))
        })?;

      let home_url = self.absolutize(&home);
      let book = self
        .propfind(
          &home_url,
          "1",
          &[PropfindProp::ResourceType, PropfindProp::DisplayName],
        )
        .await?
        .into_iter()
        .find(DavResponse::is_addressbook)
        .ok_or_else(|| {
          RemoteError::Config(format!("no address book under {home_url}"))
        })?;

      tracing::debug!(href = %book.href, "discovered address book");
      Ok(self.absolutize(&book.href))
    })
    .await
  }

  async fn list(
    &self,
    addressbook_href: &str,
  ) -> Result<Vec<RemoteResource>, RemoteError> {
    let url = self.absolutize(addressbook_href);
    with_retry("list", || async {
      let responses = self
        .propfind(&url, "1", &[PropfindProp::GetETag])
        .await?;
      Ok(self.member_resources(&url, responses))
    })
    .await
  }

  async fn fetch(&self, href: &str) -> Result<FetchedResource, RemoteError> {
    let url = self.absolutize(href);
    with_retry("fetch", || async {
      let response = self
        .http
        .get(&url)
        .basic_auth(&self.config.username, Some(&self.config.password))
        .send()
        .await
        .map_err(|e| classify_transport(&url, e))?;
      let status = response.status();
      if !status.is_success() {
        return Err(classify_status(&url, status));
      }
      let etag = response.headers().get(header::ETAG).and_then(clean_etag);
      let body = response
        .text()
        .await
        .map_err(|e| classify_transport(&url, e))?;
      Ok(FetchedResource { body, etag })
    })
    .await
  }

  async fn create(
    &self,
    href: &str,
    body: &str,
  ) -> Result<Option<String>, RemoteError> {
    let url = self.absolutize(href);
    with_retry("create", || async {
      let response = self
        .http
        .put(&url)
        .basic_auth(&self.config.username, Some(&self.config.password))
        .header(header::CONTENT_TYPE, "text/vcard; charset=utf-8")
        .header(header::IF_NONE_MATCH, "*")
        .body(body.to_string())
        .send()
        .await
        .map_err(|e| classify_transport(&url, e))?;
      let status = response.status();
      if !status.is_success() {
        return Err(classify_status(&url, status));
      }
      Ok(response.headers().get(header::ETAG).and_then(clean_etag))
    })
    .await
  }

  async fn update(
    &self,
    href: &str,
    body: &str,
    etag: &str,
  ) -> Result<Option<String>, RemoteError> {
    let url = self.absolutize(href);
    with_retry("update", || async {
      let response = self
        .http
        .put(&url)
        .basic_auth(&self.config.username, Some(&self.config.password))
        .header(header::CONTENT_TYPE, "text/vcard; charset=utf-8")
        .header(header::IF_MATCH, etag)
        .body(body.to_string())
        .send()
        .await
        .map_err(|e| classify_transport(&url, e))?;
      let status = response.status();
      if !status.is_success() {
        return Err(classify_status(&url, status));
      }
      Ok(response.headers().get(header::ETAG).and_then(clean_etag))
    })
    .await
  }
}
