//! WebDAV / CardDAV XML parsing and generation.
//!
//! Uses `quick-xml`'s writer API for request bodies and a hand-written
//! event-loop parser for multistatus responses.

use std::io::Cursor;

use quick_xml::{
  Writer,
  events::{BytesDecl, BytesEnd, BytesStart, Event},
};

// ─── Namespaces ──────────────────────────────────────────────────────────────

pub const NS_DAV: &str = "DAV:";
pub const NS_CARDDAV: &str = "urn:ietf:params:xml:ns:carddav";

// ─── Request bodies ──────────────────────────────────────────────────────────

/// Properties a PROPFIND request may ask for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropfindProp {
  CurrentUserPrincipal,
  AddressbookHomeSet,
  ResourceType,
  DisplayName,
  GetETag,
}

impl PropfindProp {
  fn tag(self) -> (&'static str, &'static str) {
    // (prefix, local name)
    match self {
      Self::CurrentUserPrincipal => ("d", "current-user-principal"),
      Self::AddressbookHomeSet => ("card", "addressbook-home-set"),
      Self::ResourceType => ("d", "resourcetype"),
      Self::DisplayName => ("d", "displayname"),
      Self::GetETag => ("d", "getetag"),
    }
  }
}

/// Build a `<d:propfind>` body asking for exactly `props`.
pub fn propfind_body(props: &[PropfindProp]) -> String {
  let mut writer = Writer::new(Cursor::new(Vec::new()));
  writer
    .write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))
    .ok();

  let mut root = BytesStart::new("d:propfind");
  root.push_attribute(("xmlns:d", NS_DAV));
  root.push_attribute(("xmlns:card", NS_CARDDAV));
  writer.write_event(Event::Start(root)).ok();
  writer.write_event(Event::Start(BytesStart::new("d:prop"))).ok();
  for p in props {
    let (prefix, local) = p.tag();
    writer
      .write_event(Event::Empty(BytesStart::new(format!("{prefix}:{local}"))))
      .ok();
  }
  writer.write_event(Event::End(BytesEnd::new("d:prop"))).ok();
  writer
    .write_event(Event::End(BytesEnd::new("d:propfind")))
    .ok();

  String::from_utf8(writer.into_inner().into_inner()).unwrap_or_default()
}

// ─── Multistatus responses ───────────────────────────────────────────────────

/// Properties extracted from one `<d:response>` element.
#[derive(Debug, Clone, Default)]
pub struct DavResponse {
  pub href: String,
  pub etag: Option<String>,
  /// Local names of `<d:resourcetype>` children ("collection",
  /// "addressbook", "principal" …).
  pub resource_types: Vec<String>,
  pub current_user_principal: Option<String>,
  pub addressbook_home_set: Option<String>,
}

impl DavResponse {
  pub fn is_addressbook(&self) -> bool {
    self.resource_types.iter().any(|t| t == "addressbook")
  }
}

/// Where a nested `<d:href>` belongs while walking a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HrefContext {
  Response,
  Principal,
  HomeSet,
}

fn local_name(name: &[u8]) -> &[u8] {
  // strip "prefix:" if present
  if let Some(pos) = name.iter().rposition(|&b| b == b':') {
    &name[pos + 1..]
  } else {
    name
  }
}

/// Parse a `207 Multi-Status` body into per-resource property sets.
pub fn parse_multistatus(xml: &[u8]) -> Result<Vec<DavResponse>, String> {
  let mut reader = quick_xml::Reader::from_reader(xml);
  reader.config_mut().trim_text(true);

  let mut responses: Vec<DavResponse> = Vec::new();
  let mut current: Option<DavResponse> = None;
  let mut href_ctx = HrefContext::Response;
  let mut in_resourcetype = false;
  let mut text_target: Option<&'static str> = None;
  let mut buf = Vec::new();

  loop {
    match reader.read_event_into(&mut buf) {
      Ok(Event::Start(ref e)) => {
        let name_buf = e.name();
        match local_name(name_buf.as_ref()) {
          b"response" => {
            current = Some(DavResponse::default());
            href_ctx = HrefContext::Response;
          }
          b"current-user-principal" => href_ctx = HrefContext::Principal,
          b"addressbook-home-set" => href_ctx = HrefContext::HomeSet,
          b"resourcetype" => in_resourcetype = true,
          b"href" => text_target = Some("href"),
          b"getetag" => text_target = Some("etag"),
          _ => {}
        }
      }
      Ok(Event::Empty(ref e)) => {
        let name_buf = e.name();
        let local = local_name(name_buf.as_ref());
        if in_resourcetype && let Some(resp) = current.as_mut() {
          resp
            .resource_types
            .push(String::from_utf8_lossy(local).into_owned());
        }
      }
      Ok(Event::Text(ref t)) => {
        let Some(target) = text_target else { continue };
        let text = t
          .unescape()
          .map_err(|e| e.to_string())?
          .trim()
          .to_string();
        if let Some(resp) = current.as_mut() {
          match target {
            "etag" if !text.is_empty() => resp.etag = Some(text),
            "href" => match href_ctx {
              HrefContext::Response => resp.href = text,
              HrefContext::Principal => {
                resp.current_user_principal = Some(text);
              }
              HrefContext::HomeSet => {
                resp.addressbook_home_set = Some(text);
              }
            },
            _ => {}
          }
        }
      }
      Ok(Event::End(ref e)) => {
        let name_buf = e.name();
        match local_name(name_buf.as_ref()) {
          b"response" => {
            if let Some(resp) = current.take() {
              responses.push(resp);
            }
          }
          b"current-user-principal" | b"addressbook-home-set" => {
            href_ctx = HrefContext::Response;
          }
          b"resourcetype" => in_resourcetype = false,
          b"href" | b"getetag" => text_target = None,
          _ => {}
        }
      }
      Ok(Event::Eof) => break,
      Err(e) => return Err(e.to_string()),
      _ => {}
    }
    buf.clear();
  }

  Ok(responses)
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn propfind_body_lists_requested_props() {
    let body = propfind_body(&[
      PropfindProp::ResourceType,
      PropfindProp::GetETag,
    ]);
    assert!(body.contains("<d:propfind"));
    assert!(body.contains("xmlns:d=\"DAV:\""));
    assert!(body.contains("<d:resourcetype/>"));
    assert!(body.contains("<d:getetag/>"));
    assert!(!body.contains("current-user-principal"));
  }

  #[test]
  fn multistatus_extracts_hrefs_and_etags() {
    let xml = br#"<?xml version="1.0"?>
      <d:multistatus xmlns:d="DAV:">
        <d:response>
          <d:href>/books/default/</d:href>
          <d:propstat>
            <d:prop><d:resourcetype><d:collection/></d:resourcetype></d:prop>
            <d:status>HTTP/1.1 200 OK</d:status>
          </d:propstat>
        </d:response>
        <d:response>
          <d:href>/books/default/a.vcf</d:href>
          <d:propstat>
            <d:prop><d:getetag>"abc-1"</d:getetag></d:prop>
            <d:status>HTTP/1.1 200 OK</d:status>
          </d:propstat>
        </d:response>
      </d:multistatus>"#;
    let responses = parse_multistatus(xml).unwrap();
    assert_eq!(responses.len(), 2);
    assert_eq!(responses[0].href, "/books/default/");
    assert!(responses[0].etag.is_none());
    assert_eq!(responses[1].href, "/books/default/a.vcf");
    assert_eq!(responses[1].etag.as_deref(), Some("\"abc-1\""));
  }

  #[test]
  fn resourcetype_addressbook_is_detected() {
    let xml = br#"
      <d:multistatus xmlns:d="DAV:" xmlns:card="urn:ietf:params:xml:ns:carddav">
        <d:response>
          <d:href>/books/contacts/</d:href>
          <d:propstat>
            <d:prop>
              <d:resourcetype><d:collection/><card:addressbook/></d:resourcetype>
            </d:prop>
          </d:propstat>
        </d:response>
      </d:multistatus>"#;
    let responses = parse_multistatus(xml).unwrap();
    assert!(responses[0].is_addressbook());
  }

  #[test]
  fn nested_principal_href_does_not_clobber_response_href() {
    let xml = br#"
      <d:multistatus xmlns:d="DAV:">
        <d:response>
          <d:href>/</d:href>
          <d:propstat>
            <d:prop>
              <d:current-user-principal>
                <d:href>/principals/alice/</d:href>
              </d:current-user-principal>
            </d:prop>
          </d:propstat>
        </d:response>
      </d:multistatus>"#;
    let responses = parse_multistatus(xml).unwrap();
    assert_eq!(responses[0].href, "/");
    assert_eq!(
      responses[0].current_user_principal.as_deref(),
      Some("/principals/alice/")
    );
  }
}
