//! vCard 4.0 serializer.
//!
//! Produces CRLF line endings and folds at 75 octets per RFC 6350 §3.2.
//! Every card carries UID and FN; serialization fails when no UID has been
//! assigned rather than inventing one.

use base64::Engine as _;
use carden_core::contact::{
  Contact, DatedEvent, EventKind, Photo, PostalAddress, TypedEntry,
};
use chrono::Datelike as _;

use crate::{
  error::{Error, Result},
  parse::PRESERVED_PROPS,
};

// ─── RFC 6350 line folding ───────────────────────────────────────────────────

/// Emit `s` as one logical line, folding at 75 octets with CRLF + SP
/// continuation.
pub(crate) fn fold_line(s: &str) -> String {
  if s.len() <= 75 {
    return format!("{}\r\n", s);
  }

  let mut result = String::new();
  let total = s.len();
  let mut pos = 0usize;
  let mut first = true;

  while pos < total {
    let limit = if first { 75 } else { 74 };
    let end = if pos + limit >= total {
      total
    } else {
      // Walk back to the nearest valid UTF-8 char boundary
      let mut e = pos + limit;
      while e > pos && !s.is_char_boundary(e) {
        e -= 1;
      }
      // Guarantee at least one byte per segment
      if e == pos { pos + 1 } else { e }
    };

    if !first {
      result.push(' ');
    }
    result.push_str(&s[pos..end]);
    result.push_str("\r\n");
    pos = end;
    first = false;
  }

  result
}

// ─── Value escaping ──────────────────────────────────────────────────────────

/// Escape a full property value: `\`, `,`, `;`, `\n`.
fn escape_value(s: &str) -> String {
  s.replace('\\', "\\\\")
    .replace(',', "\\,")
    .replace(';', "\\;")
    .replace('\n', "\\n")
}

/// Escape a semicolon-delimited component (N / ADR field): `\`, `;`, `\n`.
/// Commas are list-separators within a component and are not escaped here.
fn escape_component(s: &str) -> String {
  s.replace('\\', "\\\\")
    .replace(';', "\\;")
    .replace('\n', "\\n")
}

// ─── TYPE reconstruction ─────────────────────────────────────────────────────

/// Render a stored free-text tag as a `TYPE` parameter, quoting values that
/// are not plain parameter tokens.
fn type_param(label: &str) -> String {
  let plain = label
    .chars()
    .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
  if plain {
    format!(";TYPE={label}")
  } else {
    format!(";TYPE=\"{}\"", label.replace('"', ""))
  }
}

/// One property line for a multi-valued entry. `PREF=1` is emitted for the
/// first preferred entry of each collection only.
fn entry_line(prop: &str, entry: &TypedEntry, pref_spent: &mut bool) -> String {
  let mut line = prop.to_string();
  if let Some(ref label) = entry.label {
    line.push_str(&type_param(label));
  }
  if entry.preferred && !*pref_spent {
    line.push_str(";PREF=1");
    *pref_spent = true;
  }
  line.push(':');
  line.push_str(&escape_value(&entry.value));
  line
}

fn address_line(a: &PostalAddress, pref_spent: &mut bool) -> String {
  let mut line = "ADR".to_string();
  if let Some(ref label) = a.label {
    line.push_str(&type_param(label));
  }
  if a.preferred && !*pref_spent {
    line.push_str(";PREF=1");
    *pref_spent = true;
  }
  let field = |v: &Option<String>| {
    v.as_deref().map(escape_component).unwrap_or_default()
  };
  line.push_str(&format!(
    ":;;{};{};{};{};{}",
    field(&a.street),
    field(&a.city),
    field(&a.region),
    field(&a.postal_code),
    field(&a.country),
  ));
  line
}

// ─── Dates ───────────────────────────────────────────────────────────────────

/// Plain ISO calendar value; year-unknown dates emit the `--MM-DD` form so
/// no concrete year is ever invented.
fn date_value(event: &DatedEvent) -> String {
  if event.year_known {
    event.date.format("%Y-%m-%d").to_string()
  } else {
    format!("--{:02}-{:02}", event.date.month(), event.date.day())
  }
}

// ─── Custom fields ───────────────────────────────────────────────────────────

/// Property name for a custom field: preserved standard properties go out
/// under their own name, everything else under a sanitized `X-` name.
fn custom_prop_name(key: &str) -> String {
  let upper = key.to_uppercase();
  if PRESERVED_PROPS.contains(&upper.as_str()) || upper.starts_with("X-") {
    return upper;
  }
  let sanitized: String = upper
    .chars()
    .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
    .collect();
  format!("X-{sanitized}")
}

// ─── Public serializer ───────────────────────────────────────────────────────

/// Serialize `contact` as a vCard 4.0 string.
pub(crate) fn serialize_one(contact: &Contact) -> Result<String> {
  let uid = contact.uid.as_deref().ok_or(Error::MissingUid)?;

  let mut out = String::new();
  out.push_str("BEGIN:VCARD\r\n");
  out.push_str("VERSION:4.0\r\n");
  out.push_str(&fold_line(&format!("UID:{uid}")));
  out.push_str("PRODID:-//carden//carden//EN\r\n");
  out.push_str(&fold_line(&format!(
    "REV:{}",
    contact.updated_at.format("%Y%m%dT%H%M%SZ")
  )));

  // FN is mandatory; display_name() falls back through nickname to a
  // neutral placeholder.
  out.push_str(&fold_line(&format!(
    "FN:{}",
    escape_value(&contact.display_name())
  )));

  let n = &contact.name;
  if !n.is_empty() {
    let part =
      |v: &Option<String>| v.as_deref().map(escape_component).unwrap_or_default();
    out.push_str(&fold_line(&format!(
      "N:{};{};{};{};{}",
      part(&n.family),
      part(&n.given),
      part(&n.additional),
      part(&n.prefix),
      part(&n.suffix),
    )));
  }

  if let Some(ref nick) = contact.nickname {
    out.push_str(&fold_line(&format!("NICKNAME:{}", escape_value(nick))));
  }
  if let Some(ref company) = contact.company {
    out.push_str(&fold_line(&format!("ORG:{}", escape_value(company))));
  }
  if let Some(ref title) = contact.job_title {
    out.push_str(&fold_line(&format!("TITLE:{}", escape_value(title))));
  }
  if let Some(ref gender) = contact.gender {
    out.push_str(&fold_line(&format!("GENDER:{gender}")));
  }

  // ── Multi-valued collections ──────────────────────────────────────────
  let mut pref = false;
  for p in &contact.phones {
    out.push_str(&fold_line(&entry_line("TEL", p, &mut pref)));
  }
  pref = false;
  for e in &contact.emails {
    out.push_str(&fold_line(&entry_line("EMAIL", e, &mut pref)));
  }
  pref = false;
  for a in &contact.addresses {
    out.push_str(&fold_line(&address_line(a, &mut pref)));
  }
  pref = false;
  for l in &contact.links {
    out.push_str(&fold_line(&entry_line("URL", l, &mut pref)));
  }
  pref = false;
  for im in &contact.im_handles {
    out.push_str(&fold_line(&entry_line("IMPP", im, &mut pref)));
  }
  pref = false;
  for g in &contact.geolocations {
    out.push_str(&fold_line(&entry_line("GEO", g, &mut pref)));
  }

  // ── Photo ─────────────────────────────────────────────────────────────
  match &contact.photo {
    Some(Photo::Url { url }) => {
      out.push_str(&fold_line(&format!("PHOTO;VALUE=URI:{url}")));
    }
    Some(Photo::Inline { media_type, data }) => {
      let b64 = base64::engine::general_purpose::STANDARD.encode(data);
      out.push_str(&fold_line(&format!(
        "PHOTO:data:{media_type};base64,{b64}"
      )));
    }
    None => {}
  }

  // ── Dated events ──────────────────────────────────────────────────────
  let mut item_seq = 0usize;
  for event in &contact.events {
    match &event.kind {
      EventKind::Birthday => {
        out.push_str(&fold_line(&format!("BDAY:{}", date_value(event))));
      }
      EventKind::Anniversary => {
        out
          .push_str(&fold_line(&format!("ANNIVERSARY:{}", date_value(event))));
      }
      EventKind::Custom { label } => {
        item_seq += 1;
        out.push_str(&fold_line(&format!(
          "item{item_seq}.X-ABDATE:{}",
          date_value(event)
        )));
        out.push_str(&fold_line(&format!(
          "item{item_seq}.X-ABLabel:{}",
          escape_value(label)
        )));
      }
    }
  }

  // ── Categories / notes / custom fields ────────────────────────────────
  if !contact.categories.is_empty() {
    let joined = contact
      .categories
      .iter()
      .map(|c| escape_component(c))
      .collect::<Vec<_>>()
      .join(",");
    out.push_str(&fold_line(&format!("CATEGORIES:{joined}")));
  }
  if let Some(ref notes) = contact.notes {
    out.push_str(&fold_line(&format!("NOTE:{}", escape_value(notes))));
  }
  for field in &contact.custom_fields {
    out.push_str(&fold_line(&format!(
      "{}:{}",
      custom_prop_name(&field.key),
      escape_value(&field.value)
    )));
  }

  out.push_str("END:VCARD\r\n");
  Ok(out)
}

// ─── Tests ───────────────────────────────────────────────────────────────────
