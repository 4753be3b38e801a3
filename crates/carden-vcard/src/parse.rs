//! vCard 3.0 / 4.0 field mapper.
//!
//! Pipeline:
//!   raw &str
//!     └─ unfold_lines()      → Vec<String>
//!          └─ tokenize()     → Vec<RawProperty>
//!               └─ group_labels() → itemN → label map
//!                    └─ map per property → Contact + unknown[]

use base64::Engine as _;
use carden_core::contact::{
  Contact, CustomField, DatedEvent, EventKind, Photo, PostalAddress,
  TypedEntry, UNKNOWN_YEAR,
};
use chrono::NaiveDate;

use crate::{
  ParsedVcard, VcardVersion,
  error::{Error, Result},
  property::{RawProperty, group_labels, tokenize, unfold_lines},
};

// ─── Recognized-but-unmapped standard properties ─────────────────────────────

/// Standard properties with no dedicated Contact field. Preserved verbatim
/// as custom fields keyed by property name so they survive export.
pub(crate) const PRESERVED_PROPS: &[&str] = &[
  "ROLE",
  "LANG",
  "TZ",
  "KIND",
  "SOURCE",
  "SORT-STRING",
  "CLASS",
  "MAILER",
  "RELATED",
  "MEMBER",
  "XML",
  "KEY",
  "FBURL",
  "CALURI",
  "CALADRURI",
];

// ─── Value helpers ───────────────────────────────────────────────────────────

fn unescape_value(s: &str) -> String {
  let mut result = String::with_capacity(s.len());
  let mut chars = s.chars().peekable();
  while let Some(c) = chars.next() {
    if c == '\\' {
      match chars.next() {
        Some('n') | Some('N') => result.push('\n'),
        Some('\\') => result.push('\\'),
        Some(',') => result.push(','),
        Some(';') => result.push(';'),
        Some(other) => {
          result.push('\\');
          result.push(other);
        }
        None => result.push('\\'),
      }
    } else {
      result.push(c);
    }
  }
  result
}

/// Return `Some(trimmed)` when non-empty, `None` otherwise.
fn opt_str(s: &str) -> Option<String> {
  let s = s.trim();
  if s.is_empty() {
    None
  } else {
    Some(s.to_string())
  }
}

fn component(parts: &[&str], idx: usize) -> Option<String> {
  parts
    .get(idx)
    .and_then(|s| opt_str(s))
    .map(|s| unescape_value(&s))
}

// ─── Dates ───────────────────────────────────────────────────────────────────

struct ParsedDate {
  date:       NaiveDate,
  year_known: bool,
}

/// Parse a vCard date value.
///
/// Complete dates (`YYYY-MM-DD`, `YYYYMMDD`, optionally followed by a time
/// part) parse normally. Year-omitted dates — leading `--` marker in
/// `--MM-DD` or compact `--MMDD` form, or a year matching the vendor
/// omit-year parameter — land on the sentinel year with `year_known: false`.
fn parse_vcard_date(prop: &RawProperty) -> Result<ParsedDate> {
  let raw = prop.value.trim();
  // Drop any time component ("19900315T120000Z" → "19900315").
  let value = raw.split('T').next().unwrap_or(raw);

  let invalid = || Error::InvalidDate {
    property: prop.name.clone(),
    value:    raw.to_string(),
  };

  if let Some(rest) = value.strip_prefix("--") {
    let digits: String = rest.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() != 4 {
      return Err(invalid());
    }
    let month: u32 = digits[..2].parse().map_err(|_| invalid())?;
    let day: u32 = digits[2..].parse().map_err(|_| invalid())?;
    let date = NaiveDate::from_ymd_opt(UNKNOWN_YEAR, month, day)
      .ok_or_else(invalid)?;
    return Ok(ParsedDate {
      date,
      year_known: false,
    });
  }

  let date = NaiveDate::parse_from_str(value, "%Y-%m-%d")
    .or_else(|_| NaiveDate::parse_from_str(value, "%Y%m%d"))
    .map_err(|_| invalid())?;

  // Apple clients keep the full date but flag the year as a placeholder.
  let omit_year = prop
    .param("X-APPLE-OMIT-YEAR")
    .and_then(|v| v.trim().parse::<i32>().ok());
  let year_known = match omit_year {
    Some(y) => y != chrono::Datelike::year(&date),
    None => true,
  };

  Ok(ParsedDate { date, year_known })
}

// ─── Photo ───────────────────────────────────────────────────────────────────

fn decode_base64_payload(s: &str) -> Result<Vec<u8>> {
  // Inline payloads are frequently folded; strip all whitespace first.
  let cleaned: String = s.chars().filter(|c| !c.is_whitespace()).collect();
  base64::engine::general_purpose::STANDARD
    .decode(cleaned.as_bytes())
    .or_else(|_| {
      base64::engine::general_purpose::STANDARD_NO_PAD
        .decode(cleaned.trim_end_matches('=').as_bytes())
    })
    .map_err(|e| Error::InvalidPhoto(e.to_string()))
}

/// Normalize a PHOTO property to one photo value with a media type.
fn parse_photo(prop: &RawProperty) -> Result<Option<Photo>> {
  let value = prop.value.trim();
  if value.is_empty() {
    return Ok(None);
  }

  // vCard 4.0 inline form: data:image/jpeg;base64,…
  if let Some(rest) = value.strip_prefix("data:") {
    let Some((meta, payload)) = rest.split_once(',') else {
      return Err(Error::InvalidPhoto(value.to_string()));
    };
    let media_type = meta
      .strip_suffix(";base64")
      .ok_or_else(|| Error::InvalidPhoto(value.to_string()))?;
    let media_type = if media_type.is_empty() {
      "application/octet-stream".to_string()
    } else {
      media_type.to_lowercase()
    };
    return Ok(Some(Photo::Inline {
      media_type,
      data: decode_base64_payload(payload)?,
    }));
  }

  // vCard 3.0 inline form: ENCODING=b / ENCODING=BASE64, media subtype in
  // the TYPE parameter.
  if prop.is_base64() {
    let media_type = match prop.param("TYPE") {
      Some(t) if t.contains('/') => t.to_lowercase(),
      Some(t) => format!("image/{}", t.to_lowercase()),
      None => "application/octet-stream".to_string(),
    };
    return Ok(Some(Photo::Inline {
      media_type,
      data: decode_base64_payload(value)?,
    }));
  }

  if value.starts_with("http://")
    || value.starts_with("https://")
    || value.starts_with("file://")
    || value.starts_with("cid:")
  {
    return Ok(Some(Photo::Url {
      url: value.to_string(),
    }));
  }

  Ok(None)
}

// ─── Version detection ───────────────────────────────────────────────────────

fn detect_version(props: &[RawProperty]) -> VcardVersion {
  for p in props {
    if p.name == "VERSION" {
      return match p.value.trim() {
        "4.0" => VcardVersion::V4,
        // Unrecognized values fall back with 3.0.
        _ => VcardVersion::V3,
      };
    }
  }
  VcardVersion::V3
}

// ─── Core parser ─────────────────────────────────────────────────────────────

fn typed_entry(
  prop: &RawProperty,
  label: Option<String>,
) -> Option<TypedEntry> {
  let value = unescape_value(prop.value.trim());
  if value.is_empty() {
    return None;
  }
  Some(TypedEntry {
    value,
    label,
    preferred: prop.is_preferred(),
  })
}

/// Parse a single vCard from `input`.
///
/// The returned contact has nil `contact_id`/`owner_id` and epoch
/// timestamps; callers assign identity before persisting. Foreign
/// properties never fail the parse — they come back in
/// [`ParsedVcard::unknown`] and as readable lines in the contact's notes.
pub(crate) fn parse_one(input: &str) -> Result<ParsedVcard> {
  let lines = unfold_lines(input);

  let start = lines
    .iter()
    .position(|l| l.eq_ignore_ascii_case("BEGIN:VCARD"))
    .ok_or(Error::MissingEnvelope)?;
  // Stop at the first END:VCARD so a body holding several concatenated
  // cards yields only the first, not a merge of all of them.
  let end = lines
    .iter()
    .skip(start + 1)
    .position(|l| l.eq_ignore_ascii_case("END:VCARD"))
    .map(|i| start + 1 + i)
    .ok_or(Error::MissingEnvelope)?;

  let props = tokenize(&lines[start + 1..end]);
  let labels = group_labels(&props);
  let version = detect_version(&props);

  let mut contact = Contact::default();
  let mut notes: Vec<String> = Vec::new();
  let mut unknown: Vec<RawProperty> = Vec::new();

  for prop in &props {
    // Group label wins over the TYPE tag; both are open free text.
    let label = prop
      .group
      .as_ref()
      .and_then(|g| labels.get(g).cloned())
      .or_else(|| prop.label_tag());

    match prop.name.as_str() {
      // ── Envelope / meta / consumed elsewhere ──────────────────────────
      "VERSION" | "PRODID" | "REV" | "X-ABLABEL" => {}

      "UID" => contact.uid = opt_str(&prop.value),

      // ── Name ──────────────────────────────────────────────────────────
      "FN" => {
        contact.name.display = opt_str(&unescape_value(&prop.value));
      }
      "N" => {
        // family;given;additional;prefix;suffix
        let parts: Vec<&str> = prop.value.split(';').collect();
        contact.name.family = component(&parts, 0);
        contact.name.given = component(&parts, 1);
        contact.name.additional = component(&parts, 2);
        contact.name.prefix = component(&parts, 3);
        contact.name.suffix = component(&parts, 4);
      }
      "NICKNAME" => {
        // Only the first of a comma list maps to the scalar field.
        contact.nickname = prop
          .value
          .split(',')
          .next()
          .and_then(opt_str)
          .map(|s| unescape_value(&s));
      }

      // ── Scalars ───────────────────────────────────────────────────────
      "ORG" => {
        // Only the organization name (first component) is mapped.
        contact.company = prop
          .value
          .split(';')
          .next()
          .and_then(opt_str)
          .map(|s| unescape_value(&s));
      }
      "TITLE" => contact.job_title = opt_str(&unescape_value(&prop.value)),
      "GENDER" => {
        contact.gender = prop.value.split(';').next().and_then(opt_str);
      }
      "NOTE" => {
        let note = unescape_value(&prop.value);
        if !note.is_empty() {
          notes.push(note);
        }
      }
      "CATEGORIES" => {
        for token in prop.value.split(',') {
          let c = unescape_value(token.trim());
          if !c.is_empty() && !contact.categories.contains(&c) {
            contact.categories.push(c);
          }
        }
      }

      // ── Multi-valued collections ──────────────────────────────────────
      "TEL" => {
        if let Some(e) = typed_entry(prop, label) {
          contact.phones.push(e);
        }
      }
      "EMAIL" => {
        if let Some(e) = typed_entry(prop, label) {
          contact.emails.push(e);
        }
      }
      "URL" => {
        if let Some(e) = typed_entry(prop, label) {
          contact.links.push(e);
        }
      }
      "IMPP" => {
        // Keep the full URI; derive a label from the scheme when no
        // explicit tag is present.
        let scheme_label = prop
          .value
          .split(':')
          .next()
          .filter(|s| s.len() < prop.value.len())
          .map(|s| s.to_lowercase());
        if let Some(e) = typed_entry(prop, label.or(scheme_label)) {
          contact.im_handles.push(e);
        }
      }
      "GEO" => {
        if let Some(e) = typed_entry(prop, label) {
          contact.geolocations.push(e);
        }
      }
      "ADR" => {
        // pobox;ext;street;city;region;postal;country — 0 and 1 dropped
        let parts: Vec<&str> = prop.value.split(';').collect();
        let address = PostalAddress {
          label,
          preferred: prop.is_preferred(),
          street: component(&parts, 2),
          city: component(&parts, 3),
          region: component(&parts, 4),
          postal_code: component(&parts, 5),
          country: component(&parts, 6),
        };
        if !address.is_empty() {
          contact.addresses.push(address);
        }
      }

      // ── Photo ─────────────────────────────────────────────────────────
      "PHOTO" => {
        // First usable photo wins; undecodable payloads go unknown.
        if contact.photo.is_none() {
          match parse_photo(prop) {
            Ok(Some(photo)) => contact.photo = Some(photo),
            Ok(None) | Err(_) => unknown.push(prop.clone()),
          }
        }
      }

      // ── Dated events ──────────────────────────────────────────────────
      "BDAY" => match parse_vcard_date(prop) {
        Ok(d) => contact.events.push(DatedEvent {
          kind:       EventKind::Birthday,
          date:       d.date,
          year_known: d.year_known,
          reminder:   None,
        }),
        Err(_) => unknown.push(prop.clone()),
      },
      "ANNIVERSARY" | "X-ANNIVERSARY" => match parse_vcard_date(prop) {
        Ok(d) => contact.events.push(DatedEvent {
          kind:       EventKind::Anniversary,
          date:       d.date,
          year_known: d.year_known,
          reminder:   None,
        }),
        Err(_) => unknown.push(prop.clone()),
      },
      "X-ABDATE" => match parse_vcard_date(prop) {
        Ok(d) => contact.events.push(DatedEvent {
          kind:       EventKind::Custom {
            label: label.unwrap_or_else(|| "date".to_string()),
          },
          date:       d.date,
          year_known: d.year_known,
          reminder:   None,
        }),
        Err(_) => unknown.push(prop.clone()),
      },

      // ── Recognized-but-unmapped → custom field ────────────────────────
      name if PRESERVED_PROPS.contains(&name) => {
        let value = unescape_value(&prop.value);
        if !value.is_empty() {
          contact.custom_fields.push(CustomField {
            key: name.to_string(),
            value,
          });
        }
      }

      // ── Wholly unrecognized → unknown channel ─────────────────────────
      _ => unknown.push(prop.clone()),
    }
  }

  // Unknown properties are never silently dropped: besides the structured
  // channel they surface as readable note lines.
  for prop in &unknown {
    let name = match &prop.group {
      Some(g) => format!("{}.{}", g, prop.name),
      None => prop.name.clone(),
    };
    notes.push(format!("{}: {}", name, unescape_value(&prop.value)));
  }
  if !notes.is_empty() {
    contact.notes = Some(notes.join("\n"));
  }

  Ok(ParsedVcard {
    contact,
    version,
    unknown,
  })
}

// ─── Tests ───────────────────────────────────────────────────────────────────
