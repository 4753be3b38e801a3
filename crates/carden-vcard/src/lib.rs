//! vCard 3.0 / 4.0 codec for carden.
//!
//! Converts between vCard strings and the [`carden_core`] contact record.
//! Pure synchronous; no HTTP or database dependencies.
//!
//! # Quick start
//!
//! ```no_run
//! let vcard = "BEGIN:VCARD\r\nVERSION:4.0\r\nFN:Alice Smith\r\nEND:VCARD\r\n";
//! let parsed = carden_vcard::parse(vcard).unwrap();
//! println!(
//!   "uid={:?}, {} unknown properties",
//!   parsed.contact.uid,
//!   parsed.unknown.len()
//! );
//! ```

pub mod error;
mod parse;
pub mod property;
mod serialize;

use carden_core::contact::Contact;
pub use error::{Error, Result};
pub use property::RawProperty;

// ─── Public types ────────────────────────────────────────────────────────────

/// vCard version detected from the `VERSION` property.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VcardVersion {
  V3,
  V4,
}

/// The result of parsing one vCard.
#[derive(Debug, Clone)]
pub struct ParsedVcard {
  /// Mapped contact data. Identity fields (`contact_id`, `owner_id`) are
  /// nil and timestamps are epoch; the caller assigns them before
  /// persisting.
  pub contact: Contact,
  /// Detected source version (3.0 assumed when absent or unrecognized).
  pub version: VcardVersion,
  /// Properties the codec does not map, preserved verbatim. The same
  /// properties are also appended as readable lines to the contact's
  /// notes so nothing is silently dropped.
  pub unknown: Vec<RawProperty>,
}

// ─── Public API ──────────────────────────────────────────────────────────────

/// Parse a single vCard from `input`.
pub fn parse(input: &str) -> Result<ParsedVcard> { parse::parse_one(input) }

/// Serialize `contact` as a vCard 4.0 string (CRLF line endings, folded at
/// 75 octets). Fails with [`Error::MissingUid`] if no UID is assigned.
pub fn serialize(contact: &Contact) -> Result<String> {
  serialize::serialize_one(contact)
}

// ─── Round-trip tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod roundtrip_tests {
  use carden_core::contact::{
    Contact, CustomField, DatedEvent, EventKind, Name, Photo, PostalAddress,
    TypedEntry, UNKNOWN_YEAR,
  };
  use chrono::NaiveDate;
  use uuid::Uuid;

  use super::*;

  fn sample_contact() -> Contact {
    let mut c = Contact::new(Uuid::new_v4(), chrono::Utc::now());
    c.uid = Some("carden-uid-1".to_string());
    c.name = Name {
      given: Some("Alice".into()),
      family: Some("Smith".into()),
      prefix: Some("Dr.".into()),
      ..Name::default()
    };
    c.nickname = Some("Ace".into());
    c.company = Some("Acme Corp".into());
    c.job_title = Some("Engineer".into());
    c.gender = Some("F".into());
    c.categories = vec!["friends".into(), "book club".into()];
    c.phones.push(TypedEntry {
      value:     "+15555550100".into(),
      label:     Some("cell".into()),
      preferred: true,
    });
    c.emails.push(TypedEntry::with_label("alice@example.com", "work"));
    c.addresses.push(PostalAddress {
      label: Some("home".into()),
      street: Some("123 Main St".into()),
      city: Some("Springfield".into()),
      region: Some("IL".into()),
      postal_code: Some("62701".into()),
      country: Some("USA".into()),
      ..PostalAddress::default()
    });
    c.links.push(TypedEntry::with_label(
      "https://example.com/blog",
      "homepage",
    ));
    c.im_handles
      .push(TypedEntry::with_label("xmpp:alice@jabber.org", "xmpp"));
    c.geolocations
      .push(TypedEntry::new("geo:39.78,-89.65"));
    c.photo = Some(Photo::Inline {
      media_type: "image/png".into(),
      data:       b"fake-png".to_vec(),
    });
    c.events.push(DatedEvent::known(
      EventKind::Birthday,
      NaiveDate::from_ymd_opt(1990, 3, 15).unwrap(),
    ));
    c.events.push(DatedEvent {
      kind:       EventKind::Anniversary,
      date:       NaiveDate::from_ymd_opt(UNKNOWN_YEAR, 6, 1).unwrap(),
      year_known: false,
      reminder:   None,
    });
    c.events.push(DatedEvent::known(
      EventKind::Custom {
        label: "gotcha day".into(),
      },
      NaiveDate::from_ymd_opt(2020, 1, 2).unwrap(),
    ));
    c.custom_fields.push(CustomField {
      key:   "ROLE".into(),
      value: "Project Lead".into(),
    });
    c.notes = Some("First met at a conference.".into());
    c
  }

  #[test]
  fn parse_of_serialize_reproduces_every_mapped_field() {
    let original = sample_contact();
    let vcard = serialize(&original).expect("serialize");
    let parsed = parse(&vcard).expect("parse");
    let got = parsed.contact;

    assert_eq!(got.uid, original.uid);
    assert_eq!(got.name.given, original.name.given);
    assert_eq!(got.name.family, original.name.family);
    assert_eq!(got.name.prefix, original.name.prefix);
    assert_eq!(got.nickname, original.nickname);
    assert_eq!(got.company, original.company);
    assert_eq!(got.job_title, original.job_title);
    assert_eq!(got.gender, original.gender);
    assert_eq!(got.categories, original.categories);
    assert_eq!(got.phones, original.phones);
    assert_eq!(got.emails, original.emails);
    assert_eq!(got.addresses, original.addresses);
    assert_eq!(got.links, original.links);
    assert_eq!(got.im_handles, original.im_handles);
    assert_eq!(got.geolocations, original.geolocations);
    assert_eq!(got.photo, original.photo);
    assert_eq!(got.events, original.events);
    assert_eq!(got.custom_fields, original.custom_fields);
    assert_eq!(got.notes, original.notes);
    // Everything we emit is a property we map.
    assert!(parsed.unknown.is_empty(), "unknown: {:?}", parsed.unknown);
  }

  #[test]
  fn year_unknown_survives_a_full_round_trip() {
    let original = sample_contact();
    let vcard = serialize(&original).expect("serialize");
    assert!(vcard.contains("ANNIVERSARY:--06-01\r\n"), "got:\n{vcard}");

    let reparsed = parse(&vcard).unwrap();
    let anniversary = reparsed
      .contact
      .events
      .iter()
      .find(|e| e.kind == EventKind::Anniversary)
      .unwrap();
    assert!(!anniversary.year_known);
    assert_eq!(chrono::Datelike::month(&anniversary.date), 6);
    assert_eq!(chrono::Datelike::day(&anniversary.date), 1);
  }

  #[test]
  fn foreign_vcard_degrades_gracefully_instead_of_failing() {
    let input = concat!(
      "BEGIN:VCARD\r\n",
      "VERSION:3.0\r\n",
      "FN:Bob\r\n",
      "X-EVOLUTION-ANNIVERSARY:oops\r\n",
      "X-MOZILLA-HTML:TRUE\r\n",
      "END:VCARD\r\n",
    );
    let parsed = parse(input).unwrap();
    assert_eq!(parsed.contact.display_name(), "Bob");
    assert_eq!(parsed.unknown.len(), 2);
    let notes = parsed.contact.notes.as_deref().unwrap();
    assert!(notes.contains("X-MOZILLA-HTML: TRUE"));
  }
}
