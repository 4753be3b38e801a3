//! Contact — the local record synchronized against a remote address book.
//!
//! A contact owns one stable vCard `UID` (assigned once, never reassigned)
//! plus scalar fields and a set of multi-valued collections whose entry order
//! is irrelevant. Multi-valued entries carry an open free-text label rather
//! than a closed enum, so provider- and user-defined vCard `TYPE` values
//! survive a round trip verbatim.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ─── Sentinel year ───────────────────────────────────────────────────────────

/// Placeholder year stored for dates whose year is unknown.
///
/// This is the value Apple clients put in `X-APPLE-OMIT-YEAR`; storing the
/// same year keeps imported dates byte-compatible with what those clients
/// export. Consumers must check [`DatedEvent::year_known`] instead of
/// comparing against this constant.
pub const UNKNOWN_YEAR: i32 = 1604;

// ─── Name ────────────────────────────────────────────────────────────────────

/// Structured name parts (vCard `N`), plus an optional display override
/// (vCard `FN`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Name {
  pub given:      Option<String>,
  pub family:     Option<String>,
  pub additional: Option<String>,
  pub prefix:     Option<String>,
  pub suffix:     Option<String>,
  /// Display name as given by `FN`, when it differs from the joined parts.
  pub display:    Option<String>,
}

impl Name {
  pub fn is_empty(&self) -> bool {
    self.given.is_none()
      && self.family.is_none()
      && self.additional.is_none()
      && self.prefix.is_none()
      && self.suffix.is_none()
      && self.display.is_none()
  }

  /// Join the structured parts in display order, falling back to `display`.
  pub fn full(&self) -> Option<String> {
    if let Some(ref d) = self.display {
      return Some(d.clone());
    }
    let parts: Vec<&str> = [
      self.prefix.as_deref(),
      self.given.as_deref(),
      self.additional.as_deref(),
      self.family.as_deref(),
      self.suffix.as_deref(),
    ]
    .into_iter()
    .flatten()
    .collect();
    if parts.is_empty() {
      None
    } else {
      Some(parts.join(" "))
    }
  }
}

// ─── Multi-valued entries ────────────────────────────────────────────────────

/// One entry of a multi-valued collection (phone, email, link, IM handle,
/// geolocation).
///
/// `label` is the vCard `TYPE` tag, lowercased at the codec boundary but
/// otherwise preserved verbatim — it is an open string, not an enum.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TypedEntry {
  pub value:     String,
  pub label:     Option<String>,
  /// Mirrors the vCard `PREF` marker; at most one entry per collection
  /// should carry it.
  pub preferred: bool,
}

impl TypedEntry {
  pub fn new(value: impl Into<String>) -> Self {
    Self {
      value:     value.into(),
      label:     None,
      preferred: false,
    }
  }

  pub fn with_label(value: impl Into<String>, label: impl Into<String>) -> Self {
    Self {
      value:     value.into(),
      label:     Some(label.into()),
      preferred: false,
    }
  }
}

/// A postal address (vCard `ADR`). The PO-box and extended-address components
/// are not mapped.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PostalAddress {
  pub label:       Option<String>,
  pub preferred:   bool,
  pub street:      Option<String>,
  pub city:        Option<String>,
  pub region:      Option<String>,
  pub postal_code: Option<String>,
  pub country:     Option<String>,
}

impl PostalAddress {
  pub fn is_empty(&self) -> bool {
    self.street.is_none()
      && self.city.is_none()
      && self.region.is_none()
      && self.postal_code.is_none()
      && self.country.is_none()
  }
}

/// A user-defined or pass-through key/value field. Recognized-but-unmapped
/// standard vCard properties (ROLE, LANG, TZ, …) land here keyed by property
/// name so they survive export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomField {
  pub key:   String,
  pub value: String,
}

// ─── Photo ───────────────────────────────────────────────────────────────────

/// Normalized photo value (vCard `PHOTO`): either a reference URL or decoded
/// inline bytes with their media type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Photo {
  Url { url: String },
  Inline { media_type: String, data: Vec<u8> },
}

// ─── Dated events ────────────────────────────────────────────────────────────

/// The kind of a dated event. `Custom` carries a free-text label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventKind {
  Birthday,
  Anniversary,
  Custom { label: String },
}

/// Advisory reminder policy attached to an event. Scheduling and delivery
/// happen outside this system; the policy only round-trips through storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReminderPolicy {
  /// "one_time" or "yearly".
  pub frequency:   String,
  pub days_before: u32,
}

/// A dated event (vCard `BDAY` / `ANNIVERSARY`).
///
/// When the source date omitted its year, `date` holds [`UNKNOWN_YEAR`] and
/// `year_known` is `false`; month and day are always meaningful.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatedEvent {
  pub kind:       EventKind,
  pub date:       NaiveDate,
  pub year_known: bool,
  pub reminder:   Option<ReminderPolicy>,
}

impl DatedEvent {
  pub fn known(kind: EventKind, date: NaiveDate) -> Self {
    Self {
      kind,
      date,
      year_known: true,
      reminder: None,
    }
  }
}

// ─── Contact ─────────────────────────────────────────────────────────────────

/// The full local contact record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contact {
  pub contact_id: Uuid,
  /// The user this contact belongs to; all queries are scoped by owner.
  pub owner_id:   Uuid,
  /// Stable vCard UID. `None` until first export or import; once set it is
  /// only ever rewritten when the server rewrites it (see the mapping
  /// correlation rules).
  pub uid:        Option<String>,

  pub name:      Name,
  pub nickname:  Option<String>,
  pub company:   Option<String>,
  pub job_title: Option<String>,
  pub gender:    Option<String>,
  pub notes:     Option<String>,

  pub categories: Vec<String>,
  pub photo:      Option<Photo>,

  pub phones:        Vec<TypedEntry>,
  pub emails:        Vec<TypedEntry>,
  pub addresses:     Vec<PostalAddress>,
  pub links:         Vec<TypedEntry>,
  pub im_handles:    Vec<TypedEntry>,
  pub geolocations:  Vec<TypedEntry>,
  pub custom_fields: Vec<CustomField>,
  pub events:        Vec<DatedEvent>,

  pub created_at: DateTime<Utc>,
  /// Bumped on every local edit; compared against a mapping's
  /// `last_synced_at` to detect local changes. Never authoritative for
  /// "did content change" — content hashes are.
  pub updated_at: DateTime<Utc>,
}

impl Default for Contact {
  /// Empty record with nil identifiers and epoch timestamps; callers assign
  /// real identity before persisting.
  fn default() -> Self {
    Self {
      contact_id: Uuid::nil(),
      owner_id: Uuid::nil(),
      uid: None,
      name: Name::default(),
      nickname: None,
      company: None,
      job_title: None,
      gender: None,
      notes: None,
      categories: Vec::new(),
      photo: None,
      phones: Vec::new(),
      emails: Vec::new(),
      addresses: Vec::new(),
      links: Vec::new(),
      im_handles: Vec::new(),
      geolocations: Vec::new(),
      custom_fields: Vec::new(),
      events: Vec::new(),
      created_at: DateTime::UNIX_EPOCH,
      updated_at: DateTime::UNIX_EPOCH,
    }
  }
}

impl Contact {
  /// Fresh empty contact for `owner_id` with both timestamps set to `now`.
  pub fn new(owner_id: Uuid, now: DateTime<Utc>) -> Self {
    Self {
      contact_id: Uuid::new_v4(),
      owner_id,
      created_at: now,
      updated_at: now,
      ..Self::default()
    }
  }

  /// Display name for progress output and the `FN` fallback chain:
  /// name parts, then nickname, then a neutral placeholder.
  pub fn display_name(&self) -> String {
    self
      .name
      .full()
      .or_else(|| self.nickname.clone())
      .unwrap_or_else(|| "Unnamed contact".to_string())
  }

  /// Overwrite every field that synchronization owns with `other`'s values,
  /// keeping identity (`contact_id`, `owner_id`, `created_at`) intact.
  ///
  /// Collections are replaced wholesale — there is no per-entry merge.
  pub fn overwrite_from(&mut self, other: &Contact, now: DateTime<Utc>) {
    self.uid = other.uid.clone();
    self.name = other.name.clone();
    self.nickname = other.nickname.clone();
    self.company = other.company.clone();
    self.job_title = other.job_title.clone();
    self.gender = other.gender.clone();
    self.notes = other.notes.clone();
    self.categories = other.categories.clone();
    self.photo = other.photo.clone();
    self.phones = other.phones.clone();
    self.emails = other.emails.clone();
    self.addresses = other.addresses.clone();
    self.links = other.links.clone();
    self.im_handles = other.im_handles.clone();
    self.geolocations = other.geolocations.clone();
    self.custom_fields = other.custom_fields.clone();
    self.events = other.events.clone();
    self.updated_at = now;
  }
}

#[cfg(test)]
mod tests {
  use chrono::Utc;

  use super::*;

  #[test]
  fn name_full_joins_parts_in_display_order() {
    let name = Name {
      given: Some("Alice".into()),
      family: Some("Smith".into()),
      prefix: Some("Dr.".into()),
      ..Name::default()
    };
    assert_eq!(name.full(), Some("Dr. Alice Smith".to_string()));
  }

  #[test]
  fn name_full_prefers_display_override() {
    let name = Name {
      given: Some("Alice".into()),
      display: Some("Ally".into()),
      ..Name::default()
    };
    assert_eq!(name.full(), Some("Ally".to_string()));
  }

  #[test]
  fn display_name_falls_back_to_nickname_then_placeholder() {
    let mut c = Contact::new(Uuid::new_v4(), Utc::now());
    assert_eq!(c.display_name(), "Unnamed contact");
    c.nickname = Some("Ace".into());
    assert_eq!(c.display_name(), "Ace");
  }

  #[test]
  fn overwrite_from_replaces_collections_and_keeps_identity() {
    let now = Utc::now();
    let owner = Uuid::new_v4();
    let mut local = Contact::new(owner, now);
    local.phones.push(TypedEntry::new("+1 555 0100"));

    let mut incoming = Contact::new(Uuid::new_v4(), now);
    incoming.uid = Some("remote-uid".into());
    incoming.phones.push(TypedEntry::new("+1 555 0199"));
    incoming.emails.push(TypedEntry::new("a@example.com"));

    let id = local.contact_id;
    local.overwrite_from(&incoming, now);

    assert_eq!(local.contact_id, id);
    assert_eq!(local.owner_id, owner);
    assert_eq!(local.uid.as_deref(), Some("remote-uid"));
    assert_eq!(local.phones.len(), 1);
    assert_eq!(local.phones[0].value, "+1 555 0199");
    assert_eq!(local.emails.len(), 1);
  }
}
