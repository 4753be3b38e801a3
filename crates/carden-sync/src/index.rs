//! In-memory correlation index for one sync pass.
//!
//! Built from a single bulk load of the connection's mappings, so matching
//! during pull and push costs no further store reads. The index is a
//! per-pass arena; it is rebuilt from scratch on the next pass.

use std::collections::HashMap;

use carden_core::mapping::Mapping;
use uuid::Uuid;

pub struct MappingIndex {
  mappings: Vec<Mapping>,
  by_id:    HashMap<Uuid, usize>,
  by_uid:   HashMap<String, usize>,
  by_href:  HashMap<String, usize>,
}

impl MappingIndex {
  pub fn new(mappings: Vec<Mapping>) -> Self {
    let mut by_id = HashMap::with_capacity(mappings.len());
    let mut by_uid = HashMap::with_capacity(mappings.len());
    let mut by_href = HashMap::with_capacity(mappings.len());
    for (i, m) in mappings.iter().enumerate() {
      by_id.insert(m.mapping_id, i);
      by_uid.insert(m.remote_uid.clone(), i);
      by_href.insert(m.remote_href.clone(), i);
    }
    Self {
      mappings,
      by_id,
      by_uid,
      by_href,
    }
  }

  pub fn len(&self) -> usize { self.mappings.len() }

  pub fn is_empty(&self) -> bool { self.mappings.is_empty() }

  pub fn by_uid(&self, uid: &str) -> Option<&Mapping> {
    self.by_uid.get(uid).map(|&i| &self.mappings[i])
  }

  pub fn by_href(&self, href: &str) -> Option<&Mapping> {
    self.by_href.get(href).map(|&i| &self.mappings[i])
  }

  pub fn iter(&self) -> impl Iterator<Item = &Mapping> {
    self.mappings.iter()
  }

  /// Replace the stored copy of `mapping` (matched by id) and re-key it.
  /// Inserts when the id is new, so freshly exported mappings are visible to
  /// the rest of the pass.
  pub fn update(&mut self, mapping: Mapping) {
    match self.by_id.get(&mapping.mapping_id).copied() {
      Some(i) => {
        let old = &self.mappings[i];
        self.by_uid.remove(&old.remote_uid);
        self.by_href.remove(&old.remote_href);
        self.by_uid.insert(mapping.remote_uid.clone(), i);
        self.by_href.insert(mapping.remote_href.clone(), i);
        self.mappings[i] = mapping;
      }
      None => {
        let i = self.mappings.len();
        self.by_id.insert(mapping.mapping_id, i);
        self.by_uid.insert(mapping.remote_uid.clone(), i);
        self.by_href.insert(mapping.remote_href.clone(), i);
        self.mappings.push(mapping);
      }
    }
  }
}
