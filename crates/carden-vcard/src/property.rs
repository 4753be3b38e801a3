//! Content-line tokenizer: unfolding, `group.NAME;PARAMS:VALUE` splitting,
//! `TYPE` normalization, and the `itemN.` label-group join.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

// ─── RawProperty ─────────────────────────────────────────────────────────────

/// One vCard parameter, name uppercased, surrounding quotes stripped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Param {
  pub name:  String,
  pub value: String,
}

/// A tokenized content line. Exists only during parsing; properties the
/// field mapper does not recognize are surfaced to callers through the
/// unknown-properties channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawProperty {
  /// Vendor group prefix (`item1.URL` → `item1`), lowercased.
  pub group:  Option<String>,
  /// Property name, uppercased.
  pub name:   String,
  pub params: Vec<Param>,
  /// Unfolded raw value, escapes intact.
  pub value:  String,
}

impl RawProperty {
  /// First value of the named parameter, case-insensitive on the name.
  pub fn param(&self, name: &str) -> Option<&str> {
    self
      .params
      .iter()
      .find(|p| p.name.eq_ignore_ascii_case(name))
      .map(|p| p.value.as_str())
  }

  /// Collect all `TYPE=` values into one lowercased tag list.
  ///
  /// Handles vCard 3.0 comma-joined lists (`TYPE=WORK,VOICE`), repeated
  /// `TYPE=` parameters, and vCard 4.0 quoted comma lists
  /// (`TYPE="work,voice"` — quotes are stripped at tokenization).
  pub fn type_tags(&self) -> Vec<String> {
    let mut tags = Vec::new();
    for p in &self.params {
      if p.name.eq_ignore_ascii_case("TYPE") {
        for t in p.value.split(',') {
          let t = t.trim().to_lowercase();
          if !t.is_empty() && !tags.contains(&t) {
            tags.push(t);
          }
        }
      }
    }
    tags
  }

  /// Whether this entry carries a preferred marker — `PREF=1` (v4) or a
  /// `TYPE=PREF` tag (v3).
  pub fn is_preferred(&self) -> bool {
    if let Some(v) = self.param("PREF")
      && v.trim() == "1"
    {
      return true;
    }
    self.type_tags().iter().any(|t| t == "pref")
  }

  /// First type tag usable as a label (skipping the v3 `pref` marker).
  pub fn label_tag(&self) -> Option<String> {
    self.type_tags().into_iter().find(|t| t != "pref")
  }

  /// Whether `ENCODING` names one of the base64 spellings (`B`, `BASE64`).
  pub fn is_base64(&self) -> bool {
    self
      .param("ENCODING")
      .map(|v| v.eq_ignore_ascii_case("b") || v.eq_ignore_ascii_case("base64"))
      .unwrap_or(false)
  }
}

// ─── Unfolding ───────────────────────────────────────────────────────────────

/// Join soft line continuations: a physical line starting with SP or HT
/// continues the previous logical line (RFC 6350 §3.2). Tolerates bare LF.
pub fn unfold_lines(s: &str) -> Vec<String> {
  let mut lines: Vec<String> = Vec::new();
  for raw in s.split('\n') {
    let line = raw.strip_suffix('\r').unwrap_or(raw);
    if line.starts_with(' ') || line.starts_with('\t') {
      if let Some(last) = lines.last_mut() {
        last.push_str(&line[1..]);
      }
      // leading continuation with no prior line — discard
    } else {
      lines.push(line.to_string());
    }
  }
  lines.retain(|l| !l.is_empty());
  lines
}

// ─── Quoted-aware splitting ──────────────────────────────────────────────────

/// Find the first `:` that is not inside a double-quoted string.
fn find_unquoted_colon(s: &str) -> Option<usize> {
  let mut in_quotes = false;
  for (i, c) in s.char_indices() {
    match c {
      '"' => in_quotes = !in_quotes,
      ':' if !in_quotes => return Some(i),
      _ => {}
    }
  }
  None
}

/// Split on `;` while respecting double-quoted strings.
fn split_semicolons_respecting_quotes(s: &str) -> Vec<&str> {
  let mut result = Vec::new();
  let mut start = 0usize;
  let mut in_quotes = false;
  for (i, c) in s.char_indices() {
    match c {
      '"' => in_quotes = !in_quotes,
      ';' if !in_quotes => {
        result.push(&s[start..i]);
        start = i + 1;
      }
      _ => {}
    }
  }
  result.push(&s[start..]);
  result
}

// ─── Content-line parser ─────────────────────────────────────────────────────

/// Tokenize one unfolded logical line into a [`RawProperty`].
pub fn parse_property(line: &str) -> Result<RawProperty> {
  let colon_pos = find_unquoted_colon(line)
    .ok_or_else(|| Error::MalformedContentLine(line.to_string()))?;

  let name_part = &line[..colon_pos];
  let value = line[colon_pos + 1..].to_string();

  let tokens = split_semicolons_respecting_quotes(name_part);
  if tokens.is_empty() || tokens[0].trim().is_empty() {
    return Err(Error::MalformedContentLine(line.to_string()));
  }

  // Split off the group prefix ("item1.URL" → group "item1", name "URL").
  let name_raw = tokens[0];
  let (group, name) = match name_raw.find('.') {
    Some(dot_pos) => (
      Some(name_raw[..dot_pos].to_lowercase()),
      name_raw[dot_pos + 1..].to_uppercase(),
    ),
    None => (None, name_raw.to_uppercase()),
  };
  if name.is_empty() {
    return Err(Error::MalformedContentLine(line.to_string()));
  }

  let mut params = Vec::new();
  for token in &tokens[1..] {
    if let Some(eq_pos) = token.find('=') {
      let param_name = token[..eq_pos].trim().to_uppercase();
      let param_val = token[eq_pos + 1..].trim().trim_matches('"').to_string();
      params.push(Param {
        name:  param_name,
        value: param_val,
      });
    } else {
      // Bare token — vCard 3.0 shorthand for TYPE=value.
      let t = token.trim();
      if !t.is_empty() {
        params.push(Param {
          name:  "TYPE".to_string(),
          value: t.to_uppercase(),
        });
      }
    }
  }

  Ok(RawProperty {
    group,
    name,
    params,
    value,
  })
}

/// Tokenize a whole vCard body into properties, skipping malformed lines.
pub fn tokenize(lines: &[String]) -> Vec<RawProperty> {
  lines
    .iter()
    .filter_map(|l| parse_property(l).ok())
    .collect()
}

// ─── Vendor label groups ─────────────────────────────────────────────────────

/// Decode Apple's bracketed built-in label tokens: `_$!<Home>!$_` → `home`.
/// Anything else passes through unchanged (lowercased only when bracketed).
pub fn decode_vendor_label(s: &str) -> String {
  let trimmed = s.trim();
  if let Some(inner) = trimmed
    .strip_prefix("_$!<")
    .and_then(|rest| rest.strip_suffix(">!$_"))
  {
    inner.to_lowercase()
  } else {
    trimmed.to_string()
  }
}

/// Group-by-prefix pass over the flat property list: collect the decoded
/// `X-ABLABEL` value for every `itemN.` group, so a value property and its
/// sibling label combine into one typed entry during field mapping.
pub fn group_labels(props: &[RawProperty]) -> HashMap<String, String> {
  let mut labels = HashMap::new();
  for p in props {
    if p.name == "X-ABLABEL"
      && let Some(ref group) = p.group
    {
      let label = decode_vendor_label(&p.value);
      if !label.is_empty() {
        labels.insert(group.clone(), label);
      }
    }
  }
  labels
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn unfold_joins_space_and_tab_continuations() {
    let lines = unfold_lines("FN:Alice\r\n  Smith\r\nNOTE:a\r\n\tb\r\n");
    assert_eq!(lines, vec!["FN:Alice Smith", "NOTE:ab"]);
  }

  #[test]
  fn parse_splits_group_name_params_value() {
    let p = parse_property("item1.URL;TYPE=HOME:https://example.com").unwrap();
    assert_eq!(p.group.as_deref(), Some("item1"));
    assert_eq!(p.name, "URL");
    assert_eq!(p.value, "https://example.com");
    assert_eq!(p.type_tags(), vec!["home"]);
  }

  #[test]
  fn colon_inside_quoted_param_is_not_a_separator() {
    let p = parse_property("TEL;X-REF=\"a:b\":+1555").unwrap();
    assert_eq!(p.value, "+1555");
    assert_eq!(p.param("X-REF"), Some("a:b"));
  }

  #[test]
  fn v3_comma_and_repeated_type_params_normalize() {
    let p = parse_property("TEL;TYPE=WORK,VOICE;TYPE=PREF:+1555").unwrap();
    assert_eq!(p.type_tags(), vec!["work", "voice", "pref"]);
    assert!(p.is_preferred());
    assert_eq!(p.label_tag().as_deref(), Some("work"));
  }

  #[test]
  fn v4_quoted_comma_list_normalizes() {
    let p = parse_property("TEL;TYPE=\"Work,Voice\":+1555").unwrap();
    assert_eq!(p.type_tags(), vec!["work", "voice"]);
  }

  #[test]
  fn bare_v3_token_becomes_type() {
    let p = parse_property("TEL;CELL:+1555").unwrap();
    assert_eq!(p.type_tags(), vec!["cell"]);
  }

  #[test]
  fn pref_param_one_marks_preferred() {
    let p = parse_property("EMAIL;PREF=1:a@b.com").unwrap();
    assert!(p.is_preferred());
    let q = parse_property("EMAIL;PREF=3:a@b.com").unwrap();
    assert!(!q.is_preferred());
  }

  #[test]
  fn missing_colon_is_malformed() {
    assert!(matches!(
      parse_property("JUSTAWORD"),
      Err(Error::MalformedContentLine(_))
    ));
  }

  #[test]
  fn vendor_label_brackets_decode_to_plain_text() {
    assert_eq!(decode_vendor_label("_$!<HomePage>!$_"), "homepage");
    assert_eq!(decode_vendor_label("_$!<Home>!$_"), "home");
    assert_eq!(decode_vendor_label("blog"), "blog");
  }

  #[test]
  fn group_labels_joins_siblings_by_prefix() {
    let props = tokenize(&unfold_lines(
      "item1.URL:https://example.com\r\nitem1.X-ABLabel:_$!<HomePage>!$_\r\nitem2.X-ABLABEL:blog\r\n",
    ));
    let labels = group_labels(&props);
    assert_eq!(labels.get("item1").map(String::as_str), Some("homepage"));
    assert_eq!(labels.get("item2").map(String::as_str), Some("blog"));
  }
}
