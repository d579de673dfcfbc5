use crate::result::Sensitive;

const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

/// Returns a mask with the same number of characters as `value`
///
/// The mask is derived from the BLAKE3 extendable output of the value, so the same
/// object name always masks the same way and cached explanations stay addressable
pub fn mask(value: &str) -> String {
  let len = value.chars().count();
  let mut hasher = blake3::Hasher::new();
  hasher.update(value.as_bytes());

  let mut bytes = vec![0u8; len];
  hasher.finalize_xof().fill(&mut bytes);

  bytes
    .iter()
    .map(|b| ALPHABET[*b as usize % ALPHABET.len()] as char)
    .collect()
}

/// Replace every sensitive value in `text` with its mask
pub fn mask_text(text: &str, sensitive: &[Sensitive]) -> String {
  replace_all(text, sensitive, |s| (&s.unmasked, &s.masked))
}

/// Replace every mask in `text` with the original value
pub fn unmask_text(text: &str, sensitive: &[Sensitive]) -> String {
  replace_all(text, sensitive, |s| (&s.masked, &s.unmasked))
}

fn replace_all<'a, F>(text: &str, sensitive: &'a [Sensitive], pick: F) -> String
where
  F: Fn(&'a Sensitive) -> (&'a String, &'a String),
{
  let mut pairs: Vec<(&String, &String)> = sensitive.iter().map(pick).filter(|(from, _)| !from.is_empty()).collect();
  // Longest first so `web` never clobbers part of `web-frontend`
  pairs.sort_by(|a, b| b.0.len().cmp(&a.0.len()));

  let mut out = text.to_owned();
  for (from, to) in pairs {
    out = replace_token(&out, from, to);
  }
  out
}

/// Characters that may appear inside an object name
fn is_name_char(c: char) -> bool {
  c.is_ascii_alphanumeric() || c == '.' || c == '-'
}

/// Replace occurrences of `from` that stand alone, so `a` never rewrites the `a` in `has`
fn replace_token(text: &str, from: &str, to: &str) -> String {
  let mut out = String::with_capacity(text.len());
  let mut last = 0;

  for (start, _) in text.match_indices(from) {
    let end = start + from.len();
    let bounded_before = !text[..start].chars().next_back().is_some_and(is_name_char);
    let bounded_after = !text[end..].chars().next().is_some_and(is_name_char);
    if bounded_before && bounded_after {
      out.push_str(&text[last..start]);
      out.push_str(to);
      last = end;
    }
  }

  out.push_str(&text[last..]);
  out
}
