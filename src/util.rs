//! Small utility helpers used across modules.

use base64::{engine::general_purpose::STANDARD, Engine as _};

/// Very small and safe string templating.
/// Replaces occurrences of `{key}` in the template with provided values.
pub fn fill_template(tpl: &str, pairs: &[(&str, &str)]) -> String {
  let mut out = tpl.to_string();
  for (k, v) in pairs {
    let needle = format!("{{{}}}", k);
    out = out.replace(&needle, v);
  }
  out
}

/// Accept context text that was shipped base64-encoded.
/// Decodes only when the whole input is valid base64 of UTF-8 text and the result
/// is not suspiciously short; everything else is returned as-is.
pub fn decode_context(raw: &str) -> String {
  let trimmed = raw.trim();
  if trimmed.is_empty() || trimmed.contains(char::is_whitespace) {
    return raw.to_string();
  }
  match STANDARD.decode(trimmed) {
    Ok(bytes) => match String::from_utf8(bytes) {
      Ok(text) if text.len() * 10 >= trimmed.len() * 6 => text,
      _ => raw.to_string(),
    },
    Err(_) => raw.to_string(),
  }
}

/// Clamp a score into the [0, 100] percentage range (NaN becomes 0).
pub fn clamp_percent(score: f64) -> f64 {
  if score.is_nan() { 0.0 } else { score.clamp(0.0, 100.0) }
}

/// Log-safe truncation for large strings.
pub fn trunc_for_log(s: &str, max: usize) -> String {
  if s.chars().count() <= max {
    s.to_string()
  } else {
    let head: String = s.chars().take(max).collect();
    format!("{}… ({} bytes total)", head, s.len())
  }
}
