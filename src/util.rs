//! Small utility helpers used across modules.

/// Very small and safe string templating.
/// Replaces occurrences of `{key}` in the template with provided values.
/// This is intentionally simple (no nested/conditional logic).
pub fn fill_template(tpl: &str, pairs: &[(&str, &str)]) -> String {
  let mut out = tpl.to_string();
  for (k, v) in pairs {
    let needle = format!("{{{}}}", k);
    out = out.replace(&needle, v);
  }
  out
}

/// Log-safe truncation for large strings.
/// Avoids spamming logs with huge model responses.
pub fn trunc_for_log(s: &str, max: usize) -> String {
  if s.chars().count() <= max {
    s.to_string()
  } else {
    let head: String = s.chars().take(max).collect();
    format!("{}… ({} bytes total)", head, s.len())
  }
}

/// Round to one decimal place (half away from zero).
pub fn round1(x: f64) -> f64 {
  (x * 10.0).round() / 10.0
}

/// Percentage `part / whole * 100`, 0 when `whole` is 0.
pub fn percent(part: u64, whole: u64) -> f64 {
  if whole == 0 { 0.0 } else { part as f64 / whole as f64 * 100.0 }
}
