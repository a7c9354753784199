//! Small utility helpers used across modules.

/// Clamp a score into the [0, 1] band the analysis contract promises.
pub fn clamp01(v: f64) -> f64 {
  if v < 0.0 { 0.0 } else if v > 1.0 { 1.0 } else { v }
}

/// Extension of an uploaded file name, defaulting to "webm" when the name
/// carries none. Lowercased so storage paths stay uniform.
pub fn file_extension(name: &str) -> String {
  name
    .rsplit_once('.')
    .map(|(_, ext)| ext.to_ascii_lowercase())
    .filter(|ext| !ext.is_empty() && ext.len() <= 8)
    .unwrap_or_else(|| "webm".to_string())
}

/// Log-safe truncation for large strings.
/// Avoids spamming logs with huge request/response payloads. The cut always
/// lands on a char boundary, so arbitrary client bytes cannot panic it.
pub fn trunc_for_log(s: &str, max: usize) -> String {
  if s.len() <= max {
    return s.to_string();
  }
  let cut = s
    .char_indices()
    .map(|(i, _)| i)
    .take_while(|&i| i <= max)
    .last()
    .unwrap_or(0);
  format!("{}… ({} bytes total)", &s[..cut], s.len())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn extension_falls_back_to_webm() {
    assert_eq!(file_extension("clip.MP4"), "mp4");
    assert_eq!(file_extension("noext"), "webm");
    assert_eq!(file_extension("trailing."), "webm");
  }

  #[test]
  fn truncation_never_splits_a_multibyte_char() {
    // 23 ascii bytes followed by a 3-byte char straddling the cut point.
    let s = format!("{}€", "a".repeat(23));
    let out = trunc_for_log(&s, 24);
    assert!(out.starts_with(&"a".repeat(23)));
    assert!(out.contains("26 bytes total"));

    // Entirely multibyte input.
    let out = trunc_for_log("€€€€€€€€€€", 7);
    assert!(out.starts_with("€€"));
    assert!(out.contains("30 bytes total"));

    // Short strings pass through untouched.
    assert_eq!(trunc_for_log("€€", 24), "€€");
  }

  #[test]
  fn clamp_keeps_unit_interval() {
    assert_eq!(clamp01(-0.5), 0.0);
    assert_eq!(clamp01(0.42), 0.42);
    assert_eq!(clamp01(1.7), 1.0);
  }
}
