//! Small utility helpers used across modules.

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

/// Log-safe truncation for large strings (and session tokens).
/// Cuts on a char boundary.
pub fn trunc_for_log(s: &str, max: usize) -> String {
  if s.len() <= max {
    return s.to_string();
  }
  let mut end = max;
  while !s.is_char_boundary(end) {
    end -= 1;
  }
  format!("{}… ({} bytes total)", &s[..end], s.len())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn fill_template_replaces_all_keys() {
    let s = fill_template("Too bad! The correct answer was: {answer}", &[("answer", "London")]);
    assert_eq!(s, "Too bad! The correct answer was: London");
    assert_eq!(fill_template("{a}{a}", &[("a", "x")]), "xx");
  }

  #[test]
  fn trunc_respects_char_boundaries() {
    assert_eq!(trunc_for_log("short", 10), "short");
    let s = trunc_for_log("ééé", 3);
    assert!(s.starts_with("é…"));
  }
}
