//! Doc-spec parsing and validation.
//!
//! A doc comment beginning with `spec:` (case-insensitive) is a key-value
//! block. `param:` keys name parameters or fields of the declaration they
//! document; the checker verifies the listed names against the actual
//! parameter list.

/// A parsed `spec:` block.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocSpec {
    /// Names given by `param:` lines, in order.
    pub params: Vec<String>,
    /// All other keys, with their raw values.
    pub entries: Vec<(String, String)>,
}

/// Parse a doc comment as a spec block.
///
/// Returns `None` when the comment does not start with `spec:`;
/// `Some(Err(reason))` for a malformed block; `Some(Ok(spec))` otherwise.
pub fn parse_doc_spec(doc: &str) -> Option<Result<DocSpec, String>> {
    let trimmed = doc.trim_start();
    if trimmed.len() < 5 || !trimmed[..5].eq_ignore_ascii_case("spec:") {
        return None;
    }
    let body = &trimmed[5..];

    let mut spec = DocSpec::default();
    for raw_line in body.lines() {
        let line = raw_line.trim();
        if line.is_empty() {
            continue;
        }
        let Some((key, value)) = line.split_once(':') else {
            return Some(Err(format!("malformed line `{}` (expected `key: value`)", line)));
        };
        let key = key.trim();
        let value = value.trim();
        if key.is_empty() {
            return Some(Err(format!("malformed line `{}` (empty key)", line)));
        }
        if key.eq_ignore_ascii_case("param") {
            let name = value.split_whitespace().next().unwrap_or("");
            if name.is_empty() {
                return Some(Err("`param:` line names no parameter".to_string()));
            }
            spec.params.push(name.to_string());
        } else {
            spec.entries.push((key.to_string(), value.to_string()));
        }
    }
    Some(Ok(spec))
}

/// Compare spec'd param names against the declaration's actual names.
/// Returns problems in reporting order: unknown names first, then missing.
pub fn validate_params(spec: &DocSpec, actual: &[String]) -> Vec<String> {
    let mut problems = Vec::new();
    for name in &spec.params {
        if !actual.iter().any(|a| a == name) {
            problems.push(format!("unknown param `{}`", name));
        }
    }
    for name in actual {
        if !spec.params.iter().any(|p| p == name) {
            problems.push(format!("missing param `{}`", name));
        }
    }
    problems
}
