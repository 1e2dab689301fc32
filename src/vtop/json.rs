//! JSON parsing with readable error messages for caller-supplied payloads.

use serde::de::DeserializeOwned;

/// Deserialize `body`, describing failures with the serde path of the
/// offending value, the type mismatch and a short excerpt of the input.
pub fn from_json_str<T: DeserializeOwned>(body: &str) -> Result<T, String> {
    let jd = &mut serde_json::Deserializer::from_str(body);
    serde_path_to_error::deserialize(jd).map_err(|err| {
        let path = err.path().to_string();
        let inner = err.into_inner();
        describe(body, &path, &inner)
    })
}

fn describe(body: &str, path: &str, err: &serde_json::Error) -> String {
    let (line, column) = (err.line(), err.column());
    let msg = err.to_string();
    let loc = format!(" at line {line} column {column}");
    let msg = msg.strip_suffix(&loc).unwrap_or(&msg);

    let mut out = String::new();
    if !path.is_empty() && path != "." {
        out.push_str(&format!("at '{path}': "));
    }
    out.push_str(&summarize_mismatch(msg));
    if line > 0 {
        out.push_str(&format!(" (line {line} col {column}) near `{}`", excerpt(body, line, column, 16)));
    }
    out
}

/// Turn `invalid type: X, expected Y` into `expected Y, got X`.
fn summarize_mismatch(msg: &str) -> String {
    if let Some(rest) = msg.strip_prefix("invalid type: ")
        && let Some((actual, expected)) = rest.split_once(", expected ")
    {
        return format!("expected {expected}, got {actual}");
    }
    msg.to_string()
}

/// Up to `width` characters on either side of the error position.
fn excerpt(body: &str, line: usize, column: usize, width: usize) -> String {
    let target: Vec<char> = body
        .lines()
        .nth(line.saturating_sub(1))
        .unwrap_or("")
        .chars()
        .collect();
    let idx = column.saturating_sub(1).min(target.len());
    let start = idx.saturating_sub(width);
    let end = (idx + width).min(target.len());
    target[start..end].iter().collect()
}
