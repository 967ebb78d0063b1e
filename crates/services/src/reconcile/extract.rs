//! Recovering a JSON document from text pasted out of chats, notes or mail.
//!
//! Stages, in order: parse the text as-is; strip a fenced code block and
//! parse its body; parse the first balanced `{...}` / `[...]` span. The span
//! scan is capped at `MAX_SCAN_BYTES`.

use serde_json::Value;

use crate::error::ImportError;

pub const MAX_SCAN_BYTES: usize = 512 * 1024;

const FENCE: &str = "```";

/// Extract a JSON value from `raw`.
///
/// # Errors
///
/// Returns `ImportError::Unparseable` when no stage yields JSON, or
/// `ImportError::ScanLimitExceeded` when the balanced span does not close
/// within the scan limit.
pub fn extract_json(raw: &str) -> Result<Value, ImportError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ImportError::Unparseable);
    }

    if let Ok(value) = serde_json::from_str(trimmed) {
        return Ok(value);
    }

    if let Some(body) = strip_fence(trimmed) {
        if let Ok(value) = serde_json::from_str(body.trim()) {
            return Ok(value);
        }
    }

    let span = balanced_span(trimmed)?;
    serde_json::from_str(span).map_err(|_| ImportError::Unparseable)
}

/// Body of the first fenced block, without the opening line's language tag.
/// An unterminated fence runs to the end of the text.
fn strip_fence(text: &str) -> Option<&str> {
    let start = text.find(FENCE)? + FENCE.len();
    let after_open = &text[start..];
    let body_start = after_open.find('\n').map_or(after_open.len(), |i| i + 1);
    let body = &after_open[body_start..];
    let body = match body.find(FENCE) {
        Some(end) => &body[..end],
        None => body,
    };
    Some(body)
}

fn balanced_span(text: &str) -> Result<&str, ImportError> {
    let start = text.find(['{', '[']).ok_or(ImportError::Unparseable)?;
    let mut stack: Vec<u8> = Vec::new();
    let mut in_string = false;
    let mut escaped = false;

    for (offset, byte) in text.as_bytes()[start..].iter().copied().enumerate() {
        if offset >= MAX_SCAN_BYTES {
            return Err(ImportError::ScanLimitExceeded {
                limit: MAX_SCAN_BYTES,
            });
        }
        if in_string {
            match byte {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match byte {
            b'"' => in_string = true,
            b'{' => stack.push(b'}'),
            b'[' => stack.push(b']'),
            b'}' | b']' => {
                if stack.pop() != Some(byte) {
                    return Err(ImportError::Unparseable);
                }
                if stack.is_empty() {
                    return Ok(&text[start..=start + offset]);
                }
            }
            _ => {}
        }
    }

    Err(ImportError::Unparseable)
}
