// SPDX-License-Identifier: MIT

//! Extraction of progress payloads from noisy executor stdout.
//!
//! Runners emit `LB_EVENT {json}` markers; by the time those lines reach us
//! they may have been wrapped in quotes and backslash-escaped by intermediate
//! log renderers, with trailing debug junk after the payload. A brace-depth
//! scan finds the matching close brace, then a small set of unescape
//! candidates is tried in order.

/// Default stdout marker token.
pub const EVENT_TOKEN: &str = "LB_EVENT";

/// Extract the first JSON object following `token` on the line.
pub fn extract_event_payload(line: &str, token: &str) -> Option<serde_json::Value> {
    let token_idx = line.find(token)?;
    let payload = line[token_idx + token.len()..].trim();
    let start = payload.find('{')?;

    // Walk to the matching closing brace so trailing characters from debug
    // output (quotes, extra braces) are not picked up.
    let mut depth = 0usize;
    let mut end = None;
    for (offset, ch) in payload[start..].char_indices() {
        match ch {
            '{' => depth += 1,
            '}' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    end = Some(start + offset + 1);
                    break;
                }
            }
            _ => {}
        }
    }
    let raw = &payload[start..end?];

    let candidates = [
        raw.to_string(),
        raw.trim_matches(|c| c == '"' || c == '\'').to_string(),
        raw.replace("\\\"", "\""),
        raw.trim_matches(|c| c == '"' || c == '\'').replace("\\\"", "\""),
    ];
    candidates
        .iter()
        .find_map(|candidate| serde_json::from_str(candidate).ok())
}

#[cfg(test)]
#[path = "marker_tests.rs"]
mod tests;
