/// Recovers JSON from free-form model output
///
/// Models wrap JSON in prose or code fences, leave trailing commas, forget to
/// quote list items and drop commas between elements. [`extract`] runs an
/// ordered pipeline of recovery stages and stops at the first one that yields
/// a JSON object or array. Each stage is a standalone function so it can be
/// tested on its own.
use serde_json::Value;

/// Number of raw characters kept for diagnostics on failure
pub const SNIPPET_LEN: usize = 200;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
#[error("unrecoverable model output: {snippet}")]
pub struct ParseFailure {
    /// Leading characters of the raw text, never the whole response
    pub snippet: String,
}

impl ParseFailure {
    fn from_raw(raw: &str) -> Self {
        Self {
            snippet: raw.chars().take(SNIPPET_LEN).collect(),
        }
    }
}

/// Extracts the first JSON object or array recoverable from `raw`.
///
/// Scalars never count as a successful parse, so plain prose such as "42"
/// or "true" is rejected.
pub fn extract(raw: &str) -> Result<Value, ParseFailure> {
    let isolated = isolate_fenced_block(raw);
    if let Some(value) = parse_strict(isolated) {
        return Ok(value);
    }

    let scrubbed = scrub_control_chars(isolated);
    if let Some(value) = parse_strict(&scrubbed) {
        tracing::debug!(stage = "scrub", "Recovered JSON");
        return Ok(value);
    }

    let spans = bracket_spans(&scrubbed);
    for span in spans.iter().filter(|span| span.len() != scrubbed.len()) {
        if let Some(value) = parse_strict(span) {
            tracing::debug!(stage = "bracket_slice", "Recovered JSON");
            return Ok(value);
        }
    }
    let bounded = spans.first().copied().unwrap_or(scrubbed.as_str());

    let repaired = repair(bounded);
    if let Some(value) = parse_strict(&repaired) {
        tracing::debug!(stage = "structural_repair", "Recovered JSON");
        return Ok(value);
    }

    if let Some(value) = recover_line_objects(isolated) {
        tracing::debug!(stage = "line_objects", "Recovered JSON");
        return Ok(value);
    }

    let failure = ParseFailure::from_raw(raw);
    tracing::warn!(snippet = %failure.snippet, "All JSON recovery stages failed");
    Err(failure)
}

/// Interior of the first fenced code block, or the whole text when unfenced
pub fn isolate_fenced_block(text: &str) -> &str {
    let Some(open) = text.find("```") else {
        return text.trim();
    };
    let after_fence = &text[open + 3..];
    // Skip an info string such as `json` on the opening fence line
    let body_start = match after_fence.find('\n') {
        Some(nl) if after_fence[..nl].trim().chars().all(|c| c.is_ascii_alphanumeric()) => nl + 1,
        _ => after_fence
            .find(|c: char| !c.is_ascii_alphanumeric())
            .unwrap_or(after_fence.len()),
    };
    let body = &after_fence[body_start..];
    match body.find("```") {
        Some(close) => body[..close].trim(),
        None => body.trim(),
    }
}

/// Strict parse that only accepts objects and arrays
pub fn parse_strict(text: &str) -> Option<Value> {
    match serde_json::from_str::<Value>(text.trim()) {
        Ok(value @ (Value::Object(_) | Value::Array(_))) => Some(value),
        _ => None,
    }
}

/// Replaces line breaks and tabs with spaces and drops other control characters
pub fn scrub_control_chars(text: &str) -> String {
    text.chars()
        .filter_map(|c| match c {
            '\n' | '\r' | '\t' => Some(' '),
            '\u{feff}' => None,
            c if c.is_control() => None,
            c => Some(c),
        })
        .collect()
}

/// Every top-level bracketed span in `text`, widest first.
///
/// Spans are found left to right; a balanced span is skipped over whole, so
/// nested brackets never start a span of their own. An opener that is never
/// balanced runs to the last matching closer and ends the scan. Equal widths
/// keep their order of appearance.
pub fn bracket_spans(text: &str) -> Vec<&str> {
    let mut spans = Vec::new();
    let mut from = 0;

    while let Some(offset) = text[from..].find(['{', '[']) {
        let open = from + offset;
        if let Some(close) = matching_close(text, open) {
            spans.push(&text[open..=close]);
            from = close + 1;
            continue;
        }

        let close_char = if text[open..].starts_with('{') { '}' } else { ']' };
        if let Some(close) = text.rfind(close_char).filter(|idx| *idx > open) {
            spans.push(&text[open..=close]);
        }
        break;
    }

    spans.sort_by_key(|span| std::cmp::Reverse(span.len()));
    spans
}

/// Byte index of the bracket closing the one at `open`, skipping string contents
fn matching_close(text: &str, open: usize) -> Option<usize> {
    let mut depth = 0i32;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in text[open..].char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' | '[' => depth += 1,
            '}' | ']' => {
                depth -= 1;
                if depth == 0 {
                    return Some(open + i);
                }
            }
            _ => {}
        }
    }
    None
}

/// Structural repair pass over bracket-bounded text
pub fn repair(text: &str) -> String {
    let text = strip_trailing_commas(text);
    let text = quote_bare_array_elements(&text);
    insert_missing_commas(&text)
}

/// Drops commas directly followed (ignoring whitespace) by `}` or `]`
pub fn strip_trailing_commas(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut in_string = false;
    let mut escaped = false;

    for (i, &c) in chars.iter().enumerate() {
        if in_string {
            out.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        if c == ',' {
            let next = chars[i + 1..].iter().find(|n| !n.is_whitespace());
            if matches!(next, Some('}') | Some(']')) {
                continue;
            }
        }
        if c == '"' {
            in_string = true;
        }
        out.push(c);
    }
    out
}

/// Quotes array elements that are not strings, numbers, literals or nested containers.
///
/// Elements are split on top-level commas only, so commas inside nested
/// objects, arrays or strings never act as separators.
pub fn quote_bare_array_elements(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 16);
    let mut rest = text;

    loop {
        let Some(open) = find_outside_strings(rest, '[') else {
            out.push_str(rest);
            return out;
        };
        out.push_str(&rest[..open]);

        let Some(close) = matching_close(rest, open) else {
            out.push_str(&rest[open..]);
            return out;
        };

        let inner = &rest[open + 1..close];
        let elements: Vec<String> = split_top_level(inner)
            .into_iter()
            .map(|element| quote_element(element.trim()))
            .collect();

        out.push('[');
        if elements.iter().any(|e| !e.is_empty()) {
            out.push_str(&elements.join(", "));
        }
        out.push(']');
        rest = &rest[close + 1..];
    }
}

fn quote_element(element: &str) -> String {
    if element.is_empty() || element.starts_with('"') {
        return element.to_string();
    }
    if element.starts_with('{') || element.starts_with('[') {
        return quote_bare_array_elements(element);
    }
    match serde_json::from_str::<Value>(element) {
        Ok(Value::Number(_) | Value::Bool(_) | Value::Null) => element.to_string(),
        _ => {
            let unquoted = element.trim_matches('\'');
            Value::String(unquoted.to_string()).to_string()
        }
    }
}

/// Byte index of the first `target` that is not inside a string literal
fn find_outside_strings(text: &str, target: char) -> Option<usize> {
    let mut in_string = false;
    let mut escaped = false;
    for (i, c) in text.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
        } else if c == '"' {
            in_string = true;
        } else if c == target {
            return Some(i);
        }
    }
    None
}

/// Splits on commas at nesting depth zero, outside string literals
fn split_top_level(text: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut in_string = false;
    let mut escaped = false;
    let mut start = 0;

    for (i, c) in text.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' | '[' => depth += 1,
            '}' | ']' => depth -= 1,
            ',' if depth == 0 => {
                parts.push(&text[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&text[start..]);
    parts
}

/// Inserts a comma between a finished value and a following string or container
pub fn insert_missing_commas(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 8);
    let mut in_string = false;
    let mut escaped = false;
    let mut value_ended = false;

    for c in text.chars() {
        if in_string {
            out.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
                value_ended = true;
            }
            continue;
        }
        if c.is_whitespace() {
            out.push(c);
            continue;
        }
        if value_ended && matches!(c, '"' | '{' | '[') {
            out.push(',');
        }
        value_ended = matches!(c, '}' | ']');
        if c == '"' {
            in_string = true;
        }
        out.push(c);
    }
    out
}

/// Last-resort scan collecting every standalone object that parses.
///
/// Tracks brace depth line by line; each time depth returns to zero the
/// accumulated span is parsed on its own. Returns an array of the objects
/// recovered, or `None` when there are none.
pub fn recover_line_objects(text: &str) -> Option<Value> {
    let mut objects = Vec::new();
    let mut span = String::new();
    let mut depth = 0i32;

    for line in text.lines() {
        let opens = line.matches('{').count() as i32;
        let closes = line.matches('}').count() as i32;

        if depth == 0 && opens == 0 {
            continue;
        }
        span.push_str(line);
        span.push('\n');
        depth += opens - closes;

        if depth <= 0 {
            if let Some(object) = parse_span(&span) {
                objects.push(object);
            } else {
                tracing::debug!(
                    span = %span.chars().take(50).collect::<String>(),
                    "Skipping unparseable object span"
                );
            }
            span.clear();
            depth = 0;
        }
    }

    if objects.is_empty() {
        None
    } else {
        Some(Value::Array(objects))
    }
}

fn parse_span(span: &str) -> Option<Value> {
    let start = span.find('{')?;
    let end = span.rfind('}')?;
    if end < start {
        return None;
    }
    let candidate = strip_trailing_commas(&scrub_control_chars(&span[start..=end]));
    match parse_strict(&candidate) {
        Some(value @ Value::Object(_)) => Some(value),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_fenced_block_round_trips_exactly() {
        let value = json!({"title": "Pad Thai", "ingredients": ["noodles", "tamarind"], "prep_time": 15});
        let raw = format!(
            "Here is your recipe:\n```json\n{}\n```\nEnjoy!",
            serde_json::to_string_pretty(&value).unwrap()
        );
        assert_eq!(extract(&raw).unwrap(), value);
    }

    #[test]
    fn test_fence_without_language_label() {
        let raw = "```\n[1, 2, 3]\n```";
        assert_eq!(isolate_fenced_block(raw), "[1, 2, 3]");
        assert_eq!(extract(raw).unwrap(), json!([1, 2, 3]));
    }

    #[test]
    fn test_unterminated_fence_uses_remainder() {
        assert_eq!(isolate_fenced_block("```json\n{\"a\": 1}"), "{\"a\": 1}");
    }

    #[test]
    fn test_plain_json_parses_directly() {
        assert_eq!(extract(r#"{"a": [1, 2]}"#).unwrap(), json!({"a": [1, 2]}));
    }

    #[test]
    fn test_trailing_comma_is_removed() {
        let value = extract(r#"{"ingredients": ["rice", "beans",], "title": "Bowl",}"#).unwrap();
        assert_eq!(value, json!({"ingredients": ["rice", "beans"], "title": "Bowl"}));
    }

    #[test]
    fn test_strip_trailing_commas_leaves_strings_alone() {
        assert_eq!(strip_trailing_commas(r#"["a,]", "b",]"#), r#"["a,]", "b"]"#);
    }

    #[test]
    fn test_prose_is_a_parse_failure() {
        let prose = "I'm sorry, I can't come up with a recipe right now. ".repeat(10);
        let failure = extract(&prose).unwrap_err();
        assert_eq!(failure.snippet.chars().count(), SNIPPET_LEN);
        assert!(prose.starts_with(&failure.snippet));
    }

    #[test]
    fn test_bare_scalars_are_rejected() {
        assert!(extract("42").is_err());
        assert!(extract("true").is_err());
        assert!(extract("").is_err());
    }

    #[test]
    fn test_control_characters_inside_strings_are_scrubbed() {
        let raw = "{\"description\": \"line one\nline two\u{0007}\"}";
        assert_eq!(
            extract(raw).unwrap(),
            json!({"description": "line one line two"})
        );
    }

    #[test]
    fn test_prose_around_object_is_sliced_away() {
        let raw = r#"Sure! {"title": "Tacos", "tags": ["quick"]} Let me know if you need more."#;
        assert_eq!(extract(raw).unwrap(), json!({"title": "Tacos", "tags": ["quick"]}));
    }

    #[test]
    fn test_spans_ignore_brackets_inside_strings() {
        let text = r#"note: {"a": "}"} trailing"#;
        assert_eq!(bracket_spans(text), vec![r#"{"a": "}"}"#]);
        assert!(bracket_spans("no json here").is_empty());
    }

    #[test]
    fn test_bracketed_prose_before_object_is_skipped() {
        let raw = r#"Recipe [1]: {"title": "Pad Thai", "ingredients": ["noodles"]}"#;
        assert_eq!(
            bracket_spans(raw),
            vec![r#"{"title": "Pad Thai", "ingredients": ["noodles"]}"#, "[1]"]
        );
        assert_eq!(
            extract(raw).unwrap(),
            json!({"title": "Pad Thai", "ingredients": ["noodles"]})
        );
    }

    #[test]
    fn test_narrower_span_used_when_widest_is_not_json() {
        let raw = r#"Options {pick whichever of these sounds best} then {"title": "Soup"}"#;
        assert_eq!(extract(raw).unwrap(), json!({"title": "Soup"}));
    }

    #[test]
    fn test_unbalanced_opener_runs_to_last_closer() {
        assert_eq!(bracket_spans(r#"x {"a": {"b": 1} y"#), vec![r#"{"a": {"b": 1}"#]);
    }

    #[test]
    fn test_bare_array_elements_are_quoted() {
        let repaired = quote_bare_array_elements(r#"["flour", sugar, 2, true, null, {"x": [a, b]}]"#);
        let value: Value = serde_json::from_str(&repaired).unwrap();
        assert_eq!(value, json!(["flour", "sugar", 2, true, null, {"x": ["a", "b"]}]));
    }

    #[test]
    fn test_bare_elements_with_nested_commas_split_at_top_level() {
        let repaired = quote_bare_array_elements(r#"[{"a": 1, "b": 2}, plain text, "c, d"]"#);
        let value: Value = serde_json::from_str(&repaired).unwrap();
        assert_eq!(value, json!([{"a": 1, "b": 2}, "plain text", "c, d"]));
    }

    #[test]
    fn test_missing_commas_are_inserted() {
        let repaired = insert_missing_commas(r#"["a" "b" ["c"] {"d": "e"}]"#);
        let value: Value = serde_json::from_str(&repaired).unwrap();
        assert_eq!(value, json!(["a", "b", ["c"], {"d": "e"}]));
    }

    #[test]
    fn test_missing_comma_does_not_touch_key_value_pairs() {
        assert_eq!(insert_missing_commas(r#"{"a": "b"}"#), r#"{"a": "b"}"#);
    }

    #[test]
    fn test_full_repair_pipeline() {
        let raw = "```json\n{\n  \"title\": \"Curry\",\n  \"ingredients\": [chicken, \"rice\" \"onion\",],\n}\n```";
        assert_eq!(
            extract(raw).unwrap(),
            json!({"title": "Curry", "ingredients": ["chicken", "rice", "onion"]})
        );
    }

    #[test]
    fn test_line_objects_recovered_when_first_object_is_broken() {
        let raw = "{\n\"title\": \"Broken\" \"x\":\n}\nand another\n{\n\"title\": \"Good\",\n}\n";
        assert_eq!(extract(raw).unwrap(), json!([{"title": "Good"}]));
    }

    #[test]
    fn test_later_object_used_when_first_object_is_broken() {
        let raw = "{\n\"title\": \"Broken\" \"x\":\n}\nand another\n{\n\"title\": \"Good\"\n}\n";
        assert_eq!(extract(raw).unwrap(), json!({"title": "Good"}));
    }

    #[test]
    fn test_recover_line_objects_collects_all_spans() {
        let text = "1.\n{\"title\": \"A\"}\n2. {\n\"title\": \"B\",\n}\nnothing here";
        assert_eq!(
            recover_line_objects(text),
            Some(json!([{"title": "A"}, {"title": "B"}]))
        );
        assert_eq!(recover_line_objects("no braces at all"), None);
    }
}
