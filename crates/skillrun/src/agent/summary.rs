//! Structured summary blocks embedded in assistant replies

use serde_json::Value;
use tracing::warn;

pub const SUMMARY_START: &str = "<!--SUMMARY_START-->";
pub const SUMMARY_END: &str = "<!--SUMMARY_END-->";

/// Reply text split into what the user sees and the parsed summary
#[derive(Debug, Clone, PartialEq)]
pub struct Extracted {
    pub text: String,
    pub summary: Option<Value>,
}

/// Pull the summary block out of an assistant reply.
///
/// Only a start marker followed by an end marker counts as a block. The
/// visible text is everything before the start marker, right-trimmed; an
/// unparseable or `null` block is still cut from the text.
pub fn extract_summary(raw: &str) -> Extracted {
    let (Some(start), Some(end)) = (raw.find(SUMMARY_START), raw.find(SUMMARY_END)) else {
        return passthrough(raw);
    };
    let body_start = start + SUMMARY_START.len();
    if end < body_start {
        return passthrough(raw);
    }

    let block = raw[body_start..end].trim();
    let summary = match serde_json::from_str::<Value>(block) {
        Ok(Value::Null) => None,
        Ok(value) => Some(value),
        Err(e) => {
            warn!(error = %e, "Discarding malformed summary block");
            None
        }
    };

    Extracted {
        text: raw[..start].trim_end().to_string(),
        summary,
    }
}

fn passthrough(raw: &str) -> Extracted {
    Extracted {
        text: raw.to_string(),
        summary: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extracts_block() {
        let raw = "The answer is 5.\n\n<!--SUMMARY_START-->\n{\"k\":\"v\"}\n<!--SUMMARY_END-->\n";
        let out = extract_summary(raw);
        assert_eq!(out.text, "The answer is 5.");
        assert_eq!(out.summary, Some(json!({"k": "v"})));
    }

    #[test]
    fn test_no_markers() {
        let out = extract_summary("plain text  ");
        assert_eq!(out.text, "plain text  ");
        assert!(out.summary.is_none());
    }

    #[test]
    fn test_missing_end_marker() {
        let raw = "text <!--SUMMARY_START--> {\"k\":1}";
        let out = extract_summary(raw);
        assert_eq!(out.text, raw);
        assert!(out.summary.is_none());
    }

    #[test]
    fn test_markers_out_of_order() {
        let raw = "a <!--SUMMARY_END--> b <!--SUMMARY_START--> c";
        let out = extract_summary(raw);
        assert_eq!(out.text, raw);
        assert!(out.summary.is_none());
    }

    #[test]
    fn test_malformed_json_still_stripped() {
        let raw = "Hello<!--SUMMARY_START-->{not json<!--SUMMARY_END-->";
        let out = extract_summary(raw);
        assert_eq!(out.text, "Hello");
        assert!(out.summary.is_none());
    }

    #[test]
    fn test_null_block_is_no_summary() {
        let raw = "Hello\n<!--SUMMARY_START--> null <!--SUMMARY_END-->";
        let out = extract_summary(raw);
        assert_eq!(out.text, "Hello");
        assert!(out.summary.is_none());
    }

    #[test]
    fn test_trailing_text_after_block_dropped() {
        let raw = "Hi <!--SUMMARY_START-->[1,2]<!--SUMMARY_END--> trailing";
        let out = extract_summary(raw);
        assert_eq!(out.text, "Hi");
        assert_eq!(out.summary, Some(json!([1, 2])));
    }
}
