//! Tolerant parsing of model-produced JSON.
//!
//! Models are asked for "JSON only" and still routinely wrap the payload
//! in markdown fences or leak raw control characters into it. Both are
//! cheap to strip deterministically before handing the payload to serde,
//! and stripping here keeps the prompts focused on content rather than
//! formatting edge-cases. Shared by the vision adapter and the plan
//! synthesizer so the two concerns tolerate exactly the same quirks.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::de::DeserializeOwned;

static RE_FENCES: Lazy<Regex> = Lazy::new(|| Regex::new(r"```(?:json)?").unwrap());
static RE_CONTROL: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\x00-\x1F]+").unwrap());

/// Strip code-fence markers and control characters, then trim.
///
/// Raw control characters (including newlines) are invalid inside JSON
/// string literals, and outside literals they are only whitespace, so
/// removing them wholesale cannot change the meaning of a valid payload —
/// escaped sequences like `\n` survive untouched.
pub fn clean_payload(raw: &str) -> String {
    let without_fences = RE_FENCES.replace_all(raw, "");
    RE_CONTROL.replace_all(&without_fences, "").trim().to_string()
}

/// Clean `raw` and deserialise it into `T`.
pub fn parse_model_json<T: DeserializeOwned>(raw: &str) -> Result<T, serde_json::Error> {
    serde_json::from_str(&clean_payload(raw))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Probe {
        name: String,
        count: u32,
    }

    #[test]
    fn clean_json_parses() {
        let p: Probe = parse_model_json(r#"{"name":"a","count":3}"#).unwrap();
        assert_eq!(p, Probe { name: "a".into(), count: 3 });
    }

    #[test]
    fn fenced_json_parses_same_as_clean() {
        let clean: Probe = parse_model_json(r#"{"name":"a","count":3}"#).unwrap();
        let fenced: Probe =
            parse_model_json("```json\n{\"name\":\"a\",\"count\":3}\n```").unwrap();
        assert_eq!(clean, fenced);
    }

    #[test]
    fn stray_control_characters_are_stripped() {
        let raw = "{\"name\":\u{0002}\"a\",\"count\":3}";
        let p: Probe = parse_model_json(raw).unwrap();
        assert_eq!(p.name, "a");
    }

    #[test]
    fn escaped_sequences_survive() {
        let p: Probe = parse_model_json(r#"{"name":"line\nbreak","count":1}"#).unwrap();
        assert_eq!(p.name, "line\nbreak");
    }

    #[test]
    fn garbage_is_an_error_not_a_panic() {
        let r: Result<Probe, _> = parse_model_json("I am not JSON, sorry");
        assert!(r.is_err());
    }

    #[test]
    fn fence_without_language_tag() {
        let p: Probe = parse_model_json("```\n{\"name\":\"x\",\"count\":0}\n```").unwrap();
        assert_eq!(p.name, "x");
    }
}
