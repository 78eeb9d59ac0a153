//! Pure matchers for spoken input: voter identity, candidate number, confirmation.
//!
//! Everything here maps text to a decision without touching audio, so the accepted and
//! rejected phrase sets are plain unit tests.

use crate::storage::DEMO_VOTER_TOKEN;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static WORD_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[a-z0-9]+").expect("static regex"));
static ORDINAL_DIGITS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d+)(st|nd|rd|th)?$").expect("static regex"));

/// Compact spellings a recognizer produces for the demo phrase "first one".
const DEMO_TOKEN_FORMS: &[&str] = &[
    "firstone", "first1", "1st1", "1stone", "firstvan", "firstwon", "firston", "furstone",
];

/// Utterances shorter than this are only accepted on an exact match.
const FUZZY_MIN_LEN: usize = 7;

/// Lower-case, trim, collapse whitespace, strip leading/trailing punctuation.
pub fn normalize_utterance(raw: &str) -> String {
    let lowered = raw.to_lowercase();
    let collapsed = lowered.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed
        .trim_matches(|c: char| !c.is_alphanumeric())
        .to_string()
}

fn tokens(text: &str) -> Vec<String> {
    let lowered = text.to_lowercase();
    WORD_RE
        .find_iter(&lowered)
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Accepts acoustic variants of the single demo identity phrase.
pub fn match_voter_id(utterance: &str) -> bool {
    let compact: String = tokens(utterance).concat();
    if compact.is_empty() {
        return false;
    }
    if DEMO_TOKEN_FORMS.contains(&compact.as_str()) {
        return true;
    }
    // near misses may differ in letters only: "first10" is a different id
    let digits = digit_chars(&compact);
    compact.len() >= FUZZY_MIN_LEN
        && DEMO_TOKEN_FORMS.iter().any(|form| {
            digit_chars(form) == digits && strsim::levenshtein(&compact, form) <= 1
        })
}

fn digit_chars(text: &str) -> String {
    text.chars().filter(char::is_ascii_digit).collect()
}

fn spoken_digit(token: &str) -> Option<char> {
    Some(match token {
        "zero" | "oh" | "o" => '0',
        "one" => '1',
        "two" | "too" | "to" => '2',
        "three" => '3',
        "four" | "for" => '4',
        "five" => '5',
        "six" => '6',
        "seven" => '7',
        "eight" => '8',
        "nine" => '9',
        _ => return None,
    })
}

/// Parses a digit-by-digit voter id: first digit is the state code, the rest the voter number.
///
/// Returns the internal id (`"1-12"`) and the digits as they should be read back.
pub fn parse_state_coded_voter_id(utterance: &str) -> Option<(String, String)> {
    let words = tokens(utterance);
    if words.is_empty() {
        return None;
    }
    let mut digits = String::new();
    let mut spoken = Vec::new();
    for w in &words {
        if let Some(d) = spoken_digit(w) {
            digits.push(d);
            spoken.push(w.clone());
        } else if w.chars().all(|c| c.is_ascii_digit()) {
            for c in w.chars() {
                digits.push(c);
                spoken.push(c.to_string());
            }
        } else {
            return None;
        }
    }
    if digits.len() < 2 {
        return None;
    }
    let (state, rest) = digits.split_at(1);
    let number = rest.trim_start_matches('0');
    let number = if number.is_empty() { "0" } else { number };
    Some((format!("{state}-{number}"), spoken.join(" ")))
}

/// Which spoken identity scheme the booth accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoterIdScheme {
    #[default]
    DemoToken,
    StateCoded,
}

/// A voter identity recognized from speech.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoterIdentity {
    /// Token stored with the vote.
    pub token: String,
    /// What to read back to the voter.
    pub spoken: String,
}

impl VoterIdScheme {
    pub fn identify(self, utterance: &str) -> Option<VoterIdentity> {
        match self {
            VoterIdScheme::DemoToken => match_voter_id(utterance).then(|| VoterIdentity {
                token: DEMO_VOTER_TOKEN.to_string(),
                spoken: "first one".to_string(),
            }),
            VoterIdScheme::StateCoded => {
                parse_state_coded_voter_id(utterance).map(|(token, spoken)| VoterIdentity {
                    token,
                    spoken,
                })
            }
        }
    }

    /// How the voter is asked for their id.
    pub fn prompt(self) -> &'static str {
        match self {
            VoterIdScheme::DemoToken => "Please say your voter I D. For this demo, say first one.",
            VoterIdScheme::StateCoded => {
                "Please say your numeric voter I D, digit by digit. The first digit is your state code."
            }
        }
    }
}

fn number_word(token: &str) -> Option<i64> {
    Some(match token {
        "zero" => 0,
        "one" | "first" => 1,
        "two" | "second" => 2,
        "three" | "third" => 3,
        "four" => 4,
        "five" => 5,
        "six" => 6,
        "seven" => 7,
        "eight" => 8,
        "nine" => 9,
        "ten" => 10,
        "eleven" => 11,
        "twelve" => 12,
        _ => return None,
    })
}

/// First integer token in the utterance, as digits ("2", "2nd") or a number word.
///
/// Digit runs too long for `i64` saturate to `i64::MAX`.
pub fn first_integer(utterance: &str) -> Option<i64> {
    tokens(utterance).iter().find_map(|t| {
        if let Some(caps) = ORDINAL_DIGITS_RE.captures(t) {
            return caps
                .get(1)
                .map(|m| m.as_str().parse::<i64>().unwrap_or(i64::MAX));
        }
        number_word(t)
    })
}

/// 1-based candidate position, accepted only when it lies in `[1, count]`.
pub fn extract_candidate_number(utterance: &str, count: usize) -> Option<usize> {
    let n = first_integer(utterance)?;
    usize::try_from(n).ok().filter(|&n| n >= 1 && n <= count)
}

/// Yes/no answer to a read-back question. `None` when the utterance is neither, or both.
pub fn yes_or_no(utterance: &str) -> Option<bool> {
    let words = tokens(utterance);
    let yes = words
        .iter()
        .any(|w| matches!(w.as_str(), "yes" | "yeah" | "yep" | "correct"));
    let no = words
        .iter()
        .any(|w| matches!(w.as_str(), "no" | "nope" | "wrong"));
    match (yes, no) {
        (true, false) => Some(true),
        (false, true) => Some(false),
        _ => None,
    }
}

/// Only the exact word "confirm" accepts.
pub fn is_confirmation(utterance: &str) -> bool {
    normalize_utterance(utterance) == "confirm"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn voter_id_accepts_variants() {
        for phrase in [
            "first one",
            "firstone",
            "first van",
            "First One.",
            "first 1",
            "1st one",
            "first won",
            "furst one",
            "firs tone",
            "first ones",
        ] {
            assert!(match_voter_id(phrase), "should accept {phrase:?}");
        }
    }

    #[test]
    fn voter_id_rejects_others() {
        for phrase in [
            "second one",
            "",
            "random noise",
            "first",
            "one",
            "third one",
            "   ",
            "first 10",
            "first 11",
            "first 2",
            "1st 12",
        ] {
            assert!(!match_voter_id(phrase), "should reject {phrase:?}");
        }
    }

    #[test]
    fn candidate_number_in_range() {
        assert_eq!(extract_candidate_number("one", 3), Some(1));
        assert_eq!(extract_candidate_number("number 2", 3), Some(2));
        assert_eq!(extract_candidate_number("three please", 3), Some(3));
        assert_eq!(extract_candidate_number("the 2nd one", 3), Some(2));
        assert_eq!(extract_candidate_number("candidate 9", 9), Some(9));
    }

    #[test]
    fn candidate_number_rejections() {
        assert_eq!(extract_candidate_number("zero", 3), None);
        assert_eq!(extract_candidate_number("four", 3), None);
        assert_eq!(extract_candidate_number("no number here", 3), None);
        assert_eq!(extract_candidate_number("", 3), None);
        // the first integer decides even when a later one would fit
        assert_eq!(extract_candidate_number("7 or 2", 3), None);
        assert_eq!(extract_candidate_number("99999999999999999999 then 2", 3), None);
        assert_eq!(first_integer("99999999999999999999"), Some(i64::MAX));
    }

    #[test]
    fn confirmation_is_exact() {
        assert!(is_confirmation("confirm"));
        assert!(is_confirmation("  CONFIRM "));
        assert!(is_confirmation("Confirm."));
        for other in ["cancel", "no", "", "confirmed", "i confirm", "yes"] {
            assert!(!is_confirmation(other), "should reject {other:?}");
        }
    }

    #[test]
    fn yes_no_answers() {
        assert_eq!(yes_or_no("yes"), Some(true));
        assert_eq!(yes_or_no("Yes, that's correct."), Some(true));
        assert_eq!(yes_or_no("no"), Some(false));
        assert_eq!(yes_or_no("nope wrong number"), Some(false));
        for unclear in ["", "i know", "maybe", "yes no", "one one two"] {
            assert_eq!(yes_or_no(unclear), None, "should be unclear: {unclear:?}");
        }
    }

    #[test]
    fn state_coded_ids() {
        let parse = |s: &str| parse_state_coded_voter_id(s).map(|(id, _)| id);
        assert_eq!(parse("one one two").as_deref(), Some("1-12"));
        assert_eq!(parse("two four five").as_deref(), Some("2-45"));
        assert_eq!(parse("three seven eight").as_deref(), Some("3-78"));
        assert_eq!(parse("1 1 2").as_deref(), Some("1-12"));
        assert_eq!(parse("two 45").as_deref(), Some("2-45"));
        assert_eq!(parse("zero zero one").as_deref(), Some("0-1"));
        assert_eq!(parse("9 0 0").as_deref(), Some("9-0"));
        for bad in ["hello world", "first one", "test1", "one two three x", "", "seven"] {
            assert_eq!(parse(bad), None, "should reject {bad:?}");
        }
    }

    #[test]
    fn state_coded_read_back_keeps_digit_words() {
        let (_, spoken) = parse_state_coded_voter_id("two 45").unwrap();
        assert_eq!(spoken, "two 4 5");
    }

    #[test]
    fn normalize_strips_edges_and_collapses() {
        assert_eq!(normalize_utterance("  Number   Two!  "), "number two");
        assert_eq!(normalize_utterance("..."), "");
    }
}
