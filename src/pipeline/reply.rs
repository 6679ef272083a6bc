use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;

use crate::domain::{BatchStats, MessageSummary, Verdict};

/// Parsed result of one `list_unseen` reply.
#[derive(Debug, Default)]
pub struct FetchReply {
    pub messages: Vec<MessageSummary>,
    pub inbox_empty: bool,
}

/// One parsed verdict line. The classifier may name the sender domain
/// explicitly; when it does not, the router derives it from the sender
/// address.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedVerdict {
    pub verdict: Verdict,
    pub domain: Option<String>,
}

/// Phrases an agent-backed mail bridge uses to say the inbox is empty.
/// Matching reply text is inherently fragile; every recognized phrasing is
/// listed here and pinned by tests.
const EMPTY_INBOX_PHRASES: &[&str] = &["no emails", "inbox is empty", "inbox empty"];

/// "0 emails in ..." as a whole number, so counts that merely end in zero
/// ("found 10 emails in the inbox") do not read as empty.
static ZERO_EMAILS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b0\s+emails?\s+in\b").expect("static pattern compiles"));

pub fn detect_empty_inbox(reply: &str) -> bool {
    let trimmed = reply.trim();
    if trimmed == "[]" {
        return true;
    }
    let lowered = trimmed.to_lowercase();
    EMPTY_INBOX_PHRASES
        .iter()
        .any(|phrase| lowered.contains(phrase))
        || ZERO_EMAILS.is_match(trimmed)
}

/// Interprets the raw fetch reply. Tier 1: JSON — either a bare array of
/// summaries or an object with a `messages` field. Tier 2: the empty-inbox
/// phrase heuristic. Anything else yields no messages and
/// `inbox_empty = false`, which the orchestrator treats as a fetch failure.
pub fn parse_fetch_reply(raw: &str) -> FetchReply {
    let trimmed = raw.trim();

    if let Ok(messages) = serde_json::from_str::<Vec<MessageSummary>>(trimmed) {
        let inbox_empty = messages.is_empty();
        return FetchReply {
            messages,
            inbox_empty,
        };
    }

    #[derive(Deserialize)]
    struct Wrapped {
        messages: Vec<MessageSummary>,
    }
    if let Ok(wrapped) = serde_json::from_str::<Wrapped>(trimmed) {
        let inbox_empty = wrapped.messages.is_empty();
        return FetchReply {
            messages: wrapped.messages,
            inbox_empty,
        };
    }

    if detect_empty_inbox(trimmed) {
        return FetchReply {
            messages: Vec::new(),
            inbox_empty: true,
        };
    }

    FetchReply::default()
}

/// Extracts `VERDICT id=... kind=...` lines into a per-message map.
/// Malformed lines and unknown kinds are skipped with a warning so one bad
/// line never poisons the batch.
pub fn parse_verdicts(reply: &str) -> HashMap<String, ParsedVerdict> {
    let mut verdicts = HashMap::new();

    for line in reply.lines() {
        let line = line.trim();
        let Some(rest) = strip_prefix_ci(line, "VERDICT") else {
            continue;
        };

        let (fields, reason) = split_reason(rest.trim());
        let mut id = None;
        let mut kind = None;
        let mut confidence = None;
        let mut domain = None;
        for token in fields.split_whitespace() {
            let Some((key, value)) = token.split_once('=') else {
                continue;
            };
            match key.to_ascii_lowercase().as_str() {
                "id" => id = Some(value.to_string()),
                "kind" => kind = Some(value.to_string()),
                "confidence" => confidence = value.parse::<f64>().ok(),
                "domain" => domain = Some(value.to_string()),
                _ => {}
            }
        }

        let (Some(id), Some(kind)) = (id, kind) else {
            tracing::warn!(target: "pipeline", line, "verdict line missing id or kind; skipped");
            continue;
        };

        let reason = reason.unwrap_or_default();
        let verdict = match kind.to_ascii_lowercase().as_str() {
            "knownspam" => Verdict::KnownSpam,
            "legitimate" => Verdict::Legitimate,
            "candidate" => Verdict::Candidate {
                confidence: confidence.unwrap_or(0.5),
                reason,
            },
            "flagdomain" => Verdict::FlagDomain { reason },
            other => {
                tracing::warn!(target: "pipeline", kind = other, "unknown verdict kind; skipped");
                continue;
            }
        };

        verdicts.insert(id, ParsedVerdict { verdict, domain });
    }

    verdicts
}

/// Everything after `reason=` is free text; split it off before tokenizing
/// the remaining key=value fields on whitespace.
fn split_reason(line: &str) -> (&str, Option<String>) {
    static REASON: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"(?i)\breason\s*=\s*").expect("static pattern compiles"));
    match REASON.find(line) {
        Some(found) => (
            &line[..found.start()],
            Some(line[found.end()..].trim().to_string()),
        ),
        None => (line, None),
    }
}

fn strip_prefix_ci<'a>(line: &'a str, prefix: &str) -> Option<&'a str> {
    let bytes = line.as_bytes();
    if bytes.len() >= prefix.len() && bytes[..prefix.len()].eq_ignore_ascii_case(prefix.as_bytes())
    {
        Some(&line[prefix.len()..])
    } else {
        None
    }
}

static STATS_SENTINEL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?im)^\s*batch_stats\s*:\s*(.+)$").expect("static pattern compiles")
});
static PROCESSED_FALLBACK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:(\d+)\s+emails?\s+processed|processed\s+(\d+))")
        .expect("static pattern compiles")
});
static JUNKED_FALLBACK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:moved\s+(\d+)\s+to\s+junk|(\d+)\s+(?:moved\s+to\s+junk|junked))")
        .expect("static pattern compiles")
});
static CANDIDATES_FALLBACK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(\d+)\s+candidates?\b").expect("static pattern compiles"));

/// Two-tier batch-statistics extraction. Tier 1 reads the
/// `BATCH_STATS: key=value, ...` sentinel (case-insensitive, tolerant of
/// whitespace around `=` and `,`); tier 2 scans the free text for numeric
/// patterns near keywords. Never fails: worst case every counter is 0.
pub fn parse_batch_stats(reply: &str) -> BatchStats {
    let mut stats = BatchStats {
        inbox_empty: detect_empty_inbox(reply),
        ..BatchStats::default()
    };

    if let Some(captures) = STATS_SENTINEL.captures(reply) {
        let mut matched_any = false;
        if let Some(fields) = captures.get(1) {
            for field in fields.as_str().split(',') {
                let Some((key, value)) = field.split_once('=') else {
                    continue;
                };
                let Ok(value) = value.trim().parse::<u64>() else {
                    continue;
                };
                matched_any = true;
                match key.trim().to_ascii_lowercase().as_str() {
                    "processed" => stats.processed = value,
                    "junked" => stats.junked = value,
                    "candidates" => stats.candidates = value,
                    _ => {}
                }
            }
        }
        if matched_any {
            return stats;
        }
    }

    stats.processed = first_number(&PROCESSED_FALLBACK, reply);
    stats.junked = first_number(&JUNKED_FALLBACK, reply);
    stats.candidates = first_number(&CANDIDATES_FALLBACK, reply);
    stats
}

fn first_number(pattern: &Regex, text: &str) -> u64 {
    pattern
        .captures(text)
        .and_then(|captures| {
            captures
                .iter()
                .skip(1)
                .flatten()
                .next()
                .and_then(|group| group.as_str().parse::<u64>().ok())
        })
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinel_stats_are_parsed() {
        let stats = parse_batch_stats("BATCH_STATS: processed=5, junked=2, candidates=1");
        assert_eq!(
            stats,
            BatchStats {
                processed: 5,
                junked: 2,
                candidates: 1,
                inbox_empty: false
            }
        );
    }

    #[test]
    fn sentinel_tolerates_case_and_whitespace() {
        let stats = parse_batch_stats("some text\n  batch_stats :  processed = 7 ,junked= 3  \n");
        assert_eq!(stats.processed, 7);
        assert_eq!(stats.junked, 3);
        assert_eq!(stats.candidates, 0);
    }

    #[test]
    fn fallback_scans_free_text() {
        let stats =
            parse_batch_stats("I looked at everything: 4 emails processed, moved 2 to junk.");
        assert_eq!(stats.processed, 4);
        assert_eq!(stats.junked, 2);
    }

    #[test]
    fn fallback_alternate_phrasings() {
        let stats = parse_batch_stats("processed 9 messages; 3 junked; kept 1 candidate");
        assert_eq!(stats.processed, 9);
        assert_eq!(stats.junked, 3);
        assert_eq!(stats.candidates, 1);
    }

    #[test]
    fn no_sentinel_no_patterns_yields_zeros() {
        let stats = parse_batch_stats("all quiet on the inbox front");
        assert_eq!(stats, BatchStats::default());
    }

    #[test]
    fn empty_inbox_phrasings() {
        assert!(detect_empty_inbox("No emails in inbox"));
        assert!(detect_empty_inbox("[]"));
        assert!(detect_empty_inbox("Found 0 emails in the inbox"));
        assert!(detect_empty_inbox("The inbox is empty."));
        assert!(!detect_empty_inbox("Found 3 emails"));
    }

    #[test]
    fn count_ending_in_zero_is_not_empty() {
        assert!(!detect_empty_inbox("Found 10 emails in the inbox"));
        assert!(!detect_empty_inbox("There are 20 emails in total"));
        assert!(detect_empty_inbox("Found 0 emails in the inbox"));
        assert!(!parse_fetch_reply("Found 10 emails in the inbox").inbox_empty);
    }

    #[test]
    fn fetch_reply_json_array() {
        let reply = r#"[{"id":"m1","sender":"a@spam.com","subject":"Hi"}]"#;
        let parsed = parse_fetch_reply(reply);
        assert!(!parsed.inbox_empty);
        assert_eq!(parsed.messages.len(), 1);
        assert_eq!(parsed.messages[0].id, "m1");
    }

    #[test]
    fn fetch_reply_wrapped_object() {
        let reply = r#"{"messages":[{"id":"m2","sender":"b@x.com"}]}"#;
        let parsed = parse_fetch_reply(reply);
        assert_eq!(parsed.messages.len(), 1);
        assert_eq!(parsed.messages[0].subject, "");
    }

    #[test]
    fn fetch_reply_empty_array_means_empty_inbox() {
        let parsed = parse_fetch_reply("  [] ");
        assert!(parsed.inbox_empty);
        assert!(parsed.messages.is_empty());
    }

    #[test]
    fn fetch_reply_natural_language_empty() {
        let parsed = parse_fetch_reply("I checked and there are no emails waiting.");
        assert!(parsed.inbox_empty);
    }

    #[test]
    fn fetch_reply_unrecognized_text() {
        let parsed = parse_fetch_reply("something went sideways");
        assert!(!parsed.inbox_empty);
        assert!(parsed.messages.is_empty());
    }

    #[test]
    fn verdict_lines_round_trip() {
        let reply = "\
VERDICT id=m1 kind=KnownSpam domain=spam.com
VERDICT id=m2 kind=Legitimate
VERDICT id=m3 kind=Candidate confidence=0.7 domain=odd.net reason=first-time bulk sender
VERDICT id=m4 kind=FlagDomain domain=shady.biz reason=typosquatted brand
BATCH_STATS: processed=4, junked=1, candidates=1";
        let verdicts = parse_verdicts(reply);
        assert_eq!(verdicts.len(), 4);
        assert_eq!(verdicts["m1"].verdict, Verdict::KnownSpam);
        assert_eq!(verdicts["m1"].domain.as_deref(), Some("spam.com"));
        assert_eq!(verdicts["m2"].verdict, Verdict::Legitimate);
        assert_eq!(
            verdicts["m3"].verdict,
            Verdict::Candidate {
                confidence: 0.7,
                reason: "first-time bulk sender".to_string()
            }
        );
        assert_eq!(
            verdicts["m4"].verdict,
            Verdict::FlagDomain {
                reason: "typosquatted brand".to_string()
            }
        );
    }

    #[test]
    fn verdict_kind_is_case_insensitive() {
        let verdicts = parse_verdicts("verdict id=m1 kind=knownspam");
        assert_eq!(verdicts["m1"].verdict, Verdict::KnownSpam);
    }

    #[test]
    fn malformed_verdict_lines_are_skipped() {
        let reply = "\
VERDICT kind=KnownSpam
VERDICT id=m2 kind=Telepathy
chatter that is not a verdict
VERDICT id=m3 kind=Legitimate";
        let verdicts = parse_verdicts(reply);
        assert_eq!(verdicts.len(), 1);
        assert!(verdicts.contains_key("m3"));
    }

    #[test]
    fn candidate_without_confidence_defaults() {
        let verdicts = parse_verdicts("VERDICT id=m1 kind=Candidate reason=vague");
        match &verdicts["m1"].verdict {
            Verdict::Candidate { confidence, reason } => {
                assert_eq!(*confidence, 0.5);
                assert_eq!(reason, "vague");
            }
            other => panic!("unexpected verdict {other:?}"),
        }
    }
}
