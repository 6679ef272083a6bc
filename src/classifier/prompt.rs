use crate::domain::MessageSummary;

pub const SYSTEM_PROMPT: &str = r#"You are a spam triage assistant for an email inbox. For every message in the batch, decide one of four verdicts:
- KnownSpam: the sender's domain appears in the known spam domain list.
- Legitimate: ordinary mail, no action needed.
- Candidate: the individual message looks like spam but the domain alone does not justify blocking; include a confidence between 0 and 1 and a short reason.
- FlagDomain: the sender's domain itself looks like a spam operation and should go to human review; include a short reason.

Reply with exactly one line per message using this format:
VERDICT id=<message id> kind=<KnownSpam|Legitimate|Candidate|FlagDomain> confidence=<0..1, Candidate only> domain=<sender domain> reason=<short free text>

After the verdict lines, append one summary line:
BATCH_STATS: processed=<total messages>, junked=<KnownSpam count>, candidates=<Candidate count>

Do not add any other commentary."#;

/// Assembles the user prompt for one batch: the messages to classify plus
/// snapshots of the domain registry and the pending-review queue.
pub fn build_batch_prompt(
    messages: &[MessageSummary],
    known_domains: &[String],
    pending_domains: &[String],
) -> String {
    let mut prompt = String::new();

    prompt.push_str("Known spam domains:\n");
    if known_domains.is_empty() {
        prompt.push_str("(none)\n");
    } else {
        for domain in known_domains {
            prompt.push_str(domain);
            prompt.push('\n');
        }
    }

    prompt.push_str("\nDomains already pending human review:\n");
    if pending_domains.is_empty() {
        prompt.push_str("(none)\n");
    } else {
        for domain in pending_domains {
            prompt.push_str(domain);
            prompt.push('\n');
        }
    }

    prompt.push_str("\nMessages to classify:\n");
    for message in messages {
        prompt.push_str(&format!(
            "id={} | from={} | subject={}\n",
            message.id, message.sender, message.subject
        ));
    }

    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(id: &str, sender: &str, subject: &str) -> MessageSummary {
        MessageSummary {
            id: id.to_string(),
            sender: sender.to_string(),
            subject: subject.to_string(),
            received_at: None,
        }
    }

    #[test]
    fn prompt_lists_messages_and_domains() {
        let messages = vec![summary("m1", "a@spam.com", "Win big")];
        let prompt = build_batch_prompt(
            &messages,
            &["SPAM.COM".to_string()],
            &["SHADY.NET".to_string()],
        );
        assert!(prompt.contains("SPAM.COM"));
        assert!(prompt.contains("SHADY.NET"));
        assert!(prompt.contains("id=m1 | from=a@spam.com | subject=Win big"));
    }

    #[test]
    fn empty_snapshots_render_placeholders() {
        let prompt = build_batch_prompt(&[], &[], &[]);
        assert_eq!(prompt.matches("(none)").count(), 2);
    }
}
