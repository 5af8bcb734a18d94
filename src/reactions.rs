//! Client-side cleanup of reaction receipts.
//!
//! The service may deliver the same receipt more than once (an echo of our
//! own toggle plus the update stream). Rendering goes through
//! [`dedup_receipts`] so every actor is listed once per reaction event.

use std::collections::HashSet;

use crate::models::{ChatMessage, ReactionReceipt};

/// Reaction the chat screen toggles.
pub const THUMBS_UP: &str = "\u{1F44D}";

/// Keep the first receipt for each `(uuid, actionTimetoken)` pair, in order.
///
/// `None` stays `None`; an empty slice gives an empty vector.
pub fn dedup_receipts(receipts: Option<&[ReactionReceipt]>) -> Option<Vec<ReactionReceipt>> {
    let receipts = receipts?;
    let mut seen = HashSet::with_capacity(receipts.len());
    Some(
        receipts
            .iter()
            .filter(|r| seen.insert((r.uuid.as_str(), r.action_timetoken)))
            .cloned()
            .collect(),
    )
}

/// Deduplicated receipts for `emoji` on `message` (empty when nobody reacted).
pub fn reactors(message: &ChatMessage, emoji: &str) -> Vec<ReactionReceipt> {
    dedup_receipts(message.reactions.get(emoji).map(Vec::as_slice)).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Timetoken;
    use std::collections::BTreeMap;

    fn receipt(uuid: &str, tt: u64) -> ReactionReceipt {
        ReactionReceipt {
            uuid: uuid.to_string(),
            action_timetoken: Timetoken(tt),
        }
    }

    #[test]
    fn test_dedup_keeps_first_occurrence_order() {
        let input = vec![receipt("A", 1), receipt("B", 2), receipt("A", 1), receipt("A", 3)];
        let output = dedup_receipts(Some(input.as_slice())).unwrap();
        assert_eq!(output, vec![receipt("A", 1), receipt("B", 2), receipt("A", 3)]);
    }

    #[test]
    fn test_dedup_absent_and_empty() {
        assert_eq!(dedup_receipts(None), None);
        assert_eq!(dedup_receipts(Some(&[][..])), Some(vec![]));
    }

    #[test]
    fn test_dedup_same_actor_different_timetokens_kept() {
        let input = vec![receipt("A", 1), receipt("A", 2), receipt("B", 1)];
        let output = dedup_receipts(Some(input.as_slice())).unwrap();
        assert_eq!(output.len(), 3);
    }

    #[test]
    fn test_dedup_output_has_no_duplicate_pairs() {
        let input: Vec<ReactionReceipt> = (0..40)
            .map(|i| receipt(["A", "B", "C"][i % 3], (i % 7) as u64))
            .collect();
        let output = dedup_receipts(Some(input.as_slice())).unwrap();
        assert!(output.len() <= input.len());
        for (i, a) in output.iter().enumerate() {
            for b in &output[i + 1..] {
                assert!(!(a.uuid == b.uuid && a.action_timetoken == b.action_timetoken));
            }
        }
        // Every distinct pair from the input survives.
        let distinct: HashSet<_> = input.iter().map(|r| (&r.uuid, r.action_timetoken)).collect();
        assert_eq!(output.len(), distinct.len());
    }

    #[test]
    fn test_reactors_on_message() {
        let mut reactions = BTreeMap::new();
        reactions.insert(
            THUMBS_UP.to_string(),
            vec![receipt("A", 5), receipt("A", 5)],
        );
        let msg = ChatMessage {
            timetoken: Timetoken(1),
            channel_id: "c".into(),
            user_id: "A".into(),
            content: "hi".into(),
            mentioned_users: BTreeMap::new(),
            text_links: Vec::new(),
            reactions,
        };
        assert_eq!(reactors(&msg, THUMBS_UP), vec![receipt("A", 5)]);
        assert!(reactors(&msg, "<3").is_empty());
    }
}
