use anyhow::bail;

use crate::git::{ChangeKind, StagedChange};
use crate::provider::Message;

/// Build the message list for one generation: the configured instruction as
/// the system message, then one user message describing every staged change
/// with its diff. Deleted files contribute their status line only.
///
/// The assembled size is checked against `max_request_chars` here, before
/// any request leaves the process.
pub fn build(
    instruction: &str,
    entries: &[(StagedChange, Option<String>)],
    max_request_chars: usize,
) -> anyhow::Result<Vec<Message>> {
    let mut user = String::from("Write a commit message for the following staged changes.\n");

    for (change, diff) in entries {
        user.push('\n');
        match &change.kind {
            ChangeKind::Renamed { from } => {
                user.push_str(&format!("{}: {} -> {}\n", change.kind.label(), from, change.path));
            }
            kind => {
                user.push_str(&format!("{}: {}\n", kind.label(), change.path));
            }
        }
        if let Some(diff) = diff {
            let diff = diff.trim_end();
            if !diff.is_empty() {
                user.push_str(diff);
                user.push('\n');
            }
        }
    }

    let total = instruction.chars().count() + user.chars().count();
    if total > max_request_chars {
        bail!(
            "staged changes are too large to send ({total} characters, limit {max_request_chars}); \
consider committing in smaller pieces or raising max_request_chars"
        );
    }

    Ok(vec![Message::system(instruction), Message::user(user)])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::Role;

    fn change(kind: ChangeKind, path: &str) -> StagedChange {
        StagedChange {
            kind,
            path: path.into(),
        }
    }

    #[test]
    fn lists_every_change_with_status_and_diff() {
        let entries = vec![
            (
                change(ChangeKind::Modified, "src/lib.rs"),
                Some("@@ -1 +1 @@\n-old\n+new".to_string()),
            ),
            (change(ChangeKind::Deleted, "gone.txt"), None),
            (
                change(
                    ChangeKind::Renamed {
                        from: "a.rs".into(),
                    },
                    "b.rs",
                ),
                Some(String::new()),
            ),
        ];

        let messages = build("Write good commit messages.", &entries, 10_000).unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::System);
        assert_eq!(messages[1].role, Role::User);

        let user = &messages[1].content;
        assert!(user.contains("modified: src/lib.rs"));
        assert!(user.contains("+new"));
        assert!(user.contains("deleted: gone.txt"));
        assert!(user.contains("renamed: a.rs -> b.rs"));
    }

    #[test]
    fn oversized_request_is_rejected_before_sending() {
        let entries = vec![(
            change(ChangeKind::Modified, "big.rs"),
            Some("x".repeat(500)),
        )];
        let err = build("Write good commit messages.", &entries, 100).unwrap_err();
        assert!(err.to_string().contains("too large"));
    }
}
