//! Chat prompt assembly and the response token estimate.

use crate::models::{ChatMessage, Role};

/// Cue appended after the conversation so the model answers as the assistant.
pub const ASSISTANT_CUE: &str = "Assistant: ";

/// Render a conversation as one prompt: each message on a role-labeled line
/// followed by a blank line, then the assistant cue.
pub fn format_chat_prompt(messages: &[ChatMessage]) -> String {
    let mut prompt = String::new();
    for message in messages {
        let label = match message.role {
            Role::System => "System",
            Role::User => "User",
            Role::Assistant => "Assistant",
        };
        prompt.push_str(label);
        prompt.push_str(": ");
        prompt.push_str(&message.content);
        prompt.push_str("\n\n");
    }
    prompt.push_str(ASSISTANT_CUE);
    prompt
}

/// Rough token count: a quarter of the character count, 0 for blank text.
pub fn estimate_token_count(text: &str) -> usize {
    if text.trim().is_empty() {
        return 0;
    }
    text.chars().count() / 4
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_labels_each_role() {
        let prompt = format_chat_prompt(&[
            ChatMessage::system("Be brief."),
            ChatMessage::user("Hi"),
            ChatMessage::assistant("Hello!"),
            ChatMessage::user("Dose?"),
        ]);
        assert_eq!(
            prompt,
            "System: Be brief.\n\nUser: Hi\n\nAssistant: Hello!\n\nUser: Dose?\n\nAssistant: "
        );
    }

    #[test]
    fn empty_conversation_is_just_the_cue() {
        assert_eq!(format_chat_prompt(&[]), "Assistant: ");
    }

    #[test]
    fn token_estimate_rounds_down() {
        assert_eq!(estimate_token_count(""), 0);
        assert_eq!(estimate_token_count("   \n"), 0);
        assert_eq!(estimate_token_count("abc"), 0);
        assert_eq!(estimate_token_count("abcd"), 1);
        assert_eq!(estimate_token_count("abcdefghi"), 2);
    }

    #[test]
    fn token_estimate_counts_characters() {
        assert_eq!(estimate_token_count("éééé"), 1);
    }
}
