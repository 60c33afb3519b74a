//! Ephemeral slash command responses in Block Kit form.

use overload_core::Reply;
use serde::Serialize;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SlackMessage {
    pub response_type: &'static str,
    pub text: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub blocks: Vec<Block>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Block {
    Section { text: TextObject },
    Divider,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct TextObject {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub text: String,
}

impl Block {
    fn markdown(text: impl Into<String>) -> Self {
        Block::Section {
            text: TextObject {
                kind: "mrkdwn",
                text: text.into(),
            },
        }
    }
}

impl SlackMessage {
    /// Visible only to the user who ran the command.
    pub fn ephemeral(text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            response_type: "ephemeral",
            blocks: vec![Block::markdown(text.clone())],
            text,
        }
    }
}

impl From<&Reply> for SlackMessage {
    fn from(reply: &Reply) -> Self {
        let mut message = SlackMessage::ephemeral(reply.text.clone());
        if !reply.items.is_empty() {
            message.blocks.push(Block::Divider);
            message
                .blocks
                .extend(reply.items.iter().map(|item| Block::markdown(format!("• {item}"))));
        }
        message
    }
}
