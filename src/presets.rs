//! Voice catalogue and style presets offered for narration.

use serde::{Deserialize, Serialize};

/// Prebuilt backend voices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Voice {
    #[default]
    Zephyr,
    Puck,
    Charon,
    Kore,
    Fenrir,
}

impl Voice {
    /// Identifier sent to the backend.
    pub fn id(&self) -> &'static str {
        match self {
            Voice::Zephyr => "Zephyr",
            Voice::Puck => "Puck",
            Voice::Charon => "Charon",
            Voice::Kore => "Kore",
            Voice::Fenrir => "Fenrir",
        }
    }

    /// Display label with a short character description.
    pub fn label(&self) -> &'static str {
        match self {
            Voice::Zephyr => "Zephyr (Bright)",
            Voice::Puck => "Puck (Playful)",
            Voice::Charon => "Charon (Deep)",
            Voice::Kore => "Kore (Calm)",
            Voice::Fenrir => "Fenrir (Intense)",
        }
    }

    pub fn all() -> &'static [Voice] {
        &[
            Voice::Zephyr,
            Voice::Puck,
            Voice::Charon,
            Voice::Kore,
            Voice::Fenrir,
        ]
    }

    /// Case-insensitive lookup by id.
    pub fn from_id(id: &str) -> Option<Voice> {
        Voice::all()
            .iter()
            .copied()
            .find(|v| v.id().eq_ignore_ascii_case(id.trim()))
    }
}

impl std::fmt::Display for Voice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// A one-click style instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StyleTag {
    pub id: &'static str,
    pub label: &'static str,
    pub prompt: &'static str,
}

pub const STYLE_TAGS: &[StyleTag] = &[
    StyleTag {
        id: "romantic",
        label: "Romantic",
        prompt: "Speak in a soft, romantic, and emotional tone.",
    },
    StyleTag {
        id: "sylheti",
        label: "Sylheti",
        prompt: "Attempt to use a Sylheti dialect intonation.",
    },
    StyleTag {
        id: "news",
        label: "News Anchor",
        prompt: "Speak formally, clearly, and professionally like a news anchor.",
    },
    StyleTag {
        id: "storyteller",
        label: "Storyteller",
        prompt: "Speak in an engaging, narrative style suitable for storytelling.",
    },
    StyleTag {
        id: "sad",
        label: "Sad",
        prompt: "Speak with a melancholic and slow tone.",
    },
    StyleTag {
        id: "excited",
        label: "Excited",
        prompt: "Speak quickly with high energy and excitement.",
    },
];

pub fn style_tag(id: &str) -> Option<&'static StyleTag> {
    STYLE_TAGS
        .iter()
        .find(|tag| tag.id.eq_ignore_ascii_case(id.trim()))
}
