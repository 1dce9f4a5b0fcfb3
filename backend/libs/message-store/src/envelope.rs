//! Message content model.
//!
//! Chat clients wrap the actual content in "future-proof" layers (ephemeral
//! chats, view-once, edits, ...). Each layer is a [`MessageEnvelope`] whose
//! payload is a [`Payload::Wrapper`] and whose `inner` holds the next layer.
//! Walking the layers is always bounded, see [`MessageEnvelope::unwrap_bounded`].

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::jid::Jid;

/// Unwrap bound used when the caller has no configured value.
pub const DEFAULT_UNWRAP_DEPTH: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageEnvelope {
    pub payload: Payload,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inner: Option<Box<MessageEnvelope>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Payload {
    Text {
        text: String,
    },
    ExtendedText {
        text: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        context: Option<ContextInfo>,
    },
    Image(MediaMessage),
    Video(MediaMessage),
    Audio(MediaMessage),
    Document(MediaMessage),
    Sticker(MediaMessage),
    Reaction(ReactionMessage),
    Wrapper {
        kind: WrapperKind,
    },
    #[serde(other)]
    Unsupported,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WrapperKind {
    Ephemeral,
    ViewOnce,
    ViewOnceV2,
    ViewOnceV2Extension,
    DocumentWithCaption,
    Edited,
}

impl WrapperKind {
    pub fn is_view_once(self) -> bool {
        matches!(
            self,
            WrapperKind::ViewOnce | WrapperKind::ViewOnceV2 | WrapperKind::ViewOnceV2Extension
        )
    }
}

/// Handle of an uploaded media blob. Opaque here; only the media relay reads it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaDescriptor {
    pub direct_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub media_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_sha256: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_enc_sha256: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_length: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaMessage {
    pub descriptor: MediaDescriptor,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mimetype: Option<String>,
    #[serde(default)]
    pub view_once: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<ContextInfo>,
}

/// Inline quote carried by a reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stanza_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub participant: Option<Jid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quoted: Option<Box<MessageEnvelope>>,
}

/// Key of the message a reaction points at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetKey {
    pub chat: Jid,
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub participant: Option<Jid>,
    #[serde(default)]
    pub from_me: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReactionMessage {
    pub key: TargetKey,
    /// Empty when a reaction is removed.
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
    Audio,
}

impl MediaKind {
    pub fn as_str(self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Video => "video",
            MediaKind::Audio => "audio",
        }
    }

    /// Mimetype used when the original message carries none.
    pub fn default_mimetype(self) -> &'static str {
        match self {
            MediaKind::Image => "image/jpeg",
            MediaKind::Video => "video/mp4",
            MediaKind::Audio => "audio/ogg; codecs=opus",
        }
    }

    /// Audio messages have no caption field.
    pub fn supports_caption(self) -> bool {
        !matches!(self, MediaKind::Audio)
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a bounded walk through wrapper layers.
#[derive(Debug, Clone, Copy)]
pub struct Unwrapped<'a> {
    /// Layer the walk stopped at
    pub layer: &'a MessageEnvelope,
    /// Number of wrapper layers walked
    pub depth: usize,
    /// Whether a view-once wrapper was walked on the way
    pub via_view_once: bool,
}

/// Media that is restricted to a single view.
#[derive(Debug, Clone, Copy)]
pub struct ViewOnceMedia<'a> {
    pub kind: MediaKind,
    pub media: &'a MediaMessage,
}

impl<'a> Unwrapped<'a> {
    /// The stopped-at layer as view-once media, if it qualifies.
    ///
    /// Image, video and audio qualify when they are flagged view-once
    /// themselves or sit behind a view-once wrapper.
    pub fn view_once_media(&self) -> Option<ViewOnceMedia<'a>> {
        let layer: &'a MessageEnvelope = self.layer;
        let (kind, media) = match &layer.payload {
            Payload::Image(media) => (MediaKind::Image, media),
            Payload::Video(media) => (MediaKind::Video, media),
            Payload::Audio(media) => (MediaKind::Audio, media),
            _ => return None,
        };

        if media.view_once || self.via_view_once {
            Some(ViewOnceMedia { kind, media })
        } else {
            None
        }
    }
}

impl MessageEnvelope {
    pub fn new(payload: Payload) -> Self {
        Self {
            payload,
            inner: None,
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self::new(Payload::Text { text: text.into() })
    }

    pub fn reply(text: impl Into<String>, context: ContextInfo) -> Self {
        Self::new(Payload::ExtendedText {
            text: text.into(),
            context: Some(context),
        })
    }

    pub fn media(kind: MediaKind, media: MediaMessage) -> Self {
        Self::new(match kind {
            MediaKind::Image => Payload::Image(media),
            MediaKind::Video => Payload::Video(media),
            MediaKind::Audio => Payload::Audio(media),
        })
    }

    pub fn reaction(key: TargetKey, text: impl Into<String>) -> Self {
        Self::new(Payload::Reaction(ReactionMessage {
            key,
            text: text.into(),
        }))
    }

    /// Put `inner` behind a wrapper layer of the given kind.
    pub fn wrapped(kind: WrapperKind, inner: MessageEnvelope) -> Self {
        Self {
            payload: Payload::Wrapper { kind },
            inner: Some(Box::new(inner)),
        }
    }

    /// Walk wrapper layers iteratively, at most `max_depth` of them.
    ///
    /// Stops early at the first layer that is not a wrapper (or a wrapper
    /// with nothing inside). Never recurses, so arbitrarily deep or
    /// adversarial nesting cannot exhaust the stack.
    pub fn unwrap_bounded(&self, max_depth: usize) -> Unwrapped<'_> {
        let mut current = self;
        let mut depth = 0;
        let mut via_view_once = false;

        while depth < max_depth {
            let Payload::Wrapper { kind } = &current.payload else {
                break;
            };
            let Some(inner) = current.inner.as_deref() else {
                break;
            };

            via_view_once |= kind.is_view_once();
            current = inner;
            depth += 1;
        }

        Unwrapped {
            layer: current,
            depth,
            via_view_once,
        }
    }

    /// Quote carried by the unwrapped content, if any.
    pub fn context_info(&self, max_depth: usize) -> Option<&ContextInfo> {
        match &self.unwrap_bounded(max_depth).layer.payload {
            Payload::ExtendedText { context, .. } => context.as_ref(),
            Payload::Image(media)
            | Payload::Video(media)
            | Payload::Audio(media)
            | Payload::Document(media)
            | Payload::Sticker(media) => media.context.as_ref(),
            _ => None,
        }
    }

    pub fn as_reaction(&self, max_depth: usize) -> Option<&ReactionMessage> {
        match &self.unwrap_bounded(max_depth).layer.payload {
            Payload::Reaction(reaction) => Some(reaction),
            _ => None,
        }
    }

    /// Plain text of the message: body text, else media caption. Trimmed.
    pub fn plain_text(&self, max_depth: usize) -> String {
        let text = match &self.unwrap_bounded(max_depth).layer.payload {
            Payload::Text { text } | Payload::ExtendedText { text, .. } => text.as_str(),
            Payload::Image(media) | Payload::Video(media) | Payload::Document(media) => {
                media.caption.as_deref().unwrap_or_default()
            }
            _ => "",
        };
        text.trim().to_string()
    }
}
