//! Stream messages
//!
//! A message is a top-level map with a text `type` key. Image messages also
//! carry a `channels` sequence of [`Channel`] records.

use crate::channel::Channel;
use crate::config::IMAGE_MESSAGE_TYPE;
use crate::error::{Result, StreamError};
use crate::value::{KeyOrder, Value};

/// One decoded stream message
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    /// Value of the `type` key
    pub message_type: String,
    /// Channel records (image messages only)
    pub channels: Vec<Channel>,
    /// Remaining keys, in stream order
    pub fields: Vec<(Value, Value)>,
    image: bool,
    order: KeyOrder,
}

impl Message {
    /// Parse a message tree, treating `"image"` messages as carrying channels
    pub fn from_value(value: Value) -> Result<Self> {
        Self::parse(value, IMAGE_MESSAGE_TYPE)
    }

    /// Parse a message tree, treating `image_type` messages as carrying channels
    ///
    /// Only the first `type` and, for image messages, the first `channels`
    /// key are lifted out; any other entry stays in `fields`.
    pub fn parse(value: Value, image_type: &str) -> Result<Self> {
        let entries = match value {
            Value::Map(entries) => entries,
            other => {
                return Err(StreamError::MalformedMessage(format!(
                    "message must be a map, got {}",
                    other.kind_name()
                )))
            }
        };

        let message_type = match entries.iter().find(|(k, _)| k.as_text() == Some("type")) {
            Some((_, Value::Text(text))) => text.clone(),
            Some((_, other)) => {
                return Err(StreamError::MalformedMessage(format!(
                    "type must be a text string, got {}",
                    other.kind_name()
                )))
            }
            None => return Err(StreamError::MalformedMessage("missing key: type".to_string())),
        };
        let image = message_type == image_type;

        let mut seen_type = false;
        let mut channels = None;
        let mut fields = Vec::with_capacity(entries.len());
        let mut order = KeyOrder::default();
        for (key, value) in entries {
            let name = match key.as_text() {
                Some("type") => Some("type"),
                Some("channels") => Some("channels"),
                _ => None,
            };
            match name {
                Some("type") if !seen_type => {
                    seen_type = true;
                    order.push_known("type");
                }
                Some("channels") if image && channels.is_none() => {
                    channels = Some(value);
                    order.push_known("channels");
                }
                _ => {
                    fields.push((key, value));
                    order.push_field();
                }
            }
        }

        let channels = if image {
            parse_channels(channels)?
        } else {
            Vec::new()
        };

        Ok(Self {
            message_type,
            channels,
            fields,
            image,
            order,
        })
    }

    /// Check if this message was parsed as an image message
    pub fn is_image(&self) -> bool {
        self.image
    }

    /// Look up one of the remaining keys by text key
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find(|(k, _)| k.as_text() == Some(key))
            .map(|(_, v)| v)
    }

    /// Rebuild the message tree, keys in their parsed order
    ///
    /// Image messages always carry `channels`, even when it is empty.
    pub fn into_value(self) -> Value {
        let mut known = vec![("type", Value::Text(self.message_type))];
        if self.image {
            let channels = self.channels.into_iter().map(Channel::into_value).collect();
            known.push(("channels", Value::Array(channels)));
        }
        Value::Map(self.order.rebuild(known, self.fields))
    }
}

fn parse_channels(channels: Option<Value>) -> Result<Vec<Channel>> {
    let items = match channels {
        Some(Value::Array(items)) => items,
        Some(other) => {
            return Err(StreamError::MalformedMessage(format!(
                "channels must be an array, got {}",
                other.kind_name()
            )))
        }
        None => {
            return Err(StreamError::MalformedMessage(
                "missing key: channels".to_string(),
            ))
        }
    };

    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| {
            Channel::from_value(item).map_err(|source| StreamError::Channel { index, source })
        })
        .collect()
}
