//! Wire types for the delivery webhook protocol.
//!
//! The JSON shape is a compatibility contract with deployed endpoint
//! implementations; field names are part of the protocol.

use serde::{Deserialize, Serialize};

/// An envelope address.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Address {
    /// The bare address.
    pub address: String,
}

/// The delivery envelope.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Envelope {
    /// Envelope sender.
    pub from: Address,
    /// Envelope recipient.
    pub to: Address,
}

/// The message being delivered.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Message {
    /// Parsed message headers.
    pub headers: Vec<(String, String)>,
    /// Headers added by the server.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    #[serde(rename = "serverHeaders")]
    #[serde(default)]
    pub server_headers: Vec<(String, String)>,
    /// Full message contents.
    pub contents: String,
    /// Message size in bytes.
    pub size: usize,
}

/// Request POSTed to a webhook endpoint.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Request {
    /// Destination account identifier.
    pub user_id: String,
    /// Delivery envelope, when available.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub envelope: Option<Envelope>,
    /// The message, when available.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<Message>,
}

impl Request {
    /// Create a request for an account.
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            envelope: None,
            message: None,
        }
    }

    /// Attach the delivery envelope.
    pub fn with_envelope(mut self, envelope: Envelope) -> Self {
        self.envelope = Some(envelope);
        self
    }

    /// Attach the message.
    pub fn with_message(mut self, message: Message) -> Self {
        self.message = Some(message);
        self
    }
}

/// Verdict returned by a webhook endpoint.
#[derive(Serialize, Deserialize, Debug)]
pub struct Response {
    /// Accept or reject the delivery.
    pub action: Action,
    /// Filing modifications applied on accept.
    #[serde(default)]
    pub modifications: Vec<Modification>,
    /// Flags to set on the stored message.
    #[serde(default)]
    pub flags: Vec<String>,
    /// Skip the default INBOX filing.
    #[serde(default)]
    pub skip_inbox: bool,
}

/// Endpoint verdict on the delivery.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq)]
pub enum Action {
    /// Deliver the message.
    #[serde(rename = "accept")]
    Accept,
    /// Refuse the message.
    #[serde(rename = "reject")]
    Reject,
}

/// A filing modification requested by an endpoint.
#[derive(Serialize, Deserialize, Debug)]
#[serde(tag = "type")]
pub enum Modification {
    /// File the message into a named folder.
    #[serde(rename = "fileInto")]
    FileInto {
        /// Destination folder name.
        folder: String,
        /// Flags to set on the copy.
        #[serde(default)]
        flags: Vec<String>,
        /// Create the folder if it does not exist.
        #[serde(default)]
        create: bool,
    },
}
