//! Parsed response data types.

/// One mailbox participant from an envelope address list.
///
/// Built only during parsing and immutable afterwards; owned by the
/// [`Envelope`] that contains it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Address {
    /// Display name, empty when the wire form was NIL.
    pub name: String,
    /// `mailbox@host`.
    pub email: String,
}

/// Structured summary of one message, independent of its body.
///
/// All address-list fields are always present (possibly empty) even when the
/// wire form was NIL. Constructed entirely within one parse of one FETCH
/// reply and handed to the collaborator by value.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Envelope {
    /// Message sequence number from the FETCH line (0 for nested envelopes).
    pub id: u32,
    /// Date header text.
    pub date: String,
    /// Subject header text.
    pub subject: String,
    /// From addresses.
    pub from: Vec<Address>,
    /// Sender addresses.
    pub sender: Vec<Address>,
    /// Reply-To addresses.
    pub reply_to: Vec<Address>,
    /// To addresses.
    pub to: Vec<Address>,
    /// Cc addresses.
    pub cc: Vec<Address>,
    /// Bcc addresses.
    pub bcc: Vec<Address>,
    /// In-Reply-To header (thread parent).
    pub parent_id: String,
    /// Message-ID header.
    pub message_id: String,
}

/// Common fields of a non-multipart body part.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PartFields {
    /// Media type (`TEXT`, `IMAGE`, ...).
    pub media_type: String,
    /// Media subtype (`PLAIN`, `HTML`, ...).
    pub subtype: String,
    /// Parameter list key/value pairs.
    pub params: Vec<(String, String)>,
    /// Content-ID.
    pub id: String,
    /// Content-Description.
    pub description: String,
    /// Content-Transfer-Encoding.
    pub encoding: String,
    /// Size in octets.
    pub size: u32,
}

/// Recursive body-structure tree from a FETCH reply.
///
/// Every field is parsed even though most are discarded downstream;
/// misreading any of them would desynchronize the rest of the line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BodyStructure {
    /// Leaf part of any media type without extra trailing fields.
    Basic(PartFields),
    /// TEXT leaf part with its line count.
    Text {
        /// Common part fields.
        fields: PartFields,
        /// Size in lines.
        lines: u32,
    },
    /// MESSAGE/RFC822 part embedding a full message.
    Message {
        /// Common part fields.
        fields: PartFields,
        /// Envelope of the embedded message.
        envelope: Box<Envelope>,
        /// Body structure of the embedded message.
        body: Box<BodyStructure>,
        /// Size in lines.
        lines: u32,
    },
    /// Multipart container.
    Multipart {
        /// Nested parts, in wire order.
        parts: Vec<BodyStructure>,
        /// Multipart subtype (`MIXED`, `ALTERNATIVE`, ...).
        subtype: String,
    },
}
