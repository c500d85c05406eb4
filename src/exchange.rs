//! Export documents: a plain idea array, or the same array sealed with a password.
//!
//! The codec never touches storage. [`decode`] hands back candidate ideas and
//! leaves merging to [`crate::store::IdeaStore::merge`].

use serde_json::Value;
use thiserror::Error;

use crate::crypto::{self, CryptoError, Envelope};
use crate::models::Idea;

const ENVELOPE_FIELDS: [&str; 3] = ["salt", "iv", "ciphertext"];

#[derive(Debug, Error)]
pub enum ExchangeError {
    #[error("Failed to serialize ideas: {0}")]
    SerializeError(#[source] serde_json::Error),
    #[error("Failed to encrypt export: {0}")]
    EncryptError(#[source] CryptoError),
    #[error("File is not valid JSON: {0}")]
    ParseError(#[source] serde_json::Error),
    #[error("File format is not valid")]
    InvalidFormat,
    #[error("Wrong password or corrupted file")]
    DecryptionError,
    #[error("No password given")]
    Cancelled,
}

impl ExchangeError {
    /// The user declined to give a password. Callers should stop quietly.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ExchangeError::Cancelled)
    }
}

/// Source of the password for an encrypted import.
///
/// `None` or an empty string means the user declined.
pub trait PasswordPrompt {
    fn request_password(&mut self) -> Option<String>;
}

impl<F> PasswordPrompt for F
where
    F: FnMut() -> Option<String>,
{
    fn request_password(&mut self) -> Option<String> {
        self()
    }
}

/// An export ready to be written out.
#[derive(Debug, Clone, PartialEq)]
pub enum Document {
    Plain(Vec<Idea>),
    Encrypted(Envelope),
}

impl Document {
    pub fn is_encrypted(&self) -> bool {
        matches!(self, Document::Encrypted(_))
    }

    /// Text written to disk. Plain exports are indented for people to read;
    /// sealed ones are compact.
    pub fn to_payload(&self) -> Result<String, ExchangeError> {
        match self {
            Document::Plain(ideas) => serde_json::to_string_pretty(ideas),
            Document::Encrypted(envelope) => serde_json::to_string(envelope),
        }
        .map_err(ExchangeError::SerializeError)
    }
}

/// Build an export document, sealing it when `password` is non-empty.
pub fn encode(ideas: &[Idea], password: Option<&str>) -> Result<Document, ExchangeError> {
    let Some(password) = password.filter(|p| !p.is_empty()) else {
        return Ok(Document::Plain(ideas.to_vec()));
    };

    let plaintext = serde_json::to_vec(ideas).map_err(ExchangeError::SerializeError)?;
    let envelope = crypto::seal(&plaintext, password).map_err(ExchangeError::EncryptError)?;
    tracing::debug!(count = ideas.len(), bytes = envelope.ciphertext.len(), "sealed export");
    Ok(Document::Encrypted(envelope))
}

/// Parse an imported document into candidate ideas.
///
/// `prompt` is only consulted when the document is sealed.
pub fn decode<P>(document: &str, prompt: &mut P) -> Result<Vec<Idea>, ExchangeError>
where
    P: PasswordPrompt + ?Sized,
{
    let value: Value = serde_json::from_str(document).map_err(ExchangeError::ParseError)?;

    if !is_envelope(&value) {
        return into_ideas(value);
    }

    let password = prompt
        .request_password()
        .filter(|p| !p.is_empty())
        .ok_or(ExchangeError::Cancelled)?;

    let envelope: Envelope =
        serde_json::from_value(value).map_err(|_| ExchangeError::DecryptionError)?;
    let plaintext =
        crypto::open(&envelope, &password).map_err(|_| ExchangeError::DecryptionError)?;
    let inner: Value =
        serde_json::from_slice(&plaintext).map_err(|_| ExchangeError::DecryptionError)?;

    into_ideas(inner)
}

fn is_envelope(value: &Value) -> bool {
    value.as_object().is_some_and(|fields| {
        ENVELOPE_FIELDS
            .iter()
            .all(|key| fields.get(*key).is_some_and(|v| !v.is_null()))
    })
}

fn into_ideas(value: Value) -> Result<Vec<Idea>, ExchangeError> {
    if !value.is_array() {
        return Err(ExchangeError::InvalidFormat);
    }
    serde_json::from_value(value).map_err(|_| ExchangeError::InvalidFormat)
}
