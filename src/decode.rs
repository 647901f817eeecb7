//! Pluggable body decoding.

use serde_json::Value;

/// Error returned by a [`Decoder`].
pub type DecodeError = Box<dyn std::error::Error + Send + Sync>;

/// Turns raw response bytes into a structured value.
///
/// Any `Fn(&[u8]) -> Result<Value, DecodeError>` is a decoder, so a custom
/// one can be passed as a closure.
///
/// # Examples
///
/// ```
/// use apiary::decode::{DecodeError, Decoder};
/// use serde_json::Value;
///
/// let lenient = |raw: &[u8]| -> Result<Value, DecodeError> {
///     Ok(serde_json::from_slice(raw).unwrap_or(Value::Null))
/// };
/// assert_eq!(lenient.decode(b"not json").unwrap(), Value::Null);
/// ```
pub trait Decoder: Send + Sync {
    /// Decodes one response body or one streamed record.
    fn decode(&self, raw: &[u8]) -> Result<Value, DecodeError>;
}

/// UTF-8 JSON decoding with `serde_json`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonDecoder;

impl Decoder for JsonDecoder {
    fn decode(&self, raw: &[u8]) -> Result<Value, DecodeError> {
        Ok(serde_json::from_slice(raw)?)
    }
}

impl<F> Decoder for F
where
    F: Fn(&[u8]) -> Result<Value, DecodeError> + Send + Sync,
{
    fn decode(&self, raw: &[u8]) -> Result<Value, DecodeError> {
        self(raw)
    }
}
