use std::borrow::Cow;

/// Marker trait for message content carried by the broker.
///
/// The broker never inspects a payload. It is wrapped in an `Arc` inside every
/// [`Envelope`](crate::Envelope), so fan-out copies share one allocation while
/// keeping independent status and timestamps. Payloads must be
/// `Send + Sync + 'static` because envelopes cross task boundaries and sit in
/// mailboxes shared between producers and consumers.
///
/// # Type info
///
/// `type_info()` is a discriminator string describing the payload shape. It is
/// what filters and handlers use when they need to tell payloads apart without
/// knowing the concrete type. The default implementation returns the full type
/// name via `std::any::type_name`.
///
/// When using `#[derive(Payload)]` on an enum, `type_info()` returns the variant
/// name (e.g., "Build").
pub trait Payload: Send + Sync + 'static {
    /// Returns a human-readable discriminator for this payload.
    fn type_info(&self) -> Cow<'static, str> {
        Cow::Borrowed(std::any::type_name::<Self>())
    }
}

impl Payload for String {
    fn type_info(&self) -> Cow<'static, str> {
        Cow::Borrowed("text")
    }
}

impl Payload for &'static str {
    fn type_info(&self) -> Cow<'static, str> {
        Cow::Borrowed("text")
    }
}

impl Payload for Vec<u8> {
    fn type_info(&self) -> Cow<'static, str> {
        Cow::Borrowed("bytes")
    }
}

impl Payload for () {
    fn type_info(&self) -> Cow<'static, str> {
        Cow::Borrowed("empty")
    }
}

#[cfg(feature = "serde")]
impl Payload for serde_json::Value {
    fn type_info(&self) -> Cow<'static, str> {
        Cow::Borrowed(match self {
            serde_json::Value::Null => "null",
            serde_json::Value::Bool(_) => "bool",
            serde_json::Value::Number(_) => "number",
            serde_json::Value::String(_) => "string",
            serde_json::Value::Array(_) => "array",
            serde_json::Value::Object(_) => "object",
        })
    }
}
