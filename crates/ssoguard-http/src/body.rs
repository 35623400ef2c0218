//! Response bodies.

use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use http_body::{Body, Frame, SizeHint};
use http_body_util::Full;

/// Body of every gateway response.
///
/// Payloads are always fully built before the response is returned, so there
/// is no streaming variant.
#[derive(Debug)]
pub enum GuardResponseBody {
    /// A complete payload: JSON documents and plain-text rejections.
    Payload(Full<Bytes>),
    /// Headers only, sent in answer to `HEAD`.
    Bodiless,
}

impl GuardResponseBody {
    /// A payload from bytes.
    #[must_use]
    pub fn from_bytes(data: impl Into<Bytes>) -> Self {
        Self::Payload(Full::new(data.into()))
    }

    /// A payload from a UTF-8 string.
    #[must_use]
    pub fn from_string(s: impl Into<String>) -> Self {
        Self::from_bytes(s.into())
    }

    /// No payload.
    #[must_use]
    pub fn bodiless() -> Self {
        Self::Bodiless
    }
}

impl Body for GuardResponseBody {
    type Data = Bytes;
    type Error = std::io::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Bytes>, std::io::Error>>> {
        let Self::Payload(full) = self.get_mut() else {
            return Poll::Ready(None);
        };
        Pin::new(full).poll_frame(cx).map_err(|never| match never {})
    }

    fn is_end_stream(&self) -> bool {
        match self {
            Self::Payload(full) => full.is_end_stream(),
            Self::Bodiless => true,
        }
    }

    fn size_hint(&self) -> SizeHint {
        match self {
            Self::Payload(full) => full.size_hint(),
            Self::Bodiless => SizeHint::with_exact(0),
        }
    }
}
