//! Request-scoped identity carrier.
//!
//! A `RequestContext` travels with a single request. It holds the propagated
//! headers and at most one identity. The identity is attached once by whatever
//! authenticated the request. Attaching again is a caller bug. Downstream code
//! reads it back with [`RequestContext::current`].
//!
//! When a request crosses to another node, the identity travels as a token in
//! the [`AUTHENTICATION_HEADER`] header and is decoded lazily on first read.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use tracing::debug;

use crate::codec::CodecError;
use crate::identity::Identity;

/// Header carrying the identity token between nodes.
pub const AUTHENTICATION_HEADER: &str = "_xpack_security_authentication";

#[derive(Debug, thiserror::Error)]
pub enum ContextError {
    /// An identity was already attached (or arrived in the headers).
    #[error("authentication already present in the request context")]
    AlreadyAttached,

    /// The propagated identity could not be decoded. Reject the request.
    #[error("invalid propagated authentication: {0}")]
    Codec(#[from] CodecError),
}

#[derive(Debug, Default)]
pub struct RequestContext {
    headers: HashMap<String, String>,
    identity: OnceLock<Arc<Identity>>,
}

impl RequestContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// A context for an inbound request with propagated headers.
    pub fn from_headers(headers: HashMap<String, String>) -> Self {
        Self {
            headers,
            identity: OnceLock::new(),
        }
    }

    pub fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }

    /// Attach the identity for this request and write its propagation header.
    pub fn attach(&mut self, identity: Identity) -> Result<Arc<Identity>, ContextError> {
        if self.identity.get().is_some() || self.headers.contains_key(AUTHENTICATION_HEADER) {
            return Err(ContextError::AlreadyAttached);
        }
        let token = identity.encode_token()?;
        let identity = Arc::new(identity);
        self.identity
            .set(Arc::clone(&identity))
            .map_err(|_| ContextError::AlreadyAttached)?;
        self.headers.insert(AUTHENTICATION_HEADER.to_string(), token);
        debug!(identity = %identity, "attached authentication to request context");
        Ok(identity)
    }

    /// The identity for this request, decoding the propagated header on first
    /// read. `Ok(None)` means the request carries no identity at all.
    pub fn current(&self) -> Result<Option<Arc<Identity>>, ContextError> {
        if let Some(identity) = self.identity.get() {
            return Ok(Some(Arc::clone(identity)));
        }
        let Some(token) = self.headers.get(AUTHENTICATION_HEADER) else {
            return Ok(None);
        };
        let decoded = Arc::new(Identity::decode_token(token)?);
        debug!(identity = %decoded, "read propagated authentication");
        Ok(Some(Arc::clone(self.identity.get_or_init(|| decoded))))
    }
}

// ============================================================================
// Tests
// ============================================================================
