use core::fmt;

use sha1::{Digest, Sha1};

/// The allocation routine bundled with this crate.
///
/// A Redis-compatible Lua script; backends that speak another dialect can be
/// handed a different source via [`IdGenerator::with_script`].
///
/// [`IdGenerator::with_script`]: crate::IdGenerator::with_script
pub const DEFAULT_ALLOCATION_SCRIPT: &str = include_str!("../resources/allocate.lua");

/// An allocation routine plus its content-hash address.
///
/// The digest is computed once, at generator construction, and reused to
/// address the routine on every backend without re-sending its body. SHA-1
/// because EVALSHA-style backends address resident scripts by the SHA-1 of
/// their source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptIdentity {
    source: String,
    sha1_hex: String,
}

impl ScriptIdentity {
    /// Computes the identity of the given routine source.
    pub fn new(source: impl Into<String>) -> Self {
        let source = source.into();
        let sha1_hex = hex::encode(Sha1::digest(source.as_bytes()));
        Self { source, sha1_hex }
    }

    /// The routine source, verbatim.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Lowercase hex encoding of the SHA-1 digest of the source.
    pub fn sha1_hex(&self) -> &str {
        &self.sha1_hex
    }
}

impl fmt::Display for ScriptIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.sha1_hex)
    }
}
