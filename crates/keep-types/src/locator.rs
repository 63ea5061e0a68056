use std::fmt;
use std::str::FromStr;

use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Locator of the zero-length block. Used as the sole block of an empty stream.
pub const EMPTY_BLOCK_LOCATOR: &str = "d41d8cd98f00b204e9800998ecf8427e+0";

/// Maximum size of a single Keep block (64 MiB).
pub const KEEP_BLOCK_SIZE: usize = 64 * 1024 * 1024;

/// Number of hex characters in a block digest.
const DIGEST_LEN: usize = 32;

/// Content-addressed reference to a block in the Keep backend.
///
/// A locator is the MD5 digest of the block, its size in bytes, and an
/// optional list of hints:
///
/// ```text
/// locator ::= digest "+" size hint*
/// digest  ::= <32 lowercase hex digits>
/// hint    ::= "+" <one or more non-whitespace characters except "+">
/// ```
///
/// Hints are kept verbatim and in order. Only a hint shaped like
/// `A<signature>@<expiry>` is treated as a permission signature.
///
/// Identity is the full string form. [`Locator::strip_hints`] gives the
/// bare `digest+size` address.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Locator {
    digest: String,
    size: u64,
    hints: Vec<String>,
}

impl Locator {
    /// Compute the locator of a block's content.
    pub fn for_data(data: &[u8]) -> Self {
        Self {
            digest: hex::encode(Md5::digest(data)),
            size: data.len() as u64,
            hints: Vec::new(),
        }
    }

    /// Build a locator from a digest and size, validating the digest.
    pub fn new(digest: &str, size: u64) -> Result<Self, TypeError> {
        if !is_valid_digest(digest) {
            return Err(TypeError::InvalidLocator {
                token: digest.to_string(),
                reason: "digest must be 32 lowercase hex digits".into(),
            });
        }
        Ok(Self {
            digest: digest.to_string(),
            size,
            hints: Vec::new(),
        })
    }

    /// The locator of the zero-length block.
    pub fn empty() -> Self {
        Self::for_data(&[])
    }

    /// Returns `true` if `token` parses as a locator.
    pub fn is_valid(token: &str) -> bool {
        token.parse::<Self>().is_ok()
    }

    /// Hex digest of the block.
    pub fn digest(&self) -> &str {
        &self.digest
    }

    /// Declared block size in bytes.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Hints following the size, without their leading `+`.
    pub fn hints(&self) -> &[String] {
        &self.hints
    }

    /// The permission signature hint (`A...`), if the locator is signed.
    pub fn signature(&self) -> Option<&str> {
        self.hints
            .iter()
            .find(|hint| is_signature_hint(hint))
            .map(String::as_str)
    }

    /// A copy of this locator with any signature hint removed.
    pub fn without_signature(&self) -> Self {
        Self {
            digest: self.digest.clone(),
            size: self.size,
            hints: self
                .hints
                .iter()
                .filter(|hint| !is_signature_hint(hint))
                .cloned()
                .collect(),
        }
    }

    /// The bare `digest+size` address.
    pub fn strip_hints(&self) -> Self {
        Self {
            digest: self.digest.clone(),
            size: self.size,
            hints: Vec::new(),
        }
    }
}

fn is_valid_digest(digest: &str) -> bool {
    digest.len() == DIGEST_LEN
        && digest
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}

fn is_valid_hint(hint: &str) -> bool {
    !hint.is_empty() && !hint.chars().any(char::is_whitespace)
}

/// `A` followed by `[A-Za-z0-9@_-]+`.
fn is_signature_hint(hint: &str) -> bool {
    let Some(rest) = hint.strip_prefix('A') else {
        return false;
    };
    !rest.is_empty()
        && rest
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '@' | '_' | '-'))
}

impl FromStr for Locator {
    type Err = TypeError;

    fn from_str(token: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| TypeError::InvalidLocator {
            token: token.to_string(),
            reason: reason.to_string(),
        };

        let mut parts = token.split('+');
        let digest = parts.next().unwrap_or_default();
        if !is_valid_digest(digest) {
            return Err(invalid("digest must be 32 lowercase hex digits"));
        }

        let size = parts.next().ok_or_else(|| invalid("missing size"))?;
        if size.is_empty() || !size.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid("size must be a decimal number"));
        }
        let size = size
            .parse::<u64>()
            .map_err(|e| invalid(&format!("size out of range: {e}")))?;

        let mut hints = Vec::new();
        for hint in parts {
            if !is_valid_hint(hint) {
                return Err(invalid(&format!("malformed hint {hint:?}")));
            }
            hints.push(hint.to_string());
        }

        Ok(Self {
            digest: digest.to_string(),
            size,
            hints,
        })
    }
}

impl TryFrom<String> for Locator {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Locator> for String {
    fn from(locator: Locator) -> Self {
        locator.to_string()
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}+{}", self.digest, self.size)?;
        for hint in &self.hints {
            write!(f, "+{hint}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Locator({self})")
    }
}
