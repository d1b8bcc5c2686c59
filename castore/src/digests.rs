use data_encoding::HEXLOWER;
use thiserror::Error;

use crate::proto;

/// The hashing functions a [Digest] can be computed with.
/// There's no explicit tag on the wire, the function is inferred from the
/// length of the hex-encoded hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DigestFunction {
    Md5,
    Sha1,
    Sha256,
    Sha384,
    Sha512,
}

impl DigestFunction {
    /// Infers the function from the length of a hex-encoded hash.
    pub fn from_hash_len(len: usize) -> Option<Self> {
        match len {
            32 => Some(Self::Md5),
            40 => Some(Self::Sha1),
            64 => Some(Self::Sha256),
            96 => Some(Self::Sha384),
            128 => Some(Self::Sha512),
            _ => None,
        }
    }

    /// Hashes the given data, returning the lower-case hex encoding.
    pub fn hash_hex(&self, data: &[u8]) -> String {
        use digest::Digest as _;

        match self {
            Self::Md5 => HEXLOWER.encode(&md5::Md5::digest(data)),
            Self::Sha1 => HEXLOWER.encode(&sha1::Sha1::digest(data)),
            Self::Sha256 => HEXLOWER.encode(&sha2::Sha256::digest(data)),
            Self::Sha384 => HEXLOWER.encode(&sha2::Sha384::digest(data)),
            Self::Sha512 => HEXLOWER.encode(&sha2::Sha512::digest(data)),
        }
    }
}

#[derive(Error, Debug, PartialEq)]
pub enum Error {
    #[error("missing digest")]
    Missing,

    #[error("empty hash")]
    EmptyHash,

    #[error("hash {0:?} is not lower-case hex")]
    InvalidHash(String),

    #[error("hash has length {0}, which matches no known digest function")]
    InvalidHashLen(usize),

    #[error("invalid size: {0}")]
    InvalidSize(i64),
}

impl From<Error> for crate::Error {
    fn from(value: Error) -> Self {
        crate::Error::MalformedReference(value.to_string())
    }
}

/// A fully qualified content digest: the instance name (namespace) it was
/// referenced from, the hex-encoded hash, and the size of the content.
///
/// Two digests describe the same content if their [DigestKey]s are equal,
/// regardless of their instance names.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Digest {
    instance_name: String,
    hash: String,
    size_bytes: i64,
}

/// The projection of a [Digest] without its instance name.
/// Used to index content that is identical regardless of the namespace
/// referring to it.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DigestKey {
    hash: String,
    size_bytes: i64,
}

impl DigestKey {
    pub fn hash(&self) -> &str {
        &self.hash
    }

    pub fn size_bytes(&self) -> i64 {
        self.size_bytes
    }
}

impl std::fmt::Display for DigestKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.hash, self.size_bytes)
    }
}

impl Digest {
    /// Constructs a new [Digest], validating the hash and size.
    pub fn new(
        instance_name: impl Into<String>,
        hash: impl Into<String>,
        size_bytes: i64,
    ) -> Result<Self, Error> {
        let hash = hash.into();
        if hash.is_empty() {
            return Err(Error::EmptyHash);
        }
        if !hash.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f')) {
            return Err(Error::InvalidHash(hash));
        }
        if DigestFunction::from_hash_len(hash.len()).is_none() {
            return Err(Error::InvalidHashLen(hash.len()));
        }
        if size_bytes < 0 {
            return Err(Error::InvalidSize(size_bytes));
        }

        Ok(Self {
            instance_name: instance_name.into(),
            hash,
            size_bytes,
        })
    }

    /// Combines an instance name with a partial digest, as found inside
    /// [proto::Directory] and friends, into a fully qualified [Digest].
    pub fn from_partial(
        instance_name: &str,
        partial: Option<&proto::Digest>,
    ) -> Result<Self, Error> {
        let partial = partial.ok_or(Error::Missing)?;
        Self::new(instance_name, partial.hash.clone(), partial.size_bytes)
    }

    /// Resolves a partial digest referenced from the object this digest
    /// points to. The child inherits the instance name.
    pub fn derive_child(&self, partial: Option<&proto::Digest>) -> Result<Self, Error> {
        Self::from_partial(&self.instance_name, partial)
    }

    /// Computes the digest of the given contents, using the same instance
    /// name and digest function as self.
    pub fn digest_contents(&self, data: &[u8]) -> Self {
        Self {
            instance_name: self.instance_name.clone(),
            hash: self.function().hash_hex(data),
            size_bytes: data.len() as i64,
        }
    }

    pub fn instance_name(&self) -> &str {
        &self.instance_name
    }

    pub fn hash(&self) -> &str {
        &self.hash
    }

    pub fn size_bytes(&self) -> i64 {
        self.size_bytes
    }

    pub fn function(&self) -> DigestFunction {
        // the hash length got validated on construction.
        DigestFunction::from_hash_len(self.hash.len()).unwrap_or(DigestFunction::Sha256)
    }

    pub fn key(&self) -> DigestKey {
        DigestKey {
            hash: self.hash.clone(),
            size_bytes: self.size_bytes,
        }
    }

    pub fn to_partial(&self) -> proto::Digest {
        proto::Digest {
            hash: self.hash.clone(),
            size_bytes: self.size_bytes,
        }
    }
}

impl std::fmt::Display for Digest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}-{}", self.hash, self.size_bytes, self.instance_name)
    }
}

impl std::fmt::Debug for Digest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}-{}", self.hash, self.size_bytes, self.instance_name)
    }
}
