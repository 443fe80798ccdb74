#![forbid(unsafe_code)]

/// Errors produced by sigill.
///
/// The first group is what callers match on. The second group describes
/// the low-level cause and usually travels inside [`Error::Sign`] or is
/// flattened into the message of [`Error::Verification`].
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("library initialization failed: {0}")]
    Init(String),

    #[error("signature context is no longer valid")]
    InvalidContext,

    #[error("invalid node handle: {0}")]
    InvalidNode(String),

    #[error("invalid document: {0}")]
    InvalidDocument(String),

    #[error("failed to load key: {0}")]
    KeyLoad(String),

    #[error("failed to build signature template: {0}")]
    Template(String),

    #[error("failed to add reference: {0}")]
    Reference(String),

    #[error("failed to add transform: {0}")]
    TransformAdd(String),

    #[error("signing failed: {0}")]
    Sign(#[source] Box<Error>),

    #[error("signature verification failed: {0}")]
    Verification(String),

    #[error("node not found: {0}")]
    NodeNotFound(String),

    #[error("denied by security policy: {0}")]
    PolicyDenied(String),

    #[error("XML parsing error: {0}")]
    XmlParse(String),

    #[error("invalid XML structure: {0}")]
    XmlStructure(String),

    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("cryptographic error: {0}")]
    Crypto(String),

    #[error("key error: {0}")]
    Key(String),

    #[error("signature value does not verify: {0}")]
    SignatureInvalid(String),

    #[error("digest mismatch for reference: {0}")]
    DigestMismatch(String),

    #[error("canonicalization error: {0}")]
    Canonicalization(String),

    #[error("transform error: {0}")]
    Transform(String),

    #[error("base64 decode error: {0}")]
    Base64(String),

    #[error("missing required element: {0}")]
    MissingElement(String),

    #[error("missing required attribute: {0}")]
    MissingAttribute(String),

    #[error("invalid URI reference: {0}")]
    InvalidUri(String),

    #[error("certificate error: {0}")]
    Certificate(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// True for outcomes that mean "the signature did not verify".
    ///
    /// Callers that log security events separately from operational
    /// errors should branch on this.
    pub fn is_verification_failure(&self) -> bool {
        matches!(self, Error::Verification(_) | Error::NodeNotFound(_))
    }

    /// Wrap a pipeline failure as a signing error, leaving it alone if it
    /// already is one.
    pub fn into_sign_error(self) -> Error {
        match self {
            Error::Sign(_) => self,
            other => Error::Sign(Box::new(other)),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
