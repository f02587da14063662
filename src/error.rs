//! Root-cause error taxonomy.
//!
//! Every failure in the state machine wraps one of the registered
//! [`RootCause`]s. The root cause decides the numeric code reported to
//! clients; wrapping layers only add context to the description.

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

/// Message returned to clients in place of any internal-class description.
pub const INTERNAL_LOG: &str = "internal error";

/// An immutable `(code, description)` pair that classifies errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RootCause {
    code: u32,
    desc: &'static str,
}

impl RootCause {
    const fn builtin(code: u32, desc: &'static str) -> Self {
        Self { code, desc }
    }

    pub fn code(&self) -> u32 {
        self.code
    }

    pub fn description(&self) -> &'static str {
        self.desc
    }

    /// Shorthand for `wrap(root, description)`.
    pub fn new_error(self, description: impl Into<String>) -> Error {
        wrap(self, description)
    }

    /// Returns true when `err` belongs to this class.
    pub fn is(self, err: &Error) -> bool {
        same_class(&Error::Root(self), err)
    }
}

impl fmt::Display for RootCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.desc)
    }
}

pub const INTERNAL: RootCause = RootCause::builtin(0, "internal");
pub const UNAUTHORIZED: RootCause = RootCause::builtin(1, "unauthorized");
pub const NOT_FOUND: RootCause = RootCause::builtin(2, "not found");
pub const INVALID_MSG: RootCause = RootCause::builtin(3, "invalid message");
pub const INVALID_MODEL: RootCause = RootCause::builtin(4, "invalid model");
/// Generalization of [`INVALID_MSG`] and [`INVALID_MODEL`].
pub const INVALID_VALUE: RootCause = RootCause::builtin(5, "invalid value");
pub const UNKNOWN_TX_TYPE: RootCause = RootCause::builtin(6, "unknown transaction type");

pub const MISSING_CONDITION: RootCause = RootCause::builtin(1001, "missing condition");
pub const INVALID_CONDITION: RootCause = RootCause::builtin(1002, "invalid condition");
pub const INVALID_SIGNATURE: RootCause = RootCause::builtin(1003, "invalid signature");
pub const INVALID_AMOUNT: RootCause = RootCause::builtin(1004, "invalid amount");
pub const NOT_ALLOWED: RootCause = RootCause::builtin(1005, "not allowed");
pub const INVALID_CHAIN_ID: RootCause = RootCause::builtin(1006, "invalid chain id");

const BUILTIN: [RootCause; 13] = [
    INTERNAL,
    UNAUTHORIZED,
    NOT_FOUND,
    INVALID_MSG,
    INVALID_MODEL,
    INVALID_VALUE,
    UNKNOWN_TX_TYPE,
    MISSING_CONDITION,
    INVALID_CONDITION,
    INVALID_SIGNATURE,
    INVALID_AMOUNT,
    NOT_ALLOWED,
    INVALID_CHAIN_ID,
];

static USED_CODES: Lazy<Mutex<HashMap<u32, &'static str>>> = Lazy::new(|| {
    let mut used = HashMap::with_capacity(BUILTIN.len());
    for root in BUILTIN {
        if let Some(previous) = used.insert(root.code, root.desc) {
            panic!(
                "error with code {} is already registered: {:?}",
                root.code, previous
            );
        }
    }
    Mutex::new(used)
});

/// Registers a new root cause.
///
/// Call only while the process starts up. A code that is already taken,
/// by a builtin or by an earlier registration, aborts with a panic.
pub fn register(code: u32, description: &'static str) -> RootCause {
    let mut used = USED_CODES.lock();
    if let Some(existing) = used.get(&code) {
        panic!("error with code {code} is already registered: {existing:?}");
    }
    used.insert(code, description);
    RootCause {
        code,
        desc: description,
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("{0}")]
    Root(RootCause),
    #[error("{description}: {cause}")]
    Wrapped {
        description: String,
        #[source]
        cause: Box<Error>,
    },
    /// An error produced outside of this crate. It has no code of its own.
    #[error(transparent)]
    External(Box<dyn std::error::Error + Send + Sync + 'static>),
}

/// Extends `cause` with an additional description.
pub fn wrap(cause: impl Into<Error>, description: impl Into<String>) -> Error {
    Error::Wrapped {
        description: description.into(),
        cause: Box::new(cause.into()),
    }
}

/// Two errors are the same class when neither is internal and both resolve
/// to the same code. The same instance is always its own class.
pub fn same_class(a: &Error, b: &Error) -> bool {
    if std::ptr::eq(a, b) {
        return true;
    }
    match (a.code(), b.code()) {
        (Some(ac), Some(bc)) => ac != INTERNAL.code && ac == bc,
        _ => false,
    }
}

impl Error {
    pub fn wrap(self, description: impl Into<String>) -> Error {
        wrap(self, description)
    }

    /// The code carried by the chain of causes, if any link owns one.
    pub fn code(&self) -> Option<u32> {
        self.root().map(|r| r.code)
    }

    pub fn root(&self) -> Option<RootCause> {
        match self {
            Error::Root(root) => Some(*root),
            Error::Wrapped { cause, .. } => cause.root(),
            Error::External(_) => None,
        }
    }

    /// Code reported across the system boundary.
    pub fn abci_code(&self) -> u32 {
        self.code().unwrap_or(INTERNAL.code)
    }

    /// Message reported across the system boundary.
    pub fn abci_log(&self) -> String {
        if self.abci_code() == INTERNAL.code {
            INTERNAL_LOG.to_string()
        } else {
            self.to_string()
        }
    }

    pub fn is(&self, root: RootCause) -> bool {
        root.is(self)
    }
}

impl From<RootCause> for Error {
    fn from(root: RootCause) -> Self {
        Error::Root(root)
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::External(Box::new(err))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::External(Box::new(err))
    }
}

impl From<csv::Error> for Error {
    fn from(err: csv::Error) -> Self {
        Error::External(Box::new(err))
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::External(Box::new(err))
    }
}

#[cfg(feature = "storage-rocksdb")]
impl From<rocksdb::Error> for Error {
    fn from(err: rocksdb::Error) -> Self {
        Error::External(Box::new(err))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
