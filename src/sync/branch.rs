//! Temp branch naming - a suspended session stored in a branch name
//!
//! `tmp-sync-<B(to)>-<B(from)>-<nonce>` where `B` is unpadded base32 over
//! the alphabet `a-z2-7`. That alphabet never produces `-`, so the fields
//! split back apart however the branch names were spelled.

use crate::{Error, Result};
use data_encoding::BASE32_NOPAD;
use uuid::Uuid;

/// Prefix every temp branch name starts with
pub const TEMP_BRANCH_PREFIX: &str = "tmp-sync-";

const FIELD_SEPARATOR: char = '-';

/// A temp branch together with the pair it was created for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TempBranch {
    /// Full branch name
    pub name: String,
    /// Target (integration) branch
    pub to: String,
    /// Source (feature) branch
    pub from: String,
}

impl TempBranch {
    /// Name a new temp branch for syncing `from` into `to`
    pub fn new(to: &str, from: &str) -> Self {
        Self::with_nonce(to, from, &new_nonce())
    }

    pub fn with_nonce(to: &str, from: &str, nonce: &str) -> Self {
        Self {
            name: encode(to, from, nonce),
            to: to.to_string(),
            from: from.to_string(),
        }
    }

    /// Recover the pair from a branch name left behind by a suspended run
    pub fn parse(name: &str) -> Result<Self> {
        let (to, from) = decode(name)?;
        Ok(Self {
            name: name.to_string(),
            to,
            from,
        })
    }

    /// Whether `name` looks like a temp branch at all
    pub fn is_temp_branch(name: &str) -> bool {
        name.starts_with(TEMP_BRANCH_PREFIX)
    }
}

/// Pack `(to, from, nonce)` into a branch name.
pub fn encode(to: &str, from: &str, nonce: &str) -> String {
    format!(
        "{}{}{sep}{}{sep}{}",
        TEMP_BRANCH_PREFIX,
        b32_encode(to),
        b32_encode(from),
        nonce,
        sep = FIELD_SEPARATOR
    )
}

/// Unpack `(to, from)` from a branch name; the nonce is ignored.
pub fn decode(name: &str) -> Result<(String, String)> {
    let invalid = |reason: &str| Error::InvalidTempBranch {
        name: name.to_string(),
        reason: reason.to_string(),
    };

    let rest = name
        .strip_prefix(TEMP_BRANCH_PREFIX)
        .ok_or_else(|| invalid("missing tmp-sync- prefix"))?;

    let mut fields = rest.split(FIELD_SEPARATOR);
    let (Some(to), Some(from)) = (fields.next(), fields.next()) else {
        return Err(invalid("expected <to>-<from>-<nonce>"));
    };

    let to = b32_decode(to).map_err(|e| invalid(&format!("target field: {}", e)))?;
    let from = b32_decode(from).map_err(|e| invalid(&format!("source field: {}", e)))?;
    Ok((to, from))
}

/// Random 128-bit nonce, hex, never containing the separator
pub fn new_nonce() -> String {
    Uuid::new_v4().simple().to_string()
}

fn b32_encode(text: &str) -> String {
    BASE32_NOPAD.encode(text.as_bytes()).to_ascii_lowercase()
}

fn b32_decode(field: &str) -> std::result::Result<String, String> {
    if !field
        .bytes()
        .all(|b| b.is_ascii_lowercase() || (b'2'..=b'7').contains(&b))
    {
        return Err(format!("{:?} is not lowercase base32", field));
    }
    let bytes = BASE32_NOPAD
        .decode(field.to_ascii_uppercase().as_bytes())
        .map_err(|e| e.to_string())?;
    String::from_utf8(bytes).map_err(|e| e.to_string())
}
