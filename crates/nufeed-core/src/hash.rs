//! Package content digests.
//!
//! Feed clients identify package contents by a SHA-512 digest rendered as
//! base64, so that is the canonical textual form here as well.

use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha512};

use crate::error::{ErrorContext, NufeedError};

/// A SHA-512 digest of a package archive.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PackageHash(Vec<u8>);

impl PackageHash {
    /// Digests a stream to EOF.
    pub fn digest<R: Read>(mut reader: R) -> std::io::Result<Self> {
        let mut hasher = Sha512::new();
        let mut buf = [0u8; 8192];
        loop {
            let n = reader.read(&mut buf)?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
        }
        Ok(Self(hasher.finalize().to_vec()))
    }

    /// Digests a file's full contents.
    pub fn digest_file<P: AsRef<Path>>(path: P) -> Result<Self, NufeedError> {
        let path = path.as_ref();
        let file = File::open(path)
            .with_context(|| format!("opening '{}' for hashing", path.display()))?;
        Self::digest(file).with_context(|| format!("hashing '{}'", path.display()))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for PackageHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&BASE64.encode(&self.0))
    }
}

impl FromStr for PackageHash {
    type Err = NufeedError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Ok(Self(BASE64.decode(value)?))
    }
}

impl Serialize for PackageHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for PackageHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        value.parse().map_err(serde::de::Error::custom)
    }
}
