use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;
use uuid::Uuid;

/// 128-bit asset identity, assigned by the asset author and immutable for
/// the asset's lifetime.
///
/// The canonical textual form is braced, hyphenated and upper-case
/// (`{AA53D0BE-98A0-42DD-9500-88B375EDC136}`), matching authored
/// descriptors. The flat lower-case hex form names every per-asset file
/// on disk.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AssetId(Uuid);

#[derive(Debug, Error)]
#[error("Invalid asset identifier '{text}': {source}")]
pub struct ParseIdError {
    text: String,
    source: uuid::Error,
}

impl AssetId {
    /// Parse any of the braced, hyphenated or flat hex forms, in either
    /// case.
    pub fn from_canonical_string(text: &str) -> Result<Self, ParseIdError> {
        Uuid::try_parse(text).map(AssetId).map_err(|source| ParseIdError {
            text: text.to_owned(),
            source,
        })
    }

    /// Braced, hyphenated, upper-case form used in authored descriptors.
    pub fn to_canonical_string(&self) -> String {
        format!("{:X}", self.0.braced())
    }

    /// 32 lower-case hex digits with no punctuation; the filename stem for
    /// cache records, task files and deployed artifacts.
    pub fn flat_hex(&self) -> String {
        self.0.simple().to_string()
    }

    pub fn from_u128(value: u128) -> Self {
        AssetId(Uuid::from_u128(value))
    }

    pub fn as_u128(&self) -> u128 {
        self.0.as_u128()
    }

    /// Wire form consumed by the downstream resource-index build: four
    /// 32-bit words in little-endian order, `word0` holding the lowest
    /// 32 bits of the identifier and `word3` the highest. The layout must
    /// be reproduced bit-for-bit.
    pub fn to_wire_words(&self) -> [u32; 4] {
        let value = self.as_u128();
        [
            value as u32,
            (value >> 32) as u32,
            (value >> 64) as u32,
            (value >> 96) as u32,
        ]
    }

    pub fn from_wire_words(words: [u32; 4]) -> Self {
        let value = (words[3] as u128) << 96
            | (words[2] as u128) << 64
            | (words[1] as u128) << 32
            | words[0] as u128;
        AssetId::from_u128(value)
    }

    /// Shard bucket for this identifier, relative to `root`. The bucket is
    /// `<hex[30..32]>/<hex[28..30]>`, so tens of thousands of per-asset
    /// files spread across a 256x256 directory fan-out instead of one
    /// huge flat directory.
    pub fn shard_dir(&self, root: &Path) -> PathBuf {
        let hex = self.flat_hex();
        root.join(&hex[30..32]).join(&hex[28..30])
    }

    /// Shard bucket, created on disk if absent.
    pub fn shard_path(&self, root: &Path) -> std::io::Result<PathBuf> {
        let dir = self.shard_dir(root);
        std::fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    /// Private scratch directory: one level below the shard bucket, named
    /// by the full identifier, so concurrent tasks never share a tmp dir.
    pub fn tmp_path(&self, root: &Path) -> std::io::Result<PathBuf> {
        let dir = self.shard_dir(root).join(self.flat_hex());
        std::fs::create_dir_all(&dir)?;
        Ok(dir)
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_canonical_string())
    }
}

impl fmt::Debug for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AssetId({})", self.to_canonical_string())
    }
}

impl FromStr for AssetId {
    type Err = ParseIdError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        AssetId::from_canonical_string(text)
    }
}

impl Serialize for AssetId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_canonical_string())
    }
}

impl<'de> Deserialize<'de> for AssetId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        AssetId::from_canonical_string(&text).map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CANONICAL: &str = "{AA53D0BE-98A0-42DD-9500-88B375EDC136}";

    #[test]
    fn test_canonical_round_trip() {
        let id = AssetId::from_canonical_string(CANONICAL).unwrap();
        assert_eq!(id.to_canonical_string(), CANONICAL);
    }

    #[test]
    fn test_accepts_unbraced_and_lower_case() {
        let braced = AssetId::from_canonical_string(CANONICAL).unwrap();
        let bare = AssetId::from_canonical_string("aa53d0be-98a0-42dd-9500-88b375edc136").unwrap();
        let flat = AssetId::from_canonical_string("aa53d0be98a042dd950088b375edc136").unwrap();
        assert_eq!(braced, bare);
        assert_eq!(braced, flat);
    }

    #[test]
    fn test_flat_hex_is_lower_case_unpunctuated() {
        let id = AssetId::from_canonical_string(CANONICAL).unwrap();
        assert_eq!(id.flat_hex(), "aa53d0be98a042dd950088b375edc136");
    }

    #[test]
    fn test_wire_words_layout() {
        let id = AssetId::from_canonical_string(CANONICAL).unwrap();
        assert_eq!(
            id.to_wire_words(),
            [0x75EDC136, 0x950088B3, 0x98A042DD, 0xAA53D0BE]
        );
        assert_eq!(AssetId::from_wire_words(id.to_wire_words()), id);
    }

    #[test]
    fn test_shard_dir_uses_trailing_hex_bytes() {
        let id = AssetId::from_canonical_string(CANONICAL).unwrap();
        let dir = id.shard_dir(Path::new("cache"));
        assert_eq!(dir, Path::new("cache").join("36").join("c1"));
    }

    #[test]
    fn test_serde_uses_canonical_string() {
        let id = AssetId::from_canonical_string(CANONICAL).unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{CANONICAL}\""));
        let back: AssetId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }
}
