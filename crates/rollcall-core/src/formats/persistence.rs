//! Binary roster snapshots.
//!
//! Layout: 4-byte magic, 1-byte format version, 1-byte flags, an optional
//! 32-byte BLAKE3 checksum of the payload (flag 0x01, written only with the
//! `crypto-hash` feature), then the postcard-encoded roster. Rosters are
//! `BTreeMap`-backed, so identical rosters always produce identical bytes.

use crate::roster::Roster;
use thiserror::Error;

/// Snapshot file magic.
pub const SNAPSHOT_MAGIC: [u8; 4] = *b"RCAL";

/// Current snapshot format version.
pub const SNAPSHOT_VERSION: u8 = 1;

/// Flag bit: a 32-byte checksum follows the header.
pub const FLAG_CHECKSUM: u8 = 0x01;

const HEADER_LEN: usize = 6;
const CHECKSUM_LEN: usize = 32;

/// Snapshot encoding and decoding failures.
#[derive(Debug, Error)]
pub enum FormatError {
    /// The input does not start with the snapshot magic.
    #[error("not a roster snapshot (bad magic)")]
    BadMagic,

    /// The snapshot was written by an unknown format version.
    #[error("unsupported snapshot version {0}")]
    UnsupportedVersion(u8),

    /// The input ended before the declared header or checksum.
    #[error("snapshot truncated")]
    Truncated,

    /// The payload does not match its checksum.
    #[error("snapshot checksum mismatch")]
    ChecksumMismatch,

    /// Postcard (de)serialization failed.
    #[error("codec error: {0}")]
    Codec(#[from] postcard::Error),
}

/// Serialize a roster into the canonical snapshot format.
pub fn export_snapshot(roster: &Roster) -> Result<Vec<u8>, FormatError> {
    let payload = postcard::to_stdvec(roster)?;

    let mut out = Vec::with_capacity(HEADER_LEN + payload.len());
    out.extend_from_slice(&SNAPSHOT_MAGIC);
    out.push(SNAPSHOT_VERSION);

    #[cfg(feature = "crypto-hash")]
    {
        out.push(FLAG_CHECKSUM);
        out.extend_from_slice(blake3::hash(&payload).as_bytes());
    }
    #[cfg(not(feature = "crypto-hash"))]
    {
        out.push(0);
    }

    out.extend_from_slice(&payload);
    Ok(out)
}

/// Decode a snapshot produced by [`export_snapshot`].
///
/// A checksum is verified only when the `crypto-hash` feature is enabled;
/// otherwise it is skipped over.
pub fn import_snapshot(bytes: &[u8]) -> Result<Roster, FormatError> {
    if bytes.len() < HEADER_LEN {
        return Err(FormatError::Truncated);
    }
    if bytes[..4] != SNAPSHOT_MAGIC {
        return Err(FormatError::BadMagic);
    }
    let version = bytes[4];
    if version != SNAPSHOT_VERSION {
        return Err(FormatError::UnsupportedVersion(version));
    }
    let flags = bytes[5];

    let (checksum, payload) = if flags & FLAG_CHECKSUM != 0 {
        if bytes.len() < HEADER_LEN + CHECKSUM_LEN {
            return Err(FormatError::Truncated);
        }
        let (sum, rest) = bytes[HEADER_LEN..].split_at(CHECKSUM_LEN);
        (Some(sum), rest)
    } else {
        (None, &bytes[HEADER_LEN..])
    };

    #[cfg(feature = "crypto-hash")]
    if let Some(expected) = checksum {
        if blake3::hash(payload).as_bytes() != expected {
            return Err(FormatError::ChecksumMismatch);
        }
    }
    #[cfg(not(feature = "crypto-hash"))]
    let _ = checksum;

    Ok(postcard::from_bytes(payload)?)
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitives::TenantId;

    #[test]
    fn snapshot_roundtrip() {
        let mut roster = Roster::with_builtin_directory();
        let _ = roster.begin_wizard(TenantId(1));

        let bytes = export_snapshot(&roster);
        assert!(bytes.is_ok());
        if let Ok(bytes) = bytes {
            let restored = import_snapshot(&bytes);
            assert!(restored.is_ok());
            assert_eq!(restored.ok().as_ref(), Some(&roster));
        }
    }

    #[test]
    fn snapshot_is_deterministic() {
        let roster = Roster::with_builtin_directory();
        let first = export_snapshot(&roster);
        let second = export_snapshot(&roster);
        assert!(first.is_ok() && second.is_ok());
        assert_eq!(first.ok(), second.ok());
    }

    #[test]
    fn bad_magic_is_rejected() {
        let result = import_snapshot(b"NOPE\x01\x00rest");
        assert!(matches!(result, Err(FormatError::BadMagic)));
    }

    #[test]
    fn unknown_version_is_rejected() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&SNAPSHOT_MAGIC);
        bytes.push(99);
        bytes.push(0);
        let result = import_snapshot(&bytes);
        assert!(matches!(result, Err(FormatError::UnsupportedVersion(99))));
    }

    #[test]
    fn truncated_input_is_rejected() {
        assert!(matches!(
            import_snapshot(b"RC"),
            Err(FormatError::Truncated)
        ));
    }

    #[test]
    fn garbage_payload_is_a_codec_error() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&SNAPSHOT_MAGIC);
        bytes.push(SNAPSHOT_VERSION);
        bytes.push(0);
        bytes.extend_from_slice(&[0xFF; 3]);
        let result = import_snapshot(&bytes);
        assert!(matches!(result, Err(FormatError::Codec(_))));
    }

    #[cfg(feature = "crypto-hash")]
    #[test]
    fn corrupted_payload_fails_checksum() {
        let roster = Roster::with_builtin_directory();
        let bytes = export_snapshot(&roster);
        assert!(bytes.is_ok());
        if let Ok(mut bytes) = bytes {
            let last = bytes.len() - 1;
            bytes[last] ^= 0xFF;
            assert!(matches!(
                import_snapshot(&bytes),
                Err(FormatError::ChecksumMismatch)
            ));
        }
    }
}
