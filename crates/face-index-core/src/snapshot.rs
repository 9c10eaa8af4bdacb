//! Versioned binary snapshot of the index.
//!
//! The vectors and the id table travel in one envelope so they can only ever
//! be written or read together:
//!
//! ```text
//! offset  size            field
//! 0       4               magic "FVIX"
//! 4       4               version (u32)
//! 8       4               flags (u32, reserved)
//! 12      4               dimension (u32)
//! 16      8               count (u64)
//! 24      8               updated_at, Unix millis (u64)
//! 32      count*dim*4     vectors (f32), position order
//! ..      count*8         profile ids (i64), position order
//! ..      4               crc32 of everything above
//! ```
//!
//! All integers and floats are little-endian.

use std::collections::HashSet;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::error::SnapshotError;
use crate::ProfileId;

/// Magic bytes identifying a snapshot.
pub const MAGIC: [u8; 4] = *b"FVIX";

/// Current envelope version.
pub const CURRENT_VERSION: u32 = 1;

const HEADER_LEN: usize = 32;
const CHECKSUM_LEN: usize = 4;

/// Decoded snapshot contents.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub dimension: usize,
    /// Unix timestamp in milliseconds of the last save.
    pub updated_at_ms: u64,
    /// `count * dimension` unit-vector components, position order.
    pub vectors: Vec<f32>,
    /// Profile id at each position.
    pub ids: Vec<ProfileId>,
}

impl Snapshot {
    pub fn count(&self) -> usize {
        self.ids.len()
    }

    /// Vector stored at `position`.
    pub fn vector(&self, position: usize) -> &[f32] {
        let start = position * self.dimension;
        &self.vectors[start..start + self.dimension]
    }

    /// `updated_at_ms` as a [`SystemTime`].
    pub fn updated_at(&self) -> SystemTime {
        UNIX_EPOCH + Duration::from_millis(self.updated_at_ms)
    }

    /// Serialize into the envelope format.
    pub fn encode(&self) -> Result<Vec<u8>, SnapshotError> {
        let dimension = u32::try_from(self.dimension).map_err(|_| SnapshotError::HeaderOverflow {
            field: "dimension",
            value: self.dimension,
        })?;
        let count = u64::try_from(self.ids.len()).map_err(|_| SnapshotError::HeaderOverflow {
            field: "count",
            value: self.ids.len(),
        })?;
        if self.vectors.len() != self.ids.len() * self.dimension {
            return Err(SnapshotError::LengthMismatch {
                expected: self.ids.len() * self.dimension,
                actual: self.vectors.len(),
            });
        }

        let body_len = self.vectors.len() * 4 + self.ids.len() * 8;
        let mut out = Vec::with_capacity(HEADER_LEN + body_len + CHECKSUM_LEN);

        out.extend_from_slice(&MAGIC);
        out.extend_from_slice(&CURRENT_VERSION.to_le_bytes());
        out.extend_from_slice(&0u32.to_le_bytes());
        out.extend_from_slice(&dimension.to_le_bytes());
        out.extend_from_slice(&count.to_le_bytes());
        out.extend_from_slice(&self.updated_at_ms.to_le_bytes());

        for v in &self.vectors {
            out.extend_from_slice(&v.to_le_bytes());
        }
        for id in &self.ids {
            out.extend_from_slice(&id.0.to_le_bytes());
        }

        let checksum = crc32fast::hash(&out);
        out.extend_from_slice(&checksum.to_le_bytes());
        Ok(out)
    }

    /// Parse and validate an envelope.
    pub fn decode(bytes: &[u8]) -> Result<Self, SnapshotError> {
        if bytes.len() < HEADER_LEN + CHECKSUM_LEN {
            return Err(SnapshotError::Truncated {
                needed: HEADER_LEN + CHECKSUM_LEN,
                available: bytes.len(),
            });
        }
        if bytes[0..4] != MAGIC {
            return Err(SnapshotError::InvalidMagic);
        }
        let version = read_u32(bytes, 4);
        if version != CURRENT_VERSION {
            return Err(SnapshotError::UnsupportedVersion(version));
        }

        let dimension = read_u32(bytes, 12) as usize;
        let count = read_u64(bytes, 16) as usize;
        let updated_at_ms = read_u64(bytes, 24);

        let expected = count
            .checked_mul(dimension)
            .and_then(|n| n.checked_mul(4))
            .and_then(|n| n.checked_add(count.checked_mul(8)?))
            .and_then(|n| n.checked_add(HEADER_LEN + CHECKSUM_LEN))
            .ok_or(SnapshotError::LengthMismatch {
                expected: usize::MAX,
                actual: bytes.len(),
            })?;
        if bytes.len() != expected {
            return Err(SnapshotError::LengthMismatch {
                expected,
                actual: bytes.len(),
            });
        }

        let payload_end = bytes.len() - CHECKSUM_LEN;
        let stored = read_u32(bytes, payload_end);
        let computed = crc32fast::hash(&bytes[..payload_end]);
        if stored != computed {
            return Err(SnapshotError::ChecksumMismatch { stored, computed });
        }

        let ids_start = HEADER_LEN + count * dimension * 4;
        let vectors = bytes[HEADER_LEN..ids_start]
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();

        let mut seen = HashSet::with_capacity(count);
        let mut ids = Vec::with_capacity(count);
        for chunk in bytes[ids_start..payload_end].chunks_exact(8) {
            let mut raw = [0u8; 8];
            raw.copy_from_slice(chunk);
            let id = ProfileId(i64::from_le_bytes(raw));
            if !seen.insert(id) {
                return Err(SnapshotError::DuplicateIdentity(id));
            }
            ids.push(id);
        }

        Ok(Self {
            dimension,
            updated_at_ms,
            vectors,
            ids,
        })
    }
}

/// Current time as Unix milliseconds.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

fn read_u32(bytes: &[u8], at: usize) -> u32 {
    let mut raw = [0u8; 4];
    raw.copy_from_slice(&bytes[at..at + 4]);
    u32::from_le_bytes(raw)
}

fn read_u64(bytes: &[u8], at: usize) -> u64 {
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&bytes[at..at + 8]);
    u64::from_le_bytes(raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Snapshot {
        Snapshot {
            dimension: 2,
            updated_at_ms: 1_700_000_000_000,
            vectors: vec![1.0, 0.0, 0.0, 1.0, 0.6, 0.8],
            ids: vec![ProfileId(3), ProfileId(-1), ProfileId(42)],
        }
    }

    #[test]
    fn test_encode_layout() {
        let bytes = sample().encode().unwrap();
        assert_eq!(&bytes[0..4], b"FVIX");
        assert_eq!(bytes.len(), 32 + 6 * 4 + 3 * 8 + 4);
    }

    #[test]
    fn test_decode_restores_contents() {
        let snap = sample();
        let decoded = Snapshot::decode(&snap.encode().unwrap()).unwrap();
        assert_eq!(decoded, snap);
        assert_eq!(decoded.vector(2), &[0.6, 0.8]);
    }

    #[test]
    fn test_empty_snapshot() {
        let snap = Snapshot {
            dimension: 512,
            updated_at_ms: 0,
            vectors: Vec::new(),
            ids: Vec::new(),
        };
        let decoded = Snapshot::decode(&snap.encode().unwrap()).unwrap();
        assert_eq!(decoded.count(), 0);
        assert_eq!(decoded.dimension, 512);
    }

    #[cfg(target_pointer_width = "64")]
    #[test]
    fn test_encode_rejects_oversized_dimension() {
        let snap = Snapshot {
            dimension: u32::MAX as usize + 1,
            updated_at_ms: 0,
            vectors: Vec::new(),
            ids: Vec::new(),
        };
        assert!(matches!(
            snap.encode(),
            Err(SnapshotError::HeaderOverflow { field: "dimension", .. })
        ));
    }

    #[test]
    fn test_encode_rejects_ragged_vectors() {
        let mut snap = sample();
        snap.vectors.pop();
        assert!(matches!(
            snap.encode(),
            Err(SnapshotError::LengthMismatch { expected: 6, actual: 5 })
        ));
    }

    #[test]
    fn test_decode_rejects_bad_magic() {
        let mut bytes = sample().encode().unwrap();
        bytes[0] = b'X';
        assert_eq!(Snapshot::decode(&bytes), Err(SnapshotError::InvalidMagic));
    }

    #[test]
    fn test_decode_rejects_future_version() {
        let mut bytes = sample().encode().unwrap();
        bytes[4..8].copy_from_slice(&7u32.to_le_bytes());
        assert_eq!(
            Snapshot::decode(&bytes),
            Err(SnapshotError::UnsupportedVersion(7))
        );
    }

    #[test]
    fn test_decode_rejects_truncation() {
        let bytes = sample().encode().unwrap();
        let err = Snapshot::decode(&bytes[..bytes.len() - 9]).unwrap_err();
        assert!(matches!(err, SnapshotError::LengthMismatch { .. }));

        let err = Snapshot::decode(&bytes[..10]).unwrap_err();
        assert!(matches!(err, SnapshotError::Truncated { .. }));
    }

    #[test]
    fn test_decode_rejects_flipped_bit() {
        let mut bytes = sample().encode().unwrap();
        bytes[40] ^= 0x01;
        assert!(matches!(
            Snapshot::decode(&bytes),
            Err(SnapshotError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn test_decode_rejects_repeated_id() {
        let mut snap = sample();
        snap.ids[2] = ProfileId(3);
        assert_eq!(
            Snapshot::decode(&snap.encode().unwrap()),
            Err(SnapshotError::DuplicateIdentity(ProfileId(3)))
        );
    }
}
