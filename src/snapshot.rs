//! Snapshot codec - restart state as a tag-versioned binary blob
//!
//! Layout: `RGSNAP` magic, u32 format version, a sequence of
//! `(tag: u16, flags: u8, len: u64, payload)` sections with bincode
//! payloads, and a CRC-64/ECMA-182 trailer over everything before it.
//!
//! Forward compatibility: readers skip unknown sections unless the
//! required flag is set; an unknown required section fails the restore.
//! Rolling-window counters are volatile and never serialized; they
//! re-warm naturally after a restart.

use crate::daily::DailyEntry;
use crate::error::SnapshotError;
use crate::latch::LatchEntry;
use crc::{CRC_64_ECMA_182, Crc};
use serde::{Serialize, de::DeserializeOwned};

const MAGIC: &[u8; 6] = b"RGSNAP";
const FORMAT_VERSION: u32 = 1;

const CRC64: Crc<u64> = Crc::<u64>::new(&CRC_64_ECMA_182);

/// Section flag bit: restore must fail if the reader does not know the tag.
const FLAG_REQUIRED: u8 = 0b0000_0001;

/// Section tags.
pub const TAG_CATALOG: u16 = 1;
pub const TAG_DAILY: u16 = 2;
pub const TAG_LATCHES: u16 = 3;

type CatalogMaps = (Vec<(String, String)>, Vec<(String, String)>);

/// Fully-decoded snapshot, staged before any engine state is touched.
#[derive(Debug, Default, PartialEq)]
pub struct DecodedSnapshot {
    /// Optional section: absent in blobs written by catalog-less writers.
    pub catalog: Option<CatalogMaps>,
    pub daily: Vec<DailyEntry>,
    pub latches: Vec<LatchEntry>,
}

// ============================================================
// ENCODE
// ============================================================

fn push_section<T: Serialize>(
    out: &mut Vec<u8>,
    tag: u16,
    flags: u8,
    payload: &T,
) -> Result<(), SnapshotError> {
    let bytes = bincode::serialize(payload).map_err(|e| SnapshotError::Encode {
        tag,
        msg: e.to_string(),
    })?;
    out.extend_from_slice(&tag.to_le_bytes());
    out.push(flags);
    out.extend_from_slice(&(bytes.len() as u64).to_le_bytes());
    out.extend_from_slice(&bytes);
    Ok(())
}

/// Serialize engine state into a self-checking blob.
pub fn encode(
    catalog: &crate::catalog::InstrumentCatalog,
    daily: &[DailyEntry],
    latches: &[LatchEntry],
) -> Result<Vec<u8>, SnapshotError> {
    let mut out = Vec::with_capacity(64 + daily.len() * 64);
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&FORMAT_VERSION.to_le_bytes());

    push_section(&mut out, TAG_CATALOG, 0, &catalog.export())?;
    push_section(&mut out, TAG_DAILY, FLAG_REQUIRED, &daily.to_vec())?;
    push_section(&mut out, TAG_LATCHES, FLAG_REQUIRED, &latches.to_vec())?;

    let checksum = CRC64.checksum(&out);
    out.extend_from_slice(&checksum.to_le_bytes());
    Ok(out)
}

// ============================================================
// DECODE
// ============================================================

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8], SnapshotError> {
        let remaining = self.bytes.len() - self.pos;
        if remaining < n {
            return Err(SnapshotError::Truncated {
                needed: n,
                remaining,
            });
        }
        let slice = &self.bytes[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn u16(&mut self) -> Result<u16, SnapshotError> {
        let b = self.take(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    fn u32(&mut self) -> Result<u32, SnapshotError> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn u64(&mut self) -> Result<u64, SnapshotError> {
        let b = self.take(8)?;
        Ok(u64::from_le_bytes([
            b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7],
        ]))
    }

    fn done(&self) -> bool {
        self.pos >= self.bytes.len()
    }
}

fn decode_payload<T: DeserializeOwned>(tag: u16, bytes: &[u8]) -> Result<T, SnapshotError> {
    bincode::deserialize(bytes).map_err(|e| SnapshotError::Decode {
        tag,
        msg: e.to_string(),
    })
}

/// Parse and verify a snapshot blob. Nothing is applied here; the caller
/// applies the staged result, which is what makes restore atomic.
pub fn decode(bytes: &[u8]) -> Result<DecodedSnapshot, SnapshotError> {
    // Trailer first: nothing else is trustworthy before the checksum passes
    if bytes.len() < MAGIC.len() + 4 + 8 {
        return Err(SnapshotError::Truncated {
            needed: MAGIC.len() + 4 + 8,
            remaining: bytes.len(),
        });
    }
    let (body, trailer) = bytes.split_at(bytes.len() - 8);
    let expected = u64::from_le_bytes([
        trailer[0], trailer[1], trailer[2], trailer[3], trailer[4], trailer[5], trailer[6],
        trailer[7],
    ]);
    let actual = CRC64.checksum(body);
    if expected != actual {
        return Err(SnapshotError::ChecksumMismatch { expected, actual });
    }

    let mut reader = Reader { bytes: body, pos: 0 };
    if reader.take(MAGIC.len())? != MAGIC {
        return Err(SnapshotError::BadMagic);
    }
    let version = reader.u32()?;
    if version != FORMAT_VERSION {
        return Err(SnapshotError::BadVersion(version));
    }

    let mut decoded = DecodedSnapshot::default();
    while !reader.done() {
        let tag = reader.u16()?;
        let flags = reader.take(1)?[0];
        let len = reader.u64()? as usize;
        let payload = reader.take(len)?;
        match tag {
            TAG_CATALOG => decoded.catalog = Some(decode_payload(tag, payload)?),
            TAG_DAILY => decoded.daily = decode_payload(tag, payload)?,
            TAG_LATCHES => decoded.latches = decode_payload(tag, payload)?,
            unknown if flags & FLAG_REQUIRED != 0 => {
                return Err(SnapshotError::UnknownRequiredTag(unknown));
            }
            _ => {} // unknown optional section: skip
        }
    }
    Ok(decoded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::ActionFamily;
    use crate::catalog::InstrumentCatalog;
    use crate::dimension::DimensionKey;
    use crate::latch::LatchState;
    use crate::metric::Metric;

    fn sample_catalog() -> InstrumentCatalog {
        InstrumentCatalog::new(
            [("T2303".to_string(), "T10Y".to_string())],
            [("T2303".to_string(), "CFFEX".to_string())],
        )
    }

    fn sample_daily() -> Vec<DailyEntry> {
        vec![DailyEntry {
            key: DimensionKey {
                account_id: Some("A".into()),
                ..Default::default()
            },
            day: 19_675,
            metric: Metric::TradeVolume,
            value: 1050.0,
        }]
    }

    fn sample_latches() -> Vec<LatchEntry> {
        vec![LatchEntry {
            subject: "A".into(),
            family: ActionFamily::AccountTrading,
            state: LatchState::Suspended,
        }]
    }

    #[test]
    fn test_roundtrip() {
        let blob = encode(&sample_catalog(), &sample_daily(), &sample_latches()).unwrap();
        let decoded = decode(&blob).unwrap();

        let (products, exchanges) = decoded.catalog.unwrap();
        assert_eq!(products, vec![("T2303".to_string(), "T10Y".to_string())]);
        assert_eq!(exchanges, vec![("T2303".to_string(), "CFFEX".to_string())]);
        assert_eq!(decoded.daily, sample_daily());
        assert_eq!(decoded.latches, sample_latches());
    }

    #[test]
    fn test_checksum_mismatch_detected() {
        let mut blob = encode(&sample_catalog(), &sample_daily(), &sample_latches()).unwrap();
        let mid = blob.len() / 2;
        blob[mid] ^= 0xFF;
        assert!(matches!(
            decode(&blob),
            Err(SnapshotError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn test_truncated_blob() {
        let blob = encode(&sample_catalog(), &sample_daily(), &sample_latches()).unwrap();
        assert!(matches!(
            decode(&blob[..10]),
            Err(SnapshotError::ChecksumMismatch { .. }) | Err(SnapshotError::Truncated { .. })
        ));
        assert!(matches!(
            decode(&[]),
            Err(SnapshotError::Truncated { .. })
        ));
    }

    #[test]
    fn test_bad_magic_and_version() {
        let reseal = |mut body: Vec<u8>| {
            let checksum = CRC64.checksum(&body);
            body.extend_from_slice(&checksum.to_le_bytes());
            body
        };

        let blob = encode(&sample_catalog(), &[], &[]).unwrap();
        let mut body = blob[..blob.len() - 8].to_vec();
        body[0] = b'X';
        assert_eq!(decode(&reseal(body)), Err(SnapshotError::BadMagic));

        let mut body = blob[..blob.len() - 8].to_vec();
        body[6] = 99; // version LE low byte
        assert_eq!(decode(&reseal(body)), Err(SnapshotError::BadVersion(99)));
    }

    #[test]
    fn test_unknown_optional_section_skipped() {
        let blob = encode(&sample_catalog(), &sample_daily(), &sample_latches()).unwrap();
        let mut body = blob[..blob.len() - 8].to_vec();
        // Append an unknown optional section
        body.extend_from_slice(&999u16.to_le_bytes());
        body.push(0);
        body.extend_from_slice(&3u64.to_le_bytes());
        body.extend_from_slice(b"xyz");
        let checksum = CRC64.checksum(&body);
        body.extend_from_slice(&checksum.to_le_bytes());

        let decoded = decode(&body).unwrap();
        assert_eq!(decoded.daily, sample_daily());
    }

    #[test]
    fn test_unknown_required_section_fails() {
        let blob = encode(&sample_catalog(), &sample_daily(), &sample_latches()).unwrap();
        let mut body = blob[..blob.len() - 8].to_vec();
        body.extend_from_slice(&999u16.to_le_bytes());
        body.push(FLAG_REQUIRED);
        body.extend_from_slice(&0u64.to_le_bytes());
        let checksum = CRC64.checksum(&body);
        body.extend_from_slice(&checksum.to_le_bytes());

        assert_eq!(decode(&body), Err(SnapshotError::UnknownRequiredTag(999)));
    }
}
