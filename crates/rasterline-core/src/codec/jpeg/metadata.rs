//! EXIF metadata carried in `APP1` segments.

use exif::{In, Reader, Tag};
use tracing::warn;

use crate::transform::Orientation;

/// Identifier at the start of an EXIF `APP1` payload.
pub const EXIF_HEADER: &[u8; 6] = b"Exif\0\0";

/// Read the orientation tag from an `APP1` payload.
///
/// Returns `None` when the segment isn't EXIF, the TIFF structure doesn't
/// parse, or the tag is missing.
pub fn orientation_from_app1(payload: &[u8]) -> Option<Orientation> {
    let tiff = payload.strip_prefix(EXIF_HEADER)?;

    let exif = match Reader::new().read_raw(tiff.to_vec()) {
        Ok(exif) => exif,
        Err(e) => {
            warn!(error = %e, "Ignoring unparsable EXIF segment");
            return None;
        }
    };

    let field = exif.get_field(Tag::Orientation, In::PRIMARY)?;
    field.value.get_uint(0).map(Orientation::from)
}

/// Build a minimal big-endian TIFF `APP1` payload carrying one orientation tag.
#[cfg(test)]
pub(crate) fn orientation_payload(code: u16) -> Vec<u8> {
    let mut p = EXIF_HEADER.to_vec();
    p.extend_from_slice(b"MM\0\x2A");
    p.extend_from_slice(&8u32.to_be_bytes()); // IFD0 offset
    p.extend_from_slice(&1u16.to_be_bytes()); // entry count
    p.extend_from_slice(&0x0112u16.to_be_bytes()); // Orientation
    p.extend_from_slice(&3u16.to_be_bytes()); // SHORT
    p.extend_from_slice(&1u32.to_be_bytes()); // count
    p.extend_from_slice(&code.to_be_bytes());
    p.extend_from_slice(&[0, 0]);
    p.extend_from_slice(&0u32.to_be_bytes()); // next IFD
    p
}
