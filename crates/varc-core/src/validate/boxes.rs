//! ISO-BMFF (MP4) structural checks: signature and top-level box walk.

use super::RejectReason;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

/// Box types legal at the start of a playable file. `ftyp` is the normal
/// case; `moov`-first files occur in the wild, `free`/`skip`/`wide` padding
/// occasionally precedes them.
const LEADING_TYPES: [&[u8; 4]; 5] = [b"ftyp", b"moov", b"free", b"skip", b"wide"];

/// Check the leading box header without walking the whole file.
pub fn check_signature(path: &Path) -> Result<(), RejectReason> {
    let mut f = File::open(path).map_err(|_| RejectReason::Missing)?;
    let mut head = [0u8; 8];
    f.read_exact(&mut head).map_err(|_| RejectReason::BadMagic)?;
    let box_type: &[u8] = &head[4..8];
    if LEADING_TYPES.iter().any(|t| &box_type == &t.as_slice()) {
        Ok(())
    } else {
        Err(RejectReason::BadMagic)
    }
}

/// Walk top-level boxes and require both `moov` and `mdat` to be present.
/// Handles 64-bit largesize (size == 1) and to-end-of-file (size == 0)
/// boxes. Best-effort: any structural inconsistency is `Unplayable`.
pub fn check_playable(path: &Path) -> Result<(), RejectReason> {
    let mut f = File::open(path).map_err(|_| RejectReason::Missing)?;
    let file_len = f
        .metadata()
        .map_err(|_| RejectReason::Missing)?
        .len();

    let mut offset = 0u64;
    let mut seen_moov = false;
    let mut seen_mdat = false;

    while offset + 8 <= file_len {
        f.seek(SeekFrom::Start(offset))
            .map_err(|_| RejectReason::Unplayable)?;
        let mut header = [0u8; 8];
        f.read_exact(&mut header)
            .map_err(|_| RejectReason::Unplayable)?;
        let size32 = u32::from_be_bytes([header[0], header[1], header[2], header[3]]);
        let box_type = [header[4], header[5], header[6], header[7]];

        let box_size = match size32 {
            0 => file_len - offset, // box extends to end of file
            1 => {
                let mut large = [0u8; 8];
                f.read_exact(&mut large)
                    .map_err(|_| RejectReason::Unplayable)?;
                let size64 = u64::from_be_bytes(large);
                if size64 < 16 {
                    return Err(RejectReason::Unplayable);
                }
                size64
            }
            s if (s as u64) < 8 => return Err(RejectReason::Unplayable),
            s => s as u64,
        };

        match &box_type {
            b"moov" => seen_moov = true,
            b"mdat" => seen_mdat = true,
            _ => {}
        }
        if seen_moov && seen_mdat {
            return Ok(());
        }

        // A truncated download typically ends with a box size pointing past EOF.
        let next = offset.saturating_add(box_size);
        if next > file_len || next <= offset {
            return Err(RejectReason::Unplayable);
        }
        offset = next;
    }

    if seen_moov && seen_mdat {
        Ok(())
    } else {
        Err(RejectReason::Unplayable)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::Write;

    fn push_box(buf: &mut Vec<u8>, box_type: &[u8; 4], payload: &[u8]) {
        let size = (8 + payload.len()) as u32;
        buf.extend_from_slice(&size.to_be_bytes());
        buf.extend_from_slice(box_type);
        buf.extend_from_slice(payload);
    }

    /// Build a minimal playable-looking MP4: ftyp + moov + mdat, padded so
    /// total size is at least `min_len` bytes.
    pub(crate) fn minimal_mp4(min_len: usize) -> Vec<u8> {
        let mut buf = Vec::new();
        push_box(&mut buf, b"ftyp", b"isommp42");
        push_box(&mut buf, b"moov", &[0u8; 16]);
        let pad = min_len.saturating_sub(buf.len() + 8);
        push_box(&mut buf, b"mdat", &vec![0u8; pad]);
        buf
    }

    fn write_tmp(data: &[u8]) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(data).unwrap();
        f
    }

    #[test]
    fn signature_accepts_ftyp_and_moov_first() {
        let f = write_tmp(&minimal_mp4(64));
        assert!(check_signature(f.path()).is_ok());

        let mut moov_first = Vec::new();
        push_box(&mut moov_first, b"moov", &[0u8; 8]);
        let f2 = write_tmp(&moov_first);
        assert!(check_signature(f2.path()).is_ok());
    }

    #[test]
    fn signature_rejects_html_error_page() {
        let f = write_tmp(b"<html><body>404 Not Found</body></html>");
        assert_eq!(check_signature(f.path()), Err(RejectReason::BadMagic));
    }

    #[test]
    fn playable_requires_moov_and_mdat() {
        let f = write_tmp(&minimal_mp4(128));
        assert!(check_playable(f.path()).is_ok());

        let mut no_mdat = Vec::new();
        push_box(&mut no_mdat, b"ftyp", b"isommp42");
        push_box(&mut no_mdat, b"moov", &[0u8; 16]);
        let f2 = write_tmp(&no_mdat);
        assert_eq!(check_playable(f2.path()), Err(RejectReason::Unplayable));
    }

    #[test]
    fn playable_handles_largesize_boxes() {
        let mut buf = Vec::new();
        push_box(&mut buf, b"ftyp", b"isommp42");
        push_box(&mut buf, b"moov", &[0u8; 16]);
        // 64-bit mdat: size32 == 1, then u64 largesize.
        let payload = [0u8; 32];
        buf.extend_from_slice(&1u32.to_be_bytes());
        buf.extend_from_slice(b"mdat");
        buf.extend_from_slice(&((16 + payload.len()) as u64).to_be_bytes());
        buf.extend_from_slice(&payload);
        let f = write_tmp(&buf);
        assert!(check_playable(f.path()).is_ok());
    }

    #[test]
    fn truncated_box_size_is_unplayable() {
        let mut buf = Vec::new();
        push_box(&mut buf, b"ftyp", b"isommp42");
        // mdat claims 1 MiB but the file ends immediately after the header.
        buf.extend_from_slice(&(1024u32 * 1024).to_be_bytes());
        buf.extend_from_slice(b"mdat");
        let f = write_tmp(&buf);
        assert_eq!(check_playable(f.path()), Err(RejectReason::Unplayable));
    }
}
