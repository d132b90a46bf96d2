pub mod media_server;

/// Append one ISO-BMFF box to `buf`.
fn push_box(buf: &mut Vec<u8>, box_type: &[u8; 4], payload: &[u8]) {
    let size = (8 + payload.len()) as u32;
    buf.extend_from_slice(&size.to_be_bytes());
    buf.extend_from_slice(box_type);
    buf.extend_from_slice(payload);
}

/// Build a minimal playable-looking MP4 (ftyp + moov + mdat) of at least
/// `min_len` bytes, so the structural validator accepts it.
pub fn minimal_mp4(min_len: usize) -> Vec<u8> {
    let mut buf = Vec::new();
    push_box(&mut buf, b"ftyp", b"isommp42");
    push_box(&mut buf, b"moov", &[0u8; 16]);
    let pad = min_len.saturating_sub(buf.len() + 8);
    push_box(&mut buf, b"mdat", &vec![0u8; pad]);
    buf
}
