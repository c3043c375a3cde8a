//! Byte-order and signature helpers
//!
//! ICC data is big-endian on the wire. These helpers are the only place
//! where the codec converts between wire and host order.

/// Read a big-endian u16 at `offset`
#[inline]
pub fn read_u16(data: &[u8], offset: usize) -> Option<u16> {
    let bytes = data.get(offset..offset.checked_add(2)?)?;
    Some(u16::from_be_bytes([bytes[0], bytes[1]]))
}

/// Read a big-endian u32 at `offset`
#[inline]
pub fn read_u32(data: &[u8], offset: usize) -> Option<u32> {
    let bytes = data.get(offset..offset.checked_add(4)?)?;
    Some(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

/// Read a big-endian i32 at `offset`
#[inline]
pub fn read_i32(data: &[u8], offset: usize) -> Option<i32> {
    read_u32(data, offset).map(|v| v as i32)
}

/// Read a big-endian u64 at `offset`
#[inline]
pub fn read_u64(data: &[u8], offset: usize) -> Option<u64> {
    let bytes = data.get(offset..offset.checked_add(8)?)?;
    let mut raw = [0u8; 8];
    raw.copy_from_slice(bytes);
    Some(u64::from_be_bytes(raw))
}

/// Write a big-endian u16 at `offset`, returning false when out of range
#[inline]
pub fn write_u16(data: &mut [u8], offset: usize, value: u16) -> bool {
    put(data, offset, &value.to_be_bytes())
}

/// Write a big-endian u32 at `offset`, returning false when out of range
#[inline]
pub fn write_u32(data: &mut [u8], offset: usize, value: u32) -> bool {
    put(data, offset, &value.to_be_bytes())
}

/// Write a big-endian u64 at `offset`, returning false when out of range
#[inline]
pub fn write_u64(data: &mut [u8], offset: usize, value: u64) -> bool {
    put(data, offset, &value.to_be_bytes())
}

fn put(data: &mut [u8], offset: usize, bytes: &[u8]) -> bool {
    match offset
        .checked_add(bytes.len())
        .and_then(|end| data.get_mut(offset..end))
    {
        Some(slot) => {
            slot.copy_from_slice(bytes);
            true
        }
        None => false,
    }
}

/// Append a big-endian u16
#[inline]
pub fn push_u16(out: &mut Vec<u8>, value: u16) {
    out.extend_from_slice(&value.to_be_bytes());
}

/// Append a big-endian u32
#[inline]
pub fn push_u32(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_be_bytes());
}

/// Round up to the next multiple of four
#[inline]
pub const fn align4(n: usize) -> usize {
    (n + 3) & !3
}

/// Pad `out` with zeros to a four byte boundary
pub fn pad4(out: &mut Vec<u8>) {
    out.resize(align4(out.len()), 0);
}

/// Reverse the byte order of every sample in `buf`.
///
/// `sample_size` of 1 (or a trailing partial sample) leaves bytes untouched.
pub fn swap_samples(buf: &mut [u8], sample_size: usize) {
    if sample_size < 2 {
        return;
    }
    for sample in buf.chunks_exact_mut(sample_size) {
        sample.reverse();
    }
}

/// Render a four character signature, trimming trailing blanks and NULs
pub fn sig_to_string(sig: u32) -> String {
    let bytes = sig.to_be_bytes();
    let text: String = bytes
        .iter()
        .map(|&b| if b.is_ascii_graphic() || b == b' ' { b as char } else { ' ' })
        .collect();
    text.trim_end().to_string()
}

/// Parse up to four characters into a signature, padding with blanks
pub fn sig_from_str(text: &str) -> u32 {
    let mut raw = [b' '; 4];
    for (slot, b) in raw.iter_mut().zip(text.bytes()) {
        *slot = b;
    }
    u32::from_be_bytes(raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_write_roundtrip() {
        let mut buf = [0u8; 8];
        assert!(write_u32(&mut buf, 2, 0x6163_7370));
        assert_eq!(&buf[2..6], b"acsp");
        assert_eq!(read_u32(&buf, 2), Some(0x6163_7370));
        assert_eq!(read_u16(&buf, 2), Some(0x6163));
        assert!(!write_u32(&mut buf, 6, 1));
        assert_eq!(read_u32(&buf, 6), None);
        assert_eq!(read_u32(&buf, usize::MAX), None);
    }

    #[test]
    fn test_swap_samples() {
        let mut buf = [0x12, 0x34, 0x56, 0x78];
        swap_samples(&mut buf, 2);
        assert_eq!(buf, [0x34, 0x12, 0x78, 0x56]);
        swap_samples(&mut buf, 1);
        assert_eq!(buf, [0x34, 0x12, 0x78, 0x56]);
    }

    #[test]
    fn test_signatures() {
        assert_eq!(sig_to_string(sig_from_str("RGB")), "RGB");
        assert_eq!(sig_from_str("desc"), u32::from_be_bytes(*b"desc"));
        assert_eq!(sig_to_string(0), "");
    }

    #[test]
    fn test_align() {
        assert_eq!(align4(0), 0);
        assert_eq!(align4(1), 4);
        assert_eq!(align4(8), 8);
        let mut v = vec![1u8; 5];
        pad4(&mut v);
        assert_eq!(v.len(), 8);
    }
}
