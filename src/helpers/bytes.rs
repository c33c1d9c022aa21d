//! Little-endian integer and float decoding over byte slices.
//! Callers check lengths first; short slices are zero-padded rather than rejected.

/// Iterates the complete 4-byte words of `bytes` as `usize` values.
pub(crate) fn to_usize_iter(bytes: &[u8]) -> impl Iterator<Item = usize> + '_ {
    bytes.chunks_exact(4).map(to_usize)
}

#[inline]
fn to_array<const N: usize>(s: &[u8]) -> [u8; N] {
    let mut array = [0u8; N];
    let size = N.min(s.len());
    array[..size].copy_from_slice(&s[..size]);
    array
}

#[inline]
pub(crate) fn to_u16(s: &[u8]) -> u16 {
    u16::from_le_bytes(to_array(s))
}

#[inline]
pub(crate) fn to_u32(s: &[u8]) -> u32 {
    u32::from_le_bytes(to_array(s))
}

#[inline]
pub(crate) fn to_u64(s: &[u8]) -> u64 {
    u64::from_le_bytes(to_array(s))
}

#[inline]
pub(crate) fn to_f64(s: &[u8]) -> f64 {
    f64::from_le_bytes(to_array(s))
}

#[inline]
pub(crate) fn to_usize(s: &[u8]) -> usize {
    to_u32(s) as usize
}
