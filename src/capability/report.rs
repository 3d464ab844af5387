//! Bit-level access to HID report payloads.

/// Read `bit_size` bits (LSB first) starting at `bit_offset`.
///
/// Returns `None` when the field runs past the end of `data` or is wider than 32 bits.
pub fn extract_bits(data: &[u8], bit_offset: u32, bit_size: u32) -> Option<u32> {
    if bit_size == 0 || bit_size > 32 {
        return None;
    }
    let end = bit_offset as usize + bit_size as usize;
    if end > data.len() * 8 {
        return None;
    }
    let mut value = 0u32;
    for i in 0..bit_size {
        let bit = bit_offset + i;
        let byte = data[(bit / 8) as usize];
        if byte >> (bit % 8) & 1 != 0 {
            value |= 1 << i;
        }
    }
    Some(value)
}

/// Write the low `bit_size` bits of `value` at `bit_offset`. Out-of-range writes are dropped.
pub fn insert_bits(data: &mut [u8], bit_offset: u32, bit_size: u32, value: u32) {
    if bit_size == 0 || bit_size > 32 {
        return;
    }
    let end = bit_offset as usize + bit_size as usize;
    if end > data.len() * 8 {
        return;
    }
    for i in 0..bit_size {
        let bit = bit_offset + i;
        let byte = &mut data[(bit / 8) as usize];
        let mask = 1u8 << (bit % 8);
        if value >> i & 1 != 0 {
            *byte |= mask;
        } else {
            *byte &= !mask;
        }
    }
}

/// Interpret the low `bits` bits of `raw` as two's complement.
pub fn sign_extend(raw: u32, bits: u32) -> i32 {
    if bits == 0 || bits >= 32 {
        return raw as i32;
    }
    let shift = 32 - bits;
    ((raw << shift) as i32) >> shift
}

/// Number of bytes needed to hold `bits`.
pub fn byte_len(bits: u32) -> usize {
    bits.div_ceil(8) as usize
}
