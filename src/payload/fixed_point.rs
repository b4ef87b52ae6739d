//! Fixed-point scalar decoding.
//!
//! The controller reports every quantity as a big-endian signed 16-bit
//! value scaled by a per-reading number of decimals. A negative decimals
//! count selects a single status bit out of the first byte instead.

/// Decode one scalar at the start of `raw`.
///
/// * `decimals >= 0`: big-endian i16, divided by 10 or 100 for one or two
///   decimals respectively. Needs two bytes; `None` otherwise.
/// * `decimals < 0`: bit `(-decimals - 1)` of the first byte, as 0.0/1.0.
///   Valid for decimals in `-8..=-1`; `None` otherwise.
pub fn fixed_point(raw: &[u8], decimals: i32) -> Option<f64> {
    if decimals >= 0 {
        let hi = *raw.first()?;
        let lo = *raw.get(1)?;
        let value = i16::from_be_bytes([hi, lo]) as f64;
        Some(match decimals {
            1 => value / 10.0,
            2 => value / 100.0,
            _ => value,
        })
    } else {
        let shift = (-decimals - 1) as u32;
        if shift > 7 {
            return None;
        }
        let byte = *raw.first()?;
        Some(((byte >> shift) & 1) as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scales_by_decimals() {
        assert_eq!(fixed_point(&[0x12, 0x34], 0), Some(4660.0));
        assert_eq!(fixed_point(&[0x12, 0x34], 1), Some(466.0));
        assert_eq!(fixed_point(&[0x12, 0x34], 2), Some(46.60));
    }

    #[test]
    fn sign_extends() {
        // 0xFF38 = -200 -> -20.0 at one decimal
        assert_eq!(fixed_point(&[0xFF, 0x38], 1), Some(-20.0));
    }

    #[test]
    fn extracts_status_bits() {
        assert_eq!(fixed_point(&[0b0000_0100], -3), Some(1.0));
        assert_eq!(fixed_point(&[0b0000_0100], -1), Some(0.0));
        assert_eq!(fixed_point(&[0xFF], -9), None);
    }

    #[test]
    fn short_buffer_is_none() {
        assert_eq!(fixed_point(&[0x12], 1), None);
        assert_eq!(fixed_point(&[], -1), None);
    }
}
