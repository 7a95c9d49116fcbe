//! Fixed-width B+Tree key types.
//!
//! The original source specializes its B+Tree template over a handful of
//! fixed-width key sizes (`GenericKey<4>`, `GenericKey<8>`, ...). Rust has
//! no template specialization, so per spec.md's REDESIGN note this is
//! re-expressed as a `Key` trait implemented by newtypes over `[u8; N]`,
//! each deriving its natural big-endian byte order from `Ord`.

use std::fmt;

/// A fixed-width, totally ordered byte string usable as a B+Tree key.
pub trait Key: Ord + Clone + fmt::Debug + Send + Sync + 'static {
    /// Width in bytes, used to size on-disk entry slots.
    const WIDTH: usize;

    fn to_bytes(&self) -> Vec<u8>;
    fn from_bytes(bytes: &[u8]) -> Self;
}

macro_rules! fixed_key {
    ($name:ident, $width:expr) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(pub [u8; $width]);

        impl $name {
            pub fn from_i64(v: i64) -> Self {
                let mut buf = [0u8; $width];
                let be = v.to_be_bytes();
                let start = ($width as usize).saturating_sub(be.len());
                let copy_len = be.len().min($width);
                buf[start..start + copy_len]
                    .copy_from_slice(&be[be.len() - copy_len..]);
                Self(buf)
            }

            pub fn to_i64(&self) -> i64 {
                let mut be = [0u8; 8];
                let copy_len = $width.min(8);
                be[8 - copy_len..].copy_from_slice(&self.0[$width - copy_len..]);
                i64::from_be_bytes(be)
            }
        }

        impl Key for $name {
            const WIDTH: usize = $width;

            fn to_bytes(&self) -> Vec<u8> {
                self.0.to_vec()
            }

            fn from_bytes(bytes: &[u8]) -> Self {
                let mut buf = [0u8; $width];
                buf.copy_from_slice(&bytes[..$width]);
                Self(buf)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.to_i64())
            }
        }
    };
}

fixed_key!(Key4, 4);
fixed_key!(Key8, 8);
fixed_key!(Key16, 16);
fixed_key!(Key32, 32);
fixed_key!(Key64, 64);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ord_matches_integer_order() {
        let a = Key8::from_i64(1);
        let b = Key8::from_i64(2);
        let c = Key8::from_i64(4);
        assert!(a < b);
        assert!(b < c);
    }

    #[test]
    fn round_trips_through_i64() {
        for v in [0i64, 1, -1, 42, i64::MAX / 2] {
            assert_eq!(Key8::from_i64(v).to_i64(), v);
        }
    }

    #[test]
    fn byte_order_is_big_endian_lexicographic() {
        let low = Key4::from_i64(1);
        let high = Key4::from_i64(256);
        assert!(low.to_bytes() < high.to_bytes());
        assert!(low < high);
    }
}
