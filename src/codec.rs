//! 2-bit DNA codec.
//!
//! A fixed 128-byte lookup maps ASCII bases to the codes A=0, C=1, G=2, T=3.
//! Case is ignored and the IUPAC ambiguity letters resolve to a fixed base
//! code each (e.g. R->A, Y->T, U->T); `-` counts as A so gapped input does
//! not abort a run. Everything else is `INVALID`.

/// Sentinel returned for bytes outside the table.
pub const INVALID: u8 = 255;

#[rustfmt::skip]
static CODER: [u8; 128] = [
    255, 255, 255, 255, 255, 255, 255, 255,
    255, 255, 255, 255, 255, 255, 255, 255,
    255, 255, 255, 255, 255, 255, 255, 255,
    255, 255, 255, 255, 255, 255, 255, 255,
    255, 255, 255, 255, 255, 255, 255, 255,
    255, 255, 255, 255, 255,   0, 255, 255,
    255, 255, 255, 255, 255, 255, 255, 255,
    255, 255, 255, 255, 255, 255, 255, 255,
    255,   0,   1,   1,   0, 255, 255,   2,
      3, 255, 255,   2, 255,   1,   0, 255,
    255, 255,   0,   1,   3,   3,   2,   0,
    255,   3, 255, 255, 255, 255, 255, 255,
    255,   0,   1,   1,   0, 255, 255,   2,
      3, 255, 255,   2, 255,   1,   0, 255,
    255, 255,   0,   1,   3,   3,   2,   0,
    255,   3, 255, 255, 255, 255, 255, 255,
];

/// Return the 2-bit code for `byte`, or `INVALID`.
#[inline]
pub fn code(byte: u8) -> u8 {
    if byte < 128 {
        CODER[byte as usize]
    } else {
        INVALID
    }
}

/// Complement of a 2-bit code.
#[inline]
pub fn complement(code: u8) -> u8 {
    code ^ 3
}
