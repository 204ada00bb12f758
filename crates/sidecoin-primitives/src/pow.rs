//! Proof and cumulative chainwork arithmetic.
//!
//! The sidechain disables difficulty retargeting: every block is mined
//! against the network's fixed compact target, so the per-block proof is a
//! network constant and cumulative work grows linearly with height.

use num_bigint::BigUint;
use num_traits::{One, Zero};
use std::fmt;
use std::ops::Add;

/// Cumulative proof-of-work accumulated from genesis to a chain entry.
///
/// Unbounded-precision unsigned arithmetic; ordering selects the best chain
/// among competing candidates.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct ChainWork(BigUint);

impl ChainWork {
    /// The zero accumulator.
    pub fn zero() -> Self {
        Self(BigUint::zero())
    }

    /// Whether no work has been accumulated.
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Reconstructs a value from its 32-byte big-endian form.
    pub fn from_be_bytes(bytes: [u8; 32]) -> Self {
        Self(BigUint::from_bytes_be(&bytes))
    }

    /// The 32-byte big-endian form.
    ///
    /// Values accumulated under any realistic target fit well within 256
    /// bits; a wider value indicates an arithmetic bug upstream.
    pub fn to_be_bytes(&self) -> [u8; 32] {
        let raw = self.0.to_bytes_be();
        debug_assert!(raw.len() <= 32, "chainwork exceeds 256 bits");
        let mut out = [0u8; 32];
        out[32 - raw.len()..].copy_from_slice(&raw);
        out
    }
}

impl Add for ChainWork {
    type Output = ChainWork;

    fn add(self, rhs: ChainWork) -> ChainWork {
        ChainWork(self.0 + rhs.0)
    }
}

impl Add<&ChainWork> for ChainWork {
    type Output = ChainWork;

    fn add(self, rhs: &ChainWork) -> ChainWork {
        ChainWork(self.0 + &rhs.0)
    }
}

impl fmt::Display for ChainWork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:064x}", self.0)
    }
}

/// Expands a compact-encoded target (Bitcoin `nBits`).
///
/// Returns the target and whether the encoding carried the sign bit.
pub fn compact_to_target(bits: u32) -> (BigUint, bool) {
    let exponent = bits >> 24;
    let mantissa = bits & 0x007f_ffff;
    let negative = (bits & 0x0080_0000) != 0 && mantissa != 0;

    let target = if exponent <= 3 {
        BigUint::from(mantissa >> (8 * (3 - exponent)))
    } else {
        BigUint::from(mantissa) << (8 * (exponent - 3) as usize)
    };

    (target, negative)
}

/// Per-block proof for a compact target: floor(2^256 / (target + 1)).
///
/// Degenerate targets (negative or zero) carry no proof.
pub fn proof_from_bits(bits: u32) -> ChainWork {
    let (target, negative) = compact_to_target(bits);

    if negative || target.is_zero() {
        return ChainWork::zero();
    }

    let max_chainwork = BigUint::one() << 256usize;
    ChainWork(max_chainwork / (target + BigUint::one()))
}

/// Cumulative work at `height` under a fixed compact target.
///
/// With retargeting disabled every block contributes the same proof, so the
/// sum from genesis to `height` is `proof * (height + 1)`.
pub fn chainwork_at(bits: u32, height: u32) -> ChainWork {
    let ChainWork(proof) = proof_from_bits(bits);
    ChainWork(proof * (BigUint::from(height) + BigUint::one()))
}
