//! Diffie-Hellman over Grumpkin.
//!
//! `ecdh(a, bG) == ecdh(b, aG) == abG`. The resulting point seeds both the
//! stealth scalar and the amount key.

use std::fmt;

use crate::curve::CurvePoint;
use crate::error::{Result, StealthError};
use crate::params::{Base, Scalar};

/// Shared secret point. Debug output is redacted.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct SharedSecret(CurvePoint);

impl SharedSecret {
    pub fn point(&self) -> &CurvePoint {
        &self.0
    }

    /// x-coordinate, the seed for amount encryption.
    pub fn x(&self) -> Base {
        self.0.x()
    }
}

impl fmt::Debug for SharedSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SharedSecret(<redacted>)")
    }
}

/// `private * public`, rejecting off-curve inputs and identity results.
pub fn ecdh(private: &Scalar, public: &CurvePoint) -> Result<SharedSecret> {
    if !public.is_on_curve() {
        return Err(StealthError::InvalidPoint("ECDH public key off curve"));
    }
    let shared = public.mul(private);
    if bool::from(shared.is_identity()) {
        return Err(StealthError::DegenerateSecret);
    }
    Ok(SharedSecret(shared))
}
