//! Stealth Key Derivation
//!
//! ```text
//! s          = SHA256(compress(S) || domain_tag) mod n
//! stealthPub = spendingPub + s*G
//! stealthPriv = spendingPriv + s  (mod n)
//! ```
//!
//! The sender knows `S` (from its ephemeral key) and can compute
//! `stealthPub`; only the holder of `spendingPriv` can compute `stealthPriv`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::curve::CurvePoint;
use crate::ecdh::SharedSecret;
use crate::error::StealthError;
use crate::params::{Scalar, TRANSFER_DOMAIN_TAG, YIELD_POOL_DOMAIN_TAG};

/// Which subsystem a stealth key belongs to. Each maps to its own tag.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StealthDomain {
    #[default]
    Transfer,
    YieldPool,
}

impl StealthDomain {
    pub fn tag(&self) -> &'static [u8] {
        match self {
            StealthDomain::Transfer => TRANSFER_DOMAIN_TAG,
            StealthDomain::YieldPool => YIELD_POOL_DOMAIN_TAG,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StealthDomain::Transfer => "transfer",
            StealthDomain::YieldPool => "yield_pool",
        }
    }
}

impl fmt::Display for StealthDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StealthDomain {
    type Err = StealthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "transfer" => Ok(StealthDomain::Transfer),
            "yield_pool" | "yield-pool" => Ok(StealthDomain::YieldPool),
            other => Err(StealthError::Encoding(format!("unknown stealth domain: {other}"))),
        }
    }
}

/// Hash the shared secret into a scalar under `domain`.
pub fn stealth_scalar(shared: &SharedSecret, domain: StealthDomain) -> Scalar {
    let mut hasher = Sha256::new();
    hasher.update(shared.point().compress().as_bytes());
    hasher.update(domain.tag());
    Scalar::from_be_bytes_mod_order(&hasher.finalize().into())
}

/// One-time public key; computable by sender and recipient.
pub fn stealth_pub(
    spending_pub: &CurvePoint,
    shared: &SharedSecret,
    domain: StealthDomain,
) -> CurvePoint {
    let tweak = CurvePoint::mul_generator(&stealth_scalar(shared, domain));
    spending_pub.add_point(&tweak)
}

/// One-time private key; requires the spending key.
pub fn stealth_priv(spending_priv: &Scalar, shared: &SharedSecret, domain: StealthDomain) -> Scalar {
    *spending_priv + stealth_scalar(shared, domain)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecdh::ecdh;
    use rand::{SeedableRng, rngs::StdRng};

    #[test]
    fn test_stealth_pub_matches_priv() {
        let mut rng = StdRng::seed_from_u64(21);
        let spend = Scalar::random(&mut rng);
        let spend_pub = CurvePoint::mul_generator(&spend);
        let eph = Scalar::random(&mut rng);
        let view_pub = CurvePoint::mul_generator(&Scalar::random(&mut rng));
        let shared = ecdh(&eph, &view_pub).unwrap();

        for domain in [StealthDomain::Transfer, StealthDomain::YieldPool] {
            let p = stealth_pub(&spend_pub, &shared, domain);
            let k = stealth_priv(&spend, &shared, domain);
            assert_eq!(
                CurvePoint::mul_generator(&k),
                p,
                "stealthPriv * G must equal stealthPub for {domain}"
            );
        }
    }

    #[test]
    fn test_domains_are_separated() {
        let shared = ecdh(&Scalar::from(42u64), &CurvePoint::GENERATOR).unwrap();
        assert_ne!(
            stealth_scalar(&shared, StealthDomain::Transfer),
            stealth_scalar(&shared, StealthDomain::YieldPool),
            "transfer and yield pool keys must differ"
        );
    }

    #[test]
    fn test_stealth_scalar_vector() {
        // s = SHA256(compress(2G) || tag) mod n, recomputed by hand
        let shared = ecdh(&Scalar::from(2u64), &CurvePoint::GENERATOR).unwrap();
        let mut preimage = shared.point().compress().as_bytes().to_vec();
        preimage.extend_from_slice(b"zelana-stealth-v1");
        let digest: [u8; 32] = Sha256::digest(&preimage).into();
        assert_eq!(
            stealth_scalar(&shared, StealthDomain::Transfer),
            Scalar::from_be_bytes_mod_order(&digest)
        );
    }

    #[test]
    fn test_domain_parse() {
        assert_eq!("transfer".parse::<StealthDomain>().unwrap(), StealthDomain::Transfer);
        assert_eq!("yield_pool".parse::<StealthDomain>().unwrap(), StealthDomain::YieldPool);
        assert!("other".parse::<StealthDomain>().is_err());
    }
}
