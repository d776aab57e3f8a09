//! Amount Encryption
//!
//! ```text
//! key = SHA256(BE32(S.x))[0..8]
//! ct  = LE64(amount) XOR key
//! ```
//!
//! No integrity: a wrong key yields a plausible but wrong amount. Callers must
//! check the commitment after decrypting.

use sha2::{Digest, Sha256};

use crate::ecdh::SharedSecret;
use crate::field::FieldOps;
use crate::params::ENCRYPTED_AMOUNT_LEN;

/// 8-byte XOR blob carried in announcements.
pub type EncryptedAmount = [u8; ENCRYPTED_AMOUNT_LEN];

fn amount_key(shared: &SharedSecret) -> [u8; ENCRYPTED_AMOUNT_LEN] {
    let digest = Sha256::digest(shared.x().to_be32());
    let mut key = [0u8; ENCRYPTED_AMOUNT_LEN];
    key.copy_from_slice(&digest[..ENCRYPTED_AMOUNT_LEN]);
    key
}

pub fn encrypt_amount(amount: u64, shared: &SharedSecret) -> EncryptedAmount {
    let key = amount_key(shared);
    let mut out = amount.to_le_bytes();
    for (byte, k) in out.iter_mut().zip(key.iter()) {
        *byte ^= k;
    }
    out
}

pub fn decrypt_amount(ciphertext: &EncryptedAmount, shared: &SharedSecret) -> u64 {
    let key = amount_key(shared);
    let mut plain = *ciphertext;
    for (byte, k) in plain.iter_mut().zip(key.iter()) {
        *byte ^= k;
    }
    u64::from_le_bytes(plain)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::curve::CurvePoint;
    use crate::ecdh::ecdh;
    use crate::params::Scalar;

    #[test]
    fn test_cipher_involution() {
        let s = ecdh(&Scalar::from(7u64), &CurvePoint::GENERATOR).unwrap();
        for amount in [0u64, 1, 100_000, (1u64 << 63) - 1, u64::MAX] {
            let ct = encrypt_amount(amount, &s);
            assert_eq!(decrypt_amount(&ct, &s), amount, "amount {amount}");
        }
    }

    #[test]
    fn test_ciphertext_is_xor_of_le_bytes() {
        let s = ecdh(&Scalar::from(9u64), &CurvePoint::GENERATOR).unwrap();
        let digest = Sha256::digest(s.x().to_be32());
        let ct = encrypt_amount(0, &s);
        assert_eq!(&ct[..], &digest[..8], "zero amount exposes the key stream");
    }

    #[test]
    fn test_wrong_key_gives_other_amount() {
        let s1 = ecdh(&Scalar::from(11u64), &CurvePoint::GENERATOR).unwrap();
        let s2 = ecdh(&Scalar::from(12u64), &CurvePoint::GENERATOR).unwrap();
        let ct = encrypt_amount(100_000, &s1);
        assert_ne!(decrypt_amount(&ct, &s2), 100_000);
    }
}
