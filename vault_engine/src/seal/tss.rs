//! Threshold secret sharing over GF(256) with a sentinel-based threshold check.
//!
//! The shared secret is `message ‖ ENDING`. A share is `x ‖ y`, where `x` is the evaluation point.
//! Reconstruction below the threshold yields garbage rather than an error, so recovery only
//! trusts output whose tail equals `ENDING`. This detects a short share set with overwhelming
//! probability; it is a corruption check, not a proof.

use crate::error::{Result, VaultError};
use sharks::{Share, Sharks};
use zeroize::Zeroizing;

/// Sentinel appended to every shared message.
pub const ENDING: &[u8; 32] = b"threshold-secret-sharing-ending!";

/// GF(256) sharing has 255 non-zero evaluation points.
pub const MAX_SHARES: u32 = 255;

/// Length of every share produced for a `message_len`-byte message.
pub const fn share_len(message_len: usize) -> usize {
    1 + message_len + ENDING.len()
}

/// Split `message` into `n` shares, any `k` of which reconstruct it.
pub fn generate_shares(message: &[u8], n: u32, k: u32) -> Result<Vec<Vec<u8>>> {
    if k == 0 || k > n || n > MAX_SHARES {
        return Err(VaultError::SchemaInvalid(format!(
            "cannot split into {n} shares with threshold {k}"
        )));
    }

    let mut secret = Zeroizing::new(Vec::with_capacity(message.len() + ENDING.len()));
    secret.extend_from_slice(message);
    secret.extend_from_slice(ENDING);

    let shares: Vec<Vec<u8>> = Sharks(k as u8)
        .dealer(&secret)
        .take(n as usize)
        .map(|share| Vec::from(&share))
        .collect();

    if shares.len() != n as usize {
        return Err(VaultError::Crypto(format!(
            "dealer produced {} shares, expected {n}",
            shares.len()
        )));
    }
    Ok(shares)
}

/// Reconstruct the message from any set of shares.
///
/// Shares repeating an evaluation point are counted once. Fails with
/// [`VaultError::ThresholdNotMet`] when the sentinel does not come back intact.
pub fn recover<S: AsRef<[u8]>>(shares: &[S]) -> Result<Vec<u8>> {
    let mut seen = [false; 256];
    let mut unique: Vec<Share> = Vec::with_capacity(shares.len());
    let mut expected_len = None;

    for raw in shares {
        let raw = raw.as_ref();
        if raw.len() < 2 || raw[0] == 0 {
            return Err(VaultError::WireFormat(format!("malformed share of {} bytes", raw.len())));
        }
        match expected_len {
            None => expected_len = Some(raw.len()),
            Some(len) if len != raw.len() => {
                return Err(VaultError::WireFormat(format!(
                    "share length {} differs from {len}",
                    raw.len()
                )));
            }
            Some(_) => {}
        }

        let x = raw[0] as usize;
        if seen[x] {
            continue;
        }
        seen[x] = true;

        let share = Share::try_from(raw).map_err(|e| VaultError::WireFormat(e.to_string()))?;
        unique.push(share);
    }

    if unique.is_empty() {
        return Err(VaultError::ThresholdNotMet);
    }

    // at most 255 distinct non-zero points, so the count fits a u8
    let secret = Zeroizing::new(
        Sharks(unique.len() as u8)
            .recover(&unique)
            .map_err(|_| VaultError::ThresholdNotMet)?,
    );

    if secret.len() < ENDING.len() || !secret.ends_with(ENDING) {
        return Err(VaultError::ThresholdNotMet);
    }

    Ok(secret[..secret.len() - ENDING.len()].to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_any_k_subset_recovers() {
        let message = b"pre-sealed record of any length";
        let shares = generate_shares(message, 5, 3).unwrap();
        assert_eq!(shares.len(), 5);
        assert!(shares.iter().all(|s| s.len() == share_len(message.len())));

        for skip_a in 0..5 {
            for skip_b in (skip_a + 1)..5 {
                let subset: Vec<&Vec<u8>> = shares
                    .iter()
                    .enumerate()
                    .filter(|(i, _)| *i != skip_a && *i != skip_b)
                    .map(|(_, s)| s)
                    .collect();
                assert_eq!(recover(&subset).unwrap(), message);
            }
        }
    }

    #[test]
    fn test_more_than_k_recovers() {
        let shares = generate_shares(b"all of them", 6, 2).unwrap();
        assert_eq!(recover(&shares).unwrap(), b"all of them");
    }

    #[test]
    fn test_below_threshold_is_threshold_not_met() {
        for (n, k, message) in [
            (3u32, 2u32, b"short".to_vec()),
            (5, 3, vec![0u8; 114]),
            (10, 7, b"a longer message with some content".to_vec()),
        ] {
            let shares = generate_shares(&message, n, k).unwrap();
            let short = &shares[..(k as usize - 1)];
            assert!(matches!(recover(short), Err(VaultError::ThresholdNotMet)));
        }
    }

    #[test]
    fn test_duplicate_shares_do_not_count_twice() {
        let shares = generate_shares(b"dup", 4, 3).unwrap();
        let doubled = vec![shares[0].clone(), shares[0].clone(), shares[1].clone()];
        assert!(matches!(recover(&doubled), Err(VaultError::ThresholdNotMet)));

        let enough = vec![shares[0].clone(), shares[0].clone(), shares[1].clone(), shares[3].clone()];
        assert_eq!(recover(&enough).unwrap(), b"dup");
    }

    #[test]
    fn test_threshold_one() {
        let shares = generate_shares(b"single", 3, 1).unwrap();
        assert_eq!(recover(&shares[2..]).unwrap(), b"single");
    }

    #[test]
    fn test_empty_message() {
        let shares = generate_shares(&[], 3, 2).unwrap();
        assert_eq!(shares[0].len(), share_len(0));
        assert!(recover(&shares[..2]).unwrap().is_empty());
    }

    #[test]
    fn test_invalid_parameters() {
        assert!(generate_shares(b"x", 2, 3).is_err());
        assert!(generate_shares(b"x", 3, 0).is_err());
        assert!(generate_shares(b"x", 256, 2).is_err());
    }

    #[test]
    fn test_recover_rejects_malformed_input() {
        let none: Vec<Vec<u8>> = Vec::new();
        assert!(matches!(recover(&none), Err(VaultError::ThresholdNotMet)));
        assert!(matches!(recover(&[vec![1u8]]), Err(VaultError::WireFormat(_))));
        assert!(matches!(recover(&[vec![1u8, 2, 3], vec![2u8, 3]]), Err(VaultError::WireFormat(_))));
    }
}
