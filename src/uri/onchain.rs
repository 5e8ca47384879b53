//! On-chain payment targets.
use crate::network::Network;
use bech32::primitives::decode::CheckedHrpstring;
use bech32::{segwit, Bech32m};

/// Validate a legacy (base58check) or segwit address for `network`.
pub(crate) fn check_address(address: &str, network: Network) -> Result<(), String> {
    if let Ok((hrp, _, _)) = segwit::decode(address) {
        return if hrp.to_lowercase() == network.segwit_hrp() {
            Ok(())
        } else {
            Err(format!(
                "address {address} is for HRP {}, expected {}",
                hrp.to_lowercase(),
                network.segwit_hrp()
            ))
        };
    }

    let payload = bs58::decode(address)
        .with_check(None)
        .into_vec()
        .map_err(|e| format!("address {address} is neither segwit nor base58check: {e}"))?;
    if payload.len() != 21 {
        return Err(format!(
            "base58 address {address} has a {}-byte payload",
            payload.len()
        ));
    }
    let (p2pkh, p2sh) = network.base58_versions();
    if payload[0] == p2pkh || payload[0] == p2sh {
        Ok(())
    } else {
        Err(format!(
            "address {address} has version byte {:#04x}, not valid on {network}",
            payload[0]
        ))
    }
}

/// Validate a segwit-only fallback address published under `bc`, `tb` or `bcrt`.
pub(crate) fn check_segwit_fallback(key: &str, address: &str, network: Network) -> Result<(), String> {
    if key != network.segwit_hrp() {
        return Err(format!("fallback parameter {key} is not valid on {network}"));
    }
    let (hrp, _, _) = segwit::decode(address)
        .map_err(|e| format!("fallback {address} is not a segwit address: {e}"))?;
    if hrp.to_lowercase() == key {
        Ok(())
    } else {
        Err(format!("fallback {address} does not match parameter {key}"))
    }
}

/// Validate a BIP-352 silent payment address.
pub(crate) fn check_silent_payment(address: &str, network: Network) -> Result<(), String> {
    let parsed = CheckedHrpstring::new::<Bech32m>(address)
        .map_err(|e| format!("silent payment address is not bech32m: {e}"))?;
    let hrp = parsed.hrp().to_lowercase();
    if hrp == network.silent_payment_hrp() {
        Ok(())
    } else {
        Err(format!(
            "silent payment address has HRP {hrp}, expected {}",
            network.silent_payment_hrp()
        ))
    }
}
