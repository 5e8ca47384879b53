//! Lightning payment targets. Only their encoding is checked; invoice and offer contents are
//! carried through untouched.
use crate::network::Network;
use bech32::primitives::decode::{CheckedHrpstring, UncheckedHrpstring};
use bech32::{Bech32, NoChecksum};

/// BOLT11 currency prefixes, longest first so `lnbcrt` isn't taken for `lnbc`.
const CURRENCIES: [&str; 4] = ["bcrt", "tbs", "bc", "tb"];

/// Validate a BOLT11 invoice's checksum and currency.
pub(crate) fn check_invoice(invoice: &str, network: Network) -> Result<(), String> {
    let parsed = UncheckedHrpstring::new(invoice)
        .map_err(|e| format!("invoice is not bech32: {e}"))?;
    parsed
        .validate_checksum::<Bech32>()
        .map_err(|e| format!("invoice checksum is invalid: {e}"))?;

    let hrp = parsed.hrp().to_lowercase();
    let currency = hrp
        .strip_prefix("ln")
        .and_then(|rest| CURRENCIES.iter().find(|c| rest.starts_with(*c)))
        .ok_or_else(|| format!("invoice prefix {hrp} is not a BOLT11 currency"))?;
    if *currency == network.bolt11_currency() {
        Ok(())
    } else {
        Err(format!(
            "invoice is for ln{currency}, expected ln{}",
            network.bolt11_currency()
        ))
    }
}

/// Validate the encoding of a BOLT12 offer.
pub(crate) fn check_offer(offer: &str) -> Result<(), String> {
    let parsed = CheckedHrpstring::new::<NoChecksum>(offer)
        .map_err(|e| format!("offer is not bech32 encoded: {e}"))?;
    match parsed.hrp().to_lowercase().as_str() {
        "lno" => Ok(()),
        other => Err(format!("offer has prefix {other}, expected lno")),
    }
}
