//! `bitcoin:` payment URI interpretation.
//!
//! A URI is parsed into its path target and decoded query parameters. Every payment target it
//! carries is checked against the [`Network`] the resolver runs on: a testnet address in a
//! mainnet resolver is an error, never a silent downgrade. Parameters this crate doesn't know
//! are kept in [`PaymentInstruction::parameters`] unless they are marked `req-`, in which case
//! the URI is rejected.

mod lightning;
mod onchain;

use crate::error::ResolutionError;
use crate::instruction::{PaymentInstruction, PaymentType};
use crate::network::Network;
use percent_encoding::percent_decode_str;
use std::collections::BTreeMap;
use url::Url;

/// Prefix marking a parameter the payer must understand.
pub const REQUIRED_PREFIX: &str = "req-";

const SCHEME: &str = "bitcoin";

const UNDERSTOOD: [&str; 10] = [
    "amount", "label", "message", "lightning", "lno", "pop", "sp", "bc", "tb", "bcrt",
];

const SATS_PER_BTC: u64 = 100_000_000;
const MAX_SATS: u64 = 21_000_000 * SATS_PER_BTC;

/// Validate `uri` for `network` and classify what it can be paid with.
///
/// # Errors
///
/// Returns [`ResolutionError::InvalidUri`] when the URI is malformed, when a payment target is
/// invalid or for another network, when a `req-` parameter isn't understood, when `amount` is
/// invalid or repeated, and when the URI carries no payment target at all.
pub fn interpret(uri: &str, network: Network) -> Result<PaymentInstruction, ResolutionError> {
    let url = Url::parse(uri).map_err(|e| invalid(format!("{e}")))?;
    if url.scheme() != SCHEME {
        return Err(invalid(format!("scheme {} is not {SCHEME}", url.scheme())));
    }
    if !url.cannot_be_a_base() {
        return Err(invalid("payment target must directly follow the scheme"));
    }

    let mut parameters = BTreeMap::new();
    let mut amount_sats = None;
    let mut on_chain = false;
    let mut lightning = false;
    let mut reusable = true;
    let mut other = None;

    let path = url.path();
    if !path.is_empty() {
        onchain::check_address(path, network).map_err(invalid)?;
        on_chain = true;
    }

    for (key, value) in query_pairs(url.query().unwrap_or_default())? {
        let key = key.to_ascii_lowercase();
        let (name, required) = match key.strip_prefix(REQUIRED_PREFIX) {
            Some(name) => (name.to_string(), true),
            None => (key.clone(), false),
        };

        match name.as_str() {
            "amount" => {
                if amount_sats.is_some() {
                    return Err(invalid("amount is given more than once"));
                }
                amount_sats = Some(parse_amount(&value)?);
            }
            "lightning" => {
                lightning::check_invoice(&value, network).map_err(invalid)?;
                lightning = true;
                reusable = false;
            }
            "lno" => {
                lightning::check_offer(&value).map_err(invalid)?;
                lightning = true;
            }
            "sp" => {
                onchain::check_silent_payment(&value, network).map_err(invalid)?;
                on_chain = true;
            }
            "bc" | "tb" | "bcrt" => {
                onchain::check_segwit_fallback(&name, &value, network).map_err(invalid)?;
                on_chain = true;
            }
            understood if UNDERSTOOD.contains(&understood) => {}
            unknown if required => {
                return Err(invalid(format!(
                    "required parameter {REQUIRED_PREFIX}{unknown} is not understood"
                )));
            }
            unknown => {
                other.get_or_insert_with(|| unknown.to_string());
            }
        }
        parameters.entry(key).or_insert(value);
    }

    let payment_type = match (on_chain, lightning, other) {
        (true, true, _) => PaymentType::Unified,
        (true, false, _) => PaymentType::OnChain,
        (false, true, _) => PaymentType::Lightning,
        (false, false, Some(name)) => PaymentType::Other(name),
        (false, false, None) => return Err(invalid("no payment target")),
    };
    tracing::debug!("interpreted {payment_type} payment URI, reusable: {reusable}");

    Ok(PaymentInstruction::new(
        uri.to_string(),
        payment_type,
        reusable,
        amount_sats,
        parameters,
    ))
}

/// Split a query into percent-decoded `key=value` pairs. Unlike form encoding, `+` is kept as
/// a literal plus sign.
fn query_pairs(query: &str) -> Result<Vec<(String, String)>, ResolutionError> {
    query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            Ok((decode(key)?, decode(value)?))
        })
        .collect()
}

fn decode(part: &str) -> Result<String, ResolutionError> {
    percent_decode_str(part)
        .decode_utf8()
        .map(std::borrow::Cow::into_owned)
        .map_err(|_| invalid(format!("{part} is not valid percent-encoded UTF-8")))
}

/// Parse a decimal BTC amount into satoshis.
fn parse_amount(value: &str) -> Result<u64, ResolutionError> {
    let bad = || invalid(format!("amount {value} is not a valid BTC amount"));
    let (whole, fraction) = value.split_once('.').unwrap_or((value, ""));
    if (whole.is_empty() && fraction.is_empty())
        || fraction.len() > 8
        || !whole.bytes().chain(fraction.bytes()).all(|b| b.is_ascii_digit())
    {
        return Err(bad());
    }

    let whole: u64 = if whole.is_empty() {
        0
    } else {
        whole.parse().map_err(|_| bad())?
    };
    let fraction: u64 = if fraction.is_empty() {
        0
    } else {
        format!("{fraction:0<8}").parse().map_err(|_| bad())?
    };
    let sats = whole
        .checked_mul(SATS_PER_BTC)
        .and_then(|s| s.checked_add(fraction))
        .ok_or_else(bad)?;

    if sats == 0 || sats > MAX_SATS {
        return Err(invalid(format!(
            "amount {value} is outside (0, 21000000] BTC"
        )));
    }
    Ok(sats)
}

fn invalid(reason: impl Into<String>) -> ResolutionError {
    ResolutionError::InvalidUri(reason.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use bech32::{Bech32, Hrp};

    const MAIN: &str = "bc1qw508d6qejxtdg4y5r3zarvary0c5xw7kv8f3t4";
    const TEST: &str = "tb1qw508d6qejxtdg4y5r3zarvary0c5xw7kxpjzsx";
    const OFFER: &str = "lno1qpzry9x8gf2tvdw0s3jn54khce6mua7l";

    fn invoice(hrp: &str) -> String {
        bech32::encode::<Bech32>(Hrp::parse(hrp).unwrap(), &[7; 40]).unwrap()
    }

    fn kind(uri: &str, network: Network) -> ErrorKind {
        interpret(uri, network).unwrap_err().kind()
    }

    #[test]
    fn plain_address_is_reusable_on_chain() {
        let instruction = interpret(&format!("bitcoin:{MAIN}"), Network::Main).unwrap();
        assert_eq!(instruction.payment_type(), &PaymentType::OnChain);
        assert!(instruction.is_reusable());
        assert_eq!(instruction.amount_sats(), None);
    }

    #[test]
    fn scheme_is_case_insensitive() {
        let instruction = interpret(&format!("BITCOIN:{MAIN}"), Network::Main).unwrap();
        assert_eq!(instruction.uri(), format!("BITCOIN:{MAIN}"));
    }

    #[test]
    fn other_schemes_are_rejected() {
        assert_eq!(kind("litecoin:abc", Network::Main), ErrorKind::InvalidUri);
        assert_eq!(kind("bitcoin://host/x", Network::Main), ErrorKind::InvalidUri);
        assert_eq!(kind("not a uri", Network::Main), ErrorKind::InvalidUri);
    }

    #[test]
    fn network_mismatch_is_an_error() {
        assert_eq!(
            kind(&format!("bitcoin:{TEST}"), Network::Main),
            ErrorKind::InvalidUri
        );
        let uri = format!("bitcoin:?lightning={}", invoice("lntb1"));
        assert_eq!(kind(&uri, Network::Main), ErrorKind::InvalidUri);
        assert!(interpret(&uri, Network::Testnet).is_ok());
    }

    #[test]
    fn bolt11_makes_it_single_use() {
        let uri = format!("bitcoin:{MAIN}?lightning={}", invoice("lnbc1"));
        let instruction = interpret(&uri, Network::Main).unwrap();
        assert_eq!(instruction.payment_type(), &PaymentType::Unified);
        assert!(!instruction.is_reusable());

        let uri = format!("bitcoin:?LIGHTNING={}", invoice("lnbc1"));
        let instruction = interpret(&uri, Network::Main).unwrap();
        assert_eq!(instruction.payment_type(), &PaymentType::Lightning);
        assert!(!instruction.is_reusable());
        assert!(instruction.parameter("lightning").is_some());
    }

    #[test]
    fn offer_only_is_reusable_lightning() {
        let instruction = interpret(&format!("bitcoin:?lno={OFFER}"), Network::Main).unwrap();
        assert_eq!(instruction.payment_type(), &PaymentType::Lightning);
        assert!(instruction.is_reusable());
    }

    #[test]
    fn segwit_fallbacks() {
        let instruction = interpret(&format!("bitcoin:?lno={OFFER}&bc={MAIN}"), Network::Main).unwrap();
        assert_eq!(instruction.payment_type(), &PaymentType::Unified);
        assert_eq!(
            kind(&format!("bitcoin:?tb={TEST}"), Network::Main),
            ErrorKind::InvalidUri
        );
    }

    #[test]
    fn amounts() {
        let sats = |a: &str| {
            interpret(&format!("bitcoin:{MAIN}?amount={a}"), Network::Main)
                .map(|i| i.amount_sats())
        };
        assert_eq!(sats("0.001").unwrap(), Some(100_000));
        assert_eq!(sats("1").unwrap(), Some(100_000_000));
        assert_eq!(sats(".5").unwrap(), Some(50_000_000));
        assert_eq!(sats("0.00000001").unwrap(), Some(1));
        assert_eq!(sats("21000000").unwrap(), Some(MAX_SATS));
        for bad in ["0", "0.000000001", "21000000.00000001", "-1", "1e3", "", ".", "1.2.3"] {
            assert!(sats(bad).is_err(), "{bad}");
        }
        let uri = format!("bitcoin:{MAIN}?amount=1&amount=2");
        assert_eq!(kind(&uri, Network::Main), ErrorKind::InvalidUri);
    }

    #[test]
    fn unknown_parameters() {
        let uri = format!("bitcoin:{MAIN}?foo=bar&label=Caf%C3%A9");
        let instruction = interpret(&uri, Network::Main).unwrap();
        assert_eq!(instruction.parameter("foo"), Some("bar"));
        assert_eq!(instruction.parameter("label"), Some("Café"));

        let uri = format!("bitcoin:{MAIN}?req-foo=bar");
        assert_eq!(kind(&uri, Network::Main), ErrorKind::InvalidUri);

        let uri = format!("bitcoin:{MAIN}?req-label=x");
        assert!(interpret(&uri, Network::Main).is_ok());
    }

    #[test]
    fn plus_is_a_literal_character() {
        let uri = format!("bitcoin:{MAIN}?label=a+b&message=1%2B1%20is%202&x-note=c+d");
        let instruction = interpret(&uri, Network::Main).unwrap();
        assert_eq!(instruction.parameter("label"), Some("a+b"));
        assert_eq!(instruction.parameter("message"), Some("1+1 is 2"));
        assert_eq!(
            instruction.parameters().keys().collect::<Vec<_>>(),
            ["label", "message", "x-note"]
        );
        assert_eq!(instruction.parameter("x-note"), Some("c+d"));
    }

    #[test]
    fn undecodable_parameter_is_invalid() {
        let uri = format!("bitcoin:{MAIN}?label=%FF");
        assert_eq!(kind(&uri, Network::Main), ErrorKind::InvalidUri);
    }

    #[test]
    fn unrecognized_payment_method_is_other() {
        let instruction = interpret("bitcoin:?ark=abc&label=x", Network::Main).unwrap();
        assert_eq!(instruction.payment_type(), &PaymentType::Other("ark".into()));
    }

    #[test]
    fn no_target_is_invalid() {
        assert_eq!(kind("bitcoin:", Network::Main), ErrorKind::InvalidUri);
        assert_eq!(kind("bitcoin:?label=hi", Network::Main), ErrorKind::InvalidUri);
    }
}
