//! Bitcoin network selection.
//!
//! The [`Network`] a resolver is created for decides which payment targets are acceptable:
//! address prefixes, Lightning invoice currencies and silent payment HRPs all differ between
//! networks, and a target for the wrong one is rejected rather than silently accepted.

use crate::error::Error;
use serde_with::{DeserializeFromStr, SerializeDisplay};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, SerializeDisplay, DeserializeFromStr)]
pub enum Network {
    #[default]
    Main,
    Testnet,
    Signet,
    Regtest,
}

impl Network {
    /// Human-readable part of native segwit addresses.
    #[must_use]
    pub fn segwit_hrp(self) -> &'static str {
        match self {
            Self::Main => "bc",
            Self::Testnet | Self::Signet => "tb",
            Self::Regtest => "bcrt",
        }
    }

    /// Base58check version bytes for `(P2PKH, P2SH)` addresses.
    #[must_use]
    pub fn base58_versions(self) -> (u8, u8) {
        match self {
            Self::Main => (0x00, 0x05),
            Self::Testnet | Self::Signet | Self::Regtest => (0x6f, 0xc4),
        }
    }

    /// BOLT11 currency prefix following `ln`.
    #[must_use]
    pub fn bolt11_currency(self) -> &'static str {
        match self {
            Self::Main => "bc",
            Self::Testnet => "tb",
            Self::Signet => "tbs",
            Self::Regtest => "bcrt",
        }
    }

    /// BIP-352 silent payment address HRP.
    #[must_use]
    pub fn silent_payment_hrp(self) -> &'static str {
        match self {
            Self::Main => "sp",
            Self::Testnet | Self::Signet | Self::Regtest => "tsp",
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Main => "main",
            Self::Testnet => "testnet",
            Self::Signet => "signet",
            Self::Regtest => "regtest",
        };
        f.write_str(name)
    }
}

impl FromStr for Network {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "main" | "mainnet" | "bitcoin" => Ok(Self::Main),
            "test" | "testnet" => Ok(Self::Testnet),
            "signet" => Ok(Self::Signet),
            "regtest" => Ok(Self::Regtest),
            _ => Err(Error::UnknownNetwork(s.to_string())),
        }
    }
}
