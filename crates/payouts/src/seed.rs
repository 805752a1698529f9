// Copyright 2025 RISC Zero, Inc.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Validation of secret material and derivation of the signing key.
//!
//! A secret URI has the form `<phrase>[//hard|/soft]*[///password]`. The phrase must either be a
//! BIP-39 mnemonic of an accepted length or a 256-bit hex seed.

use std::str::FromStr;

use sp_core::{
    crypto::{ExposeSecret, SecretUri},
    sr25519, Pair,
};
use thiserror::Error;

/// Accepted mnemonic word counts.
pub const SEED_LENGTHS: [usize; 5] = [12, 15, 18, 21, 24];

#[derive(Error, Debug, PartialEq, Eq)]
pub enum SecretError {
    #[error("Secret URI could not be parsed")]
    InvalidUri,

    #[error("Secret URI does not contain a seed phrase")]
    MissingPhrase,

    #[error("Hex seed needs to be 256-bits")]
    HexLength,

    #[error("Mnemonic needs to contain 12, 15, 18, 21, 24 words, found {0}")]
    WordCount(usize),

    #[error("Not a valid mnemonic seed")]
    InvalidMnemonic,

    #[error("Failed to derive signing key: {0}")]
    Derivation(String),
}

/// Check that `suri` carries a well-formed seed, without deriving any key material.
pub fn validate_secret(suri: &str) -> Result<(), SecretError> {
    let suri = suri.trim();
    // An absent phrase would otherwise fall back to the public development phrase.
    if suri.is_empty() || suri.starts_with('/') {
        return Err(SecretError::MissingPhrase);
    }
    let parsed = SecretUri::from_str(suri).map_err(|_| SecretError::InvalidUri)?;
    let phrase = parsed.phrase.expose_secret().as_str();

    if is_hex(phrase) {
        if phrase.len() != 2 + 64 {
            return Err(SecretError::HexLength);
        }
        return Ok(());
    }

    let words = phrase.split(' ').count();
    if !SEED_LENGTHS.contains(&words) {
        return Err(SecretError::WordCount(words));
    }
    sr25519::Pair::from_phrase(phrase, None).map_err(|_| SecretError::InvalidMnemonic)?;
    Ok(())
}

/// Validate `suri` and derive the sr25519 signing key it describes.
pub fn derive_signer(suri: &str) -> Result<sr25519::Pair, SecretError> {
    validate_secret(suri)?;
    sr25519::Pair::from_string(suri.trim(), None)
        .map_err(|e| SecretError::Derivation(format!("{e:?}")))
}

fn is_hex(value: &str) -> bool {
    value
        .strip_prefix("0x")
        .is_some_and(|digits| {
            digits.len() % 2 == 0 && digits.bytes().all(|b| b.is_ascii_hexdigit())
        })
}

#[cfg(test)]
mod tests {
    use sp_core::crypto::{Ss58Codec, DEV_PHRASE};

    use super::*;

    const HEX_SEED: &str = "0xe5be9a5092b81bca64be81d212e7f2f9eba183bb7a90954f7b76361f6edb5c0a";

    #[test]
    fn accepts_mnemonic() {
        assert_eq!(validate_secret(DEV_PHRASE), Ok(()));
        assert_eq!(validate_secret(&format!("{DEV_PHRASE}//Alice")), Ok(()));
        assert_eq!(validate_secret(&format!("{DEV_PHRASE}//stash///secret")), Ok(()));
    }

    #[test]
    fn accepts_hex_seed() {
        assert_eq!(validate_secret(HEX_SEED), Ok(()));
    }

    #[test]
    fn rejects_short_hex_seed() {
        assert_eq!(validate_secret("0x1234"), Err(SecretError::HexLength));
    }

    #[test]
    fn rejects_wrong_word_count() {
        assert_eq!(
            validate_secret("bottom drive obey lake curtain smoke basket hold race lonely fit"),
            Err(SecretError::WordCount(11))
        );
        assert_eq!(validate_secret("seed"), Err(SecretError::WordCount(1)));
    }

    #[test]
    fn rejects_bad_checksum() {
        let phrase = ["abandon"; 12].join(" ");
        assert_eq!(validate_secret(&phrase), Err(SecretError::InvalidMnemonic));
    }

    #[test]
    fn rejects_missing_phrase() {
        assert_eq!(validate_secret("//Alice"), Err(SecretError::MissingPhrase));
        assert_eq!(validate_secret("  "), Err(SecretError::MissingPhrase));
    }

    #[test]
    fn derives_well_known_dev_account() {
        let alice = derive_signer(&format!("{DEV_PHRASE}//Alice")).unwrap();
        assert_eq!(
            alice.public().to_ss58check(),
            "5GrwvaEF5zXb26Fz9rcQpDWS57CtERHpNehXCPcNoHGKutQY"
        );
    }
}
