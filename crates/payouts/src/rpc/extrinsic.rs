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

//! Encoding of runtime calls and signed extrinsics.

use parity_scale_codec::{Compact, Encode};
use sp_core::{hashing::blake2_256, sr25519, Pair};

use super::metadata::{SignedExtension, EXTRINSIC_VERSION};
use crate::{
    gateway::GatewayError,
    types::{AccountId, EraIndex, H256},
};

/// Signed payloads longer than this are hashed before signing.
const MAX_UNHASHED_PAYLOAD: usize = 256;

/// Bit set on the version byte of signed extrinsics.
const SIGNED_FLAG: u8 = 0b1000_0000;

/// `MultiAddress::Id`.
const ADDRESS_ID: u8 = 0x00;

/// `MultiSignature::Sr25519`.
const SIGNATURE_SR25519: u8 = 0x01;

/// A SCALE encoded runtime call.
#[derive(Clone, PartialEq, Eq)]
pub struct EncodedCall(pub(crate) Vec<u8>);

impl EncodedCall {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl std::fmt::Debug for EncodedCall {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "EncodedCall(0x{})", hex::encode(&self.0))
    }
}

/// `Staking.payout_stakers(stash, era)`.
pub(crate) fn payout_stakers(index: [u8; 2], stash: &AccountId, era: EraIndex) -> EncodedCall {
    let mut call = index.to_vec();
    stash.encode_to(&mut call);
    era.encode_to(&mut call);
    EncodedCall(call)
}

/// `Utility.batch(calls)`.
pub(crate) fn batch(index: [u8; 2], calls: Vec<EncodedCall>) -> EncodedCall {
    let mut call = index.to_vec();
    Compact(calls.len() as u32).encode_to(&mut call);
    for inner in calls {
        call.extend(inner.0);
    }
    EncodedCall(call)
}

/// Chain values committed to by every signature.
#[derive(Clone, Debug)]
pub(crate) struct SigningContext<'a> {
    pub spec_version: u32,
    pub transaction_version: u32,
    pub genesis_hash: H256,
    pub extensions: &'a [SignedExtension],
}

impl SigningContext<'_> {
    /// Encode the extra data carried in the extrinsic and the additional data only signed over.
    fn encode_extensions(&self, nonce: u32) -> Result<(Vec<u8>, Vec<u8>), GatewayError> {
        let mut extra = Vec::new();
        let mut additional = Vec::new();
        for extension in self.extensions {
            match extension.identifier.as_str() {
                "CheckSpecVersion" => self.spec_version.encode_to(&mut additional),
                "CheckTxVersion" => self.transaction_version.encode_to(&mut additional),
                "CheckGenesis" => self.genesis_hash.encode_to(&mut additional),
                "CheckMortality" | "CheckEra" => {
                    // Immortal era, checked against the genesis hash.
                    extra.push(0x00);
                    self.genesis_hash.encode_to(&mut additional);
                }
                "CheckNonce" => Compact(nonce).encode_to(&mut extra),
                "ChargeTransactionPayment" => Compact(0u128).encode_to(&mut extra),
                "ChargeAssetTxPayment" => {
                    Compact(0u128).encode_to(&mut extra);
                    None::<()>.encode_to(&mut extra);
                }
                "CheckMetadataHash" => {
                    // Mode::Disabled, no metadata hash.
                    extra.push(0x00);
                    None::<H256>.encode_to(&mut additional);
                }
                _ if extension.empty => {}
                other => {
                    return Err(GatewayError::Unsupported(format!("signed extension {other}")))
                }
            }
        }
        Ok((extra, additional))
    }
}

/// Build a signed extrinsic for `call`, ready for submission.
pub(crate) fn signed_extrinsic(
    call: &EncodedCall,
    signer: &sr25519::Pair,
    nonce: u32,
    context: &SigningContext<'_>,
) -> Result<Vec<u8>, GatewayError> {
    let (extra, additional) = context.encode_extensions(nonce)?;

    let mut payload = Vec::with_capacity(call.0.len() + extra.len() + additional.len());
    payload.extend_from_slice(&call.0);
    payload.extend_from_slice(&extra);
    payload.extend_from_slice(&additional);
    let signature = if payload.len() > MAX_UNHASHED_PAYLOAD {
        signer.sign(&blake2_256(&payload))
    } else {
        signer.sign(&payload)
    };

    let mut body = vec![SIGNED_FLAG | EXTRINSIC_VERSION, ADDRESS_ID];
    AccountId::from(signer.public()).encode_to(&mut body);
    body.push(SIGNATURE_SR25519);
    signature.encode_to(&mut body);
    body.extend_from_slice(&extra);
    body.extend_from_slice(&call.0);

    // Length-prefixed, as a `Vec<u8>` encodes.
    Ok(body.encode())
}

#[cfg(test)]
mod tests {
    use parity_scale_codec::Decode;
    use sp_core::crypto::DEV_PHRASE;

    use super::*;

    fn extension(identifier: &str, empty: bool) -> SignedExtension {
        SignedExtension { identifier: identifier.to_string(), empty }
    }

    fn alice() -> sr25519::Pair {
        sr25519::Pair::from_string(&format!("{DEV_PHRASE}//Alice"), None).unwrap()
    }

    #[test]
    fn encodes_payout_stakers() {
        let stash = AccountId::new([2u8; 32]);
        let call = payout_stakers([6, 18], &stash, 1000);
        let bytes = call.as_bytes();
        assert_eq!(&bytes[..2], &[6, 18]);
        assert_eq!(&bytes[2..34], &[2u8; 32]);
        assert_eq!(&bytes[34..], &1000u32.to_le_bytes());
    }

    #[test]
    fn encodes_batch_with_compact_length() {
        let stash = AccountId::new([2u8; 32]);
        let calls: Vec<_> = (0..3).map(|era| payout_stakers([6, 18], &stash, era)).collect();
        let call_len = calls[0].as_bytes().len();
        let batched = batch([26, 0], calls.clone());
        let bytes = batched.as_bytes();
        assert_eq!(&bytes[..3], &[26, 0, 3 << 2]);
        assert_eq!(bytes.len(), 3 + 3 * call_len);
        assert_eq!(&bytes[3..3 + call_len], calls[0].as_bytes());
    }

    #[test]
    fn signs_extrinsic_with_extensions() {
        let extensions = vec![
            extension("CheckNonZeroSender", true),
            extension("CheckSpecVersion", false),
            extension("CheckTxVersion", false),
            extension("CheckGenesis", false),
            extension("CheckMortality", false),
            extension("CheckNonce", false),
            extension("CheckWeight", true),
            extension("ChargeTransactionPayment", false),
        ];
        let context = SigningContext {
            spec_version: 1_002_000,
            transaction_version: 26,
            genesis_hash: H256::repeat_byte(0xab),
            extensions: &extensions,
        };
        let signer = alice();
        let call = payout_stakers([6, 18], &AccountId::new([2u8; 32]), 7);

        let encoded = signed_extrinsic(&call, &signer, 5, &context).unwrap();
        let body = Vec::<u8>::decode(&mut &encoded[..]).unwrap();

        assert_eq!(body[0], 0x84);
        assert_eq!(body[1], ADDRESS_ID);
        assert_eq!(body[2..34], AccountId::from(signer.public()).encode());
        assert_eq!(body[34], SIGNATURE_SR25519);
        // Immortal era, nonce 5, zero tip, then the call.
        assert_eq!(&body[99..102], &[0x00, 5 << 2, 0x00]);
        assert_eq!(&body[102..], call.as_bytes());

        let mut payload = call.as_bytes().to_vec();
        payload.extend_from_slice(&[0x00, 5 << 2, 0x00]);
        payload.extend_from_slice(&1_002_000u32.to_le_bytes());
        payload.extend_from_slice(&26u32.to_le_bytes());
        payload.extend_from_slice(H256::repeat_byte(0xab).as_bytes());
        payload.extend_from_slice(H256::repeat_byte(0xab).as_bytes());
        let signature = sr25519::Signature::decode(&mut &body[35..99]).unwrap();
        assert!(sr25519::Pair::verify(&signature, &payload, &signer.public()));
    }

    #[test]
    fn hashes_long_payloads_before_signing() {
        let context = SigningContext {
            spec_version: 1,
            transaction_version: 1,
            genesis_hash: H256::zero(),
            extensions: &[],
        };
        let signer = alice();
        let stash = AccountId::new([3u8; 32]);
        let call = batch([26, 0], (0..9).map(|era| payout_stakers([6, 18], &stash, era)).collect());
        assert!(call.as_bytes().len() > MAX_UNHASHED_PAYLOAD);

        let encoded = signed_extrinsic(&call, &signer, 0, &context).unwrap();
        let body = Vec::<u8>::decode(&mut &encoded[..]).unwrap();
        let signature = sr25519::Signature::decode(&mut &body[35..99]).unwrap();
        assert!(sr25519::Pair::verify(&signature, blake2_256(call.as_bytes()), &signer.public()));
    }

    #[test]
    fn rejects_unknown_extension_with_data() {
        let extensions = vec![extension("CheckSomethingNew", false)];
        let context = SigningContext {
            spec_version: 1,
            transaction_version: 1,
            genesis_hash: H256::zero(),
            extensions: &extensions,
        };
        let call = payout_stakers([6, 18], &AccountId::new([2u8; 32]), 7);
        assert!(matches!(
            signed_extrinsic(&call, &alice(), 0, &context),
            Err(GatewayError::Unsupported(_))
        ));
    }
}
