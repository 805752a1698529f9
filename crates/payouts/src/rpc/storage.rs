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

//! Storage keys and SCALE layouts of the staking pallet entries that are read.

use std::collections::BTreeMap;

use parity_scale_codec::{Decode, Encode};
use sp_core::hashing::{blake2_128, twox_128, twox_64};

use crate::types::{AccountId, EraIndex};

/// Hashers used by storage maps.
#[derive(Clone, Copy, Debug)]
pub(crate) enum Hasher {
    Twox64Concat,
    Blake2_128Concat,
}

impl Hasher {
    fn hash_into(self, key: &[u8], out: &mut Vec<u8>) {
        match self {
            Hasher::Twox64Concat => out.extend_from_slice(&twox_64(key)),
            Hasher::Blake2_128Concat => out.extend_from_slice(&blake2_128(key)),
        }
        out.extend_from_slice(key);
    }
}

/// Key prefix of a storage item: `twox128(pallet) ++ twox128(item)`.
pub(crate) fn storage_prefix(pallet: &str, item: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(32);
    key.extend_from_slice(&twox_128(pallet.as_bytes()));
    key.extend_from_slice(&twox_128(item.as_bytes()));
    key
}

/// Key of a map entry, hashing each encoded key part with its hasher.
pub(crate) fn storage_key(pallet: &str, item: &str, keys: &[(Hasher, Vec<u8>)]) -> Vec<u8> {
    let mut key = storage_prefix(pallet, item);
    for (hasher, part) in keys {
        hasher.hash_into(part, &mut key);
    }
    key
}

/// Account encoded at the end of a `Twox64Concat` map key under `prefix`.
pub(crate) fn account_from_twox64_key(prefix_len: usize, key: &[u8]) -> Option<AccountId> {
    let start = prefix_len + 8;
    let raw: [u8; 32] = key.get(start..start + 32)?.try_into().ok()?;
    Some(AccountId::new(raw))
}

pub(crate) fn twox64_concat(account: &AccountId) -> (Hasher, Vec<u8>) {
    (Hasher::Twox64Concat, account.encode())
}

pub(crate) fn blake2_128_concat(account: &AccountId) -> (Hasher, Vec<u8>) {
    (Hasher::Blake2_128Concat, account.encode())
}

pub(crate) fn era_key(era: EraIndex) -> (Hasher, Vec<u8>) {
    (Hasher::Twox64Concat, era.encode())
}

#[derive(Decode, Debug)]
pub(crate) struct ActiveEraInfo {
    pub index: EraIndex,
    #[allow(dead_code)]
    pub start: Option<u64>,
}

/// Leading fields of `Nominations`; trailing fields are not decoded.
#[derive(Decode, Debug)]
pub(crate) struct NominationsPrefix {
    pub targets: Vec<AccountId>,
}

#[derive(Decode, Debug)]
pub(crate) struct UnlockChunk {
    #[codec(compact)]
    #[allow(dead_code)]
    pub value: u128,
    #[codec(compact)]
    #[allow(dead_code)]
    pub era: EraIndex,
}

#[derive(Decode, Debug)]
pub(crate) struct LedgerEntry {
    #[allow(dead_code)]
    pub stash: AccountId,
    #[codec(compact)]
    #[allow(dead_code)]
    pub total: u128,
    #[codec(compact)]
    pub active: u128,
    #[allow(dead_code)]
    pub unlocking: Vec<UnlockChunk>,
    pub claimed_rewards: Vec<EraIndex>,
}

/// Leading field shared by `Exposure` and `PagedExposureMetadata`.
#[derive(Decode, Debug)]
pub(crate) struct ExposureTotal {
    #[codec(compact)]
    pub total: u128,
}

#[derive(Decode, Debug, Default)]
pub(crate) struct EraRewardPoints {
    #[allow(dead_code)]
    pub total: u32,
    pub individual: BTreeMap<AccountId, u32>,
}

/// Decode the leading fields of `T` from raw storage bytes.
pub(crate) fn decode<T: Decode>(
    what: &'static str,
    bytes: &[u8],
) -> Result<T, crate::gateway::GatewayError> {
    T::decode(&mut &bytes[..]).map_err(|e| crate::gateway::GatewayError::decode(what, e))
}
