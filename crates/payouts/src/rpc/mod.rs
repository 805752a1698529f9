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

//! [LedgerGateway] over the JSON-RPC interface of a Substrate node.
//!
//! Storage is read with `state_getStorage` and decoded against fixed SCALE layouts of the
//! staking pallet. Pallet and call indices, constants and signed extensions come from the runtime
//! metadata fetched on connect, so calls are built and signed locally.

mod extrinsic;
mod metadata;
mod storage;

use std::ops::Range;

use async_trait::async_trait;
use jsonrpsee::{
    core::{client::ClientT, params::ArrayParams},
    rpc_params,
    ws_client::{WsClient, WsClientBuilder},
};
use parity_scale_codec::{Decode, Encode};
use serde::{de::DeserializeOwned, Deserialize};
use sp_core::{
    crypto::{set_default_ss58_version, Ss58AddressFormat, Ss58Codec},
    sr25519, Bytes, Pair,
};
use url::Url;

pub use self::extrinsic::EncodedCall;
use self::{
    extrinsic::SigningContext,
    metadata::ChainMetadata,
    storage::{
        account_from_twox64_key, blake2_128_concat, decode, era_key, storage_key, storage_prefix,
        twox64_concat, ActiveEraInfo, EraRewardPoints, ExposureTotal, LedgerEntry,
        NominationsPrefix,
    },
};
use crate::{
    gateway::{GatewayError, LedgerGateway, Nominations, SubmitError},
    types::{AccountId, Amount, EraIndex, Receipt, StakingLedger, Weight, H256},
};

const STAKING: &str = "Staking";

/// Keys requested per `state_getKeysPaged` call.
const KEYS_PAGE_SIZE: u32 = 1000;

#[derive(Clone, Copy, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RuntimeVersion {
    spec_version: u32,
    transaction_version: u32,
}

#[derive(Debug, Deserialize)]
struct StorageChangeSet {
    changes: Vec<(Bytes, Option<Bytes>)>,
}

/// `frame_system::limits::WeightsPerClass`.
#[derive(Decode, Debug)]
struct WeightsPerClass {
    #[allow(dead_code)]
    base_extrinsic: Weight,
    max_extrinsic: Option<Weight>,
    #[allow(dead_code)]
    max_total: Option<Weight>,
    #[allow(dead_code)]
    reserved: Option<Weight>,
}

/// `frame_system::limits::BlockWeights`, normal class only.
#[derive(Decode, Debug)]
struct BlockWeights {
    #[allow(dead_code)]
    base_block: Weight,
    #[allow(dead_code)]
    max_block: Weight,
    normal: WeightsPerClass,
}

/// Leading fields of `RuntimeDispatchInfo`.
#[derive(Decode, Debug)]
struct DispatchInfo {
    weight: Weight,
}

#[derive(Clone, Copy, Debug)]
struct CallIndices {
    payout_stakers: [u8; 2],
    batch: [u8; 2],
}

/// Gateway to a Substrate node over a websocket connection.
pub struct RpcGateway {
    client: WsClient,
    metadata: ChainMetadata,
    genesis_hash: H256,
    runtime: RuntimeVersion,
    calls: CallIndices,
}

impl RpcGateway {
    /// Connect to the node at `url` and load the runtime metadata.
    ///
    /// Also sets the default SS58 address format to the chain's, so addresses are displayed the
    /// way the chain's tooling displays them.
    pub async fn connect(url: &Url) -> Result<Self, GatewayError> {
        let client = WsClientBuilder::default().build(url.as_str()).await.map_err(rpc_error)?;

        let metadata: Bytes = request(&client, "state_getMetadata", rpc_params![]).await?;
        let metadata = ChainMetadata::decode(&metadata)?;
        let genesis_hash: Option<H256> =
            request(&client, "chain_getBlockHash", rpc_params![0u32]).await?;
        let genesis_hash = genesis_hash
            .ok_or_else(|| GatewayError::Rpc("node did not return the genesis hash".to_string()))?;
        let runtime: RuntimeVersion =
            request(&client, "state_getRuntimeVersion", rpc_params![]).await?;

        let calls = CallIndices {
            payout_stakers: metadata.call_index(STAKING, "payout_stakers")?,
            batch: metadata.call_index("Utility", "batch")?,
        };

        if let Some(prefix) = metadata.constant("System", "SS58Prefix") {
            // Older runtimes declare the prefix as a u8.
            let prefix = match prefix {
                [prefix] => u16::from(*prefix),
                _ => decode::<u16>("System.SS58Prefix", prefix)?,
            };
            set_default_ss58_version(Ss58AddressFormat::custom(prefix));
        }

        tracing::debug!(
            "Connected to {url}, spec version {} transaction version {}",
            runtime.spec_version,
            runtime.transaction_version
        );
        Ok(Self { client, metadata, genesis_hash, runtime, calls })
    }

    async fn request<R: DeserializeOwned>(
        &self,
        method: &str,
        params: ArrayParams,
    ) -> Result<R, GatewayError> {
        request(&self.client, method, params).await
    }

    async fn storage(&self, key: Vec<u8>) -> Result<Option<Vec<u8>>, GatewayError> {
        let value: Option<Bytes> = self.request("state_getStorage", rpc_params![Bytes(key)]).await?;
        Ok(value.map(|bytes| bytes.0))
    }

    async fn decode_storage<T: Decode>(
        &self,
        what: &'static str,
        key: Vec<u8>,
    ) -> Result<Option<T>, GatewayError> {
        match self.storage(key).await? {
            Some(bytes) => decode(what, &bytes).map(Some),
            None => Ok(None),
        }
    }

    async fn exposure_total(
        &self,
        item: &'static str,
        account: &AccountId,
        era: EraIndex,
    ) -> Result<u128, GatewayError> {
        if !self.metadata.has_storage(STAKING, item) {
            return Ok(0);
        }
        let key = storage_key(STAKING, item, &[era_key(era), twox64_concat(account)]);
        Ok(self.decode_storage::<ExposureTotal>(item, key).await?.map_or(0, |e| e.total))
    }

    fn signing_context(&self) -> SigningContext<'_> {
        SigningContext {
            spec_version: self.runtime.spec_version,
            transaction_version: self.runtime.transaction_version,
            genesis_hash: self.genesis_hash,
            extensions: &self.metadata.signed_extensions,
        }
    }
}

#[async_trait]
impl LedgerGateway for RpcGateway {
    type Operation = EncodedCall;
    type Signer = sr25519::Pair;

    async fn current_era(&self) -> Result<Option<EraIndex>, GatewayError> {
        let key = storage_prefix(STAKING, "ActiveEra");
        let active: Option<ActiveEraInfo> = self.decode_storage("Staking.ActiveEra", key).await?;
        Ok(active.map(|era| era.index))
    }

    async fn history_depth(&self) -> Result<Option<EraIndex>, GatewayError> {
        self.metadata
            .constant(STAKING, "HistoryDepth")
            .map(|value| decode::<u32>("Staking.HistoryDepth", value))
            .transpose()
    }

    async fn delegation_targets(
        &self,
        address: &AccountId,
    ) -> Result<Option<Nominations>, GatewayError> {
        let key = storage_key(STAKING, "Nominators", &[twox64_concat(address)]);
        let nominations: Option<NominationsPrefix> =
            self.decode_storage("Staking.Nominators", key).await?;
        Ok(nominations.map(|n| Nominations { targets: n.targets }))
    }

    async fn nominators(&self) -> Result<Vec<(AccountId, Nominations)>, GatewayError> {
        let prefix = storage_prefix(STAKING, "Nominators");
        let mut nominators = Vec::new();
        let mut start_key: Option<Bytes> = None;

        loop {
            let keys: Vec<Bytes> = self
                .request(
                    "state_getKeysPaged",
                    rpc_params![Bytes(prefix.clone()), KEYS_PAGE_SIZE, start_key.clone()],
                )
                .await?;
            let Some(last) = keys.last().cloned() else {
                break;
            };
            let page_len = keys.len();

            let change_sets: Vec<StorageChangeSet> =
                self.request("state_queryStorageAt", rpc_params![keys]).await?;
            for (key, value) in change_sets.into_iter().flat_map(|set| set.changes) {
                let (Some(nominator), Some(value)) =
                    (account_from_twox64_key(prefix.len(), &key), value)
                else {
                    continue;
                };
                let nominations: NominationsPrefix = decode("Staking.Nominators", &value)?;
                nominators.push((nominator, Nominations { targets: nominations.targets }));
            }

            if page_len < KEYS_PAGE_SIZE as usize {
                break;
            }
            start_key = Some(last);
        }

        Ok(nominators)
    }

    async fn bonded_controller(
        &self,
        stash: &AccountId,
    ) -> Result<Option<AccountId>, GatewayError> {
        let key = storage_key(STAKING, "Bonded", &[twox64_concat(stash)]);
        self.decode_storage("Staking.Bonded", key).await
    }

    async fn ledger(&self, controller: &AccountId) -> Result<Option<StakingLedger>, GatewayError> {
        let key = storage_key(STAKING, "Ledger", &[blake2_128_concat(controller)]);
        let Some(entry) = self.decode_storage::<LedgerEntry>("Staking.Ledger", key).await? else {
            return Ok(None);
        };

        Ok(Some(StakingLedger {
            claimed_rewards: entry.claimed_rewards,
            active: Amount::from(entry.active),
        }))
    }

    /// Eras in which `stash` claimed at least one page of rewards.
    async fn claimed_eras(
        &self,
        stash: &AccountId,
        eras: Range<EraIndex>,
    ) -> Result<Vec<EraIndex>, GatewayError> {
        if !self.metadata.has_storage(STAKING, "ClaimedRewards") {
            return Ok(Vec::new());
        }
        let mut claimed = Vec::new();
        for era in eras {
            let key =
                storage_key(STAKING, "ClaimedRewards", &[era_key(era), twox64_concat(stash)]);
            let pages: Option<Vec<u32>> =
                self.decode_storage("Staking.ClaimedRewards", key).await?;
            if pages.is_some_and(|pages| !pages.is_empty()) {
                claimed.push(era);
            }
        }
        Ok(claimed)
    }

    async fn has_exposure_or_points(
        &self,
        account: &AccountId,
        era: EraIndex,
    ) -> Result<bool, GatewayError> {
        if self.exposure_total("ErasStakers", account, era).await? > 0 {
            return Ok(true);
        }
        if self.exposure_total("ErasStakersOverview", account, era).await? > 0 {
            return Ok(true);
        }
        let key = storage_key(STAKING, "ErasRewardPoints", &[era_key(era)]);
        let points: EraRewardPoints =
            self.decode_storage("Staking.ErasRewardPoints", key).await?.unwrap_or_default();
        Ok(points.individual.get(account).is_some_and(|points| *points > 0))
    }

    fn build_claim_operation(&self, account: &AccountId, era: EraIndex) -> EncodedCall {
        extrinsic::payout_stakers(self.calls.payout_stakers, account, era)
    }

    fn build_composite_operation(&self, operations: Vec<EncodedCall>) -> EncodedCall {
        extrinsic::batch(self.calls.batch, operations)
    }

    async fn estimate_cost(
        &self,
        operation: &EncodedCall,
        signer: &sr25519::Pair,
    ) -> Result<Weight, GatewayError> {
        // The fee query does not check the nonce.
        let mut data = extrinsic::signed_extrinsic(operation, signer, 0, &self.signing_context())?;
        (data.len() as u32).encode_to(&mut data);

        let info: Bytes = self
            .request("state_call", rpc_params!["TransactionPaymentApi_query_info", Bytes(data)])
            .await?;
        dispatch_weight(&info)
    }

    async fn max_allowed_weight(&self) -> Result<Weight, GatewayError> {
        let value = self
            .metadata
            .constant("System", "BlockWeights")
            .ok_or_else(|| GatewayError::MissingMetadata("constant System.BlockWeights".into()))?;
        max_extrinsic_weight(value)
    }

    async fn sign_and_submit(
        &self,
        operation: &EncodedCall,
        signer: &sr25519::Pair,
        nonce: Option<u32>,
    ) -> Result<Receipt, SubmitError> {
        let nonce = match nonce {
            Some(nonce) => nonce,
            None => {
                let address = AccountId::from(signer.public()).to_ss58check();
                self.request("system_accountNextIndex", rpc_params![address]).await?
            }
        };
        let extrinsic =
            extrinsic::signed_extrinsic(operation, signer, nonce, &self.signing_context())
                .map_err(|e| SubmitError::Signing(e.to_string()))?;

        self.client
            .request("author_submitExtrinsic", rpc_params![Bytes(extrinsic)])
            .await
            .map_err(|e| SubmitError::Rejected(e.to_string()))
    }
}

async fn request<R: DeserializeOwned>(
    client: &WsClient,
    method: &str,
    params: ArrayParams,
) -> Result<R, GatewayError> {
    client.request(method, params).await.map_err(rpc_error)
}

fn rpc_error(e: impl std::fmt::Display) -> GatewayError {
    GatewayError::Rpc(e.to_string())
}

/// Weight reported by `TransactionPaymentApi_query_info`.
fn dispatch_weight(info: &[u8]) -> Result<Weight, GatewayError> {
    let info: DispatchInfo = decode("RuntimeDispatchInfo", info)?;
    Ok(info.weight)
}

/// Maximum weight of a normal-class extrinsic, from the `System.BlockWeights` constant.
fn max_extrinsic_weight(block_weights: &[u8]) -> Result<Weight, GatewayError> {
    let weights: BlockWeights = decode("System.BlockWeights", block_weights)?;
    weights.normal.max_extrinsic.ok_or_else(|| {
        GatewayError::MissingMetadata("maximum extrinsic weight of the normal class".into())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn weights_per_class(max_extrinsic: Option<Weight>) -> Vec<u8> {
        let mut bytes = Weight::from_parts(125_000_000, 0).encode();
        max_extrinsic.encode_to(&mut bytes);
        Some(Weight::from_parts(1_500_000_000_000, 3_932_160)).encode_to(&mut bytes);
        Some(Weight::zero()).encode_to(&mut bytes);
        bytes
    }

    fn block_weights(normal_max_extrinsic: Option<Weight>) -> Vec<u8> {
        let mut bytes = Weight::from_parts(390_000_000, 0).encode();
        Weight::from_parts(2_000_000_000_000, 5_242_880).encode_to(&mut bytes);
        bytes.extend(weights_per_class(normal_max_extrinsic));
        // Operational and mandatory classes follow the normal class.
        bytes.extend(weights_per_class(Some(Weight::from_parts(1_000, 1_000))));
        bytes.extend(weights_per_class(None));
        bytes
    }

    #[test]
    fn reads_normal_class_max_extrinsic() {
        let bytes = block_weights(Some(Weight::from_parts(1_479_875_000_000, 3_670_016)));
        let weight = max_extrinsic_weight(&bytes).unwrap();
        assert_eq!(weight.ref_time(), 1_479_875_000_000);
        assert_eq!(weight.proof_size(), 3_670_016);
    }

    #[test]
    fn unbounded_normal_class_is_missing_metadata() {
        let err = max_extrinsic_weight(&block_weights(None)).unwrap_err();
        assert!(matches!(err, GatewayError::MissingMetadata(_)));
    }

    #[test]
    fn truncated_block_weights_fail_to_decode() {
        let bytes = Weight::from_parts(390_000_000, 0).encode();
        let err = max_extrinsic_weight(&bytes).unwrap_err();
        assert!(matches!(err, GatewayError::Decode { what: "System.BlockWeights", .. }));
    }

    #[test]
    fn reads_weight_from_dispatch_info() {
        // RuntimeDispatchInfo { weight, class: Normal, partial_fee }
        let mut bytes = Weight::from_parts(62_000_000_000, 45_000).encode();
        0u8.encode_to(&mut bytes);
        156_000_000u128.encode_to(&mut bytes);

        let weight = dispatch_weight(&bytes).unwrap();
        assert_eq!(weight, Weight::from_parts(62_000_000_000, 45_000));
    }
}
