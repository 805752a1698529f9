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

//! The parts of the runtime metadata needed to read staking state and build transactions.

use std::collections::{HashMap, HashSet};

use frame_metadata::{RuntimeMetadata, RuntimeMetadataPrefixed};
use parity_scale_codec::Decode;
use scale_info::{PortableRegistry, TypeDef};

use crate::gateway::GatewayError;

/// Extrinsic format version this crate encodes.
pub(crate) const EXTRINSIC_VERSION: u8 = 4;

#[derive(Clone, Debug, Default)]
pub(crate) struct PalletInfo {
    pub index: u8,
    pub calls: HashMap<String, u8>,
    pub constants: HashMap<String, Vec<u8>>,
    pub storage: HashSet<String>,
}

/// A signed extension in the order the runtime expects it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct SignedExtension {
    pub identifier: String,
    /// True if both the extra and the additional data encode to nothing.
    pub empty: bool,
}

#[derive(Clone, Debug, Default)]
pub(crate) struct ChainMetadata {
    pallets: HashMap<String, PalletInfo>,
    pub signed_extensions: Vec<SignedExtension>,
}

/// V14 and V15 metadata share the layout of pallets and signed extensions.
macro_rules! from_metadata {
    ($m:expr) => {{
        let m = $m;
        check_extrinsic_version(m.extrinsic.version)?;
        let pallets = m
            .pallets
            .iter()
            .map(|p| {
                let info = pallet_info(
                    &m.types,
                    p.index,
                    p.calls.as_ref().map(|c| c.ty.id),
                    p.constants.iter().map(|c| (c.name.clone(), c.value.clone())),
                    p.storage.iter().flat_map(|s| s.entries.iter().map(|e| e.name.clone())),
                );
                (p.name.clone(), info)
            })
            .collect();
        let signed_extensions = m
            .extrinsic
            .signed_extensions
            .iter()
            .map(|e| SignedExtension {
                identifier: e.identifier.clone(),
                empty: is_empty_type(&m.types, e.ty.id)
                    && is_empty_type(&m.types, e.additional_signed.id),
            })
            .collect();
        Ok(Self { pallets, signed_extensions })
    }};
}

impl ChainMetadata {
    /// Decode the bytes returned by `state_getMetadata`.
    pub fn decode(bytes: &[u8]) -> Result<Self, GatewayError> {
        let prefixed = RuntimeMetadataPrefixed::decode(&mut &bytes[..])
            .map_err(|e| GatewayError::decode("runtime metadata", e))?;

        match prefixed.1 {
            RuntimeMetadata::V14(m) => from_metadata!(m),
            RuntimeMetadata::V15(m) => from_metadata!(m),
            other => Err(GatewayError::Unsupported(format!(
                "metadata version {}",
                other.version()
            ))),
        }
    }

    fn pallet(&self, pallet: &str) -> Result<&PalletInfo, GatewayError> {
        self.pallets
            .get(pallet)
            .ok_or_else(|| GatewayError::MissingMetadata(format!("pallet {pallet}")))
    }

    /// Pallet and call index of `pallet.call`.
    pub fn call_index(&self, pallet: &str, call: &str) -> Result<[u8; 2], GatewayError> {
        let info = self.pallet(pallet)?;
        let call_index = info
            .calls
            .get(call)
            .ok_or_else(|| GatewayError::MissingMetadata(format!("call {pallet}.{call}")))?;
        Ok([info.index, *call_index])
    }

    /// Raw SCALE value of a pallet constant, if the pallet declares it.
    pub fn constant(&self, pallet: &str, name: &str) -> Option<&[u8]> {
        self.pallets.get(pallet)?.constants.get(name).map(Vec::as_slice)
    }

    /// Whether the runtime declares the storage item `pallet.item`.
    pub fn has_storage(&self, pallet: &str, item: &str) -> bool {
        self.pallets.get(pallet).is_some_and(|p| p.storage.contains(item))
    }

    #[cfg(test)]
    pub(crate) fn with_pallet(mut self, name: &str, info: PalletInfo) -> Self {
        self.pallets.insert(name.to_string(), info);
        self
    }
}

fn check_extrinsic_version(version: u8) -> Result<(), GatewayError> {
    if version != EXTRINSIC_VERSION {
        return Err(GatewayError::Unsupported(format!("extrinsic version {version}")));
    }
    Ok(())
}

fn pallet_info(
    types: &PortableRegistry,
    index: u8,
    calls_ty: Option<u32>,
    constants: impl Iterator<Item = (String, Vec<u8>)>,
    storage: impl Iterator<Item = String>,
) -> PalletInfo {
    let calls = calls_ty
        .and_then(|id| types.resolve(id))
        .map(|ty| match &ty.type_def {
            TypeDef::Variant(variants) => {
                variants.variants.iter().map(|v| (v.name.clone(), v.index)).collect()
            }
            _ => HashMap::new(),
        })
        .unwrap_or_default();

    PalletInfo { index, calls, constants: constants.collect(), storage: storage.collect() }
}

/// True if values of type `id` always encode to zero bytes.
fn is_empty_type(types: &PortableRegistry, id: u32) -> bool {
    match types.resolve(id).map(|ty| &ty.type_def) {
        Some(TypeDef::Composite(composite)) => {
            composite.fields.iter().all(|field| is_empty_type(types, field.ty.id))
        }
        Some(TypeDef::Tuple(tuple)) => {
            tuple.fields.iter().all(|field| is_empty_type(types, field.id))
        }
        _ => false,
    }
}
