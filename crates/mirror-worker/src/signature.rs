//! Decodes the function a transaction calls from its target contract's ABI.

use crate::records::contract_key;
use alloy::primitives::{
    Address,
    Selector,
    U256,
};
use alloy_dyn_abi::JsonAbiExt;
use alloy_json_abi::{
    Function,
    JsonAbi,
    StateMutability,
};
use mirror_store::{
    Collection,
    Gateway,
    StoreError,
};
use std::sync::Arc;
use tracing::debug;

#[derive(thiserror::Error, Debug)]
pub enum DecodeError {
    #[error("Stored ABI is invalid: {0}")]
    InvalidAbi(#[from] serde_json::Error),
    #[error("Call data is {0} bytes, shorter than a selector")]
    ShortInput(usize),
    #[error("No function matches selector {0}")]
    UnknownSelector(Selector),
    #[error("Failed to decode call data: {0}")]
    Abi(#[from] alloy_dyn_abi::Error),
}

#[derive(thiserror::Error, Debug)]
pub enum SignatureError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Decode(#[from] DecodeError),
}

/// Looks up stored contract ABIs and renders called-function signatures.
#[derive(Clone)]
pub struct SignatureResolver {
    gateway: Arc<dyn Gateway>,
}

impl SignatureResolver {
    pub fn new(gateway: Arc<dyn Gateway>) -> Self {
        Self { gateway }
    }

    /// `Ok(None)` when the target is unknown or has no ABI yet. A selector
    /// that matches nothing is a [`DecodeError`].
    pub async fn resolve_signature(
        &self,
        to: Address,
        input: &[u8],
        value: U256,
    ) -> Result<Option<String>, SignatureError> {
        let key = contract_key(&to);
        let Some(contract) = self.gateway.get(Collection::Contracts, &key).await? else {
            debug!(address = %key, "no contract record, skipping signature");
            return Ok(None);
        };
        let Some(abi) = contract.get("abi").filter(|abi| !abi.is_null()) else {
            debug!(address = %key, "contract has no ABI, skipping signature");
            return Ok(None);
        };

        let abi: JsonAbi = serde_json::from_value(abi.clone()).map_err(DecodeError::from)?;
        Ok(Some(decode_signature(&abi, input, value)?))
    }
}

/// Match `input` against the functions of `abi`.
///
/// With a non-zero `value` payable candidates are tried first.
pub fn decode_signature(abi: &JsonAbi, input: &[u8], value: U256) -> Result<String, DecodeError> {
    let (selector, data) = match input.split_first_chunk::<4>() {
        Some((selector, data)) => (Selector::from(*selector), data),
        None => return Err(DecodeError::ShortInput(input.len())),
    };

    let mut candidates: Vec<&Function> = abi
        .functions()
        .filter(|function| function.selector() == selector)
        .collect();
    if candidates.is_empty() {
        return Err(DecodeError::UnknownSelector(selector));
    }
    if !value.is_zero() {
        candidates.sort_by_key(|function| function.state_mutability != StateMutability::Payable);
    }

    let mut last_error = None;
    for function in candidates {
        match function.abi_decode_input(data) {
            Ok(_) => return Ok(render_signature(function)),
            Err(err) => last_error = Some(err),
        }
    }
    Err(last_error.map_or(DecodeError::UnknownSelector(selector), DecodeError::Abi))
}

/// `name(type0 name0, type1 name1)`. Unnamed parameters render as the bare type.
pub fn render_signature(function: &Function) -> String {
    let params = function
        .inputs
        .iter()
        .map(|param| {
            if param.name.is_empty() {
                param.ty.clone()
            } else {
                format!("{} {}", param.ty, param.name)
            }
        })
        .collect::<Vec<_>>()
        .join(", ");
    format!("{}({params})", function.name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{
        token_abi,
        transfer_calldata,
    };
    use alloy::primitives::address;
    use alloy_dyn_abi::DynSolValue;
    use mirror_store::{
        MemoryGateway,
        UpsertOptions,
    };
    use serde_json::json;

    #[test]
    fn test_decode_transfer_signature() {
        let abi: JsonAbi = serde_json::from_value(token_abi()).unwrap();
        let signature = decode_signature(&abi, &transfer_calldata(), U256::ZERO).unwrap();
        assert_eq!(signature, "transfer(address to, uint256 amount)");
    }

    #[test]
    fn test_unnamed_parameter_renders_type_only() {
        let abi: JsonAbi = serde_json::from_value(token_abi()).unwrap();
        let burn = abi.function("burn").unwrap().first().unwrap();
        assert_eq!(render_signature(burn), "burn(uint256)");
    }

    #[test]
    fn test_unknown_selector_is_decode_error() {
        let abi: JsonAbi = serde_json::from_value(token_abi()).unwrap();
        let result = decode_signature(&abi, &[0xde, 0xad, 0xbe, 0xef, 0x00], U256::ZERO);
        assert!(matches!(result, Err(DecodeError::UnknownSelector(_))));
    }

    #[test]
    fn test_short_input_is_decode_error() {
        let abi: JsonAbi = serde_json::from_value(token_abi()).unwrap();
        let result = decode_signature(&abi, &[0xa9, 0x05], U256::ZERO);
        assert!(matches!(result, Err(DecodeError::ShortInput(2))));
    }

    #[test]
    fn test_truncated_arguments_are_decode_error() {
        let abi: JsonAbi = serde_json::from_value(token_abi()).unwrap();
        let calldata = transfer_calldata();
        let result = decode_signature(&abi, &calldata[..20], U256::ZERO);
        assert!(matches!(result, Err(DecodeError::Abi(_))));
    }

    #[test]
    fn test_value_prefers_payable_candidate() {
        // Merged ABIs can carry the same selector twice.
        let abi: JsonAbi = serde_json::from_value(json!([
            {
                "type": "function",
                "name": "deposit",
                "inputs": [{ "name": "amount", "type": "uint256" }],
                "outputs": [],
                "stateMutability": "nonpayable"
            },
            {
                "type": "function",
                "name": "deposit",
                "inputs": [{ "name": "minOut", "type": "uint256" }],
                "outputs": [],
                "stateMutability": "payable"
            }
        ]))
        .unwrap();
        let deposit = abi.function("deposit").unwrap().first().unwrap();
        let calldata = deposit
            .abi_encode_input(&[DynSolValue::Uint(U256::from(7), 256)])
            .unwrap();

        assert_eq!(
            decode_signature(&abi, &calldata, U256::ZERO).unwrap(),
            "deposit(uint256 amount)"
        );
        assert_eq!(
            decode_signature(&abi, &calldata, U256::from(1)).unwrap(),
            "deposit(uint256 minOut)"
        );
    }

    #[tokio::test]
    async fn test_resolve_without_contract_is_none() {
        let resolver = SignatureResolver::new(Arc::new(MemoryGateway::new()));
        let signature = resolver
            .resolve_signature(Address::ZERO, &transfer_calldata(), U256::ZERO)
            .await
            .unwrap();
        assert!(signature.is_none());
    }

    #[tokio::test]
    async fn test_resolve_without_abi_is_none() {
        let gateway = Arc::new(MemoryGateway::new());
        let target = address!("0x00000000000000000000000000000000000000bb");
        gateway
            .upsert(
                Collection::Contracts,
                &contract_key(&target),
                json!({ "address": target }).as_object().cloned().unwrap(),
                UpsertOptions::MERGE,
            )
            .await
            .unwrap();

        let resolver = SignatureResolver::new(gateway);
        let signature = resolver
            .resolve_signature(target, &transfer_calldata(), U256::ZERO)
            .await
            .unwrap();
        assert!(signature.is_none());
    }

    #[tokio::test]
    async fn test_resolve_with_stored_abi() {
        let gateway = Arc::new(MemoryGateway::new());
        let target = address!("0x00000000000000000000000000000000000000cc");
        gateway
            .upsert(
                Collection::Contracts,
                &contract_key(&target),
                json!({ "address": target, "name": "Token", "abi": token_abi() })
                    .as_object()
                    .cloned()
                    .unwrap(),
                UpsertOptions::MERGE,
            )
            .await
            .unwrap();

        let resolver = SignatureResolver::new(gateway);
        let signature = resolver
            .resolve_signature(target, &transfer_calldata(), U256::ZERO)
            .await
            .unwrap();
        assert_eq!(
            signature.as_deref(),
            Some("transfer(address to, uint256 amount)")
        );
    }
}
