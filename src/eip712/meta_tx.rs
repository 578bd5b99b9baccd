use ethers_core::types::{transaction::eip712::Types, Address, Bytes, U256};
use ethers_signers::LocalWallet;
use once_cell::sync::Lazy;
use serde_json::json;

use crate::{
    eip712::{member, sign_typed_data, split_signature, SignatureParts, TypedData, TypedDataVersion, TypedDomain},
    Result,
};

static META_TX_TYPES: Lazy<Types> = Lazy::new(|| {
    let mut types = Types::new();
    types.insert(
        "MetaTransaction".to_owned(),
        vec![
            member("nonce", "uint256"),
            member("from", "address"),
            member("functionSignature", "bytes"),
        ],
    );
    types
});

/// Message accepted by a token's `executeMetaTransaction`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetaTransaction {
    /// Token name
    pub name: String,
    /// Domain version
    pub version: String,
    /// Chain id, folded into the domain salt
    pub chain_id: u64,
    /// Token contract
    pub verifying_contract: Address,
    /// Token nonce of `from`
    pub nonce: U256,
    /// User address
    pub from: Address,
    /// Calldata the token executes as `from`
    pub function_signature: Bytes,
}

impl MetaTransaction {
    /// EIP-712 payload
    pub fn typed_data(&self) -> TypedData {
        TypedData {
            domain: TypedDomain::salted_chain(
                self.name.clone(),
                self.version.clone(),
                self.chain_id,
                self.verifying_contract,
            ),
            primary_type: "MetaTransaction".to_owned(),
            struct_types: META_TX_TYPES.clone(),
            message: json!({
                "nonce": self.nonce.to_string(),
                "from": self.from,
                "functionSignature": self.function_signature,
            }),
        }
    }

    /// Sign and split into `(v, r, s)`
    pub fn sign_parts(&self, wallet: &LocalWallet) -> Result<SignatureParts> {
        let sig = sign_typed_data(&self.typed_data(), wallet, TypedDataVersion::V4)?;
        Ok(split_signature(&sig))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn it_uses_the_salted_chain_domain() {
        let meta = MetaTransaction {
            name: "Rally".to_owned(),
            version: "1".to_owned(),
            chain_id: 137,
            verifying_contract: Address::repeat_byte(0x42),
            nonce: 3u64.into(),
            from: Address::repeat_byte(0x11),
            function_signature: vec![0xa9, 0x05, 0x9c, 0xbb].into(),
        };
        let typed = meta.typed_data();
        let fields = typed.types()["EIP712Domain"].clone();

        assert_eq!(fields.len(), 4);
        assert!(fields.iter().all(|f| f.name != "chainId"));
        let domain = typed.domain.to_value();
        assert_eq!(
            domain["salt"],
            "0x0000000000000000000000000000000000000000000000000000000000000089"
        );
        assert_eq!(typed.message["functionSignature"], "0xa9059cbb");
    }
}
