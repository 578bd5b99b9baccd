use ethers_core::types::{transaction::eip712::Types, Address, Signature, H256, U256};
use ethers_signers::LocalWallet;
use once_cell::sync::Lazy;
use serde_json::json;

use crate::{
    eip712::{member, sign_typed_data, split_signature, SignatureParts, TypedData, TypedDataVersion, TypedDomain},
    Result,
};

static PERMIT_TYPES: Lazy<Types> = Lazy::new(|| {
    let mut types = Types::new();
    types.insert(
        "Permit".to_owned(),
        vec![
            member("owner", "address"),
            member("spender", "address"),
            member("value", "uint256"),
            member("nonce", "uint256"),
            member("deadline", "uint256"),
        ],
    );
    types
});

/// An ERC-2612 permit: approval of `spender` by signature instead of a
/// transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Permit {
    /// Token name, as returned by `name()`
    pub name: String,
    /// Domain version
    pub version: String,
    /// Chain id
    pub chain_id: u64,
    /// Token contract
    pub verifying_contract: Address,
    /// Token holder
    pub owner: Address,
    /// Approved spender
    pub spender: Address,
    /// Approved amount
    pub value: U256,
    /// Token nonce of `owner`
    pub nonce: U256,
    /// Unix time after which the permit is void
    pub deadline: U256,
    /// Domain salt from `eip712Domain()`. `None` or zero means the token's
    /// domain has no salt.
    pub salt: Option<H256>,
}

impl Permit {
    /// The signing domain. Carries the salt only if it is present and non-zero.
    pub fn domain(&self) -> TypedDomain {
        TypedDomain::for_permit(
            self.name.clone(),
            self.version.clone(),
            self.chain_id,
            self.verifying_contract,
            self.salt,
        )
    }

    /// EIP-712 payload
    pub fn typed_data(&self) -> TypedData {
        TypedData {
            domain: self.domain(),
            primary_type: "Permit".to_owned(),
            struct_types: PERMIT_TYPES.clone(),
            message: json!({
                "owner": self.owner,
                "spender": self.spender,
                "value": self.value.to_string(),
                "nonce": self.nonce.to_string(),
                "deadline": self.deadline.to_string(),
            }),
        }
    }

    /// Sign with the legacy V3 scheme, as permit consumers expect
    pub fn sign(&self, wallet: &LocalWallet) -> Result<Signature> {
        sign_typed_data(&self.typed_data(), wallet, TypedDataVersion::V3)
    }

    /// Sign and split into the `(v, r, s)` arguments of `permit`
    pub fn sign_parts(&self, wallet: &LocalWallet) -> Result<SignatureParts> {
        Ok(split_signature(&self.sign(wallet)?))
    }
}
