//! Calldata for the handful of contract functions the client touches

use ethers_core::{
    abi::{self, short_signature, ParamType, Token},
    types::{Address, Bytes, H256, U256},
};

use crate::{eip712::SignatureParts, GsnError, Result};

fn encode_call(name: &str, params: &[ParamType], args: &[Token]) -> Bytes {
    let mut data = short_signature(name, params).to_vec();
    data.extend(abi::encode(args));
    data.into()
}

fn uint() -> ParamType {
    ParamType::Uint(256)
}

fn relay_request_param() -> ParamType {
    ParamType::Tuple(vec![
        ParamType::Tuple(vec![
            ParamType::Address,
            ParamType::Address,
            uint(),
            uint(),
            uint(),
            ParamType::Bytes,
            uint(),
        ]),
        ParamType::Tuple(vec![
            uint(),
            uint(),
            uint(),
            ParamType::Address,
            ParamType::Address,
            ParamType::Address,
            ParamType::Bytes,
            uint(),
        ]),
    ])
}

/// `balanceOf(address)`
pub fn balance_of(owner: Address) -> Bytes {
    encode_call("balanceOf", &[ParamType::Address], &[Token::Address(owner)])
}

/// `decimals()`
pub fn decimals() -> Bytes {
    encode_call("decimals", &[], &[])
}

/// `name()`
pub fn name() -> Bytes {
    encode_call("name", &[], &[])
}

/// ERC-2612 `nonces(address)`
pub fn nonces(owner: Address) -> Bytes {
    encode_call("nonces", &[ParamType::Address], &[Token::Address(owner)])
}

/// `getNonce(address)`, exposed by forwarders and by meta-transaction tokens
pub fn get_nonce(from: Address) -> Bytes {
    encode_call("getNonce", &[ParamType::Address], &[Token::Address(from)])
}

/// ERC-5267 `eip712Domain()`
pub fn eip712_domain() -> Bytes {
    encode_call("eip712Domain", &[], &[])
}

/// Faucet `claim()`
pub fn claim() -> Bytes {
    encode_call("claim", &[], &[])
}

/// `transfer(address,uint256)`
pub fn transfer(to: Address, amount: U256) -> Bytes {
    encode_call(
        "transfer",
        &[ParamType::Address, uint()],
        &[Token::Address(to), Token::Uint(amount)],
    )
}

/// `transferFrom(address,address,uint256)`
pub fn transfer_from(from: Address, to: Address, amount: U256) -> Bytes {
    encode_call(
        "transferFrom",
        &[ParamType::Address, ParamType::Address, uint()],
        &[Token::Address(from), Token::Address(to), Token::Uint(amount)],
    )
}

/// `permit(address,address,uint256,uint256,uint8,bytes32,bytes32)`
pub fn permit(
    owner: Address,
    spender: Address,
    value: U256,
    deadline: U256,
    sig: &SignatureParts,
) -> Bytes {
    encode_call(
        "permit",
        &[
            ParamType::Address,
            ParamType::Address,
            uint(),
            uint(),
            ParamType::Uint(8),
            ParamType::FixedBytes(32),
            ParamType::FixedBytes(32),
        ],
        &[
            Token::Address(owner),
            Token::Address(spender),
            Token::Uint(value),
            Token::Uint(deadline),
            Token::Uint(sig.v.into()),
            Token::FixedBytes(sig.r.to_vec()),
            Token::FixedBytes(sig.s.to_vec()),
        ],
    )
}

/// `executeMetaTransaction(address,bytes,bytes32,bytes32,uint8)`
pub fn execute_meta_transaction(
    user: Address,
    function_signature: &Bytes,
    sig: &SignatureParts,
) -> Bytes {
    encode_call(
        "executeMetaTransaction",
        &[
            ParamType::Address,
            ParamType::Bytes,
            ParamType::FixedBytes(32),
            ParamType::FixedBytes(32),
            ParamType::Uint(8),
        ],
        &[
            Token::Address(user),
            Token::Bytes(function_signature.to_vec()),
            Token::FixedBytes(sig.r.to_vec()),
            Token::FixedBytes(sig.s.to_vec()),
            Token::Uint(sig.v.into()),
        ],
    )
}

/// `RelayHub.relayCall(string,uint256,RelayRequest,bytes,bytes)`
pub fn relay_call(
    domain_separator_name: &str,
    max_acceptance_budget: U256,
    relay_request: Token,
    signature: &[u8],
    approval_data: &[u8],
) -> Bytes {
    encode_call(
        "relayCall",
        &[
            ParamType::String,
            uint(),
            relay_request_param(),
            ParamType::Bytes,
            ParamType::Bytes,
        ],
        &[
            Token::String(domain_separator_name.to_owned()),
            Token::Uint(max_acceptance_budget),
            relay_request,
            Token::Bytes(signature.to_vec()),
            Token::Bytes(approval_data.to_vec()),
        ],
    )
}

fn unexpected(what: &str) -> GsnError {
    GsnError::InvalidArgument(format!("unexpected return data for {}", what))
}

/// Decode a single `uint` return value
pub fn decode_uint(data: &[u8]) -> Result<U256> {
    abi::decode(&[uint()], data)?
        .pop()
        .and_then(Token::into_uint)
        .ok_or_else(|| unexpected("uint256"))
}

/// Decode a single `string` return value
pub fn decode_string(data: &[u8]) -> Result<String> {
    abi::decode(&[ParamType::String], data)?
        .pop()
        .and_then(Token::into_string)
        .ok_or_else(|| unexpected("string"))
}

/// Extract the salt from the `eip712Domain()` return tuple
pub fn decode_eip712_domain_salt(data: &[u8]) -> Result<H256> {
    let tokens = abi::decode(
        &[
            ParamType::FixedBytes(1),
            ParamType::String,
            ParamType::String,
            uint(),
            ParamType::Address,
            ParamType::FixedBytes(32),
            ParamType::Array(Box::new(uint())),
        ],
        data,
    )?;
    tokens
        .into_iter()
        .nth(5)
        .and_then(Token::into_fixed_bytes)
        .filter(|b| b.len() == 32)
        .map(|b| H256::from_slice(&b))
        .ok_or_else(|| unexpected("eip712Domain"))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn selectors_match_known_values() {
        let owner = Address::repeat_byte(0x11);
        assert_eq!(hex::encode(&balance_of(owner)[..4]), "70a08231");
        assert_eq!(hex::encode(&decimals()[..4]), "313ce567");
        assert_eq!(hex::encode(&name()[..4]), "06fdde03");
        assert_eq!(hex::encode(&nonces(owner)[..4]), "7ecebe00");
        assert_eq!(hex::encode(&transfer(owner, U256::one())[..4]), "a9059cbb");
        assert_eq!(
            hex::encode(&transfer_from(owner, owner, U256::one())[..4]),
            "23b872dd"
        );
        assert_eq!(hex::encode(&eip712_domain()[..4]), "84b0196e");

        let sig = SignatureParts {
            v: 27,
            r: [1; 32],
            s: [2; 32],
        };
        let data = permit(owner, owner, U256::one(), U256::one(), &sig);
        assert_eq!(hex::encode(&data[..4]), "d505accf");
        assert_eq!(data.len(), 4 + 7 * 32);
    }

    #[test]
    fn it_decodes_domain_salt() {
        let salt = H256::repeat_byte(0x5a);
        let encoded = abi::encode(&[
            Token::FixedBytes(vec![0x0f]),
            Token::String("Rally".to_owned()),
            Token::String("1".to_owned()),
            Token::Uint(137u64.into()),
            Token::Address(Address::repeat_byte(0x42)),
            Token::FixedBytes(salt.as_bytes().to_vec()),
            Token::Array(vec![]),
        ]);
        assert_eq!(decode_eip712_domain_salt(&encoded).unwrap(), salt);
        assert!(decode_eip712_domain_salt(&[0u8; 4]).is_err());
    }

    #[test]
    fn it_decodes_scalars() {
        let encoded = abi::encode(&[Token::Uint(18u64.into())]);
        assert_eq!(decode_uint(&encoded).unwrap(), U256::from(18));

        let encoded = abi::encode(&[Token::String("Rally".to_owned())]);
        assert_eq!(decode_string(&encoded).unwrap(), "Rally");
    }
}
