use ethers_core::{
    abi::{self, Token},
    types::{transaction::eip712::Types, Address, Bytes, Signature},
    utils::keccak256,
};
use ethers_signers::LocalWallet;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::{
    eip712::{member, sign_typed_data, TypedData, TypedDataVersion, TypedDomain},
    DecimalU256, GsnConfig, Result,
};

/// Version string of the GSN forwarder domain
pub const RELAY_REQUEST_DOMAIN_VERSION: &str = "3";

const RELAY_REQUEST_PRIMARY_TYPE: &str = "RelayRequest";

static RELAY_REQUEST_TYPES: Lazy<Types> = Lazy::new(|| {
    let mut types = Types::new();
    types.insert(
        "RelayRequest".to_owned(),
        vec![
            member("from", "address"),
            member("to", "address"),
            member("value", "uint256"),
            member("gas", "uint256"),
            member("nonce", "uint256"),
            member("data", "bytes"),
            member("validUntilTime", "uint256"),
            member("relayData", "RelayData"),
        ],
    );
    types.insert(
        "RelayData".to_owned(),
        vec![
            member("maxFeePerGas", "uint256"),
            member("maxPriorityFeePerGas", "uint256"),
            member("transactionCalldataGasUsed", "uint256"),
            member("relayWorker", "address"),
            member("paymaster", "address"),
            member("forwarder", "address"),
            member("paymasterData", "bytes"),
            member("clientId", "uint256"),
        ],
    );
    types
});

/// The call the forwarder executes on behalf of `from`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ForwardRequest {
    /// User address
    pub from: Address,
    /// Target contract
    pub to: Address,
    /// Native value
    pub value: DecimalU256,
    /// Gas limit for the inner call
    pub gas: DecimalU256,
    /// Forwarder nonce of `from`
    pub nonce: DecimalU256,
    /// Calldata for `to`
    pub data: Bytes,
    /// Unix time after which the forwarder rejects the request
    pub valid_until_time: DecimalU256,
}

impl ForwardRequest {
    fn to_token(&self) -> Token {
        Token::Tuple(vec![
            Token::Address(self.from),
            Token::Address(self.to),
            Token::Uint(*self.value),
            Token::Uint(*self.gas),
            Token::Uint(*self.nonce),
            Token::Bytes(self.data.to_vec()),
            Token::Uint(*self.valid_until_time),
        ])
    }
}

/// Relay-side parameters of a [`RelayRequest`]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RelayData {
    /// EIP-1559 max fee per gas
    pub max_fee_per_gas: DecimalU256,
    /// EIP-1559 priority fee per gas
    pub max_priority_fee_per_gas: DecimalU256,
    /// Calldata gas the relay hub will charge for
    pub transaction_calldata_gas_used: DecimalU256,
    /// Relay worker submitting the transaction
    pub relay_worker: Address,
    /// Paymaster sponsoring the call
    pub paymaster: Address,
    /// Forwarder verifying the signature
    pub forwarder: Address,
    /// Opaque data for the paymaster
    pub paymaster_data: Bytes,
    /// Client identifier
    pub client_id: DecimalU256,
}

impl RelayData {
    fn to_token(&self) -> Token {
        Token::Tuple(vec![
            Token::Uint(*self.max_fee_per_gas),
            Token::Uint(*self.max_priority_fee_per_gas),
            Token::Uint(*self.transaction_calldata_gas_used),
            Token::Address(self.relay_worker),
            Token::Address(self.paymaster),
            Token::Address(self.forwarder),
            Token::Bytes(self.paymaster_data.to_vec()),
            Token::Uint(*self.client_id),
        ])
    }
}

/// A GSN relay request: the full EIP-712 message signed by the user
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RelayRequest {
    /// Forwarded call
    pub request: ForwardRequest,
    /// Relay parameters
    pub relay_data: RelayData,
}

impl RelayRequest {
    /// Instantiate
    pub fn new(request: ForwardRequest, relay_data: RelayData) -> Self {
        Self {
            request,
            relay_data,
        }
    }

    /// EIP-712 payload for this request. `RelayData` is embedded as a nested
    /// struct.
    pub fn typed_data(
        &self,
        domain_separator_name: &str,
        chain_id: u64,
        forwarder: Address,
    ) -> Result<TypedData> {
        let mut message = serde_json::to_value(&self.request)?;
        if let Some(obj) = message.as_object_mut() {
            obj.insert(
                "relayData".to_owned(),
                serde_json::to_value(&self.relay_data)?,
            );
        }

        Ok(TypedData {
            domain: TypedDomain::Plain {
                name: domain_separator_name.to_owned(),
                version: RELAY_REQUEST_DOMAIN_VERSION.to_owned(),
                chain_id: chain_id.into(),
                verifying_contract: forwarder,
            },
            primary_type: RELAY_REQUEST_PRIMARY_TYPE.to_owned(),
            struct_types: RELAY_REQUEST_TYPES.clone(),
            message,
        })
    }

    /// Sign with the V4 scheme under the configured forwarder domain
    pub fn sign(&self, wallet: &LocalWallet, gsn: &GsnConfig) -> Result<Signature> {
        self.sign_with_version(wallet, gsn, TypedDataVersion::V4)
    }

    /// Sign under the configured forwarder domain with an explicit scheme
    pub fn sign_with_version(
        &self,
        wallet: &LocalWallet,
        gsn: &GsnConfig,
        version: TypedDataVersion,
    ) -> Result<Signature> {
        let typed = self.typed_data(
            &gsn.domain_separator_name,
            gsn.chain_id,
            gsn.forwarder_address,
        )?;
        sign_typed_data(&typed, wallet, version)
    }

    /// Short correlation id for the relay server.
    ///
    /// `keccak256(abi.encode(from, nonce, paymasterData))`, keeping the first 4
    /// bytes and zeroing the next 4: `0x` followed by 16 hex characters. Not
    /// unique; use it as a lookup hint only.
    pub fn request_id(&self) -> String {
        let encoded = abi::encode(&[
            Token::Address(self.request.from),
            Token::Uint(*self.request.nonce),
            Token::Bytes(self.relay_data.paymaster_data.to_vec()),
        ]);
        let hash = format!("{:0>64}", hex::encode(keccak256(encoded)));
        format!("0x{}{}", &hash[..8], "0".repeat(8))
    }

    /// ABI tuple `((address,address,uint256,uint256,uint256,bytes,uint256),
    /// (uint256,uint256,uint256,address,address,address,bytes,uint256))`
    pub fn to_token(&self) -> Token {
        Token::Tuple(vec![self.request.to_token(), self.relay_data.to_token()])
    }
}

#[cfg(test)]
pub(crate) mod test {
    use super::*;
    use crate::eip712::encode_type;
    use ethers_core::types::H256;
    use ethers_signers::Signer;

    pub(crate) const USER_KEY: &str =
        "9cb3a530d61728e337290409d967db069f5219279f89e5ddb5ae4af76a8da5f4";

    pub(crate) fn relay_request(from: Address) -> RelayRequest {
        RelayRequest::new(
            ForwardRequest {
                from,
                to: Address::repeat_byte(0x22),
                value: DecimalU256::zero(),
                gas: 120_000u64.into(),
                nonce: 7u64.into(),
                data: vec![0xa9, 0x05, 0x9c, 0xbb, 0x00, 0x01].into(),
                valid_until_time: 1_700_000_000u64.into(),
            },
            RelayData {
                max_fee_per_gas: 3_000_000_000u64.into(),
                max_priority_fee_per_gas: 1_500_000_000u64.into(),
                transaction_calldata_gas_used: 4_000u64.into(),
                relay_worker: Address::repeat_byte(0x33),
                paymaster: Address::repeat_byte(0x44),
                forwarder: Address::repeat_byte(0x55),
                paymaster_data: Bytes::default(),
                client_id: 1u64.into(),
            },
        )
    }

    #[test]
    fn it_encodes_the_nested_type() {
        assert_eq!(
            encode_type("RelayRequest", &RELAY_REQUEST_TYPES).unwrap(),
            "RelayRequest(address from,address to,uint256 value,uint256 gas,uint256 nonce,bytes data,uint256 validUntilTime,RelayData relayData)RelayData(uint256 maxFeePerGas,uint256 maxPriorityFeePerGas,uint256 transactionCalldataGasUsed,address relayWorker,address paymaster,address forwarder,bytes paymasterData,uint256 clientId)"
        );
    }

    #[test]
    fn it_builds_the_forwarder_domain() {
        let req = relay_request(Address::repeat_byte(0x11));
        let typed = req
            .typed_data("RLY Merkle Forwarder", 80001, Address::repeat_byte(0x55))
            .unwrap();

        assert_eq!(typed.types()["EIP712Domain"].len(), 4);
        let domain = typed.domain.to_value();
        assert_eq!(domain["version"], "3");
        assert_eq!(domain["chainId"], 80001);
        assert_eq!(typed.message["relayData"]["clientId"], "1");
        assert_eq!(typed.message["nonce"], "7");
    }

    #[test]
    fn it_matches_ethers_encoder() {
        use ethers_core::types::transaction::eip712::{Eip712, TypedData as EthersTypedData};

        let req = relay_request(Address::repeat_byte(0x11));
        let typed = req
            .typed_data("GSN Relayed Transaction", 5, Address::repeat_byte(0x55))
            .unwrap();
        let ethers: EthersTypedData = serde_json::from_value(typed.to_json()).unwrap();

        assert_eq!(
            ethers.encode_eip712().unwrap(),
            typed.digest(TypedDataVersion::V4).unwrap()
        );
    }

    #[test]
    fn signature_recovers_to_sender() {
        let wallet: LocalWallet = USER_KEY.parse().unwrap();
        let req = relay_request(wallet.address());
        let typed = req
            .typed_data("GSN Relayed Transaction", 5, Address::repeat_byte(0x55))
            .unwrap();

        let sig = sign_typed_data(&typed, &wallet, TypedDataVersion::V4).unwrap();
        let digest = H256::from(typed.digest(TypedDataVersion::V4).unwrap());
        assert_eq!(sig.recover(digest).unwrap(), wallet.address());
        assert!(sig.v == 27 || sig.v == 28);
    }

    #[test]
    fn request_id_is_a_short_stable_prefix() {
        let req = relay_request(Address::repeat_byte(0x11));
        let id = req.request_id();

        assert_eq!(id.len(), 18);
        assert!(id.starts_with("0x"));
        assert!(id.ends_with("00000000"));
        assert_eq!(id, req.request_id());

        let encoded = abi::encode(&[
            Token::Address(req.request.from),
            Token::Uint(7u64.into()),
            Token::Bytes(vec![]),
        ]);
        let full = hex::encode(keccak256(encoded));
        assert_eq!(&id[2..10], &full[..8]);
    }

    #[test]
    fn request_id_tracks_its_inputs() {
        let base = relay_request(Address::repeat_byte(0x11));

        let mut other_nonce = base.clone();
        other_nonce.request.nonce = 8u64.into();
        let mut other_from = base.clone();
        other_from.request.from = Address::repeat_byte(0x12);
        let mut other_data = base.clone();
        other_data.relay_data.paymaster_data = vec![0x01].into();
        let mut other_gas = base.clone();
        other_gas.request.gas = 1u64.into();

        assert_ne!(base.request_id(), other_nonce.request_id());
        assert_ne!(base.request_id(), other_from.request_id());
        assert_ne!(base.request_id(), other_data.request_id());
        // gas is not part of the id
        assert_eq!(base.request_id(), other_gas.request_id());
    }

    #[test]
    fn it_serializes_numbers_as_decimal_strings() {
        let req = relay_request(Address::repeat_byte(0x11));
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["request"]["validUntilTime"], "1700000000");
        assert_eq!(json["relayData"]["maxFeePerGas"], "3000000000");
        assert_eq!(json["relayData"]["paymasterData"], "0x");

        let back: RelayRequest = serde_json::from_value(json).unwrap();
        assert_eq!(back, req);
    }
}
