use std::collections::BTreeSet;

use ethers_core::{
    abi::{self, Token},
    types::{
        transaction::eip712::{EIP712Domain, Eip712, Eip712DomainType, Types},
        Address, Signature, H256, U256,
    },
    utils::keccak256,
};
use ethers_signers::LocalWallet;
use serde::{Serialize, Serializer};
use serde_json::{json, Value};

use crate::GsnError;

/// Name of the domain struct in every EIP-712 type set
pub const EIP712_DOMAIN_TYPE: &str = "EIP712Domain";

/// Typed data encoding errors
#[derive(Debug, thiserror::Error)]
pub enum TypedDataError {
    /// A referenced struct type is not declared
    #[error("Unknown type: {0}")]
    UnknownType(String),
    /// The message lacks a field declared by its type
    #[error("Missing field `{field}` in struct {ty}")]
    MissingField {
        /// Struct type
        ty: String,
        /// Field name
        field: String,
    },
    /// A value cannot be encoded as its declared type
    #[error("Cannot encode {value} as {ty}")]
    InvalidValue {
        /// Declared solidity type
        ty: String,
        /// Offending value
        value: String,
    },
    /// The payload's type hash depends on its runtime types
    #[error("Typed data has no static type hash")]
    DynamicType,
}

impl TypedDataError {
    fn invalid(ty: &str, value: &Value) -> Self {
        TypedDataError::InvalidValue {
            ty: ty.to_owned(),
            value: value.to_string(),
        }
    }
}

/// Structured-data hashing scheme.
///
/// Both schemes hash flat structs and atomic arrays identically. They differ in
/// how arrays of structs are folded: `V4` hashes each element struct, `V3`
/// concatenates each element's full encoding.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum TypedDataVersion {
    /// Legacy `eth_signTypedData_v3`
    V3,
    /// `eth_signTypedData_v4`
    #[default]
    V4,
}

impl std::str::FromStr for TypedDataVersion {
    type Err = GsnError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "V3" | "3" => Ok(TypedDataVersion::V3),
            "V4" | "4" => Ok(TypedDataVersion::V4),
            _ => Err(GsnError::InvalidArgument(format!(
                "unsupported typed data version: {}",
                s
            ))),
        }
    }
}

impl TryFrom<u8> for TypedDataVersion {
    type Error = GsnError;

    fn try_from(v: u8) -> Result<Self, Self::Error> {
        match v {
            3 => Ok(TypedDataVersion::V3),
            4 => Ok(TypedDataVersion::V4),
            other => Err(GsnError::InvalidArgument(format!(
                "unsupported typed data version: {}",
                other
            ))),
        }
    }
}

/// EIP-712 domain. Each variant fixes its own field layout, so the
/// `EIP712Domain` type list is derived from the variant rather than edited in
/// place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypedDomain {
    /// `name, version, chainId, verifyingContract`
    Plain {
        /// Domain name
        name: String,
        /// Domain version
        version: String,
        /// Chain id
        chain_id: U256,
        /// Verifying contract
        verifying_contract: Address,
    },
    /// `name, version, chainId, verifyingContract, salt`
    WithSalt {
        /// Domain name
        name: String,
        /// Domain version
        version: String,
        /// Chain id
        chain_id: U256,
        /// Verifying contract
        verifying_contract: Address,
        /// Domain salt
        salt: H256,
    },
    /// `name, version, verifyingContract, salt`, where the salt carries the
    /// chain id. Used by tokens exposing `executeMetaTransaction`.
    SaltedChain {
        /// Domain name
        name: String,
        /// Domain version
        version: String,
        /// Verifying contract
        verifying_contract: Address,
        /// Chain id, left-padded to 32 bytes
        salt: H256,
    },
}

impl TypedDomain {
    /// Pick the permit domain layout. An absent or all-zero salt yields
    /// [`TypedDomain::Plain`].
    pub fn for_permit(
        name: impl Into<String>,
        version: impl Into<String>,
        chain_id: impl Into<U256>,
        verifying_contract: Address,
        salt: Option<H256>,
    ) -> Self {
        let (name, version, chain_id) = (name.into(), version.into(), chain_id.into());
        match salt.filter(|s| !s.is_zero()) {
            Some(salt) => TypedDomain::WithSalt {
                name,
                version,
                chain_id,
                verifying_contract,
                salt,
            },
            None => TypedDomain::Plain {
                name,
                version,
                chain_id,
                verifying_contract,
            },
        }
    }

    /// Domain whose salt is the chain id
    pub fn salted_chain(
        name: impl Into<String>,
        version: impl Into<String>,
        chain_id: u64,
        verifying_contract: Address,
    ) -> Self {
        TypedDomain::SaltedChain {
            name: name.into(),
            version: version.into(),
            verifying_contract,
            salt: H256::from_low_u64_be(chain_id),
        }
    }

    /// The `EIP712Domain` member list for this layout
    pub fn fields(&self) -> Vec<Eip712DomainType> {
        let names: &[(&str, &str)] = match self {
            TypedDomain::Plain { .. } => &[
                ("name", "string"),
                ("version", "string"),
                ("chainId", "uint256"),
                ("verifyingContract", "address"),
            ],
            TypedDomain::WithSalt { .. } => &[
                ("name", "string"),
                ("version", "string"),
                ("chainId", "uint256"),
                ("verifyingContract", "address"),
                ("salt", "bytes32"),
            ],
            TypedDomain::SaltedChain { .. } => &[
                ("name", "string"),
                ("version", "string"),
                ("verifyingContract", "address"),
                ("salt", "bytes32"),
            ],
        };
        names.iter().map(|(n, t)| member(n, t)).collect()
    }

    /// Salt, if this layout has one
    pub fn salt(&self) -> Option<H256> {
        match self {
            TypedDomain::Plain { .. } => None,
            TypedDomain::WithSalt { salt, .. } | TypedDomain::SaltedChain { salt, .. } => {
                Some(*salt)
            }
        }
    }

    /// JSON form of the domain values
    pub fn to_value(&self) -> Value {
        match self {
            TypedDomain::Plain {
                name,
                version,
                chain_id,
                verifying_contract,
            } => json!({
                "name": name,
                "version": version,
                "chainId": numeric_value(*chain_id),
                "verifyingContract": verifying_contract,
            }),
            TypedDomain::WithSalt {
                name,
                version,
                chain_id,
                verifying_contract,
                salt,
            } => json!({
                "name": name,
                "version": version,
                "chainId": numeric_value(*chain_id),
                "verifyingContract": verifying_contract,
                "salt": salt,
            }),
            TypedDomain::SaltedChain {
                name,
                version,
                verifying_contract,
                salt,
            } => json!({
                "name": name,
                "version": version,
                "verifyingContract": verifying_contract,
                "salt": salt,
            }),
        }
    }

    /// `hashStruct(EIP712Domain)`
    pub fn separator(&self) -> Result<[u8; 32], TypedDataError> {
        let mut types = Types::new();
        types.insert(EIP712_DOMAIN_TYPE.to_owned(), self.fields());
        hash_struct(
            EIP712_DOMAIN_TYPE,
            &self.to_value(),
            &types,
            TypedDataVersion::V4,
        )
    }
}

impl Serialize for TypedDomain {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.to_value().serialize(serializer)
    }
}

/// A complete EIP-712 payload: domain, primary type, struct types and message
#[derive(Debug, Clone, PartialEq)]
pub struct TypedData {
    /// Signing domain
    pub domain: TypedDomain,
    /// Name of the message struct
    pub primary_type: String,
    /// Struct definitions, excluding `EIP712Domain`
    pub struct_types: Types,
    /// The message, a JSON object
    pub message: Value,
}

impl TypedData {
    /// All type definitions, `EIP712Domain` included
    pub fn types(&self) -> Types {
        let mut types = self.struct_types.clone();
        types.insert(EIP712_DOMAIN_TYPE.to_owned(), self.domain.fields());
        types
    }

    /// `hashStruct(message)` under the given scheme
    pub fn struct_hash(&self, version: TypedDataVersion) -> Result<[u8; 32], TypedDataError> {
        hash_struct(
            &self.primary_type,
            &self.message,
            &self.struct_types,
            version,
        )
    }

    /// `keccak256(0x1901 || domainSeparator || hashStruct(message))`
    pub fn digest(&self, version: TypedDataVersion) -> Result<[u8; 32], TypedDataError> {
        let domain_separator = self.domain.separator()?;
        let struct_hash = self.struct_hash(version)?;

        let mut preimage = Vec::with_capacity(66);
        preimage.extend_from_slice(&[0x19, 0x01]);
        preimage.extend_from_slice(&domain_separator);
        preimage.extend_from_slice(&struct_hash);
        Ok(keccak256(preimage))
    }

    /// Standard EIP-712 JSON, as accepted by `eth_signTypedData_v4`
    pub fn to_json(&self) -> Value {
        json!({
            "types": self.types(),
            "primaryType": self.primary_type,
            "domain": self.domain.to_value(),
            "message": self.message,
        })
    }
}

impl Serialize for TypedData {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.to_json().serialize(serializer)
    }
}

/// V4 hashing, so any ethers [`Signer`](ethers_signers::Signer) can sign a
/// payload with `sign_typed_data`
impl Eip712 for TypedData {
    type Error = TypedDataError;

    fn domain(&self) -> Result<EIP712Domain, Self::Error> {
        let (name, version, chain_id, verifying_contract, salt) = match &self.domain {
            TypedDomain::Plain {
                name,
                version,
                chain_id,
                verifying_contract,
            } => (name, version, Some(*chain_id), verifying_contract, None),
            TypedDomain::WithSalt {
                name,
                version,
                chain_id,
                verifying_contract,
                salt,
            } => (name, version, Some(*chain_id), verifying_contract, Some(salt.0)),
            TypedDomain::SaltedChain {
                name,
                version,
                verifying_contract,
                salt,
            } => (name, version, None, verifying_contract, Some(salt.0)),
        };
        Ok(EIP712Domain {
            name: Some(name.clone()),
            version: Some(version.clone()),
            chain_id,
            verifying_contract: Some(*verifying_contract),
            salt,
        })
    }

    fn type_hash() -> Result<[u8; 32], Self::Error> {
        Err(TypedDataError::DynamicType)
    }

    fn domain_separator(&self) -> Result<[u8; 32], Self::Error> {
        self.domain.separator()
    }

    fn struct_hash(&self) -> Result<[u8; 32], Self::Error> {
        TypedData::struct_hash(self, TypedDataVersion::V4)
    }

    fn encode_eip712(&self) -> Result<[u8; 32], Self::Error> {
        self.digest(TypedDataVersion::V4)
    }
}

/// Sign typed data with a local key.
///
/// Stateless: the digest is recomputed for every call and `v` is 27 or 28.
pub fn sign_typed_data(
    data: &TypedData,
    wallet: &LocalWallet,
    version: TypedDataVersion,
) -> Result<Signature, GsnError> {
    let digest = data.digest(version)?;
    Ok(wallet.sign_hash(H256::from(digest))?)
}

/// A signature split for contract calls taking `(v, r, s)`
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct SignatureParts {
    /// Recovery byte
    pub v: u8,
    /// First 32 bytes
    pub r: [u8; 32],
    /// Second 32 bytes
    pub s: [u8; 32],
}

/// Split a 65-byte `r || s || v` signature
pub fn split_signature(signature: &Signature) -> SignatureParts {
    let bytes = signature.to_vec();
    let mut r = [0u8; 32];
    let mut s = [0u8; 32];
    r.copy_from_slice(&bytes[0..32]);
    s.copy_from_slice(&bytes[32..64]);
    SignatureParts { v: bytes[64], r, s }
}

/// Build a type member
pub fn member(name: &str, ty: &str) -> Eip712DomainType {
    Eip712DomainType {
        name: name.to_owned(),
        r#type: ty.to_owned(),
    }
}

fn numeric_value(v: U256) -> Value {
    if v <= U256::from(u64::MAX) {
        Value::from(v.as_u64())
    } else {
        Value::String(v.to_string())
    }
}

/// Strip one trailing array dimension: `Foo[2][]` -> `Foo[2]`
fn array_element_type(ty: &str) -> Option<&str> {
    if !ty.ends_with(']') {
        return None;
    }
    ty.rfind('[').map(|idx| &ty[..idx])
}

fn base_type(ty: &str) -> &str {
    ty.find('[').map(|idx| &ty[..idx]).unwrap_or(ty)
}

fn collect_dependencies<'a>(
    ty: &'a str,
    types: &'a Types,
    found: &mut BTreeSet<&'a str>,
) -> Result<(), TypedDataError> {
    let ty = base_type(ty);
    if found.contains(ty) {
        return Ok(());
    }
    let Some(members) = types.get(ty) else {
        return Ok(());
    };
    found.insert(ty);
    for m in members {
        collect_dependencies(&m.r#type, types, found)?;
    }
    Ok(())
}

/// `encodeType`: the primary struct followed by its dependencies in
/// alphabetical order
pub fn encode_type(primary_type: &str, types: &Types) -> Result<String, TypedDataError> {
    if !types.contains_key(primary_type) {
        return Err(TypedDataError::UnknownType(primary_type.to_owned()));
    }

    let mut deps = BTreeSet::new();
    collect_dependencies(primary_type, types, &mut deps)?;
    deps.remove(primary_type);

    let mut out = String::new();
    for ty in std::iter::once(primary_type).chain(deps.into_iter()) {
        let members = types
            .get(ty)
            .ok_or_else(|| TypedDataError::UnknownType(ty.to_owned()))?;
        let fields: Vec<String> = members
            .iter()
            .map(|m| format!("{} {}", m.r#type, m.name))
            .collect();
        out.push_str(&format!("{}({})", ty, fields.join(",")));
    }
    Ok(out)
}

/// `keccak256(encodeType(primary_type))`
pub fn type_hash(primary_type: &str, types: &Types) -> Result<[u8; 32], TypedDataError> {
    Ok(keccak256(encode_type(primary_type, types)?))
}

/// `encodeData`: the type hash followed by one 32-byte word per member
pub fn encode_data(
    primary_type: &str,
    data: &Value,
    types: &Types,
    version: TypedDataVersion,
) -> Result<Vec<Token>, TypedDataError> {
    let members = types
        .get(primary_type)
        .ok_or_else(|| TypedDataError::UnknownType(primary_type.to_owned()))?;
    let obj = data
        .as_object()
        .ok_or_else(|| TypedDataError::invalid(primary_type, data))?;

    let mut tokens = Vec::with_capacity(members.len() + 1);
    tokens.push(Token::FixedBytes(type_hash(primary_type, types)?.to_vec()));
    for m in members {
        let value = obj.get(&m.name).ok_or_else(|| TypedDataError::MissingField {
            ty: primary_type.to_owned(),
            field: m.name.clone(),
        })?;
        tokens.push(encode_field(&m.r#type, value, types, version)?);
    }
    Ok(tokens)
}

/// `hashStruct`
pub fn hash_struct(
    primary_type: &str,
    data: &Value,
    types: &Types,
    version: TypedDataVersion,
) -> Result<[u8; 32], TypedDataError> {
    let tokens = encode_data(primary_type, data, types, version)?;
    Ok(keccak256(abi::encode(&tokens)))
}

fn encode_array(
    element_type: &str,
    value: &Value,
    types: &Types,
    version: TypedDataVersion,
) -> Result<Token, TypedDataError> {
    let items = value
        .as_array()
        .ok_or_else(|| TypedDataError::invalid(&format!("{}[]", element_type), value))?;

    let is_struct = types.contains_key(element_type);
    let mut encoded = Vec::new();
    for item in items {
        match version {
            TypedDataVersion::V3 if is_struct => {
                let tokens = encode_data(element_type, item, types, version)?;
                encoded.extend(abi::encode(&tokens));
            }
            _ => {
                let token = encode_field(element_type, item, types, version)?;
                encoded.extend(abi::encode(&[token]));
            }
        }
    }
    Ok(Token::FixedBytes(keccak256(encoded).to_vec()))
}

fn encode_field(
    ty: &str,
    value: &Value,
    types: &Types,
    version: TypedDataVersion,
) -> Result<Token, TypedDataError> {
    if let Some(element_type) = array_element_type(ty) {
        return encode_array(element_type, value, types, version);
    }

    if types.contains_key(ty) {
        return Ok(Token::FixedBytes(
            hash_struct(ty, value, types, version)?.to_vec(),
        ));
    }

    match ty {
        "address" => {
            let addr: Address = value
                .as_str()
                .and_then(|s| s.parse().ok())
                .ok_or_else(|| TypedDataError::invalid(ty, value))?;
            Ok(Token::Address(addr))
        }
        "bool" => {
            let b = match value {
                Value::Bool(b) => *b,
                Value::String(s) if s == "true" => true,
                Value::String(s) if s == "false" => false,
                _ => return Err(TypedDataError::invalid(ty, value)),
            };
            Ok(Token::Bool(b))
        }
        "string" => {
            let s = value
                .as_str()
                .ok_or_else(|| TypedDataError::invalid(ty, value))?;
            Ok(Token::FixedBytes(keccak256(s.as_bytes()).to_vec()))
        }
        "bytes" => {
            let bytes = decode_hex_value(ty, value)?;
            Ok(Token::FixedBytes(keccak256(bytes).to_vec()))
        }
        _ if ty.starts_with("bytes") => {
            let size: usize = ty[5..]
                .parse()
                .map_err(|_| TypedDataError::UnknownType(ty.to_owned()))?;
            let bytes = decode_hex_value(ty, value)?;
            if size == 0 || size > 32 || bytes.len() > size {
                return Err(TypedDataError::invalid(ty, value));
            }
            Ok(Token::FixedBytes(bytes))
        }
        _ if ty.starts_with("uint") => Ok(Token::Uint(parse_uint(ty, value)?)),
        _ if ty.starts_with("int") => Ok(Token::Int(parse_int(ty, value)?)),
        _ => Err(TypedDataError::UnknownType(ty.to_owned())),
    }
}

fn decode_hex_value(ty: &str, value: &Value) -> Result<Vec<u8>, TypedDataError> {
    let s = value
        .as_str()
        .ok_or_else(|| TypedDataError::invalid(ty, value))?;
    hex::decode(s.trim_start_matches("0x")).map_err(|_| TypedDataError::invalid(ty, value))
}

fn parse_uint(ty: &str, value: &Value) -> Result<U256, TypedDataError> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .map(U256::from)
            .ok_or_else(|| TypedDataError::invalid(ty, value)),
        Value::String(s) => crate::types::DecimalU256::parse(s)
            .map(Into::into)
            .map_err(|_| TypedDataError::invalid(ty, value)),
        _ => Err(TypedDataError::invalid(ty, value)),
    }
}

fn parse_int(ty: &str, value: &Value) -> Result<U256, TypedDataError> {
    let (negative, magnitude) = match value {
        Value::Number(n) => {
            let i = n.as_i64().ok_or_else(|| TypedDataError::invalid(ty, value))?;
            (i < 0, U256::from(i.unsigned_abs()))
        }
        Value::String(s) => match s.strip_prefix('-') {
            Some(rest) => (true, parse_uint(ty, &Value::String(rest.to_owned()))?),
            None => (false, parse_uint(ty, value)?),
        },
        _ => return Err(TypedDataError::invalid(ty, value)),
    };
    if negative {
        Ok((!magnitude).overflowing_add(U256::one()).0)
    } else {
        Ok(magnitude)
    }
}
