use ethers_core::types::H160;
use serde::Serializer;

pub(crate) fn serialize_checksum_addr<S>(val: &H160, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&ethers_core::utils::to_checksum(val, None))
}

/// Config values written either as JSON numbers or as decimal strings
pub(crate) mod string_or_u64 {
    use serde::{de, Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrU64 {
        Num(u64),
        Str(String),
    }

    pub(crate) fn serialize<S>(val: &u64, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(*val)
    }

    pub(crate) fn deserialize<'de, D>(deserializer: D) -> Result<u64, D::Error>
    where
        D: Deserializer<'de>,
    {
        match StringOrU64::deserialize(deserializer)? {
            StringOrU64::Num(n) => Ok(n),
            StringOrU64::Str(s) => s.trim().parse().map_err(de::Error::custom),
        }
    }
}

/// Hex-encoded U256 that tolerates decimal strings on input
pub(crate) mod hex_u256_lenient {
    use ethers_core::types::U256;
    use serde::{Deserialize, Deserializer, Serializer};

    pub(crate) fn serialize<S>(val: &U256, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format!("{:#x}", val))
    }

    pub(crate) fn deserialize<'de, D>(deserializer: D) -> Result<U256, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        crate::types::DecimalU256::parse(&s)
            .map(Into::into)
            .map_err(serde::de::Error::custom)
    }
}
