//! Calldata gas accounting.
//!
//! The EVM charges transaction input per byte, with zero bytes priced lower
//! than nonzero bytes. The relay hub bills the user for the calldata of its
//! `relayCall`, which is only known after signing, so the request carries a
//! worst-case bound computed from an all-`0xff` filler.

use ethers_core::types::{Bytes, U256};

use crate::{abi, GsnConfig, GsnTransactionDetails, RelayRequest, Result};

/// Worst-case value of the 5-byte fields in the filler `relayCall`
pub const FILLER_WORD: u64 = 0xff_ffff_ffff;

/// Length of an ECDSA signature in bytes
pub const SIGNATURE_LENGTH: usize = 65;

/// Zero and nonzero byte counts of a calldata payload
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct CalldataBytes {
    /// Bytes equal to `0x00`
    pub zero: u64,
    /// All other bytes
    pub nonzero: u64,
}

impl CalldataBytes {
    /// Count a raw payload
    pub fn count(data: &[u8]) -> Self {
        let zero = data.iter().filter(|b| **b == 0).count() as u64;
        Self {
            zero,
            nonzero: data.len() as u64 - zero,
        }
    }

    /// Gas charged for these bytes
    pub fn cost(&self, gtx_data_non_zero: u64, gtx_data_zero: u64) -> u64 {
        self.zero
            .saturating_mul(gtx_data_zero)
            .saturating_add(self.nonzero.saturating_mul(gtx_data_non_zero))
    }
}

/// Count the zero and nonzero bytes of hex calldata. The `0x` prefix is
/// optional.
pub fn calldata_bytes(calldata_hex: &str) -> Result<CalldataBytes> {
    let raw = hex::decode(calldata_hex.trim_start_matches("0x"))?;
    Ok(CalldataBytes::count(&raw))
}

/// `zero * gtx_data_zero + nonzero * gtx_data_non_zero`
pub fn calldata_cost(calldata_hex: &str, gtx_data_non_zero: u64, gtx_data_zero: u64) -> Result<u64> {
    Ok(calldata_bytes(calldata_hex)?.cost(gtx_data_non_zero, gtx_data_zero))
}

/// The part of `tx.gas` spent on execution, i.e. the estimate minus the cost
/// of `tx.data`. Saturates at zero.
pub fn estimate_gas_without_calldata(
    tx: &GsnTransactionDetails,
    gtx_data_non_zero: u64,
    gtx_data_zero: u64,
) -> U256 {
    let cost = CalldataBytes::count(&tx.data).cost(gtx_data_non_zero, gtx_data_zero);
    tx.gas.saturating_sub(cost.into())
}

/// Upper bound on the calldata gas of the hub's `relayCall` for this request.
///
/// The request is re-encoded with the largest paymaster data, approval data
/// and signature the hub accepts, so the bound holds whatever is signed later.
pub fn estimate_calldata_cost_for_request(request: &RelayRequest, gsn: &GsnConfig) -> Result<u64> {
    let mut filler = request.clone();
    filler.relay_data.transaction_calldata_gas_used = FILLER_WORD.into();
    filler.relay_data.paymaster_data = filled(gsn.max_paymaster_data_length as usize);

    let data = abi::relay_call(
        &gsn.domain_separator_name,
        FILLER_WORD.into(),
        filler.to_token(),
        &filled(SIGNATURE_LENGTH),
        &filled(gsn.max_approval_data_length as usize),
    );

    let cost = CalldataBytes::count(&data).cost(gsn.gtx_data_non_zero, gsn.gtx_data_zero);
    tracing::debug!(cost, len = data.len(), "Worst-case relayCall calldata");
    Ok(cost)
}

fn filled(len: usize) -> Bytes {
    vec![0xff; len].into()
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{config::test::config, eip712::relay_request::test::relay_request};
    use ethers_core::types::Address;

    #[test]
    fn it_counts_mixed_bytes() {
        let bytes = calldata_bytes("0x00ff00").unwrap();
        assert_eq!(bytes, CalldataBytes { zero: 2, nonzero: 1 });
        assert_eq!(calldata_cost("0x00ff00", 16, 4).unwrap(), 24);
        // prefix is optional
        assert_eq!(calldata_cost("00ff00", 16, 4).unwrap(), 24);
        assert_eq!(calldata_cost("0x", 16, 4).unwrap(), 0);
    }

    #[test]
    fn counts_cover_every_byte() {
        for data in [&b""[..], &[0, 0, 0], &[1, 2, 3], &[0, 7, 0, 9, 0xff]] {
            let bytes = CalldataBytes::count(data);
            assert_eq!(bytes.zero + bytes.nonzero, data.len() as u64);
        }
    }

    #[test]
    fn cost_is_linear_in_each_count() {
        let base = CalldataBytes { zero: 3, nonzero: 5 };
        let more_zero = CalldataBytes { zero: 4, ..base };
        let more_nonzero = CalldataBytes { nonzero: 6, ..base };

        assert_eq!(base.cost(16, 4), 3 * 4 + 5 * 16);
        assert_eq!(more_zero.cost(16, 4) - base.cost(16, 4), 4);
        assert_eq!(more_nonzero.cost(16, 4) - base.cost(16, 4), 16);
    }

    #[test]
    fn it_rejects_bad_hex() {
        let err = calldata_cost("0xzz", 16, 4).unwrap_err();
        assert!(matches!(err, crate::GsnError::InvalidArgument(_)));
    }

    #[test]
    fn it_subtracts_calldata_from_gas() {
        let mut tx = GsnTransactionDetails {
            from: Address::repeat_byte(0x11),
            data: vec![0x00, 0xff, 0x00].into(),
            to: Address::repeat_byte(0x22),
            max_fee_per_gas: U256::zero(),
            max_priority_fee_per_gas: U256::zero(),
            value: U256::zero(),
            gas: 100u64.into(),
            paymaster_data: None,
        };
        assert_eq!(estimate_gas_without_calldata(&tx, 16, 4), U256::from(76));

        tx.gas = 10u64.into();
        assert_eq!(estimate_gas_without_calldata(&tx, 16, 4), U256::zero());
    }

    #[test]
    fn worst_case_ignores_request_contents() {
        let gsn = config().gsn;
        let small = relay_request(Address::repeat_byte(0x11));
        let mut with_data = small.clone();
        with_data.relay_data.paymaster_data = vec![0u8; 20].into();
        with_data.relay_data.transaction_calldata_gas_used = 1u64.into();

        let a = estimate_calldata_cost_for_request(&small, &gsn).unwrap();
        let b = estimate_calldata_cost_for_request(&with_data, &gsn).unwrap();
        assert_eq!(a, b);

        // at least the filler signature, paymaster and approval data
        let floor = (SIGNATURE_LENGTH as u64 + 300 + 300) * gsn.gtx_data_non_zero;
        assert!(a > floor);
    }

    #[test]
    fn worst_case_grows_with_limits() {
        let mut gsn = config().gsn;
        let req = relay_request(Address::repeat_byte(0x11));
        let before = estimate_calldata_cost_for_request(&req, &gsn).unwrap();

        gsn.max_approval_data_length += 32;
        let after = estimate_calldata_cost_for_request(&req, &gsn).unwrap();
        assert_eq!(after - before, 32 * gsn.gtx_data_non_zero);
    }
}
