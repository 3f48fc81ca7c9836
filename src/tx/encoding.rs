//! Signature decomposition and fee-market transaction encoding
//!
//! Everything here is pure data transformation: a raw 65-byte signature from the
//! remote signer is split into `r`, `s` and a y-parity, then merged with the
//! unsigned fields into the typed envelope `0x02 || rlp([...])`.

use super::types::UnsignedTransaction;
use crate::error::{WalletError, WalletResult};

use ethers::types::{Address, Bytes, H256, U256};
use ethers::utils::keccak256;
use ethers::utils::rlp::{Rlp, RlpStream};

/// EIP-2718 type byte of a fee-market transaction
pub const EIP1559_TX_TYPE: u8 = 0x02;

/// Length of a raw `r || s || v` signature
pub const SIGNATURE_LENGTH: usize = 65;

const UNSIGNED_FIELD_COUNT: usize = 9;
const SIGNED_FIELD_COUNT: usize = 12;

/// Algebraic components of an ECDSA signature over a transaction digest
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Signature {
    pub r: H256,
    pub s: H256,
    /// Recovery parity, always 0 or 1
    pub y_parity: u8,
}

impl Signature {
    /// Split a raw signature into its components.
    ///
    /// The final byte may be a bare parity (0/1) or the legacy recovery id (27/28).
    pub fn from_raw(raw: &[u8]) -> WalletResult<Self> {
        if raw.len() != SIGNATURE_LENGTH {
            return Err(WalletError::Encoding(format!(
                "expected {}-byte signature, got {} bytes",
                SIGNATURE_LENGTH,
                raw.len()
            )));
        }

        Ok(Self {
            r: H256::from_slice(&raw[..32]),
            s: H256::from_slice(&raw[32..64]),
            y_parity: normalize_v(raw[64])?,
        })
    }

    /// Raw `r || s || v` form with `v` in the 27/28 convention
    pub fn to_raw(&self) -> Bytes {
        let mut raw = Vec::with_capacity(SIGNATURE_LENGTH);
        raw.extend_from_slice(self.r.as_bytes());
        raw.extend_from_slice(self.s.as_bytes());
        raw.push(self.y_parity + 27);
        raw.into()
    }
}

fn normalize_v(v: u8) -> WalletResult<u8> {
    match v {
        0 | 1 => Ok(v),
        27 | 28 => Ok(v - 27),
        other => Err(WalletError::Encoding(format!(
            "unsupported signature recovery value {}",
            other
        ))),
    }
}

/// Typed envelopes carry a bare parity; 27/28 is only accepted from signers
fn parse_y_parity(v: u8) -> WalletResult<u8> {
    match v {
        0 | 1 => Ok(v),
        other => Err(WalletError::Encoding(format!(
            "invalid y-parity {} in typed transaction",
            other
        ))),
    }
}

impl UnsignedTransaction {
    /// Bytes the signer commits to: `0x02 || rlp(unsigned fields)`
    pub fn signing_payload(&self) -> Vec<u8> {
        let mut stream = RlpStream::new_list(UNSIGNED_FIELD_COUNT);
        self.append_fields(&mut stream);
        with_type_prefix(&stream.out())
    }

    /// Digest submitted to the remote signer
    pub fn signing_hash(&self) -> H256 {
        H256::from(keccak256(self.signing_payload()))
    }

    fn append_fields(&self, stream: &mut RlpStream) {
        stream.append(&self.chain_id);
        stream.append(&self.nonce);
        stream.append(&self.max_priority_fee_per_gas);
        stream.append(&self.max_fee_per_gas);
        stream.append(&self.gas_limit);
        stream.append(&self.to);
        stream.append(&self.value);
        stream.append(&self.data.to_vec());
        // Access lists are never populated
        stream.begin_list(0);
    }
}

/// Decompose `raw_signature` and produce the signed transaction bytes
pub fn encode(tx: &UnsignedTransaction, raw_signature: &[u8]) -> WalletResult<Bytes> {
    let signature = Signature::from_raw(raw_signature)?;
    Ok(encode_signed(tx, &signature))
}

/// Serialize an unsigned transaction together with its signature
pub fn encode_signed(tx: &UnsignedTransaction, signature: &Signature) -> Bytes {
    let mut stream = RlpStream::new_list(SIGNED_FIELD_COUNT);
    tx.append_fields(&mut stream);
    stream.append(&signature.y_parity);
    stream.append(&U256::from_big_endian(signature.r.as_bytes()));
    stream.append(&U256::from_big_endian(signature.s.as_bytes()));
    with_type_prefix(&stream.out()).into()
}

/// Parse signed transaction bytes back into their fields and signature
pub fn decode_signed(bytes: &[u8]) -> WalletResult<(UnsignedTransaction, Signature)> {
    let (tx_type, payload) = bytes
        .split_first()
        .ok_or_else(|| WalletError::Encoding("empty transaction bytes".to_string()))?;

    if *tx_type != EIP1559_TX_TYPE {
        return Err(WalletError::Encoding(format!(
            "unsupported transaction type 0x{:02x}",
            tx_type
        )));
    }

    let rlp = Rlp::new(payload);
    let count = rlp.item_count()?;
    if count != SIGNED_FIELD_COUNT {
        return Err(WalletError::Encoding(format!(
            "expected {} fields, got {}",
            SIGNED_FIELD_COUNT, count
        )));
    }

    if rlp.at(8)?.item_count()? != 0 {
        return Err(WalletError::Encoding(
            "access lists are not supported".to_string(),
        ));
    }

    let tx = UnsignedTransaction {
        chain_id: rlp.val_at(0)?,
        nonce: rlp.val_at(1)?,
        max_priority_fee_per_gas: rlp.val_at(2)?,
        max_fee_per_gas: rlp.val_at(3)?,
        gas_limit: rlp.val_at(4)?,
        to: rlp.val_at::<Address>(5)?,
        value: rlp.val_at(6)?,
        data: rlp.val_at::<Vec<u8>>(7)?.into(),
    };

    let signature = Signature {
        y_parity: parse_y_parity(rlp.val_at(9)?)?,
        r: u256_to_h256(rlp.val_at(10)?),
        s: u256_to_h256(rlp.val_at(11)?),
    };

    Ok((tx, signature))
}

/// Hash under which the network will know the signed transaction
pub fn transaction_hash(signed: &[u8]) -> H256 {
    H256::from(keccak256(signed))
}

fn with_type_prefix(rlp: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(rlp.len() + 1);
    out.push(EIP1559_TX_TYPE);
    out.extend_from_slice(rlp);
    out
}

fn u256_to_h256(value: U256) -> H256 {
    let mut buf = [0u8; 32];
    value.to_big_endian(&mut buf);
    H256::from(buf)
}
