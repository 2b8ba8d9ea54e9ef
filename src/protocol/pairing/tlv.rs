//! TLV8 encoding for `HomeKit` pairing messages
//!
//! Items are emitted in call order. Values longer than 255 bytes are split
//! into consecutive fragments carrying the same tag, and the decoder joins
//! consecutive same-tag fragments back into one logical value.

use byteorder::{ByteOrder, LittleEndian};
use thiserror::Error;

/// Maximum value length of a single TLV fragment
pub const MAX_FRAGMENT_LEN: usize = 255;

macro_rules! tlv_types {
    ($($(#[$doc:meta])* $name:ident = $code:literal,)*) => {
        /// Tags defined for pairing messages
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[repr(u8)]
        pub enum TlvType {
            $($(#[$doc])* $name = $code,)*
        }

        impl TlvType {
            /// Map a raw tag back to its type
            #[must_use]
            pub fn from_byte(b: u8) -> Option<Self> {
                match b {
                    $($code => Some(Self::$name),)*
                    _ => None,
                }
            }
        }
    };
}

tlv_types! {
    /// `methods::*` value carried by M1 and `/pairings` requests
    Method = 0x00,
    /// Pairing identifier of a controller or the accessory
    Identifier = 0x01,
    /// 16-byte SRP salt
    Salt = 0x02,
    /// SRP, X25519 or Ed25519 public key depending on the step
    PublicKey = 0x03,
    /// SRP proof
    Proof = 0x04,
    /// Sub-TLV sealed with ChaCha20-Poly1305
    EncryptedData = 0x05,
    /// Step number M1..M6
    State = 0x06,
    /// `errors::*` code
    Error = 0x07,
    RetryDelay = 0x08,
    Certificate = 0x09,
    /// Ed25519 signature
    Signature = 0x0A,
    /// `0` user, `1` admin
    Permissions = 0x0B,
    FragmentData = 0x0C,
    FragmentLast = 0x0D,
    Flags = 0x13,
    /// Empty item between records of a list
    Separator = 0xFF,
}

/// TLV decoding errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TlvError {
    #[error("buffer too small")]
    BufferTooSmall,

    #[error("invalid TLV structure")]
    InvalidStructure,

    #[error("missing required field: {0:?}")]
    MissingField(TlvType),

    #[error("invalid value for {0:?}")]
    InvalidValue(TlvType),
}

/// A single logical TLV item (fragments already joined)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlvItem {
    /// Raw tag byte
    pub tag: u8,
    /// Reassembled value
    pub value: Vec<u8>,
}

/// TLV encoder
#[derive(Debug, Default)]
pub struct TlvEncoder {
    buffer: Vec<u8>,
}

impl TlvEncoder {
    /// Create a new encoder
    #[must_use]
    pub fn new() -> Self {
        Self { buffer: Vec::new() }
    }

    /// Add a TLV item, fragmenting values longer than 255 bytes
    #[must_use]
    pub fn add(self, tlv_type: TlvType, value: &[u8]) -> Self {
        self.add_raw(tlv_type as u8, value)
    }

    /// Add an item under a tag outside [`TlvType`]
    #[must_use]
    pub fn add_raw(mut self, tag: u8, value: &[u8]) -> Self {
        self.push_raw(tag, value);
        self
    }

    fn push_raw(&mut self, tag: u8, value: &[u8]) {
        if value.is_empty() {
            self.buffer.push(tag);
            self.buffer.push(0);
            return;
        }

        for chunk in value.chunks(MAX_FRAGMENT_LEN) {
            self.buffer.push(tag);
            #[allow(clippy::cast_possible_truncation)]
            self.buffer.push(chunk.len() as u8);
            self.buffer.extend_from_slice(chunk);
        }
    }

    /// Add a single byte value
    #[must_use]
    pub fn add_byte(self, tlv_type: TlvType, value: u8) -> Self {
        self.add(tlv_type, &[value])
    }

    /// Add a little-endian `u16`, always two bytes
    #[must_use]
    pub fn add_u16(self, tlv_type: TlvType, value: u16) -> Self {
        let mut buf = [0u8; 2];
        LittleEndian::write_u16(&mut buf, value);
        self.add(tlv_type, &buf)
    }

    /// Add a little-endian `u32`, always four bytes
    #[must_use]
    pub fn add_u32(self, tlv_type: TlvType, value: u32) -> Self {
        let mut buf = [0u8; 4];
        LittleEndian::write_u32(&mut buf, value);
        self.add(tlv_type, &buf)
    }

    /// Add a little-endian `u64`, always eight bytes
    #[must_use]
    pub fn add_u64(self, tlv_type: TlvType, value: u64) -> Self {
        let mut buf = [0u8; 8];
        LittleEndian::write_u64(&mut buf, value);
        self.add(tlv_type, &buf)
    }

    /// Add state value
    #[must_use]
    pub fn add_state(self, state: u8) -> Self {
        self.add_byte(TlvType::State, state)
    }

    /// Add error value
    #[must_use]
    pub fn add_error(self, code: u8) -> Self {
        self.add_byte(TlvType::Error, code)
    }

    /// Add an empty separator item
    #[must_use]
    pub fn add_separator(self) -> Self {
        self.add(TlvType::Separator, &[])
    }

    /// Build the encoded TLV data
    #[must_use]
    pub fn build(self) -> Vec<u8> {
        self.buffer
    }
}

/// Walk raw fragments, yielding `(tag, value)` without joining
fn fragments(data: &[u8]) -> impl Iterator<Item = Result<(u8, &[u8]), TlvError>> {
    let mut pos = 0;
    std::iter::from_fn(move || {
        if pos >= data.len() {
            return None;
        }
        if pos + 2 > data.len() {
            pos = data.len();
            return Some(Err(TlvError::BufferTooSmall));
        }

        let tag = data[pos];
        let length = data[pos + 1] as usize;
        let start = pos + 2;

        if start + length > data.len() {
            pos = data.len();
            return Some(Err(TlvError::BufferTooSmall));
        }

        pos = start + length;
        Some(Ok((tag, &data[start..start + length])))
    })
}

/// TLV decoder holding items in emission order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TlvDecoder {
    items: Vec<TlvItem>,
}

impl TlvDecoder {
    /// Decode TLV data
    ///
    /// # Errors
    ///
    /// Returns error if the buffer is truncated
    pub fn decode(data: &[u8]) -> Result<Self, TlvError> {
        let mut items: Vec<TlvItem> = Vec::new();

        for fragment in fragments(data) {
            let (tag, value) = fragment?;
            match items.last_mut() {
                Some(last) if last.tag == tag => last.value.extend_from_slice(value),
                _ => items.push(TlvItem {
                    tag,
                    value: value.to_vec(),
                }),
            }
        }

        Ok(Self { items })
    }

    /// Decode a list of records, starting a new record each time `list_tag`
    /// appears after a different tag
    ///
    /// # Errors
    ///
    /// Returns error if the buffer is truncated or does not begin with `list_tag`
    pub fn decode_list(data: &[u8], list_tag: TlvType) -> Result<Vec<Self>, TlvError> {
        let all = Self::decode(data)?;
        let mut records: Vec<Self> = Vec::new();

        for item in all.items {
            if item.tag == list_tag as u8 {
                records.push(Self::default());
            }
            match records.last_mut() {
                Some(record) => record.items.push(item),
                None => return Err(TlvError::InvalidStructure),
            }
        }

        Ok(records)
    }

    /// All items in order
    #[must_use]
    pub fn items(&self) -> &[TlvItem] {
        &self.items
    }

    /// Get the first value with this type
    #[must_use]
    pub fn get(&self, tlv_type: TlvType) -> Option<&[u8]> {
        self.items
            .iter()
            .find(|item| item.tag == tlv_type as u8)
            .map(|item| item.value.as_slice())
    }

    /// Get a single byte value
    #[must_use]
    pub fn get_u8(&self, tlv_type: TlvType) -> Option<u8> {
        self.get(tlv_type).and_then(|v| v.first().copied())
    }

    /// Value that must be exactly `N` bytes
    fn fixed<const N: usize>(&self, tlv_type: TlvType) -> Result<[u8; N], TlvError> {
        self.get_required(tlv_type)?
            .try_into()
            .map_err(|_| TlvError::InvalidValue(tlv_type))
    }

    /// Get a little-endian `u16`
    ///
    /// # Errors
    ///
    /// Returns error if the field is missing or not exactly two bytes
    pub fn get_u16(&self, tlv_type: TlvType) -> Result<u16, TlvError> {
        self.fixed::<2>(tlv_type).map(|b| LittleEndian::read_u16(&b))
    }

    /// Get a little-endian `u32`
    ///
    /// # Errors
    ///
    /// Returns error if the field is missing or not exactly four bytes
    pub fn get_u32(&self, tlv_type: TlvType) -> Result<u32, TlvError> {
        self.fixed::<4>(tlv_type).map(|b| LittleEndian::read_u32(&b))
    }

    /// Get a little-endian `u64`
    ///
    /// # Errors
    ///
    /// Returns error if the field is missing or not exactly eight bytes
    pub fn get_u64(&self, tlv_type: TlvType) -> Result<u64, TlvError> {
        self.fixed::<8>(tlv_type).map(|b| LittleEndian::read_u64(&b))
    }

    /// Get a required value
    ///
    /// # Errors
    ///
    /// Returns error if field is missing
    pub fn get_required(&self, tlv_type: TlvType) -> Result<&[u8], TlvError> {
        self.get(tlv_type).ok_or(TlvError::MissingField(tlv_type))
    }

    /// Get state value
    ///
    /// # Errors
    ///
    /// Returns error if state field is missing or invalid length
    pub fn get_state(&self) -> Result<u8, TlvError> {
        self.fixed::<1>(TlvType::State).map(|[state]| state)
    }

    /// Get error value (if present)
    #[must_use]
    pub fn get_error(&self) -> Option<u8> {
        self.get_u8(TlvType::Error)
    }
}

/// Values of the `Method` tag
pub mod methods {
    pub const PAIR_SETUP: u8 = 0;
    pub const PAIR_VERIFY: u8 = 2;
    pub const ADD_PAIRING: u8 = 3;
    pub const REMOVE_PAIRING: u8 = 4;
    pub const LIST_PAIRINGS: u8 = 5;
}

/// Error codes sent to the controller
pub mod errors {
    pub const UNKNOWN: u8 = 0x01;
    pub const AUTHENTICATION: u8 = 0x02;
    pub const BACKOFF: u8 = 0x03;
    pub const MAX_PEERS: u8 = 0x04;
    pub const MAX_TRIES: u8 = 0x05;
    pub const UNAVAILABLE: u8 = 0x06;
    pub const BUSY: u8 = 0x07;
}
