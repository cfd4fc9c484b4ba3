//! The HPACK codec (RFC 7541): a from-scratch implementation — static
//! table, Huffman coding, varint integers, the dynamic table, and opcode
//! dispatch for header block (de)compression. Kept sans-I/O like
//! [`crate::frame`]; [`crate::conn`] feeds it whole HEADERS-block payloads
//! reassembled from their CONTINUATION frames.

mod decoder;
mod encoder;
mod huffman;
mod integer;
pub mod static_table;
mod table;

pub use decoder::Decoder;
pub use encoder::Encoder;

use huffman::HuffmanError;
use integer::IntegerError;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HpackError {
    #[error(transparent)]
    Integer(#[from] IntegerError),
    #[error(transparent)]
    Huffman(#[from] HuffmanError),
    #[error("header index {0} is out of range")]
    InvalidIndex(usize),
    #[error("truncated header block")]
    Truncated,
    #[error("header string is not valid UTF-8")]
    InvalidUtf8,
    #[error("dynamic table size update after a non-update entry")]
    MisplacedSizeUpdate,
    #[error("decompressed header list exceeds the configured cap")]
    HeaderListTooLarge,
    #[error("dynamic table size update exceeds the locally accepted HEADER_TABLE_SIZE")]
    SizeUpdateExceedsLocalLimit,
}
