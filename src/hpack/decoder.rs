//! Header block decoding (RFC 7541 §6): opcode dispatch over indexed fields,
//! the three literal-field forms, and dynamic table size updates.

use super::huffman;
use super::integer;
use super::table::DynamicTable;
use super::{static_table, HpackError};

pub struct Decoder {
    table: DynamicTable,
    max_header_list_size: usize,
    /// The most recent local `SETTINGS_HEADER_TABLE_SIZE` we've told the
    /// peer about. A dynamic-table-size-update opcode on the wire may
    /// shrink the table below this at will, but never grow it past it
    /// (RFC 7541 §6.3; spec.md §3/§4.2) — doing so is a COMPRESSION_ERROR,
    /// not a silent clamp.
    local_header_table_size: usize,
}

impl Decoder {
    pub fn new(dynamic_table_size: usize, max_header_list_size: usize) -> Self {
        Self {
            table: DynamicTable::new(dynamic_table_size),
            max_header_list_size,
            local_header_table_size: dynamic_table_size,
        }
    }

    /// Applies a `SETTINGS_HEADER_TABLE_SIZE` change from our own outbound
    /// SETTINGS — shrinks (or grows) the budget the peer's encoder is told
    /// about via table size updates, and the ceiling a wire-side size
    /// update is subsequently allowed to request.
    pub fn set_max_dynamic_table_size(&mut self, size: usize) {
        self.local_header_table_size = size;
        self.table.set_max_size(size);
    }

    /// Decodes one full header block into an ordered list of (name, value)
    /// pairs, enforcing the decompressed-size cap as it goes.
    pub fn decode(&mut self, mut data: &[u8]) -> Result<Vec<(String, String)>, HpackError> {
        let mut out = Vec::new();
        let mut uncompressed_size = 0usize;
        let mut seen_non_update = false;

        while !data.is_empty() {
            let first = data[0];
            if first & 0x80 != 0 {
                // Indexed Header Field: 1xxxxxxx
                seen_non_update = true;
                let (index, used) = integer::decode(data, 7)?;
                data = &data[used..];
                let (name, value) = self.lookup(index as usize)?;
                charge(&mut uncompressed_size, self.max_header_list_size, &name, &value)?;
                out.push((name, value));
            } else if first & 0x40 != 0 {
                // Literal Header Field with Incremental Indexing: 01xxxxxx
                seen_non_update = true;
                let (name, value, used) = self.read_literal(data, 6)?;
                data = &data[used..];
                charge(&mut uncompressed_size, self.max_header_list_size, &name, &value)?;
                self.table.insert(name.clone(), value.clone());
                out.push((name, value));
            } else if first & 0x20 != 0 {
                // Dynamic Table Size Update: 001xxxxx
                if seen_non_update {
                    return Err(HpackError::MisplacedSizeUpdate);
                }
                let (size, used) = integer::decode(data, 5)?;
                data = &data[used..];
                let size = size as usize;
                if size > self.local_header_table_size {
                    return Err(HpackError::SizeUpdateExceedsLocalLimit);
                }
                self.table.set_max_size(size);
            } else {
                // Literal without indexing (0000xxxx) or never indexed
                // (0001xxxx) — both decode identically; the "never indexed"
                // bit only constrains re-encoding by a downstream proxy,
                // which is out of scope for a terminal server.
                seen_non_update = true;
                let (name, value, used) = self.read_literal(data, 4)?;
                data = &data[used..];
                charge(&mut uncompressed_size, self.max_header_list_size, &name, &value)?;
                out.push((name, value));
            }
        }

        Ok(out)
    }

    fn lookup(&self, index: usize) -> Result<(String, String), HpackError> {
        if let Some((n, v)) = static_table::get(index) {
            return Ok((n.to_string(), v.to_string()));
        }
        let dyn_index = index - static_table::STATIC_TABLE.len();
        self.table
            .get(dyn_index)
            .map(|(n, v)| (n.to_string(), v.to_string()))
            .ok_or(HpackError::InvalidIndex(index))
    }

    fn read_literal(&self, data: &[u8], prefix_bits: u8) -> Result<(String, String, usize), HpackError> {
        let (index, mut used) = integer::decode(data, prefix_bits)?;
        let name = if index == 0 {
            let (s, consumed) = self.read_string(&data[used..])?;
            used += consumed;
            s
        } else {
            let (n, _) = self.lookup(index as usize)?;
            n
        };
        let (value, consumed) = self.read_string(&data[used..])?;
        used += consumed;
        Ok((name, value, used))
    }

    fn read_string(&self, data: &[u8]) -> Result<(String, usize), HpackError> {
        let huffman_coded = data.first().map(|b| b & 0x80 != 0).unwrap_or(false);
        let (len, prefix_len) = integer::decode(data, 7)?;
        let len = len as usize;
        let payload = data
            .get(prefix_len..prefix_len + len)
            .ok_or(HpackError::Truncated)?;
        let s = if huffman_coded {
            String::from_utf8(huffman::decode(payload)?).map_err(|_| HpackError::InvalidUtf8)?
        } else {
            String::from_utf8(payload.to_vec()).map_err(|_| HpackError::InvalidUtf8)?
        };
        Ok((s, prefix_len + len))
    }
}

fn charge(running: &mut usize, cap: usize, name: &str, value: &str) -> Result<(), HpackError> {
    *running += name.len() + value.len() + 32;
    if *running > cap {
        return Err(HpackError::HeaderListTooLarge);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::super::encoder::Encoder;
    use super::*;

    #[test]
    fn decodes_fully_indexed_static_field() {
        let mut decoder = Decoder::new(4096, 1 << 20);
        // Index 2 = (":method", "GET"), indexed representation.
        let headers = decoder.decode(&[0x82]).unwrap();
        assert_eq!(headers, vec![(":method".into(), "GET".into())]);
    }

    #[test]
    fn round_trips_through_encoder() {
        let mut encoder = Encoder::new(4096);
        let mut decoder = Decoder::new(4096, 1 << 20);
        let input = vec![
            (":method".to_string(), "GET".to_string()),
            (":path".to_string(), "/".to_string()),
            ("custom-header".to_string(), "custom-value".to_string()),
        ];
        let encoded = encoder.encode(&input);
        let decoded = decoder.decode(&encoded).unwrap();
        assert_eq!(decoded, input);
    }

    #[test]
    fn dynamic_table_size_update_after_literal_is_rejected() {
        let mut decoder = Decoder::new(4096, 1 << 20);
        // 0x82 (indexed), then a (misplaced) size update 0x20.
        let err = decoder.decode(&[0x82, 0x20]).unwrap_err();
        assert!(matches!(err, HpackError::MisplacedSizeUpdate));
    }

    #[test]
    fn dynamic_table_size_update_past_local_limit_is_rejected() {
        let mut decoder = Decoder::new(64, 1 << 20);
        // 5-bit prefix integer 200 encoded as a size update opcode (0x3f
        // prefix-max, then two continuation bytes): exceeds the 64-byte
        // local HEADER_TABLE_SIZE this decoder was built with.
        let err = decoder.decode(&[0x3f, 0xa9, 0x01]).unwrap_err();
        assert!(matches!(err, HpackError::SizeUpdateExceedsLocalLimit));
    }

    #[test]
    fn dynamic_table_size_update_within_local_limit_is_accepted() {
        let mut decoder = Decoder::new(4096, 1 << 20);
        // Shrinking to 0 (all zero bits in the 5-bit prefix) is always legal.
        decoder.decode(&[0x20]).unwrap();
    }

    #[test]
    fn header_list_cap_is_enforced() {
        let mut encoder = Encoder::new(4096);
        let mut decoder = Decoder::new(4096, 16);
        let input = vec![("a-very-long-header-name".to_string(), "and-a-long-value-too".to_string())];
        let encoded = encoder.encode(&input);
        let err = decoder.decode(&encoded).unwrap_err();
        assert!(matches!(err, HpackError::HeaderListTooLarge));
    }
}
