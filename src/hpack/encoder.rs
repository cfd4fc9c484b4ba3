//! Header block encoding (RFC 7541 §6). Prefers a full static-table match,
//! falls back to a literal with an indexed name, and otherwise emits a
//! fresh literal — always with incremental indexing, so repeated headers on
//! a long-lived connection shrink over time.

use super::huffman;
use super::integer;
use super::static_table;
use super::table::DynamicTable;

pub struct Encoder {
    table: DynamicTable,
}

impl Encoder {
    pub fn new(dynamic_table_size: usize) -> Self {
        Self {
            table: DynamicTable::new(dynamic_table_size),
        }
    }

    /// Applies a peer-advertised `SETTINGS_HEADER_TABLE_SIZE` change.
    pub fn set_max_dynamic_table_size(&mut self, size: usize) {
        self.table.set_max_size(size);
    }

    pub fn encode(&mut self, headers: &[(String, String)]) -> Vec<u8> {
        let mut out = Vec::new();
        for (name, value) in headers {
            self.encode_one(name, value, &mut out);
        }
        out
    }

    fn encode_one(&mut self, name: &str, value: &str, out: &mut Vec<u8>) {
        if let Some(index) = static_table::find_exact(name, value) {
            out.push(0x80);
            integer::encode(index as u64, 7, out);
            return;
        }
        if let Some(index) = self.find_dynamic_exact(name, value) {
            out.push(0x80);
            integer::encode(index as u64, 7, out);
            return;
        }

        out.push(0x40);
        match static_table::find_name(name).or_else(|| self.find_dynamic_name(name)) {
            Some(index) => integer::encode(index as u64, 6, out),
            None => {
                integer::encode(0, 6, out);
                write_string(name, out);
            }
        }
        write_string(value, out);
        self.table.insert(name.to_string(), value.to_string());
    }

    fn find_dynamic_exact(&self, name: &str, value: &str) -> Option<usize> {
        let static_len = static_table::STATIC_TABLE.len();
        (1..=self.table.len()).find_map(|i| {
            let (n, v) = self.table.get(i)?;
            (n == name && v == value).then_some(static_len + i)
        })
    }

    fn find_dynamic_name(&self, name: &str) -> Option<usize> {
        let static_len = static_table::STATIC_TABLE.len();
        (1..=self.table.len()).find_map(|i| {
            let (n, _) = self.table.get(i)?;
            (n == name).then_some(static_len + i)
        })
    }
}

/// Huffman-codes `s` when that's shorter than the raw bytes, as real
/// encoders do; otherwise stores it literally.
fn write_string(s: &str, out: &mut Vec<u8>) {
    let huffman_coded = huffman::encode(s.as_bytes());
    if huffman_coded.len() < s.len() {
        out.push(0x80);
        integer::encode(huffman_coded.len() as u64, 7, out);
        out.extend_from_slice(&huffman_coded);
    } else {
        out.push(0x00);
        integer::encode(s.len() as u64, 7, out);
        out.extend_from_slice(s.as_bytes());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fully_indexed_static_field() {
        let mut encoder = Encoder::new(4096);
        let out = encoder.encode(&[(":method".to_string(), "GET".to_string())]);
        assert_eq!(out, vec![0x82]);
    }

    #[test]
    fn repeated_custom_header_gets_indexed_second_time() {
        let mut encoder = Encoder::new(4096);
        let headers = vec![("x-custom".to_string(), "value".to_string())];
        let first = encoder.encode(&headers);
        let second = encoder.encode(&headers);
        // First emission is a literal (0x40 prefix); second references the
        // dynamic table entry it just inserted (1xxxxxxx prefix).
        assert_eq!(first[0] & 0xc0, 0x40);
        assert_eq!(second[0] & 0x80, 0x80);
    }
}
