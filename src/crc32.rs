//! Table-driven CRC-32 (the IEEE/zlib polynomial gzip's trailer uses),
//! computed incrementally so the gzip layer can feed it one chunk at a time
//! without re-hashing anything already seen.

const POLY: u32 = 0xEDB88320;

fn build_table() -> [u32; 256] {
    let mut table = [0u32; 256];
    let mut n = 0u32;
    while (n as usize) < table.len() {
        let mut c = n;
        let mut k = 0;
        while k < 8 {
            c = if c & 1 != 0 { POLY ^ (c >> 1) } else { c >> 1 };
            k += 1;
        }
        table[n as usize] = c;
        n += 1;
    }
    table
}

fn table() -> &'static [u32; 256] {
    use std::sync::OnceLock;
    static TABLE: OnceLock<[u32; 256]> = OnceLock::new();
    TABLE.get_or_init(build_table)
}

/// Running CRC-32 accumulator. `Default` starts an empty stream's checksum.
#[derive(Debug, Clone, Copy)]
pub struct Crc32(u32);

impl Default for Crc32 {
    fn default() -> Self {
        Crc32(!0)
    }
}

impl Crc32 {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, bytes: &[u8]) {
        let table = table();
        let mut crc = self.0;
        for &byte in bytes {
            crc = table[((crc ^ byte as u32) & 0xFF) as usize] ^ (crc >> 8);
        }
        self.0 = crc;
    }

    pub fn finalize(self) -> u32 {
        !self.0
    }
}
