//! # G-Record Digest Bank
//!
//! Four MD5 streams over the fix-record bytes, each started from its own
//! initialization vector instead of the RFC 1321 constants. The seeds are
//! part of the file format: a verifier must use the same four.
//!
//! **Block size**: 64 bytes
//! **Digest size**: 16 bytes per stream

/// RFC 1321 initialization vector
pub const MD5_STANDARD_SEED: [u32; 4] = [0x6745_2301, 0xefcd_ab89, 0x98ba_dcfe, 0x1032_5476];

/// Seeds of the four G-record streams (a, b, c, d)
pub const G_RECORD_SEEDS: [[u32; 4]; 4] = [
    [0x63e5_4c01, 0x25ad_ab89, 0x44ba_ecfe, 0x60f2_5476],
    [0x41e2_4d03, 0x23b8_ebea, 0x4a4b_fc9e, 0x640e_d89a],
    [0x61e5_4e01, 0x22cd_ab89, 0x48b2_0cfe, 0x6212_5476],
    [0xc1e8_4fe8, 0x21d1_c28a, 0x438e_1a12, 0x6c25_0aee],
];

/// Per-round left-rotate amounts
const SHIFTS: [u32; 64] = [
    7, 12, 17, 22, 7, 12, 17, 22, 7, 12, 17, 22, 7, 12, 17, 22,
    5, 9, 14, 20, 5, 9, 14, 20, 5, 9, 14, 20, 5, 9, 14, 20,
    4, 11, 16, 23, 4, 11, 16, 23, 4, 11, 16, 23, 4, 11, 16, 23,
    6, 10, 15, 21, 6, 10, 15, 21, 6, 10, 15, 21, 6, 10, 15, 21,
];

/// Additive constants, `floor(abs(sin(i + 1)) * 2^32)`
const K: [u32; 64] = [
    0xd76a_a478, 0xe8c7_b756, 0x2420_70db, 0xc1bd_ceee, 0xf57c_0faf, 0x4787_c62a, 0xa830_4613, 0xfd46_9501,
    0x6980_98d8, 0x8b44_f7af, 0xffff_5bb1, 0x895c_d7be, 0x6b90_1122, 0xfd98_7193, 0xa679_438e, 0x49b4_0821,
    0xf61e_2562, 0xc040_b340, 0x265e_5a51, 0xe9b6_c7aa, 0xd62f_105d, 0x0244_1453, 0xd8a1_e681, 0xe7d3_fbc8,
    0x21e1_cde6, 0xc337_07d6, 0xf4d5_0d87, 0x455a_14ed, 0xa9e3_e905, 0xfcef_a3f8, 0x676f_02d9, 0x8d2a_4c8a,
    0xfffa_3942, 0x8771_f681, 0x6d9d_6122, 0xfde5_380c, 0xa4be_ea44, 0x4bde_cfa9, 0xf6bb_4b60, 0xbebf_bc70,
    0x289b_7ec6, 0xeaa1_27fa, 0xd4ef_3085, 0x0488_1d05, 0xd9d4_d039, 0xe6db_99e5, 0x1fa2_7cf8, 0xc4ac_5665,
    0xf429_2244, 0x432a_ff97, 0xab94_23a7, 0xfc93_a039, 0x655b_59c3, 0x8f0c_cc92, 0xffef_f47d, 0x8584_5dd1,
    0x6fa8_7e4f, 0xfe2c_e6e0, 0xa301_4314, 0x4e08_11a1, 0xf753_7e82, 0xbd3a_f235, 0x2ad7_d2bb, 0xeb86_d391,
];

/// Incremental MD5 with a caller-chosen initial state
#[derive(Debug, Clone)]
pub struct SeededMd5 {
    state: [u32; 4],
    block: [u8; 64],
    block_len: usize,
    total_len: u64,
}

impl SeededMd5 {
    /// Start a stream from `seed` (A, B, C, D)
    pub fn with_seed(seed: [u32; 4]) -> Self {
        Self {
            state: seed,
            block: [0u8; 64],
            block_len: 0,
            total_len: 0,
        }
    }

    /// Start a plain RFC 1321 MD5 stream
    pub fn standard() -> Self {
        Self::with_seed(MD5_STANDARD_SEED)
    }

    /// Feed bytes into the stream
    pub fn update(&mut self, mut data: &[u8]) {
        self.total_len = self.total_len.wrapping_add(data.len() as u64);

        if self.block_len > 0 {
            let take = (64 - self.block_len).min(data.len());
            self.block[self.block_len..self.block_len + take].copy_from_slice(&data[..take]);
            self.block_len += take;
            data = &data[take..];

            if self.block_len < 64 {
                return;
            }
            let block = self.block;
            compress(&mut self.state, &block);
            self.block_len = 0;
        }

        let mut chunks = data.chunks_exact(64);
        for chunk in &mut chunks {
            let mut block = [0u8; 64];
            block.copy_from_slice(chunk);
            compress(&mut self.state, &block);
        }

        let rest = chunks.remainder();
        self.block[..rest.len()].copy_from_slice(rest);
        self.block_len = rest.len();
    }

    /// Pad and produce the digest, consuming this stream.
    ///
    /// Callers that need to keep hashing finalize a clone.
    pub fn finalize(mut self) -> [u8; 16] {
        let bit_len = self.total_len.wrapping_mul(8);

        let mut padding = [0u8; 72];
        padding[0] = 0x80;
        let pad_len = if self.block_len < 56 {
            56 - self.block_len
        } else {
            120 - self.block_len
        };
        self.update(&padding[..pad_len]);
        self.update(&bit_len.to_le_bytes());

        let mut out = [0u8; 16];
        for (chunk, word) in out.chunks_exact_mut(4).zip(self.state.iter()) {
            chunk.copy_from_slice(&word.to_le_bytes());
        }
        out
    }
}

/// MD5 compression of one 64-byte block into `state`
fn compress(state: &mut [u32; 4], block: &[u8; 64]) {
    let mut m = [0u32; 16];
    for (word, bytes) in m.iter_mut().zip(block.chunks_exact(4)) {
        *word = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
    }

    let [mut a, mut b, mut c, mut d] = *state;

    for i in 0..64 {
        let (f, g) = match i / 16 {
            0 => ((b & c) | (!b & d), i),
            1 => ((d & b) | (!d & c), (5 * i + 1) % 16),
            2 => (b ^ c ^ d, (3 * i + 5) % 16),
            _ => (c ^ (b | !d), (7 * i) % 16),
        };

        let rotated = a
            .wrapping_add(f)
            .wrapping_add(K[i])
            .wrapping_add(m[g])
            .rotate_left(SHIFTS[i]);
        a = d;
        d = c;
        c = b;
        b = b.wrapping_add(rotated);
    }

    state[0] = state[0].wrapping_add(a);
    state[1] = state[1].wrapping_add(b);
    state[2] = state[2].wrapping_add(c);
    state[3] = state[3].wrapping_add(d);
}

/// The four live G-record streams of one open IGC file
#[derive(Debug, Clone)]
pub struct DigestBank {
    streams: [SeededMd5; 4],
}

impl Default for DigestBank {
    fn default() -> Self {
        Self::new()
    }
}

impl DigestBank {
    /// Fresh bank seeded with [`G_RECORD_SEEDS`]
    pub fn new() -> Self {
        Self {
            streams: G_RECORD_SEEDS.map(SeededMd5::with_seed),
        }
    }

    /// Feed the same bytes, in order, into all four streams
    pub fn update(&mut self, data: &[u8]) {
        for stream in self.streams.iter_mut() {
            stream.update(data);
        }
    }

    /// Digests of copies of the four streams; the live streams stay open
    pub fn snapshot(&self) -> [[u8; 16]; 4] {
        [
            self.streams[0].clone().finalize(),
            self.streams[1].clone().finalize(),
            self.streams[2].clone().finalize(),
            self.streams[3].clone().finalize(),
        ]
    }
}

/// Lowercase hex rendering of a digest
pub fn to_hex(digest: &[u8]) -> String {
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}
