/// Packed k-mer representation: 2 bits per base, A=00, C=01, G=10, T=11,
/// first base of the window in the most significant bits. Only the low 2*k
/// bits are ever set.
pub type KmerValue = u64;

pub const MAX_KMER_LENGTH: usize = 31;

/// 2-bit code for a nucleotide byte; `None` for anything that is not a base
fn base_code(c: u8) -> Option<KmerValue> {
    match c {
        b'A' | b'a' => Some(0),
        b'C' | b'c' => Some(1),
        b'G' | b'g' => Some(2),
        b'T' | b't' => Some(3),
        _ => None,
    }
}

/// Rolling encoder turning a stream of nucleotide bytes into the sequence of
/// packed values for every window of k consecutive bases. Each new base
/// costs one shift and one mask; the previous value is the only state.
///
/// Bytes that do not code for a base (newlines left over from cleaning,
/// ambiguity codes such as N) are skipped without resetting the window, so a
/// window can span a stripped separator.
pub struct KmerCoder {
    k: usize,
    mask: KmerValue,
    kmer: KmerValue,
    filled: usize,
}

impl KmerCoder {
    pub fn new(k: usize) -> Self {
        assert!(
            (1..=MAX_KMER_LENGTH).contains(&k),
            "Kmer length out of range"
        );
        Self {
            k,
            mask: (1 << (k << 1)) - 1,
            kmer: 0,
            filled: 0,
        }
    }

    /// Forget the current window so the next genome starts from scratch
    pub fn clear(&mut self) {
        self.kmer = 0;
        self.filled = 0;
    }

    /// Feed one byte; returns the packed value once a full window of k
    /// valid bases is available, then one value per further valid base
    #[inline]
    pub fn add_byte(&mut self, c: u8) -> Option<KmerValue> {
        let x = base_code(c)?;
        self.kmer = ((self.kmer << 2) | x) & self.mask;
        if self.filled < self.k {
            self.filled += 1;
        }
        if self.filled == self.k {
            Some(self.kmer)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    fn encode_all(coder: &mut KmerCoder, seq: &[u8]) -> Vec<KmerValue> {
        seq.iter().filter_map(|&c| coder.add_byte(c)).collect()
    }

    fn decode(value: KmerValue, k: usize) -> String {
        (0..k)
            .rev()
            .map(|i| match (value >> (i << 1)) & 3 {
                0 => 'A',
                1 => 'C',
                2 => 'G',
                _ => 'T',
            })
            .collect()
    }

    #[test]
    fn known_values() {
        // AC = 0001, CG = 0110, GT = 1011
        let mut coder = KmerCoder::new(2);
        assert_eq!(encode_all(&mut coder, b"ACGT"), vec![1, 6, 11]);
        coder.clear();
        assert_eq!(encode_all(&mut coder, b"ACGA"), vec![1, 6, 8]);
    }

    #[test]
    fn case_insensitive() {
        let mut a = KmerCoder::new(3);
        let mut b = KmerCoder::new(3);
        assert_eq!(
            encode_all(&mut a, b"acgtACGT"),
            encode_all(&mut b, b"ACGTacgt")
        );
    }

    #[test]
    fn non_base_bytes_skipped_without_reset() {
        let mut plain = KmerCoder::new(2);
        let expected = encode_all(&mut plain, b"ACGT");
        let mut split = KmerCoder::new(2);
        assert_eq!(encode_all(&mut split, b"AC\nGT"), expected);
        let mut noisy = KmerCoder::new(2);
        assert_eq!(encode_all(&mut noisy, b"ACNNGT"), expected);
    }

    #[test]
    fn clear_restarts_window() {
        let mut coder = KmerCoder::new(3);
        assert_eq!(encode_all(&mut coder, b"ACGT").len(), 2);
        coder.clear();
        // two bases are not enough for a fresh window
        assert!(encode_all(&mut coder, b"GT").is_empty());
        assert_eq!(coder.add_byte(b'A'), Some(0b101100));
    }

    #[test]
    fn short_input_yields_nothing() {
        let mut coder = KmerCoder::new(5);
        assert!(encode_all(&mut coder, b"ACGT").is_empty());
    }

    #[test]
    fn roundtrip_random_sequences() {
        let mut rng = StdRng::seed_from_u64(0x5eed);
        for k in [1usize, 2, 3, 16, MAX_KMER_LENGTH] {
            let seq: Vec<u8> = (0..200).map(|_| b"ACGT"[rng.gen_range(0..4)]).collect();
            let mut coder = KmerCoder::new(k);
            let values = encode_all(&mut coder, &seq);
            assert_eq!(values.len(), seq.len() + 1 - k);
            for (i, v) in values.iter().enumerate() {
                let window = std::str::from_utf8(&seq[i..i + k]).unwrap();
                assert_eq!(decode(*v, k), window);
            }
        }
    }

    #[test]
    fn max_length_uses_62_bits() {
        let k = MAX_KMER_LENGTH;
        let mut coder = KmerCoder::new(k);
        let seq = vec![b'T'; k];
        let v = encode_all(&mut coder, &seq)[0];
        assert_eq!(v, (1u64 << (2 * k)) - 1);
    }
}
