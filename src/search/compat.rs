//! Percent identity of an aligned pair of rows, accounting for IUPAC ambiguity codes.
//!
//! vsearch scores literal character equality, so a degenerate base in a 16S sequence counts as a mismatch
//! there. We recompute identity from the aligned rows : a position matches if the sets of bases
//! the two codes stand for intersect. A gap matches only a gap, and N matches anything.

const BASE_A: u8 = 0b0001;
const BASE_C: u8 = 0b0010;
const BASE_G: u8 = 0b0100;
const BASE_T: u8 = 0b1000;

/// set of bases an IUPAC nucleotide code stands for, None for gap or unknown characters
#[inline]
fn iupac_bases(code: u8) -> Option<u8> {
    let bases = match code.to_ascii_uppercase() {
        b'A' => BASE_A,
        b'C' => BASE_C,
        b'G' => BASE_G,
        b'T' | b'U' => BASE_T,
        b'R' => BASE_A | BASE_G,
        b'Y' => BASE_C | BASE_T,
        b'M' => BASE_A | BASE_C,
        b'K' => BASE_G | BASE_T,
        b'S' => BASE_C | BASE_G,
        b'W' => BASE_A | BASE_T,
        b'H' => BASE_A | BASE_C | BASE_T,
        b'B' => BASE_C | BASE_G | BASE_T,
        b'V' => BASE_A | BASE_C | BASE_G,
        b'D' => BASE_A | BASE_G | BASE_T,
        b'N' => BASE_A | BASE_C | BASE_G | BASE_T,
        _ => return None,
    };
    Some(bases)
} // end of iupac_bases

/// true if the two aligned characters are compatible
#[inline]
pub fn nucleotides_match(q: u8, s: u8) -> bool {
    let (q, s) = (q.to_ascii_uppercase(), s.to_ascii_uppercase());
    if q == b'N' || s == b'N' || q == s {
        return true;
    }
    match (iupac_bases(q), iupac_bases(s)) {
        (Some(qb), Some(sb)) => qb & sb != 0,
        _ => false,
    }
}

/// number of compatible positions of two aligned rows
pub fn count_matches(qrow: &str, srow: &str) -> usize {
    qrow.bytes()
        .zip(srow.bytes())
        .filter(|(q, s)| nucleotides_match(*q, *s))
        .count()
}

/// percent identity (in 0..100) of 2 aligned rows of same length, gaps included in length
pub fn pctid(qrow: &str, srow: &str) -> f64 {
    if qrow.len() != srow.len() {
        log::warn!("aligned rows of different lengths {} and {}", qrow.len(), srow.len());
    }
    let nb_positions = qrow.len().max(srow.len());
    if nb_positions == 0 {
        return 0.;
    }
    100. * count_matches(qrow, srow) as f64 / nb_positions as f64
} // end of pctid

#[cfg(test)]
mod tests {

    use super::*;

    #[test]
    fn test_count_matches_degenerate() {
        assert_eq!(count_matches("ACGTNNY-G", "ACGGNAA-G"), 7);
    }

    #[test]
    fn test_degenerate_codes() {
        assert!(nucleotides_match(b'R', b'A'));
        assert!(nucleotides_match(b'R', b'G'));
        assert!(!nucleotides_match(b'R', b'C'));
        assert!(nucleotides_match(b'Y', b'K'));
        assert!(!nucleotides_match(b'M', b'K'));
        assert!(nucleotides_match(b'N', b'-'));
        assert!(!nucleotides_match(b'A', b'-'));
        assert!(!nucleotides_match(b'-', b'R'));
        assert!(nucleotides_match(b'-', b'-'));
    }

    #[test]
    fn test_plain_rows_give_literal_identity() {
        let rows = [
            ("ACGTACGTAC", "ACGTACGTAC"),
            ("ACGTACGTAC", "ACGAACGTTC"),
            ("AC-TACG-AC", "ACGTAC--AC"),
            ("TTTTTTTTTT", "AAAAAAAAAA"),
            ("GATTACA", "GATCACA"),
        ];
        for (q, s) in rows {
            let literal = q.bytes().zip(s.bytes()).filter(|(a, b)| a == b).count();
            let expected = 100. * literal as f64 / q.len() as f64;
            assert!((pctid(q, s) - expected).abs() < 1e-12, "rows {} {}", q, s);
        }
    }

    #[test]
    fn test_pctid_empty_rows() {
        assert_eq!(pctid("", ""), 0.);
    }
}
