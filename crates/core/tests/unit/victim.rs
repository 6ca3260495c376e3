//! Victim workload tests.

use cachefx_core::cache::ReplacementPolicy;
use cachefx_core::common::{CacheContext, Rng};
use cachefx_core::mmu::AccessFilter;
use cachefx_core::victim::{keygen, AesVictim, BinaryVictim, SquareMultVictim, Victim};

use crate::common::{assoc, mmu, rng};

const VIC: CacheContext = CacheContext::VICTIM;

// ──────────────────────────────────────────────────────────
// Key-pair generators
// ──────────────────────────────────────────────────────────

/// The binary pair is the one-bit secret itself.
#[test]
fn binary_pair_is_the_secret_bit() {
    let pair = keygen::binary_key_pair();
    assert_eq!(pair.key_a, vec![0]);
    assert_eq!(pair.key_b, vec![1]);
}

/// AES pairs differ by a fixed flip in the high nibbles of bytes
/// 0/4/8/12, so the leading T-table indices separate the keys.
#[test]
fn aes_pair_flips_fixed_high_nibbles() {
    let mut rng = rng();
    let pair = keygen::aes_key_pair(&mut rng);
    assert_eq!((pair.key_a[0] ^ pair.key_b[0]) & 0xF0, 0x10);
    assert_eq!((pair.key_a[4] ^ pair.key_b[4]) & 0xF0, 0x20);
    assert_eq!((pair.key_a[8] ^ pair.key_b[8]) & 0xF0, 0x30);
    assert_eq!((pair.key_a[12] ^ pair.key_b[12]) & 0xF0, 0x40);
}

/// AES plaintexts repeat the key's high nibbles at the constrained bytes.
#[test]
fn aes_plaintext_tracks_key_nibbles() {
    let mut rng = rng();
    let pair = keygen::aes_key_pair(&mut rng);
    let plaintext = keygen::aes_plaintext(&mut rng, &pair.key_a);
    assert_eq!(plaintext.len(), 16);
    for i in [0usize, 4, 8, 12] {
        assert_eq!(plaintext[i] & 0xF0, pair.key_a[i] & 0xF0);
    }
}

/// Square-and-multiply pairs force exactly the secret bit apart.
#[test]
fn square_mult_pair_forces_the_secret_bit() {
    let mut rng = rng();
    let key_bytes = 4;
    let secret_bit = 7;
    let pair = keygen::square_mult_key_pair(&mut rng, key_bytes, secret_bit);

    let bit = key_bytes as u32 * 8 - secret_bit;
    let (byte, mask) = ((bit / 8) as usize, 1u8 << (bit % 8));
    assert_eq!(pair.key_a[byte] & mask, 0, "cleared in key A");
    assert_eq!(pair.key_b[byte] & mask, mask, "set in key B");
}

// ──────────────────────────────────────────────────────────
// Binary victim
// ──────────────────────────────────────────────────────────

/// The key bit decides which address the cipher touches; the probe always
/// touches the target.
#[test]
fn binary_cipher_follows_the_key() {
    let mut rng = Rng::new(5);
    let mut mmu = mmu(assoc(ReplacementPolicy::Lru, 64));
    let mut victim = BinaryVictim::new(&mut mmu, AccessFilter::All, &mut rng).expect("victim");

    // Key bit set: the cipher reads the target line, so the probe hits.
    victim.set_key(&[1]);
    victim.cipher(&mut mmu, &[], &mut []);
    assert!(victim.access_address(&mut mmu), "target line resident");
    assert_eq!(victim.secret(), 1);

    // Key bit clear: the cipher reads the other line.
    victim.invalidate_address(&mut mmu);
    victim.set_key(&[0]);
    victim.cipher(&mut mmu, &[], &mut []);
    assert!(!victim.access_address(&mut mmu), "target line not touched");
    assert_eq!(victim.secret(), 0);
}

// ──────────────────────────────────────────────────────────
// AES victim
// ──────────────────────────────────────────────────────────

/// One encryption issues exactly 160 table reads: four per column, four
/// columns, ten rounds.
#[test]
fn aes_cipher_issues_full_table_pattern() {
    let mut rng = rng();
    let mut mmu = mmu(assoc(ReplacementPolicy::Lru, 256));
    let mut victim = AesVictim::new(&mut mmu, AccessFilter::All).expect("victim");

    let pair = victim.generate_key_pair(&mut rng);
    victim.set_key(&pair.key_a);
    let input = victim.random_plaintext(&mut rng);
    let mut output = vec![0u8; 16];
    victim.cipher(&mut mmu, &input, &mut output);

    let stats = mmu.cache().statistics(VIC);
    assert_eq!(stats.read_hits + stats.read_misses, 160);
}

/// The secret is the flipped key bit the generator plants.
#[test]
fn aes_secret_tracks_the_planted_bit() {
    let mut rng = rng();
    let mut mmu = mmu(assoc(ReplacementPolicy::Lru, 256));
    let mut victim = AesVictim::new(&mut mmu, AccessFilter::All).expect("victim");

    let pair = victim.generate_key_pair(&mut rng);
    victim.set_key(&pair.key_a);
    let secret_a = victim.secret();
    victim.set_key(&pair.key_b);
    assert_ne!(victim.secret(), secret_a);
}

/// The access filter suppresses reads outside the permitted window.
#[test]
fn aes_filter_reduces_the_pattern() {
    let mut rng = rng();
    let mut mmu = mmu(assoc(ReplacementPolicy::Lru, 256));
    let mut victim = AesVictim::new(&mut mmu, AccessFilter::TargetOnly).expect("victim");

    let pair = victim.generate_key_pair(&mut rng);
    victim.set_key(&pair.key_a);
    let input = victim.random_plaintext(&mut rng);
    let mut output = vec![0u8; 16];
    victim.cipher(&mut mmu, &input, &mut output);

    let stats = mmu.cache().statistics(VIC);
    assert!(
        stats.read_hits + stats.read_misses < 160,
        "only target-line indices reach the cache"
    );
}

// ──────────────────────────────────────────────────────────
// Square-and-multiply victim
// ──────────────────────────────────────────────────────────

fn square_mult_victim(
    mmu: &mut cachefx_core::mmu::Mmu,
) -> SquareMultVictim {
    let modulus: Vec<u16> = (0..8).map(|i| 0xFFFF - i as u16).collect();
    SquareMultVictim::new(mmu, 2, 8, &modulus, 7, AccessFilter::All).expect("victim")
}

/// The exponentiation touches every operand array.
#[test]
fn square_mult_touches_all_arrays() {
    let mut rng = rng();
    let mut mmu = mmu(assoc(ReplacementPolicy::Lru, 256));
    let mut victim = square_mult_victim(&mut mmu);

    let pair = victim.generate_key_pair(&mut rng);
    victim.set_key(&pair.key_b);
    let input = victim.random_plaintext(&mut rng);
    let mut output = vec![0u8; victim.output_size()];
    victim.cipher(&mut mmu, &input, &mut output);

    let stats = mmu.cache().statistics(VIC);
    assert!(stats.read_hits + stats.read_misses > 0, "reads flushed");
    assert!(stats.write_hits + stats.write_misses > 0, "writes flushed");
}

/// A set secret bit costs an extra multiply, which shows up as strictly
/// more base-array traffic under key B.
#[test]
fn square_mult_key_bit_changes_traffic() {
    let mut rng = rng();

    let accesses_for = |key_select: bool, rng: &mut Rng| {
        let mut mmu = mmu(assoc(ReplacementPolicy::Lru, 256));
        let mut victim = square_mult_victim(&mut mmu);
        let pair = victim.generate_key_pair(rng);
        let key = if key_select { pair.key_b } else { pair.key_a };
        // Fix every other bit so only the secret differs.
        let mut zeroed = vec![0u8; key.len()];
        let bit = key.len() as u32 * 8 - 7;
        zeroed[(bit / 8) as usize] = key[(bit / 8) as usize] & (1 << (bit % 8));
        victim.set_key(&zeroed);
        let input = victim.random_plaintext(rng);
        let mut output = vec![0u8; victim.output_size()];
        victim.cipher(&mut mmu, &input, &mut output);
        let stats = mmu.cache().statistics(VIC);
        stats.read_hits + stats.read_misses + stats.write_hits + stats.write_misses
    };

    let quiet = accesses_for(false, &mut rng);
    let loud = accesses_for(true, &mut rng);
    assert!(loud > quiet, "the extra multiply leaves a trace");
}

/// The secret is read back from the installed key.
#[test]
fn square_mult_secret_follows_key() {
    let mut rng = rng();
    let mut mmu = mmu(assoc(ReplacementPolicy::Lru, 256));
    let mut victim = square_mult_victim(&mut mmu);

    let pair = victim.generate_key_pair(&mut rng);
    victim.set_key(&pair.key_a);
    assert_eq!(victim.secret(), 0);
    victim.set_key(&pair.key_b);
    assert_eq!(victim.secret(), 1);
}
