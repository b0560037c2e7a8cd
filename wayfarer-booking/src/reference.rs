//! Human-readable booking references: `WF-` + six random uppercase
//! alphanumerics + `-` + four digits, e.g. `WF-K3P9ZQ-0427`.
//!
//! Uniqueness is probabilistic (36^6 * 10^4 combinations); there is no retry
//! on collision. The storage layer's unique index turns a collision into a
//! `Conflict` error.

use rand::distributions::Alphanumeric;
use rand::Rng;

pub const PREFIX: &str = "WF-";
const BODY_LEN: usize = 6;
const SUFFIX_LEN: usize = 4;

pub fn generate() -> String {
    let mut rng = rand::thread_rng();
    let body: String = (&mut rng)
        .sample_iter(&Alphanumeric)
        .map(|b| (b as char).to_ascii_uppercase())
        .take(BODY_LEN)
        .collect();
    let suffix: u16 = rng.gen_range(0..10_000);
    format!("{}{}-{:04}", PREFIX, body, suffix)
}

pub fn is_well_formed(reference: &str) -> bool {
    let Some(rest) = reference.strip_prefix(PREFIX) else {
        return false;
    };
    let Some((body, suffix)) = rest.split_once('-') else {
        return false;
    };
    body.len() == BODY_LEN
        && body.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
        && suffix.len() == SUFFIX_LEN
        && suffix.chars().all(|c| c.is_ascii_digit())
}
