pub mod enums;
pub mod feed;
pub mod operational;

pub use feed::StudyRecord;
pub use operational::*;

/// Map a prefixed natural key (`PAT0005001`, `EXT_00004382_003_ENC`) to the
/// warehouse integer key by extracting its digit characters.
///
/// Injective only under the fixed-width numeric-suffix ID convention: two
/// differently-prefixed keys carrying the same digits collapse to one
/// integer, and nothing here guards against that.
pub fn natural_key_digits(key: &str) -> Option<i64> {
    let digits: String = key.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }
    digits.parse().ok()
}
