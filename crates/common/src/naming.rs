//! Unique naming for parallel scenario runs
//!
//! Scenarios share one subscription, so anything they create has to carry a
//! suffix that no concurrent or earlier run will reuse.

use rand::Rng;

const ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// Length of ids returned by [`unique_id`]
pub const UNIQUE_ID_LEN: usize = 6;

/// A short random id made of lowercase letters and digits.
///
/// Lowercase alphanumerics keep the suffix legal inside storage account and
/// key vault names, which are the strictest Azure naming rules involved.
pub fn unique_id() -> String {
    let mut rng = rand::thread_rng();
    (0..UNIQUE_ID_LEN)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect()
}

/// Whether `name` is a legal storage account name
pub fn is_valid_storage_account_name(name: &str) -> bool {
    (3..=24).contains(&name.len())
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_unique_id_shape() {
        let id = unique_id();
        assert_eq!(id.len(), UNIQUE_ID_LEN);
        assert_eq!(id, id.to_lowercase());
        assert!(id.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn test_unique_ids_do_not_collide() {
        let ids: HashSet<String> = (0..200).map(|_| unique_id()).collect();
        assert_eq!(ids.len(), 200);
    }

    #[test]
    fn test_storage_account_name_rules() {
        assert!(is_valid_storage_account_name("sttestapp01"));
        assert!(!is_valid_storage_account_name("st"));
        assert!(!is_valid_storage_account_name("StTestApp"));
        assert!(!is_valid_storage_account_name("st-test"));
        assert!(!is_valid_storage_account_name("stabcdefghijklmnopqrstuvw"));
    }
}
