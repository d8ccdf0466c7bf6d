/// Number of random bytes behind every upload id (128 bits).
pub const ID_BYTES: usize = 16;

/// Generate a fresh upload id: 32 lowercase hex characters from the OS-seeded CSPRNG.
pub fn new_id() -> String {
    let bytes: [u8; ID_BYTES] = rand::random();
    hex::encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn id_is_fixed_length_lowercase_hex() {
        let id = new_id();
        assert_eq!(id.len(), ID_BYTES * 2);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn ids_do_not_repeat() {
        let ids: HashSet<String> = (0..10_000).map(|_| new_id()).collect();
        assert_eq!(ids.len(), 10_000);
    }
}
