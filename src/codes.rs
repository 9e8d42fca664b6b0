use rand::Rng;

/// Default room code length. 26^4 gives roughly 450K codes, plenty for a
/// process whose rooms live minutes, not days.
pub const CODE_LENGTH: usize = 4;

/// Produces one random candidate code of `length` uppercase letters.
///
/// Collision checking against live rooms is the registry's job, since only it
/// can make the check-and-insert atomic. Codes are human-typed and low-stakes,
/// so the thread rng is deliberate.
pub fn random_code(length: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..length)
        .map(|_| char::from(rng.gen_range(b'A'..=b'Z')))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_fixed_length_uppercase() {
        for _ in 0..200 {
            let code = random_code(CODE_LENGTH);
            assert_eq!(code.len(), CODE_LENGTH);
            assert!(code.chars().all(|c| c.is_ascii_uppercase()));
        }
    }

    #[test]
    fn honors_requested_length() {
        assert_eq!(random_code(10).len(), 10);
        assert_eq!(random_code(0), "");
    }
}
