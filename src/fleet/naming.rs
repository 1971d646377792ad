/// Next free `<prefix>-<N>` name: one past the highest numbered name, or `<prefix>-1`.
///
/// Names that don't follow the pattern exactly are ignored.
pub fn next_container_name<'a, I>(prefix: &str, existing: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    let highest = existing
        .into_iter()
        .filter_map(|name| sequence_number(prefix, name))
        .max();
    match highest {
        Some(n) => format!("{prefix}-{}", u64::from(n) + 1),
        None => format!("{prefix}-1"),
    }
}

/// Suffixes too large for a `u32` are treated as non-matching.
fn sequence_number(prefix: &str, name: &str) -> Option<u32> {
    let digits = name.strip_prefix(prefix)?.strip_prefix('-')?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Dedicated data volume of a container.
pub fn volume_name(prefix: &str, container_name: &str) -> String {
    format!("{prefix}-data-{container_name}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_after_highest() {
        assert_eq!(next_container_name("x", ["x-1", "x-2", "x-5"]), "x-6");
    }

    #[test]
    fn test_first_name_when_empty() {
        assert_eq!(next_container_name("x", std::iter::empty()), "x-1");
    }

    #[test]
    fn test_non_matching_names_ignored() {
        let names = [
            "gluetun-2",
            "gluetun-data",
            "gluetun-3a",
            "gluetun-+9",
            "my-gluetun-40",
            "gluetun-",
            "gluetun10",
        ];
        assert_eq!(next_container_name("gluetun", names), "gluetun-3");
        assert_eq!(next_container_name("gluetun", ["custom"]), "gluetun-1");
    }

    #[test]
    fn test_oversized_suffix_ignored() {
        let huge = format!("gluetun-{}", u64::MAX);
        assert_eq!(next_container_name("gluetun", [huge.as_str(), "gluetun-2"]), "gluetun-3");
        assert_eq!(next_container_name("gluetun", [huge.as_str()]), "gluetun-1");
        assert_eq!(
            next_container_name("gluetun", ["gluetun-4294967295"]),
            "gluetun-4294967296"
        );
    }

    #[test]
    fn test_volume_name() {
        assert_eq!(volume_name("gluetun", "gluetun-4"), "gluetun-data-gluetun-4");
    }
}
