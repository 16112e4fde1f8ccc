//! Uppercaser stage (spec §6): maps every alphabetic ASCII byte to its
//! uppercase form, leaves every other byte untouched. Grounded on
//! `original_source/plugins/uppercaser.c`'s `isalpha`/`toupper` loop.

fn transform(input: &str) -> Option<String> {
    Some(
        input
            .chars()
            .map(|c| if c.is_ascii_alphabetic() { c.to_ascii_uppercase() } else { c })
            .collect(),
    )
}

stage_abi::export_stage!("uppercaser", transform);

#[cfg(test)]
mod tests {
    use super::transform;

    #[test]
    fn lowercase_ascii_becomes_uppercase() {
        assert_eq!(transform("hello").unwrap(), "HELLO");
    }

    #[test]
    fn non_alphabetic_bytes_are_untouched() {
        assert_eq!(transform("h3llo, world!").unwrap(), "H3LLO, WORLD!");
    }

    #[test]
    fn already_uppercase_is_idempotent() {
        let once = transform("Shout").unwrap();
        let twice = transform(&once).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn empty_input_stays_empty() {
        assert_eq!(transform("").unwrap(), "");
    }
}
