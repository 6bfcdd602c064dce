/// Built-in fields of study offered when the user does not type their own.
pub const FIELDS: &[&str] = &[
    "Algebra",
    "Analysis",
    "Geometry",
    "Topology",
    "Number Theory",
    "Probability Theory",
    "Statistics",
    "Computer Science",
    "Machine Learning",
    "Physics",
    "Quantum Mechanics",
    "Chemistry",
    "Biology",
    "Neuroscience",
    "Economics",
    "Psychology",
    "Philosophy",
    "Linguistics",
    "History",
    "Music Theory",
];

/// Look up a preset by name, ignoring case and surrounding whitespace.
pub fn find(name: &str) -> Option<&'static str> {
    let name = name.trim();
    FIELDS
        .iter()
        .copied()
        .find(|field| field.eq_ignore_ascii_case(name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_is_case_insensitive() {
        assert_eq!(find("  number theory "), Some("Number Theory"));
        assert_eq!(find("Alchemy"), None);
    }

    #[test]
    fn test_presets_are_unique() {
        let mut fields = FIELDS.to_vec();
        fields.sort();
        fields.dedup();
        assert_eq!(fields.len(), FIELDS.len());
    }
}
