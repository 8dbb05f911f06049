//! Placeholder substitution for strategy tokens

/// Ordered mapping from placeholder masks to literal values.
///
/// Substitution is a single left-to-right pass: at each position the first
/// mask in table order that matches is replaced, and the inserted text is
/// never scanned again.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubstitutionTable {
    entries: Vec<(String, String)>,
}

impl SubstitutionTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a mask. Empty masks are ignored.
    pub fn push(&mut self, mask: impl Into<String>, value: impl Into<String>) {
        let mask = mask.into();
        if !mask.is_empty() {
            self.entries.push((mask, value.into()));
        }
    }

    /// Builder-style [`push`](Self::push)
    pub fn with(mut self, mask: impl Into<String>, value: impl Into<String>) -> Self {
        self.push(mask, value);
        self
    }

    /// Number of masks
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table has no masks
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Replace every mask occurrence in `input`
    pub fn apply(&self, input: &str) -> String {
        if self.entries.is_empty() {
            return input.to_string();
        }

        let mut out = String::with_capacity(input.len());
        let mut rest = input;

        'scan: while let Some(c) = rest.chars().next() {
            for (mask, value) in &self.entries {
                if rest.starts_with(mask.as_str()) {
                    out.push_str(value);
                    rest = &rest[mask.len()..];
                    continue 'scan;
                }
            }
            out.push(c);
            rest = &rest[c.len_utf8()..];
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replaces_all_occurrences() {
        let table = SubstitutionTable::new().with("FAKESNI", "www.google.com");
        assert_eq!(
            table.apply("--fake-sni=FAKESNI&--sni=FAKESNI"),
            "--fake-sni=www.google.com&--sni=www.google.com"
        );
    }

    #[test]
    fn test_inserted_text_not_rescanned() {
        let table = SubstitutionTable::new().with("A", "B").with("B", "C");
        assert_eq!(table.apply("AB"), "BC");
    }

    #[test]
    fn test_first_mask_wins_at_same_position() {
        let table = SubstitutionTable::new().with("PAY", "short").with("PAYLOAD", "long");
        assert_eq!(table.apply("PAYLOAD"), "shortLOAD");

        let table = SubstitutionTable::new().with("PAYLOAD", "long").with("PAY", "short");
        assert_eq!(table.apply("PAYLOAD"), "long");
    }

    #[test]
    fn test_no_masks_is_identity() {
        let table = SubstitutionTable::new().with("", "ignored");
        assert!(table.is_empty());
        assert_eq!(table.apply("--wf-l3=ipv4"), "--wf-l3=ipv4");
    }

    #[test]
    fn test_non_ascii_passthrough() {
        let table = SubstitutionTable::new().with("X", "y");
        assert_eq!(table.apply("äXö"), "äyö");
    }
}
