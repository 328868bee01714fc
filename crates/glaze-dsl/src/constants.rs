//! Style constants: named values substituted into style lines.

/// Ordered table of `$name` substitutions.
///
/// Later declarations shadow earlier ones, and longer names win over
/// shorter prefixes (`$accent2` is never clipped by `$accent`).
#[derive(Debug, Clone, Default)]
pub struct StyleConstants {
    /// Candidates in lookup order: longest name first, ties resolved in
    /// favor of the later declaration.
    entries: Vec<(String, String)>,
}

impl StyleConstants {
    /// Parses one `name=value` declaration. Returns `None` for disabled
    /// (`//`) lines and lines without `=`.
    pub fn parse_line(line: &str) -> Option<(String, String)> {
        let line = line.trim();
        if line.starts_with("//") {
            return None;
        }
        let eq = line.find('=')?;
        let name = line[..eq].trim().trim_start_matches('$').trim();
        if name.is_empty() {
            return None;
        }
        Some((name.to_string(), line[eq + 1..].trim().to_string()))
    }

    /// Builds the table from declarations in source order.
    pub fn from_lines<'a>(lines: impl IntoIterator<Item = &'a str>) -> StyleConstants {
        let mut entries: Vec<(String, String)> = lines
            .into_iter()
            .filter_map(StyleConstants::parse_line)
            .collect();
        // Reverse first so later declarations come out ahead of earlier
        // ones among equal-length names, then stable-sort by length.
        entries.reverse();
        entries.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
        StyleConstants { entries }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Substitutes `$name` references in a single pass. Replacement text
    /// is never re-scanned, and unknown references pass through.
    pub fn apply(&self, input: &str) -> String {
        if self.entries.is_empty() || !input.contains('$') {
            return input.to_string();
        }
        let mut out = String::with_capacity(input.len());
        let mut rest = input;
        while let Some(pos) = rest.find('$') {
            out.push_str(&rest[..pos]);
            let after = &rest[pos + 1..];
            match self.entries.iter().find(|(name, _)| after.starts_with(name.as_str())) {
                Some((name, value)) => {
                    out.push_str(value);
                    rest = &after[name.len()..];
                }
                None => {
                    out.push('$');
                    rest = after;
                }
            }
        }
        out.push_str(rest);
        out
    }
}
