use regex::Regex;

/// Known technology names, each compiled to a whole-word, case-insensitive
/// pattern.
///
/// Boundaries are "not a letter, digit or underscore" rather than `\b`, so
/// names ending in punctuation (`C++`, `.NET`) still match.
pub struct Vocabulary {
    entries: Vec<(String, Regex)>,
}

impl Vocabulary {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut entries: Vec<(String, Regex)> = Vec::new();
        for name in names {
            let name = name.as_ref().trim();
            if name.is_empty() || entries.iter().any(|(n, _)| n == name) {
                continue;
            }
            let pattern = format!(
                r"(?i)(?:^|[^\p{{L}}\p{{N}}_]){}(?:$|[^\p{{L}}\p{{N}}_])",
                regex::escape(name)
            );
            // An escaped literal between fixed classes always compiles.
            if let Ok(re) = Regex::new(&pattern) {
                entries.push((name.to_string(), re));
            }
        }
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries occurring in `text` as whole words, in vocabulary order.
    pub fn find_in(&self, text: &str) -> Vec<String> {
        if text.is_empty() {
            return Vec::new();
        }
        self.entries
            .iter()
            .filter(|(_, re)| re.is_match(text))
            .map(|(name, _)| name.clone())
            .collect()
    }
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn go_not_inside_django() {
        let v = Vocabulary::new(["Go", "Django"]);
        assert_eq!(v.find_in("We use django and celery"), vec!["Django"]);
        assert_eq!(v.find_in("Backend in Go, some Django"), vec!["Go", "Django"]);
    }

    #[test]
    fn case_insensitive() {
        let v = Vocabulary::new(["PostgreSQL"]);
        assert_eq!(v.find_in("experience with POSTGRESQL"), vec!["PostgreSQL"]);
    }

    #[test]
    fn overlapping_entries_reported_independently() {
        let v = Vocabulary::new(["React", "React.js"]);
        assert_eq!(v.find_in("Frontend: React.js"), vec!["React", "React.js"]);
        assert_eq!(v.find_in("Frontend: React"), vec!["React"]);
    }

    #[test]
    fn punctuation_names() {
        let v = Vocabulary::new(["C++", "Node.js", "CI/CD"]);
        assert_eq!(
            v.find_in("C++ services, node.js tooling and CI/CD."),
            vec!["C++", "Node.js", "CI/CD"]
        );
        assert!(v.find_in("nodexjs").is_empty());
    }

    #[test]
    fn empty_inputs() {
        assert!(Vocabulary::new(Vec::<String>::new()).find_in("python").is_empty());
        assert!(Vocabulary::new(["Python"]).find_in("").is_empty());
        assert!(Vocabulary::new(["  ", ""]).is_empty());
    }

    #[test]
    fn hits_are_subset_and_whole_words() {
        let names = ["Python", "Go", "SQL", "AWS", "Docker", "Rust"];
        let v = Vocabulary::new(names);
        let texts = [
            "Python/SQL on AWS",
            "Trustworthy mongo dockerized",
            "Golang, NoSQL, python3",
            "rust; docker-compose",
        ];
        for text in texts {
            let lower = text.to_lowercase();
            for hit in v.find_in(text) {
                assert!(names.contains(&hit.as_str()));
                let needle = hit.to_lowercase();
                let whole = lower.match_indices(&needle).any(|(i, _)| {
                    let before = lower[..i].chars().next_back();
                    let after = lower[i + needle.len()..].chars().next();
                    let edge = |c: Option<char>| c.map_or(true, |c| !c.is_alphanumeric() && c != '_');
                    edge(before) && edge(after)
                });
                assert!(whole, "{hit} is not a whole word in {text:?}");
            }
        }
        assert!(v.find_in("Trustworthy mongo dockerized").is_empty());
        assert_eq!(v.find_in("rust; docker-compose"), vec!["Docker", "Rust"]);
    }
}
