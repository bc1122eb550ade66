use regex::Regex;
use tracing::warn;

#[derive(Debug, Clone)]
enum Matcher {
    Regex(Regex),
    Literal(String),
}

/// A whitelist or blacklist.
///
/// Entries are unanchored regexes. An entry that does not compile is
/// matched as a literal substring instead.
#[derive(Debug, Clone, Default)]
pub struct PatternSet {
    entries: Vec<(String, Matcher)>,
}

impl PatternSet {
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let entries = patterns
            .into_iter()
            .map(|p| p.as_ref().trim().to_string())
            .filter(|p| !p.is_empty())
            .map(|p| {
                let matcher = match Regex::new(&p) {
                    Ok(re) => Matcher::Regex(re),
                    Err(e) => {
                        warn!("Pattern `{p}` is not a valid regex ({e}); matching it literally");
                        Matcher::Literal(p.clone())
                    }
                };
                (p, matcher)
            })
            .collect();
        Self { entries }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn patterns(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(p, _)| p.as_str())
    }

    /// The first entry matching `command`, as written in config.
    pub fn find_match(&self, command: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(_, matcher)| match matcher {
                Matcher::Regex(re) => re.is_match(command),
                Matcher::Literal(s) => command.contains(s.as_str()),
            })
            .map(|(p, _)| p.as_str())
    }

    pub fn matches(&self, command: &str) -> bool {
        self.find_match(command).is_some()
    }
}
