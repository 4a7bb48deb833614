//! Joke table
//!
//! A static JSON object mapping a category to a list of jokes.

use rand::seq::{IteratorRandom, SliceRandom};
use std::collections::BTreeMap;
use std::path::Path;

/// Returned when no joke is available for the requested category
pub const FALLBACK_JOKE: &str = "Sorry, I don't have jokes of that kind.";

/// Category name that picks a random category
pub const RANDOM_CATEGORY: &str = "random";

#[derive(Debug, thiserror::Error)]
pub enum HumorError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid joke table: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Default)]
pub struct JokeBook {
    jokes: BTreeMap<String, Vec<String>>,
}

impl JokeBook {
    pub fn new(jokes: BTreeMap<String, Vec<String>>) -> Self {
        Self { jokes }
    }

    /// Load a joke table; a missing file yields an empty book.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, HumorError> {
        let path = path.as_ref();
        match std::fs::read_to_string(path) {
            Ok(text) => Self::from_json(&text),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!("Joke table {} not found; jokes disabled", path.display());
                Ok(Self::default())
            }
            Err(e) => Err(HumorError::Io {
                path: path.display().to_string(),
                source: e,
            }),
        }
    }

    pub fn from_json(text: &str) -> Result<Self, HumorError> {
        Ok(Self::new(serde_json::from_str(text)?))
    }

    pub fn categories(&self) -> Vec<String> {
        self.jokes.keys().cloned().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.jokes.values().all(|jokes| jokes.is_empty())
    }

    /// A random joke from `choice`, or from a random non-empty category when
    /// `choice` is "random". Falls back to [`FALLBACK_JOKE`].
    pub fn joke(&self, choice: &str) -> String {
        let mut rng = rand::thread_rng();

        let category = if choice == RANDOM_CATEGORY {
            self.jokes
                .iter()
                .filter(|(_, jokes)| !jokes.is_empty())
                .map(|(name, _)| name.as_str())
                .choose(&mut rng)
        } else {
            Some(choice)
        };

        category
            .and_then(|name| self.jokes.get(name))
            .and_then(|jokes| jokes.choose(&mut rng))
            .cloned()
            .unwrap_or_else(|| FALLBACK_JOKE.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn sample_book() -> JokeBook {
        JokeBook::from_json(
            r#"{
                "programming": ["There are 10 kinds of people.", "It works on my machine."],
                "puns": ["I used to be a banker, but I lost interest."],
                "empty": []
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_unknown_category_returns_fallback() {
        let book = sample_book();
        assert_eq!(book.joke("astronomy"), FALLBACK_JOKE);
        assert_eq!(book.joke("empty"), FALLBACK_JOKE);
    }

    #[test]
    fn test_named_category() {
        let book = sample_book();
        assert_eq!(book.joke("puns"), "I used to be a banker, but I lost interest.");
        let joke = book.joke("programming");
        assert!(joke == "There are 10 kinds of people." || joke == "It works on my machine.");
    }

    #[test]
    fn test_random_never_returns_fallback_when_non_empty() {
        let book = sample_book();
        for _ in 0..200 {
            assert_ne!(book.joke(RANDOM_CATEGORY), FALLBACK_JOKE);
        }
    }

    #[test]
    fn test_empty_book() {
        let book = JokeBook::default();
        assert!(book.is_empty());
        assert_eq!(book.joke(RANDOM_CATEGORY), FALLBACK_JOKE);
    }

    #[test]
    fn test_load_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let book = JokeBook::load(dir.path().join("nope.json")).unwrap();
        assert!(book.categories().is_empty());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"dad": ["I'm afraid for the calendar. Its days are numbered."]}}"#)
            .unwrap();

        let book = JokeBook::load(file.path()).unwrap();
        assert_eq!(book.categories(), vec!["dad".to_string()]);
        assert!(!book.is_empty());
    }

    #[test]
    fn test_load_invalid_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        assert!(matches!(
            JokeBook::load(file.path()),
            Err(HumorError::Parse(_))
        ));
    }
}
