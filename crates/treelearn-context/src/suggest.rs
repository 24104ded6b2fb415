//! Topic suggestions for node expansion.
//!
//! Suggestions are best effort: the default strategy matches keywords in a
//! node's title and summary against a handful of subject categories and
//! falls back to generic study topics.

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Strategy that proposes child topics for a node.
pub trait TopicSuggester: Send + Sync {
    /// Ordered candidate child titles for a node with this title and text.
    fn suggest(&self, title: &str, text: &str) -> Vec<String>;
}

/// A subject area with trigger keywords and the topics it suggests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubjectCategory {
    pub name: String,
    /// Word stems; stems of four or more characters also match as prefixes
    pub keywords: Vec<String>,
    pub topics: Vec<String>,
}

impl SubjectCategory {
    pub fn new(name: &str, keywords: &[&str], topics: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
            topics: topics.iter().map(|t| t.to_string()).collect(),
        }
    }

    /// Number of words in `words` that hit one of this category's keywords.
    fn score(&self, words: &[String]) -> usize {
        words
            .iter()
            .filter(|word| self.keywords.iter().any(|k| keyword_matches(k, word)))
            .count()
    }
}

/// Keyword-matching suggester.
#[derive(Debug, Clone)]
pub struct KeywordSuggester {
    categories: Vec<SubjectCategory>,
    fallback: Vec<String>,
    max_topics: usize,
}

impl KeywordSuggester {
    /// Create a suggester with the built-in categories.
    pub fn new() -> Self {
        Self {
            categories: default_categories(),
            fallback: [
                "Fundamentals",
                "Key Concepts",
                "Practical Applications",
                "Common Misconceptions",
                "Advanced Topics",
            ]
            .iter()
            .map(|t| t.to_string())
            .collect(),
            max_topics: 5,
        }
    }

    /// Cap the number of suggestions.
    pub fn with_max_topics(mut self, max_topics: usize) -> Self {
        self.max_topics = max_topics;
        self
    }

    /// Replace the category table.
    pub fn with_categories(mut self, categories: Vec<SubjectCategory>) -> Self {
        self.categories = categories;
        self
    }

    /// Best matching category for the text, if any keyword hits.
    ///
    /// Ties go to the category declared first.
    pub fn classify(&self, text: &str) -> Option<&SubjectCategory> {
        let words = tokenize(text);
        let mut best: Option<(&SubjectCategory, usize)> = None;

        for category in &self.categories {
            let score = category.score(&words);
            if score > 0 && best.map_or(true, |(_, s)| score > s) {
                best = Some((category, score));
            }
        }

        best.map(|(category, _)| category)
    }
}

impl Default for KeywordSuggester {
    fn default() -> Self {
        Self::new()
    }
}

impl TopicSuggester for KeywordSuggester {
    fn suggest(&self, title: &str, text: &str) -> Vec<String> {
        let combined = format!("{} {}", title, text);
        let (source, topics) = match self.classify(&combined) {
            Some(category) => (category.name.as_str(), &category.topics),
            None => ("fallback", &self.fallback),
        };

        debug!(title = %title, category = source, "Topics suggested");
        topics.iter().take(self.max_topics).cloned().collect()
    }
}

fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(|w| w.to_lowercase())
        .collect()
}

fn keyword_matches(keyword: &str, word: &str) -> bool {
    word == keyword || (keyword.len() >= 4 && word.starts_with(keyword))
}

fn default_categories() -> Vec<SubjectCategory> {
    vec![
        SubjectCategory::new(
            "programming",
            &[
                "program", "code", "coding", "algorithm", "recurs", "function", "software",
                "comput", "variable", "loop", "compiler", "rust", "python", "javascript",
            ],
            &[
                "Core Concepts",
                "Syntax and Structure",
                "Common Patterns",
                "Debugging Techniques",
                "Performance Considerations",
            ],
        ),
        SubjectCategory::new(
            "mathematics",
            &[
                "math", "algebra", "calculus", "geometr", "equation", "theorem", "proof",
                "number", "statistic", "probabilit", "matrix", "integral", "derivative",
            ],
            &[
                "Definitions and Notation",
                "Key Theorems",
                "Worked Examples",
                "Proof Techniques",
                "Real-World Applications",
            ],
        ),
        SubjectCategory::new(
            "science",
            &[
                "physic", "chemi", "biolog", "cell", "atom", "molecule", "energy", "evolution",
                "quantum", "gene", "ecosystem", "gravity",
            ],
            &[
                "Underlying Principles",
                "Key Experiments",
                "Scientific Models",
                "Current Research",
                "Everyday Examples",
            ],
        ),
        SubjectCategory::new(
            "history",
            &[
                "histor", "war", "empire", "revolution", "ancient", "century", "civilization",
                "dynasty", "medieval",
            ],
            &[
                "Historical Context",
                "Key Figures",
                "Major Events",
                "Causes and Consequences",
                "Lasting Legacy",
            ],
        ),
        SubjectCategory::new(
            "language",
            &[
                "language", "grammar", "vocabular", "pronunciation", "verb", "noun",
                "linguistic", "writing", "literature", "poetry",
            ],
            &[
                "Grammar Basics",
                "Vocabulary",
                "Pronunciation",
                "Common Expressions",
                "Practice Exercises",
            ],
        ),
        SubjectCategory::new(
            "business",
            &[
                "business", "market", "econom", "finance", "invest", "startup", "management",
                "accounting", "trade", "money",
            ],
            &[
                "Core Principles",
                "Key Metrics",
                "Case Studies",
                "Strategies",
                "Risks and Pitfalls",
            ],
        ),
        SubjectCategory::new(
            "arts",
            &[
                "art", "music", "painting", "design", "film", "theater", "theatre", "sculpture",
                "photograph", "dance",
            ],
            &[
                "Techniques",
                "Influential Works",
                "Styles and Movements",
                "Tools and Materials",
                "Getting Started",
            ],
        ),
    ]
}
