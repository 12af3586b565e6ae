//! Read-only word source: prompts and the answers each one accepts
//!
//! Loaded once at startup and shared by every room behind an `Arc`.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::path::Path;

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::WordSourceError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    /// Fewer accepted answers make a prompt harder.
    pub fn for_answer_count(count: usize) -> Self {
        if count < 5 {
            Difficulty::Hard
        } else if count < 15 {
            Difficulty::Medium
        } else {
            Difficulty::Easy
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "easy" => Some(Difficulty::Easy),
            "medium" => Some(Difficulty::Medium),
            "hard" => Some(Difficulty::Hard),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Prompt {
    pub criteria: String,
    pub answers: BTreeSet<String>,
    pub difficulty: Difficulty,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WordSourceStats {
    pub total: usize,
    pub easy: usize,
    pub medium: usize,
    pub hard: usize,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Answers {
    Many(Vec<String>),
    One(String),
}

#[derive(Debug)]
pub struct WordSource {
    prompts: Vec<Prompt>,
    by_criteria: HashMap<String, usize>,
}

/// Lower-cased and trimmed, the form every comparison uses.
pub fn normalize_word(word: &str) -> String {
    word.trim().to_lowercase()
}

impl WordSource {
    /// Load `{ "<criteria>": ["answer", ...] }` from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, WordSourceError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        let source = Self::from_json(&raw)?;
        let stats = source.stats();
        info!(
            "Loaded {} prompts from {} ({} easy, {} medium, {} hard)",
            stats.total,
            path.display(),
            stats.easy,
            stats.medium,
            stats.hard
        );
        Ok(source)
    }

    pub fn from_json(raw: &str) -> Result<Self, WordSourceError> {
        let parsed: BTreeMap<String, Answers> = serde_json::from_str(raw)?;
        Self::from_entries(parsed.into_iter().map(|(criteria, answers)| {
            let answers = match answers {
                Answers::Many(list) => list,
                Answers::One(single) => vec![single],
            };
            (criteria, answers)
        }))
    }

    pub fn from_entries<I, C, A, W>(entries: I) -> Result<Self, WordSourceError>
    where
        I: IntoIterator<Item = (C, A)>,
        C: Into<String>,
        A: IntoIterator<Item = W>,
        W: AsRef<str>,
    {
        let mut prompts = Vec::new();
        let mut by_criteria = HashMap::new();

        for (criteria, answers) in entries {
            let criteria = criteria.into();
            let answers: BTreeSet<String> = answers
                .into_iter()
                .map(|a| normalize_word(a.as_ref()))
                .filter(|a| !a.is_empty())
                .collect();
            if answers.is_empty() || by_criteria.contains_key(&criteria) {
                continue;
            }
            by_criteria.insert(criteria.clone(), prompts.len());
            prompts.push(Prompt {
                difficulty: Difficulty::for_answer_count(answers.len()),
                criteria,
                answers,
            });
        }

        if prompts.is_empty() {
            return Err(WordSourceError::Empty);
        }

        Ok(Self {
            prompts,
            by_criteria,
        })
    }

    pub fn len(&self) -> usize {
        self.prompts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prompts.is_empty()
    }

    pub fn prompt(&self, criteria: &str) -> Option<&Prompt> {
        self.by_criteria.get(criteria).map(|&i| &self.prompts[i])
    }

    /// Pick a prompt the room has not seen yet, falling back to repeats once
    /// the pool for the requested difficulty runs dry.
    pub fn pick_prompt<R: Rng + ?Sized>(
        &self,
        used: &HashSet<String>,
        difficulty: Option<Difficulty>,
        rng: &mut R,
    ) -> &Prompt {
        let matches = |p: &&Prompt| difficulty.map_or(true, |d| p.difficulty == d);

        let unused: Vec<&Prompt> = self
            .prompts
            .iter()
            .filter(matches)
            .filter(|p| !used.contains(&p.criteria))
            .collect();
        if let Some(&prompt) = unused.choose(rng) {
            return prompt;
        }

        let same_difficulty: Vec<&Prompt> = self.prompts.iter().filter(matches).collect();
        if let Some(&prompt) = same_difficulty.choose(rng) {
            return prompt;
        }

        // `from_entries` refuses an empty source
        &self.prompts[rng.gen_range(0..self.prompts.len())]
    }

    pub fn accepts(&self, criteria: &str, word: &str) -> bool {
        self.prompt(criteria)
            .is_some_and(|p| p.answers.contains(&normalize_word(word)))
    }

    pub fn sample_answers(&self, criteria: &str, n: usize) -> Vec<String> {
        self.prompt(criteria)
            .map(|p| p.answers.iter().take(n).cloned().collect())
            .unwrap_or_default()
    }

    pub fn stats(&self) -> WordSourceStats {
        let count = |d| self.prompts.iter().filter(|p| p.difficulty == d).count();
        WordSourceStats {
            total: self.prompts.len(),
            easy: count(Difficulty::Easy),
            medium: count(Difficulty::Medium),
            hard: count(Difficulty::Hard),
        }
    }
}
