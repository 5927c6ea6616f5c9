use log::debug;
use std::{cmp::Ordering, collections::BTreeSet, fmt};

use crate::*;

/// Single match returned by a [`Database`] query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QueryResult {
    pub id: EntryId,
    pub score: f64,
}

/// Matches of a query, best first.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct QueryResults(pub Vec<QueryResult>);

impl QueryResults {
    pub fn iter(&self) -> std::slice::Iter<'_, QueryResult> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<'a> IntoIterator for &'a QueryResults {
    type Item = &'a QueryResult;
    type IntoIter = std::slice::Iter<'a, QueryResult>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Image database: stores the BoW vector of every added descriptor set
/// and an inverted file from words to the entries containing them.
pub struct Database<'v, F: FeatureKind> {
    voc: &'v Vocabulary<F>,
    entries: Vec<BoW>,
    /// Word id to entries holding that word, in insertion order.
    inverted: Vec<Vec<EntryId>>,
}

impl<'v, F: FeatureKind> Database<'v, F> {
    pub fn new(voc: &'v Vocabulary<F>) -> Self {
        Self {
            voc,
            entries: Vec::new(),
            inverted: vec![Vec::new(); voc.num_words()],
        }
    }

    pub fn vocabulary(&self) -> &Vocabulary<F> {
        self.voc
    }

    /// Add a descriptor set. Its id is the number of entries added before it.
    pub fn add(&mut self, features: &[F::Descriptor]) -> BowResult<EntryId> {
        let bow = self.voc.transform(features)?;
        Ok(self.add_bow(bow))
    }

    /// Add an already transformed BoW vector.
    pub fn add_bow(&mut self, bow: BoW) -> EntryId {
        let id = self.entries.len();
        for &word in bow.keys() {
            if word >= self.inverted.len() {
                self.inverted.resize(word + 1, Vec::new());
            }
            self.inverted[word].push(id);
        }
        self.entries.push(bow);
        id
    }

    /// Query the database with a descriptor set.
    ///
    /// Returns at most `max_results` matches (all when zero), sorted by
    /// decreasing score and then by increasing id. Only entries sharing at
    /// least one word with the query are considered.
    pub fn query(&self, features: &[F::Descriptor], max_results: usize) -> BowResult<QueryResults> {
        let bow = self.voc.transform(features)?;
        Ok(self.query_bow(&bow, max_results))
    }

    pub fn query_bow(&self, bow: &BoW, max_results: usize) -> QueryResults {
        let candidates: BTreeSet<EntryId> = bow
            .keys()
            .filter_map(|&word| self.inverted.get(word))
            .flatten()
            .copied()
            .collect();
        debug!("query touches {} of {} entries", candidates.len(), self.entries.len());

        let mut results: Vec<QueryResult> = candidates
            .into_iter()
            .map(|id| QueryResult {
                id,
                score: self.voc.score(bow, &self.entries[id]),
            })
            .collect();
        results.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(Ordering::Equal)
                .then(a.id.cmp(&b.id))
        });
        if max_results > 0 {
            results.truncate(max_results);
        }
        QueryResults(results)
    }

    /// BoW vector stored for an entry.
    pub fn entry(&self, id: EntryId) -> Option<&BoW> {
        self.entries.get(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every entry, keeping the vocabulary.
    pub fn clear(&mut self) {
        self.entries.clear();
        for list in self.inverted.iter_mut() {
            list.clear();
        }
    }
}

impl fmt::Display for QueryResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<EntryId: {}, Score: {}>", self.id, self.score)
    }
}

impl fmt::Display for QueryResults {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.len() == 1 {
            write!(f, "1 result:")?;
        } else {
            write!(f, "{} results:", self.len())?;
        }
        for r in self.iter() {
            write!(f, "\n{}", r)?;
        }
        Ok(())
    }
}

impl<F: FeatureKind> fmt::Display for Database<'_, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Database: Entries = {}, Using direct index = no. {}",
            self.entries.len(),
            self.voc
        )
    }
}
