//! Query planning for place-qualified searches such as `"castle in asia"`.
//!
//! The trailing place clause is split off, the remaining terms are ranked by
//! the index with some headroom, and candidates that do not mention the place
//! are dropped before truncating to the requested count.

use crate::index::{DocId, InvertedIndex, SearchHit};
use crate::Document;
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref PLACE_CLAUSE: Regex = Regex::new(r"(?i)(?:^|\s)in\s+([\p{L}\s-]+)$").expect("valid regex");
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ParsedQuery {
    pub term_query: Option<String>,
    pub place: Option<String>,
}

fn non_empty(s: &str) -> Option<String> {
    let s = s.trim();
    (!s.is_empty()).then(|| s.to_string())
}

impl ParsedQuery {
    pub fn parse(raw: &str) -> Self {
        let Some(caps) = PLACE_CLAUSE.captures(raw) else {
            return Self { term_query: non_empty(raw).map(|_| raw.to_string()), place: None };
        };
        let (Some(clause), Some(place)) = (caps.get(0), caps.get(1)) else {
            return Self { term_query: Some(raw.to_string()), place: None };
        };
        match non_empty(place.as_str()) {
            Some(place) => Self {
                term_query: non_empty(&raw[..clause.start()]),
                place: Some(place),
            },
            None => Self { term_query: non_empty(raw).map(|_| raw.to_string()), place: None },
        }
    }

    /// Text handed to the ranker: the terms, or the place when there are none.
    pub fn effective_query(&self) -> &str {
        self.term_query
            .as_deref()
            .or(self.place.as_deref())
            .unwrap_or("")
    }
}

/// Case-insensitive place test over a document's geographic and text fields.
pub fn matches_place(doc: &Document, place: &str) -> bool {
    let place = place.to_lowercase();
    if place.is_empty() {
        return true;
    }
    if let Some(continent) = doc.continent {
        let c = continent.as_str().to_lowercase();
        if c == place || c.contains(&place) || place.contains(&c) {
            return true;
        }
    }
    if let Some(country) = doc.country.as_deref() {
        if !country.is_empty() && country.to_lowercase().contains(&place) {
            return true;
        }
    }
    format!("{} {}", doc.name, doc.description)
        .to_lowercase()
        .contains(&place)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeoPlanner {
    /// Candidates fetched per requested result before place filtering.
    pub overfetch: usize,
    /// Keep doubling the candidate pool until `top_k` survive or the whole
    /// corpus has been ranked. Off by default: a single overfetched round.
    pub expand: bool,
}

impl Default for GeoPlanner {
    fn default() -> Self {
        Self { overfetch: 4, expand: false }
    }
}

impl GeoPlanner {
    pub fn search(&self, index: &InvertedIndex, raw_query: &str, top_k: usize) -> Vec<SearchHit> {
        let parsed = ParsedQuery::parse(raw_query);
        let query = parsed.effective_query();

        let Some(place) = parsed.place.as_deref() else {
            return index.search(query, top_k);
        };

        let mut limit = top_k.saturating_mul(self.overfetch).max(top_k);
        loop {
            let candidates = index.rank(query, limit);
            let exhausted = candidates.len() < limit || limit >= index.len();
            let survivors: Vec<(DocId, f32)> = candidates
                .into_iter()
                .filter(|(doc_id, _)| index.document(*doc_id).is_some_and(|d| matches_place(d, place)))
                .take(top_k)
                .collect();
            if survivors.len() >= top_k || !self.expand || exhausted {
                tracing::trace!(place, limit, survivors = survivors.len(), "geo filter applied");
                return survivors
                    .into_iter()
                    .filter_map(|(doc_id, score)| index.hit(doc_id, score))
                    .collect();
            }
            limit = limit.saturating_mul(2);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Continent;

    #[test]
    fn splits_trailing_place() {
        let q = ParsedQuery::parse("castle in Asia");
        assert_eq!(q.term_query.as_deref(), Some("castle"));
        assert_eq!(q.place.as_deref(), Some("Asia"));
    }

    #[test]
    fn hyphenated_and_multiword_places() {
        let q = ParsedQuery::parse("old town in Guinea-Bissau");
        assert_eq!(q.place.as_deref(), Some("Guinea-Bissau"));
        let q = ParsedQuery::parse("ruins IN south america ");
        assert_eq!(q.term_query.as_deref(), Some("ruins"));
        assert_eq!(q.place.as_deref(), Some("south america"));
    }

    #[test]
    fn place_only_query_falls_back_to_place() {
        let q = ParsedQuery::parse("in Peru");
        assert_eq!(q.term_query, None);
        assert_eq!(q.effective_query(), "Peru");
    }

    #[test]
    fn no_clause_leaves_query_untouched() {
        let q = ParsedQuery::parse("painting inside caves");
        assert_eq!(q.term_query.as_deref(), Some("painting inside caves"));
        assert_eq!(q.place, None);
        let q = ParsedQuery::parse("temples in 1990");
        assert_eq!(q.place, None);
    }

    #[test]
    fn place_matching_rules() {
        let asia = Document::new("1", "Fort", "").with_continent(Continent::Asia);
        assert!(matches_place(&asia, "ASIA"));
        assert!(matches_place(&asia, "southeast asia"));
        let peru = Document::new("2", "Machu Picchu", "").with_country("Peru");
        assert!(matches_place(&peru, "per"));
        let text = Document::new("3", "Old Town", "historic centre of Lima");
        assert!(matches_place(&text, "lima"));
        assert!(!matches_place(&text, "asia"));
    }
}
