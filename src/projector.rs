//! Filter/sort projection of a collection's records.
//!
//! Pure functions: the same records and [`ViewQuery`] always produce the same
//! visible list.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::models::{FieldValue, Record, ALL_CATEGORIES};
use crate::store::Direction;

/// Timestamp key compared chronologically rather than as text.
pub const CREATED_AT: &str = "createdAt";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortSpec {
    pub key: String,
    #[serde(default)]
    pub direction: Direction,
}

impl SortSpec {
    pub fn new(key: impl Into<String>, direction: Direction) -> Self {
        Self {
            key: key.into(),
            direction,
        }
    }

    /// Sort after the user selects `key`: the same key flips direction, a new
    /// key starts ascending.
    pub fn toggle(current: Option<&SortSpec>, key: &str) -> SortSpec {
        match current {
            Some(spec) if spec.key == key => SortSpec::new(key, spec.direction.flipped()),
            _ => SortSpec::new(key, Direction::Asc),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewQuery {
    #[serde(default)]
    pub search: String,
    /// `None` and `"All"` both disable the category filter.
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub sort: Option<SortSpec>,
}

impl ViewQuery {
    pub fn search(term: impl Into<String>) -> Self {
        Self {
            search: term.into(),
            ..Self::default()
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn sorted(mut self, sort: SortSpec) -> Self {
        self.sort = Some(sort);
        self
    }
}

pub fn matches_search<R: Record>(record: &R, term: &str) -> bool {
    let term = term.to_lowercase();
    if term.is_empty() {
        return true;
    }
    R::KIND
        .schema()
        .search_fields
        .iter()
        .any(|field| record.field(field).as_text().to_lowercase().contains(&term))
}

pub fn matches_category<R: Record>(record: &R, category: Option<&str>) -> bool {
    if !R::KIND.schema().has_category {
        return true;
    }
    match category.map(str::trim) {
        None | Some("") | Some(ALL_CATEGORIES) => true,
        Some(wanted) => record.category() == Some(wanted),
    }
}

/// Ascending comparison of two records on `key`.
///
/// Text compares case-insensitively with Latin diacritics folded onto their
/// base letter, so "Émile" sorts before "Zed". This is not full locale
/// collation: scripts outside Latin compare by code point.
pub fn compare_by<R: Record>(a: &R, b: &R, key: &str) -> Ordering {
    match (a.field(key), b.field(key)) {
        (FieldValue::Timestamp(x), FieldValue::Timestamp(y)) => x.cmp(&y),
        (x, y) if key == CREATED_AT => timestamp_of(&x).cmp(&timestamp_of(&y)),
        (x, y) => compare_text(&x.as_text(), &y.as_text()),
    }
}

fn compare_text(a: &str, b: &str) -> Ordering {
    let (a, b) = (a.to_lowercase(), b.to_lowercase());
    fold_diacritics(&a)
        .cmp(&fold_diacritics(&b))
        .then_with(|| a.cmp(&b))
}

fn fold_diacritics(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            'à'..='å' | 'ā' | 'ă' | 'ą' => out.push('a'),
            'æ' => out.push_str("ae"),
            'ç' | 'ć' | 'ĉ' | 'ċ' | 'č' => out.push('c'),
            'ď' | 'đ' => out.push('d'),
            'è'..='ë' | 'ē' | 'ĕ' | 'ė' | 'ę' | 'ě' => out.push('e'),
            'ĝ' | 'ğ' | 'ġ' | 'ģ' => out.push('g'),
            'ĥ' | 'ħ' => out.push('h'),
            'ì'..='ï' | 'ĩ' | 'ī' | 'ĭ' | 'į' | 'ı' => out.push('i'),
            'ĵ' => out.push('j'),
            'ķ' => out.push('k'),
            'ĺ' | 'ļ' | 'ľ' | 'ŀ' | 'ł' => out.push('l'),
            'ñ' | 'ń' | 'ņ' | 'ň' => out.push('n'),
            'ò'..='ö' | 'ø' | 'ō' | 'ŏ' | 'ő' => out.push('o'),
            'œ' => out.push_str("oe"),
            'ŕ' | 'ŗ' | 'ř' => out.push('r'),
            'ś' | 'ŝ' | 'ş' | 'š' => out.push('s'),
            'ß' => out.push_str("ss"),
            'ţ' | 'ť' | 'ŧ' => out.push('t'),
            'ù'..='ü' | 'ũ' | 'ū' | 'ŭ' | 'ů' | 'ű' | 'ų' => out.push('u'),
            'ŵ' => out.push('w'),
            'ý' | 'ÿ' | 'ŷ' => out.push('y'),
            'ź' | 'ż' | 'ž' => out.push('z'),
            other => out.push(other),
        }
    }
    out
}

fn timestamp_of(value: &FieldValue<'_>) -> Option<chrono::DateTime<chrono::Utc>> {
    match value {
        FieldValue::Timestamp(at) => *at,
        _ => None,
    }
}

/// Visible records for `view`, in input order unless a sort is given.
pub fn project<R: Record>(records: &[R], view: &ViewQuery) -> Vec<R> {
    let mut visible: Vec<R> = records
        .iter()
        .filter(|r| matches_search(*r, &view.search))
        .filter(|r| matches_category(*r, view.category.as_deref()))
        .cloned()
        .collect();

    if let Some(sort) = &view.sort {
        visible.sort_by(|a, b| sort.direction.apply(compare_by(a, b, &sort.key)));
    }
    visible
}
