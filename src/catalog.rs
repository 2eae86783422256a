//! # Catalog browse
//! Search, filters, score ordering and local pagination over a collection
//! snapshot. Everything here is pure and works on borrowed records.

use serde::Serialize;
use std::str::FromStr;
use unicode_normalization::UnicodeNormalization;

use crate::model::{Record, RecordId};

pub const CAREERS_PER_PAGE: usize = 6;
pub const UNIVERSITIES_PER_PAGE: usize = 5;
/// Careers above this score count as recommended.
pub const RECOMMENDED_MIN_SCORE: f64 = 60.0;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CareerFilter {
    All,
    /// Score above `RECOMMENDED_MIN_SCORE`, best first. Needs a profile.
    Recommended,
    /// Accent- and case-insensitive substring match on the area.
    Area(String),
}

impl FromStr for CareerFilter {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let t = s.trim();
        Ok(match fold(t).as_str() {
            "" | "todas" | "all" => CareerFilter::All,
            "ia" | "ai" | "recommended" => CareerFilter::Recommended,
            _ => CareerFilter::Area(t.to_string()),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniversityFilter {
    All,
    Public,
    Private,
}

impl FromStr for UniversityFilter {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match fold(s.trim()).as_str() {
            "" | "todas" | "all" => Ok(UniversityFilter::All),
            "publica" | "public" => Ok(UniversityFilter::Public),
            "privada" | "private" => Ok(UniversityFilter::Private),
            other => anyhow::bail!("unknown university filter: {other}"),
        }
    }
}

/// Lowercase and drop combining diacritics (U+0300..=U+036F) after NFD.
pub fn fold(s: &str) -> String {
    s.nfd()
        .filter(|c| !('\u{0300}'..='\u{036f}').contains(c))
        .collect::<String>()
        .to_lowercase()
}

pub fn matches_search(record: &Record, query: &str) -> bool {
    let q = query.trim().to_lowercase();
    q.is_empty() || record.name.to_lowercase().contains(&q)
}

pub fn filter_careers<'a>(
    records: &'a [Record],
    query: &str,
    filter: &CareerFilter,
) -> Vec<&'a Record> {
    let area = match filter {
        CareerFilter::Area(a) => fold(a),
        _ => String::new(),
    };

    let mut out: Vec<&Record> = records
        .iter()
        .filter(|r| matches_search(r, query))
        .filter(|r| match filter {
            CareerFilter::All => true,
            CareerFilter::Recommended => r.score_or_zero() > RECOMMENDED_MIN_SCORE,
            CareerFilter::Area(_) => fold(r.area.as_deref().unwrap_or_default()).contains(&area),
        })
        .collect();

    if *filter == CareerFilter::Recommended {
        // stable: equal scores keep snapshot order
        out.sort_by(|a, b| b.score_or_zero().total_cmp(&a.score_or_zero()));
    }
    out
}

pub fn filter_universities<'a>(
    records: &'a [Record],
    query: &str,
    filter: UniversityFilter,
) -> Vec<&'a Record> {
    records
        .iter()
        .filter(|r| matches_search(r, query))
        .filter(|r| {
            // type first; older rows only mention it in the description
            let kind = r
                .kind
                .as_deref()
                .filter(|k| !k.is_empty())
                .or(r.description.as_deref())
                .unwrap_or_default()
                .to_lowercase();
            match filter {
                UniversityFilter::All => true,
                UniversityFilter::Public => kind.contains("pública") || kind.contains("publica"),
                UniversityFilter::Private => kind.contains("privada"),
            }
        })
        .collect()
}

/// One page of a locally paginated list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageSlice<T> {
    pub items: Vec<T>,
    pub page: usize,
    pub per_page: usize,
    pub total: usize,
    pub total_pages: usize,
    pub has_prev: bool,
    pub has_next: bool,
}

/// 1-based slicing; a page past the end is empty.
pub fn paginate<T: Clone>(items: &[T], page: usize, per_page: usize) -> PageSlice<T> {
    let page = page.max(1);
    let per_page = per_page.max(1);
    let total = items.len();
    let total_pages = total.div_ceil(per_page);
    let start = (page - 1).saturating_mul(per_page);
    let end = start.saturating_add(per_page).min(total);
    let slice = items.get(start..end).unwrap_or_default();

    PageSlice {
        items: slice.to_vec(),
        page,
        per_page,
        total,
        total_pages,
        has_prev: page > 1,
        has_next: page < total_pages,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum BrowseOutcome {
    Page(PageSlice<Record>),
    /// The recommended filter was asked for before an AI profile exists.
    ProfileRequired,
}

pub fn browse_careers(
    records: &[Record],
    query: &str,
    filter: &CareerFilter,
    page: usize,
    profile_created: bool,
) -> BrowseOutcome {
    if *filter == CareerFilter::Recommended && !profile_created {
        return BrowseOutcome::ProfileRequired;
    }
    let hits = filter_careers(records, query, filter);
    BrowseOutcome::Page(owned(paginate(&hits, page, CAREERS_PER_PAGE)))
}

pub fn browse_universities(
    records: &[Record],
    query: &str,
    filter: UniversityFilter,
    page: usize,
) -> PageSlice<Record> {
    let hits = filter_universities(records, query, filter);
    owned(paginate(&hits, page, UNIVERSITIES_PER_PAGE))
}

fn owned(p: PageSlice<&Record>) -> PageSlice<Record> {
    PageSlice {
        items: p.items.into_iter().cloned().collect(),
        page: p.page,
        per_page: p.per_page,
        total: p.total,
        total_pages: p.total_pages,
        has_prev: p.has_prev,
        has_next: p.has_next,
    }
}

/// Detail lookup by the id's string form.
pub fn find_by_id<'a>(records: &'a [Record], id: &str) -> Option<&'a Record> {
    records.iter().find(|r| r.id.to_string() == id)
}

/// Built-in universities shown when the API yields nothing.
pub fn fallback_universities() -> Vec<Record> {
    let mut uce = Record::new(RecordId::Int(1), "Universidad Central del Ecuador");
    uce.kind = Some("Pública".into());
    uce.image = Some(
        "https://upload.wikimedia.org/wikipedia/commons/thumb/6/66/Escudo_de_la_Universidad_Central_del_Ecuador.svg/1200px-Escudo_de_la_Universidad_Central_del_Ecuador.svg.png"
            .into(),
    );
    uce.location = Some("Quito, Pichincha".into());
    uce.description = Some(
        "La universidad más antigua y grande del Ecuador, líder en investigación y ciencias sociales."
            .into(),
    );
    uce.match_score = Some(98.0);
    uce.url = Some("https://www.uce.edu.ec".into());
    vec![uce]
}
