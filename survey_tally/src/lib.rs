mod config;
pub mod export;
pub mod intake;
pub mod manual;
pub mod store;

use log::{debug, info};
use serde::Serialize;

use std::collections::{BTreeSet, HashMap, HashSet};

pub use crate::config::*;
pub use crate::export::{read_table, to_exportable_table, write_table, ExportError};
pub use crate::intake::{
    CommitError, DraftSession, Page, PageInput, Rejected, RespondentInfo, ValidationError,
};
pub use crate::store::{load_dataset, Dataset, MemoryStore, ResponseStore, StoreError};

/// The selector value that disables a filter.
pub const ALL: &str = "All";

/// An equality filter on one single-valued column.
#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub enum Selector {
    #[default]
    All,
    Only(String),
}

impl Selector {
    /// Reads a selector as offered by a picker: `All` matches every row.
    pub fn parse(s: &str) -> Selector {
        match s.trim() {
            ALL => Selector::All,
            x => Selector::Only(x.to_string()),
        }
    }

    pub fn matches(&self, value: &str) -> bool {
        match self {
            Selector::All => true,
            Selector::Only(x) => x == value,
        }
    }
}

/// The filters a dashboard viewer can combine. They are joined with a logical AND.
#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct ResponseFilter {
    pub org_type: Selector,
    pub org_size: Selector,
    /// Empty: no filtering on the location.
    pub locations: BTreeSet<String>,
}

impl ResponseFilter {
    pub fn matches(&self, row: &RespondentAnswer) -> bool {
        self.org_type.matches(&row.org_type)
            && self.org_size.matches(&row.org_size)
            && (self.locations.is_empty() || self.locations.contains(&row.location))
    }

    pub fn is_unfiltered(&self) -> bool {
        self.org_type == Selector::All && self.org_size == Selector::All && self.locations.is_empty()
    }
}

/// Keeps the rows accepted by the filter, in their original order.
pub fn apply_filters(rows: &[RespondentAnswer], filter: &ResponseFilter) -> Vec<RespondentAnswer> {
    let res: Vec<RespondentAnswer> = rows.iter().filter(|r| filter.matches(r)).cloned().collect();
    debug!(
        "apply_filters: kept {} of {} rows with {:?}",
        res.len(),
        rows.len(),
        filter
    );
    res
}

// Counts the labels and orders them by decreasing count. Equal counts keep the
// order in which the labels were first seen.
fn ordered_tally<'a, I: Iterator<Item = &'a str>>(labels: I) -> Vec<(String, u64)> {
    let mut positions: HashMap<&'a str, usize> = HashMap::new();
    let mut tally: Vec<(String, u64)> = Vec::new();
    for label in labels {
        let idx = *positions.entry(label).or_insert_with(|| {
            tally.push((label.to_string(), 0));
            tally.len() - 1
        });
        tally[idx].1 += 1;
    }
    // Stable sort: ties stay in first-seen order.
    tally.sort_by(|a, b| b.1.cmp(&a.1));
    tally
}

/// Counts every selected label of one question. A row that selected two options
/// counts once for each; a row without an answer counts for nothing.
pub fn tally_question(rows: &[RespondentAnswer], question: QuestionId) -> Vec<(String, u64)> {
    ordered_tally(
        rows.iter()
            .filter_map(|r| r.answers.get(question))
            .flat_map(|s| s.iter()),
    )
}

/// Counts the values of a single-valued column.
pub fn tally_category(rows: &[RespondentAnswer], field: CategoryField) -> Vec<(String, u64)> {
    ordered_tally(rows.iter().map(|r| field.value(r)))
}

/// The answers to one question over a set of rows.
#[derive(PartialEq, Debug, Clone, Serialize)]
pub struct QuestionSummary {
    pub question: QuestionId,
    pub heading: String,
    /// Rows that answered this question. Shares are relative to it.
    pub respondents: u64,
    pub tally: Vec<(String, u64)>,
}

impl QuestionSummary {
    pub fn share(&self, count: u64) -> f64 {
        if self.respondents == 0 {
            0.0
        } else {
            count as f64 / self.respondents as f64
        }
    }
}

pub fn summarize_question(rows: &[RespondentAnswer], question: &QuestionDefinition) -> QuestionSummary {
    QuestionSummary {
        question: question.id,
        heading: question.heading.clone(),
        respondents: rows
            .iter()
            .filter(|r| r.answers.get(question.id).is_some())
            .count() as u64,
        tally: tally_question(rows, question.id),
    }
}

/// The distinct values present in the data, sorted, to populate the pickers.
#[derive(Eq, PartialEq, Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterOptions {
    pub org_types: Vec<String>,
    pub org_sizes: Vec<String>,
    pub locations: Vec<String>,
}

pub fn filter_options(rows: &[RespondentAnswer]) -> FilterOptions {
    let distinct = |field: CategoryField| -> Vec<String> {
        rows.iter()
            .map(|r| field.value(r).to_string())
            .collect::<BTreeSet<String>>()
            .into_iter()
            .collect()
    };
    FilterOptions {
        org_types: distinct(CategoryField::OrgType),
        org_sizes: distinct(CategoryField::OrgSize),
        locations: distinct(CategoryField::Location),
    }
}

/// Everything a results dashboard displays for one set of filtered rows.
#[derive(PartialEq, Debug, Clone)]
pub struct Summary {
    pub total_responses: u64,
    pub distinct_organizations: u64,
    pub questions: Vec<QuestionSummary>,
    pub org_types: Vec<(String, u64)>,
    pub org_sizes: Vec<(String, u64)>,
    pub locations: Vec<(String, u64)>,
}

pub fn summarize(survey: &Survey, rows: &[RespondentAnswer]) -> Summary {
    info!("Summarizing {} responses", rows.len());
    let organizations: HashSet<&str> = rows.iter().map(|r| r.organization.as_str()).collect();
    let questions: Vec<QuestionSummary> = survey
        .questions()
        .iter()
        .map(|q| summarize_question(rows, q))
        .collect();
    for q in questions.iter() {
        debug!(
            "summarize: {} ({} respondents): {:?}",
            q.question, q.respondents, q.tally
        );
    }
    Summary {
        total_responses: rows.len() as u64,
        distinct_organizations: organizations.len() as u64,
        questions,
        org_types: tally_category(rows, CategoryField::OrgType),
        org_sizes: tally_category(rows, CategoryField::OrgSize),
        locations: tally_category(rows, CategoryField::Location),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use proptest::prelude::*;

    fn row(id: ResponseId, org_type: &str, location: &str, q1: Option<&str>) -> RespondentAnswer {
        RespondentAnswer {
            id,
            name: format!("respondent {}", id),
            organization: format!("org {}", id % 2),
            org_size: "<50".to_string(),
            org_type: org_type.to_string(),
            location: location.to_string(),
            answers: Answers::decode([q1, Some("A"), Some("B"), Some("C"), None]),
            submitted_at: NaiveDate::from_ymd_opt(2024, 1, 1)
                .unwrap()
                .and_hms_opt(12, 0, 0)
                .unwrap(),
        }
    }

    fn ids(rows: &[RespondentAnswer]) -> Vec<ResponseId> {
        rows.iter().map(|r| r.id).collect()
    }

    #[test]
    fn tally_by_decreasing_count() {
        let rows = vec![
            row(1, "IT", "Pune", Some("X||Y")),
            row(2, "IT", "Pune", Some("X || Y")),
            row(3, "IT", "Pune", Some("Y")),
        ];
        assert_eq!(
            tally_question(&rows, QuestionId::Q1),
            vec![("Y".to_string(), 3), ("X".to_string(), 2)]
        );
        assert_eq!(
            tally_question(&rows[1..], QuestionId::Q1),
            vec![("Y".to_string(), 2), ("X".to_string(), 1)]
        );
    }

    #[test]
    fn ties_keep_first_seen_order() {
        let rows = vec![
            row(1, "IT", "Pune", Some("B||A")),
            row(2, "IT", "Pune", Some("C")),
        ];
        assert_eq!(
            tally_question(&rows, QuestionId::Q1),
            vec![
                ("B".to_string(), 1),
                ("A".to_string(), 1),
                ("C".to_string(), 1)
            ]
        );
    }

    #[test]
    fn missing_answers_count_for_nothing() {
        let rows = vec![
            row(1, "IT", "Pune", None),
            row(2, "IT", "Pune", Some("X")),
            row(3, "IT", "Pune", Some("")),
        ];
        let q = Survey::voice_of_industry().question(QuestionId::Q1).clone();
        let s = summarize_question(&rows, &q);
        assert_eq!(s.respondents, 1);
        assert_eq!(s.tally, vec![("X".to_string(), 1)]);
        assert_eq!(s.share(1), 1.0);
        assert!(tally_question(&rows, QuestionId::Q5).is_empty());
    }

    #[test]
    fn filter_all_and_exact() {
        let rows = vec![
            row(1, "IT", "Pune", Some("X")),
            row(2, "Health", "Pune", Some("X")),
            row(3, "IT", "Delhi", Some("X")),
        ];
        let all = ResponseFilter {
            org_type: Selector::parse("All"),
            ..ResponseFilter::default()
        };
        assert!(all.is_unfiltered());
        assert_eq!(apply_filters(&rows, &all), rows);

        let it = ResponseFilter {
            org_type: Selector::parse("IT"),
            ..ResponseFilter::default()
        };
        assert_eq!(ids(&apply_filters(&rows, &it)), vec![1, 3]);

        let it_pune = ResponseFilter {
            locations: ["Pune".to_string()].into_iter().collect(),
            ..it
        };
        assert_eq!(ids(&apply_filters(&rows, &it_pune)), vec![1]);

        let nobody = ResponseFilter {
            org_size: Selector::Only("250+".to_string()),
            ..ResponseFilter::default()
        };
        assert!(apply_filters(&rows, &nobody).is_empty());
    }

    #[test]
    fn category_counts_and_options() {
        let rows = vec![
            row(1, "IT", "Pune", Some("X")),
            row(2, "Health", "Goa", Some("X")),
            row(3, "IT", "Delhi", Some("X")),
        ];
        assert_eq!(
            tally_category(&rows, CategoryField::OrgType),
            vec![("IT".to_string(), 2), ("Health".to_string(), 1)]
        );
        let opts = filter_options(&rows);
        assert_eq!(opts.locations, vec!["Delhi", "Goa", "Pune"]);
        assert_eq!(opts.org_types, vec!["Health", "IT"]);
        assert_eq!(opts.org_sizes, vec!["<50"]);
    }

    #[test]
    fn dashboard_summary() {
        let _ = env_logger::builder().is_test(true).try_init();
        let survey = Survey::voice_of_industry();
        let rows = vec![
            row(1, "IT", "Pune", Some("X||Y")),
            row(2, "Health", "Goa", None),
            row(3, "IT", "Delhi", Some("Y")),
        ];
        let s = summarize(&survey, &rows);
        assert_eq!(s.total_responses, 3);
        assert_eq!(s.distinct_organizations, 2);
        assert_eq!(s.questions.len(), 5);
        assert_eq!(s.questions[0].respondents, 2);
        assert_eq!(s.questions[0].share(1), 0.5);
        assert_eq!(s.questions[4].respondents, 0);
        assert_eq!(s.questions[4].share(0), 0.0);
        assert_eq!(s.locations.len(), 3);
    }

    const TYPES: [&str; 3] = ["IT", "Health", "Retail"];
    const PLACES: [&str; 3] = ["Pune", "Delhi", "Goa"];
    const LABELS: [&str; 3] = ["X", "Y", "Z"];

    fn arb_rows() -> impl Strategy<Value = Vec<RespondentAnswer>> {
        proptest::collection::vec(
            (0..3usize, 0..3usize, proptest::collection::vec(0..3usize, 0..4)),
            0..30,
        )
        .prop_map(|specs| {
            specs
                .into_iter()
                .enumerate()
                .map(|(idx, (t, l, picks))| {
                    let q1: Vec<&str> = picks.iter().map(|p| LABELS[*p]).collect();
                    let q1 = q1.join(ANSWER_DELIMITER);
                    row(idx as ResponseId, TYPES[t], PLACES[l], Some(q1.as_str()))
                })
                .collect()
        })
    }

    fn arb_filter() -> impl Strategy<Value = ResponseFilter> {
        (
            proptest::option::of(0..3usize),
            proptest::collection::btree_set(0..3usize, 0..3),
        )
            .prop_map(|(t, places)| ResponseFilter {
                org_type: t.map(|t| Selector::Only(TYPES[t].to_string())).unwrap_or_default(),
                org_size: Selector::All,
                locations: places.iter().map(|p| PLACES[*p].to_string()).collect(),
            })
    }

    proptest! {
        #[test]
        fn filtered_rows_are_an_ordered_subset(rows in arb_rows(), filter in arb_filter()) {
            let kept = apply_filters(&rows, &filter);
            prop_assert!(kept.iter().all(|r| filter.matches(r)));
            // Ids are increasing in the input, so an ordered subset has increasing ids.
            let kept_ids = ids(&kept);
            prop_assert!(kept_ids.windows(2).all(|w| w[0] < w[1]));
            prop_assert!(kept.iter().all(|r| rows.contains(r)));
            prop_assert_eq!(
                kept.len(),
                rows.iter().filter(|r| filter.matches(r)).count()
            );
            prop_assert_eq!(apply_filters(&kept, &filter), kept);
        }

        #[test]
        fn tally_accounts_for_every_token(rows in arb_rows()) {
            let tally = tally_question(&rows, QuestionId::Q1);
            let total: u64 = tally.iter().map(|(_, c)| c).sum();
            let tokens: usize = rows
                .iter()
                .filter_map(|r| r.answers.get(QuestionId::Q1))
                .map(|s| s.len())
                .sum();
            prop_assert_eq!(total, tokens as u64);
            prop_assert!(tally.windows(2).all(|w| w[0].1 >= w[1].1));
        }
    }
}
