//! The page-by-page intake of one respondent.
//!
//! A [`DraftSession`] is an owned value: every transition consumes it and hands
//! back the next session, or the unchanged session together with the reason for
//! staying on the current page.
//!
//! ```
//! use survey_tally::intake::{DraftSession, Page, PageInput, RespondentInfo};
//! use survey_tally::{MemoryStore, QuestionId, ResponseStore, Survey};
//!
//! let survey = Survey::voice_of_industry();
//! let info = RespondentInfo {
//!     name: "Asha".to_string(),
//!     organization: "Acme".to_string(),
//!     org_size: "<50".to_string(),
//!     org_type: "Others".to_string(),
//!     location: "Pune".to_string(),
//! };
//! let mut session = DraftSession::new()
//!     .advance(&survey, PageInput::Info(info))
//!     .map_err(|r| r.error)?;
//! for qid in QuestionId::ALL {
//!     let first = survey.question(qid).options[0].clone();
//!     session = session
//!         .advance(&survey, PageInput::Selection(vec![first]))
//!         .map_err(|r| r.error)?;
//! }
//! assert_eq!(session.page(), Page::Done);
//!
//! let mut store = MemoryStore::new();
//! let row = session.commit(&mut store).unwrap();
//! assert_eq!(store.load_all().unwrap(), vec![row]);
//! # Ok::<(), survey_tally::intake::ValidationError>(())
//! ```

use std::fmt::Display;

use log::{debug, info, warn};
use snafu::{prelude::*, Snafu};

use crate::config::*;
use crate::store::{ResponseStore, StoreError};

/// The pages of the survey, in the only order they can be visited.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash)]
pub enum Page {
    Info,
    Question(QuestionId),
    Done,
}

impl Page {
    pub fn name(&self) -> &'static str {
        match self {
            Page::Info => "info",
            Page::Question(qid) => qid.as_str(),
            Page::Done => "done",
        }
    }
}

impl Display for Page {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Respondent metadata, as entered on the first page.
#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct RespondentInfo {
    pub name: String,
    pub organization: String,
    pub org_size: String,
    pub org_type: String,
    pub location: String,
}

/// The raw values submitted for the current page.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum PageInput {
    Info(RespondentInfo),
    Selection(Vec<String>),
}

impl PageInput {
    fn kind(&self) -> &'static str {
        match self {
            PageInput::Info(_) => "respondent information",
            PageInput::Selection(_) => "a selection of options",
        }
    }
}

/// Reasons to keep the respondent on the current page. The messages are meant to
/// be shown as is.
#[derive(Eq, PartialEq, Debug, Clone, Snafu)]
pub enum ValidationError {
    #[snafu(display("Please fill all required fields! Missing: {}", missing.join(", ")))]
    MissingFields { missing: Vec<&'static str> },
    #[snafu(display("{value:?} is not a valid organization size"))]
    UnknownOrgSize { value: String },
    #[snafu(display("{value:?} is not a valid type of organization"))]
    UnknownOrgType { value: String },
    #[snafu(display("Please select at least one option."))]
    NoSelection { question: QuestionId },
    #[snafu(display("{label:?} is not an option of question {question}"))]
    UnknownOption { question: QuestionId, label: String },
    #[snafu(display("Page {page} does not accept {received}"))]
    UnexpectedInput { page: Page, received: &'static str },
    #[snafu(display("This survey has already been completed"))]
    AlreadyComplete {},
}

#[derive(Debug, Snafu)]
pub enum CommitError {
    #[snafu(display("The survey is not complete yet (current page: {page})"))]
    NotComplete { page: Page },
    #[snafu(display("Error saving response: {source}"))]
    Saving { source: StoreError },
}

/// A transition that did not happen. The session is returned untouched.
#[derive(Debug)]
pub struct Rejected {
    pub session: DraftSession,
    pub error: ValidationError,
}

/// The state of one respondent that has not been stored yet.
///
/// A session cannot be copied: the value that was committed is the only one that
/// knows about the stored row.
///
/// ```compile_fail
/// use survey_tally::DraftSession;
///
/// let session = DraftSession::new();
/// let copy = session.clone();
/// ```
#[derive(Eq, PartialEq, Debug)]
pub struct DraftSession {
    page: Page,
    info: Option<RespondentInfo>,
    answers: Answers,
    // The stored row, once the commit succeeded. Checked before any insert.
    committed: Option<RespondentAnswer>,
}

impl Default for DraftSession {
    fn default() -> Self {
        DraftSession::new()
    }
}

impl DraftSession {
    pub fn new() -> DraftSession {
        DraftSession {
            page: Page::Info,
            info: None,
            answers: Answers::default(),
            committed: None,
        }
    }

    pub fn page(&self) -> Page {
        self.page
    }

    pub fn info(&self) -> Option<&RespondentInfo> {
        self.info.as_ref()
    }

    pub fn answers(&self) -> &Answers {
        &self.answers
    }

    /// The stored response, if the commit already happened.
    pub fn committed(&self) -> Option<&RespondentAnswer> {
        self.committed.as_ref()
    }

    /// Validates the input of the current page and moves to the next page.
    pub fn advance(mut self, survey: &Survey, input: PageInput) -> Result<DraftSession, Rejected> {
        let outcome: Result<Page, ValidationError> = match (self.page, input) {
            (Page::Info, PageInput::Info(info)) => check_info(survey, info).map(|info| {
                self.info = Some(info);
                Page::Question(QuestionId::Q1)
            }),
            (Page::Question(qid), PageInput::Selection(labels)) => {
                check_selection(survey.question(qid), &labels).map(|selection| {
                    self.answers.set(qid, selection);
                    qid.next().map(Page::Question).unwrap_or(Page::Done)
                })
            }
            (Page::Done, _) => Err(ValidationError::AlreadyComplete {}),
            (page, input) => Err(ValidationError::UnexpectedInput {
                page,
                received: input.kind(),
            }),
        };
        match outcome {
            Ok(next) => {
                debug!("advance: {} -> {}", self.page, next);
                self.page = next;
                Ok(self)
            }
            Err(error) => {
                debug!("advance: staying on {}: {}", self.page, error);
                Err(Rejected {
                    session: self,
                    error,
                })
            }
        }
    }

    /// Stores the completed response.
    ///
    /// At most one row is ever written per session: once the insert succeeded,
    /// further calls return the stored row without reaching the store. A failed
    /// insert leaves the session on the last page so that the commit can be
    /// retried.
    pub fn commit<S: ResponseStore + ?Sized>(
        &mut self,
        store: &mut S,
    ) -> Result<RespondentAnswer, CommitError> {
        if let Some(row) = &self.committed {
            info!("commit: response already stored with id {}", row.id);
            return Ok(row.clone());
        }
        let response = self.to_new_response().context(NotCompleteSnafu { page: self.page })?;
        match store.insert(&response) {
            Ok(row) => {
                info!("commit: stored response {} from {:?}", row.id, row.organization);
                self.committed = Some(row.clone());
                Ok(row)
            }
            Err(source) => {
                warn!("commit: failed to store the response: {}", source);
                Err(CommitError::Saving { source })
            }
        }
    }

    fn to_new_response(&self) -> Option<NewResponse> {
        if self.page != Page::Done || !self.answers.is_complete() {
            return None;
        }
        let info = self.info.as_ref()?;
        Some(NewResponse {
            name: info.name.clone(),
            organization: info.organization.clone(),
            org_size: info.org_size.clone(),
            org_type: info.org_type.clone(),
            location: info.location.clone(),
            answers: self.answers.clone(),
        })
    }
}

fn check_info(survey: &Survey, info: RespondentInfo) -> Result<RespondentInfo, ValidationError> {
    let info = RespondentInfo {
        name: info.name.trim().to_string(),
        organization: info.organization.trim().to_string(),
        org_size: info.org_size.trim().to_string(),
        org_type: info.org_type.trim().to_string(),
        location: info.location.trim().to_string(),
    };

    let missing: Vec<&'static str> = [
        ("name", &info.name),
        ("organization", &info.organization),
        ("location", &info.location),
    ]
    .iter()
    .filter(|(_, v)| v.is_empty())
    .map(|(field, _)| *field)
    .collect();
    ensure!(missing.is_empty(), MissingFieldsSnafu { missing });

    ensure!(
        survey.org_sizes().contains(&info.org_size),
        UnknownOrgSizeSnafu {
            value: info.org_size.clone()
        }
    );
    if let OrgTypePolicy::OneOf(types) = survey.org_types() {
        ensure!(
            types.contains(&info.org_type),
            UnknownOrgTypeSnafu {
                value: info.org_type.clone()
            }
        );
    }
    Ok(info)
}

fn check_selection(
    question: &QuestionDefinition,
    labels: &[String],
) -> Result<SelectionSet, ValidationError> {
    let selection = SelectionSet::new(labels);
    ensure!(
        !selection.is_empty(),
        NoSelectionSnafu {
            question: question.id
        }
    );
    if let Some(label) = selection.iter().find(|l| !question.has_option(l)) {
        return UnknownOptionSnafu {
            question: question.id,
            label,
        }
        .fail();
    }
    Ok(selection)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn info(name: &str, organization: &str, location: &str) -> RespondentInfo {
        RespondentInfo {
            name: name.to_string(),
            organization: organization.to_string(),
            org_size: "51-100".to_string(),
            org_type: "Information Technology (IT & Software)".to_string(),
            location: location.to_string(),
        }
    }

    fn select(labels: &[&str]) -> PageInput {
        PageInput::Selection(labels.iter().map(|s| s.to_string()).collect())
    }

    fn completed(survey: &Survey) -> DraftSession {
        let mut session = DraftSession::new()
            .advance(survey, PageInput::Info(info("A", "B", "C")))
            .unwrap();
        for qid in QuestionId::ALL {
            let q = survey.question(qid);
            session = session
                .advance(survey, select(&[q.options[0].as_str(), q.options[1].as_str()]))
                .unwrap();
        }
        session
    }

    /// A store that refuses every operation.
    struct BrokenStore {}

    impl ResponseStore for BrokenStore {
        fn insert(&mut self, _response: &NewResponse) -> Result<RespondentAnswer, StoreError> {
            Err(StoreError::Unavailable {
                operation: "insert",
                source: "connection refused".into(),
            })
        }

        fn load_all(&self) -> Result<Vec<RespondentAnswer>, StoreError> {
            Err(StoreError::Unavailable {
                operation: "select",
                source: "connection refused".into(),
            })
        }
    }

    #[test]
    fn info_then_first_question() {
        let _ = env_logger::builder().is_test(true).try_init();
        let survey = Survey::voice_of_industry();

        let session = DraftSession::new()
            .advance(&survey, PageInput::Info(info("A", "B", "C")))
            .unwrap();
        assert_eq!(session.page(), Page::Question(QuestionId::Q1));

        let rejected = session.advance(&survey, select(&[])).unwrap_err();
        assert_eq!(
            rejected.error,
            ValidationError::NoSelection {
                question: QuestionId::Q1
            }
        );
        assert_eq!(rejected.session.page(), Page::Question(QuestionId::Q1));

        let session = rejected
            .session
            .advance(&survey, select(&["Weak problem-solving ability"]))
            .unwrap();
        assert_eq!(session.page(), Page::Question(QuestionId::Q2));
        assert_eq!(
            session.answers().encoded(QuestionId::Q1),
            Some("Weak problem-solving ability".to_string())
        );
    }

    #[test]
    fn missing_fields_are_named() {
        let survey = Survey::voice_of_industry();
        let rejected = DraftSession::new()
            .advance(&survey, PageInput::Info(info("  ", "B", "")))
            .unwrap_err();
        assert_eq!(
            rejected.error,
            ValidationError::MissingFields {
                missing: vec!["name", "location"]
            }
        );
        assert_eq!(
            rejected.error.to_string(),
            "Please fill all required fields! Missing: name, location"
        );
        assert_eq!(rejected.session, DraftSession::new());
    }

    #[test]
    fn info_checks_categories() {
        let survey = Survey::voice_of_industry();
        let mut i = info("A", "B", "C");
        i.org_size = "10-20".to_string();
        let rejected = DraftSession::new()
            .advance(&survey, PageInput::Info(i))
            .unwrap_err();
        assert!(matches!(rejected.error, ValidationError::UnknownOrgSize { .. }));

        let mut i = info("A", "B", "C");
        i.org_type = "Space mining".to_string();
        let rejected = DraftSession::new()
            .advance(&survey, PageInput::Info(i.clone()))
            .unwrap_err();
        assert!(matches!(rejected.error, ValidationError::UnknownOrgType { .. }));

        // Free text deployments accept any organization type.
        let free = Survey::new(
            "free",
            survey.org_sizes().to_vec(),
            OrgTypePolicy::FreeText,
            survey.questions().to_vec(),
        )
        .unwrap();
        let session = DraftSession::new()
            .advance(&free, PageInput::Info(i))
            .unwrap();
        assert_eq!(session.info().unwrap().org_type, "Space mining");
    }

    #[test]
    fn selections_must_come_from_the_question() {
        let survey = Survey::voice_of_industry();
        let session = DraftSession::new()
            .advance(&survey, PageInput::Info(info("A", "B", "C")))
            .unwrap();
        let rejected = session
            .advance(&survey, select(&["Weak problem-solving ability", "Astrology"]))
            .unwrap_err();
        assert_eq!(
            rejected.error,
            ValidationError::UnknownOption {
                question: QuestionId::Q1,
                label: "Astrology".to_string()
            }
        );
    }

    #[test]
    fn input_must_match_the_page() {
        let survey = Survey::voice_of_industry();
        let rejected = DraftSession::new()
            .advance(&survey, select(&["Weak problem-solving ability"]))
            .unwrap_err();
        assert!(matches!(
            rejected.error,
            ValidationError::UnexpectedInput {
                page: Page::Info,
                ..
            }
        ));

        let session = completed(&survey);
        let rejected = session
            .advance(&survey, PageInput::Info(info("A", "B", "C")))
            .unwrap_err();
        assert_eq!(rejected.error, ValidationError::AlreadyComplete {});
    }

    #[test]
    fn walks_all_questions_in_order() {
        let survey = Survey::voice_of_industry();
        let mut session = DraftSession::new()
            .advance(&survey, PageInput::Info(info("A", "B", "C")))
            .unwrap();
        let mut visited = vec![session.page()];
        for qid in QuestionId::ALL {
            session = session
                .advance(&survey, select(&[survey.question(qid).options[2].as_str()]))
                .unwrap();
            visited.push(session.page());
        }
        let names: Vec<&str> = visited.iter().map(|p| p.name()).collect();
        assert_eq!(names, vec!["q1", "q2", "q3", "q4", "q5", "done"]);
        assert!(session.answers().is_complete());
    }

    #[test]
    fn commit_happens_once() {
        let survey = Survey::voice_of_industry();
        let mut session = completed(&survey);
        let mut store = MemoryStore::new();

        let first = session.commit(&mut store).unwrap();
        let second = session.commit(&mut store).unwrap();
        assert_eq!(first, second);
        assert_eq!(store.load_all().unwrap().len(), 1);
        assert_eq!(
            first.answers.encoded(QuestionId::Q1),
            Some("Poor communication and confidence||Weak problem-solving ability".to_string())
        );
    }

    #[test]
    fn one_row_per_session() {
        let survey = Survey::voice_of_industry();
        let mut store = MemoryStore::new();

        let mut session = completed(&survey);
        let row = session.commit(&mut store).unwrap();
        // A committed session cannot be walked again to produce a second row.
        let rejected = session
            .advance(&survey, select(&["Domain knowledge"]))
            .unwrap_err();
        assert_eq!(rejected.error, ValidationError::AlreadyComplete {});
        let mut session = rejected.session;
        assert_eq!(session.commit(&mut store).unwrap(), row);

        let mut other = completed(&survey);
        let other_row = other.commit(&mut store).unwrap();
        assert_ne!(other_row.id, row.id);
        assert_eq!(store.load_all().unwrap().len(), 2);
    }

    #[test]
    fn commit_requires_done() {
        let survey = Survey::voice_of_industry();
        let mut session = DraftSession::new()
            .advance(&survey, PageInput::Info(info("A", "B", "C")))
            .unwrap();
        let mut store = MemoryStore::new();
        assert!(matches!(
            session.commit(&mut store),
            Err(CommitError::NotComplete { .. })
        ));
        assert!(store.load_all().unwrap().is_empty());
    }

    #[test]
    fn failed_commit_can_be_retried() {
        let survey = Survey::voice_of_industry();
        let mut session = completed(&survey);

        let err = session.commit(&mut BrokenStore {}).unwrap_err();
        assert!(matches!(err, CommitError::Saving { .. }));
        assert!(session.committed().is_none());
        assert_eq!(session.page(), Page::Done);

        let mut store = MemoryStore::new();
        let row = session.commit(&mut store).unwrap();
        assert_eq!(session.committed(), Some(&row));
        assert_eq!(store.load_all().unwrap(), vec![row]);
    }
}
