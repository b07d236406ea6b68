// ********* Survey definition ***********

use std::fmt::Display;
use std::str::FromStr;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use snafu::{ensure, Snafu};

/// The separator between the labels of a multi-select answer, as stored in the
/// `q1`..`q5` columns.
pub const ANSWER_DELIMITER: &str = "||";

/// The five questions of a survey. The storage table has one column per question,
/// so the set is closed.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuestionId {
    Q1,
    Q2,
    Q3,
    Q4,
    Q5,
}

impl QuestionId {
    pub const ALL: [QuestionId; 5] = [
        QuestionId::Q1,
        QuestionId::Q2,
        QuestionId::Q3,
        QuestionId::Q4,
        QuestionId::Q5,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionId::Q1 => "q1",
            QuestionId::Q2 => "q2",
            QuestionId::Q3 => "q3",
            QuestionId::Q4 => "q4",
            QuestionId::Q5 => "q5",
        }
    }

    pub fn index(&self) -> usize {
        *self as usize
    }

    /// The question asked after this one, if any.
    pub fn next(&self) -> Option<QuestionId> {
        QuestionId::ALL.get(self.index() + 1).copied()
    }
}

impl Display for QuestionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for QuestionId {
    type Err = DefinitionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        QuestionId::ALL
            .iter()
            .find(|qid| qid.as_str() == s.trim().to_lowercase())
            .copied()
            .ok_or_else(|| DefinitionError::UnknownQuestion { id: s.to_string() })
    }
}

/// The labels selected for one question.
///
/// Built from user input, the labels are trimmed and deduplicated (first
/// occurrence wins). Decoded from storage, every non-empty token is kept as is,
/// so that a tally reflects what is actually in the table.
#[derive(Eq, PartialEq, Debug, Clone, Default, Hash)]
pub struct SelectionSet(Vec<String>);

impl SelectionSet {
    pub fn new<I, S>(labels: I) -> SelectionSet
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut res: Vec<String> = Vec::new();
        for l in labels {
            let label = l.as_ref().trim();
            if !label.is_empty() && !res.iter().any(|x| x == label) {
                res.push(label.to_string());
            }
        }
        SelectionSet(res)
    }

    /// Parses the stored form of an answer. Returns `None` when there is no label
    /// at all, which is treated like a missing answer.
    pub fn decode(raw: &str) -> Option<SelectionSet> {
        let tokens: Vec<String> = raw
            .split(ANSWER_DELIMITER)
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(|s| s.to_string())
            .collect();
        if tokens.is_empty() {
            None
        } else {
            Some(SelectionSet(tokens))
        }
    }

    pub fn encode(&self) -> String {
        self.0.join(ANSWER_DELIMITER)
    }

    pub fn labels(&self) -> &[String] {
        &self.0
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|s| s.as_str())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// One question as presented to the respondent.
#[derive(Eq, PartialEq, Debug, Clone, Serialize)]
pub struct QuestionDefinition {
    pub id: QuestionId,
    pub heading: String,
    pub prompt: String,
    pub options: Vec<String>,
}

impl QuestionDefinition {
    pub fn has_option(&self, label: &str) -> bool {
        self.options.iter().any(|o| o == label)
    }
}

/// How the organization type is collected. Deployments differ: some offer a fixed
/// list, some a free text field.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum OrgTypePolicy {
    FreeText,
    OneOf(Vec<String>),
}

/// A complete, validated survey definition.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct Survey {
    title: String,
    org_sizes: Vec<String>,
    org_types: OrgTypePolicy,
    // Invariant: exactly one question per QuestionId, in QuestionId order.
    questions: Vec<QuestionDefinition>,
}

#[derive(Debug, Snafu)]
pub enum DefinitionError {
    #[snafu(display("Unknown question id {id:?} (expected q1 to q5)"))]
    UnknownQuestion { id: String },
    #[snafu(display("Expected question {expected} at position {position}, found {found}"))]
    WrongQuestionOrder {
        position: usize,
        expected: QuestionId,
        found: QuestionId,
    },
    #[snafu(display("Expected 5 questions, found {count}"))]
    WrongQuestionCount { count: usize },
    #[snafu(display("Question {id} has no options"))]
    NoOptions { id: QuestionId },
    #[snafu(display("Option {label:?} appears twice in {context}"))]
    DuplicateLabel { context: String, label: String },
    #[snafu(display("Label {label:?} in {context} may not be empty or contain \"||\""))]
    InvalidLabel { context: String, label: String },
    #[snafu(display("Label {label:?} in {context} has leading or trailing spaces"))]
    PaddedLabel { context: String, label: String },
    #[snafu(display("At least one organization size bracket is required"))]
    NoOrgSizes {},
    #[snafu(display("The list of organization types may not be empty"))]
    NoOrgTypes {},
}

fn check_labels(context: &str, labels: &[String]) -> Result<(), DefinitionError> {
    for (idx, label) in labels.iter().enumerate() {
        ensure!(
            !label.trim().is_empty() && !label.contains(ANSWER_DELIMITER),
            InvalidLabelSnafu { context, label }
        );
        // Input is trimmed before it is compared with the labels.
        ensure!(label.trim() == label, PaddedLabelSnafu { context, label });
        ensure!(
            !labels[..idx].contains(label),
            DuplicateLabelSnafu { context, label }
        );
    }
    Ok(())
}

impl Survey {
    pub fn new(
        title: &str,
        org_sizes: Vec<String>,
        org_types: OrgTypePolicy,
        questions: Vec<QuestionDefinition>,
    ) -> Result<Survey, DefinitionError> {
        ensure!(!org_sizes.is_empty(), NoOrgSizesSnafu {});
        check_labels("organization sizes", &org_sizes)?;
        if let OrgTypePolicy::OneOf(types) = &org_types {
            ensure!(!types.is_empty(), NoOrgTypesSnafu {});
            check_labels("organization types", types)?;
        }
        ensure!(
            questions.len() == QuestionId::ALL.len(),
            WrongQuestionCountSnafu {
                count: questions.len()
            }
        );
        for (position, (q, expected)) in questions.iter().zip(QuestionId::ALL).enumerate() {
            ensure!(
                q.id == expected,
                WrongQuestionOrderSnafu {
                    position: position + 1,
                    expected,
                    found: q.id
                }
            );
            ensure!(!q.options.is_empty(), NoOptionsSnafu { id: q.id });
            check_labels(&format!("question {}", q.id), &q.options)?;
        }
        Ok(Survey {
            title: title.to_string(),
            org_sizes,
            org_types,
            questions,
        })
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn org_sizes(&self) -> &[String] {
        &self.org_sizes
    }

    pub fn org_types(&self) -> &OrgTypePolicy {
        &self.org_types
    }

    pub fn questions(&self) -> &[QuestionDefinition] {
        &self.questions
    }

    pub fn question(&self, id: QuestionId) -> &QuestionDefinition {
        &self.questions[id.index()]
    }

    /// The "Voice of Industry" survey, used when no configuration is provided.
    pub fn voice_of_industry() -> Survey {
        fn q(id: QuestionId, heading: &str, prompt: &str, options: &[&str]) -> QuestionDefinition {
            QuestionDefinition {
                id,
                heading: heading.to_string(),
                prompt: prompt.to_string(),
                options: options.iter().map(|s| s.to_string()).collect(),
            }
        }
        let to_vec = |xs: &[&str]| xs.iter().map(|s| s.to_string()).collect::<Vec<String>>();
        Survey {
            title: "Voice of Industry Survey".to_string(),
            org_sizes: to_vec(&["<50", "51-100", "101-250", "250+"]),
            org_types: OrgTypePolicy::OneOf(to_vec(&[
                "Agriculture & Farming",
                "Manufacturing & Industrial",
                "Construction & Real Estate",
                "Information Technology (IT & Software)",
                "Healthcare & Pharmaceuticals",
                "Banking, Finance & Insurance",
                "Education & Training",
                "Tourism & Hospitality",
                "Transport & Logistics",
                "Media & Entertainment",
                "Energy & Power",
                "Retail & E-commerce",
                "Others",
            ])),
            questions: vec![
                q(
                    QuestionId::Q1,
                    "The Hiring Hurdle",
                    "What is the single biggest roadblock you face in hiring fresh graduates?",
                    &[
                        "Poor communication and confidence",
                        "Weak problem-solving ability",
                        "Unrealistic salary or role expectations",
                        "Lack of workplace readiness",
                        "Shallow domain knowledge",
                    ],
                ),
                q(
                    QuestionId::Q2,
                    "The Future Skill Stack",
                    "Which skills will matter most for young professionals in the next 5 years?",
                    &[
                        "Digital & data literacy",
                        "Problem solving & analytical thinking",
                        "Financial & business acumen",
                        "Communication & collaboration",
                        "Adaptability & agility",
                    ],
                ),
                q(
                    QuestionId::Q3,
                    "The First Job Gap",
                    "When freshers join, where do you see the biggest gap between expectation and reality?",
                    &[
                        "Workplace behavior / professionalism",
                        "Ability to apply knowledge in practice",
                        "Confidence & communication",
                        "Discipline & work ethic",
                        "Ownership / accountability",
                    ],
                ),
                q(
                    QuestionId::Q4,
                    "The Selection Compass",
                    "If you could pick only one trait while hiring, which would you bet on?",
                    &[
                        "Attitude & learnability",
                        "Integrity & ethics",
                        "Communication skills",
                        "Resilience & work ethic",
                        "Domain knowledge",
                    ],
                ),
                q(
                    QuestionId::Q5,
                    "The Retention Code",
                    "What matters most in retaining young talent in the first 2 years?",
                    &[
                        "Growth & learning opportunities",
                        "Good manager and team culture",
                        "Competitive compensation",
                        "Work-life balance & flexibility",
                        "Role alignment with skills",
                    ],
                ),
            ],
        }
    }
}

// ********* Responses ***********

/// Identifier assigned by the store.
pub type ResponseId = i64;

/// The answers of one respondent, one slot per question.
#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct Answers([Option<SelectionSet>; 5]);

impl Answers {
    pub fn get(&self, id: QuestionId) -> Option<&SelectionSet> {
        self.0[id.index()].as_ref()
    }

    pub fn set(&mut self, id: QuestionId, selection: SelectionSet) {
        self.0[id.index()] = if selection.is_empty() {
            None
        } else {
            Some(selection)
        };
    }

    /// Builds the answers from the stored columns `q1`..`q5`.
    pub fn decode(raw: [Option<&str>; 5]) -> Answers {
        Answers(raw.map(|r| r.and_then(SelectionSet::decode)))
    }

    /// The stored form of one column.
    pub fn encoded(&self, id: QuestionId) -> Option<String> {
        self.get(id).map(|s| s.encode())
    }

    pub fn is_complete(&self) -> bool {
        self.0.iter().all(|a| a.is_some())
    }
}

/// A submission that went through the whole intake flow and awaits storage.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct NewResponse {
    pub name: String,
    pub organization: String,
    pub org_size: String,
    pub org_type: String,
    pub location: String,
    pub answers: Answers,
}

/// A stored response. Rows are never modified after the insert.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct RespondentAnswer {
    pub id: ResponseId,
    pub name: String,
    pub organization: String,
    pub org_size: String,
    pub org_type: String,
    pub location: String,
    pub answers: Answers,
    pub submitted_at: NaiveDateTime,
}

impl RespondentAnswer {
    pub fn from_new(id: ResponseId, submitted_at: NaiveDateTime, r: &NewResponse) -> Self {
        RespondentAnswer {
            id,
            name: r.name.clone(),
            organization: r.organization.clone(),
            org_size: r.org_size.clone(),
            org_type: r.org_type.clone(),
            location: r.location.clone(),
            answers: r.answers.clone(),
            submitted_at,
        }
    }
}

/// The single-valued columns that can be counted.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum CategoryField {
    Organization,
    OrgSize,
    OrgType,
    Location,
}

impl CategoryField {
    pub fn value<'a>(&self, row: &'a RespondentAnswer) -> &'a str {
        match self {
            CategoryField::Organization => row.organization.as_str(),
            CategoryField::OrgSize => row.org_size.as_str(),
            CategoryField::OrgType => row.org_type.as_str(),
            CategoryField::Location => row.location.as_str(),
        }
    }
}
