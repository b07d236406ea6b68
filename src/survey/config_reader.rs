use crate::survey::*;

use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The database used when neither the configuration nor the command line names one.
pub const DEFAULT_DATABASE: &str = "survey_responses.db";

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct QuestionConfig {
    pub id: String,
    pub heading: String,
    #[serde(rename = "question")]
    pub prompt: String,
    pub options: Vec<String>,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct SurveyConfig {
    #[serde(rename = "surveyTitle")]
    pub survey_title: String,
    pub database: Option<String>,
    #[serde(rename = "orgSizes")]
    pub org_sizes: Vec<String>,
    /// Missing or null: the type of organization is typed freely.
    #[serde(rename = "orgTypes")]
    pub org_types: Option<Vec<String>>,
    pub questions: Vec<QuestionConfig>,
}

/// A validated configuration.
#[derive(Debug, Clone)]
pub struct SurveySettings {
    pub survey: Survey,
    pub database: String,
}

pub fn validate_config(config: &SurveyConfig) -> SurveyResult<Survey> {
    let mut questions: Vec<QuestionDefinition> = Vec::new();
    for q in config.questions.iter() {
        let id: QuestionId = q.id.parse().context(InvalidSurveySnafu {})?;
        questions.push(QuestionDefinition {
            id,
            heading: q.heading.clone(),
            prompt: q.prompt.clone(),
            options: q.options.clone(),
        });
    }
    let org_types = match &config.org_types {
        None => OrgTypePolicy::FreeText,
        Some(types) => OrgTypePolicy::OneOf(types.clone()),
    };
    Survey::new(
        &config.survey_title,
        config.org_sizes.clone(),
        org_types,
        questions,
    )
    .context(InvalidSurveySnafu {})
}

// A relative database path is relative to the configuration file.
fn database_path(config_path: &str, database: &Option<String>) -> String {
    match database {
        None => DEFAULT_DATABASE.to_string(),
        Some(db) if Path::new(db).is_absolute() => db.clone(),
        Some(db) => {
            let root = Path::new(config_path).parent().unwrap_or_else(|| Path::new(""));
            let p: PathBuf = [root, Path::new(db)].iter().collect();
            p.display().to_string()
        }
    }
}

pub fn read_settings(config_path: Option<&str>) -> SurveyResult<SurveySettings> {
    let config_path = match config_path {
        None => {
            info!("No configuration provided, using the built-in survey");
            return Ok(SurveySettings {
                survey: Survey::voice_of_industry(),
                database: DEFAULT_DATABASE.to_string(),
            });
        }
        Some(p) => p,
    };
    let contents = fs::read_to_string(config_path).context(OpeningJsonSnafu { path: config_path })?;
    let config: SurveyConfig = serde_json::from_str(&contents).context(ParsingJsonSnafu {})?;
    debug!("config: {:?}", config);
    let survey = validate_config(&config)?;
    Ok(SurveySettings {
        survey,
        database: database_path(config_path, &config.database),
    })
}

pub fn read_summary(path: &str) -> SurveyResult<JSValue> {
    let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
    let js: JSValue = serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu {})?;
    Ok(js)
}
