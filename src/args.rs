use clap::{Parser, Subcommand};

/// This is a survey intake and results program.
#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// (file path, optional) The JSON file describing the survey: title, size brackets, types of
    /// organization and the five questions. Without it, the built-in Voice of Industry survey is used.
    #[clap(short, long, value_parser, global = true)]
    pub config: Option<String>,

    /// (file path, default survey_responses.db) The SQLite database holding the responses. Setting
    /// this option overrides the path that may be specified with the --config option.
    #[clap(long, value_parser, global = true)]
    pub db: Option<String>,

    // Other arguments
    /// If passed as an argument, will turn on verbose logging to the standard output.
    #[clap(long, takes_value = false, global = true)]
    pub verbose: bool,

    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Asks the survey questions on the terminal and stores the response.
    Intake {
        /// If passed, starts over with a new respondent after each stored response, until the
        /// end of the input.
        #[clap(long, takes_value = false)]
        repeat: bool,
    },
    /// Summarizes the responses in JSON format.
    Report {
        #[clap(flatten)]
        filters: FilterArgs,

        /// (file path, 'stdout' or empty) Where to write the summary.
        #[clap(short, long, value_parser)]
        out: Option<String>,

        /// (file path) A reference file containing a summary in JSON format. If provided, the
        /// computed summary must match it.
        #[clap(short, long, value_parser)]
        reference: Option<String>,
    },
    /// Writes the responses in CSV format.
    Export {
        #[clap(flatten)]
        filters: FilterArgs,

        /// (file path, 'stdout' or empty) Where to write the CSV file.
        #[clap(short, long, value_parser)]
        out: Option<String>,
    },
}

/// Filters on the responses. All of them must match for a response to be kept.
#[derive(clap::Args, Debug, Clone, Default)]
pub struct FilterArgs {
    /// (default All) Only keep this type of organization.
    #[clap(long, value_parser)]
    pub org_type: Option<String>,

    /// (default All) Only keep this organization size.
    #[clap(long, value_parser)]
    pub org_size: Option<String>,

    /// (repeatable) Only keep these locations. Not specified: all the locations.
    #[clap(long = "location", value_parser)]
    pub locations: Vec<String>,
}
