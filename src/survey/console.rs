// Terminal front end of the intake: one page at a time, on any line-based input.

use crate::survey::*;

use std::io::{BufRead, Write};

/// How a session ended.
#[derive(Debug)]
enum SessionEnd {
    Stored(RespondentAnswer),
    /// The respondent gave up after a failed save.
    Abandoned,
    EndOfInput,
}

fn read_line<R: BufRead>(input: &mut R) -> SurveyResult<Option<String>> {
    let mut line = String::new();
    let n = input.read_line(&mut line).context(TerminalSnafu {})?;
    if n == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
}

fn ask<R: BufRead, W: Write>(input: &mut R, output: &mut W, label: &str) -> SurveyResult<Option<String>> {
    write!(output, "{}: ", label).context(TerminalSnafu {})?;
    output.flush().context(TerminalSnafu {})?;
    read_line(input)
}

fn show_options<W: Write>(output: &mut W, options: &[String]) -> SurveyResult<()> {
    for (idx, o) in options.iter().enumerate() {
        writeln!(output, "  {}. {}", idx + 1, o).context(TerminalSnafu {})?;
    }
    Ok(())
}

// A number picks an option of the list. Anything else is taken as typed.
fn resolve_choice(options: &[String], raw: &str) -> String {
    let raw = raw.trim();
    match raw.parse::<usize>() {
        Ok(n) if n >= 1 && n <= options.len() => options[n - 1].clone(),
        _ => raw.to_string(),
    }
}

fn resolve_selection(options: &[String], raw: &str) -> Vec<String> {
    if options.iter().any(|o| o == raw.trim()) {
        return vec![raw.trim().to_string()];
    }
    raw.split(',')
        .map(|token| resolve_choice(options, token))
        .filter(|s| !s.is_empty())
        .collect()
}

fn ask_info<R: BufRead, W: Write>(
    survey: &Survey,
    input: &mut R,
    output: &mut W,
) -> SurveyResult<Option<RespondentInfo>> {
    writeln!(output, "\n{}\n", survey.title()).context(TerminalSnafu {})?;
    let Some(name) = ask(input, output, "Name")? else {
        return Ok(None);
    };
    let Some(organization) = ask(input, output, "Organization")? else {
        return Ok(None);
    };
    writeln!(output, "Organization size:").context(TerminalSnafu {})?;
    show_options(output, survey.org_sizes())?;
    let Some(size) = ask(input, output, "Your choice")? else {
        return Ok(None);
    };
    let org_type = match survey.org_types() {
        OrgTypePolicy::FreeText => ask(input, output, "Type of organization")?,
        OrgTypePolicy::OneOf(types) => {
            writeln!(output, "Type of organization:").context(TerminalSnafu {})?;
            show_options(output, types)?;
            ask(input, output, "Your choice")?.map(|raw| resolve_choice(types, &raw))
        }
    };
    let Some(org_type) = org_type else {
        return Ok(None);
    };
    let Some(location) = ask(input, output, "Location")? else {
        return Ok(None);
    };
    Ok(Some(RespondentInfo {
        name,
        organization,
        org_size: resolve_choice(survey.org_sizes(), &size),
        org_type,
        location,
    }))
}

fn ask_question<R: BufRead, W: Write>(
    question: &QuestionDefinition,
    input: &mut R,
    output: &mut W,
) -> SurveyResult<Option<Vec<String>>> {
    writeln!(output, "\n{}\n{}", question.heading, question.prompt).context(TerminalSnafu {})?;
    show_options(output, &question.options)?;
    let raw = ask(input, output, "Your choices (numbers separated by commas)")?;
    Ok(raw.map(|r| resolve_selection(&question.options, &r)))
}

fn run_session<S, R, W>(
    survey: &Survey,
    store: &mut S,
    input: &mut R,
    output: &mut W,
) -> SurveyResult<SessionEnd>
where
    S: ResponseStore + ?Sized,
    R: BufRead,
    W: Write,
{
    let mut session = DraftSession::new();
    while session.page() != Page::Done {
        let page_input = match session.page() {
            Page::Info => ask_info(survey, input, output)?.map(PageInput::Info),
            Page::Question(qid) => {
                ask_question(survey.question(qid), input, output)?.map(PageInput::Selection)
            }
            Page::Done => None,
        };
        let Some(page_input) = page_input else {
            debug!("run_session: end of input on page {}", session.page());
            return Ok(SessionEnd::EndOfInput);
        };
        session = match session.advance(survey, page_input) {
            Ok(next) => next,
            Err(Rejected { session, error }) => {
                writeln!(output, "{}", error).context(TerminalSnafu {})?;
                session
            }
        };
    }

    loop {
        match session.commit(store) {
            Ok(row) => {
                writeln!(output, "\n✅ Thank you! Your response has been recorded.")
                    .context(TerminalSnafu {})?;
                return Ok(SessionEnd::Stored(row));
            }
            Err(e) => {
                writeln!(output, "{}", e).context(TerminalSnafu {})?;
                let again = ask(input, output, "Try again? [y/N]")?;
                match again.as_deref().map(|s| s.trim().to_lowercase()) {
                    Some(a) if a == "y" || a == "yes" => continue,
                    Some(_) => return Ok(SessionEnd::Abandoned),
                    None => return Ok(SessionEnd::EndOfInput),
                }
            }
        }
    }
}

/// Runs the intake on a terminal-like input and output. Returns the number of
/// stored responses.
pub fn run_intake<S, R, W>(
    survey: &Survey,
    store: &mut S,
    mut input: R,
    mut output: W,
    repeat: bool,
) -> SurveyResult<u64>
where
    S: ResponseStore + ?Sized,
    R: BufRead,
    W: Write,
{
    let mut stored: u64 = 0;
    loop {
        match run_session(survey, store, &mut input, &mut output)? {
            SessionEnd::Stored(row) => {
                info!("Stored response {} from {:?}", row.id, row.organization);
                stored += 1;
            }
            SessionEnd::Abandoned => warn!("Response abandoned after a failed save"),
            SessionEnd::EndOfInput => break,
        }
        if !repeat {
            break;
        }
    }
    Ok(stored)
}
