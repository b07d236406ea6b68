/*!

This is the long-form manual for `survey_tally` and `voicesurvey`.

## The survey

A survey has a respondent information page followed by exactly five
multiple-choice questions (`q1` to `q5`). Each question accepts one or more of
its options. The pages are always visited in order:

```text
info -> q1 -> q2 -> q3 -> q4 -> q5 -> done
```

There is no way back to a previous page. The response is stored when the
respondent reaches `done`, and only once.

## Configuration

Without a configuration file, `voicesurvey` runs the built-in "Voice of Industry"
survey. A JSON file can replace it with the `--config` flag:

```json
{
  "surveyTitle": "Voice of Industry Survey",
  "database": "survey_responses.db",
  "orgSizes": ["<50", "51-100", "101-250", "250+"],
  "orgTypes": ["Information Technology (IT & Software)", "Others"],
  "questions": [
    {
      "id": "q1",
      "heading": "The Hiring Hurdle",
      "question": "What is the single biggest roadblock you face in hiring fresh graduates?",
      "options": ["Poor communication and confidence", "Weak problem-solving ability"]
    }
  ]
}
```

(the other four questions follow the same layout.)

- `orgTypes` may be omitted or set to `null`: the type of organization is then a
  free text field.
- Option labels may not contain `||`, which separates the selected options in
  the database, nor start or end with spaces.
- `database` is the SQLite file holding the `responses` table. The `--db` flag
  takes precedence.

## Storage

All the responses live in a single table:

```sql
CREATE TABLE IF NOT EXISTS responses (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT, organization TEXT, org_size TEXT, org_type TEXT, location TEXT,
    q1 TEXT, q2 TEXT, q3 TEXT, q4 TEXT, q5 TEXT,
    submitted_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
)
```

A multi-select answer is stored as the selected labels joined with `||`, for
example `Growth & learning opportunities||Competitive compensation`. Rows are
never updated or deleted.

## Commands

### `intake`

Asks the questions on the terminal and stores the response. Options are
selected by number, several numbers separated by commas (`1,3`). A page is asked
again until its input is valid. If the database cannot be written, the program
offers to try again.

### `report`

Prints a JSON summary of the responses: number of responses, answer counts per
question (with their share of the respondents of that question), and counts per
type of organization, size and location.

The rows can be filtered with `--org-type`, `--org-size` (both accept `All`) and
`--location` (repeatable). All the filters must match for a row to be kept.

When there is no response yet, or when the database cannot be read, the report
says so instead of failing.

With `--reference`, the summary is compared to a previously saved one and the
differences are printed.

### `export`

Writes the (filtered) responses as CSV with the header
`name,organization,org_size,org_type,location,q1,q2,q3,q4,q5,submitted_at`.
Answers keep their `||` form.

*/
