//! Hit-event logs: a line-oriented text form of the calls instrumented code
//! makes, for producers that run out of process.
//!
//! ```text
//! # comment
//! source com.example.Foo Foo.java
//! line   com.example.Foo 12 run(I)V
//! jump   com.example.Foo 12 0
//! switch com.example.Foo 20 1 3
//! hit    com.example.Foo 12
//! branch com.example.Foo 12 0 1
//! ```
use std::io::BufRead;
use std::path::Path;
use std::str::FromStr;

use crate::coverage::{self, ProjectData, MAX_BRANCH_INDEX};
use crate::error::{CovtrackError, Result};

/// One parsed log entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HitEvent {
    Source { class: String, file: String },
    Line { class: String, line: u32, method: Option<(String, String)> },
    Jump { class: String, line: u32, condition: usize },
    Switch { class: String, line: u32, condition: usize, cases: usize },
    Hit { class: String, line: u32 },
    Branch { class: String, line: u32, condition: usize, outcome: usize },
}

impl HitEvent {
    /// Apply this event to `project`.
    pub fn apply(&self, project: &ProjectData) {
        match self {
            HitEvent::Source { class, file } => {
                project.get_or_create_class(class).set_source_file_name(file);
            }
            HitEvent::Line { class, line, method } => {
                let class = project.get_or_create_class(class);
                match method {
                    Some((name, descriptor)) => {
                        class.add_line(*line, name, descriptor);
                    }
                    None => {
                        class.get_or_create_line(*line);
                    }
                }
            }
            HitEvent::Jump { class, line, condition } => {
                project.get_or_create_class(class).add_jump(*line, *condition);
            }
            HitEvent::Switch { class, line, condition, cases } => {
                project
                    .get_or_create_class(class)
                    .add_switch(*line, *condition, *cases);
            }
            HitEvent::Hit { class, line } => coverage::record_hit(project, class, *line),
            HitEvent::Branch { class, line, condition, outcome } => {
                coverage::record_branch_hit(project, class, *line, *condition, *outcome)
            }
        }
    }
}

/// Parse one log line. Blank lines and `#` comments yield `None`.
/// `line_no` is 1-based and only used for error messages.
pub fn parse_event(text: &str, line_no: usize) -> Result<Option<HitEvent>> {
    let text = match text.find('#') {
        Some(idx) => &text[..idx],
        None => text,
    };
    let fields: Vec<&str> = text.split_whitespace().collect();
    let Some((&kind, args)) = fields.split_first() else {
        return Ok(None);
    };

    let err = |message: String| CovtrackError::Parse {
        line: line_no,
        message,
    };
    let expect = |min: usize, max: usize| -> Result<()> {
        if args.len() < min || args.len() > max {
            return Err(err(format!(
                "'{}' takes {} argument(s), got {}",
                kind,
                if min == max { min.to_string() } else { format!("{}-{}", min, max) },
                args.len()
            )));
        }
        Ok(())
    };
    let num = |idx: usize, what: &str| -> Result<usize> {
        let value = parse_num(args[idx], what, line_no)?;
        if value > MAX_BRANCH_INDEX {
            return Err(err(format!("{} {} exceeds {}", what, value, MAX_BRANCH_INDEX)));
        }
        Ok(value)
    };
    let line_num = || -> Result<u32> { parse_num(args[1], "line number", line_no) };

    let class = || args[0].to_string();
    let event = match kind {
        "source" => {
            expect(2, 2)?;
            HitEvent::Source {
                class: class(),
                file: args[1].to_string(),
            }
        }
        "line" => {
            expect(2, 3)?;
            let method = match args.get(2).copied() {
                Some(token) => {
                    let idx = token.find('(').ok_or_else(|| {
                        err(format!("method '{}' has no '(' descriptor", token))
                    })?;
                    Some((token[..idx].to_string(), token[idx..].to_string()))
                }
                None => None,
            };
            HitEvent::Line {
                class: class(),
                line: line_num()?,
                method,
            }
        }
        "jump" => {
            expect(3, 3)?;
            HitEvent::Jump {
                class: class(),
                line: line_num()?,
                condition: num(2, "condition")?,
            }
        }
        "switch" => {
            expect(4, 4)?;
            HitEvent::Switch {
                class: class(),
                line: line_num()?,
                condition: num(2, "condition")?,
                cases: num(3, "case count")?,
            }
        }
        "hit" => {
            expect(2, 2)?;
            HitEvent::Hit {
                class: class(),
                line: line_num()?,
            }
        }
        "branch" => {
            expect(4, 4)?;
            HitEvent::Branch {
                class: class(),
                line: line_num()?,
                condition: num(2, "condition")?,
                outcome: num(3, "outcome")?,
            }
        }
        other => return Err(err(format!("unknown event '{}'", other))),
    };
    Ok(Some(event))
}

fn parse_num<T: FromStr>(field: &str, what: &str, line_no: usize) -> Result<T> {
    field.parse().map_err(|_| CovtrackError::Parse {
        line: line_no,
        message: format!("invalid {}: '{}'", what, field),
    })
}

/// Parse a whole log. Stops at the first malformed line.
pub fn parse_events(input: &str) -> Result<Vec<HitEvent>> {
    let mut events = Vec::new();
    for (idx, text) in input.lines().enumerate() {
        if let Some(event) = parse_event(text, idx + 1)? {
            events.push(event);
        }
    }
    Ok(events)
}

/// Read events from `reader` and apply them as they are parsed. Returns the
/// number of events applied; events before a malformed line stay applied.
pub fn ingest<R: BufRead>(reader: R, project: &ProjectData) -> Result<usize> {
    let mut applied = 0;
    for (idx, text) in reader.lines().enumerate() {
        let text = text?;
        if let Some(event) = parse_event(&text, idx + 1)? {
            event.apply(project);
            applied += 1;
        }
    }
    Ok(applied)
}

/// Ingest the hit log at `path`.
pub fn ingest_file(path: &Path, project: &ProjectData) -> Result<usize> {
    let file = std::fs::File::open(path)?;
    ingest(std::io::BufReader::new(file), project)
}
