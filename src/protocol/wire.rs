//! Text encoding of message content
//!
//! ```text
//! task list    [x1 y1] [x2 y2] ...
//! bundle list  <cost>: [x1 y1] [x2 y2] ...\n<cost>: ...\n
//! clear        !clear!
//! ```

use crate::market::types::{Bundle, Task};
use std::fmt::Write;
use thiserror::Error;

pub const CLEAR_SENTINEL: &str = "!clear!";

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("unexpected '{found}' at byte {pos}, expected '['")]
    UnexpectedText { pos: usize, found: String },
    #[error("task starting at byte {0} is missing its closing ']'")]
    UnterminatedTask(usize),
    #[error("task at byte {pos} has {count} coordinate(s), expected 2")]
    CoordinateCount { pos: usize, count: usize },
    #[error("bad coordinate '{text}' at byte {pos}")]
    BadCoordinate { pos: usize, text: String },
    #[error("bundle on line {0} has no '<cost>:' prefix")]
    MissingCost(usize),
    #[error("bad cost '{text}' on line {line}")]
    BadCost { line: usize, text: String },
    #[error("line {line}: {source}")]
    InLine {
        line: usize,
        #[source]
        source: Box<ParseError>,
    },
    #[error("expected exactly one bundle, found {0}")]
    BundleCount(usize),
}

fn parse_number(text: &str) -> Option<f64> {
    text.parse::<f64>().ok().filter(|v| v.is_finite())
}

pub fn encode_tasks(tasks: &[Task]) -> String {
    let mut out = String::new();
    for (i, task) in tasks.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        let _ = write!(out, "[{} {}]", task.target.x, task.target.y);
    }
    out
}

/// Parses `"[x y] [x y] ..."`. Blank input is an empty list.
pub fn parse_tasks(text: &str) -> Result<Vec<Task>, ParseError> {
    let mut tasks = Vec::new();
    let mut rest = text;
    loop {
        let trimmed = rest.trim_start();
        if trimmed.is_empty() {
            break;
        }
        let pos = text.len() - trimmed.len();
        let Some(body) = trimmed.strip_prefix('[') else {
            let found = trimmed.split_whitespace().next().unwrap_or_default().to_string();
            return Err(ParseError::UnexpectedText { pos, found });
        };
        let Some(close) = body.find(']') else {
            return Err(ParseError::UnterminatedTask(pos));
        };

        let coords: Vec<&str> = body[..close].split_whitespace().collect();
        let [x, y] = coords.as_slice() else {
            return Err(ParseError::CoordinateCount {
                pos,
                count: coords.len(),
            });
        };
        let (Some(x), Some(y)) = (parse_number(x), parse_number(y)) else {
            return Err(ParseError::BadCoordinate {
                pos,
                text: body[..close].to_string(),
            });
        };
        tasks.push(Task::new(x, y));
        rest = &body[close + 1..];
    }
    Ok(tasks)
}

pub fn encode_bundle(bundle: &Bundle) -> String {
    format!("{}: {}", bundle.cost, encode_tasks(&bundle.tasks))
}

pub fn encode_bundles(bundles: &[Bundle]) -> String {
    bundles.iter().map(|b| encode_bundle(b) + "\n").collect()
}

fn parse_bundle_line(line_no: usize, line: &str) -> Result<Bundle, ParseError> {
    let Some((cost_text, tasks_text)) = line.split_once(':') else {
        return Err(ParseError::MissingCost(line_no));
    };
    let cost = parse_number(cost_text.trim()).ok_or_else(|| ParseError::BadCost {
        line: line_no,
        text: cost_text.trim().to_string(),
    })?;
    let tasks = parse_tasks(tasks_text).map_err(|e| ParseError::InLine {
        line: line_no,
        source: Box::new(e),
    })?;
    Ok(Bundle::new(tasks, cost))
}

/// Parses one bundle per non-blank line.
pub fn parse_bundles(text: &str) -> Result<Vec<Bundle>, ParseError> {
    text.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| parse_bundle_line(i + 1, line))
        .collect()
}

/// Parses content that must hold exactly one bundle.
pub fn parse_single_bundle(text: &str) -> Result<Bundle, ParseError> {
    let mut bundles = parse_bundles(text)?;
    if bundles.len() != 1 {
        return Err(ParseError::BundleCount(bundles.len()));
    }
    Ok(bundles.remove(0))
}

pub fn is_clear_request(content: &str) -> bool {
    content.trim() == CLEAR_SENTINEL
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_task_list() {
        let tasks = parse_tasks("[0 1] [10.3 7]  [-2.5 -0.25]").unwrap();
        assert_eq!(
            tasks,
            vec![Task::new(0.0, 1.0), Task::new(10.3, 7.0), Task::new(-2.5, -0.25)]
        );
        assert!(parse_tasks("   ").unwrap().is_empty());
    }

    #[test]
    fn test_task_list_encoding_reads_back() {
        let tasks = vec![Task::new(1.5, -2.0), Task::new(0.1, 3.0)];
        assert_eq!(encode_tasks(&tasks), "[1.5 -2] [0.1 3]");
        assert_eq!(parse_tasks(&encode_tasks(&tasks)).unwrap(), tasks);
    }

    #[test]
    fn test_malformed_tasks_are_errors() {
        assert_eq!(
            parse_tasks("[1 2] hello"),
            Err(ParseError::UnexpectedText {
                pos: 6,
                found: "hello".to_string()
            })
        );
        assert_eq!(parse_tasks("[1 2"), Err(ParseError::UnterminatedTask(0)));
        assert!(matches!(
            parse_tasks("[1 2 3]"),
            Err(ParseError::CoordinateCount { count: 3, .. })
        ));
        assert!(matches!(parse_tasks("[1 NaN]"), Err(ParseError::BadCoordinate { .. })));
        assert!(matches!(parse_tasks("[a b]"), Err(ParseError::BadCoordinate { .. })));
    }

    #[test]
    fn test_parse_bundle_list() {
        let text = "3.5: [0 0] [1 1]\n\n-1: [2 2]\n0: \n";
        let bundles = parse_bundles(text).unwrap();
        assert_eq!(bundles.len(), 3);
        assert_eq!(bundles[0].cost, 3.5);
        assert_eq!(bundles[0].tasks.len(), 2);
        assert_eq!(bundles[1].cost, -1.0);
        assert!(bundles[2].is_empty());
    }

    #[test]
    fn test_bad_bundle_lines() {
        assert_eq!(parse_bundles("[0 0]"), Err(ParseError::MissingCost(1)));
        assert!(matches!(parse_bundles("x: [0 0]"), Err(ParseError::BadCost { line: 1, .. })));
        assert!(matches!(
            parse_bundles("1: [0 0]\n2: [0 0"),
            Err(ParseError::InLine { line: 2, .. })
        ));
    }

    #[test]
    fn test_single_bundle() {
        let bundle = Bundle::new(vec![Task::new(4.0, 2.0)], 1.25);
        assert_eq!(parse_single_bundle(&encode_bundle(&bundle)).unwrap(), bundle);
        assert_eq!(
            parse_single_bundle("1: [0 0]\n2: [1 1]\n"),
            Err(ParseError::BundleCount(2))
        );
    }

    #[test]
    fn test_clear_sentinel() {
        assert!(is_clear_request("!clear!"));
        assert!(is_clear_request(" !clear!\n"));
        assert!(!is_clear_request("[0 0]"));
    }
}
