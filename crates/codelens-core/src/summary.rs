//! Project-level overview derived from merged file records.
//!
//! Two ways to produce the overview description live side by side:
//!
//! - [`describe_locally`]: term frequency over every file, class and method
//!   description. Pure and total.
//! - [`build_purpose_prompt`]: the prompt used when the description is
//!   delegated to the language model. The model call itself lives in the
//!   `codelens` crate; on any failure it falls back to
//!   [`MODEL_FALLBACK_DESCRIPTION`].
//!
//! An empty project gets [`EMPTY_PROJECT_DESCRIPTION`] either way.

use std::collections::HashMap;

use crate::models::{MergedFileRecord, ProjectOverview, ProjectSummary};

pub const EMPTY_PROJECT_DESCRIPTION: &str =
    "No source files were analyzed, so there is no project description to report.";

pub const MODEL_FALLBACK_DESCRIPTION: &str = "This project provides backend functionality for a \
    domain-specific application, including business logic and authentication.";

pub const NO_TERMS_DESCRIPTION: &str =
    "The analyzed files did not include enough descriptive text to characterize this project.";

/// Number of frequent terms named in a local description.
pub const TOP_TERMS: usize = 5;

const MIN_TERM_LEN: usize = 4;

const STOP_WORDS: &[&str] = &[
    "about", "above", "after", "again", "against", "also", "along", "among", "another", "based",
    "been", "before", "being", "below", "between", "both", "call", "called", "calls", "class",
    "classes", "code", "contains", "could", "define", "defined", "defines", "does", "doing",
    "each", "file", "files", "from", "function", "functions", "given", "handle", "handles",
    "have", "having", "here", "into", "its", "just", "like", "main", "make", "makes", "many",
    "method", "methods", "more", "most", "much", "must", "need", "only", "other", "over",
    "provide", "provides", "return", "returns", "same", "should", "some", "such", "than",
    "that", "their", "them", "then", "there", "these", "they", "this", "those", "through",
    "under", "until", "upon", "used", "uses", "using", "very", "what", "when", "where",
    "which", "while", "will", "with", "within", "without", "would", "your",
];

/// Compute the overview counts around an already-produced description.
pub fn overview_with(records: &[MergedFileRecord], description: String) -> ProjectOverview {
    ProjectOverview {
        description,
        total_files_analyzed: records.len(),
    }
}

/// Summarize without any external call.
pub fn summarize_locally(records: &[MergedFileRecord]) -> ProjectOverview {
    overview_with(records, describe_locally(records))
}

/// Assemble the final summary document.
pub fn build_project_summary(files: Vec<MergedFileRecord>, overview: ProjectOverview) -> ProjectSummary {
    ProjectSummary {
        files,
        project_overview: overview,
    }
}

/// Every non-empty file, class and method description, in record order.
pub fn collect_descriptions(records: &[MergedFileRecord]) -> Vec<&str> {
    let mut out = Vec::new();
    for file in records {
        push_non_empty(&mut out, &file.description);
        for class in &file.classes {
            push_non_empty(&mut out, &class.description);
            for method in &class.methods {
                push_non_empty(&mut out, &method.description);
            }
        }
    }
    out
}

fn push_non_empty<'a>(out: &mut Vec<&'a str>, text: &'a str) {
    let trimmed = text.trim();
    if !trimmed.is_empty() {
        out.push(trimmed);
    }
}

/// Template description naming the most frequent terms, followed by the
/// source descriptions themselves.
pub fn describe_locally(records: &[MergedFileRecord]) -> String {
    if records.is_empty() {
        return EMPTY_PROJECT_DESCRIPTION.to_string();
    }

    let descriptions = collect_descriptions(records);
    let terms = top_terms(&descriptions, TOP_TERMS);
    let lead = if terms.is_empty() {
        NO_TERMS_DESCRIPTION.to_string()
    } else {
        format!("This project centers on {}.", join_terms(&terms))
    };

    if descriptions.is_empty() {
        lead
    } else {
        format!("{} {}", lead, descriptions.join(" "))
    }
}

/// The `n` most frequent lowercase terms of at least four characters,
/// excluding stop words. Ties go to the term seen first.
pub fn top_terms(texts: &[&str], n: usize) -> Vec<String> {
    // term -> (count, first position)
    let mut counts: HashMap<String, (usize, usize)> = HashMap::new();
    let mut position = 0usize;

    for text in texts {
        for token in tokenize(text) {
            let entry = counts.entry(token).or_insert((0, position));
            entry.0 += 1;
            position += 1;
        }
    }

    let mut ranked: Vec<(String, usize, usize)> = counts
        .into_iter()
        .map(|(term, (count, first))| (term, count, first))
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.2.cmp(&b.2)));
    ranked.into_iter().take(n).map(|(term, _, _)| term).collect()
}

fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|word| word.chars().next().is_some_and(char::is_alphabetic))
        .map(str::to_lowercase)
        .filter(|word| word.chars().count() >= MIN_TERM_LEN && !STOP_WORDS.contains(&word.as_str()))
}

fn join_terms(terms: &[String]) -> String {
    match terms {
        [] => String::new(),
        [only] => only.clone(),
        [init @ .., last] => format!("{} and {}", init.join(", "), last),
    }
}

/// Prompt asking the model for a short project purpose statement.
pub fn build_purpose_prompt(records: &[MergedFileRecord]) -> String {
    let mut blocks = Vec::new();
    for file in records {
        blocks.push(format!("File: {}\n{}", file.filename, file.description));
        for class in &file.classes {
            blocks.push(format!("Class: {}\n{}", class.name, class.description));
            for method in &class.methods {
                if !method.description.is_empty() {
                    blocks.push(method.description.clone());
                }
            }
        }
    }

    format!(
        "You are an expert software analyst. The metadata below was extracted from the source \
files of one project. Write a clear, natural project purpose description of two to three lines.\n\
Describe only what the project is for; do not describe its structure or implementation.\n\n\
Metadata:\n{}\n\nProject Purpose:\n",
        blocks.join("\n")
    )
}
