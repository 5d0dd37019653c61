//! Prompt construction for the research pipeline stages.

use chrono::{DateTime, Utc};

use delve_core::QueryItem;

/// Output-format guidelines appended to the synthesis prompt.
pub const REPORT_GUIDELINES: &str = "\
Write the report in GitHub-flavored Markdown.
- Open with a title and a short abstract.
- Organize the body into sections with headings.
- Aim for depth over breadth: include every relevant figure, date, and name
  the learnings contain.
- Close with a short conclusions section.";

/// System directive shared by every model call in the pipeline.
pub fn system_instruction(now: DateTime<Utc>) -> String {
    format!(
        "You are an expert researcher. Today is {}. Follow these instructions \
         when responding:\n\
         - The user is a highly experienced analyst; be as detailed as \
           possible and do not simplify.\n\
         - Be proactive: anticipate follow-up questions and answer them.\n\
         - Treat sources published after your training data as valid when the \
           user presents them.\n\
         - Flag speculation clearly instead of omitting it.",
        now.format("%Y-%m-%d")
    )
}

/// Prompt asking the model to expand a research question into sub-queries.
///
/// The response contract is a JSON array of `{query, researchGoal}` objects;
/// the extraction engine tolerates the usual deviations from it.
pub fn query_expansion_prompt(query: &str) -> String {
    format!(
        "Given the following research topic, generate a list of search \
         queries that together cover the topic thoroughly.\n\n\
         <topic>{}</topic>\n\n\
         Respond with a JSON array only, no prose. Each element must be an \
         object with two string fields: \"query\" (the search query) and \
         \"researchGoal\" (what that query is meant to establish and how to \
         deepen the research once it is answered).",
        query
    )
}

/// Prompt for one retrieval/summarization call on a planned sub-query.
pub fn retrieval_prompt(item: &QueryItem) -> String {
    format!(
        "Research the following query and summarize what you find as a list \
         of concrete learnings. Prefer dense, information-rich statements: \
         include exact figures, dates, entities, and metrics wherever the \
         sources provide them.\n\n\
         <query>{}</query>\n\n\
         Research goal: {}",
        item.query, item.research_goal
    )
}

/// Prompt for the final report synthesis call.
pub fn synthesis_prompt(query: &str, learnings: &[String]) -> String {
    let merged = learnings
        .iter()
        .map(|l| format!("<learning>\n{}\n</learning>", l))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "Write a final report on the following topic using the learnings \
         from research. Incorporate every learning.\n\n\
         <topic>{}</topic>\n\n\
         <learnings>\n{}\n</learnings>\n\n{}",
        query, merged, REPORT_GUIDELINES
    )
}

/// Append a response-language directive when one was requested.
pub fn with_language(prompt: String, language: Option<&str>) -> String {
    match language {
        Some(lang) => format!("{}\n\nRespond in {}.", prompt, lang),
        None => prompt,
    }
}
