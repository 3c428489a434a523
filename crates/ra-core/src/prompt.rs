//! Prompt construction
//!
//! Initial prompts are mode-specific task templates followed by a schema hint.
//! Corrective prompts repeat the task and append one explicit instruction per
//! validation issue of the previous attempt.

use crate::config::PipelineConfig;
use crate::input::{CandidatePaper, RunInput};
use ra_schema::{ErrorKind, ValidationIssue};

/// Builds prompts for the generator
pub trait PromptBuilder: Send + Sync {
    /// Build the prompt for `input`
    ///
    /// `prior_errors` is `None` on the first attempt and carries the previous
    /// attempt's validation errors on retries.
    fn build(&self, input: &RunInput, prior_errors: Option<&[ValidationIssue]>) -> String;
}

const SCHEMA_HINT: &str = "\
Return a single JSON object (no markdown, no commentary) with keys:
related_works (3-5 items: title, year as integer, url, key_contribution, optional relevance_reason),
reproduction_checklist (5-10 items: task, why),
action_items (exactly 5 items: action, priority one of high|medium|low),
quality (schema_valid boolean, self_checks array of strings, optional notes).
For PDF mode, also include target_paper (title, main_idea, method, experiment_setup[] with
item, value and evidence {page as integer, span}, limitations[]).
";

/// Default prompt builder using fixed task templates
#[derive(Debug, Clone)]
pub struct TemplatePromptBuilder {
    max_pdf_chars: usize,
    max_abstract_chars: usize,
    max_prompt_issues: usize,
}

impl TemplatePromptBuilder {
    /// Create builder with limits taken from `config`
    #[must_use]
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            max_pdf_chars: config.max_pdf_chars,
            max_abstract_chars: config.max_abstract_chars,
            max_prompt_issues: config.max_prompt_issues,
        }
    }

    fn task(&self, input: &RunInput) -> String {
        match input {
            RunInput::Topic { topic, candidates } => self.topic_task(topic.trim(), candidates),
            RunInput::Pdf { text, .. } => self.pdf_task(text),
        }
    }

    fn topic_task(&self, topic: &str, candidates: &[CandidatePaper]) -> String {
        let mut out = String::from(
            "TASK: Given the topic, produce 3-5 related works, a reproduction checklist, \
             and exactly 5 action items.\n\n",
        );
        out.push_str(&format!("TOPIC: {topic}\n\n"));

        if candidates.is_empty() {
            out.push_str("CANDIDATE PAPERS: none provided; cite well-known works you are confident exist.\n\n");
        } else {
            out.push_str("CANDIDATE PAPERS:\n");
            let listed: Vec<String> = candidates
                .iter()
                .map(|p| {
                    format!(
                        "- Title: {}\n  Year: {}\n  URL: {}\n  Abstract: {}",
                        p.title,
                        p.year,
                        p.url,
                        truncate_chars(&p.abstract_text, self.max_abstract_chars)
                    )
                })
                .collect();
            out.push_str(&listed.join("\n\n"));
            out.push_str("\n\n");
        }

        out.push_str(
            "Rules:\n\
             - Choose the 3-5 MOST RELEVANT papers to the TOPIC.\n\
             - Rank the selected papers by relevance (most relevant first).\n\
             - Each paper: title, year, url, key_contribution (1-2 sentences), relevance_reason (optional).\n\
             - Provide a reproduction_checklist of 5-10 items.\n\
             - Provide exactly 5 action_items with priority.\n",
        );
        out
    }

    fn pdf_task(&self, text: &str) -> String {
        format!(
            "TASK: You are given extracted text of a paper. Produce:\n\
             - related_works: 3-5 (you may infer typical related works categories if exact citations \
             are not present; be explicit if uncertain)\n\
             - target_paper: title/main_idea/method + experiment_setup[] with evidence (page, span) when available\n\
             - reproduction_checklist: 5-10\n\
             - action_items: exactly 5\n\n\
             PAPER TEXT (with page tags like [PAGE 1], [PAGE 2]...):\n\
             {}\n\n\
             Rules:\n\
             - For experiment_setup evidence, quote a SHORT span (<= 200 chars) and include the page number.\n\
             - Keep claims conservative if the text is unclear.\n",
            truncate_chars(text, self.max_pdf_chars)
        )
    }
}

impl Default for TemplatePromptBuilder {
    fn default() -> Self {
        Self::new(&PipelineConfig::default())
    }
}

impl PromptBuilder for TemplatePromptBuilder {
    fn build(&self, input: &RunInput, prior_errors: Option<&[ValidationIssue]>) -> String {
        let mut prompt = self.task(input);
        prompt.push('\n');
        prompt.push_str(SCHEMA_HINT);

        let Some(errors) = prior_errors.filter(|e| !e.is_empty()) else {
            return prompt;
        };

        prompt.push_str("\nVALIDATION ERRORS:\n");
        for issue in errors.iter().take(self.max_prompt_issues) {
            prompt.push_str(&format!("- {}\n", corrective_instruction(issue)));
        }
        if errors.len() > self.max_prompt_issues {
            let hidden = errors.len() - self.max_prompt_issues;
            prompt.push_str(&format!("- ... and {hidden} more\n"));
        }
        prompt.push_str("Fix the JSON to satisfy the schema.\n");
        prompt
    }
}

/// Render one issue as an instruction to the generator
#[must_use]
pub fn corrective_instruction(issue: &ValidationIssue) -> String {
    let path = &issue.path;
    match issue.kind {
        ErrorKind::MalformedJson => format!(
            "the previous output was not valid JSON ({}); return exactly one JSON object and nothing else",
            issue.detail
        ),
        ErrorKind::GenerationError => format!(
            "the previous request failed ({}); return exactly one JSON object",
            issue.detail
        ),
        ErrorKind::MissingField => {
            format!("the field `{path}` is missing; it is required and must be included")
        }
        ErrorKind::WrongType | ErrorKind::OutOfRange | ErrorKind::InvalidEnum => {
            format!("the field `{path}` {}", issue.detail)
        }
    }
}

fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ra_schema::FieldPath;

    fn issue(path: &str, kind: ErrorKind, detail: &str) -> ValidationIssue {
        ValidationIssue::new(path.parse::<FieldPath>().unwrap(), kind, detail)
    }

    #[test]
    fn first_prompt_has_no_error_block() {
        let prompt = TemplatePromptBuilder::default().build(&RunInput::topic("mixture of experts"), None);
        assert!(prompt.contains("TOPIC: mixture of experts"));
        assert!(prompt.contains("exactly 5 action_items"));
        assert!(!prompt.contains("VALIDATION ERRORS"));
    }

    #[test]
    fn corrective_prompt_names_every_issue() {
        let errors = vec![
            issue("quality", ErrorKind::MissingField, "required field is missing"),
            issue(
                "action_items",
                ErrorKind::OutOfRange,
                "must contain exactly 5 items, found 4",
            ),
        ];
        let prompt =
            TemplatePromptBuilder::default().build(&RunInput::topic("rl"), Some(&errors));
        assert!(prompt.contains("VALIDATION ERRORS:"));
        assert!(prompt.contains("the field `quality` is missing"));
        assert!(prompt.contains("the field `action_items` must contain exactly 5 items, found 4"));
        assert!(prompt.trim_end().ends_with("Fix the JSON to satisfy the schema."));
    }

    #[test]
    fn issue_list_is_capped() {
        let config = PipelineConfig::new().with_max_prompt_issues(2);
        let errors: Vec<_> = (0..5)
            .map(|i| issue(&format!("related_works[{i}].year"), ErrorKind::WrongType, "expected integer, found string"))
            .collect();
        let prompt = TemplatePromptBuilder::new(&config).build(&RunInput::topic("t"), Some(&errors));
        assert_eq!(prompt.matches("expected integer").count(), 2);
        assert!(prompt.contains("... and 3 more"));
    }

    #[test]
    fn error_block_is_one_line_per_issue() {
        let config = PipelineConfig::new().with_max_prompt_issues(1);
        let errors = vec![
            issue("quality", ErrorKind::MissingField, "required field is missing"),
            issue("action_items", ErrorKind::OutOfRange, "must contain exactly 5 items, found 4"),
        ];
        let prompt = TemplatePromptBuilder::new(&config).build(&RunInput::topic("t"), Some(&errors));
        assert!(prompt.contains("TOPIC: t\n\n"));
        assert!(prompt.ends_with(
            "VALIDATION ERRORS:\n\
             - the field `quality` is missing; it is required and must be included\n\
             - ... and 1 more\n\
             Fix the JSON to satisfy the schema.\n"
        ));
    }

    #[test]
    fn long_inputs_are_truncated() {
        let config = PipelineConfig::new().with_max_pdf_chars(10);
        let text = "é".repeat(50);
        let prompt = TemplatePromptBuilder::new(&config).build(&RunInput::pdf("p.pdf", text), None);
        assert!(prompt.contains(&"é".repeat(10)));
        assert!(!prompt.contains(&"é".repeat(11)));

        let paper = CandidatePaper {
            title: "T".into(),
            abstract_text: "x".repeat(2000),
            ..CandidatePaper::default()
        };
        let prompt = TemplatePromptBuilder::default()
            .build(&RunInput::topic("t").with_candidates(vec![paper]), None);
        assert!(prompt.contains(&"x".repeat(1200)));
        assert!(!prompt.contains(&"x".repeat(1201)));
    }

    #[test]
    fn instructions_per_kind() {
        let malformed = ValidationIssue::malformed("output is not valid JSON: expected value");
        assert!(corrective_instruction(&malformed).contains("not valid JSON"));
        let enum_issue = issue(
            "action_items[0].priority",
            ErrorKind::InvalidEnum,
            "must be one of: high, medium, low; found \"urgent\"",
        );
        assert_eq!(
            corrective_instruction(&enum_issue),
            "the field `action_items[0].priority` must be one of: high, medium, low; found \"urgent\""
        );
    }
}
