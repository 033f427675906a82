/// Keywords that may not appear anywhere in a generated lookup statement.
const FORBIDDEN_KEYWORDS: &[&str] = &[
    "insert", "update", "delete", "drop", "alter", "create", "attach", "detach", "pragma",
    "vacuum", "reindex", "truncate", "grant", "revoke", "begin", "commit", "rollback",
    "savepoint", "release", "analyze",
];

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GuardrailDecision {
    Allow { statement: String },
    Deny { reason_code: &'static str, user_message: String },
}

/// Screens model-generated SQL before it reaches the read-only executor.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QueryGuard {
    pub max_statement_len: usize,
}

impl Default for QueryGuard {
    fn default() -> Self {
        Self { max_statement_len: 4_000 }
    }
}

impl QueryGuard {
    pub fn evaluate(&self, raw: &str) -> GuardrailDecision {
        let statement = strip_code_fence(raw).trim().trim_end_matches(';').trim().to_string();

        if statement.is_empty() {
            return deny("empty_statement", "The lookup did not produce a query.");
        }

        if statement.len() > self.max_statement_len {
            return deny("statement_too_long", "The generated query was too long to run safely.");
        }

        let bare = blank_quoted(&statement).to_ascii_lowercase();

        if bare.contains(';') {
            return deny("multiple_statements", "Only a single query statement can be run.");
        }

        if bare.contains("--") || bare.contains("/*") {
            return deny("comment_in_statement", "Queries containing comments are not run.");
        }

        let first_word = bare.split_whitespace().next().unwrap_or_default();
        if first_word != "select" && first_word != "with" {
            return deny("not_a_read", "Only read-only SELECT queries can be run.");
        }

        let forbidden = words(&bare).find(|word| FORBIDDEN_KEYWORDS.contains(word));
        if let Some(keyword) = forbidden {
            return GuardrailDecision::Deny {
                reason_code: "write_keyword",
                user_message: format!(
                    "The generated query used `{keyword}`, which is not allowed."
                ),
            };
        }

        GuardrailDecision::Allow { statement }
    }
}

fn deny(reason_code: &'static str, user_message: &str) -> GuardrailDecision {
    GuardrailDecision::Deny { reason_code, user_message: user_message.to_string() }
}

/// Replaces the contents of string literals and quoted identifiers with spaces.
/// A doubled quote closes and reopens the literal, so escapes need no special case.
fn blank_quoted(statement: &str) -> String {
    let mut open: Option<char> = None;
    statement
        .chars()
        .map(|ch| match open {
            Some(quote) if ch == quote => {
                open = None;
                ch
            }
            Some(_) => ' ',
            None => {
                if ch == '\'' || ch == '"' {
                    open = Some(ch);
                }
                ch
            }
        })
        .collect()
}

/// Splits on anything that cannot be part of an identifier.
fn words(statement: &str) -> impl Iterator<Item = &str> {
    statement
        .split(|ch: char| !(ch.is_ascii_alphanumeric() || ch == '_'))
        .filter(|word| !word.is_empty())
}

fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(inner) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let inner = inner.strip_suffix("```").unwrap_or(inner);
    let inner = inner.trim_start();
    inner.strip_prefix("sqlite").or_else(|| inner.strip_prefix("sql")).unwrap_or(inner)
}
