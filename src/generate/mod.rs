//! SQL Generation
//!
//! Turns free text into a bare SQL string:
//! 1. Reject blank prompts before any provider call
//! 2. Wrap the caller's text in a fixed instructional prompt
//! 3. Call the [`TextGenerator`] exactly once (no retry, no streaming)
//! 4. Strip Markdown code fences from the reply
//! 5. Substitute [`FALLBACK_SQL`] if nothing is left
//!
//! The prompt wording is not part of the contract.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::{QueryGateError, Result};

pub mod gemini;

pub use gemini::GeminiClient;

/// Returned when the provider's reply is empty after sanitization
pub const FALLBACK_SQL: &str = "Failed to generate SQL query";

const FENCE: &str = "```";

/// External text-generation capability
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Send one prompt and return the raw reply text.
    ///
    /// Provider or network failures must be reported as `Generation`.
    async fn generate(&self, prompt: &str) -> Result<String>;
}

/// Prompt builder, provider call and sanitizer
#[derive(Clone)]
pub struct GenerationAdapter {
    generator: Arc<dyn TextGenerator>,
}

impl GenerationAdapter {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }

    /// Generate executable MySQL text for a natural-language task or a DDL fragment
    pub async fn generate_sql(&self, input: &str) -> Result<String> {
        if input.trim().is_empty() {
            return Err(QueryGateError::validation("No input provided"));
        }

        let prompt = build_prompt(input);
        debug!(prompt_len = prompt.len(), "calling text generator");

        let raw = self.generator.generate(&prompt).await.map_err(|e| {
            warn!(error = %e.details(), "text generation failed");
            e
        })?;

        let sql = sanitize(&raw);
        if sql.trim().is_empty() {
            warn!("generator returned no SQL, using fallback");
            return Ok(FALLBACK_SQL.to_string());
        }

        info!(sql_len = sql.len(), "generated SQL");
        Ok(sql)
    }
}

impl std::fmt::Debug for GenerationAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenerationAdapter").finish_non_exhaustive()
    }
}

/// Wrap caller text in the instructional prompt
#[must_use]
pub fn build_prompt(input: &str) -> String {
    format!(
        "You write SQL for MySQL.\n\
         \n\
         The request below is one of:\n\
         - a natural-language description of the data or change the user wants\n\
         - a schema or DDL fragment, possibly with a task such as adding columns\n\
         \n\
         Request:\n\
         {input}\n\
         \n\
         Rules:\n\
         - For a description, write one executable statement that fulfils it.\n\
         - For a schema, write the SELECT, INSERT, UPDATE, DELETE or ALTER TABLE\n\
         statements its task calls for.\n\
         - When concrete values are given, use them literally.\n\
         - Use MySQL syntax only.\n\
         \n\
         Reply with the SQL only, no explanation.\n"
    )
}

/// Strip Markdown code fences, keeping only the fenced SQL.
///
/// Text without any fence is returned unchanged. Otherwise the contents of every
/// fenced block are joined with newlines; an optional language tag after the
/// opening fence is dropped and an unterminated block runs to the end.
#[must_use]
pub fn sanitize(raw: &str) -> String {
    if !raw.contains(FENCE) {
        return raw.to_string();
    }

    let mut blocks = Vec::new();
    let mut rest = raw;
    while let Some(start) = rest.find(FENCE) {
        let body = skip_language_tag(&rest[start + FENCE.len()..]);
        match body.find(FENCE) {
            Some(end) => {
                blocks.push(body[..end].trim());
                rest = &body[end + FENCE.len()..];
            }
            None => {
                blocks.push(body.trim());
                break;
            }
        }
    }

    blocks.retain(|block| !block.is_empty());
    blocks.join("\n")
}

/// Skip `sql`, `mysql`, `text`, ... right after an opening fence.
///
/// Only known tags are dropped, so a lowercase statement keyword such as
/// "```select\n" stays part of the SQL.
fn skip_language_tag(after_fence: &str) -> &str {
    let tag_len = after_fence
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '+'))
        .unwrap_or(after_fence.len());
    let (tag, remainder) = after_fence.split_at(tag_len);

    if tag.is_empty() {
        return after_fence;
    }

    let ends_line =
        remainder.is_empty() || remainder.starts_with('\n') || remainder.starts_with("\r\n");

    if (ends_line && (is_sql_tag(tag) || is_plain_tag(tag)))
        || (remainder.starts_with(' ') && is_sql_tag(tag))
    {
        remainder
    } else {
        after_fence
    }
}

fn is_sql_tag(tag: &str) -> bool {
    ["sql", "mysql", "mariadb", "plsql", "tsql"]
        .iter()
        .any(|known| tag.eq_ignore_ascii_case(known))
}

fn is_plain_tag(tag: &str) -> bool {
    ["text", "plaintext", "txt"]
        .iter()
        .any(|known| tag.eq_ignore_ascii_case(known))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Canned {
        reply: std::result::Result<String, QueryGateError>,
        calls: AtomicUsize,
    }

    impl Canned {
        fn ok(reply: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: Ok(reply.to_string()),
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl TextGenerator for Canned {
        async fn generate(&self, _prompt: &str) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.reply.clone()
        }
    }

    #[test]
    fn test_sanitize_strips_sql_fence() {
        assert_eq!(
            sanitize("```sql\nSELECT * FROM users WHERE age > 18;\n```"),
            "SELECT * FROM users WHERE age > 18;"
        );
    }

    #[test]
    fn test_sanitize_strips_bare_fence() {
        assert_eq!(sanitize("```\nSELECT 1;\n```\n"), "SELECT 1;");
    }

    #[test]
    fn test_sanitize_inline_fence() {
        assert_eq!(sanitize("```sql SELECT 1```"), "SELECT 1");
        assert_eq!(sanitize("```SELECT 1```"), "SELECT 1");
    }

    #[test]
    fn test_sanitize_without_fence_is_noop() {
        let text = "  SELECT name FROM users;\n";
        assert_eq!(sanitize(text), text);
    }

    #[test]
    fn test_sanitize_keeps_uppercase_statement_after_fence() {
        assert_eq!(sanitize("```SELECT\n* FROM t\n```"), "SELECT\n* FROM t");
    }

    #[test]
    fn test_sanitize_keeps_lowercase_statement_after_fence() {
        assert_eq!(sanitize("```select\n* FROM users\n```"), "select\n* FROM users");
        assert_eq!(sanitize("```update\nt SET a = 1\n```"), "update\nt SET a = 1");
    }

    #[test]
    fn test_sanitize_drops_plain_text_tag() {
        assert_eq!(sanitize("```text\nSELECT 1;\n```"), "SELECT 1;");
        assert_eq!(sanitize("```MySQL\nSELECT 1;\n```"), "SELECT 1;");
    }

    #[test]
    fn test_sanitize_drops_prose_and_joins_blocks() {
        let raw = "Here you go:\n```sql\nCREATE TABLE t (id INT);\n```\n\
                   then\n```mysql\nINSERT INTO t VALUES (1);\n```";
        assert_eq!(sanitize(raw), "CREATE TABLE t (id INT);\nINSERT INTO t VALUES (1);");
    }

    #[test]
    fn test_sanitize_unterminated_fence() {
        assert_eq!(sanitize("```sql\nSELECT 2"), "SELECT 2");
    }

    #[test]
    fn test_prompt_embeds_input() {
        let prompt = build_prompt("list all users over 18");
        assert!(prompt.contains("list all users over 18"));
        assert!(prompt.contains("MySQL"));
    }

    #[tokio::test]
    async fn test_blank_prompt_never_calls_generator() {
        let generator = Canned::ok("SELECT 1");
        let adapter = GenerationAdapter::new(generator.clone());

        let err = adapter.generate_sql("   ").await.unwrap_err();
        assert_eq!(err.error_code(), "VALIDATION_ERROR");
        assert_eq!(generator.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_empty_reply_uses_fallback() {
        let adapter = GenerationAdapter::new(Canned::ok("```sql\n```"));
        assert_eq!(adapter.generate_sql("anything").await.unwrap(), FALLBACK_SQL);
    }

    #[tokio::test]
    async fn test_generator_called_once_and_errors_propagate() {
        let generator = Arc::new(Canned {
            reply: Err(QueryGateError::generation("quota exceeded")),
            calls: AtomicUsize::new(0),
        });
        let adapter = GenerationAdapter::new(generator.clone());

        let err = adapter.generate_sql("count orders").await.unwrap_err();
        assert_eq!(err, QueryGateError::generation("quota exceeded"));
        assert_eq!(generator.calls.load(Ordering::SeqCst), 1);
    }
}
