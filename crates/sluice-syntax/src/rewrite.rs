use std::borrow::Cow;

use sqlparser::dialect::DuckDbDialect;
use sqlparser::parser::Parser;

/// The invocation keyword recognized by the rewriter.
const KEYWORD: &[u8] = b"tee";

/// Expand bare `tee(SELECT ...)` invocations so the subquery argument is
/// parenthesized the way the parser expects a table-valued argument to be:
/// `tee((SELECT ...))`.
///
/// The scan is purely textual and runs on the raw, not-yet-parsed query
/// string. For every whole-word occurrence of the keyword followed by `(`,
/// the argument is wrapped in one extra level of parentheses unless it
/// already starts with `(`. The closing parenthesis is placed where a depth
/// counter seeded at the call's opening parenthesis returns to zero, or
/// appended at end-of-string if the call is never closed.
///
/// Returns `None` when no occurrence was rewritten, without allocating.
///
/// Known limitation: the scan does not understand string literals or
/// comments, so a keyword occurrence inside either is rewritten too. The
/// trial parse in [`preprocess`] is the backstop for the damage this can do.
pub fn expand_tee_calls(query: &str) -> Option<String> {
    let mut rewritten: Option<String> = None;
    let mut cursor = 0;

    loop {
        // Borrow the current text: the rewritten string once an insertion
        // has happened, the original before that.
        let text: &str = rewritten.as_deref().unwrap_or(query);
        let bytes = text.as_bytes();

        let Some(keyword) = find_keyword(bytes, cursor) else {
            break;
        };
        let mut pos = keyword + KEYWORD.len();
        while pos < bytes.len() && bytes[pos].is_ascii_whitespace() {
            pos += 1;
        }
        if pos >= bytes.len() || bytes[pos] != b'(' {
            // Keyword without a call; not an invocation.
            cursor = keyword + KEYWORD.len();
            continue;
        }
        let open = pos;
        pos += 1;
        while pos < bytes.len() && bytes[pos].is_ascii_whitespace() {
            pos += 1;
        }
        if pos < bytes.len() && bytes[pos] == b'(' {
            // The argument is already parenthesized; leave it untouched.
            cursor = open + 1;
            continue;
        }
        let argument_start = pos;

        // Find where the argument ends: depth seeded at 1 for the call's
        // opening parenthesis, returning to 0 at its matching close.
        let mut depth = 1usize;
        let mut close = None;
        while pos < bytes.len() {
            match bytes[pos] {
                b'(' => depth += 1,
                b')' => {
                    depth -= 1;
                    if depth == 0 {
                        close = Some(pos);
                        break;
                    }
                }
                _ => {}
            }
            pos += 1;
        }

        let out = rewritten.get_or_insert_with(|| query.to_owned());
        out.insert(argument_start, '(');
        match close {
            Some(close) => {
                // Shifted by the opening parenthesis just inserted.
                out.insert(close + 1, ')');
                cursor = close + 2;
            }
            None => {
                out.push(')');
                cursor = out.len();
            }
        }
    }

    rewritten
}

/// Preprocess a query, expanding bare tee invocations.
///
/// The rewritten text is trial-parsed before being accepted: if the grammar
/// rejects it, the rewrite is discarded and the original query proceeds
/// through the normal parser, which will produce its own error if the raw
/// text is invalid. A parse failure here is a signal to abstain, never to
/// re-scan.
pub fn preprocess(query: &str) -> Cow<'_, str> {
    match expand_tee_calls(query) {
        Some(rewritten) => match Parser::parse_sql(&DuckDbDialect {}, &rewritten) {
            Ok(_) => Cow::Owned(rewritten),
            Err(e) => {
                tracing::debug!("discarding tee rewrite of {query:?}: {e}");
                Cow::Borrowed(query)
            }
        },
        None => Cow::Borrowed(query),
    }
}

/// Find the next whole-word, case-insensitive occurrence of the keyword.
fn find_keyword(bytes: &[u8], from: usize) -> Option<usize> {
    let mut i = from;
    while i + KEYWORD.len() <= bytes.len() {
        if bytes[i..i + KEYWORD.len()].eq_ignore_ascii_case(KEYWORD) {
            let bounded_before = i == 0 || !is_identifier_char(bytes[i - 1]);
            let after = i + KEYWORD.len();
            let bounded_after = after >= bytes.len() || !is_identifier_char(bytes[after]);
            if bounded_before && bounded_after {
                return Some(i);
            }
        }
        i += 1;
    }
    None
}

fn is_identifier_char(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_occurrence_unchanged() {
        assert_eq!(expand_tee_calls("SELECT * FROM t"), None);
        assert!(matches!(preprocess("SELECT * FROM t"), Cow::Borrowed(_)));
    }

    #[test]
    fn test_keyword_as_identifier_substring() {
        assert_eq!(expand_tee_calls("SELECT * FROM committee(x)"), None);
        assert_eq!(expand_tee_calls("SELECT * FROM teepee(x)"), None);
        assert_eq!(expand_tee_calls("SELECT tee_count FROM t"), None);
    }

    #[test]
    fn test_bare_subquery_gains_one_level() {
        assert_eq!(
            expand_tee_calls("SELECT * FROM tee(SELECT a FROM x)").as_deref(),
            Some("SELECT * FROM tee((SELECT a FROM x))")
        );
    }

    #[test]
    fn test_case_insensitive_keyword() {
        assert_eq!(
            expand_tee_calls("SELECT * FROM TEE(SELECT 1)").as_deref(),
            Some("SELECT * FROM TEE((SELECT 1))")
        );
    }

    #[test]
    fn test_whitespace_before_call() {
        assert_eq!(
            expand_tee_calls("SELECT * FROM tee (SELECT 1)").as_deref(),
            Some("SELECT * FROM tee ((SELECT 1))")
        );
    }

    #[test]
    fn test_multiple_invocations_rewrite_independently() {
        assert_eq!(
            expand_tee_calls("SELECT * FROM tee(SELECT 1) t1, tee(SELECT 2) t2").as_deref(),
            Some("SELECT * FROM tee((SELECT 1)) t1, tee((SELECT 2)) t2")
        );
    }

    #[test]
    fn test_nested_parens_in_argument() {
        assert_eq!(
            expand_tee_calls("SELECT * FROM tee(SELECT (1 + (2)) AS a)").as_deref(),
            Some("SELECT * FROM tee((SELECT (1 + (2)) AS a))")
        );
    }

    #[test]
    fn test_unclosed_call_appends_close() {
        assert_eq!(
            expand_tee_calls("SELECT * FROM tee(SELECT 1").as_deref(),
            Some("SELECT * FROM tee((SELECT 1))")
        );
    }

    #[test]
    fn test_already_wrapped_untouched() {
        assert_eq!(expand_tee_calls("SELECT * FROM tee((SELECT 1))"), None);
        assert_eq!(
            expand_tee_calls("SELECT * FROM tee((SELECT 42), path := 'out.csv')"),
            None
        );
    }

    #[test]
    fn test_keyword_without_call_untouched() {
        assert_eq!(expand_tee_calls("SELECT tee FROM t"), None);
    }

    #[test]
    fn test_rewritten_text_reparses() {
        let rewritten = preprocess("SELECT * FROM tee(SELECT a FROM x)");
        assert_eq!(rewritten, "SELECT * FROM tee((SELECT a FROM x))");
        assert!(parse_ok(&rewritten));
    }

    #[test]
    fn test_rewrite_with_options_after_bare_subquery() {
        // The bare form with trailing options wraps through to the call's
        // close. The scan is syntax-unaware; whatever survives the trial
        // parse is rejected by the binder instead.
        let rewritten = expand_tee_calls("SELECT * FROM tee(SELECT 1, path := 'x')");
        assert_eq!(
            rewritten.as_deref(),
            Some("SELECT * FROM tee((SELECT 1, path := 'x'))")
        );
    }

    #[test]
    fn test_trial_parse_failure_abstains() {
        // The rewritten form `tee((SELECT FROM))` does not parse, so the
        // original text must come back borrowed.
        let original = "SELECT * FROM tee(SELECT FROM)";
        let result = preprocess(original);
        assert!(matches!(result, Cow::Borrowed(_)));
        assert_eq!(result, original);
    }

    fn parse_ok(query: &str) -> bool {
        Parser::parse_sql(&DuckDbDialect {}, query).is_ok()
    }
}
