//! Query predicates in the content API's `q` syntax
//!
//! Each predicate renders as `[at(path, value)]` and a query wraps the
//! list in one more pair of brackets, e.g. `[[at(document.type, "posts")]]`.

use serde_json::Value;

/// Field equals value
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    path: String,
    value: Value,
}

impl Predicate {
    pub fn at(path: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            path: path.into(),
            value: value.into(),
        }
    }

    /// Predicate selecting every document of a custom type
    pub fn document_type(doc_type: &str) -> Self {
        Self::at("document.type", doc_type)
    }

    /// Predicate selecting a document by its unique identifier
    pub fn uid(doc_type: &str, uid: &str) -> Self {
        Self::at(format!("my.{}.uid", doc_type), uid)
    }

    /// Render as `[at(path, value)]`
    pub fn render(&self) -> String {
        format!("[at({}, {})]", self.path, self.value)
    }
}

/// Render a full `q` parameter
pub fn query_string(predicates: &[Predicate]) -> String {
    let inner: String = predicates.iter().map(Predicate::render).collect();
    format!("[{}]", inner)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_at() {
        assert_eq!(
            Predicate::document_type("posts").render(),
            r#"[at(document.type, "posts")]"#
        );
    }

    #[test]
    fn test_render_uid_escapes_quotes() {
        assert_eq!(
            Predicate::uid("posts", "hello-world").render(),
            r#"[at(my.posts.uid, "hello-world")]"#
        );
        assert_eq!(
            Predicate::at("my.posts.author", "a \"b\"").render(),
            r#"[at(my.posts.author, "a \"b\"")]"#
        );
    }

    #[test]
    fn test_query_string() {
        let q = query_string(&[
            Predicate::document_type("posts"),
            Predicate::uid("posts", "hello"),
        ]);
        assert_eq!(
            q,
            r#"[[at(document.type, "posts")][at(my.posts.uid, "hello")]]"#
        );
        assert_eq!(query_string(&[]), "[]");
    }
}
