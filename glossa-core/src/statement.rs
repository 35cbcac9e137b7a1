//! RDF statements as returned by the query executor.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Object (or subject) position of a statement.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Term {
    Iri(String),
    BlankNode(String),
    Literal {
        value: String,
        /// Language tag without the `@`. `None` for untagged literals.
        language: Option<String>,
        datatype: Option<String>,
    },
}

impl Term {
    pub fn iri(value: impl Into<String>) -> Self {
        Term::Iri(value.into())
    }

    /// Plain literal, optionally language-tagged. An empty tag counts as no tag.
    pub fn literal(value: impl Into<String>, language: Option<&str>) -> Self {
        Term::Literal {
            value: value.into(),
            language: language.filter(|l| !l.is_empty()).map(str::to_string),
            datatype: None,
        }
    }

    /// The lexical value of a literal, `None` for IRIs and blank nodes.
    pub fn literal_value(&self) -> Option<&str> {
        match self {
            Term::Literal { value, .. } => Some(value),
            _ => None,
        }
    }

    /// Language tag of a literal, `None` when absent or not a literal.
    pub fn language(&self) -> Option<&str> {
        match self {
            Term::Literal { language, .. } => language.as_deref(),
            _ => None,
        }
    }

    /// The string value regardless of kind.
    pub fn value(&self) -> &str {
        match self {
            Term::Iri(v) | Term::BlankNode(v) => v,
            Term::Literal { value, .. } => value,
        }
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::Iri(iri) => write!(f, "<{}>", iri),
            Term::BlankNode(id) => write!(f, "_:{}", id),
            Term::Literal {
                value,
                language,
                datatype,
            } => {
                write!(f, "{:?}", value)?;
                if let Some(lang) = language {
                    write!(f, "@{}", lang)
                } else if let Some(dt) = datatype {
                    write!(f, "^^<{}>", dt)
                } else {
                    Ok(())
                }
            }
        }
    }
}

/// One RDF triple.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Statement {
    pub subject: String,
    pub predicate: String,
    pub object: Term,
}

impl Statement {
    pub fn new(subject: impl Into<String>, predicate: impl Into<String>, object: Term) -> Self {
        Self {
            subject: subject.into(),
            predicate: predicate.into(),
            object,
        }
    }

    /// Shorthand for a statement whose object is a (possibly tagged) literal.
    pub fn literal(
        subject: impl Into<String>,
        predicate: impl Into<String>,
        value: impl Into<String>,
        language: Option<&str>,
    ) -> Self {
        Self::new(subject, predicate, Term::literal(value, language))
    }
}
