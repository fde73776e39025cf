//! Named join definitions between relations.
//!
//! An `AssociationSet` is built once during configuration, wrapped in an
//! `Arc` and handed to every relation that needs symbolic joins. After
//! that it is only ever read.

use serde::{Deserialize, Serialize};

use crate::error::{RelqError, RelqResult};
use crate::expr::predicate::Predicate;
use crate::query::{JoinClause, JoinKind};
use crate::schema::did_you_mean;

/// A named, directed join definition from a source relation to a target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Association {
    /// Name used at the join call site.
    pub name: String,
    /// Relation the association is defined on.
    pub source: String,
    /// Relation the association points at.
    pub target: String,
    /// `(source column, target column)` pairs; composite keys keep their
    /// declaration order.
    pub keys: Vec<(String, String)>,
    /// Join kind used when the call site does not force one.
    #[serde(default = "default_kind")]
    pub kind: JoinKind,
    /// Static restriction ANDed onto the join condition.
    #[serde(default)]
    pub filter: Option<Predicate>,
}

fn default_kind() -> JoinKind {
    JoinKind::Inner
}

impl Association {
    /// Define an association; the target defaults to the association
    /// name until `target` overrides it.
    pub fn new(source: impl Into<String>, name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            target: name.clone(),
            name,
            source: source.into(),
            keys: Vec::new(),
            kind: JoinKind::Inner,
            filter: None,
        }
    }

    /// Point at a target relation different from the association name.
    pub fn target(mut self, target: impl Into<String>) -> Self {
        self.target = target.into();
        self
    }

    /// Add a `(source column, target column)` key pair.
    pub fn key(mut self, source_col: impl Into<String>, target_col: impl Into<String>) -> Self {
        self.keys.push((source_col.into(), target_col.into()));
        self
    }

    /// Set the default join kind.
    pub fn kind(mut self, kind: JoinKind) -> Self {
        self.kind = kind;
        self
    }

    /// Restrict joined rows with a static predicate.
    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.filter = Some(predicate);
        self
    }

    /// Build the join clause this association resolves to. An empty key
    /// list never joins meaningfully and is rejected.
    pub fn join_clause(&self, forced_kind: Option<JoinKind>) -> RelqResult<JoinClause> {
        if self.keys.is_empty() {
            return Err(RelqError::InvalidArgument(format!(
                "association '{}' on '{}' has no join keys",
                self.name, self.source
            )));
        }
        Ok(JoinClause {
            kind: forced_kind.unwrap_or(self.kind),
            table: self.target.clone(),
            keys: self.keys.clone(),
            filter: self.filter.clone(),
        })
    }
}

/// Registry of relations and the associations defined between them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssociationSet {
    relations: Vec<String>,
    associations: Vec<Association>,
}

impl AssociationSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a relation name; the registered names are the universe
    /// join targets must live in.
    pub fn relation(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        if !self.relations.contains(&name) {
            self.relations.push(name);
        }
        self
    }

    /// Register an association. Re-registering the same `(source, name)`
    /// replaces the earlier definition.
    pub fn associate(mut self, assoc: Association) -> Self {
        if let Some(existing) = self
            .associations
            .iter_mut()
            .find(|a| a.source == assoc.source && a.name == assoc.name)
        {
            *existing = assoc;
        } else {
            self.associations.push(assoc);
        }
        self
    }

    pub fn has_relation(&self, name: &str) -> bool {
        self.relations.iter().any(|r| r == name)
    }

    /// Resolve `(source, name)` to an association. Unknown names fail
    /// with a did-you-mean over the source's association names; a hit
    /// whose target relation was never registered is also an error.
    pub fn lookup(&self, source: &str, name: &str) -> RelqResult<&Association> {
        match self
            .associations
            .iter()
            .find(|a| a.source == source && a.name == name)
        {
            Some(assoc) => {
                if !self.has_relation(&assoc.target) {
                    return Err(RelqError::InvalidArgument(format!(
                        "association '{}' targets unregistered relation '{}'",
                        assoc.name, assoc.target
                    )));
                }
                Ok(assoc)
            }
            None => {
                let suggestion = did_you_mean(
                    name,
                    self.associations
                        .iter()
                        .filter(|a| a.source == source)
                        .map(|a| a.name.as_str()),
                );
                Err(RelqError::association_not_found(source, name, suggestion))
            }
        }
    }
}
