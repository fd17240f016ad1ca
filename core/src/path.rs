#![deny(missing_docs)]

//! # Path Addressing
//!
//! Two string addressing schemes locate a node independently of its
//! [`NodeId`], so a logical parameter can be found again in a cloned or
//! mutated operation.
//!
//! A structural path starts at the tree root: `$["owner"]["tags"][2]`.
//! Named roots (path, query, header and cookie parameters) contribute their
//! own name as the first token; body roots are unnamed. Array elements use
//! their position and the reference element uses `-1`. Candidates of a
//! combined schema use their position and its output schema uses `-1`.
//!
//! A REST path prefixes the structural tokens with a scope:
//! `$["request"]["query"]["limit"]`, `$["request"]["body"]["name"]` or
//! `$["response"]["200"]["body"]["id"]`.

use crate::error::{AppError, AppResult};
use crate::params::{NodeId, NodeKind, Operation, ParameterLocation};
use std::fmt;
use std::str::FromStr;

/// Index used for array reference elements and combined output schemas.
pub const TEMPLATE_INDEX: i64 = -1;

/// One bracketed segment of a path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathToken {
    /// `["name"]`
    Name(String),
    /// `[index]`
    Index(i64),
}

impl fmt::Display for PathToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathToken::Name(name) => {
                f.write_str("[\"")?;
                for c in name.chars() {
                    if c == '"' || c == '\\' {
                        f.write_str("\\")?;
                    }
                    write!(f, "{}", c)?;
                }
                f.write_str("\"]")
            }
            PathToken::Index(index) => write!(f, "[{}]", index),
        }
    }
}

/// A root-relative path of tokens.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct StructuralPath {
    tokens: Vec<PathToken>,
}

impl StructuralPath {
    /// Builds a path from tokens.
    pub fn new(tokens: Vec<PathToken>) -> Self {
        Self { tokens }
    }

    /// The tokens, root first.
    pub fn tokens(&self) -> &[PathToken] {
        &self.tokens
    }
}

impl fmt::Display for StructuralPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("$")?;
        for token in &self.tokens {
            write!(f, "{}", token)?;
        }
        Ok(())
    }
}

impl FromStr for StructuralPath {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self {
            tokens: parse_tokens(s)?,
        })
    }
}

/// Which response body a REST path points into.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ResponseSelector {
    /// The observed response.
    Actual,
    /// The declared response for a status code.
    Status(String),
}

/// The namespace part of a REST path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RestScope {
    /// A request root: path/query/header/cookie parameters or the body.
    Request(ParameterLocation),
    /// A response body.
    Response(ResponseSelector),
}

/// A request/response-scoped path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RestPath {
    /// The namespace.
    pub scope: RestScope,
    /// The structural path inside the scope's root.
    pub path: StructuralPath,
}

impl fmt::Display for RestPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("$")?;
        match &self.scope {
            RestScope::Request(location) => {
                let segment = location.rest_segment().unwrap_or("unknown");
                write!(
                    f,
                    "{}{}",
                    PathToken::Name("request".into()),
                    PathToken::Name(segment.into())
                )?;
            }
            RestScope::Response(selector) => {
                let selector = match selector {
                    ResponseSelector::Actual => "actual".to_string(),
                    ResponseSelector::Status(status) => status.clone(),
                };
                write!(
                    f,
                    "{}{}{}",
                    PathToken::Name("response".into()),
                    PathToken::Name(selector),
                    PathToken::Name("body".into())
                )?;
            }
        }
        for token in self.path.tokens() {
            write!(f, "{}", token)?;
        }
        Ok(())
    }
}

impl FromStr for RestPath {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let tokens = parse_tokens(s)?;
        let invalid = || AppError::InvalidPath(format!("'{}' has no request or response scope", s));
        let name_at = |i: usize| match tokens.get(i) {
            Some(PathToken::Name(name)) => Some(name.as_str()),
            _ => None,
        };

        let (scope, consumed) = match name_at(0) {
            Some("request") => {
                let location = name_at(1)
                    .and_then(ParameterLocation::from_rest_segment)
                    .ok_or_else(invalid)?;
                (RestScope::Request(location), 2)
            }
            Some("response") => {
                let selector = match name_at(1).ok_or_else(invalid)? {
                    "actual" => ResponseSelector::Actual,
                    status => ResponseSelector::Status(status.to_string()),
                };
                if name_at(2) != Some("body") {
                    return Err(invalid());
                }
                (RestScope::Response(selector), 3)
            }
            _ => return Err(invalid()),
        };
        Ok(RestPath {
            scope,
            path: StructuralPath::new(tokens[consumed..].to_vec()),
        })
    }
}

fn parse_tokens(s: &str) -> AppResult<Vec<PathToken>> {
    let invalid = |reason: &str| AppError::InvalidPath(format!("'{}': {}", s, reason));
    let mut chars = s.chars().peekable();
    if chars.next() != Some('$') {
        return Err(invalid("paths start with '$'"));
    }

    let mut tokens = Vec::new();
    while let Some(c) = chars.next() {
        if c != '[' {
            return Err(invalid("expected '['"));
        }
        if chars.peek() == Some(&'"') {
            chars.next();
            let mut name = String::new();
            loop {
                match chars.next() {
                    Some('\\') => match chars.next() {
                        Some(escaped) => name.push(escaped),
                        None => return Err(invalid("dangling escape")),
                    },
                    Some('"') => break,
                    Some(other) => name.push(other),
                    None => return Err(invalid("unterminated name")),
                }
            }
            if chars.next() != Some(']') {
                return Err(invalid("expected ']' after name"));
            }
            tokens.push(PathToken::Name(name));
        } else {
            let mut digits = String::new();
            loop {
                match chars.next() {
                    Some(']') => break,
                    Some(d) => digits.push(d),
                    None => return Err(invalid("unterminated index")),
                }
            }
            let index = digits
                .trim()
                .parse::<i64>()
                .map_err(|_| invalid("index is not an integer"))?;
            tokens.push(PathToken::Index(index));
        }
    }
    Ok(tokens)
}

impl Operation {
    /// Structural path of a node from its tree root.
    pub fn structural_path(&self, id: NodeId) -> AppResult<StructuralPath> {
        let mut tokens = Vec::new();
        let mut current = id;
        loop {
            let node = self.try_node(current)?;
            let Some(parent_id) = node.parent() else {
                if !node.name().is_empty() {
                    tokens.push(PathToken::Name(node.name().raw().to_string()));
                }
                break;
            };
            tokens.push(self.token_in_parent(parent_id, current)?);
            current = parent_id;
        }
        tokens.reverse();
        Ok(StructuralPath { tokens })
    }

    fn token_in_parent(&self, parent_id: NodeId, child: NodeId) -> AppResult<PathToken> {
        let parent = self.try_node(parent_id)?;
        let detached = || {
            AppError::InvalidPath(format!(
                "node {} is not linked into its parent {}",
                child, parent_id
            ))
        };
        let position = |ids: &[NodeId]| ids.iter().position(|id| *id == child);
        let name_token = || {
            self.node(child)
                .map(|n| PathToken::Name(n.name().raw().to_string()))
                .ok_or_else(detached)
        };

        match parent.kind() {
            NodeKind::Array(array) => {
                if array.reference_element == child {
                    return Ok(PathToken::Index(TEMPLATE_INDEX));
                }
                position(&array.elements)
                    .map(|i| PathToken::Index(i as i64))
                    .ok_or_else(detached)
            }
            NodeKind::Object(object) => {
                position(&object.properties).ok_or_else(detached)?;
                name_token()
            }
            kind => {
                let combined = kind.combined().ok_or_else(detached)?;
                if combined.output_schema == Some(child) {
                    return Ok(PathToken::Index(TEMPLATE_INDEX));
                }
                if let Some(i) = position(&combined.candidates) {
                    return Ok(PathToken::Index(i as i64));
                }
                position(&combined.pending_properties).ok_or_else(detached)?;
                name_token()
            }
        }
    }

    /// Finds the node at `path` below `root`.
    ///
    /// A named root must match the path's first token.
    pub fn resolve_structural(&self, root: NodeId, path: &StructuralPath) -> AppResult<NodeId> {
        let root_node = self.try_node(root)?;
        let mut tokens = path.tokens().iter();
        if !root_node.name().is_empty() {
            match tokens.next() {
                Some(PathToken::Name(name)) if name == root_node.name().raw() => {}
                _ => {
                    return Err(AppError::InvalidPath(format!(
                        "{} does not start at root '{}'",
                        path,
                        root_node.name()
                    )))
                }
            }
        }
        let mut current = root;
        for token in tokens {
            current = self.step(current, token).ok_or_else(|| {
                AppError::InvalidPath(format!("{} does not resolve at {}", path, token))
            })?;
        }
        Ok(current)
    }

    fn step(&self, current: NodeId, token: &PathToken) -> Option<NodeId> {
        let node = self.node(current)?;
        match (node.kind(), token) {
            (NodeKind::Array(array), PathToken::Index(TEMPLATE_INDEX)) => {
                Some(array.reference_element)
            }
            (NodeKind::Array(array), PathToken::Index(i)) => {
                array.elements.get(usize::try_from(*i).ok()?).copied()
            }
            (NodeKind::Object(_), PathToken::Name(name)) => self.property(current, name),
            (kind, PathToken::Index(TEMPLATE_INDEX)) => kind.combined()?.output_schema,
            (kind, PathToken::Index(i)) => kind
                .combined()?
                .candidates
                .get(usize::try_from(*i).ok()?)
                .copied(),
            (kind, PathToken::Name(name)) => {
                kind.combined()?;
                self.property(current, name)
            }
        }
    }

    /// REST path of a node attached to one of the operation's roots.
    pub fn rest_path(&self, id: NodeId) -> AppResult<RestPath> {
        let root = self.root_of(id);
        let scope = if self.parameters().contains(&root) {
            RestScope::Request(self.try_node(root)?.location())
        } else if self.request_body() == Some(root) {
            RestScope::Request(ParameterLocation::RequestBody)
        } else if self.actual_response() == Some(root) {
            RestScope::Response(ResponseSelector::Actual)
        } else if let Some((status, _)) = self.responses().iter().find(|(_, r)| **r == root) {
            RestScope::Response(ResponseSelector::Status(status.clone()))
        } else {
            return Err(AppError::InvalidPath(format!(
                "node {} is not attached to operation '{}'",
                id,
                self.operation_id()
            )));
        };
        Ok(RestPath {
            scope,
            path: self.structural_path(id)?,
        })
    }

    /// Finds the node a REST path points at.
    pub fn resolve_rest(&self, path: &RestPath) -> AppResult<NodeId> {
        let missing = || AppError::InvalidPath(format!("{} has no root in '{}'", path, self.operation_id()));
        let root = match &path.scope {
            RestScope::Request(ParameterLocation::RequestBody) => self.request_body(),
            RestScope::Request(location) => match path.path.tokens().first() {
                Some(PathToken::Name(name)) => self.root_parameter(*location, name),
                _ => None,
            },
            RestScope::Response(ResponseSelector::Actual) => self.actual_response(),
            RestScope::Response(ResponseSelector::Status(status)) => {
                self.responses().get(status).copied()
            }
        }
        .ok_or_else(missing)?;
        self.resolve_structural(root, &path.path)
    }

    /// Parses and resolves a REST path string.
    pub fn resolve_rest_str(&self, path: &str) -> AppResult<NodeId> {
        self.resolve_rest(&path.parse()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::ParameterFactory;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_parse_and_print() {
        let path: StructuralPath = r#"$["a\"b"][3][-1]["c"]"#.parse().unwrap();
        assert_eq!(
            path.tokens(),
            &[
                PathToken::Name("a\"b".into()),
                PathToken::Index(3),
                PathToken::Index(-1),
                PathToken::Name("c".into())
            ]
        );
        assert_eq!(path.to_string(), r#"$["a\"b"][3][-1]["c"]"#);
    }

    #[test]
    fn test_malformed_paths_are_rejected() {
        for text in ["", "a", "$[", "$[\"a]", "$[x]", "$[\"a\"]b"] {
            assert!(
                matches!(text.parse::<StructuralPath>(), Err(AppError::InvalidPath(_))),
                "{}",
                text
            );
        }
        assert!("$[\"request\"][\"nowhere\"]".parse::<RestPath>().is_err());
        assert!("$[\"response\"][\"200\"][\"x\"]".parse::<RestPath>().is_err());
    }

    #[test]
    fn test_rest_paths_for_each_scope() {
        let mut op = Operation::new("op", "POST", "/");
        let limit = ParameterFactory::build_from_value(&mut op, None, "limit", ParameterLocation::Query, &json!(3))
            .unwrap();
        op.attach_parameter(limit).unwrap();
        let actual = op.set_actual_response(&json!({"items": [{"id": 1}]})).unwrap();

        let rest = op.rest_path(limit).unwrap();
        assert_eq!(rest.to_string(), r#"$["request"]["query"]["limit"]"#);
        assert_eq!(op.resolve_rest(&rest).unwrap(), limit);

        let items = op.property(actual, "items").unwrap();
        let first = op.structural_path(items).unwrap();
        assert_eq!(first.to_string(), r#"$["items"]"#);
        let NodeKind::Array(array) = op.node(items).unwrap().kind() else {
            panic!("expected an array");
        };
        let id = op.property(array.elements[0], "id").unwrap();
        let rest = op.rest_path(id).unwrap();
        assert_eq!(rest.to_string(), r#"$["response"]["actual"]["body"]["items"][0]["id"]"#);
        assert_eq!(op.resolve_rest_str(&rest.to_string()).unwrap(), id);
    }

    #[test]
    fn test_property_names_stay_unique() {
        let mut op = Operation::new("createPet", "POST", "/pets");
        let body = ParameterFactory::build_from_value(
            &mut op,
            None,
            "",
            ParameterLocation::RequestBody,
            &json!({"name": "Rex"}),
        )
        .unwrap();
        op.attach_request_body(body, "application/json").unwrap();
        let twin = ParameterFactory::build_from_value(
            &mut op,
            None,
            "name",
            ParameterLocation::RequestBody,
            &json!("Max"),
        )
        .unwrap();

        let err = op.add_property(body, twin).unwrap_err();
        assert!(matches!(err, AppError::Creation(_)), "{:?}", err);
        assert!(op.reparent(twin, body).is_err());
        assert!(op.node(twin).is_some());
        assert_eq!(op.children(body).len(), 1);

        let name = op.property(body, "name").unwrap();
        let rest = op.rest_path(name).unwrap();
        assert_eq!(rest.to_string(), r#"$["request"]["body"]["name"]"#);
        assert_eq!(op.resolve_rest(&rest).unwrap(), name);
        assert_eq!(op.to_json(name), Some(json!("Rex")));
    }
}
