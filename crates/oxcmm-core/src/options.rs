//! Filter options
//!
//! Options are a JSON object tree. Leaves are addressed with slash
//! separated paths such as `org/oxcmm/imaging/icc_color/rendering_intent`,
//! which is also the shape the settings store consumes.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::module::registration_match;

/// Option tree
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Options {
    tree: Value,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            tree: Value::Object(Map::new()),
        }
    }
}

fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|segment| !segment.is_empty())
}

impl From<Map<String, Value>> for Options {
    fn from(tree: Map<String, Value>) -> Self {
        Self {
            tree: Value::Object(tree),
        }
    }
}

impl Options {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json_str(text: &str) -> Result<Self> {
        let tree: Value = serde_json::from_str(text)?;
        if !tree.is_object() {
            return Err(Error::Config("options must be a JSON object".into()));
        }
        Ok(Self { tree })
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.tree)?)
    }

    pub fn as_json(&self) -> &Value {
        &self.tree
    }

    pub fn is_empty(&self) -> bool {
        self.tree.as_object().is_none_or(Map::is_empty)
    }

    /// Node at `path`; the empty path is the root
    pub fn get(&self, path: &str) -> Option<&Value> {
        segments(path).try_fold(&self.tree, |node, segment| node.get(segment))
    }

    pub fn get_i64(&self, path: &str) -> Option<i64> {
        self.get(path)?.as_i64()
    }

    pub fn get_f64(&self, path: &str) -> Option<f64> {
        self.get(path)?.as_f64()
    }

    pub fn get_bool(&self, path: &str) -> Option<bool> {
        self.get(path)?.as_bool()
    }

    pub fn get_str(&self, path: &str) -> Option<&str> {
        self.get(path)?.as_str()
    }

    /// Set a leaf, creating intermediate objects.
    ///
    /// Fails when a segment on the way is a leaf already.
    pub fn set(&mut self, path: &str, value: impl Into<Value>) -> Result<()> {
        let parts: Vec<&str> = segments(path).collect();
        let Some((last, parents)) = parts.split_last() else {
            return Err(Error::Config(format!("empty option path '{path}'")));
        };
        let mut node = &mut self.tree;
        for segment in parents {
            node = node
                .as_object_mut()
                .ok_or_else(|| Error::Config(format!("'{path}': '{segment}' lies below a leaf")))?
                .entry(segment.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
        }
        node.as_object_mut()
            .ok_or_else(|| Error::Config(format!("'{path}': '{last}' lies below a leaf")))?
            .insert(last.to_string(), value.into());
        Ok(())
    }

    pub fn remove(&mut self, path: &str) -> Option<Value> {
        let parts: Vec<&str> = segments(path).collect();
        let (last, parents) = parts.split_last()?;
        let mut node = &mut self.tree;
        for segment in parents {
            node = node.get_mut(*segment)?;
        }
        node.as_object_mut()?.remove(*last)
    }

    /// All leaves with their full paths, in path order
    pub fn leaves(&self) -> Vec<(String, &Value)> {
        fn walk<'a>(prefix: &str, node: &'a Value, out: &mut Vec<(String, &'a Value)>) {
            match node.as_object() {
                Some(map) => {
                    for (key, child) in map {
                        let path = if prefix.is_empty() {
                            key.clone()
                        } else {
                            format!("{prefix}/{key}")
                        };
                        walk(&path, child, out);
                    }
                }
                None => out.push((prefix.to_string(), node)),
            }
        }
        let mut out = Vec::new();
        walk("", &self.tree, &mut out);
        out.sort_by(|a, b| a.0.cmp(&b.0));
        out
    }

    /// Best ranked leaf whose path matches a registration pattern.
    ///
    /// `find("rendering_intent")` locates the key wherever it lives.
    pub fn find(&self, pattern: &str) -> Option<(String, &Value)> {
        let mut best: Option<(u32, String, &Value)> = None;
        for (path, value) in self.leaves() {
            let rank = registration_match(&path, pattern, None);
            if rank > 0 && best.as_ref().is_none_or(|(r, _, _)| rank > *r) {
                best = Some((rank, path, value));
            }
        }
        best.map(|(_, path, value)| (path, value))
    }

    /// Merge `overrides` into a copy of `self`; overrides win on equal keys.
    pub fn combine(&self, overrides: &Options) -> Options {
        let mut tree = self.tree.clone();
        merge(&mut tree, &overrides.tree);
        Options { tree }
    }

    /// Subtree below `path` as its own option set
    pub fn subtree(&self, path: &str) -> Options {
        match self.get(path) {
            Some(node @ Value::Object(_)) => Options { tree: node.clone() },
            _ => Options::default(),
        }
    }
}

fn merge(base: &mut Value, overrides: &Value) {
    match (base, overrides) {
        (Value::Object(base), Value::Object(overrides)) => {
            for (key, value) in overrides {
                match base.get_mut(key) {
                    Some(existing) => merge(existing, value),
                    None => {
                        base.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (base, overrides) => *base = overrides.clone(),
    }
}

impl fmt::Debug for Options {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Options({})", self.tree)
    }
}

impl fmt::Display for Options {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tree)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_set_get() {
        let mut options = Options::new();
        options
            .set("org/oxcmm/imaging/icc_color/rendering_intent", 1)
            .unwrap();
        options.set("org/oxcmm/imaging/icc_color/cmm", "moxc").unwrap();
        assert_eq!(options.get_i64("org/oxcmm/imaging/icc_color/rendering_intent"), Some(1));
        assert_eq!(options.get_str("/org/oxcmm/imaging/icc_color/cmm"), Some("moxc"));
        assert!(options.set("org/oxcmm/imaging/icc_color/cmm/x", 2).is_err());
        assert_eq!(options.remove("org/oxcmm/imaging/icc_color/cmm"), Some(json!("moxc")));
        assert_eq!(options.get("org/oxcmm/imaging/icc_color/cmm"), None);
    }

    #[test]
    fn test_from_map() {
        let mut tree = Map::new();
        tree.insert("cmm".into(), json!("moxc"));
        let options = Options::from(tree);
        assert_eq!(options.get_str("cmm"), Some("moxc"));
        assert!(!options.is_empty());
    }

    #[test]
    fn test_combine_overrides_win() {
        let defaults = Options::from_json_str(
            r#"{"org":{"oxcmm":{"icc":{"rendering_intent":0,"bpc":true}}}}"#,
        )
        .unwrap();
        let mut user = Options::new();
        user.set("org/oxcmm/icc/rendering_intent", 3).unwrap();

        let effective = defaults.combine(&user);
        assert_eq!(effective.get_i64("org/oxcmm/icc/rendering_intent"), Some(3));
        assert_eq!(effective.get_bool("org/oxcmm/icc/bpc"), Some(true));
        // inputs untouched
        assert_eq!(defaults.get_i64("org/oxcmm/icc/rendering_intent"), Some(0));
    }

    #[test]
    fn test_find_by_key() {
        let mut options = Options::new();
        options.set("org/oxcmm/icc/rendering_intent", 2).unwrap();
        options.set("org/oxcmm/icc/precision", 16).unwrap();
        let (path, value) = options.find("rendering_intent").unwrap();
        assert_eq!(path, "org/oxcmm/icc/rendering_intent");
        assert_eq!(value, &json!(2));
        assert!(options.find("gamut_warning").is_none());
    }

    #[test]
    fn test_json_roundtrip() {
        let mut options = Options::new();
        options.set("a/b", json!([1, 2])).unwrap();
        let text = options.to_json_string().unwrap();
        assert_eq!(text, r#"{"a":{"b":[1,2]}}"#);
        assert_eq!(Options::from_json_str(&text).unwrap(), options);
        assert!(Options::from_json_str("[1]").is_err());
        assert_eq!(options.leaves().len(), 1);
        assert_eq!(options.subtree("a").get("b"), Some(&json!([1, 2])));
    }
}
