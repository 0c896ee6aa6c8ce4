//! In-memory document
//!
//! Arena-backed [`LiveTree`] loaded from a JSON snapshot of a rendered page.
//! Used by the CLI to run passes offline and by tests as the fake host.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

use super::{ComputedStyle, LiveTree, MutationRecord, NodeId, TreeError, TreeResult};
use crate::constants::tree::TEXT_TAG;

/// Serialized page: location plus the node tree
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub location: String,
    pub root: NodeSnapshot,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub stylesheets: BTreeMap<String, String>,
}

/// One serialized node
///
/// `style` holds the properties the rendering engine resolved for the node.
/// `text` on an element is shorthand for a leading text child.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeSnapshot {
    pub tag: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attrs: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub style: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<NodeSnapshot>,
}

#[derive(Debug, Clone)]
struct NodeData {
    tag: String,
    attrs: BTreeMap<String, String>,
    computed: BTreeMap<String, String>,
    text: Option<String>,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    attached: bool,
}

impl NodeData {
    fn new(tag: &str, parent: Option<NodeId>) -> Self {
        Self {
            tag: tag.to_ascii_lowercase(),
            attrs: BTreeMap::new(),
            computed: BTreeMap::new(),
            text: None,
            parent,
            children: Vec::new(),
            attached: true,
        }
    }
}

/// Parsed `style` attribute declaration
#[derive(Debug, Clone, PartialEq, Eq)]
struct Declaration {
    name: String,
    value: String,
    important: bool,
}

fn parse_inline(style: &str) -> Vec<Declaration> {
    style
        .split(';')
        .filter_map(|part| {
            let (name, value) = part.split_once(':')?;
            let name = name.trim().to_ascii_lowercase();
            if name.is_empty() {
                return None;
            }
            let value = value.trim();
            let (value, important) = match value.strip_suffix("!important") {
                Some(stripped) => (stripped.trim_end(), true),
                None => (value, false),
            };
            Some(Declaration {
                name,
                value: value.to_string(),
                important,
            })
        })
        .collect()
}

fn format_inline(decls: &[Declaration]) -> String {
    decls
        .iter()
        .map(|d| {
            if d.important {
                format!("{}: {} !important;", d.name, d.value)
            } else {
                format!("{}: {};", d.name, d.value)
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<NodeData>,
    root: NodeId,
    location: String,
    stylesheets: BTreeMap<String, String>,
    mutations: Vec<MutationRecord>,
}

impl Document {
    pub fn new(location: &str, root_tag: &str) -> Self {
        Self {
            nodes: vec![NodeData::new(root_tag, None)],
            root: NodeId(0),
            location: location.to_string(),
            stylesheets: BTreeMap::new(),
            mutations: Vec::new(),
        }
    }

    pub fn from_snapshot(snapshot: &Snapshot) -> Self {
        let mut doc = Self::new(&snapshot.location, &snapshot.root.tag);
        doc.stylesheets = snapshot.stylesheets.clone();
        let root = doc.root;
        doc.fill(root, &snapshot.root);
        doc.mutations.clear();
        doc
    }

    pub fn from_json(contents: &str) -> Result<Self> {
        let snapshot: Snapshot =
            serde_json::from_str(contents).context("Failed to parse document snapshot")?;
        let doc = Self::from_snapshot(&snapshot);
        debug!(nodes = doc.nodes.len(), location = %doc.location, "Loaded document snapshot");
        Ok(doc)
    }

    fn fill(&mut self, id: NodeId, snapshot: &NodeSnapshot) {
        let idx = id.0 as usize;
        if snapshot.tag == TEXT_TAG {
            self.nodes[idx].text = Some(snapshot.text.clone().unwrap_or_default());
            return;
        }
        self.nodes[idx].attrs = snapshot.attrs.clone();
        self.nodes[idx].computed = snapshot.style.clone();
        if let Some(text) = &snapshot.text {
            let text_id = self.push(TEXT_TAG, id);
            self.nodes[text_id.0 as usize].text = Some(text.clone());
        }
        for child in &snapshot.children {
            let child_id = self.push(&child.tag, id);
            self.fill(child_id, child);
        }
    }

    fn push(&mut self, tag: &str, parent: NodeId) -> NodeId {
        let id = NodeId(self.nodes.len() as u64);
        self.nodes.push(NodeData::new(tag, Some(parent)));
        self.nodes[parent.0 as usize].children.push(id);
        id
    }

    pub fn to_snapshot(&self) -> Snapshot {
        Snapshot {
            location: self.location.clone(),
            root: self.node_snapshot(self.root),
            stylesheets: self.stylesheets.clone(),
        }
    }

    fn node_snapshot(&self, id: NodeId) -> NodeSnapshot {
        let data = &self.nodes[id.0 as usize];
        NodeSnapshot {
            tag: data.tag.clone(),
            attrs: data.attrs.clone(),
            style: data.computed.clone(),
            text: data.text.clone(),
            children: data.children.iter().map(|c| self.node_snapshot(*c)).collect(),
        }
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(&self.to_snapshot()).context("Failed to serialize document")
    }

    fn node(&self, id: NodeId) -> TreeResult<&NodeData> {
        let data = self
            .nodes
            .get(id.0 as usize)
            .ok_or(TreeError::UnknownNode(id))?;
        if !data.attached {
            return Err(TreeError::Detached(id));
        }
        Ok(data)
    }

    fn node_mut(&mut self, id: NodeId) -> TreeResult<&mut NodeData> {
        let data = self
            .nodes
            .get_mut(id.0 as usize)
            .ok_or(TreeError::UnknownNode(id))?;
        if !data.attached {
            return Err(TreeError::Detached(id));
        }
        Ok(data)
    }

    // === Host-side mutation (recorded) ===

    pub fn append_element(&mut self, parent: NodeId, tag: &str, attrs: &[(&str, &str)]) -> TreeResult<NodeId> {
        self.node(parent)?;
        let id = self.push(tag, parent);
        for (name, value) in attrs {
            self.nodes[id.0 as usize]
                .attrs
                .insert(name.to_string(), value.to_string());
        }
        self.mutations.push(MutationRecord::ChildList {
            target: parent,
            added: vec![id],
            removed: Vec::new(),
        });
        Ok(id)
    }

    pub fn append_text(&mut self, parent: NodeId, text: &str) -> TreeResult<NodeId> {
        let id = self.append_element(parent, TEXT_TAG, &[])?;
        self.nodes[id.0 as usize].text = Some(text.to_string());
        Ok(id)
    }

    pub fn set_attribute(&mut self, node: NodeId, name: &str, value: &str) -> TreeResult<()> {
        self.node_mut(node)?
            .attrs
            .insert(name.to_string(), value.to_string());
        self.mutations.push(MutationRecord::Attributes {
            target: node,
            name: name.to_string(),
        });
        Ok(())
    }

    pub fn set_text(&mut self, node: NodeId, text: &str) -> TreeResult<()> {
        let data = self.node_mut(node)?;
        if data.tag != TEXT_TAG {
            return Err(TreeError::Inconsistent(format!("{node} is not a text node")));
        }
        data.text = Some(text.to_string());
        self.mutations.push(MutationRecord::CharacterData { target: node });
        Ok(())
    }

    /// Set a resolved (engine-computed) property; not a host mutation
    pub fn set_computed(&mut self, node: NodeId, name: &str, value: &str) -> TreeResult<()> {
        self.node_mut(node)?
            .computed
            .insert(name.to_string(), value.to_string());
        Ok(())
    }

    /// Remove `node` and its subtree; later calls on them fail with `Detached`
    pub fn detach(&mut self, node: NodeId) -> TreeResult<()> {
        if node == self.root {
            return Err(TreeError::Inconsistent("cannot detach the root".to_string()));
        }
        let parent = self.node(node)?.parent;
        if let Some(parent) = parent {
            self.node_mut(parent)?.children.retain(|c| *c != node);
            self.mutations.push(MutationRecord::ChildList {
                target: parent,
                added: Vec::new(),
                removed: vec![node],
            });
        }
        let mut stack = vec![node];
        while let Some(id) = stack.pop() {
            let data = &mut self.nodes[id.0 as usize];
            data.attached = false;
            stack.extend(data.children.iter().copied());
        }
        Ok(())
    }

    pub fn set_location(&mut self, location: &str) {
        self.location = location.to_string();
    }

    /// Drain recorded mutations, oldest first
    pub fn take_mutations(&mut self) -> Vec<MutationRecord> {
        std::mem::take(&mut self.mutations)
    }

    pub fn stylesheet(&self, marker: &str) -> Option<&str> {
        self.stylesheets.get(marker).map(String::as_str)
    }

    /// All attached nodes whose attribute `name` equals `value`
    pub fn find_by_attribute(&self, name: &str, value: &str) -> Vec<NodeId> {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, data)| data.attached && data.attrs.get(name).map(String::as_str) == Some(value))
            .map(|(idx, _)| NodeId(idx as u64))
            .collect()
    }

    fn declarations(&self, node: NodeId) -> TreeResult<Vec<Declaration>> {
        Ok(self
            .node(node)?
            .attrs
            .get("style")
            .map(|s| parse_inline(s))
            .unwrap_or_default())
    }

    fn write_declarations(&mut self, node: NodeId, decls: &[Declaration]) -> TreeResult<()> {
        let data = self.node_mut(node)?;
        if decls.is_empty() {
            data.attrs.remove("style");
        } else {
            data.attrs.insert("style".to_string(), format_inline(decls));
        }
        self.mutations.push(MutationRecord::Attributes {
            target: node,
            name: "style".to_string(),
        });
        Ok(())
    }

    fn classes(&self, node: NodeId) -> TreeResult<Vec<String>> {
        Ok(self
            .node(node)?
            .attrs
            .get("class")
            .map(|c| c.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default())
    }

    fn write_classes(&mut self, node: NodeId, classes: &[String]) -> TreeResult<()> {
        let data = self.node_mut(node)?;
        if classes.is_empty() {
            data.attrs.remove("class");
        } else {
            data.attrs.insert("class".to_string(), classes.join(" "));
        }
        self.mutations.push(MutationRecord::Attributes {
            target: node,
            name: "class".to_string(),
        });
        Ok(())
    }
}

impl LiveTree for Document {
    fn root(&self) -> NodeId {
        self.root
    }

    fn location(&self) -> String {
        self.location.clone()
    }

    fn children(&self, node: NodeId) -> TreeResult<Vec<NodeId>> {
        Ok(self.node(node)?.children.clone())
    }

    fn parent(&self, node: NodeId) -> TreeResult<Option<NodeId>> {
        Ok(self.node(node)?.parent)
    }

    fn tag(&self, node: NodeId) -> TreeResult<String> {
        Ok(self.node(node)?.tag.clone())
    }

    fn attribute(&self, node: NodeId, name: &str) -> TreeResult<Option<String>> {
        Ok(self.node(node)?.attrs.get(name).cloned())
    }

    fn text(&self, node: NodeId) -> TreeResult<Option<String>> {
        Ok(self.node(node)?.text.clone())
    }

    fn computed_style(&self, node: NodeId) -> TreeResult<ComputedStyle> {
        let data = self.node(node)?;
        let inline = self.declarations(node)?;
        let props = data
            .computed
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .chain(inline.iter().map(|d| (d.name.as_str(), d.value.as_str())));
        Ok(ComputedStyle::from_properties(props))
    }

    fn has_class(&self, node: NodeId, class: &str) -> TreeResult<bool> {
        Ok(self.classes(node)?.iter().any(|c| c == class))
    }

    fn add_class(&mut self, node: NodeId, class: &str) -> TreeResult<()> {
        let mut classes = self.classes(node)?;
        if classes.iter().any(|c| c == class) {
            return Ok(());
        }
        classes.push(class.to_string());
        self.write_classes(node, &classes)
    }

    fn remove_class(&mut self, node: NodeId, class: &str) -> TreeResult<()> {
        let mut classes = self.classes(node)?;
        let before = classes.len();
        classes.retain(|c| c != class);
        if classes.len() == before {
            return Ok(());
        }
        self.write_classes(node, &classes)
    }

    fn style_property(&self, node: NodeId, name: &str) -> TreeResult<Option<String>> {
        Ok(self
            .declarations(node)?
            .into_iter()
            .find(|d| d.name == name)
            .map(|d| {
                if d.important {
                    format!("{} !important", d.value)
                } else {
                    d.value
                }
            }))
    }

    fn set_style_property(&mut self, node: NodeId, name: &str, value: &str, important: bool) -> TreeResult<()> {
        let mut decls = self.declarations(node)?;
        let decl = Declaration {
            name: name.to_ascii_lowercase(),
            value: value.to_string(),
            important,
        };
        match decls.iter_mut().find(|d| d.name == decl.name) {
            Some(existing) if *existing == decl => return Ok(()),
            Some(existing) => *existing = decl,
            None => decls.push(decl),
        }
        self.write_declarations(node, &decls)
    }

    fn remove_style_property(&mut self, node: NodeId, name: &str) -> TreeResult<()> {
        let mut decls = self.declarations(node)?;
        let before = decls.len();
        decls.retain(|d| d.name != name);
        if decls.len() == before {
            return Ok(());
        }
        self.write_declarations(node, &decls)
    }

    fn install_stylesheet(&mut self, marker: &str, css: &str) -> TreeResult<()> {
        self.stylesheets.insert(marker.to_string(), css.to_string());
        Ok(())
    }
}
