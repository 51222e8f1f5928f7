//! Document tree
//!
//! fetch 쿼리가 돌려주는 구조화된 문서의 노드

use serde::{Deserialize, Serialize};

use super::Concept;

/// 문서 노드
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "node", content = "value", rename_all = "snake_case")]
pub enum Node {
    /// 키 순서가 유지되는 맵
    Map(DocumentMap),
    /// 리스트
    List(Vec<Node>),
    /// 단일 개념 (바인딩되지 않은 optional이면 `None`)
    Leaf(Option<Concept>),
}

impl Node {
    /// 맵 노드
    pub fn as_map(&self) -> Option<&DocumentMap> {
        match self {
            Node::Map(map) => Some(map),
            _ => None,
        }
    }

    /// 리스트 노드
    pub fn as_list(&self) -> Option<&[Node]> {
        match self {
            Node::List(items) => Some(items),
            _ => None,
        }
    }

    /// 리프 개념
    pub fn as_concept(&self) -> Option<&Concept> {
        match self {
            Node::Leaf(concept) => concept.as_ref(),
            _ => None,
        }
    }

    /// JSON 변환 (키 순서 유지)
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Node::Map(map) => serde_json::Value::Object(
                map.iter()
                    .map(|(key, node)| (key.to_string(), node.to_json()))
                    .collect(),
            ),
            Node::List(items) => serde_json::Value::Array(items.iter().map(Node::to_json).collect()),
            Node::Leaf(Some(concept)) => concept.to_json(),
            Node::Leaf(None) => serde_json::Value::Null,
        }
    }
}

impl From<Concept> for Node {
    fn from(concept: Concept) -> Self {
        Node::Leaf(Some(concept))
    }
}

impl From<DocumentMap> for Node {
    fn from(map: DocumentMap) -> Self {
        Node::Map(map)
    }
}

/// 순서 유지 맵
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentMap {
    entries: Vec<(String, Node)>,
}

impl DocumentMap {
    /// 빈 맵
    pub fn new() -> Self {
        Self::default()
    }

    /// 항목 추가 (같은 키가 있으면 교체)
    pub fn insert(&mut self, key: impl Into<String>, node: impl Into<Node>) {
        let key = key.into();
        let node = node.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, existing)) => *existing = node,
            None => self.entries.push((key, node)),
        }
    }

    /// 키로 조회
    pub fn get(&self, key: &str) -> Option<&Node> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, node)| node)
    }

    /// 키 목록 (삽입 순서)
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(key, _)| key.as_str())
    }

    /// 항목 순회
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Node)> {
        self.entries.iter().map(|(key, node)| (key.as_str(), node))
    }

    /// 항목 수
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// 빈 맵 여부
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, N: Into<Node>> FromIterator<(K, N)> for DocumentMap {
    fn from_iter<I: IntoIterator<Item = (K, N)>>(iter: I) -> Self {
        let mut map = DocumentMap::new();
        for (key, node) in iter {
            map.insert(key, node);
        }
        map
    }
}
