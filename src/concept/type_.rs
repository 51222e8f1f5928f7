//! Schema types
//!
//! 스키마 타입(entity/relation/role/attribute type) 정의

use std::fmt;

use serde::{Deserialize, Serialize};

use super::value::ValueType;

/// Entity 타입
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityType {
    /// 타입 라벨
    pub label: String,
}

impl EntityType {
    /// 새 Entity 타입
    pub fn new(label: impl Into<String>) -> Self {
        Self { label: label.into() }
    }
}

/// Relation 타입
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RelationType {
    /// 타입 라벨
    pub label: String,
}

impl RelationType {
    /// 새 Relation 타입
    pub fn new(label: impl Into<String>) -> Self {
        Self { label: label.into() }
    }
}

/// Role 타입
///
/// 라벨은 `relation:role` 형식의 scoped label 입니다.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoleType {
    /// Scoped 라벨
    pub label: String,
}

impl RoleType {
    /// 새 Role 타입
    pub fn new(label: impl Into<String>) -> Self {
        Self { label: label.into() }
    }

    /// 관계 타입 부분 (`relation:role`의 `relation`)
    pub fn scope(&self) -> Option<&str> {
        self.label.split_once(':').map(|(scope, _)| scope)
    }

    /// 역할 이름 부분
    pub fn name(&self) -> &str {
        self.label
            .split_once(':')
            .map(|(_, name)| name)
            .unwrap_or(&self.label)
    }
}

/// Attribute 타입
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AttributeType {
    /// 타입 라벨
    pub label: String,
    /// 값 타입 (추상 타입이면 없음)
    #[serde(default)]
    pub value_type: Option<ValueType>,
}

impl AttributeType {
    /// 새 Attribute 타입
    pub fn new(label: impl Into<String>, value_type: Option<ValueType>) -> Self {
        Self {
            label: label.into(),
            value_type,
        }
    }
}

impl fmt::Display for AttributeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.value_type {
            Some(value_type) => write!(f, "{} ({})", self.label, value_type),
            None => write!(f, "{}", self.label),
        }
    }
}
