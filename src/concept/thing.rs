//! Instances
//!
//! 데이터 인스턴스(entity/relation/attribute) 정의

use std::fmt;

use serde::{Deserialize, Serialize};

use super::type_::{AttributeType, EntityType, RelationType};
use super::value::Value;

// ============================================================================
// IID - 인스턴스 식별자
// ============================================================================

/// 서버가 부여한 인스턴스 식별자
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct IID(Vec<u8>);

impl IID {
    /// 바이트열
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl From<Vec<u8>> for IID {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl fmt::Display for IID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x")?;
        for byte in &self.0 {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

// ============================================================================
// Entity / Relation / Attribute
// ============================================================================

/// Entity 인스턴스
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    /// 식별자
    pub iid: IID,
    /// 타입 (include_instance_types 옵션이 꺼져 있으면 없음)
    #[serde(rename = "type", default)]
    pub type_: Option<EntityType>,
}

/// Relation 인스턴스
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relation {
    /// 식별자
    pub iid: IID,
    /// 타입
    #[serde(rename = "type", default)]
    pub type_: Option<RelationType>,
}

/// Attribute 인스턴스
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    /// 식별자
    pub iid: IID,
    /// 값
    pub value: Value,
    /// 타입
    #[serde(rename = "type", default)]
    pub type_: Option<AttributeType>,
}
