//! Concept Module
//!
//! 쿼리 결과에 나타나는 개념(concept)과 값의 데이터 모델.
//! 프로토콜 계층과 드라이버 계층이 함께 사용합니다.
//!
//! - 스키마 타입: [`EntityType`], [`RelationType`], [`RoleType`], [`AttributeType`]
//! - 인스턴스: [`Entity`], [`Relation`], [`Attribute`]
//! - 값: [`Value`], [`ValueType`], [`Decimal`], [`Duration`]
//! - 문서: [`Node`] (fetch 쿼리 결과의 트리)

mod document;
mod thing;
mod type_;
mod value;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use document::{DocumentMap, Node};
pub use thing::{Attribute, Entity, Relation, IID};
pub use type_::{AttributeType, EntityType, RelationType, RoleType};
pub use value::{Decimal, Duration, Value, ValueType};

// ============================================================================
// Concept - 개념
// ============================================================================

/// 개념 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConceptKind {
    /// Entity 타입
    EntityType,
    /// Relation 타입
    RelationType,
    /// Role 타입
    RoleType,
    /// Attribute 타입
    AttributeType,
    /// Entity
    Entity,
    /// Relation
    Relation,
    /// Attribute
    Attribute,
    /// 값
    Value,
}

impl ConceptKind {
    /// 종류 이름
    pub fn name(&self) -> &'static str {
        match self {
            ConceptKind::EntityType => "entity_type",
            ConceptKind::RelationType => "relation_type",
            ConceptKind::RoleType => "role_type",
            ConceptKind::AttributeType => "attribute_type",
            ConceptKind::Entity => "entity",
            ConceptKind::Relation => "relation",
            ConceptKind::Attribute => "attribute",
            ConceptKind::Value => "value",
        }
    }
}

/// 쿼리 결과로 바인딩되는 개념
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "concept", rename_all = "snake_case")]
pub enum Concept {
    /// Entity 타입
    EntityType(EntityType),
    /// Relation 타입
    RelationType(RelationType),
    /// Role 타입
    RoleType(RoleType),
    /// Attribute 타입
    AttributeType(AttributeType),
    /// Entity 인스턴스
    Entity(Entity),
    /// Relation 인스턴스
    Relation(Relation),
    /// Attribute 인스턴스
    Attribute(Attribute),
    /// 계산된 값
    Value(Value),
}

impl Concept {
    /// 개념 종류
    pub fn kind(&self) -> ConceptKind {
        match self {
            Concept::EntityType(_) => ConceptKind::EntityType,
            Concept::RelationType(_) => ConceptKind::RelationType,
            Concept::RoleType(_) => ConceptKind::RoleType,
            Concept::AttributeType(_) => ConceptKind::AttributeType,
            Concept::Entity(_) => ConceptKind::Entity,
            Concept::Relation(_) => ConceptKind::Relation,
            Concept::Attribute(_) => ConceptKind::Attribute,
            Concept::Value(_) => ConceptKind::Value,
        }
    }

    /// 스키마 타입 여부
    pub fn is_type(&self) -> bool {
        matches!(
            self,
            Concept::EntityType(_)
                | Concept::RelationType(_)
                | Concept::RoleType(_)
                | Concept::AttributeType(_)
        )
    }

    /// 인스턴스 여부
    pub fn is_instance(&self) -> bool {
        matches!(
            self,
            Concept::Entity(_) | Concept::Relation(_) | Concept::Attribute(_)
        )
    }

    /// Entity 여부
    pub fn is_entity(&self) -> bool {
        matches!(self, Concept::Entity(_))
    }

    /// Relation 여부
    pub fn is_relation(&self) -> bool {
        matches!(self, Concept::Relation(_))
    }

    /// Attribute 여부
    pub fn is_attribute(&self) -> bool {
        matches!(self, Concept::Attribute(_))
    }

    /// 값 여부
    pub fn is_value(&self) -> bool {
        matches!(self, Concept::Value(_))
    }

    /// 라벨
    ///
    /// 타입은 자신의 라벨, 인스턴스는 타입 라벨(없으면 `unknown`),
    /// 값은 값 타입 이름을 돌려줍니다.
    pub fn label(&self) -> &str {
        match self {
            Concept::EntityType(t) => &t.label,
            Concept::RelationType(t) => &t.label,
            Concept::RoleType(t) => &t.label,
            Concept::AttributeType(t) => &t.label,
            Concept::Entity(e) => e.type_.as_ref().map_or("unknown", |t| t.label.as_str()),
            Concept::Relation(r) => r.type_.as_ref().map_or("unknown", |t| t.label.as_str()),
            Concept::Attribute(a) => a.type_.as_ref().map_or("unknown", |t| t.label.as_str()),
            Concept::Value(v) => v.value_type().name(),
        }
    }

    /// 인스턴스 식별자
    pub fn iid(&self) -> Option<&IID> {
        match self {
            Concept::Entity(e) => Some(&e.iid),
            Concept::Relation(r) => Some(&r.iid),
            Concept::Attribute(a) => Some(&a.iid),
            _ => None,
        }
    }

    /// 값 (attribute 또는 값 개념)
    pub fn try_get_value(&self) -> Option<&Value> {
        match self {
            Concept::Attribute(a) => Some(&a.value),
            Concept::Value(v) => Some(v),
            _ => None,
        }
    }

    /// 값 타입
    pub fn value_type(&self) -> Option<ValueType> {
        match self {
            Concept::AttributeType(t) => t.value_type,
            _ => self.try_get_value().map(Value::value_type),
        }
    }

    /// Boolean 값
    pub fn try_get_boolean(&self) -> Option<bool> {
        self.try_get_value().and_then(Value::as_bool)
    }

    /// Integer 값
    pub fn try_get_integer(&self) -> Option<i64> {
        self.try_get_value().and_then(Value::as_i64)
    }

    /// Double 값
    pub fn try_get_double(&self) -> Option<f64> {
        self.try_get_value().and_then(Value::as_f64)
    }

    /// String 값
    pub fn try_get_string(&self) -> Option<&str> {
        self.try_get_value().and_then(Value::as_str)
    }

    /// JSON 표현
    ///
    /// 값은 원시 JSON 값으로, 그 외 개념은 종류와 라벨을 담은 객체로 변환합니다.
    pub fn to_json(&self) -> serde_json::Value {
        if let Some(value) = self.try_get_value() {
            return value.to_json();
        }
        let mut object = serde_json::Map::new();
        object.insert("kind".into(), self.kind().name().into());
        object.insert("label".into(), self.label().into());
        if let Some(iid) = self.iid() {
            object.insert("iid".into(), iid.to_string().into());
        }
        serde_json::Value::Object(object)
    }
}

impl fmt::Display for Concept {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Concept::Value(v) => write!(f, "{}", v),
            Concept::Attribute(a) => write!(f, "{}({})", self.label(), a.value),
            Concept::Entity(e) => write!(f, "{}({})", self.label(), e.iid),
            Concept::Relation(r) => write!(f, "{}({})", self.label(), r.iid),
            _ => write!(f, "{}", self.label()),
        }
    }
}

impl From<Value> for Concept {
    fn from(value: Value) -> Self {
        Concept::Value(value)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn john() -> Concept {
        Concept::Entity(Entity {
            iid: IID::from(vec![0x1e, 0x01]),
            type_: Some(EntityType::new("person")),
        })
    }

    fn age(value: i64) -> Concept {
        Concept::Attribute(Attribute {
            iid: IID::from(vec![0x01]),
            value: Value::Integer(value),
            type_: Some(AttributeType::new("age", Some(ValueType::Integer))),
        })
    }

    #[test]
    fn test_concept_kind_predicates() {
        assert!(john().is_entity());
        assert!(john().is_instance());
        assert!(!john().is_type());

        let person = Concept::EntityType(EntityType::new("person"));
        assert!(person.is_type());
        assert_eq!(person.kind(), ConceptKind::EntityType);

        assert!(Concept::from(Value::Integer(1)).is_value());
    }

    #[test]
    fn test_concept_label() {
        assert_eq!(john().label(), "person");
        assert_eq!(age(15).label(), "age");
        assert_eq!(Concept::Value(Value::Integer(1)).label(), "long");

        let untyped = Concept::Relation(Relation {
            iid: IID::from(vec![2]),
            type_: None,
        });
        assert_eq!(untyped.label(), "unknown");
    }

    #[test]
    fn test_concept_value_access() {
        assert_eq!(age(15).try_get_integer(), Some(15));
        assert_eq!(age(15).value_type(), Some(ValueType::Integer));
        assert_eq!(john().try_get_value(), None);
        assert_eq!(john().iid().map(|iid| iid.to_string()), Some("0x1e01".to_string()));
    }

    #[test]
    fn test_concept_to_json() {
        assert_eq!(age(15).to_json(), serde_json::json!(15));

        let json = john().to_json();
        assert_eq!(json["kind"], "entity");
        assert_eq!(json["label"], "person");
        assert_eq!(json["iid"], "0x1e01");
    }

    #[test]
    fn test_concept_display() {
        assert_eq!(age(15).to_string(), "age(15)");
        assert_eq!(john().to_string(), "person(0x1e01)");
    }

    #[test]
    fn test_concept_serde() {
        let json = serde_json::to_value(age(15)).unwrap();
        assert_eq!(json["kind"], "attribute");
        let back: Concept = serde_json::from_value(json).unwrap();
        assert_eq!(back, age(15));
    }
}
