use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::{CoreError, CoreResult};

/// The three kinds of bookable inventory.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Flight,
    Hotel,
    Event,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Flight => "flight",
            ResourceKind::Hotel => "hotel",
            ResourceKind::Event => "event",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "flight" => Ok(ResourceKind::Flight),
            "hotel" => Ok(ResourceKind::Hotel),
            "event" => Ok(ResourceKind::Event),
            other => Err(CoreError::Validation(format!("unknown booking type '{}'", other))),
        }
    }
}

/// Reference to exactly one bookable resource.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum ResourceRef {
    Flight(Uuid),
    Hotel(Uuid),
    Event(Uuid),
}

impl ResourceRef {
    pub fn new(kind: ResourceKind, id: Uuid) -> Self {
        match kind {
            ResourceKind::Flight => ResourceRef::Flight(id),
            ResourceKind::Hotel => ResourceRef::Hotel(id),
            ResourceKind::Event => ResourceRef::Event(id),
        }
    }

    /// Converts the loose `booking_type` + three optional ids form into a reference.
    ///
    /// The id matching the declared type must be present and the other two absent.
    pub fn from_parts(
        kind: ResourceKind,
        flight: Option<Uuid>,
        hotel: Option<Uuid>,
        event: Option<Uuid>,
    ) -> CoreResult<Self> {
        let (matching, others) = match kind {
            ResourceKind::Flight => (flight, [hotel, event]),
            ResourceKind::Hotel => (hotel, [flight, event]),
            ResourceKind::Event => (event, [flight, hotel]),
        };

        let id = matching.ok_or_else(|| {
            CoreError::Validation(format!("{} ID is required for {} bookings", capitalize(kind.as_str()), kind))
        })?;

        if others.iter().any(Option::is_some) {
            return Err(CoreError::Validation(format!(
                "a {} booking must reference exactly one resource",
                kind
            )));
        }

        Ok(ResourceRef::new(kind, id))
    }

    pub fn kind(&self) -> ResourceKind {
        match self {
            ResourceRef::Flight(_) => ResourceKind::Flight,
            ResourceRef::Hotel(_) => ResourceKind::Hotel,
            ResourceRef::Event(_) => ResourceKind::Event,
        }
    }

    pub fn id(&self) -> Uuid {
        match self {
            ResourceRef::Flight(id) | ResourceRef::Hotel(id) | ResourceRef::Event(id) => *id,
        }
    }
}

impl fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind(), self.id())
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_parts_matches_declared_type() {
        let id = Uuid::new_v4();
        let resource = ResourceRef::from_parts(ResourceKind::Hotel, None, Some(id), None).unwrap();
        assert_eq!(resource, ResourceRef::Hotel(id));
        assert_eq!(resource.kind(), ResourceKind::Hotel);
        assert_eq!(resource.id(), id);
    }

    #[test]
    fn test_from_parts_requires_matching_id() {
        // Declared flight, but only an event id supplied
        let err = ResourceRef::from_parts(ResourceKind::Flight, None, None, Some(Uuid::new_v4())).unwrap_err();
        assert_eq!(
            err,
            CoreError::Validation("Flight ID is required for flight bookings".to_string())
        );
    }

    #[test]
    fn test_from_parts_rejects_two_resources() {
        let result = ResourceRef::from_parts(
            ResourceKind::Event,
            Some(Uuid::new_v4()),
            None,
            Some(Uuid::new_v4()),
        );
        assert!(matches!(result, Err(CoreError::Validation(_))));
    }

    #[test]
    fn test_serde_shape() {
        let id = Uuid::nil();
        let json = serde_json::to_value(ResourceRef::Event(id)).unwrap();
        assert_eq!(json, serde_json::json!({ "kind": "event", "id": id }));
        assert_eq!("HOTEL".parse::<ResourceKind>().unwrap(), ResourceKind::Hotel);
    }
}
