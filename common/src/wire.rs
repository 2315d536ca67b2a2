//! Request bodies sent to the context store.

use serde::Serialize;

use crate::types::{AttributeSet, TrackedEntity};

/// `POST /entities` body: `{id, type, <attr>: {value, type}...}`.
#[derive(Serialize, Debug)]
pub struct NewEntity<'a> {
    pub id: &'a str,
    #[serde(rename = "type")]
    pub entity_type: &'a str,
    #[serde(flatten)]
    pub attrs: &'a AttributeSet,
}

impl<'a> NewEntity<'a> {
    pub fn new(entity: &'a TrackedEntity, attrs: &'a AttributeSet) -> Self {
        Self {
            id: &entity.id,
            entity_type: entity.kind.remote_type(),
            attrs,
        }
    }
}

#[derive(Serialize, Debug, Clone)]
pub struct Subscription {
    pub description: String,
    pub subject: SubscriptionSubject,
    pub notification: Notification,
    pub expires: String,
}

#[derive(Serialize, Debug, Clone)]
pub struct SubscriptionSubject {
    pub entities: Vec<EntityPattern>,
    pub condition: Condition,
}

#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct EntityPattern {
    pub id_pattern: String,
    #[serde(rename = "type")]
    pub entity_type: String,
}

#[derive(Serialize, Debug, Clone)]
pub struct Condition {
    pub attrs: Vec<String>,
}

#[derive(Serialize, Debug, Clone)]
pub struct Notification {
    pub http: HttpTarget,
    pub attrs: Vec<String>,
    pub metadata: Vec<String>,
}

#[derive(Serialize, Debug, Clone)]
pub struct HttpTarget {
    pub url: String,
}

impl Subscription {
    /// Standing subscription that forwards weather changes to a
    /// time-series notifier at `notify_url`.
    pub fn weather_changes(notify_url: impl Into<String>) -> Self {
        let strings = |xs: &[&str]| xs.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        Self {
            description: "Weather data subscription".into(),
            subject: SubscriptionSubject {
                entities: vec![EntityPattern {
                    id_pattern: ".*".into(),
                    entity_type: "WeatherObserved".into(),
                }],
                condition: Condition {
                    attrs: strings(&["temperature", "humidity"]),
                },
            },
            notification: Notification {
                http: HttpTarget {
                    url: notify_url.into(),
                },
                attrs: strings(&["temperature", "humidity", "location", "TimeInstant"]),
                metadata: strings(&["dateCreated", "dateModified"]),
            },
            expires: "2040-01-01T00:00:00.000Z".into(),
        }
    }
}
