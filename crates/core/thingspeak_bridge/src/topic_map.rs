use crate::error::BridgeError;
use bridge_config::Binding;
use mqtt_channel::Topic;
use mqtt_channel::TopicFilter;
use std::collections::HashMap;
use std::collections::HashSet;

/// The keys accepted for a value in a ThingSpeak bulk update
const CHANNEL_FIELDS: [&str; 12] = [
    "field1",
    "field2",
    "field3",
    "field4",
    "field5",
    "field6",
    "field7",
    "field8",
    "latitude",
    "longitude",
    "elevation",
    "status",
];

/// Which channel field the values published on a topic are sent as.
///
/// Built once on start, never updated.
#[derive(Debug, Clone)]
pub struct TopicMap {
    fields: HashMap<String, String>,
    expected_field_count: usize,
}

impl TopicMap {
    pub fn try_new(bindings: impl IntoIterator<Item = Binding>) -> Result<TopicMap, BridgeError> {
        let mut fields = HashMap::new();
        for Binding { topic, field } in bindings {
            if let Err(source) = Topic::new(&topic) {
                return Err(BridgeError::InvalidTopic { topic, source });
            }
            if !CHANNEL_FIELDS.contains(&field.as_str()) {
                return Err(BridgeError::InvalidField { topic, field });
            }
            if fields.contains_key(&topic) {
                return Err(BridgeError::DuplicateTopicBinding { topic });
            }
            fields.insert(topic, field);
        }

        if fields.is_empty() {
            return Err(BridgeError::NoTopicBinding);
        }

        let expected_field_count = fields.values().collect::<HashSet<_>>().len();
        Ok(TopicMap {
            fields,
            expected_field_count,
        })
    }

    /// The field bound to that exact topic, if any
    pub fn lookup(&self, topic: &str) -> Option<&str> {
        self.fields.get(topic).map(String::as_str)
    }

    /// Number of distinct fields, i.e. the size of a complete batch
    pub fn expected_field_count(&self) -> usize {
        self.expected_field_count
    }

    /// The topics to subscribe to
    pub fn subscriptions(&self) -> TopicFilter {
        let mut filter = TopicFilter::empty();
        for topic in self.fields.keys() {
            filter.add_all(Topic::new_unchecked(topic).filter());
        }
        filter
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn sensors() -> Vec<Binding> {
        vec![
            Binding::new("sensors/temp", "field1"),
            Binding::new("sensors/humidity", "field2"),
        ]
    }

    #[test]
    fn lookup_is_an_exact_match() {
        let topics = TopicMap::try_new(sensors()).unwrap();

        assert_eq!(topics.lookup("sensors/temp"), Some("field1"));
        assert_eq!(topics.lookup("sensors/humidity"), Some("field2"));
        assert_eq!(topics.lookup("sensors/temp/raw"), None);
        assert_eq!(topics.lookup("sensors/+"), None);
        assert_eq!(topics.lookup("sensors"), None);
    }

    #[test]
    fn duplicate_topics_are_rejected() {
        let mut bindings = sensors();
        bindings.push(Binding::new("sensors/temp", "field3"));

        assert_matches!(
            TopicMap::try_new(bindings),
            Err(BridgeError::DuplicateTopicBinding { topic }) if topic == "sensors/temp"
        );
    }

    #[test]
    fn wildcard_topics_are_rejected() {
        let bindings = vec![Binding::new("sensors/#", "field1")];

        assert_matches!(
            TopicMap::try_new(bindings),
            Err(BridgeError::InvalidTopic { topic, .. }) if topic == "sensors/#"
        );
    }

    #[test]
    fn only_channel_fields_can_be_bound() {
        let bindings = vec![
            Binding::new("sensors/temp", "field1"),
            Binding::new("sensors/clock", "delta_t"),
        ];
        assert_matches!(
            TopicMap::try_new(bindings),
            Err(BridgeError::InvalidField { topic, field })
                if topic == "sensors/clock" && field == "delta_t"
        );

        let bindings = vec![Binding::new("sensors/hum", "not_a_thingspeak_field")];
        assert_matches!(
            TopicMap::try_new(bindings),
            Err(BridgeError::InvalidField { field, .. }) if field == "not_a_thingspeak_field"
        );

        let bindings = vec![
            Binding::new("gps/lat", "latitude"),
            Binding::new("gps/lon", "longitude"),
            Binding::new("gps/alt", "elevation"),
            Binding::new("sensors/wind", "field8"),
        ];
        assert!(TopicMap::try_new(bindings).is_ok());
    }

    #[test]
    fn at_least_one_binding_is_required() {
        assert_matches!(TopicMap::try_new(vec![]), Err(BridgeError::NoTopicBinding));
    }

    #[test]
    fn a_complete_batch_has_one_value_per_distinct_field() {
        let topics = TopicMap::try_new(sensors()).unwrap();
        assert_eq!(topics.expected_field_count(), 2);

        let mut bindings = sensors();
        bindings.push(Binding::new("backup/temp", "field1"));
        let topics = TopicMap::try_new(bindings).unwrap();
        assert_eq!(topics.expected_field_count(), 2);
    }

    #[test]
    fn all_the_bound_topics_are_subscribed() {
        let topics = TopicMap::try_new(sensors()).unwrap();
        let mut subscriptions = topics.subscriptions().patterns;
        subscriptions.sort();

        assert_eq!(
            subscriptions,
            vec!["sensors/humidity".to_string(), "sensors/temp".to_string()]
        );
    }
}
