const NAMESPACE: &str = "ESY";
const SUBSYSTEM: &str = "PVVC";
const APP_NAMESPACE: &str = "APP";

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TopicKind {
    Up,
    Down,
    Alarm,
    Event,
    News,
}

/// Cloud broker topics for one device.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DeviceTopics {
    pub up: String,
    pub down: String,
    pub alarm: String,
    pub event: String,
    pub news: Option<String>,
}

impl DeviceTopics {
    pub fn new(serial: &str) -> Self {
        Self {
            up: device_topic(serial, "UP"),
            down: device_topic(serial, "DOWN"),
            alarm: device_topic(serial, "ALARM"),
            event: device_topic(serial, "EVENT"),
            news: None,
        }
    }

    pub fn with_user(mut self, user_id: &str) -> Self {
        self.news = Some(news_topic(user_id));
        self
    }

    /// Topics carrying traffic from the device (and the app push channel).
    pub fn inbound(&self) -> Vec<&str> {
        let mut r = vec![self.up.as_str(), self.event.as_str(), self.alarm.as_str()];
        if let Some(news) = &self.news {
            r.push(news.as_str());
        }
        r
    }

    pub fn classify(&self, topic: &str) -> Option<TopicKind> {
        if topic == self.up {
            Some(TopicKind::Up)
        } else if topic == self.event {
            Some(TopicKind::Event)
        } else if topic == self.alarm {
            Some(TopicKind::Alarm)
        } else if topic == self.down {
            Some(TopicKind::Down)
        } else if self.news.as_deref() == Some(topic) {
            Some(TopicKind::News)
        } else {
            None
        }
    }
}

pub fn device_topic(serial: &str, suffix: &str) -> String {
    format!("/{}/{}/{}/{}", NAMESPACE, SUBSYSTEM, serial, suffix)
}

pub fn news_topic(user_id: &str) -> String {
    format!("/{}/{}/NEWS", APP_NAMESPACE, user_id)
}
