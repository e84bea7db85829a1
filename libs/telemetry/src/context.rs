/// Label set attached to every metric emitted by a module.
#[derive(Debug, Clone)]
pub struct TelemetryLabels {
    pub module: String,
    pub channel: Option<String>,
    pub extra: Vec<(String, String)>,
}

impl TelemetryLabels {
    pub fn new(module: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            channel: None,
            extra: Vec::new(),
        }
    }

    pub fn with_channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = Some(channel.into());
        self
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra.push((key.into(), value.into()));
        self
    }

    pub fn tags(&self) -> Vec<(String, String)> {
        let mut tags = Vec::with_capacity(2 + self.extra.len());
        tags.push(("module".into(), self.module.clone()));
        if let Some(channel) = &self.channel {
            tags.push(("channel".into(), channel.clone()));
        }
        for (key, value) in &self.extra {
            tags.push((key.clone(), value.clone()));
        }
        tags
    }
}
