use cb_bus::EventBus;
use cb_core::events::{ConnectionState, ConnectionStateEvent, SendDroppedEvent};
use cb_telemetry::{TelemetryLabels, record_counter};

use crate::router::Routed;

/// Hands routed results to the shared event bus, one publish per event.
/// Control results stay with the connection manager and are never published.
#[derive(Clone)]
pub struct EventPublisher {
    bus: EventBus,
    labels: TelemetryLabels,
}

impl EventPublisher {
    pub fn new(bus: EventBus) -> Self {
        Self {
            bus,
            labels: TelemetryLabels::new("chat"),
        }
    }

    pub fn publish(&self, routed: Routed) {
        match routed {
            Routed::Chat(event) => self.bus.publish(event),
            Routed::Command(event) => self.bus.publish(event),
            Routed::RoomState(event) => self.bus.publish(event),
            Routed::UserState(event) => self.bus.publish(event),
            Routed::Membership(event) => self.bus.publish(event),
            Routed::Raw(event) => {
                record_counter("castbridge_chat_raw_lines_total", 1, &self.labels);
                self.bus.publish(event)
            }
            Routed::Welcome | Routed::AuthFailure(_) | Routed::Ping(_) => {}
        }
    }

    pub(crate) fn connection_change(&self, old: ConnectionState, new: ConnectionState) {
        self.bus.publish(ConnectionStateEvent { old, new });
    }

    pub(crate) fn send_dropped(&self, event: SendDroppedEvent) {
        let labels = self
            .labels
            .clone()
            .with_extra("reason", event.reason.as_str());
        record_counter("castbridge_chat_dropped_total", 1, &labels);
        self.bus.publish(event);
    }
}
