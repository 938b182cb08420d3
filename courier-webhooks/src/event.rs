//! Webhook event envelope and the closed set of event types

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Event filter entry that matches every event type
pub const WILDCARD: &str = "*";

/// Domain events that can be delivered to subscribers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
    #[serde(rename = "booking.created")]
    BookingCreated,
    #[serde(rename = "booking.updated")]
    BookingUpdated,
    #[serde(rename = "booking.cancelled")]
    BookingCancelled,
    #[serde(rename = "task.created")]
    TaskCreated,
    #[serde(rename = "task.completed")]
    TaskCompleted,
    #[serde(rename = "invoice.created")]
    InvoiceCreated,
    #[serde(rename = "invoice.paid")]
    InvoicePaid,
    #[serde(rename = "payment.received")]
    PaymentReceived,
    #[serde(rename = "employee.created")]
    EmployeeCreated,
    #[serde(rename = "employee.updated")]
    EmployeeUpdated,
    #[serde(rename = "payroll.processed")]
    PayrollProcessed,
    #[serde(rename = "leave.requested")]
    LeaveRequested,
    #[serde(rename = "leave.approved")]
    LeaveApproved,
}

impl EventType {
    pub const ALL: [EventType; 13] = [
        EventType::BookingCreated,
        EventType::BookingUpdated,
        EventType::BookingCancelled,
        EventType::TaskCreated,
        EventType::TaskCompleted,
        EventType::InvoiceCreated,
        EventType::InvoicePaid,
        EventType::PaymentReceived,
        EventType::EmployeeCreated,
        EventType::EmployeeUpdated,
        EventType::PayrollProcessed,
        EventType::LeaveRequested,
        EventType::LeaveApproved,
    ];

    /// Wire name, e.g. `booking.created`
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::BookingCreated => "booking.created",
            EventType::BookingUpdated => "booking.updated",
            EventType::BookingCancelled => "booking.cancelled",
            EventType::TaskCreated => "task.created",
            EventType::TaskCompleted => "task.completed",
            EventType::InvoiceCreated => "invoice.created",
            EventType::InvoicePaid => "invoice.paid",
            EventType::PaymentReceived => "payment.received",
            EventType::EmployeeCreated => "employee.created",
            EventType::EmployeeUpdated => "employee.updated",
            EventType::PayrollProcessed => "payroll.processed",
            EventType::LeaveRequested => "leave.requested",
            EventType::LeaveApproved => "leave.approved",
        }
    }

    /// Parse a wire name; `None` for anything outside the closed set
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == name)
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("unknown event type: {s}"))
    }
}

/// The envelope delivered to subscribers.
///
/// The timestamp is fixed when the event is created and carried unchanged
/// through every retry of the same event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookEvent {
    #[serde(rename = "type")]
    pub event_type: EventType,

    pub tenant_id: String,

    pub payload: serde_json::Value,

    /// ISO-8601 creation time
    pub timestamp: String,
}

impl WebhookEvent {
    /// Create an event stamped with the current time
    pub fn new(event_type: EventType, tenant_id: impl Into<String>, payload: serde_json::Value) -> Self {
        Self::at(event_type, tenant_id, payload, Utc::now())
    }

    /// Create an event with an explicit timestamp
    pub fn at(
        event_type: EventType,
        tenant_id: impl Into<String>,
        payload: serde_json::Value,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            event_type,
            tenant_id: tenant_id.into(),
            payload,
            timestamp: timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }

    /// JSON body sent on the wire
    ///
    /// Field order is fixed by the struct and object keys inside `payload`
    /// are emitted sorted, so equal events serialize to equal bytes.
    pub fn to_body(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}
