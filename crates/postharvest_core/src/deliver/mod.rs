//! Outbound delivery of annotated records.

pub mod webhook;

use crate::model::item::WorkingSetRecord;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub use webhook::{build_payload, WebhookDelivery};

pub type DeliveryResult<T> = Result<T, DeliveryError>;

#[derive(Debug)]
pub enum DeliveryError {
    Http(reqwest::Error),
    Rejected { status: u16 },
    MissingEndpoint,
    NothingToDeliver,
}

impl Display for DeliveryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Http(err) => write!(f, "delivery request failed: {err}"),
            Self::Rejected { status } => write!(f, "delivery endpoint returned {status}"),
            Self::MissingEndpoint => write!(f, "no webhook url configured"),
            Self::NothingToDeliver => write!(f, "no records to deliver"),
        }
    }
}

impl Error for DeliveryError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Http(err) => Some(err),
            Self::Rejected { .. } | Self::MissingEndpoint | Self::NothingToDeliver => None,
        }
    }
}

impl From<reqwest::Error> for DeliveryError {
    fn from(value: reqwest::Error) -> Self {
        Self::Http(value)
    }
}

/// Destination for annotated records.
pub trait DeliveryChannel {
    /// Cheap reachability check made before a batch is sent.
    fn probe(&self) -> bool;

    /// Sends `records` as one batch; returns how many were sent.
    fn deliver(&self, records: &[WorkingSetRecord]) -> DeliveryResult<usize>;
}
