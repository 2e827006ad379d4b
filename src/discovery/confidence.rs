//! Confidence scoring
//!
//! Maps the evidence gathered for a host to a 0-100 score. Pure, no I/O.

use crate::config::{
    CONFIDENCE_BASE, CONFIDENCE_HOSTNAME_BONUS, CONFIDENCE_MANY_PORTS_BONUS,
    CONFIDENCE_MANY_PORTS_THRESHOLD, CONFIDENCE_OPEN_PORT_BONUS,
};
use crate::models::DiscoveredDeviceDraft;

pub fn score(draft: &DiscoveredDeviceDraft) -> u8 {
    let mut score = u32::from(CONFIDENCE_BASE);

    let has_hostname = draft
        .hostname
        .as_deref()
        .is_some_and(|h| !h.trim().is_empty());
    if has_hostname {
        score += u32::from(CONFIDENCE_HOSTNAME_BONUS);
    }

    if !draft.open_ports.is_empty() {
        score += u32::from(CONFIDENCE_OPEN_PORT_BONUS);
        if draft.open_ports.len() > CONFIDENCE_MANY_PORTS_THRESHOLD {
            score += u32::from(CONFIDENCE_MANY_PORTS_BONUS);
        }
    }

    score.min(100) as u8
}
