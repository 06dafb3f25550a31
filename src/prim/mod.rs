pub mod client;
pub mod error;
pub mod siri;

use crate::config::TransportWidget;

use client::PrimClient;
use error::PrimResult;
use siri::MonitoredStopVisit;

/// One poll of the realtime feed for a configured widget.
///
/// Single-line widgets go through the line query (then filtered to the
/// widget's stops); hub widgets use stop monitoring and may exclude lines
/// that get their own dedicated widget.
pub async fn fetch_widget_visits(
    client: &PrimClient,
    widget: &TransportWidget,
) -> PrimResult<Vec<MonitoredStopVisit>> {
    let mut visits = match widget.line_ref {
        Some(line_ref) => client.line_query(line_ref, widget.stop_refs).await?,
        None => client
            .stop_monitoring(widget.stop_refs[0])
            .await?
            .into_visits(),
    };

    if !widget.omit_line_refs.is_empty() {
        visits.retain(|v| {
            v.line_ref()
                .map(|line| !widget.omit_line_refs.contains(&line))
                .unwrap_or(true)
        });
    }

    Ok(visits)
}
