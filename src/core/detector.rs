// BD / EOL detection over pre-computed marker arrays

use crate::core::constants::INACTIVE_MARKER;
use crate::core::format::{Annotation, DegradationEvent, EventKind, FeatureSeries, MarkerSet};

/// Index of the first active marker, `None` when every marker is inactive.
pub fn detect(markers: &[f64]) -> Option<usize> {
    markers.iter().position(|m| *m != INACTIVE_MARKER)
}

/// Turn a marker set into at most one BD and one EOL event for `series`.
///
/// A marker index with no matching feature point yields no event.
pub fn annotate(series: &FeatureSeries, markers: &MarkerSet) -> Annotation {
    Annotation {
        bd: event(series, EventKind::Bd, &markers.bd),
        eol: event(series, EventKind::Eol, &markers.eol),
    }
}

fn event(series: &FeatureSeries, kind: EventKind, markers: &[f64]) -> Option<DegradationEvent> {
    let index = detect(markers)?;
    let point = series.points.get(index)?;
    Some(DegradationEvent {
        kind,
        index,
        time: point.time,
    })
}
