//! Listing of the types registered with the media library.

use tracing::{debug, info};

use obs_twitch_pipeline::{MediaPipeline, TypeKind};

/// Log every registered input, output, source, encoder and service type.
///
/// Purely informational. Returns the number of types logged.
pub fn log_available_types<P: MediaPipeline>(pipeline: &P) -> usize {
    let mut total = 0;

    for kind in TypeKind::ALL {
        let ids = pipeline.available_types(kind);
        for id in &ids {
            info!("{}: {}", kind.label(), id);
        }
        debug!(kind = kind.label(), count = ids.len(), "Types listed");
        total += ids.len();
    }

    total
}

#[cfg(test)]
mod tests {
    use super::*;
    use obs_twitch_pipeline::{PipelineCall, RecordingPipeline};

    #[test]
    fn test_lists_every_family() {
        let (pipeline, handle) = RecordingPipeline::new();

        let total = log_available_types(&pipeline);

        assert_eq!(total, 11);
        let listed: Vec<_> = handle
            .calls()
            .into_iter()
            .filter_map(|c| match c {
                PipelineCall::ListTypes(kind) => Some(kind),
                _ => None,
            })
            .collect();
        assert_eq!(listed, TypeKind::ALL.to_vec());
    }
}
