use crate::metric_enum;

metric_enum! {
    /// Per-lane gauges, labelled with `lane`
    pub enum LaneMetric {
        BlockSize => ("streamcache_lane_block_size", "Configured MIG block size code"),
        BlocksPause => ("streamcache_lane_blocks_pause", "Free-block threshold that pauses the lane"),
        BlocksFree => ("streamcache_lane_blocks_free", "Free blocks in the lane buffer"),
        BlocksQueued => ("streamcache_lane_blocks_queued", "Blocks queued for transfer to host RAM"),
        WriteQueueCount => ("streamcache_lane_write_queue_count", "Outstanding MIG write requests"),
        WriteIndex => ("streamcache_lane_write_index", "Block write index"),
        WriteCommitIndex => ("streamcache_lane_write_commit_index", "Block write commit index"),
        ReadIndex => ("streamcache_lane_read_index", "Block read index"),
    }
}

metric_enum! {
    /// Map-wide gauges
    pub enum RegisterMetric {
        MonitorEnabled => ("streamcache_monitor_enabled", "StreamCache lane monitoring enable bit"),
        PolledRegister => ("streamcache_register_value", "Raw value of a polled StreamCache register"),
        DerivedValue => ("streamcache_derived_value", "StreamCache value derived from raw registers"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_metric_names_are_unique() {
        let names: HashSet<&str> = LaneMetric::ALL
            .iter()
            .map(|m| m.name())
            .chain(RegisterMetric::ALL.iter().map(|m| m.name()))
            .collect();
        assert_eq!(names.len(), LaneMetric::ALL.len() + RegisterMetric::ALL.len());
        assert!(names.iter().all(|n| n.starts_with("streamcache_")));
    }
}
