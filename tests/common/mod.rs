//! Common test utilities for integration tests.

#![allow(dead_code)]

use mergetree_select::{
    DataPart, MergePlanner, MergeTreeSettings, MergeTreeTable, PartInfo, PartSnapshot,
    SelectorConfig, TableId, TxnTimestamp,
};

/// Reference "now" used by every deterministic planning pass.
pub const NOW: u64 = 1_700_000_000;

/// Part of `size` bytes and rows in `partition`, committed one minute before [`NOW`].
pub fn part(partition: &str, block: u64, size: u64) -> DataPart {
    DataPart::new(PartInfo::new(partition, block, block, 0))
        .with_bytes(size)
        .with_rows(size)
        .with_commit_time(TxnTimestamp::from_unix_secs(NOW - 60))
}

/// Planner over an unbucketed table with default configuration.
pub fn planner(settings: MergeTreeSettings) -> MergePlanner {
    MergePlanner::new(
        MergeTreeTable::new(TableId::new()).settings(settings),
        SelectorConfig::default(),
    )
}

/// Snapshot where `leaf` sits on top of `depth` superseded versions.
pub fn chained(leaf: DataPart, depth: usize) -> PartSnapshot {
    let mut builder = PartSnapshot::builder();
    let info = leaf.info().clone();
    let mut previous = None;
    for version in 0..depth {
        let superseded = DataPart::new(info.clone())
            .with_bytes(leaf.bytes())
            .with_rows(leaf.rows())
            .with_commit_time(TxnTimestamp::from_unix_secs(NOW - 3_600 + version as u64));
        previous = Some(
            builder
                .add_superseded(superseded, previous)
                .expect("previous version is in the arena"),
        );
    }
    match previous {
        Some(previous) => {
            builder
                .add_version(leaf, previous)
                .expect("previous version is in the arena");
        }
        None => {
            builder.add_part(leaf);
        }
    }
    builder.build()
}

/// Randomized part set: `partitions` partitions with 1..=`max_parts` parts each.
pub fn random_parts(rng: &mut fastrand::Rng, partitions: usize, max_parts: u64) -> Vec<DataPart> {
    let mut parts = Vec::new();
    let mut block = 0;
    for partition in 0..partitions {
        for _ in 0..rng.u64(1..=max_parts) {
            block += 1;
            let columns = rng.u64(1..=2);
            parts.push(
                part(&format!("p{partition}"), block, rng.u64(1..=10_000))
                    .with_columns_commit_time(TxnTimestamp::new(columns))
                    .with_commit_time(TxnTimestamp::from_unix_secs(NOW - rng.u64(0..=7_200))),
            );
        }
    }
    parts
}

/// Part names of every selected range.
pub fn names(ranges: &[Vec<mergetree_select::PartHandle>]) -> Vec<Vec<String>> {
    ranges
        .iter()
        .map(|range| range.iter().map(|part| part.name()).collect())
        .collect()
}
