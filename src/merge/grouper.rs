use std::{collections::BTreeMap, sync::Arc};

use crate::{part::PartHandle, table::MergeTreeTable};

/// Bucket number used for the single group of an unbucketed table.
const UNBUCKETED: i64 = 0;

/// Split the visible parts into independently mergeable groups.
///
/// Unbucketed tables yield one group under key `0`. Bucketed tables yield one
/// group per bucket number; parts clustered under a different definition than
/// the table's current one are left out until they are re-clustered. Inside a
/// group, parts are ordered by partition and otherwise keep their input order.
pub(crate) fn group_by_bucket<'a>(
    table: &MergeTreeTable,
    parts: impl Iterator<Item = &'a PartHandle>,
) -> BTreeMap<i64, Vec<PartHandle>> {
    let mut groups: BTreeMap<i64, Vec<PartHandle>> = BTreeMap::new();
    match table.cluster_by_hash() {
        None => {
            groups.insert(UNBUCKETED, parts.cloned().collect());
        }
        Some(definition) => {
            for part in parts {
                if !definition.matches(part.table_definition_hash()) {
                    continue;
                }
                groups
                    .entry(part.bucket_number())
                    .or_default()
                    .push(Arc::clone(part));
            }
        }
    }
    for group in groups.values_mut() {
        group.sort_by(|lhs, rhs| lhs.partition_id().cmp(rhs.partition_id()));
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        id::TableId,
        part::{DataPart, PartInfo, PartSnapshot},
        table::ClusterByHash,
    };

    fn part(partition: &str, block: u64) -> DataPart {
        DataPart::new(PartInfo::new(partition, block, block, 0))
    }

    fn names(group: &[PartHandle]) -> Vec<String> {
        group.iter().map(|part| part.name()).collect()
    }

    #[test]
    fn unbucketed_table_forms_a_single_group() {
        let table = MergeTreeTable::new(TableId::new());
        let snapshot = PartSnapshot::from_parts([part("b", 1), part("a", 2), part("b", 3)]);
        let groups = group_by_bucket(&table, snapshot.visible());
        assert_eq!(groups.len(), 1);
        assert_eq!(
            names(&groups[&UNBUCKETED]),
            vec!["a_2_2_0", "b_1_1_0", "b_3_3_0"]
        );
    }

    #[test]
    fn partition_sort_keeps_input_order_within_partition() {
        let table = MergeTreeTable::new(TableId::new());
        let snapshot = PartSnapshot::from_parts([part("a", 9), part("b", 1), part("a", 4)]);
        let groups = group_by_bucket(&table, snapshot.visible());
        assert_eq!(
            names(&groups[&UNBUCKETED]),
            vec!["a_9_9_0", "a_4_4_0", "b_1_1_0"]
        );
    }

    #[test]
    fn bucketed_table_drops_parts_with_stale_clustering() {
        let table = MergeTreeTable::new(TableId::new()).cluster_by(ClusterByHash::new(42));
        let snapshot = PartSnapshot::from_parts([
            part("a", 1).with_bucket(0, 42),
            part("a", 2).with_bucket(1, 42),
            part("a", 3).with_bucket(1, 7),
            part("a", 4).with_bucket(0, 42),
        ]);
        let groups = group_by_bucket(&table, snapshot.visible());
        assert_eq!(groups.len(), 2);
        assert_eq!(names(&groups[&0]), vec!["a_1_1_0", "a_4_4_0"]);
        assert_eq!(names(&groups[&1]), vec!["a_2_2_0"]);
    }

    #[test]
    fn bucketed_table_without_matching_parts_has_no_groups() {
        let table = MergeTreeTable::new(TableId::new()).cluster_by(ClusterByHash::new(1));
        let snapshot = PartSnapshot::from_parts([part("a", 1).with_bucket(3, 2)]);
        assert!(group_by_bucket(&table, snapshot.visible()).is_empty());
    }
}
