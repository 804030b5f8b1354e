/*!
# Message Aggregation Scans

The three scan strategies producing per-vertex message aggregates from a
partition:

- **edge scan** walks every edge in tree order;
- **source index scan** walks only the occupied rows of the matrix,
  enumerating each row through the tree;
- **destination index scan** does the same for occupied columns.

All three share the [`AggregatingEdgeContext`] accumulator and the same
activeness semantics; the index scans additionally skip whole rows
(columns) whose source (destination) vertex already fails the activeness
mode. Which strategy wins depends on the shape of the partition — the
dataset framework picks per superstep.
*/

use super::{AggregatingEdgeContext, EdgePartition};
use crate::{
    edge::{EdgeActiveness, TripletFields},
    vertex::VertexId,
};

impl<V, E> EdgePartition<V, E> {
    /// Whether the edge `(src, dst)` participates under `mode`.
    fn edge_is_active(&self, mode: EdgeActiveness, src: VertexId, dst: VertexId) -> bool {
        match mode {
            EdgeActiveness::Neither => true,
            EdgeActiveness::SrcOnly => self.is_active(src),
            EdgeActiveness::DstOnly => self.is_active(dst),
            EdgeActiveness::Both => self.is_active(src) && self.is_active(dst),
            EdgeActiveness::Either => self.is_active(src) || self.is_active(dst),
        }
    }

    /// Aggregates messages by scanning every edge in tree order.
    ///
    /// For each participating edge the context is loaded with the edge and
    /// the requested vertex attributes, then `send_msg` may send any number
    /// of messages towards either endpoint; messages per target vertex are
    /// combined with `merge_msg`. Returns the accumulated
    /// `(vertex, message)` pairs in unspecified order.
    pub fn aggregate_messages_edge_scan<A, M, F>(
        &self,
        mut send_msg: F,
        merge_msg: M,
        fields: TripletFields,
        activeness: EdgeActiveness,
    ) -> Vec<(VertexId, A)>
    where
        M: Fn(A, A) -> A,
        F: FnMut(&mut AggregatingEdgeContext<'_, V, E, A, M>),
    {
        let mut ctx = AggregatingEdgeContext::new(merge_msg);

        for ((line, col), attr) in self.tree().iter().zip(self.edge_attrs.iter()) {
            let (src, dst) = (line + self.src_offset(), col + self.dst_offset());
            if !self.edge_is_active(activeness, src, dst) {
                continue;
            }

            ctx.load(
                src,
                dst,
                fields.use_src.then(|| self.vertex_attrs.get(&src)).flatten(),
                fields.use_dst.then(|| self.vertex_attrs.get(&dst)).flatten(),
                attr,
            );
            send_msg(&mut ctx);
        }

        ctx.into_messages()
    }

    /// Aggregates messages by scanning only the occupied rows.
    ///
    /// Rows whose source vertex already fails a source-gated activeness
    /// mode are skipped without touching the tree. Semantics are otherwise
    /// identical to [`aggregate_messages_edge_scan`](Self::aggregate_messages_edge_scan).
    pub fn aggregate_messages_src_index_scan<A, M, F>(
        &self,
        mut send_msg: F,
        merge_msg: M,
        fields: TripletFields,
        activeness: EdgeActiveness,
    ) -> Vec<(VertexId, A)>
    where
        M: Fn(A, A) -> A,
        F: FnMut(&mut AggregatingEdgeContext<'_, V, E, A, M>),
    {
        let mut ctx = AggregatingEdgeContext::new(merge_msg);

        for line in self.src_index.iter_set_bits() {
            let src = line + self.src_offset();
            let src_active = self.is_active(src);
            if matches!(activeness, EdgeActiveness::SrcOnly | EdgeActiveness::Both) && !src_active
            {
                continue;
            }

            let src_attr = fields.use_src.then(|| self.vertex_attrs.get(&src)).flatten();
            for (col, slot) in self.tree().row_iter(line) {
                let dst = col + self.dst_offset();
                let participates = match activeness {
                    EdgeActiveness::Neither | EdgeActiveness::SrcOnly => true,
                    EdgeActiveness::DstOnly | EdgeActiveness::Both => self.is_active(dst),
                    EdgeActiveness::Either => src_active || self.is_active(dst),
                };
                if !participates {
                    continue;
                }

                ctx.load(
                    src,
                    dst,
                    src_attr,
                    fields.use_dst.then(|| self.vertex_attrs.get(&dst)).flatten(),
                    &self.edge_attrs[slot as usize],
                );
                send_msg(&mut ctx);
            }
        }

        ctx.into_messages()
    }

    /// Aggregates messages by scanning only the occupied columns.
    ///
    /// The column-wise mirror of
    /// [`aggregate_messages_src_index_scan`](Self::aggregate_messages_src_index_scan):
    /// columns whose destination vertex already fails a destination-gated
    /// activeness mode are skipped wholesale.
    pub fn aggregate_messages_dst_index_scan<A, M, F>(
        &self,
        mut send_msg: F,
        merge_msg: M,
        fields: TripletFields,
        activeness: EdgeActiveness,
    ) -> Vec<(VertexId, A)>
    where
        M: Fn(A, A) -> A,
        F: FnMut(&mut AggregatingEdgeContext<'_, V, E, A, M>),
    {
        let mut ctx = AggregatingEdgeContext::new(merge_msg);

        for col in self.dst_index.iter_set_bits() {
            let dst = col + self.dst_offset();
            let dst_active = self.is_active(dst);
            if matches!(activeness, EdgeActiveness::DstOnly | EdgeActiveness::Both) && !dst_active
            {
                continue;
            }

            let dst_attr = fields.use_dst.then(|| self.vertex_attrs.get(&dst)).flatten();
            for (line, slot) in self.tree().col_iter(col) {
                let src = line + self.src_offset();
                let participates = match activeness {
                    EdgeActiveness::Neither | EdgeActiveness::DstOnly => true,
                    EdgeActiveness::SrcOnly | EdgeActiveness::Both => self.is_active(src),
                    EdgeActiveness::Either => dst_active || self.is_active(src),
                };
                if !participates {
                    continue;
                }

                ctx.load(
                    src,
                    dst,
                    fields.use_src.then(|| self.vertex_attrs.get(&src)).flatten(),
                    dst_attr,
                    &self.edge_attrs[slot as usize],
                );
                send_msg(&mut ctx);
            }
        }

        ctx.into_messages()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use itertools::Itertools;
    use rand::{Rng, SeedableRng};
    use rand_pcg::Pcg64Mcg;

    fn diagonal() -> EdgePartition<u64, u64> {
        EdgePartition::<u64, u64>::build(2, (0..10).map(|i| (i, i, i)))
            .unwrap()
            .update_vertices((0..10).map(|i| (i, 100 + i)))
    }

    #[test]
    fn count_active_edges_with_active_set() {
        let partition = diagonal().with_active_set(0..6);

        let messages = partition.aggregate_messages_edge_scan(
            |ctx| ctx.send_to_dst(1u64),
            |a, b| a + b,
            TripletFields::NONE,
            EdgeActiveness::Both,
        );

        assert_eq!(messages.len(), 6);
        assert!(messages.iter().all(|&(_, msg)| msg == 1));
        assert_eq!(
            messages.iter().map(|&(id, _)| id).sorted_unstable().collect_vec(),
            (0..6).collect_vec()
        );
    }

    #[test]
    fn activeness_modes_gate_edges() {
        // Edges fan out of 0 and into 5: (0,1), (0,5), (2,5), (3,4)
        let partition =
            EdgePartition::<u64, u64>::build(2, vec![(0, 1, 0), (0, 5, 0), (2, 5, 0), (3, 4, 0)])
                .unwrap()
                .with_active_set(vec![0, 5]);

        let count = |activeness| {
            partition
                .aggregate_messages_edge_scan(
                    |ctx| ctx.send_to_dst(1u64),
                    |a, b| a + b,
                    TripletFields::NONE,
                    activeness,
                )
                .into_iter()
                .map(|(_, n)| n)
                .sum::<u64>()
        };

        assert_eq!(count(EdgeActiveness::Neither), 4);
        assert_eq!(count(EdgeActiveness::SrcOnly), 2); // (0,1), (0,5)
        assert_eq!(count(EdgeActiveness::DstOnly), 2); // (0,5), (2,5)
        assert_eq!(count(EdgeActiveness::Both), 1); // (0,5)
        assert_eq!(count(EdgeActiveness::Either), 3);
    }

    #[test]
    fn context_exposes_requested_attributes() {
        let partition = diagonal();

        let messages = partition.aggregate_messages_edge_scan(
            |ctx| {
                assert_eq!(ctx.src_attr(), Some(&(100 + ctx.src())));
                assert_eq!(ctx.dst_attr(), None);
                let msg = ctx.attr() + 1;
                ctx.send_to_src(msg);
            },
            |a, b| a + b,
            TripletFields::SRC,
            EdgeActiveness::Neither,
        );

        assert_eq!(
            messages.into_iter().sorted_unstable().collect_vec(),
            (0..10).map(|i| (i, i + 1)).collect_vec()
        );
    }

    #[test]
    fn merge_combines_messages_per_vertex() {
        // A star: every edge points at vertex 3
        let partition =
            EdgePartition::<u64, u64>::build(2, (0..8).map(|i| (i, 3, i))).unwrap();

        let messages = partition.aggregate_messages_edge_scan(
            |ctx| {
                let msg = *ctx.attr();
                ctx.send_to_dst(msg);
            },
            |a, b| a + b,
            TripletFields::NONE,
            EdgeActiveness::Neither,
        );

        assert_eq!(messages, vec![(3, (0..8).sum::<u64>())]);
    }

    #[test]
    fn index_scans_agree_with_the_edge_scan() {
        let rng = &mut Pcg64Mcg::seed_from_u64(31);

        for k in [2u64, 3, 4] {
            let edges = (0..250)
                .map(|_| {
                    (
                        rng.random_range(10..90u64),
                        rng.random_range(0..80u64),
                        rng.random_range(1..50u64),
                    )
                })
                .unique_by(|&(s, d, _)| (s, d))
                .collect_vec();
            let actives = (0..100u64).filter(|_| rng.random_bool(0.4)).collect_vec();
            let partition = EdgePartition::<u64, u64>::build(k, edges)
                .unwrap()
                .with_active_set(actives);

            for activeness in [
                EdgeActiveness::Neither,
                EdgeActiveness::SrcOnly,
                EdgeActiveness::DstOnly,
                EdgeActiveness::Both,
                EdgeActiveness::Either,
            ] {
                let by_edge = partition
                    .aggregate_messages_edge_scan(
                        |ctx| {
                            let msg = *ctx.attr();
                            ctx.send_to_src(msg);
                            ctx.send_to_dst(msg + 1);
                        },
                        |a: u64, b: u64| a + b,
                        TripletFields::NONE,
                        activeness,
                    )
                    .into_iter()
                    .sorted_unstable()
                    .collect_vec();
                let by_src = partition
                    .aggregate_messages_src_index_scan(
                        |ctx| {
                            let msg = *ctx.attr();
                            ctx.send_to_src(msg);
                            ctx.send_to_dst(msg + 1);
                        },
                        |a: u64, b: u64| a + b,
                        TripletFields::NONE,
                        activeness,
                    )
                    .into_iter()
                    .sorted_unstable()
                    .collect_vec();
                let by_dst = partition
                    .aggregate_messages_dst_index_scan(
                        |ctx| {
                            let msg = *ctx.attr();
                            ctx.send_to_src(msg);
                            ctx.send_to_dst(msg + 1);
                        },
                        |a: u64, b: u64| a + b,
                        TripletFields::NONE,
                        activeness,
                    )
                    .into_iter()
                    .sorted_unstable()
                    .collect_vec();

                assert_eq!(by_edge, by_src, "src scan with k={k}, {activeness:?}");
                assert_eq!(by_edge, by_dst, "dst scan with k={k}, {activeness:?}");
            }
        }
    }

    #[test]
    fn aggregation_sum_counts_active_edges() {
        let rng = &mut Pcg64Mcg::seed_from_u64(32);

        let edges = (0..150)
            .map(|_| {
                (
                    rng.random_range(0..60u64),
                    rng.random_range(0..60u64),
                    0u64,
                )
            })
            .unique_by(|&(s, d, _)| (s, d))
            .collect_vec();
        let actives = (0..60u64).filter(|_| rng.random_bool(0.5)).collect_vec();
        let partition = EdgePartition::<u64, u64>::build(2, edges.clone())
            .unwrap()
            .with_active_set(actives.clone());

        for activeness in [
            EdgeActiveness::Neither,
            EdgeActiveness::SrcOnly,
            EdgeActiveness::DstOnly,
            EdgeActiveness::Both,
            EdgeActiveness::Either,
        ] {
            let expected = edges
                .iter()
                .filter(|&&(s, d, _)| {
                    let (sa, da) = (actives.contains(&s), actives.contains(&d));
                    match activeness {
                        EdgeActiveness::Neither => true,
                        EdgeActiveness::SrcOnly => sa,
                        EdgeActiveness::DstOnly => da,
                        EdgeActiveness::Both => sa && da,
                        EdgeActiveness::Either => sa || da,
                    }
                })
                .count() as u64;

            let total: u64 = partition
                .aggregate_messages_edge_scan(
                    |ctx| ctx.send_to_dst(1u64),
                    |a, b| a + b,
                    TripletFields::NONE,
                    activeness,
                )
                .into_iter()
                .map(|(_, n)| n)
                .sum();

            assert_eq!(total, expected, "{activeness:?}");
        }
    }
}
