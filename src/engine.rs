use std::ops::Range;

use log::trace;

use crate::common::FftNum;
use crate::error::{try_vec, FftError};
use crate::factorizer::{Decomposition, Factor};
use crate::graph::{DependencyGraph, NodeId};
use crate::queue::{
    Bindings, ComputeOp, Event, ModulateOp, ModulateStage, Op, Plane, Queue, TransposeOp, View,
};
use crate::{ComplexStorage, Domain, FftDirection, Layout};

/// Number of whole transforms that fit the residency budget together, at least one and at most
/// `total`.
pub fn batches_per_group(budget_bytes: usize, per_batch_bytes: usize, total: usize) -> usize {
    let fit = budget_bytes.checked_div(per_batch_bytes).unwrap_or(total);
    fit.max(1).min(total.max(1))
}

/// Splits `0..total` into consecutive groups of `per_group` transforms. The last group may be
/// shorter.
pub fn partition_batches(total: usize, per_group: usize) -> Vec<Range<usize>> {
    let per_group = per_group.max(1);
    (0..total)
        .step_by(per_group)
        .map(|start| start..(start + per_group).min(total))
        .collect()
}

/// Scratch memory of one execution: two equally sized regions that passes alternate between.
pub struct ExecutionContext<T> {
    scratch: Vec<T>,
}

impl<T: FftNum> ExecutionContext<T> {
    /// Allocates two regions of `region_len` scalars each.
    pub fn new(region_len: usize) -> Result<Self, FftError> {
        Ok(Self {
            scratch: try_vec![T::zero(); 2 * region_len],
        })
    }

    /// Total scalars across both regions.
    pub fn scratch_len(&self) -> usize {
        self.scratch.len()
    }

    pub fn region_len(&self) -> usize {
        self.scratch.len() / 2
    }

    pub(crate) fn scratch_mut(&mut self) -> &mut [T] {
        &mut self.scratch
    }
}

/// Which scratch region holds the live data while the graph is being built.
#[derive(Copy, Clone, Default, Debug)]
struct PingPong {
    current: usize,
}

impl PingPong {
    fn current(&self) -> usize {
        self.current
    }

    fn other(&self) -> usize {
        1 - self.current
    }

    fn swap(&mut self) {
        self.current = self.other();
    }
}

/// Handle to the last operation of an execution.
#[must_use = "the transform may still be running until its completion is waited on"]
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct Completion {
    event: Event,
}

impl Completion {
    pub fn event(&self) -> Event {
        self.event
    }

    /// Blocks until every operation of the execution has finished, reporting the first device
    /// failure.
    pub fn wait<Q: Queue>(self, queue: &mut Q) -> Result<(), FftError> {
        queue.wait(self.event)?;
        Ok(())
    }
}

/// Everything one execution needs to know about the plan and the caller's buffers.
#[derive(Clone, Debug)]
pub(crate) struct GraphParams<'a> {
    pub decomposition: &'a Decomposition,
    pub direction: FftDirection,
    pub storage: ComplexStorage,
    /// Addressing of the input, for batch 0.
    pub input: View,
    /// Addressing of the output, for batch 0.
    pub output: View,
    pub num_transforms: usize,
    pub batches_per_group: usize,
    pub scale: f64,
}

/// The operations of one execution and their dependencies.
#[derive(Clone, Debug)]
pub struct ExecutionGraph {
    pub graph: DependencyGraph<Op>,
    /// The batch range each group covers, in processing order.
    pub groups: Vec<Range<usize>>,
    /// The join node every group's last operations feed into.
    pub completion: NodeId,
}

impl ExecutionGraph {
    pub(crate) fn build(params: &GraphParams<'_>) -> Self {
        let mut builder = GraphBuilder {
            graph: DependencyGraph::new(),
            params,
        };

        let groups = if params.decomposition.is_direct() {
            vec![0..params.num_transforms]
        } else {
            partition_batches(params.num_transforms, params.batches_per_group)
        };

        let mut tails = Vec::new();
        if params.decomposition.is_direct() {
            tails.push(builder.direct());
        } else {
            for group in &groups {
                tails.extend(builder.group(group.clone()));
            }
        }
        let completion = builder.graph.add(Op::Join, &tails);

        Self {
            graph: builder.graph,
            groups,
            completion,
        }
    }

    /// Issues every operation to `queue` in dependency order.
    pub fn submit<T: FftNum, Q: Queue>(
        &self,
        queue: &mut Q,
        bindings: &mut Bindings<'_, T>,
    ) -> Result<Completion, FftError> {
        let mut events: Vec<Event> = Vec::with_capacity(self.graph.len());
        for (id, op) in self.graph.iter() {
            let deps: Vec<Event> = self
                .graph
                .predecessors(id)
                .iter()
                .map(|p| events[p.0])
                .collect();
            trace!("issuing {} (node {}) after {:?}", op.name(), id.0, deps);
            let event = match op {
                Op::Compute(op) => queue.compute(op, bindings, &deps)?,
                Op::Transpose(op) => queue.transpose(op, bindings, &deps)?,
                Op::Modulate(op) => queue.modulate(op, bindings, &deps)?,
                Op::Join => queue.join(&deps)?,
            };
            events.push(event);
        }
        Ok(Completion {
            event: events[self.completion.0],
        })
    }

    /// Number of nodes of each kind: (compute, transpose, modulate).
    pub fn op_counts(&self) -> (usize, usize, usize) {
        self.graph.iter().fold((0, 0, 0), |(c, t, m), (_, op)| match op {
            Op::Compute(_) => (c + 1, t, m),
            Op::Transpose(_) => (c, t + 1, m),
            Op::Modulate(_) => (c, t, m + 1),
            Op::Join => (c, t, m),
        })
    }
}

struct GraphBuilder<'a, 'p> {
    graph: DependencyGraph<Op>,
    params: &'p GraphParams<'a>,
}

impl<'a, 'p> GraphBuilder<'a, 'p> {
    fn padded_len(&self) -> usize {
        self.params.decomposition.padded_len
    }

    fn scratch(&self, region: usize) -> View {
        View::scratch(region, self.padded_len())
    }

    /// The whole transform as one kernel, straight from input to output.
    fn direct(&mut self) -> NodeId {
        let params = self.params;
        let op = ComputeOp {
            factor: params.decomposition.forward[0].clone(),
            direction: params.direction,
            layout: Layout::Packed,
            input: params.input,
            output: params.output,
            num_blocks: 1,
            num_transforms: params.num_transforms,
            scale: params.scale,
        };
        self.graph.add(Op::Compute(op), &[])
    }

    /// Adds every operation of one batch group, returning the nodes that finish it.
    fn group(&mut self, batches: Range<usize>) -> Vec<NodeId> {
        let params = self.params;
        let decomposition = params.decomposition;
        let num_transforms = batches.len();
        let input = View {
            offset: params.input.offset + batches.start * params.input.distance,
            ..params.input
        };
        let output = View {
            offset: params.output.offset + batches.start * params.output.distance,
            ..params.output
        };
        let mut pingpong = PingPong::default();

        if !decomposition.bluestein {
            return self.chain(
                &decomposition.forward,
                params.direction,
                input,
                Some((output, params.scale)),
                Vec::new(),
                &mut pingpong,
                num_transforms,
            );
        }

        let padded_len = self.padded_len();
        let bluestein_op = |stage, src, dst, scale| ModulateOp {
            stage,
            src,
            dst,
            len: decomposition.committed_len,
            padded_len,
            modifiers_offset: 2 * padded_len,
            chirp_offset: 0,
            conjugate: params.direction == FftDirection::Inverse,
            scale,
            num_transforms,
        };

        let load = bluestein_op(
            ModulateStage::Load,
            input,
            self.scratch(pingpong.current()),
            1.0,
        );
        let load = self.graph.add(Op::Modulate(load), &[]);

        let source = self.scratch(pingpong.current());
        let tails = self.chain(
            &decomposition.forward,
            FftDirection::Forward,
            source,
            None,
            vec![load],
            &mut pingpong,
            num_transforms,
        );

        let spectrum = self.scratch(pingpong.current());
        let chirp = bluestein_op(ModulateStage::Chirp, spectrum, spectrum, 1.0);
        let chirp = self.graph.add(Op::Modulate(chirp), &tails);

        let source = self.scratch(pingpong.current());
        let tails = self.chain(
            &decomposition.backward,
            FftDirection::Inverse,
            source,
            None,
            vec![chirp],
            &mut pingpong,
            num_transforms,
        );

        let store = bluestein_op(
            ModulateStage::Store,
            self.scratch(pingpong.current()),
            output,
            params.scale,
        );
        vec![self.graph.add(Op::Modulate(store), &tails)]
    }

    /// Runs every factor of `factors`, then the transposes that restore natural order. The last
    /// transpose writes `target` with its scale, or stays in scratch when there's no target.
    #[allow(clippy::too_many_arguments)]
    fn chain(
        &mut self,
        factors: &[Factor],
        direction: FftDirection,
        source: View,
        target: Option<(View, f64)>,
        preds: Vec<NodeId>,
        pingpong: &mut PingPong,
        num_transforms: usize,
    ) -> Vec<NodeId> {
        let padded_len = self.padded_len();
        let k = factors.len();
        let mut tails = preds;

        for (i, factor) in factors.iter().enumerate() {
            let input = if i == 0 {
                source
            } else {
                self.scratch(pingpong.current())
            };
            let layout = if i + 1 == k {
                Layout::Packed
            } else {
                Layout::BatchInterleaved
            };
            let op = ComputeOp {
                factor: factor.clone(),
                direction,
                layout,
                input,
                output: self.scratch(pingpong.current()),
                num_blocks: padded_len / factor.block_len(),
                num_transforms,
                scale: 1.0,
            };
            tails = vec![self.graph.add(Op::Compute(op), &tails)];
        }

        // (lda, ldb, block_len), innermost dimension first
        let passes: Vec<(usize, usize, usize)> = if k > 1 {
            factors[..k - 1]
                .iter()
                .rev()
                .map(|f| (f.sub_batch, f.len, f.block_len()))
                .collect()
        } else if target.is_some() {
            vec![(1, 1, 1)]
        } else {
            Vec::new()
        };

        let count = passes.len();
        for (pass, (lda, ldb, block_len)) in passes.into_iter().enumerate() {
            let last = pass + 1 == count;
            let src = self.scratch(pingpong.current());
            let (dst, scale, leaves_scratch) = match target {
                Some((view, scale)) if last => (view, scale, true),
                _ => (self.scratch(pingpong.other()), 1.0, false),
            };
            let op = TransposeOp {
                src,
                dst,
                lda,
                ldb,
                block_len,
                num_blocks: padded_len / block_len,
                num_transforms,
                scale,
                plane: Plane::Interleaved,
            };
            tails = self.transpose(op, &tails);
            if !leaves_scratch {
                pingpong.swap();
            }
        }
        tails
    }

    /// Split storage moves each plane with its own op, both depending only on `preds`.
    fn transpose(&mut self, op: TransposeOp, preds: &[NodeId]) -> Vec<NodeId> {
        match self.params.storage {
            ComplexStorage::Interleaved => vec![self.graph.add(Op::Transpose(op), preds)],
            ComplexStorage::Split => {
                let mut nodes = vec![self.graph.add(
                    Op::Transpose(TransposeOp {
                        plane: Plane::Real,
                        ..op
                    }),
                    preds,
                )];
                if op.dst.kind == Domain::Complex {
                    nodes.push(self.graph.add(
                        Op::Transpose(TransposeOp {
                            plane: Plane::Imag,
                            ..op
                        }),
                        preds,
                    ));
                }
                nodes
            }
        }
    }
}
