/*!
# Aggregating Edge Context

The per-scan helper handed to `send_msg` callbacks during message
aggregation. It exposes the current edge (and the requested vertex
attributes) and accumulates outgoing messages per target vertex through a
user-supplied merge function.
*/

use fxhash::FxHashMap;

use crate::vertex::VertexId;

/// Scan-local accumulator mapping target vertices to merged messages.
///
/// During a scan the context is loaded with one edge at a time; the
/// callback reads the edge and calls [`send_to_src`](Self::send_to_src) /
/// [`send_to_dst`](Self::send_to_dst) any number of times. Messages to the
/// same vertex are combined immediately via the merge function, so the
/// accumulator never holds more than one value per vertex.
pub struct AggregatingEdgeContext<'a, V, E, A, M> {
    merge: M,
    messages: FxHashMap<VertexId, A>,
    src: VertexId,
    dst: VertexId,
    src_attr: Option<&'a V>,
    dst_attr: Option<&'a V>,
    attr: Option<&'a E>,
}

impl<'a, V, E, A, M> AggregatingEdgeContext<'a, V, E, A, M>
where
    M: Fn(A, A) -> A,
{
    pub(crate) fn new(merge: M) -> Self {
        AggregatingEdgeContext {
            merge,
            messages: FxHashMap::default(),
            src: 0,
            dst: 0,
            src_attr: None,
            dst_attr: None,
            attr: None,
        }
    }

    /// Loads the context with the next edge of the scan.
    pub(crate) fn load(
        &mut self,
        src: VertexId,
        dst: VertexId,
        src_attr: Option<&'a V>,
        dst_attr: Option<&'a V>,
        attr: &'a E,
    ) {
        self.src = src;
        self.dst = dst;
        self.src_attr = src_attr;
        self.dst_attr = dst_attr;
        self.attr = Some(attr);
    }

    /// The source id of the current edge.
    #[inline(always)]
    pub fn src(&self) -> VertexId {
        self.src
    }

    /// The destination id of the current edge.
    #[inline(always)]
    pub fn dst(&self) -> VertexId {
        self.dst
    }

    /// The source vertex attribute, if requested and present.
    #[inline(always)]
    pub fn src_attr(&self) -> Option<&V> {
        self.src_attr
    }

    /// The destination vertex attribute, if requested and present.
    #[inline(always)]
    pub fn dst_attr(&self) -> Option<&V> {
        self.dst_attr
    }

    /// The attribute of the current edge.
    ///
    /// # Panics
    /// Panics if read outside a scan callback.
    #[inline(always)]
    pub fn attr(&self) -> &E {
        self.attr.expect("no edge loaded into the context")
    }

    /// Sends a message to the current edge's source vertex.
    pub fn send_to_src(&mut self, msg: A) {
        let target = self.src;
        self.send(target, msg);
    }

    /// Sends a message to the current edge's destination vertex.
    pub fn send_to_dst(&mut self, msg: A) {
        let target = self.dst;
        self.send(target, msg);
    }

    fn send(&mut self, target: VertexId, msg: A) {
        let merged = match self.messages.remove(&target) {
            Some(old) => (self.merge)(old, msg),
            None => msg,
        };
        self.messages.insert(target, merged);
    }

    /// Drains the accumulator. The order of the pairs is unspecified.
    pub(crate) fn into_messages(self) -> Vec<(VertexId, A)> {
        self.messages.into_iter().collect()
    }
}
