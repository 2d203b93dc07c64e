//! Read-write query sessions over an isolated graph snapshot.

use tracing::debug;

use crate::engine::cancel::CancelToken;
use crate::engine::errors::EngineError;
use crate::engine::graph::ProbGraph;
use crate::engine::result::QueryResult;
use crate::translate::{translate_line, Directive};

/// A session over a private clone of a base graph.
///
/// The base graph is cloned exactly once, at construction. Mutation
/// statements mutate the clone; queries execute against the same clone. The
/// caller's base graph is never touched, so sessions are cheap isolation
/// boundaries. A session is single-threaded by design: drive it from one
/// thread, or add external synchronisation.
#[derive(Debug, Clone)]
pub struct Session {
    graph: ProbGraph,
}

impl Session {
    /// Starts a session over a clone of `base`.
    pub fn new(base: &ProbGraph) -> Self {
        Self {
            graph: base.clone(),
        }
    }

    /// Starts a session that takes ownership of `graph` directly.
    pub fn from_graph(graph: ProbGraph) -> Self {
        Self { graph }
    }

    /// The session's current graph state.
    pub fn graph(&self) -> &ProbGraph {
        &self.graph
    }

    /// Parses and runs one input line.
    ///
    /// Statements mutate the session graph and return `Ok(None)` as the
    /// mutation acknowledgement; queries return `Ok(Some(result))`.
    pub fn query(&mut self, input: &str) -> Result<Option<QueryResult>, EngineError> {
        self.query_with_token(&CancelToken::new(), input)
    }

    /// Like [`Session::query`] with a caller-supplied cancellation token,
    /// e.g. one a timeout layer cancels.
    pub fn query_with_token(
        &mut self,
        token: &CancelToken,
        input: &str,
    ) -> Result<Option<QueryResult>, EngineError> {
        let line = percolate_frontend::parse_line(input)?;
        match translate_line(&line, &self.graph)? {
            Directive::Statement(statement) => {
                debug!(?statement, "applying statement");
                statement.apply(&mut self.graph)?;
                Ok(None)
            }
            Directive::Query(query) => query.execute(token, &self.graph).map(Some),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::graph::{NodeId, PropMap};

    #[test]
    fn statements_mutate_only_the_session_clone() {
        let mut base = ProbGraph::new();
        base.add_node(NodeId::from("A"), PropMap::default())
            .expect("node");

        let mut session = Session::new(&base);
        session.query("CREATE NODE B").expect("create");
        session
            .query("CREATE EDGE e FROM A TO B PROB 0.5")
            .expect("create edge");

        assert!(session.graph().contains_node(&NodeId::from("B")));
        assert!(!base.contains_node(&NodeId::from("B")));
        assert_eq!(base.edge_count(), 0);
    }

    #[test]
    fn statements_acknowledge_with_none() {
        let mut session = Session::new(&ProbGraph::new());
        let ack = session.query("CREATE NODE A").expect("create");
        assert!(ack.is_none());
    }

    #[test]
    fn queries_return_results() {
        let mut session = Session::new(&ProbGraph::new());
        session.query("CREATE NODE A, B").expect("nodes");
        session
            .query("CREATE EDGE e FROM A TO B PROB 0.9")
            .expect("edge");
        let result = session
            .query("MAXPATH FROM A TO B")
            .expect("query")
            .expect("result");
        assert_eq!(result.kind(), "path");
    }

    #[test]
    fn pre_cancelled_token_aborts_queries() {
        let mut session = Session::new(&ProbGraph::new());
        session.query("CREATE NODE A").expect("node");
        let token = CancelToken::new();
        token.cancel();
        let err = session
            .query_with_token(&token, "MAXPATH FROM A TO A")
            .expect_err("cancelled");
        assert_eq!(err.kind(), "Cancelled");
    }
}
