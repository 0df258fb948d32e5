use crate::session::SessionState;
use kiln_core::Result;
use kiln_core::collaborator::CompilerFrontend;
use kiln_core::completion::{Completions, rank};
use std::sync::Arc;

/// Ranks the compiler's symbol candidates for a partially typed line.
///
/// Completion only ever sees committed state: references resolved by a
/// submission that is still being evaluated are not visible here.
pub struct CompletionProvider {
    frontend: Arc<dyn CompilerFrontend>,
}

impl CompletionProvider {
    pub fn new(frontend: Arc<dyn CompilerFrontend>) -> Self {
        Self { frontend }
    }

    pub async fn complete(
        &self,
        state: &SessionState,
        text: &str,
        cursor: usize,
    ) -> Result<Completions> {
        let cursor = clamp_to_boundary(text, cursor);
        let candidates = self
            .frontend
            .enumerate_symbols(state.environment(), text, cursor)
            .await?;
        tracing::debug!(
            "[CompletionProvider] {} candidates at {} (generation {})",
            candidates.len(),
            cursor,
            state.environment().generation()
        );
        Ok(rank(text, cursor, candidates))
    }
}

fn clamp_to_boundary(text: &str, cursor: usize) -> usize {
    let mut cursor = cursor.min(text.len());
    while !text.is_char_boundary(cursor) {
        cursor -= 1;
    }
    cursor
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use kiln_core::collaborator::{CompileOutcome, CompileRequest, EnvironmentHandle};
    use kiln_core::completion::{SymbolCandidate, SymbolKind};
    use std::sync::Mutex;
    use tokio_util::sync::CancellationToken;

    struct SymbolFrontend {
        symbols: Vec<SymbolCandidate>,
        seen_generations: Mutex<Vec<u64>>,
    }

    #[async_trait]
    impl CompilerFrontend for SymbolFrontend {
        fn initial_environment(&self) -> EnvironmentHandle {
            EnvironmentHandle::new(())
        }

        async fn compile_and_run(
            &self,
            _request: CompileRequest<'_>,
            _cancel: &CancellationToken,
        ) -> Result<CompileOutcome> {
            Ok(CompileOutcome::Diagnostics(Vec::new()))
        }

        async fn enumerate_symbols(
            &self,
            environment: &EnvironmentHandle,
            _text: &str,
            _cursor: usize,
        ) -> Result<Vec<SymbolCandidate>> {
            self.seen_generations.lock().unwrap().push(environment.generation());
            Ok(self.symbols.clone())
        }
    }

    #[tokio::test]
    async fn ranks_against_committed_environment() {
        let frontend = Arc::new(SymbolFrontend {
            symbols: vec![
                SymbolCandidate::new("Console", SymbolKind::Type),
                SymbolCandidate::new("constant", SymbolKind::Local),
                SymbolCandidate::new("Convert", SymbolKind::Type),
                SymbolCandidate::new("Math", SymbolKind::Type),
            ],
            seen_generations: Mutex::new(Vec::new()),
        });
        let provider = CompletionProvider::new(frontend.clone());
        let state = SessionState::new(EnvironmentHandle::new(()).successor(()));

        let items: Vec<_> = provider.complete(&state, "Con", 3).await.unwrap().collect();
        let names: Vec<_> = items.iter().map(|i| i.display_text.as_str()).collect();
        assert_eq!(names, vec!["Console", "Convert", "constant"]);
        assert_eq!(items[0].insertion_span, 0..3);
        assert_eq!(*frontend.seen_generations.lock().unwrap(), vec![1]);
    }

    #[tokio::test]
    async fn cursor_past_end_is_clamped() {
        let frontend = Arc::new(SymbolFrontend {
            symbols: vec![SymbolCandidate::new("Length", SymbolKind::Property)],
            seen_generations: Mutex::new(Vec::new()),
        });
        let provider = CompletionProvider::new(frontend);
        let state = SessionState::new(EnvironmentHandle::new(()));

        let items: Vec<_> = provider.complete(&state, "x.Le", 99).await.unwrap().collect();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].insertion_span, 2..4);
    }
}
