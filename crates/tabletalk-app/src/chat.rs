//! Terminal chat: one session, queries from stdin, answers to stdout.

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use tabletalk_chat::{ChatError, SessionRegistry};
use tabletalk_core::error::TableTalkError;

const HELP: &str = "Ask anything about the dataset. Commands: /reset clears the conversation, /quit exits.";

/// Run the chat loop until `input` ends or the user quits.
pub async fn run_repl<R, W>(
    registry: &SessionRegistry,
    input: R,
    mut output: W,
) -> Result<(), TableTalkError>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let session = match registry.create_session().await {
        Ok(summary) => summary,
        Err(ChatError::TableUnavailable(e)) => {
            write_line(
                &mut output,
                &format!(
                    "Could not load the dataset ({}). Check the dataset source and try again.",
                    e.reason()
                ),
            )
            .await?;
            return Err(ChatError::TableUnavailable(e).into());
        }
        Err(e) => return Err(e.into()),
    };

    if let Some(table) = registry.dataset().cached() {
        write_line(
            &mut output,
            &format!(
                "Loaded {} rows with columns: {}",
                table.row_count(),
                table.column_names().collect::<Vec<_>>().join(", ")
            ),
        )
        .await?;
    }
    write_line(&mut output, HELP).await?;

    let mut lines = input.lines();
    while let Some(line) = lines.next_line().await? {
        match line.trim() {
            "" => continue,
            "/quit" | "/exit" => break,
            "/reset" => {
                registry.reset(session.id).await?;
                write_line(&mut output, "Conversation cleared.").await?;
                continue;
            }
            _ => {}
        }

        match registry.submit_query(session.id, &line).await {
            Ok(outcome) => write_line(&mut output, outcome.assistant_turn.content()).await?,
            Err(ChatError::MessageTooLong(max)) => {
                write_line(
                    &mut output,
                    &format!("That question is too long (limit {} characters).", max),
                )
                .await?
            }
            Err(e) => return Err(e.into()),
        }
    }

    registry.teardown(session.id)?;
    Ok(())
}

async fn write_line<W: AsyncWrite + Unpin>(output: &mut W, text: &str) -> std::io::Result<()> {
    output.write_all(text.as_bytes()).await?;
    output.write_all(b"\n").await?;
    output.flush().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::path::PathBuf;
    use std::sync::Arc;

    use tabletalk_chat::{AnswerGenerator, MockBackend, TextBackend, TurnPipeline};
    use tabletalk_table::{Dataset, FileFetcher, SourceLocator, TableStore};

    fn registry(path: PathBuf, backend: &Arc<MockBackend>) -> SessionRegistry {
        let dataset = Dataset::new(
            SourceLocator::Path(path),
            Arc::new(FileFetcher),
            Arc::new(TableStore::new()),
        );
        let generator = AnswerGenerator::new(Arc::clone(backend) as Arc<dyn TextBackend>);
        SessionRegistry::new(dataset, Arc::new(TurnPipeline::new(generator)))
    }

    fn people_csv() -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        file.write_all(b"name,age\nAlice,30\nBob,41\n").unwrap();
        file
    }

    async fn run(registry: &SessionRegistry, input: &str) -> (Result<(), TableTalkError>, String) {
        let mut output = Vec::new();
        let result = run_repl(registry, input.as_bytes(), &mut output).await;
        (result, String::from_utf8(output).unwrap())
    }

    #[tokio::test]
    async fn test_answers_each_line() {
        let file = people_csv();
        let backend = Arc::new(MockBackend::new());
        backend.push_text("Alice is 30.");
        backend.push_text("Bob is 41.");
        let registry = registry(file.path().to_path_buf(), &backend);

        let (result, output) = run(&registry, "alice\n\nbob\n").await;
        assert!(result.is_ok());
        assert!(output.contains("Loaded 2 rows with columns: name, age"));
        assert!(output.contains("Alice is 30.\n"));
        assert!(output.contains("Bob is 41.\n"));
        assert_eq!(backend.call_count(), 2);
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_quit_stops_reading() {
        let file = people_csv();
        let backend = Arc::new(MockBackend::new());
        let registry = registry(file.path().to_path_buf(), &backend);

        let (result, _) = run(&registry, "/quit\nalice\n").await;
        assert!(result.is_ok());
        assert_eq!(backend.call_count(), 0);
    }

    #[tokio::test]
    async fn test_reset_command() {
        let file = people_csv();
        let backend = Arc::new(MockBackend::new());
        let registry = registry(file.path().to_path_buf(), &backend);

        let (result, output) = run(&registry, "alice\n/reset\nbob\n").await;
        assert!(result.is_ok());
        assert!(output.contains("Conversation cleared."));
        assert_eq!(backend.call_count(), 2);
    }

    #[tokio::test]
    async fn test_generation_error_printed_as_answer() {
        let file = people_csv();
        let backend = Arc::new(MockBackend::new());
        backend.push_status(401);
        let registry = registry(file.path().to_path_buf(), &backend);

        let (result, output) = run(&registry, "alice\n").await;
        assert!(result.is_ok());
        assert!(output.contains("authentication error"));
        assert!(!output.contains("mock status"));
    }

    #[tokio::test]
    async fn test_unloadable_dataset() {
        let backend = Arc::new(MockBackend::new());
        let registry = registry(PathBuf::from("/nonexistent/people.csv"), &backend);

        let (result, output) = run(&registry, "alice\n").await;
        assert!(matches!(result, Err(TableTalkError::Load(_))));
        assert!(output.contains("Could not load the dataset (fetch)"));
        assert_eq!(backend.call_count(), 0);
    }
}
