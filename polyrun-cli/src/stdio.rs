//! Newline-delimited JSON request server
//!
//! Each input line is an execution request, optionally carrying an `id`
//! that is echoed on the response. Requests run concurrently, so responses
//! are written in completion order.

use anyhow::{Context, Result};
use polyrun_execution::{CodeExecutor, ExecutionRequest, ExecutionResult};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tracing::{debug, error, info};

#[derive(Debug, Deserialize)]
struct StdioRequest {
    #[serde(default)]
    id: Option<JsonValue>,
    #[serde(flatten)]
    request: ExecutionRequest,
}

#[derive(Debug, Serialize)]
struct StdioResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<JsonValue>,
    #[serde(flatten)]
    result: ExecutionResult,
}

/// Serve requests from `input` until EOF, returning the number handled
pub async fn serve<R, W>(executor: Arc<dyn CodeExecutor>, input: R, mut output: W) -> Result<usize>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let (tx, mut rx) = mpsc::unbounded_channel::<StdioResponse>();

    let reader = async move {
        let mut lines = input.lines();
        let mut handled = 0usize;
        while let Some(line) = lines.next_line().await.context("Failed to read from stdin")? {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            handled += 1;

            match serde_json::from_str::<StdioRequest>(line) {
                Ok(StdioRequest { id, request }) => {
                    let executor = Arc::clone(&executor);
                    let tx = tx.clone();
                    tokio::spawn(async move {
                        let result = executor.execute(request).await;
                        // The writer only stops once every sender is gone
                        let _ = tx.send(StdioResponse { id, result });
                    });
                }
                Err(e) => {
                    error!("Failed to parse request: {}", e);
                    let _ = tx.send(StdioResponse {
                        id: None,
                        result: ExecutionResult::failure(format!("Invalid request: {}", e)),
                    });
                }
            }
        }
        info!("Input closed after {} requests", handled);
        Ok::<usize, anyhow::Error>(handled)
    };

    let writer = async {
        while let Some(response) = rx.recv().await {
            let json = serde_json::to_string(&response).context("Failed to serialize response")?;
            output
                .write_all(json.as_bytes())
                .await
                .context("Failed to write response")?;
            output.write_all(b"\n").await.context("Failed to write newline")?;
            output.flush().await.context("Failed to flush output")?;
            debug!("Wrote response {:?}", response.id);
        }
        Ok::<(), anyhow::Error>(())
    };

    let (handled, ()) = tokio::try_join!(reader, writer)?;
    Ok(handled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use polyrun_execution::ExecutionError;
    use std::time::Duration;

    /// Echoes the code back, uppercased, after a delay taken from the code length
    struct EchoExecutor;

    #[async_trait]
    impl CodeExecutor for EchoExecutor {
        async fn execute(&self, request: ExecutionRequest) -> ExecutionResult {
            tokio::time::sleep(Duration::from_millis(request.code.len() as u64 * 10)).await;
            match request.language.as_deref() {
                Some("echo") | None => ExecutionResult::output(request.code.to_uppercase()),
                Some(other) => ExecutionResult::failure(format!("Unsupported language: {}", other)),
            }
        }

        async fn health_check(&self) -> Result<(), ExecutionError> {
            Ok(())
        }
    }

    async fn run(input: &str) -> (usize, Vec<JsonValue>) {
        let mut output = Vec::new();
        let handled = serve(Arc::new(EchoExecutor), input.as_bytes(), &mut output)
            .await
            .unwrap();
        let responses = String::from_utf8(output)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        (handled, responses)
    }

    #[tokio::test]
    async fn test_ids_are_echoed() {
        let (handled, responses) = run("{\"id\": 7, \"code\": \"hi\", \"language\": \"echo\"}\n").await;
        assert_eq!(handled, 1);
        assert_eq!(
            responses,
            vec![serde_json::json!({"id": 7, "success": true, "output": "HI"})]
        );
    }

    #[tokio::test]
    async fn test_requests_run_concurrently() {
        let input = "{\"id\": \"slow\", \"code\": \"aaaaaaaaaaaaaaaaaaaaaaaaaaaaaa\"}\n\
                     \n\
                     {\"id\": \"fast\", \"code\": \"b\"}\n";
        let (handled, responses) = run(input).await;
        assert_eq!(handled, 2);
        assert_eq!(responses[0]["id"], "fast");
        assert_eq!(responses[1]["id"], "slow");
    }

    #[tokio::test]
    async fn test_malformed_lines_get_an_error_response() {
        let (handled, responses) = run("not json\n{\"code\": \"x\", \"language\": \"cobol\"}\n").await;
        assert_eq!(handled, 2);
        assert_eq!(responses.len(), 2);
        assert!(responses.iter().all(|r| r["success"] == false));
        assert!(responses
            .iter()
            .any(|r| r["error"].as_str().unwrap().starts_with("Invalid request")));
        assert!(responses.iter().all(|r| r.get("id").is_none()));
    }
}
