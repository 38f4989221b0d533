use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use super::execute_ask;
use crate::dispatch::Dispatcher;
use crate::intent::IntentResolver;

const HELP: &str = "\
Requests are written in plain English, for example:
  connect
  find tools for read trimming
  show my histories
  show history <history id>
  generate methods for history <history id>
  citations for tool <tool id>
  search workflows for variant calling
  import workflow <trs id>
  upload <path> to history <history id>
Type 'exit' to quit.
";

/// Read requests line by line until `exit` or end of input.
pub async fn run_interactive<R, W>(
    dispatcher: &Dispatcher,
    resolver: &dyn IntentResolver,
    mut input: R,
    mut output: W,
) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    output
        .write_all(b"Galaxy agent interactive session. Type 'help' for examples.\n")
        .await?;
    let mut line = String::new();

    loop {
        output.write_all(b"> ").await?;
        output.flush().await?;

        line.clear();
        if input.read_line(&mut line).await? == 0 {
            break;
        }

        let request = line.trim();
        match request.to_lowercase().as_str() {
            "" => continue,
            "exit" | "quit" => break,
            "help" => {
                output.write_all(HELP.as_bytes()).await?;
                continue;
            }
            _ => {}
        }

        let result = execute_ask(dispatcher, resolver, request).await;
        output.write_all(result.message.as_bytes()).await?;
        if !result.message.ends_with('\n') {
            output.write_all(b"\n").await?;
        }
    }

    output.write_all(b"Goodbye.\n").await?;
    output.flush().await
}
