//! Newline-delimited JSON-RPC over stdio

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{debug, info, warn};

use crate::Result;
use crate::server::McpServer;

/// Serve on the process's stdin/stdout until stdin closes
pub async fn serve_stdio(server: &McpServer) -> Result<()> {
    info!("Reflect MCP server listening on stdio");
    serve(server, BufReader::new(tokio::io::stdin()), tokio::io::stdout()).await
}

/// Serve messages read line by line from `reader`, writing one response
/// line per request to `writer`. Returns when the reader hits EOF.
pub async fn serve<R, W>(server: &McpServer, reader: R, mut writer: W) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = reader.split(b'\n');

    while let Some(raw) = lines.next_segment().await? {
        let Ok(line) = std::str::from_utf8(&raw) else {
            warn!(bytes = raw.len(), "Skipping stdin line that is not valid UTF-8");
            continue;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let Some(response) = server.handle_line(line).await else {
            continue;
        };

        let mut message = serde_json::to_vec(&response)?;
        message.push(b'\n');
        writer.write_all(&message).await?;
        writer.flush().await?;
    }

    debug!("stdin closed, stopping stdio transport");
    Ok(())
}
