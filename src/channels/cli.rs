//! CLI channel: stdin/stdout REPL for local testing.
//!
//! Every line is delivered as a micro-blog post from [`LOCAL_USER`], so
//! conversations behave exactly as they would on the real channel.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio_stream::StreamExt;
use tokio_stream::wrappers::LinesStream;
use uuid::Uuid;

use crate::channels::ChannelAdapter;
use crate::channels::microblog::{MicroblogAdapter, MicroblogPoster, Post};
use crate::error::ChannelError;

/// User name attached to every line typed at the prompt.
pub const LOCAL_USER: &str = "local-user";

/// Poster that prints replies to stdout.
pub struct StdoutPoster;

#[async_trait]
impl MicroblogPoster for StdoutPoster {
    async fn post(&self, text: &str, _in_reply_to: Option<&str>) -> Result<(), ChannelError> {
        write_reply(&mut tokio::io::stdout(), text).await
    }
}

/// Write one reply line and flush it.
async fn write_reply<W>(out: &mut W, text: &str) -> Result<(), ChannelError>
where
    W: AsyncWrite + Unpin,
{
    let line = format!("{text}\n");
    let written = match out.write_all(line.as_bytes()).await {
        Ok(()) => out.flush().await,
        Err(e) => Err(e),
    };
    written.map_err(|e| ChannelError::SendFailed {
        name: "cli".into(),
        reason: e.to_string(),
    })
}

/// A REPL feeding lines into a micro-blog adapter.
pub struct CliChannel {
    adapter: Arc<MicroblogAdapter>,
}

impl CliChannel {
    pub fn new(adapter: Arc<MicroblogAdapter>) -> Self {
        Self { adapter }
    }

    /// Read lines until EOF or `/quit`. Returns how many lines were
    /// delivered.
    pub async fn run<R>(&self, reader: R) -> Result<usize, ChannelError>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut lines = LinesStream::new(reader.lines());
        let mut delivered = 0;

        eprint!("> ");
        while let Some(line) = lines.next().await {
            let line = line?;
            let line = line.trim();
            if line == "/quit" {
                break;
            }
            if line.is_empty() {
                eprint!("> ");
                continue;
            }

            let post = Post::new(Uuid::new_v4().to_string(), LOCAL_USER, line);
            let outcomes = self.adapter.deliver(post).await?;
            if outcomes.iter().all(|o| o.is_no_match()) {
                eprintln!("(no handler matched)");
            }
            delivered += 1;
            eprint!("> ");
        }
        Ok(delivered)
    }
}
