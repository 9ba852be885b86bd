use std::time::Duration;

use async_trait::async_trait;
use teloxide::prelude::*;

use tgdrive_core::{
    domain::FileRef,
    errors::Error,
    ports::SourceFetcher,
    source::{ByteSource, ByteStream, ResolvedSource},
    Result,
};

/// Resolves Telegram file ids into streaming downloads.
///
/// Two round trips: `getFile` for the server-side path, then a GET on the
/// file endpoint whose body is handed to the engine without buffering.
#[derive(Clone)]
pub struct TelegramFetcher {
    bot: Bot,
    http: reqwest::Client,
    api_url: String,
}

impl TelegramFetcher {
    /// `connect_timeout` only bounds connection setup; large bodies may take far longer.
    pub fn new(bot: Bot, api_url: impl Into<String>, connect_timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|e| Error::Config(format!("cannot build telegram download client: {e}")))?;
        Ok(Self {
            bot,
            http,
            api_url: api_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn file_url(&self, file_path: &str) -> String {
        format!(
            "{}/file/bot{}/{}",
            self.api_url,
            self.bot.token(),
            file_path.trim_start_matches('/')
        )
    }

    async fn open(&self, file_path: &str) -> Result<ResolvedSource> {
        let resp = self
            .http
            .get(self.file_url(file_path))
            .send()
            .await
            .map_err(|e| Error::SourceUnavailable(format!("telegram download error: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(Error::SourceUnavailable(format!(
                "telegram file download returned {}",
                status.as_u16()
            )));
        }

        let size = resp.content_length();
        if size == Some(0) {
            return Err(Error::SourceUnavailable(
                "telegram returned an empty file".to_string(),
            ));
        }

        tracing::debug!(file_path, ?size, "telegram download opened");
        Ok(ResolvedSource {
            source: ByteSource::from_stream(ResponseStream(resp)),
            size,
        })
    }
}

#[async_trait]
impl SourceFetcher for TelegramFetcher {
    async fn resolve(&self, file: &FileRef) -> Result<ResolvedSource> {
        let tg_file = self
            .bot
            .get_file(file.source_id.clone())
            .await
            .map_err(|e| Error::SourceUnavailable(format!("telegram getFile failed: {e}")))?;

        if tg_file.path.is_empty() {
            return Err(Error::SourceUnavailable(format!(
                "telegram returned no path for {}",
                file.display_name
            )));
        }

        self.open(&tg_file.path).await
    }
}

struct ResponseStream(reqwest::Response);

#[async_trait]
impl ByteStream for ResponseStream {
    async fn next_bytes(&mut self) -> Result<Option<Vec<u8>>> {
        self.0
            .chunk()
            .await
            .map(|piece| piece.map(|b| b.to_vec()))
            .map_err(|e| Error::SourceUnavailable(format!("telegram download interrupted: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use std::net::TcpListener;

    fn can_bind_localhost() -> bool {
        TcpListener::bind("127.0.0.1:0").is_ok()
    }

    fn fetcher(api_url: &str) -> TelegramFetcher {
        TelegramFetcher::new(Bot::new("123:abc"), api_url, Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn file_url_embeds_token_and_path() {
        let f = fetcher("https://api.telegram.org/");
        assert_eq!(
            f.file_url("documents/file_7.pdf"),
            "https://api.telegram.org/file/bot123:abc/documents/file_7.pdf"
        );
    }

    #[tokio::test]
    async fn streams_body_with_transport_size() {
        if !can_bind_localhost() {
            eprintln!("Skipping httpmock tests: cannot bind to localhost");
            return;
        }

        let server = MockServer::start_async().await;
        let m = server
            .mock_async(|when, then| {
                when.method(GET).path("/file/bot123:abc/documents/a.bin");
                then.status(200).body("0123456789");
            })
            .await;

        let resolved = fetcher(&server.base_url()).open("documents/a.bin").await.unwrap();
        assert_eq!(resolved.size, Some(10));
        let data = resolved.source.read_to_end(resolved.size).await.unwrap();
        assert_eq!(data, b"0123456789");
        m.assert_async().await;
    }

    #[tokio::test]
    async fn failed_download_is_source_unavailable() {
        if !can_bind_localhost() {
            eprintln!("Skipping httpmock tests: cannot bind to localhost");
            return;
        }

        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/file/bot123:abc/gone.bin");
                then.status(404).body("Not Found");
            })
            .await;

        let err = fetcher(&server.base_url()).open("gone.bin").await.err().unwrap();
        assert!(matches!(err, Error::SourceUnavailable(ref m) if m.contains("404")), "{err}");
    }

    #[tokio::test]
    async fn empty_file_is_rejected() {
        if !can_bind_localhost() {
            eprintln!("Skipping httpmock tests: cannot bind to localhost");
            return;
        }

        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/file/bot123:abc/empty.bin");
                then.status(200).body("");
            })
            .await;

        let err = fetcher(&server.base_url()).open("empty.bin").await.err().unwrap();
        assert!(matches!(err, Error::SourceUnavailable(_)), "{err}");
    }
}
