use std::{path::PathBuf, time::Duration};

use anyhow::bail;
use clap::Parser;
use tokio::io::AsyncWriteExt;
use ualoader::{ByteRange, HttpResourceLoader, LoaderConfig, UserAgent};

#[derive(Parser, Debug, Clone)]
#[clap(version, about)]
pub struct UaLoaderArgs {
    /// Debug output
    #[clap(long, alias = "debug")]
    verbose: bool,

    /// Configuration file
    #[clap(short, long, env = "UALOADER_CONFIG")]
    config: Option<PathBuf>,

    /// Application name of the User-Agent
    #[clap(long, requires = "app_version")]
    app_name: Option<String>,

    /// Application version of the User-Agent
    #[clap(long, requires = "app_name")]
    app_version: Option<String>,

    /// Build number appended to the version
    #[clap(long, requires = "app_version")]
    build: Option<String>,

    /// HTTP Header used to fetch
    ///
    /// Custom header. eg. "Referer: xxxxx".
    #[clap(short = 'H', long)]
    headers: Vec<String>,

    /// Cookies used to fetch
    #[clap(long)]
    cookies: Option<String>,

    /// Fetch timeout in seconds, 0 disables it
    #[clap(long)]
    timeout: Option<u64>,

    /// Sub-request to issue, OFFSET:LENGTH or OFFSET: for the rest of the resource
    ///
    /// All sub-requests are issued at once and share a single fetch.
    #[clap(short, long = "range", default_value = "0:")]
    ranges: Vec<ByteRange>,

    /// Write served bytes to this file, in range order
    #[clap(short, long)]
    output: Option<PathBuf>,

    /// Media url
    url: String,
}

impl UaLoaderArgs {
    fn config(&self) -> anyhow::Result<LoaderConfig> {
        let mut config = match &self.config {
            Some(path) => LoaderConfig::load(path)?,
            None => LoaderConfig::default(),
        };

        if let (Some(app_name), Some(version)) = (&self.app_name, &self.app_version) {
            config.user_agent = Some(UserAgent::detect(
                app_name,
                version,
                self.build.clone(),
            ));
        }

        for header in &self.headers {
            let Some((key, value)) = header.split_once(':') else {
                bail!("Invalid header: {header}");
            };
            config
                .headers
                .insert(key.trim().to_string(), value.trim().to_string());
        }

        if let Some(cookies) = &self.cookies {
            config
                .cookies
                .extend(cookies.split(';').map(|c| c.trim().to_string()));
        }

        if let Some(timeout) = self.timeout {
            config.fetch_timeout_secs = timeout;
        }

        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = UaLoaderArgs::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(if args.verbose {
                    tracing_subscriber::filter::LevelFilter::DEBUG.into()
                } else {
                    tracing_subscriber::filter::LevelFilter::INFO.into()
                })
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = args.config()?;
    tracing::info!("User-Agent: {}", config.user_agent().header_value());
    if let Some(timeout) = config.fetch_timeout() {
        tracing::debug!("Fetch timeout: {:?}", timeout);
    }

    let loader = HttpResourceLoader::from_config(&config)?;
    loader.add_cookies(&config.cookies, &args.url)?;

    let started_at = std::time::Instant::now();
    let mut tickets = Vec::with_capacity(args.ranges.len());
    for (index, range) in args.ranges.iter().enumerate() {
        tickets.push((range, loader.load(&args.url, *range, index == 0)?));
    }

    let mut output = match &args.output {
        Some(path) => Some(tokio::fs::File::create(path).await?),
        None => None,
    };

    let mut failed = 0;
    for (range, ticket) in tickets {
        match ticket.await {
            Ok(response) => {
                if let Some(info) = response.content_information {
                    tracing::info!(
                        "{} ({} bytes, byte range access: {})",
                        info.content_type,
                        info.content_length,
                        info.byte_range_access_supported
                    );
                }
                tracing::info!("Range {range} served {} bytes.", response.data.len());
                if let Some(output) = output.as_mut() {
                    output.write_all(&response.data).await?;
                }
            }
            Err(e) => {
                failed += 1;
                tracing::error!("Range {range} failed: {e}");
            }
        }
    }

    if let Some(mut output) = output {
        output.flush().await?;
    }

    tracing::info!(
        "Finished in {}.",
        human_duration(started_at.elapsed())
    );

    if failed > 0 {
        bail!("{failed} of {} range(s) failed", args.ranges.len());
    }
    Ok(())
}

/// `mm:ss`, or `h:mm:ss` past the hour
fn human_duration(duration: Duration) -> String {
    let total = duration.as_secs();
    let (hours, minutes, seconds) = (total / 3600, total % 3600 / 60, total % 60);
    if hours > 0 {
        format!("{hours}:{minutes:02}:{seconds:02}")
    } else {
        format!("{minutes:02}:{seconds:02}")
    }
}
