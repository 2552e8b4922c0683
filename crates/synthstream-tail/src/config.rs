use anyhow::bail;
use clap::Parser;
use core::time::Duration;
use synthstream::{
    BatchRequest, QueryDescriptor, STREAMING_SCENARIO, StreamKind, StreamOptions,
};

/// Runtime configuration for the `synthstream-tail` binary.
///
/// Every flag can also be supplied through the environment (or a `.env` file).
/// Together they describe a single stream query, as a dashboard panel would
/// send it.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "synthstream-tail",
    version,
    about = "Print a synthetic data stream as JSON lines"
)]
pub struct CliArgs {
    /// Stream kind: `signal`, `logs` or `fetch`.
    ///
    /// Environment variable: `STREAM_KIND`
    #[arg(long, env = "STREAM_KIND", default_value_t = String::from("signal"))]
    pub kind: String,

    /// Milliseconds between generated rows.
    ///
    /// Environment variable: `STREAM_SPEED`
    #[arg(long, env = "STREAM_SPEED", default_value_t = 250)]
    pub speed: u64,

    /// Maximum step of the signal's random walk.
    ///
    /// Environment variable: `STREAM_SPREAD`
    #[arg(long, env = "STREAM_SPREAD", default_value_t = 3.5)]
    pub spread: f64,

    /// Maximum distance of the min/max bands from the signal.
    ///
    /// Environment variable: `STREAM_NOISE`
    #[arg(long, env = "STREAM_NOISE", default_value_t = 2.2)]
    pub noise: f64,

    /// Number of min/max band pairs for `signal` streams.
    ///
    /// Environment variable: `STREAM_BANDS`
    #[arg(long, env = "STREAM_BANDS", default_value_t = 1)]
    pub bands: usize,

    /// Rows kept in the stream's buffer. Unset or 0 falls back to
    /// `--max-data-points`.
    ///
    /// Environment variable: `STREAM_BUFFER`
    #[arg(long, env = "STREAM_BUFFER")]
    pub buffer: Option<usize>,

    /// Absolute `http(s)` URL of the CSV document for `fetch` streams.
    ///
    /// Environment variable: `STREAM_URL`
    #[arg(long, env = "STREAM_URL")]
    pub url: Option<String>,

    /// Minimum length of generated log lines.
    ///
    /// Environment variable: `STREAM_LINE_LENGTH`
    #[arg(long, env = "STREAM_LINE_LENGTH", default_value_t = 60)]
    pub line_length: usize,

    /// Row-count hint sent with the request.
    ///
    /// Environment variable: `MAX_DATA_POINTS`
    #[arg(long, env = "MAX_DATA_POINTS", default_value_t = 100)]
    pub max_data_points: usize,

    /// Reference id of the query within its panel.
    ///
    /// Environment variable: `REF_ID`
    #[arg(long, env = "REF_ID", default_value_t = String::from("A"))]
    pub ref_id: String,

    /// Environment variable: `DASHBOARD_ID`
    #[arg(long, env = "DASHBOARD_ID", default_value_t = 1)]
    pub dashboard_id: i64,

    /// Environment variable: `PANEL_ID`
    #[arg(long, env = "PANEL_ID", default_value_t = 1)]
    pub panel_id: i64,

    /// Stop after this many seconds instead of waiting for Ctrl-C.
    ///
    /// Environment variable: `DURATION_SECS`
    #[arg(long, env = "DURATION_SECS")]
    pub duration_secs: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct TailConfig {
    pub kind: StreamKind,
    pub options: StreamOptions,
    pub max_data_points: usize,
    pub ref_id: String,
    pub dashboard_id: i64,
    pub panel_id: i64,
    pub duration: Option<Duration>,
}

impl TailConfig {
    /// The single-query batch this configuration describes.
    pub fn batch_request(&self, start_time: i64) -> BatchRequest {
        BatchRequest {
            dashboard_id: self.dashboard_id,
            panel_id: self.panel_id,
            max_data_points: self.max_data_points,
            start_time,
            targets: vec![QueryDescriptor {
                ref_id: self.ref_id.clone(),
                scenario_id: STREAMING_SCENARIO.to_string(),
                stream: Some(self.options.clone()),
            }],
        }
    }
}

impl TryFrom<CliArgs> for TailConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        let Ok(kind) = args.kind.parse::<StreamKind>() else {
            bail!(
                "STREAM_KIND must be one of signal, logs or fetch (got `{}`)",
                args.kind
            );
        };

        if args.buffer.is_none_or(|b| b == 0) && args.max_data_points == 0 {
            bail!("MAX_DATA_POINTS must be greater than 0 when STREAM_BUFFER is unset or 0");
        }

        if kind == StreamKind::Fetch && args.url.as_deref().is_none_or(|u| u.trim().is_empty()) {
            bail!("STREAM_URL is required for fetch streams");
        }

        if args.ref_id.is_empty() {
            bail!("REF_ID must not be empty");
        }

        Ok(Self {
            kind,
            options: StreamOptions {
                kind: Some(kind.to_string()),
                speed: Some(args.speed),
                spread: Some(args.spread),
                noise: Some(args.noise),
                bands: Some(args.bands),
                buffer: args.buffer,
                url: args.url,
                line_length: Some(args.line_length),
            },
            max_data_points: args.max_data_points,
            ref_id: args.ref_id,
            dashboard_id: args.dashboard_id,
            panel_id: args.panel_id,
            duration: args.duration_secs.map(Duration::from_secs),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> anyhow::Result<TailConfig> {
        let args = CliArgs::try_parse_from(
            core::iter::once("synthstream-tail").chain(args.iter().copied()),
        )?;
        TailConfig::try_from(args)
    }

    #[test]
    fn defaults_describe_a_signal_stream() {
        let config = parse(&[]).unwrap();
        assert_eq!(config.kind, StreamKind::Signal);
        assert_eq!(config.options.speed, Some(250));
        assert_eq!(config.options.buffer, None);
        assert_eq!(config.duration, None);

        let request = config.batch_request(42);
        assert_eq!(request.start_time, 42);
        assert_eq!(request.targets.len(), 1);
        assert_eq!(request.targets[0].scenario_id, STREAMING_SCENARIO);
        assert_eq!(request.targets[0].ref_id, "A");
    }

    #[test]
    fn flags_are_carried_into_the_query() {
        let config = parse(&[
            "--kind",
            "logs",
            "--buffer",
            "5",
            "--line-length",
            "10",
            "--duration-secs",
            "3",
        ])
        .unwrap();
        assert_eq!(config.kind, StreamKind::Logs);
        assert_eq!(config.options.kind.as_deref(), Some("logs"));
        assert_eq!(config.options.buffer, Some(5));
        assert_eq!(config.options.line_length, Some(10));
        assert_eq!(config.duration, Some(Duration::from_secs(3)));
    }

    #[test]
    fn rejects_invalid_combinations() {
        assert!(parse(&["--kind", "bogus"]).is_err());
        assert!(parse(&["--buffer", "0", "--max-data-points", "0"]).is_err());
        assert!(parse(&["--kind", "fetch"]).is_err());
        assert!(parse(&["--kind", "fetch", "--url", "http://localhost/a.csv"]).is_ok());
    }

    #[test]
    fn zero_bands_and_zero_buffer_are_accepted() {
        let config = parse(&["--bands", "0", "--buffer", "0"]).unwrap();
        assert_eq!(config.options.bands, Some(0));
        assert_eq!(config.options.buffer, Some(0));
    }
}
