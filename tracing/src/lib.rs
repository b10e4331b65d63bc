use tracing::Level;
use tracing_subscriber::{
    filter::FromEnvError, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter,
};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Init(#[from] tracing_subscriber::util::TryInitError),

    #[error("invalid RUST_LOG: {0}")]
    Filter(#[from] FromEnvError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TracingBuilder {
    level: Level,
    json: bool,
}

impl Default for TracingBuilder {
    fn default() -> Self {
        TracingBuilder {
            level: Level::INFO,
            json: false,
        }
    }
}

impl TracingBuilder {
    /// Set the log level. RUST_LOG still has a higher priority over this value.
    pub fn level(mut self, level: Level) -> TracingBuilder {
        self.level = level;
        self
    }

    /// Emit one JSON object per event instead of the compact human readable
    /// format.
    pub fn json(mut self, json: bool) -> TracingBuilder {
        self.json = json;
        self
    }

    fn env_filter(&self) -> Result<EnvFilter, Error> {
        Ok(EnvFilter::builder()
            .with_default_directive(self.level.into())
            .from_env()?)
    }

    /// Installs the global subscriber: an EnvFilter based on the configured
    /// level, and a stderr writer in the configured format.
    pub fn build(self) -> Result<(), Error> {
        tracing_subscriber::registry()
            .with(self.env_filter()?)
            .with(self.json.then(|| {
                tracing_subscriber::fmt::Layer::new()
                    .with_writer(std::io::stderr)
                    .json()
            }))
            .with((!self.json).then(|| {
                tracing_subscriber::fmt::Layer::new()
                    .with_writer(std::io::stderr)
                    .compact()
            }))
            .try_init()?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::TracingBuilder;
    use rstest::rstest;
    use tracing::Level;

    #[rstest]
    #[case::debug(Level::DEBUG, true)]
    #[case::warn(Level::WARN, false)]
    fn builder(#[case] level: Level, #[case] json: bool) {
        let builder = TracingBuilder::default().level(level).json(json);
        assert_eq!(
            TracingBuilder { level, json },
            builder,
            "setters must be applied"
        );
        builder.env_filter().expect("must build a filter");
    }
}
