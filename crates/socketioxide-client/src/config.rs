use std::{borrow::Cow, time::Duration};

use crate::{client::Client, sink::PacketSink};

/// Configuration of a [`Client`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// The amount of time the client waits for an acknowledgement before
    /// failing the request with [`AckError::Timeout`](crate::AckError::Timeout).
    ///
    /// Defaults to 5 seconds.
    pub ack_timeout: Duration,

    /// The namespace joined by [`Client::open`].
    ///
    /// Defaults to "/".
    pub default_ns: Cow<'static, str>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            ack_timeout: Duration::from_secs(5),
            default_ns: Cow::Borrowed("/"),
        }
    }
}

/// A builder to create a [`Client`] with a custom [`ClientConfig`].
#[derive(Debug, Clone, Default)]
pub struct ClientBuilder {
    config: ClientConfig,
}

impl ClientBuilder {
    /// Creates a new [`ClientBuilder`] with the default config
    pub fn new() -> Self {
        Self::default()
    }

    /// The amount of time the client waits for an acknowledgement.
    ///
    /// Defaults to 5 seconds.
    #[inline]
    pub fn ack_timeout(mut self, ack_timeout: Duration) -> Self {
        self.config.ack_timeout = ack_timeout;
        self
    }

    /// The namespace joined by [`Client::open`].
    ///
    /// Defaults to "/".
    #[inline]
    pub fn default_ns(mut self, ns: impl Into<Cow<'static, str>>) -> Self {
        self.config.default_ns = ns.into();
        self
    }

    /// Replace the whole config.
    #[inline]
    pub fn with_config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    /// Build the [`Client`]. Outbound packets are handed to `sink`.
    pub fn build(self, sink: impl PacketSink) -> Client {
        Client::with_config(self.config, sink)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn builder() {
        let builder = ClientBuilder::new()
            .ack_timeout(Duration::from_millis(200))
            .default_ns("/chat");
        assert_eq!(builder.config.ack_timeout, Duration::from_millis(200));
        assert_eq!(builder.config.default_ns, "/chat");

        let builder = builder.with_config(ClientConfig::default());
        assert_eq!(builder.config.ack_timeout, Duration::from_secs(5));
        assert_eq!(builder.config.default_ns, "/");
    }
}
