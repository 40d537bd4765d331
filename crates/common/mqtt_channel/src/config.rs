use crate::MqttError;
use crate::TopicFilter;
use rustls::pki_types::pem::PemObject;
use rustls::pki_types::CertificateDer;
use rustls::RootCertStore;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Configuration of an MQTT connection
#[derive(Debug, Clone)]
pub struct Config {
    /// MQTT host to connect to
    ///
    /// Default: "localhost"
    pub host: String,

    /// MQTT port to connect to. Usually it's either 1883 for insecure MQTT and
    /// 8883 for secure MQTT.
    ///
    /// Default: 1883
    pub port: u16,

    /// The session name to be use on connect
    ///
    /// If no session name is provided, a random one will be created on connect,
    /// and the session will be clean on connect.
    ///
    /// Default: None
    pub session_name: Option<String>,

    /// The list of topics to subscribe to on connect
    ///
    /// Default: An empty topic list
    pub subscriptions: TopicFilter,

    /// Clean the MQTT session upon connect if set to `true`.
    ///
    /// Default: `false`.
    pub clean_session: bool,

    /// Capacity of the internal message queues
    ///
    /// Default: `1024`.
    pub queue_capacity: usize,

    /// Maximum size for a message payload
    ///
    /// Default: `1024 * 1024`.
    pub max_packet_size: usize,

    /// Keep alive interval of the connection
    ///
    /// Default: 60 seconds
    pub keep_alive: Duration,

    /// User name and password sent on connect
    ///
    /// Default: None
    pub credentials: Option<Credentials>,

    /// Root certificates used to authenticate the broker.
    ///
    /// The connection is established over TLS when set.
    ///
    /// Default: None, i.e. plain TCP
    pub cert_store: Option<RootCertStore>,
}

/// MQTT user name and password
#[derive(Clone, Eq, PartialEq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"****")
            .finish()
    }
}

/// By default a client connects the local MQTT broker.
impl Default for Config {
    fn default() -> Self {
        Config {
            host: String::from("localhost"),
            port: 1883,
            session_name: None,
            subscriptions: TopicFilter::empty(),
            clean_session: false,
            queue_capacity: 1024,
            max_packet_size: 1024 * 1024,
            keep_alive: Duration::from_secs(60),
            credentials: None,
            cert_store: None,
        }
    }
}

impl Config {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Config::default()
        }
    }

    /// Set the session name
    pub fn with_session_name(self, name: impl Into<String>) -> Self {
        Self {
            session_name: Some(name.into()),
            ..self
        }
    }

    /// Add a list of topics to subscribe to on connect
    ///
    /// Can be called several times to subscribe to many topics.
    pub fn with_subscriptions(mut self, topics: TopicFilter) -> Self {
        self.subscriptions.add_all(topics);
        self
    }

    /// Set the clean_session flag
    pub fn with_clean_session(self, flag: bool) -> Self {
        Self {
            clean_session: flag,
            ..self
        }
    }

    /// Authenticate with a user name and a password on connect
    pub fn with_credentials(
        self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            credentials: Some(Credentials {
                username: username.into(),
                password: password.into(),
            }),
            ..self
        }
    }

    /// Adds all certificates present in `ca_file` file to the trust store.
    ///
    /// Once a certificate is trusted, the connection is established over TLS.
    pub fn with_cafile(self, ca_file: impl AsRef<Path>) -> Result<Self, MqttError> {
        let path = ca_file.as_ref();
        let invalid_ca_file = |reason: String| MqttError::InvalidCaFile {
            path: path.to_path_buf(),
            reason,
        };

        let mut cert_store = self.cert_store.unwrap_or_else(RootCertStore::empty);
        let mut count = 0;
        let certs = CertificateDer::pem_file_iter(path)
            .map_err(|err| invalid_ca_file(err.to_string()))?;
        for cert in certs {
            let cert = cert.map_err(|err| invalid_ca_file(err.to_string()))?;
            cert_store
                .add(cert)
                .map_err(|err| invalid_ca_file(err.to_string()))?;
            count += 1;
        }
        if count == 0 {
            return Err(invalid_ca_file("no certificate found".to_string()));
        }

        Ok(Self {
            cert_store: Some(cert_store),
            ..self
        })
    }

    /// Wrap this config into an internal set of options for `rumqttc`.
    pub(crate) fn mqtt_options(&self) -> Result<rumqttc::MqttOptions, MqttError> {
        let id: String = match &self.session_name {
            None => std::iter::repeat_with(fastrand::lowercase)
                .take(10)
                .collect(),
            Some(name) => name.clone(),
        };

        let mut mqtt_options = rumqttc::MqttOptions::new(id, &self.host, self.port);

        if self.session_name.is_none() {
            // There is no point to have a session with a random name that will not be reused.
            mqtt_options.set_clean_session(true);
        } else {
            mqtt_options.set_clean_session(self.clean_session);
        }

        if let Some(credentials) = &self.credentials {
            mqtt_options.set_credentials(&credentials.username, &credentials.password);
        }

        if let Some(cert_store) = self.cert_store.as_ref() {
            let provider = Arc::new(rustls::crypto::ring::default_provider());
            let tls_config = rustls::ClientConfig::builder_with_provider(provider)
                .with_safe_default_protocol_versions()?
                .with_root_certificates(cert_store.clone())
                .with_no_client_auth();

            mqtt_options.set_transport(rumqttc::Transport::tls_with_config(tls_config.into()));
        }

        mqtt_options.set_max_packet_size(self.max_packet_size, self.max_packet_size);
        mqtt_options.set_keep_alive(self.keep_alive);

        Ok(mqtt_options)
    }
}
