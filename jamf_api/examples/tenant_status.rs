use std::{path::PathBuf, time::Duration};

use clap::Parser;
use jamf_api::{ClientConfig, Credentials, Format, Mode, Operation, Tenant};
use jamf_clock::DurationSecs;
use jamf_tokens::{ClientId, ClientSecret, Password, TokenStatus, Username};
use tokio::time;
use url::Url;

#[derive(Debug, Parser)]
struct Opts {
    /// A JSON client configuration; overrides every other option
    #[arg(short = 'f', long, env = "JAMF_CONFIG")]
    config: Option<PathBuf>,

    /// The server URL
    #[arg(short, long, env = "JAMF_URL", required_unless_present = "config")]
    url: Option<Url>,

    /// The API client ID
    #[arg(long, env = "JAMF_CLIENT_ID", requires = "client_secret")]
    client_id: Option<ClientId>,

    /// The API client secret
    #[arg(long, env = "JAMF_CLIENT_SECRET", hide_env_values = true)]
    client_secret: Option<ClientSecret>,

    /// The account name, when not using an API client
    #[arg(long, env = "JAMF_USERNAME", requires = "password")]
    username: Option<Username>,

    /// The account password
    #[arg(long, env = "JAMF_PASSWORD", hide_env_values = true)]
    password: Option<Password>,

    /// Seconds before expiry at which a token is replaced
    #[arg(short, long, env = "JAMF_TOKEN_BUFFER", default_value_t = 120)]
    buffer: u64,

    /// Seconds between polls
    #[arg(short, long, default_value_t = 30)]
    interval: u64,

    /// Number of polls before closing the tenant
    #[arg(short, long, default_value_t = 3)]
    polls: u32,
}

impl Opts {
    fn client_config(self) -> color_eyre::Result<ClientConfig> {
        if let Some(path) = self.config {
            return Ok(ClientConfig::from_json_file(path)?);
        }

        let url = self
            .url
            .ok_or_else(|| color_eyre::eyre::eyre!("a server url is required"))?;

        let credentials = match (self.client_id, self.client_secret, self.username, self.password)
        {
            (Some(client_id), Some(client_secret), _, _) => Credentials::ClientCredentials {
                client_id,
                client_secret,
            },
            (_, _, Some(username), Some(password)) => Credentials::Password { username, password },
            _ => color_eyre::eyre::bail!(
                "either client credentials or a username and password are required"
            ),
        };

        Ok(ClientConfig::new(url, credentials)
            .with_token_buffer(DurationSecs(self.buffer))
            .with_mode(Mode::Pro))
    }
}

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .pretty()
        .with_env_filter(tracing_subscriber::filter::EnvFilter::from_default_env())
        .init();

    let opts = Opts::parse();
    let interval = Duration::from_secs(opts.interval);
    let polls = opts.polls;

    let tenant = Tenant::connect(opts.client_config()?).await?;
    let token = tenant.guard().token().await?;

    tracing::info!(
        tenant = tenant.name(),
        method = %tenant.method(),
        token = format_args!("{:#?}", token),
        "first access token"
    );

    let pro = tenant
        .pro()
        .ok_or_else(|| color_eyre::eyre::eyre!("the pro api is not enabled"))?;

    let mut ticker = time::interval(interval);
    for _ in 0..polls {
        ticker.tick().await;

        let req = pro
            .get(pro.endpoint("v1/jamf-pro-version")?)
            .headers(pro.headers(Operation::Read, Format::Json))
            .build()?;
        let version = pro.execute(req).await?.text().await?;

        match tenant.guard().status().await {
            Some(status @ TokenStatus::Fresh) => {
                tracing::debug!(?status, %version, "polled server")
            }
            Some(status @ TokenStatus::Stale) => {
                tracing::warn!(?status, %version, "polled server")
            }
            status => {
                tracing::error!(?status, %version, "polled server")
            }
        }
    }

    let invalidated = tenant.close().await;
    tracing::info!(invalidated, "closed tenant");

    Ok(())
}
