use std::time::Duration;

use clap::Parser;
use warden::{jwa::Algorithm, JwtRef};
use warden_oidc::{Authority, AuthorityConfig};

#[derive(Debug, Parser)]
struct Opts {
    /// The issuer whose tokens are accepted
    #[arg(short, long, env = "WARDEN_ISSUER")]
    issuer: String,

    /// The audience tokens must be addressed to
    #[arg(short, long, env = "WARDEN_AUDIENCE")]
    audience: Vec<String>,

    /// Fetch keys from this URL instead of the issuer's well-known location
    #[arg(long, env = "WARDEN_JWKS_URL", conflicts_with = "discover")]
    jwks_url: Option<String>,

    /// Locate the key set through OpenID Connect discovery
    #[arg(long)]
    discover: bool,

    /// The algorithms tokens may be signed with
    #[arg(long, env = "WARDEN_ALGORITHMS", value_delimiter = ',', default_value = "RS256")]
    algorithms: Vec<Algorithm>,

    /// Clock skew tolerated in time-based claims, in seconds
    #[arg(long, env = "WARDEN_CLOCK_TOLERANCE", default_value_t = 0)]
    clock_tolerance: u64,

    /// Reload the key set in the background at this interval, in seconds
    #[arg(long)]
    refresh_every: Option<u64>,

    /// The tokens to verify
    #[arg(required = true)]
    tokens: Vec<String>,
}

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let opts = Opts::parse();

    let mut config = opts
        .audience
        .iter()
        .fold(AuthorityConfig::new(&opts.issuer), |config, aud| {
            config.add_audience(aud)
        })
        .with_algorithms(opts.algorithms.iter().copied())
        .with_clock_tolerance(Duration::from_secs(opts.clock_tolerance));

    if let Some(url) = &opts.jwks_url {
        config = config.with_jwks_url(url);
    }

    let authority = if opts.discover {
        Authority::discover(&config).await?
    } else {
        Authority::from_config(&config)?
    };

    let refresh = opts
        .refresh_every
        .map(|secs| authority.resolver().spawn_refresh(Duration::from_secs(secs)));

    for token in &opts.tokens {
        let token = JwtRef::from_str(token);
        match authority.verify_token(token).await {
            Ok(claims) => {
                println!("{token:?}: {}", serde_json::to_string_pretty(claims.as_map())?)
            }
            Err(refused) => println!("{token:?}: {refused} ({})", refused.status()),
        }
    }

    if let Some(task) = refresh {
        task.abort();
    }

    Ok(())
}
