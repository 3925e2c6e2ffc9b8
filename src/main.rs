use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Parser;
use easyhttp::config::{DEFAULT_RETRY_DELAY_MS, DEFAULT_TIMEOUT_SECS};
use easyhttp::facade::DEFAULT_UPLOAD_FIELD;
use easyhttp::{Body, EasyClient, Method, RequestSpec, Response, ResponseMode};
use serde_json::Value;

/// easyhttp - a small HTTP client with retries and JSON envelopes
///
/// Requests go to --base-url unless the endpoint is a full URL. Responses are
/// printed as a JSON envelope (array/object/json modes) or as the raw body.
///
/// Examples:
///   easyhttp --base-url https://pokeapi.co/api/v2 get /pokemon/ditto
///   easyhttp -H "X-Api-Key: abc" post https://httpbin.org/post -d '{"a":1}'
#[derive(Parser, Debug)]
#[command(author, version = env!("EASYHTTP_VERSION"), about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Base URL for relative endpoints (also via EASYHTTP_BASE_URL)
    #[arg(long, env = "EASYHTTP_BASE_URL", default_value = "", global = true)]
    base_url: String,

    /// Per-attempt timeout in seconds
    #[arg(long, default_value_t = DEFAULT_TIMEOUT_SECS, global = true)]
    timeout: u64,

    /// Extra attempts after a transport failure
    #[arg(long, default_value_t = 0, global = true)]
    retries: u32,

    /// Delay between attempts in milliseconds
    #[arg(long, default_value_t = DEFAULT_RETRY_DELAY_MS, global = true)]
    retry_delay: u64,

    /// Header line sent with every request, e.g. "X-Api-Key: abc" (repeatable)
    #[arg(short = 'H', long = "header", value_name = "LINE", global = true)]
    headers: Vec<String>,

    /// Token sent as "Authorization: <scheme> <token>" (also via EASYHTTP_TOKEN)
    #[arg(long, env = "EASYHTTP_TOKEN", global = true, hide_env_values = true)]
    token: Option<String>,

    /// Authorization scheme for --token
    #[arg(long, default_value = "Bearer", global = true)]
    token_scheme: String,

    /// Skip TLS certificate verification
    #[arg(long, short = 'k', global = true)]
    insecure: bool,

    /// Do not follow redirects
    #[arg(long, global = true)]
    no_redirects: bool,

    /// Response shape: array, object, json or raw
    #[arg(long, default_value = "array", global = true)]
    mode: ResponseMode,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Send a GET request
    Get {
        endpoint: String,
        /// Query parameter as key=value (repeatable)
        #[arg(short = 'q', long = "query", value_parser = parse_key_val)]
        query: Vec<(String, String)>,
    },
    /// Send a POST request
    Post(BodyArgs),
    /// Send a PUT request
    Put(BodyArgs),
    /// Send a PATCH request
    Patch(BodyArgs),
    /// Send a DELETE request
    Delete { endpoint: String },
    /// Save a response body to a file
    Download { url: String, path: PathBuf },
    /// Upload a file as multipart form data
    Upload {
        url: String,
        file: PathBuf,
        /// Form field name for the file
        #[arg(long, default_value = DEFAULT_UPLOAD_FIELD)]
        field: String,
        /// Extra form field as key=value (repeatable)
        #[arg(short = 'F', long = "form", value_parser = parse_key_val)]
        form: Vec<(String, String)>,
    },
}

#[derive(clap::Args, Debug)]
struct BodyArgs {
    endpoint: String,
    /// Request body; sent as JSON when it parses as JSON
    #[arg(short = 'd', long = "data")]
    data: Option<String>,
}

fn parse_key_val(s: &str) -> Result<(String, String), String> {
    s.split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .ok_or_else(|| format!("expected key=value, got '{}'", s))
}

fn body_from(data: Option<String>) -> Option<Body> {
    data.map(|text| match serde_json::from_str(&text) {
        Ok(value) => Body::Json(value),
        Err(_) => Body::Text(text),
    })
}

fn build_client(cli: &Cli) -> EasyClient {
    let mut easy = EasyClient::create(&cli.base_url);
    let client = easy.full_response();
    client
        .set_timeout(cli.timeout)
        .set_retry(cli.retries, cli.retry_delay)
        .set_response_mode(cli.mode)
        .set_verify_tls(!cli.insecure)
        .set_follow_redirects(!cli.no_redirects);
    for line in &cli.headers {
        client.with_default_header(line.clone());
    }
    if let Some(token) = &cli.token {
        easy.with_token(token, Some(&cli.token_scheme));
    }
    easy
}

fn print_response(response: Response) -> Result<()> {
    match response {
        Response::Envelope(envelope) => {
            println!("{}", serde_json::to_string_pretty(&envelope)?);
            ensure_success(envelope.success, envelope.error.as_deref())?;
        }
        Response::Json(text) => {
            println!("{}", text);
            let envelope: Value = serde_json::from_str(&text)?;
            let success = envelope["success"].as_bool().unwrap_or(false);
            ensure_success(success, envelope["error"].as_str())?;
        }
        Response::Raw(bytes) => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(&bytes)?;
            stdout.flush()?;
        }
    }
    Ok(())
}

fn ensure_success(success: bool, error: Option<&str>) -> Result<()> {
    if !success {
        bail!("Request failed: {}", error.unwrap_or("Unknown error"));
    }
    Ok(())
}

async fn run(cli: Cli) -> Result<()> {
    let easy = build_client(&cli);
    let client = easy.client();

    let spec = match cli.command {
        Commands::Get { endpoint, query } => {
            let params: Vec<(&str, &str)> =
                query.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();
            let endpoint = easyhttp::http::request::append_query(&endpoint, &params);
            RequestSpec::new(Method::Get, endpoint)
        }
        Commands::Post(args) => with_data(Method::Post, args),
        Commands::Put(args) => with_data(Method::Put, args),
        Commands::Patch(args) => with_data(Method::Patch, args),
        Commands::Delete { endpoint } => RequestSpec::new(Method::Delete, endpoint),
        Commands::Download { url, path } => {
            easy.download(&url, &path)
                .await
                .with_context(|| format!("Failed to download {}", url))?;
            eprintln!("Saved {}", path.display());
            return Ok(());
        }
        Commands::Upload {
            url,
            file,
            field,
            form,
        } => {
            let fields: Vec<(&str, &str)> =
                form.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();
            let value = easy.upload(&url, &file, &field, &fields).await?;
            println!("{}", serde_json::to_string_pretty(&value)?);
            return Ok(());
        }
    };

    print_response(client.request(spec).await?)
}

fn with_data(method: Method, args: BodyArgs) -> RequestSpec {
    let spec = RequestSpec::new(method, args.endpoint);
    match body_from(args.data) {
        Some(body) => spec.with_body(body),
        None => spec,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();
    run(cli).await
}
