use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use serde_json::Value;

use owasp_api::{
    db::TEST_USERS,
    entities::{LoginRequest, LoginResponse},
};

#[derive(Parser)]
#[command(name = "auth-helper")]
#[command(about = "Get tokens and poke the A01 servers of the OWASP workshop", long_about = None)]
struct Cli {
    #[arg(long, default_value = "http://localhost:8000")]
    auth_url: String,

    #[arg(long, default_value = "http://localhost:8001")]
    vulnerable_url: String,

    #[arg(long, default_value = "http://localhost:8002")]
    secure_url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Reset the test users on the auth server
    Setup,
    /// Print a bearer token for a user
    Login { username: String, password: String },
    /// Fetch a profile from the vulnerable A01 server
    Test { token: String, username: String },
    /// Fetch a profile from the secure A01 server
    TestSecure { token: String, username: String },
    /// Walk through the whole A01 demonstration
    Demo,
}

struct Workshop {
    client: reqwest::Client,
    cli: Cli,
}

impl Workshop {
    async fn setup(&self) -> anyhow::Result<()> {
        let res = self
            .client
            .post(format!("{}/setup", self.cli.auth_url))
            .send()
            .await
            .with_context(|| format!("auth server not reachable at {}", self.cli.auth_url))?;

        if !res.status().is_success() {
            bail!("setup failed with status {}", res.status());
        }
        println!("Test users ready: alice/alice123, bob/bob123");
        Ok(())
    }

    async fn login(&self, username: &str, password: &str) -> anyhow::Result<String> {
        let res = self
            .client
            .post(format!("{}/login", self.cli.auth_url))
            .json(&LoginRequest {
                username: username.into(),
                password: password.into(),
            })
            .send()
            .await
            .with_context(|| format!("auth server not reachable at {}", self.cli.auth_url))?;

        if !res.status().is_success() {
            let status = res.status();
            let reason = detail(res).await;
            bail!("login failed ({status}): {reason}");
        }

        let body: LoginResponse = res.json().await?;
        Ok(body.access_token)
    }

    async fn profile(&self, token: &str, username: &str, secure: bool) -> anyhow::Result<()> {
        let (base, label) = if secure {
            (&self.cli.secure_url, "secure")
        } else {
            (&self.cli.vulnerable_url, "vulnerable")
        };

        let res = self
            .client
            .get(format!("{base}/profile"))
            .query(&[("username", username)])
            .bearer_auth(token)
            .send()
            .await
            .with_context(|| format!("{label} server not reachable at {base}"))?;

        println!("GET /profile?username={username} on {label} server");
        let status = res.status();
        println!("  status: {status}");
        if status.is_success() {
            let data: Value = res.json().await?;
            println!("  data:   {data}");
        } else {
            println!("  denied: {}", detail(res).await);
        }
        Ok(())
    }

    async fn demo(&self) -> anyhow::Result<()> {
        println!("1. Resetting test users");
        self.setup().await?;

        println!("\n2. Logging in");
        let [(alice, alice_pw, ..), (bob, bob_pw, ..)] = TEST_USERS;
        let alice_token = self.login(alice, alice_pw).await?;
        let bob_token = self.login(bob, bob_pw).await?;
        println!("  {alice}: {}...", preview(&alice_token));
        println!("  {bob}: {}...", preview(&bob_token));

        println!("\n3. Legitimate access ({alice} -> {alice})");
        self.profile(&alice_token, alice, false).await?;

        println!("\n4. Cross-user access on the vulnerable server ({alice} -> {bob})");
        self.profile(&alice_token, bob, false).await?;

        println!("\n5. Same request against the secure server");
        self.profile(&alice_token, bob, true).await?;

        Ok(())
    }
}

fn preview(token: &str) -> &str {
    token.get(..20).unwrap_or(token)
}

async fn detail(res: reqwest::Response) -> String {
    match res.json::<Value>().await {
        Ok(body) => body["detail"]
            .as_str()
            .map(str::to_string)
            .unwrap_or_else(|| body.to_string()),
        Err(_) => "unknown error".to_string(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let workshop = Workshop {
        client: reqwest::Client::new(),
        cli,
    };

    match &workshop.cli.command {
        Commands::Setup => workshop.setup().await?,
        Commands::Login { username, password } => {
            let token = workshop.login(username, password).await?;
            println!("Token for {username}:\n  {token}\n");
            println!("Use it as:\n  Authorization: Bearer {token}");
        }
        Commands::Test { token, username } => workshop.profile(token, username, false).await?,
        Commands::TestSecure { token, username } => {
            workshop.profile(token, username, true).await?
        }
        Commands::Demo => workshop.demo().await?,
    }

    Ok(())
}
