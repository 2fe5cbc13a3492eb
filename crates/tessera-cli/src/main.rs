//! Tessera identity tool.
//!
//! Issues, inspects, and compares propagated identity tokens.
//!
//! Usage:
//!   # Issue a token for a realm user (realm defaults from config)
//!   tessera issue --user alice --role admin --realm-name ldap1 --realm-type ldap
//!
//!   # Issue an API key token
//!   tessera issue --user svc --api-key-id K1 --api-key-name ci
//!
//!   # Show the structured document for a token
//!   tessera inspect <token>
//!
//!   # Can <mine> access resources owned by <theirs>? (exit code 0 = yes)
//!   tessera can-access <mine> <theirs>

mod config;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::{EnvFilter, fmt};

use tessera_identity::{ApiKeyInfo, Identity, IdentityKind, RealmOrigin, User, Version};

use crate::config::Config;

#[derive(Parser, Debug)]
#[command(name = "tessera")]
#[command(about = "Issue, inspect, and compare propagated identity tokens")]
struct Cli {
    /// Config file (RON). Defaults to $XDG_CONFIG_HOME/tessera/config.ron
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Build an identity and print its token
    Issue(IssueArgs),
    /// Print the structured document for a token
    Inspect {
        token: String,
    },
    /// Check whether <mine> may access resources owned by <theirs>
    CanAccess {
        mine: String,
        theirs: String,
    },
}

#[derive(Args, Debug, Default)]
struct IssueArgs {
    /// Username of the authenticated user
    #[arg(long)]
    user: String,

    /// Role name (repeatable)
    #[arg(long = "role")]
    roles: Vec<String>,

    #[arg(long)]
    full_name: Option<String>,

    #[arg(long)]
    email: Option<String>,

    /// Authenticating realm name (default from config)
    #[arg(long)]
    realm_name: Option<String>,

    /// Authenticating realm type (default from config)
    #[arg(long)]
    realm_type: Option<String>,

    /// Authentication kind: realm, api_key, token, anonymous, internal
    #[arg(long)]
    kind: Option<String>,

    /// Run as this user, looked up in --lookup-realm-name/--lookup-realm-type
    #[arg(long, requires_all = ["lookup_realm_name", "lookup_realm_type"])]
    run_as: Option<String>,

    #[arg(long)]
    lookup_realm_name: Option<String>,

    #[arg(long)]
    lookup_realm_type: Option<String>,

    /// Authenticate through the API key realm with this key id
    #[arg(long, conflicts_with_all = ["realm_name", "realm_type"])]
    api_key_id: Option<String>,

    #[arg(long, requires = "api_key_id")]
    api_key_name: Option<String>,

    /// Protocol version to issue for, e.g. 7.17.0
    #[arg(long)]
    protocol_version: Option<Version>,
}

fn main() -> Result<ExitCode> {
    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Command::Issue(args) => {
            let identity = build_identity(&args, &config)?;
            tracing::info!(%identity, "issuing token");
            println!("{}", identity.encode_token()?);
            Ok(ExitCode::SUCCESS)
        }
        Command::Inspect { token } => {
            let identity = Identity::decode_token(&token).context("invalid token")?;
            println!("{}", serde_json::to_string_pretty(&identity.to_document())?);
            Ok(ExitCode::SUCCESS)
        }
        Command::CanAccess { mine, theirs } => {
            let mine = Identity::decode_token(&mine).context("invalid <mine> token")?;
            let theirs = Identity::decode_token(&theirs).context("invalid <theirs> token")?;
            let allowed = mine.can_access_resources_of(&theirs);
            println!("{allowed}");
            Ok(if allowed { ExitCode::SUCCESS } else { ExitCode::FAILURE })
        }
    }
}

fn build_identity(args: &IssueArgs, config: &Config) -> Result<Identity> {
    let user = User::new(&args.user, args.roles.iter().cloned());
    let user = match &args.full_name {
        Some(name) => user.with_full_name(name),
        None => user,
    };
    let user = match &args.email {
        Some(email) => user.with_email(email),
        None => user,
    };

    let kind = match &args.kind {
        Some(kind) => kind
            .parse::<IdentityKind>()
            .with_context(|| format!("unknown authentication kind '{kind}'"))?,
        None if args.api_key_id.is_some() => IdentityKind::ApiKey,
        None => IdentityKind::Realm,
    };

    let authenticated_by = if args.api_key_id.is_some() {
        RealmOrigin::api_key(&config.node_name)
    } else {
        RealmOrigin::new(
            args.realm_name.as_deref().unwrap_or(&config.realm_name),
            args.realm_type.as_deref().unwrap_or(&config.realm_type),
            &config.node_name,
        )
    };

    let (identity_user, lookup) = match (&args.run_as, &args.lookup_realm_name, &args.lookup_realm_type) {
        (Some(run_as), Some(name), Some(kind)) => (
            User::new(run_as, std::iter::empty::<String>()),
            Some(RealmOrigin::new(name, kind, &config.node_name)),
        ),
        _ => (user, None),
    };

    let mut builder = Identity::builder(identity_user, authenticated_by).kind(kind);
    if let Some(lookup) = lookup {
        builder = builder.looked_up_by(lookup);
    }
    if let Some(version) = args.protocol_version {
        builder = builder.version(version);
    }
    if let Some(id) = &args.api_key_id {
        let key = ApiKeyInfo::new(id);
        builder = builder.api_key(match &args.api_key_name {
            Some(name) => key.with_name(name),
            None => key,
        });
    }
    Ok(builder.build()?)
}

// ============================================================================
// Tests
// ============================================================================
